//! The outbound side of a running client.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{mpsc, watch};
use wavegate_protocol::{
    ChannelId, Frame, OpCode, PresenceUpdate, RequestMembers, RoomId, VoiceStateUpdate,
};
use wavegate_session::SessionState;

use crate::GatewayError;

/// Handle for sending commands to the gateway and observing the session.
///
/// Cheap to clone; every clone talks to the same client. Frames submitted
/// while the session is reconnecting are held and written once it is
/// `Active` again.
#[derive(Debug, Clone)]
pub struct GatewayHandle {
    outbound: mpsc::UnboundedSender<Frame>,
    shutdown: Arc<watch::Sender<bool>>,
    state: watch::Receiver<SessionState>,
}

impl GatewayHandle {
    pub(crate) fn new(
        outbound: mpsc::UnboundedSender<Frame>,
        shutdown: Arc<watch::Sender<bool>>,
        state: watch::Receiver<SessionState>,
    ) -> Self {
        Self {
            outbound,
            shutdown,
            state,
        }
    }

    /// Queues a control frame.
    pub fn send<T: Serialize>(&self, op: OpCode, payload: &T) -> Result<(), GatewayError> {
        if !self.is_live() {
            return Err(GatewayError::Closed);
        }
        let frame = Frame::new(op, payload)?;
        self.outbound.send(frame).map_err(|_| GatewayError::Closed)
    }

    /// Joins (or moves to) a voice channel in `room`.
    pub fn join_room(
        &self,
        room: RoomId,
        channel: ChannelId,
        self_mute: bool,
        self_deaf: bool,
    ) -> Result<(), GatewayError> {
        tracing::info!(room_id = %room, channel_id = %channel, "joining voice channel");
        self.send(
            OpCode::VoiceStateUpdate,
            &VoiceStateUpdate {
                guild_id: room,
                channel_id: Some(channel),
                self_mute,
                self_deaf,
            },
        )
    }

    /// Leaves voice in `room`.
    pub fn leave_room(&self, room: RoomId) -> Result<(), GatewayError> {
        tracing::info!(room_id = %room, "leaving voice");
        self.send(
            OpCode::VoiceStateUpdate,
            &VoiceStateUpdate {
                guild_id: room,
                channel_id: None,
                self_mute: false,
                self_deaf: false,
            },
        )
    }

    /// Updates the client's presence.
    pub fn update_presence(&self, presence: &PresenceUpdate) -> Result<(), GatewayError> {
        self.send(OpCode::PresenceUpdate, presence)
    }

    /// Asks the gateway to stream members of `room` whose name starts with
    /// `query` (empty for all), up to `limit` (0 for no limit).
    pub fn request_members(
        &self,
        room: RoomId,
        query: impl Into<String>,
        limit: u32,
    ) -> Result<(), GatewayError> {
        self.send(
            OpCode::RequestMembers,
            &RequestMembers {
                guild_id: room,
                query: query.into(),
                limit,
            },
        )
    }

    /// Requests a local disconnect. Idempotent.
    pub fn disconnect(&self) {
        if !self.shutdown.send_replace(true) {
            tracing::info!("disconnect requested");
        }
    }

    /// The session's current state.
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// `false` once a local disconnect or fatal close has begun.
    pub fn is_live(&self) -> bool {
        self.state().is_live() && !*self.shutdown.borrow()
    }

    /// Waits until the session reaches `Closed`.
    pub async fn closed(&self) {
        let mut state = self.state.clone();
        let _ = state.wait_for(|s| *s == SessionState::Closed).await;
    }
}
