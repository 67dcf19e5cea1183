//! Event routing: dispatch frames → typed events → handler tasks.
//!
//! Every handler invocation is its own Tokio task, so a slow handler never
//! delays the read loop or the heartbeat. There is no ordering between
//! handlers of different frames. Room snapshots and participant updates
//! are the exception on the cache side: the presence feed applies them in
//! receipt order, and their handlers start only after the update they
//! describe is in the cache.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use serde_json::Value;
use wavegate_presence::{ParticipantRecord, Pending, PresenceFeed};
use wavegate_protocol::{
    Frame, InteractionCreate, MessageCreate, ProtocolError, Ready, RoomSnapshot, VoiceState,
    events,
};

use crate::{AudioBackend, Context};

/// The application events handlers can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A fresh session is ready.
    Ready,
    /// A dropped session was resumed.
    Resumed,
    /// A room's full participant list arrived.
    RoomSnapshot,
    /// One participant joined, moved, or left voice.
    ParticipantUpdate,
    /// Voice server details for a room the client is joining.
    VoiceServerUpdate,
    /// A message was posted.
    MessageReceived,
    /// A command interaction arrived.
    InteractionReceived,
    /// Anything else: unknown event names and unknown op codes.
    Unrecognized,
}

/// A decoded application event.
#[derive(Debug, Clone)]
pub enum Event {
    /// `READY`
    Ready(Ready),
    /// `RESUMED`
    Resumed,
    /// `GUILD_CREATE`
    RoomSnapshot(RoomSnapshot),
    /// `VOICE_STATE_UPDATE`
    ParticipantUpdate(VoiceState),
    /// `VOICE_SERVER_UPDATE`, passed through untyped.
    VoiceServerUpdate(Value),
    /// `MESSAGE_CREATE`
    MessageReceived(MessageCreate),
    /// `INTERACTION_CREATE`
    InteractionReceived(InteractionCreate),
    /// An event or op code this library does not model.
    Unrecognized {
        /// The event name, or the op code for non-dispatch frames.
        name: String,
        /// The raw payload.
        payload: Value,
    },
}

impl Event {
    /// Decodes a frame into an event.
    ///
    /// Unknown event names and non-dispatch frames become
    /// [`Event::Unrecognized`].
    ///
    /// # Errors
    /// [`ProtocolError::InvalidPayload`] if a known event has the wrong
    /// payload shape.
    pub fn from_frame(frame: &Frame) -> Result<Self, ProtocolError> {
        let name = match (frame.op.is_dispatch(), frame.event.as_deref()) {
            (true, Some(name)) => name,
            _ => return Ok(Self::unrecognized(frame)),
        };
        Ok(match name {
            events::READY => Self::Ready(frame.payload_as()?),
            events::RESUMED => Self::Resumed,
            events::GUILD_CREATE => Self::RoomSnapshot(frame.payload_as()?),
            events::VOICE_STATE_UPDATE => Self::ParticipantUpdate(frame.payload_as()?),
            events::VOICE_SERVER_UPDATE => Self::VoiceServerUpdate(frame.payload.clone()),
            events::MESSAGE_CREATE => Self::MessageReceived(frame.payload_as()?),
            events::INTERACTION_CREATE => Self::InteractionReceived(frame.payload_as()?),
            _ => Self::unrecognized(frame),
        })
    }

    fn unrecognized(frame: &Frame) -> Self {
        Self::Unrecognized {
            name: frame.context(),
            payload: frame.payload.clone(),
        }
    }

    /// The kind handlers register for.
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Ready(_) => EventKind::Ready,
            Self::Resumed => EventKind::Resumed,
            Self::RoomSnapshot(_) => EventKind::RoomSnapshot,
            Self::ParticipantUpdate(_) => EventKind::ParticipantUpdate,
            Self::VoiceServerUpdate(_) => EventKind::VoiceServerUpdate,
            Self::MessageReceived(_) => EventKind::MessageReceived,
            Self::InteractionReceived(_) => EventKind::InteractionReceived,
            Self::Unrecognized { .. } => EventKind::Unrecognized,
        }
    }
}

/// A registered handler.
pub type Handler = Arc<dyn Fn(Context, Event) -> BoxFuture<'static, ()> + Send + Sync>;

/// Handlers per event kind, in registration order.
#[derive(Clone, Default)]
pub struct EventRouter {
    handlers: HashMap<EventKind, Vec<Handler>>,
}

impl EventRouter {
    /// Creates a router with no handlers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a handler for `kind`. Handlers of one kind run in separate
    /// tasks, spawned in registration order.
    pub fn register<F, Fut>(&mut self, kind: EventKind, handler: F) -> &mut Self
    where
        F: Fn(Context, Event) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let handler: Handler =
            Arc::new(move |ctx: Context, event: Event| -> BoxFuture<'static, ()> {
                Box::pin(handler(ctx, event))
            });
        self.handlers.entry(kind).or_default().push(handler);
        self
    }

    /// Number of handlers registered for `kind`.
    pub fn handler_count(&self, kind: EventKind) -> usize {
        self.handlers.get(&kind).map_or(0, Vec::len)
    }

    /// Spawns every handler registered for the event. If `after` is given
    /// the handlers start once that cache update has been applied.
    ///
    /// Returns the number of handlers spawned; an event without handlers is
    /// dropped with a debug trace.
    pub fn dispatch(&self, ctx: &Context, event: Event, after: Option<Pending>) -> usize {
        let kind = event.kind();
        let Some(handlers) = self.handlers.get(&kind).filter(|h| !h.is_empty()) else {
            tracing::debug!(?kind, "no handler registered; event dropped");
            return 0;
        };
        let handlers = handlers.clone();
        let count = handlers.len();
        let ctx = ctx.clone();

        match after {
            None => spawn_all(handlers, ctx, event),
            Some(pending) => {
                tokio::spawn(async move {
                    // Cache errors are already logged by the feed.
                    let _ = pending.wait().await;
                    spawn_all(handlers, ctx, event);
                });
            }
        }
        count
    }
}

fn spawn_all(handlers: Vec<Handler>, ctx: Context, event: Event) {
    for handler in handlers {
        tokio::spawn(handler(ctx.clone(), event.clone()));
    }
}

impl fmt::Debug for EventRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts: HashMap<_, _> = self.handlers.iter().map(|(k, v)| (k, v.len())).collect();
        f.debug_struct("EventRouter").field("handlers", &counts).finish()
    }
}

/// Turns frames into cache updates, audio forwards, and handler tasks.
pub(crate) struct Dispatcher {
    router: Arc<EventRouter>,
    feed: PresenceFeed,
    audio: Option<Arc<dyn AudioBackend>>,
}

impl Dispatcher {
    pub(crate) fn new(
        router: Arc<EventRouter>,
        feed: PresenceFeed,
        audio: Option<Arc<dyn AudioBackend>>,
    ) -> Self {
        Self { router, feed, audio }
    }

    pub(crate) fn feed(&self) -> &PresenceFeed {
        &self.feed
    }

    pub(crate) fn audio(&self) -> Option<Arc<dyn AudioBackend>> {
        self.audio.clone()
    }

    /// Routes one frame. Never blocks: cache writes are queued on the feed
    /// and everything else runs in spawned tasks.
    pub(crate) fn dispatch(&self, ctx: &Context, frame: Frame) {
        let name = frame.event.as_deref();
        if let (Some(audio), Some(events::VOICE_STATE_UPDATE | events::VOICE_SERVER_UPDATE)) =
            (&self.audio, name)
        {
            let audio = Arc::clone(audio);
            let frame = frame.clone();
            tokio::spawn(async move { audio.voice_update(frame).await });
        }

        let event = match Event::from_frame(&frame) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(error = %e, "dropping event with unexpected payload");
                return;
            }
        };

        let applied = match &event {
            Event::RoomSnapshot(snapshot) => {
                let records = snapshot
                    .voice_states
                    .iter()
                    .map(|state| ParticipantRecord::from_voice_state(snapshot.id.clone(), state))
                    .collect();
                Some(self.feed.snapshot(snapshot.id.clone(), records))
            }
            Event::ParticipantUpdate(state) => match &state.guild_id {
                Some(room) => Some(
                    self.feed
                        .delta(ParticipantRecord::from_voice_state(room.clone(), state)),
                ),
                None => {
                    tracing::debug!(
                        participant_id = %state.user_id,
                        "voice state without room; cache untouched"
                    );
                    None
                }
            },
            _ => None,
        };

        self.router.dispatch(ctx, event, applied);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wavegate_protocol::OpCode;

    #[test]
    fn test_from_frame_known_events() {
        let ready = Frame::dispatch(
            "READY",
            1,
            json!({"session_id": "abc", "user": {"id": "42"}}),
        );
        assert_eq!(Event::from_frame(&ready).unwrap().kind(), EventKind::Ready);

        let update = Frame::dispatch(
            "VOICE_STATE_UPDATE",
            2,
            json!({"guild_id": "R1", "user_id": "A", "channel_id": null}),
        );
        assert_eq!(
            Event::from_frame(&update).unwrap().kind(),
            EventKind::ParticipantUpdate
        );
    }

    #[test]
    fn test_from_frame_unknown_event_is_unrecognized() {
        let frame = Frame::dispatch("SOMETHING_NEW", 3, json!({"x": 1}));
        match Event::from_frame(&frame).unwrap() {
            Event::Unrecognized { name, payload } => {
                assert_eq!(name, "SOMETHING_NEW");
                assert_eq!(payload["x"], 1);
            }
            other => panic!("expected Unrecognized, got {other:?}"),
        }
    }

    #[test]
    fn test_from_frame_unknown_op_is_unrecognized() {
        let frame = Frame::new(OpCode::Unknown(42), &json!(null)).unwrap();
        let event = Event::from_frame(&frame).unwrap();
        assert_eq!(event.kind(), EventKind::Unrecognized);
    }

    #[test]
    fn test_from_frame_bad_payload_is_error() {
        let frame = Frame::dispatch("GUILD_CREATE", 4, json!({"voice_states": []}));
        assert!(Event::from_frame(&frame).is_err());
    }

    #[test]
    fn test_register_keeps_handlers_per_kind() {
        let mut router = EventRouter::new();
        router
            .register(EventKind::Ready, |_, _| async {})
            .register(EventKind::Ready, |_, _| async {})
            .register(EventKind::Unrecognized, |_, _| async {});

        assert_eq!(router.handler_count(EventKind::Ready), 2);
        assert_eq!(router.handler_count(EventKind::Unrecognized), 1);
        assert_eq!(router.handler_count(EventKind::MessageReceived), 0);
    }
}
