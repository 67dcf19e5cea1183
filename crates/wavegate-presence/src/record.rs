//! The cached per-participant record.

use wavegate_protocol::{ChannelId, ParticipantId, RoomId, VoiceState};

/// One participant's voice membership in one room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParticipantRecord {
    /// The room the participant belongs to.
    pub room_id: RoomId,
    /// The participant.
    pub participant_id: ParticipantId,
    /// The voice channel, or `None` when the participant left voice.
    /// Stored records always have a channel.
    pub channel_id: Option<ChannelId>,
    /// The participant's voice session id, when the gateway sent one.
    pub session_id: Option<String>,
    /// Self-mute flag.
    pub self_mute: bool,
    /// Self-deafen flag.
    pub self_deaf: bool,
}

impl ParticipantRecord {
    /// A record with only the required fields.
    pub fn new(
        room_id: RoomId,
        participant_id: ParticipantId,
        channel_id: Option<ChannelId>,
    ) -> Self {
        Self {
            room_id,
            participant_id,
            channel_id,
            session_id: None,
            self_mute: false,
            self_deaf: false,
        }
    }

    /// Builds a record from a voice state.
    ///
    /// `room_id` wins over the state's own `guild_id`: inside a snapshot the
    /// state omits it, and the snapshot's room is the one being replaced.
    pub fn from_voice_state(room_id: RoomId, state: &VoiceState) -> Self {
        Self {
            room_id,
            participant_id: state.user_id.clone(),
            channel_id: state.channel_id.clone(),
            session_id: state.session_id.clone(),
            self_mute: state.self_mute,
            self_deaf: state.self_deaf,
        }
    }

    /// `true` if the participant is in a voice channel.
    pub fn is_connected(&self) -> bool {
        self.channel_id.is_some()
    }
}
