//! Typed payloads carried in the `d` field of gateway frames.
//!
//! Inbound payloads only declare the fields this library reads; serde
//! ignores the rest, so gateway additions never break decoding.

use std::fmt;
use std::ops::BitOr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Identifier of a room (a guild). Gateways send snowflakes as strings.
///
/// `#[serde(transparent)]` makes `RoomId("81384788765712384")` travel as
/// the bare string, not as `{"0": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub String);

/// Identifier of a participant (a user).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(pub String);

/// Identifier of a channel inside a room.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(pub String);

macro_rules! string_id {
    ($($ty:ident),*) => {$(
        impl $ty {
            /// Returns the id as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $ty {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }

        impl From<String> for $ty {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    )*};
}

string_id!(RoomId, ParticipantId, ChannelId);

// ---------------------------------------------------------------------------
// Intents
// ---------------------------------------------------------------------------

/// Bitmask selecting which event groups the gateway should send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Intents(u64);

impl Intents {
    /// Room create, update and delete events.
    pub const GUILDS: Self = Self(1 << 0);
    /// Member joins, leaves and chunks. Privileged.
    pub const GUILD_MEMBERS: Self = Self(1 << 1);
    /// `VOICE_STATE_UPDATE`.
    pub const GUILD_VOICE_STATES: Self = Self(1 << 7);
    /// Presence updates. Privileged.
    pub const GUILD_PRESENCES: Self = Self(1 << 8);
    /// Messages posted in rooms.
    pub const GUILD_MESSAGES: Self = Self(1 << 9);
    /// Direct messages.
    pub const DIRECT_MESSAGES: Self = Self(1 << 12);
    /// Message text. Privileged.
    pub const MESSAGE_CONTENT: Self = Self(1 << 15);

    /// Creates an intents mask from raw bits. Unknown bits are kept.
    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    /// Returns the raw bitmask.
    pub const fn bits(self) -> u64 {
        self.0
    }

    /// Returns `true` if every bit of `other` is set in `self`.
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

/// Guilds, members, voice states and guild messages (643).
impl Default for Intents {
    fn default() -> Self {
        Self::GUILDS | Self::GUILD_MEMBERS | Self::GUILD_VOICE_STATES | Self::GUILD_MESSAGES
    }
}

impl BitOr for Intents {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

// ---------------------------------------------------------------------------
// Outbound payloads
// ---------------------------------------------------------------------------

/// Client identity metadata sent with Identify.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionProperties {
    /// Operating system name.
    pub os: String,
    /// Library name.
    pub browser: String,
    /// Library name again; gateways expect both.
    pub device: String,
}

impl Default for ConnectionProperties {
    fn default() -> Self {
        Self {
            os: std::env::consts::OS.to_owned(),
            browser: "wavegate".to_owned(),
            device: "wavegate".to_owned(),
        }
    }
}

/// Op 2 payload: start a fresh session.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identify {
    /// Bot token, without the `Bot ` prefix.
    pub token: String,
    /// Event groups to subscribe to.
    pub intents: Intents,
    /// Client metadata.
    pub properties: ConnectionProperties,
}

impl fmt::Debug for Identify {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identify")
            .field("token", &"[REDACTED]")
            .field("intents", &self.intents)
            .field("properties", &self.properties)
            .finish()
    }
}

/// Op 6 payload: resume a dropped session from `seq`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resume {
    /// Bot token, without the `Bot ` prefix.
    pub token: String,
    /// Session id from `READY`.
    pub session_id: String,
    /// Last sequence number received.
    pub seq: u64,
}

impl fmt::Debug for Resume {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resume")
            .field("token", &"[REDACTED]")
            .field("session_id", &self.session_id)
            .field("seq", &self.seq)
            .finish()
    }
}

/// Op 4 payload: join, move to, or (with `channel_id: None`) leave a voice
/// channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceStateUpdate {
    /// Room the voice channel belongs to.
    pub guild_id: RoomId,
    /// Serialized as `null` when leaving; the field must be present.
    pub channel_id: Option<ChannelId>,
    /// Join muted.
    pub self_mute: bool,
    /// Join deafened.
    pub self_deaf: bool,
}

/// Online status reported with a presence update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Online,
    /// Away.
    Idle,
    /// Do not disturb.
    Dnd,
    /// Shown as offline.
    Invisible,
}

/// An activity shown in the client's presence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activity {
    /// Text shown after the activity verb.
    pub name: String,
    /// Activity type; 0 is "Playing".
    #[serde(rename = "type")]
    pub kind: u8,
}

/// Op 3 payload: update the client's presence.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PresenceUpdate {
    /// Unix time (ms) since the client went idle, or `None`.
    pub since: Option<u64>,
    /// Activities to show, possibly empty.
    pub activities: Vec<Activity>,
    /// Online status.
    pub status: Status,
    /// Whether the client is away.
    pub afk: bool,
}

/// Op 8 payload: ask the gateway to stream a room's members.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestMembers {
    /// Room to list.
    pub guild_id: RoomId,
    /// Username prefix; empty matches everyone.
    pub query: String,
    /// Maximum members to return; 0 means no limit with an empty query.
    pub limit: u32,
}

// ---------------------------------------------------------------------------
// Inbound payloads
// ---------------------------------------------------------------------------

/// Op 10 payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hello {
    /// Milliseconds between heartbeats.
    pub heartbeat_interval: u64,
}

impl Hello {
    /// The heartbeat interval as a `Duration`.
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval)
    }
}

/// A user object, reduced to what the session needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// User id.
    pub id: ParticipantId,
    /// Display username, when the gateway includes it.
    #[serde(default)]
    pub username: Option<String>,
}

/// `READY` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ready {
    /// Id to resume this session with.
    pub session_id: String,
    /// The connected user.
    pub user: User,
    /// Where to reconnect for a resume, if the gateway names one.
    #[serde(default)]
    pub resume_gateway_url: Option<String>,
}

/// One participant's voice membership, as carried by `GUILD_CREATE` (inside
/// `voice_states`) and `VOICE_STATE_UPDATE`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceState {
    /// Omitted inside `GUILD_CREATE`, where the room is implied.
    #[serde(default)]
    pub guild_id: Option<RoomId>,
    /// Whose voice state this is.
    pub user_id: ParticipantId,
    /// `None` means the participant left voice.
    pub channel_id: Option<ChannelId>,
    /// Voice session id.
    #[serde(default)]
    pub session_id: Option<String>,
    /// Muted by the participant.
    #[serde(default)]
    pub self_mute: bool,
    /// Deafened by the participant.
    #[serde(default)]
    pub self_deaf: bool,
}

/// `GUILD_CREATE` payload: the room snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomSnapshot {
    /// The room.
    pub id: RoomId,
    /// Everyone in voice when the snapshot was taken.
    #[serde(default)]
    pub voice_states: Vec<VoiceState>,
}

/// `MESSAGE_CREATE` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageCreate {
    /// Message id.
    pub id: String,
    /// Channel the message was posted in.
    pub channel_id: ChannelId,
    /// `None` for direct messages.
    #[serde(default)]
    pub guild_id: Option<RoomId>,
    /// Empty without the `MESSAGE_CONTENT` intent.
    #[serde(default)]
    pub content: String,
    /// Who posted it.
    pub author: User,
}

/// The command part of an interaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionData {
    /// Command name.
    pub name: String,
}

/// A room member, reduced to its user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    /// The member's user.
    pub user: User,
}

/// `INTERACTION_CREATE` payload.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionCreate {
    /// Interaction id.
    pub id: String,
    /// Short-lived token for answering this interaction.
    pub token: String,
    /// Room, when invoked inside one.
    #[serde(default)]
    pub guild_id: Option<RoomId>,
    /// Channel the command was run in.
    #[serde(default)]
    pub channel_id: Option<ChannelId>,
    /// The invoked command.
    #[serde(default)]
    pub data: Option<InteractionData>,
    /// The invoker, when invoked inside a room.
    #[serde(default)]
    pub member: Option<Member>,
}

impl InteractionCreate {
    /// The invoking user, when the interaction came from a room.
    pub fn invoker(&self) -> Option<&ParticipantId> {
        self.member.as_ref().map(|m| &m.user.id)
    }
}

impl fmt::Debug for InteractionCreate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InteractionCreate")
            .field("id", &self.id)
            .field("token", &"[REDACTED]")
            .field("guild_id", &self.guild_id)
            .field("channel_id", &self.channel_id)
            .field("data", &self.data)
            .field("member", &self.member)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_ids_serialize_as_plain_strings() {
        let json = serde_json::to_string(&RoomId::from("81384788765712384")).unwrap();
        assert_eq!(json, "\"81384788765712384\"");
        assert_eq!(ParticipantId::from("A").to_string(), "A");
    }

    #[test]
    fn test_default_intents_match_classic_bot_mask() {
        assert_eq!(Intents::default().bits(), 643);
        assert!(Intents::default().contains(Intents::GUILD_VOICE_STATES));
        assert!(!Intents::default().contains(Intents::MESSAGE_CONTENT));
    }

    #[test]
    fn test_identify_json_format() {
        let identify = Identify {
            token: "secret".into(),
            intents: Intents::default(),
            properties: ConnectionProperties {
                os: "linux".into(),
                browser: "wavegate".into(),
                device: "wavegate".into(),
            },
        };
        let json = serde_json::to_value(&identify).unwrap();
        assert_eq!(json["token"], "secret");
        assert_eq!(json["intents"], 643);
        assert_eq!(json["properties"]["os"], "linux");
        assert_eq!(json["properties"]["device"], "wavegate");
    }

    #[test]
    fn test_identify_debug_redacts_token() {
        let identify = Identify {
            token: "super-secret".into(),
            intents: Intents::default(),
            properties: ConnectionProperties::default(),
        };
        let debug = format!("{identify:?}");
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn test_voice_state_update_leave_serializes_null_channel() {
        let update = VoiceStateUpdate {
            guild_id: "1".into(),
            channel_id: None,
            self_mute: false,
            self_deaf: true,
        };
        let json = serde_json::to_value(&update).unwrap();
        assert!(json.get("channel_id").is_some(), "field must be present");
        assert!(json["channel_id"].is_null());
        assert_eq!(json["self_deaf"], true);
    }

    #[test]
    fn test_presence_status_is_lowercase() {
        let presence = PresenceUpdate {
            status: Status::Dnd,
            ..PresenceUpdate::default()
        };
        let json = serde_json::to_value(&presence).unwrap();
        assert_eq!(json["status"], "dnd");
        assert!(json["since"].is_null());
    }

    #[test]
    fn test_hello_interval_converts_millis() {
        let hello: Hello = serde_json::from_value(json!({"heartbeat_interval": 41250})).unwrap();
        assert_eq!(hello.interval(), Duration::from_millis(41_250));
    }

    #[test]
    fn test_room_snapshot_ignores_unknown_fields() {
        let snapshot: RoomSnapshot = serde_json::from_value(json!({
            "id": "R1",
            "name": "a room",
            "joined_at": "2021-08-01T00:00:00+00:00",
            "voice_states": [
                {"user_id": "A", "channel_id": "C1", "session_id": "s", "deaf": false}
            ]
        }))
        .unwrap();
        assert_eq!(snapshot.id, RoomId::from("R1"));
        assert_eq!(snapshot.voice_states.len(), 1);
        assert_eq!(snapshot.voice_states[0].guild_id, None);
        assert_eq!(snapshot.voice_states[0].channel_id, Some(ChannelId::from("C1")));
    }

    #[test]
    fn test_room_snapshot_without_voice_states_is_empty() {
        let snapshot: RoomSnapshot = serde_json::from_value(json!({"id": "R1"})).unwrap();
        assert!(snapshot.voice_states.is_empty());
    }

    #[test]
    fn test_voice_state_null_channel_means_left() {
        let state: VoiceState = serde_json::from_value(json!({
            "guild_id": "R1", "user_id": "A", "channel_id": null
        }))
        .unwrap();
        assert_eq!(state.channel_id, None);
        assert!(!state.self_mute);
    }

    #[test]
    fn test_interaction_invoker_comes_from_member() {
        let interaction: InteractionCreate = serde_json::from_value(json!({
            "id": "9", "token": "tok", "guild_id": "R1",
            "data": {"name": "play"},
            "member": {"user": {"id": "A", "username": "alice"}}
        }))
        .unwrap();
        assert_eq!(interaction.invoker(), Some(&ParticipantId::from("A")));
        assert_eq!(interaction.data.as_ref().map(|d| d.name.as_str()), Some("play"));
        assert!(!format!("{interaction:?}").contains("tok\""));
    }
}
