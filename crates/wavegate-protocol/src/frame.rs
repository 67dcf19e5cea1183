//! The gateway frame: the top-level wire format.
//!
//! Every message on the gateway socket is a JSON object with up to four
//! fields:
//!
//! ```text
//! { "op": 0, "d": { ... }, "s": 42, "t": "VOICE_STATE_UPDATE" }
//!    │        │             │        └─ event name   (dispatch only)
//!    │        │             └────────── sequence no. (dispatch only)
//!    │        └──────────────────────── payload      (shape depends on op/t)
//!    └───────────────────────────────── operation code
//! ```

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// OpCode
// ---------------------------------------------------------------------------

/// A gateway operation code.
///
/// Codes the library does not know are kept as [`OpCode::Unknown`] instead of
/// failing to decode, so a gateway that grows new operations cannot crash an
/// older client.
///
/// `#[serde(from = "u64", into = "u64")]` makes the enum travel as a plain
/// integer (`"op": 10`) rather than as a variant name. Any non-negative
/// integer is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "u64", into = "u64")]
pub enum OpCode {
    /// Server → client: an application event with a sequence number.
    Dispatch,
    /// Either direction: liveness beacon carrying the last sequence number.
    Heartbeat,
    /// Client → server: start a new session.
    Identify,
    /// Client → server: update the client's presence.
    PresenceUpdate,
    /// Client → server: join, move between, or leave voice channels.
    VoiceStateUpdate,
    /// Client → server: voice region ping (legacy).
    VoicePing,
    /// Client → server: resume a dropped session.
    Resume,
    /// Server → client: reconnect and resume.
    Reconnect,
    /// Client → server: request guild members.
    RequestMembers,
    /// Server → client: the session is invalid; `d` says if it is resumable.
    InvalidateSession,
    /// Server → client: first frame, carries the heartbeat interval.
    Hello,
    /// Server → client: a heartbeat was received.
    HeartbeatAck,
    /// Client → server: guild sync (legacy).
    GuildSync,
    /// Any code this library does not know.
    Unknown(u64),
}

impl OpCode {
    /// Returns `true` for frames that carry a named event and sequence number.
    pub fn is_dispatch(self) -> bool {
        matches!(self, Self::Dispatch)
    }
}

impl From<u64> for OpCode {
    fn from(code: u64) -> Self {
        match code {
            0 => Self::Dispatch,
            1 => Self::Heartbeat,
            2 => Self::Identify,
            3 => Self::PresenceUpdate,
            4 => Self::VoiceStateUpdate,
            5 => Self::VoicePing,
            6 => Self::Resume,
            7 => Self::Reconnect,
            8 => Self::RequestMembers,
            9 => Self::InvalidateSession,
            10 => Self::Hello,
            11 => Self::HeartbeatAck,
            12 => Self::GuildSync,
            other => Self::Unknown(other),
        }
    }
}

impl From<OpCode> for u64 {
    fn from(op: OpCode) -> Self {
        match op {
            OpCode::Dispatch => 0,
            OpCode::Heartbeat => 1,
            OpCode::Identify => 2,
            OpCode::PresenceUpdate => 3,
            OpCode::VoiceStateUpdate => 4,
            OpCode::VoicePing => 5,
            OpCode::Resume => 6,
            OpCode::Reconnect => 7,
            OpCode::RequestMembers => 8,
            OpCode::InvalidateSession => 9,
            OpCode::Hello => 10,
            OpCode::HeartbeatAck => 11,
            OpCode::GuildSync => 12,
            OpCode::Unknown(other) => other,
        }
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown(code) => write!(f, "Unknown({code})"),
            other => write!(f, "{other:?}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Frame
// ---------------------------------------------------------------------------

/// One decoded gateway message.
///
/// Frames are immutable once decoded; the session reads `op`/`s`/`t` and
/// hands the payload to whoever understands it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    /// The operation code. Required; a frame without one is malformed.
    pub op: OpCode,

    /// The payload. Missing payloads decode as `null`. Always serialized,
    /// because a heartbeat with no sequence yet must still send `"d": null`.
    #[serde(rename = "d", default)]
    pub payload: Value,

    /// Sequence number, present only on dispatch frames.
    #[serde(rename = "s", default, skip_serializing_if = "Option::is_none")]
    pub seq: Option<u64>,

    /// Event name, present only on dispatch frames.
    #[serde(rename = "t", default, skip_serializing_if = "Option::is_none")]
    pub event: Option<String>,
}

impl Frame {
    /// Builds an outbound control frame (no sequence, no event name).
    pub fn new<T: Serialize>(op: OpCode, payload: &T) -> Result<Self, ProtocolError> {
        let payload = serde_json::to_value(payload).map_err(ProtocolError::Encode)?;
        Ok(Self {
            op,
            payload,
            seq: None,
            event: None,
        })
    }

    /// Builds a heartbeat carrying the last observed sequence number.
    pub fn heartbeat(seq: Option<u64>) -> Self {
        Self {
            op: OpCode::Heartbeat,
            payload: seq.map_or(Value::Null, Value::from),
            seq: None,
            event: None,
        }
    }

    /// Builds a dispatch frame. Gateways send these; tests build them.
    pub fn dispatch(event: impl Into<String>, seq: u64, payload: Value) -> Self {
        Self {
            op: OpCode::Dispatch,
            payload,
            seq: Some(seq),
            event: Some(event.into()),
        }
    }

    /// Decodes the payload into a typed structure.
    ///
    /// # Errors
    /// Returns [`ProtocolError::InvalidPayload`] naming the event (or the
    /// op code for control frames) when the payload has the wrong shape.
    pub fn payload_as<T: DeserializeOwned>(&self) -> Result<T, ProtocolError> {
        T::deserialize(&self.payload)
            .map_err(|source| ProtocolError::InvalidPayload { context: self.context(), source })
    }

    /// A short human-readable label for logs: the event name for dispatch
    /// frames, the op code otherwise.
    pub fn context(&self) -> String {
        match &self.event {
            Some(name) => name.clone(),
            None => self.op.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_opcode_known_codes_map_both_ways() {
        for code in 0u64..=12 {
            let op = OpCode::from(code);
            assert!(!matches!(op, OpCode::Unknown(_)), "code {code} is known");
            assert_eq!(u64::from(op), code);
        }
    }

    #[test]
    fn test_opcode_unknown_code_is_preserved() {
        let op = OpCode::from(42);
        assert_eq!(op, OpCode::Unknown(42));
        assert_eq!(u64::from(op), 42);
        assert_eq!(op.to_string(), "Unknown(42)");
    }

    #[test]
    fn test_frame_serializes_op_as_integer() {
        let frame = Frame::new(OpCode::Hello, &json!({"heartbeat_interval": 1})).unwrap();
        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(json["op"], 10);
        assert!(json.get("s").is_none(), "control frames omit s");
        assert!(json.get("t").is_none(), "control frames omit t");
    }

    #[test]
    fn test_heartbeat_without_seq_sends_explicit_null() {
        let json = serde_json::to_string(&Frame::heartbeat(None)).unwrap();
        assert_eq!(json, r#"{"op":1,"d":null}"#);
    }

    #[test]
    fn test_heartbeat_with_seq_carries_it_verbatim() {
        let json = serde_json::to_string(&Frame::heartbeat(Some(57))).unwrap();
        assert_eq!(json, r#"{"op":1,"d":57}"#);
    }

    #[test]
    fn test_frame_missing_payload_defaults_to_null() {
        let frame: Frame = serde_json::from_str(r#"{"op":11}"#).unwrap();
        assert_eq!(frame.op, OpCode::HeartbeatAck);
        assert!(frame.payload.is_null());
    }

    #[test]
    fn test_payload_as_reports_event_name_on_shape_error() {
        let frame = Frame::dispatch("GUILD_CREATE", 3, json!("not an object"));
        let err = frame.payload_as::<std::collections::HashMap<String, u64>>().unwrap_err();
        assert!(err.to_string().contains("GUILD_CREATE"));
    }
}
