//! Codec trait and the JSON implementation.
//!
//! A "codec" (coder/decoder) converts between [`Frame`]s and the text that
//! travels on the socket. The session layer only depends on the [`Codec`]
//! trait, so a compressed or ETF-encoded gateway could be supported by adding
//! an implementation without touching the session code.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Frame, OpCode, ProtocolError};

/// Converts frames to and from wire text.
///
/// `Send + Sync + 'static` because a single codec is shared between the read
/// loop, the heartbeat task, and handler tasks.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a frame into wire text.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Encode`] if the payload cannot be represented.
    fn encode(&self, frame: &Frame) -> Result<String, ProtocolError>;

    /// Parses wire text into a frame.
    ///
    /// # Errors
    /// Returns [`ProtocolError::MalformedFrame`] if the text is not a
    /// well-formed frame or has no `op`. Unknown op codes and event names
    /// are *not* errors.
    fn decode(&self, text: &str) -> Result<Frame, ProtocolError>;

    /// Builds and serializes a control frame in one step.
    fn encode_op<T: Serialize>(&self, op: OpCode, payload: &T) -> Result<String, ProtocolError> {
        self.encode(&Frame::new(op, payload)?)
    }
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] for gateways connected with `encoding=json`.
///
/// ## Example
///
/// ```rust
/// use wavegate_protocol::{Codec, Frame, JsonCodec, OpCode};
///
/// let codec = JsonCodec;
///
/// let frame = codec
///     .decode(r#"{"op":10,"d":{"heartbeat_interval":41250}}"#)
///     .unwrap();
/// assert_eq!(frame.op, OpCode::Hello);
///
/// let text = codec.encode(&Frame::heartbeat(Some(7))).unwrap();
/// assert_eq!(text, r#"{"op":1,"d":7}"#);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode(&self, frame: &Frame) -> Result<String, ProtocolError> {
        serde_json::to_string(frame).map_err(ProtocolError::Encode)
    }

    fn decode(&self, text: &str) -> Result<Frame, ProtocolError> {
        // Only the object form is a frame; serde would also accept an array.
        let value: Value = serde_json::from_str(text).map_err(ProtocolError::MalformedFrame)?;
        if !value.is_object() {
            return Err(ProtocolError::MalformedFrame(serde::de::Error::custom(
                "frame must be a JSON object",
            )));
        }
        Frame::deserialize(value).map_err(ProtocolError::MalformedFrame)
    }
}
