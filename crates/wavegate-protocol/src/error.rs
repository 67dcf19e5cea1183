//! Error types for the protocol layer.
//!
//! When you see a `ProtocolError`, the problem is in turning text into
//! frames (or frames into typed payloads), not in networking or session
//! state.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serializing an outbound frame failed.
    #[error("encode failed: {0}")]
    Encode(#[source] serde_json::Error),

    /// The inbound text is not a well-formed frame.
    ///
    /// Either it is not JSON at all, it is not an object, or it has no
    /// usable `op` field. The session logs and drops such frames.
    #[error("malformed frame: {0}")]
    MalformedFrame(#[source] serde_json::Error),

    /// The frame decoded, but its payload does not have the shape its
    /// operation code or event name promises.
    #[error("invalid payload for {context}: {source}")]
    InvalidPayload {
        /// The op code or event name whose payload was being decoded.
        context: String,
        /// The underlying deserialization error.
        #[source]
        source: serde_json::Error,
    },
}
