/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The remote peer closed the connection with a close frame.
    ///
    /// `code` is the WebSocket close code, if the peer sent one. Gateways
    /// use application codes (4000–4999) to explain why a session ended.
    #[error("connection closed (code {code:?}): {reason}")]
    ConnectionClosed {
        /// The close code sent by the peer.
        code: Option<u16>,
        /// The close reason sent by the peer (may be empty).
        reason: String,
    },

    /// Opening the connection failed.
    #[error("connect failed: {0}")]
    ConnectFailed(#[source] std::io::Error),

    /// Sending data failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Receiving data failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    /// The connection was already closed locally.
    #[error("transport shut down")]
    Shutdown,
}

impl TransportError {
    /// Returns the peer's close code, if this error carries one.
    pub fn close_code(&self) -> Option<u16> {
        match self {
            Self::ConnectionClosed { code, .. } => *code,
            _ => None,
        }
    }
}
