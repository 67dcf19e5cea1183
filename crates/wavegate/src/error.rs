//! Unified error type for the Wavegate client.

use wavegate_heartbeat::HeartbeatError;
use wavegate_presence::PresenceError;
use wavegate_protocol::ProtocolError;
use wavegate_session::{ConfigError, SessionError};
use wavegate_transport::TransportError;

use crate::rest::RestError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant lets `?` convert sub-crate
/// errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// A transport-level error (connect, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, payload shape).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A session-level error (auth rejected, reconnects exhausted).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A configuration error.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A participant cache error.
    #[error(transparent)]
    Presence(#[from] PresenceError),

    /// The heartbeat could not be started.
    #[error(transparent)]
    Heartbeat(#[from] HeartbeatError),

    /// A REST call failed.
    #[error(transparent)]
    Rest(#[from] RestError),

    /// The client has shut down; the command was not sent.
    #[error("gateway client is closed")]
    Closed,
}

impl GatewayError {
    /// `true` for errors that end the session for good.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Session(
                SessionError::AuthRejected { .. }
                    | SessionError::Rejected { .. }
                    | SessionError::ReconnectExhausted { .. }
            ) | Self::Config(_)
                | Self::Closed
        )
    }
}
