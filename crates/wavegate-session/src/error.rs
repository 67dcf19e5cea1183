//! Error types for the session layer.

use crate::SessionState;

/// Errors that can occur while driving a gateway session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// A lifecycle event arrived in a state that does not allow it, e.g. a
    /// second Hello while already `Active`.
    #[error("invalid session transition: {from} -> {to}")]
    InvalidTransition {
        /// The state the session was in.
        from: SessionState,
        /// The state the event asked for.
        to: SessionState,
    },

    /// The gateway rejected the session's credentials (Identify or Resume).
    #[error("authentication rejected by gateway (close code {code}): {reason}")]
    AuthRejected {
        /// The gateway close code.
        code: u16,
        /// The gateway close reason.
        reason: String,
    },

    /// The gateway rejected the session's configuration (intents, shard,
    /// API version).
    #[error("session rejected by gateway (close code {code}): {reason}")]
    Rejected {
        /// The gateway close code.
        code: u16,
        /// The gateway close reason.
        reason: String,
    },

    /// Every allowed reconnect attempt failed before the session became
    /// `Active` again.
    #[error("gave up reconnecting after {attempts} attempts")]
    ReconnectExhausted {
        /// How many consecutive attempts were made.
        attempts: u32,
    },
}

/// Errors that can occur while loading a [`GatewayConfig`](crate::GatewayConfig).
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required environment variable is not set.
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    /// A variable is set but cannot be parsed.
    #[error("invalid value for {name}: {value}")]
    InvalidValue {
        /// The variable name.
        name: String,
        /// The offending value.
        value: String,
    },
}
