//! Gateway close codes and what a client should do about them.

/// What the session should do after the gateway closed the socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseDisposition {
    /// Transient: reconnect and resume if resume credentials exist.
    Resume,
    /// The server-side session is gone: reconnect with a fresh Identify.
    Reidentify,
    /// The credentials were rejected. Retrying cannot help.
    AuthRejected,
    /// The client's configuration was rejected. Retrying cannot help.
    Rejected,
}

impl CloseDisposition {
    /// Returns `true` if the session must stop instead of reconnecting.
    pub fn is_fatal(self) -> bool {
        matches!(self, Self::AuthRejected | Self::Rejected)
    }
}

/// Authentication failed: the token is invalid.
pub const AUTHENTICATION_FAILED: u16 = 4004;
/// The sequence sent with Resume was invalid.
pub const INVALID_SEQ: u16 = 4007;
/// The session timed out on the server side.
pub const SESSION_TIMED_OUT: u16 = 4009;
/// Invalid shard.
pub const INVALID_SHARD: u16 = 4010;
/// Sharding required.
pub const SHARDING_REQUIRED: u16 = 4011;
/// Invalid API version.
pub const INVALID_API_VERSION: u16 = 4012;
/// Invalid intents.
pub const INVALID_INTENTS: u16 = 4013;
/// Disallowed intents.
pub const DISALLOWED_INTENTS: u16 = 4014;

/// Classifies a close code. A missing code is a plain transport drop.
pub fn classify(code: Option<u16>) -> CloseDisposition {
    match code {
        Some(AUTHENTICATION_FAILED) => CloseDisposition::AuthRejected,
        Some(
            INVALID_SHARD
            | SHARDING_REQUIRED
            | INVALID_API_VERSION
            | INVALID_INTENTS
            | DISALLOWED_INTENTS,
        ) => CloseDisposition::Rejected,
        Some(INVALID_SEQ | SESSION_TIMED_OUT) => CloseDisposition::Reidentify,
        _ => CloseDisposition::Resume,
    }
}
