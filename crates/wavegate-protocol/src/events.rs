//! Gateway dispatch event names (the `t` field).

/// The session is established.
pub const READY: &str = "READY";
/// A resume replayed everything that was missed.
pub const RESUMED: &str = "RESUMED";
/// A room became available, with its voice states.
pub const GUILD_CREATE: &str = "GUILD_CREATE";
/// Someone joined, moved within, or left voice.
pub const VOICE_STATE_UPDATE: &str = "VOICE_STATE_UPDATE";
/// Voice server assignment for this client.
pub const VOICE_SERVER_UPDATE: &str = "VOICE_SERVER_UPDATE";
/// A message was posted.
pub const MESSAGE_CREATE: &str = "MESSAGE_CREATE";
/// A slash command or component was used.
pub const INTERACTION_CREATE: &str = "INTERACTION_CREATE";
