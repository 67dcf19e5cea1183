//! Error types for the presence layer.

use wavegate_protocol::RoomId;

/// Errors that can occur during cache operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PresenceError {
    /// No snapshot has ever been applied for this room.
    #[error("room {0} has not been initialized by a snapshot")]
    UnknownRoom(RoomId),

    /// The presence feed task is gone.
    #[error("presence feed is closed")]
    FeedClosed,
}
