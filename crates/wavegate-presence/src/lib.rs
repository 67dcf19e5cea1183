//! Voice participant cache for Wavegate.
//!
//! Tracks which participant is in which voice channel of which room,
//! built from two event kinds: a bulk snapshot per room and incremental
//! per-participant deltas.
//!
//! # Key types
//!
//! - [`ParticipantCache`]: the shared room → participant → record table
//! - [`PresenceFeed`]: applies writes in receipt order on its own task
//! - [`ParticipantRecord`]: one participant's membership
//! - [`PresenceError`]: `UnknownRoom` for rooms no snapshot has created

mod cache;
mod error;
mod feed;
mod record;

pub use cache::{DeltaOutcome, ParticipantCache};
pub use error::PresenceError;
pub use feed::{Applied, Pending, PresenceCommand, PresenceFeed, spawn_feed};
pub use record::ParticipantRecord;
