//! Last-seen dispatch sequence number.

use std::sync::atomic::{AtomicU64, Ordering};

/// The highest dispatch sequence number seen on the current session.
///
/// Shared between the read loop (writer) and the heartbeat task (reader),
/// so it is a lock-free atomic. `0` encodes "nothing seen yet"; gateways
/// number dispatches from 1.
///
/// The value never moves backward: a late or replayed dispatch with a
/// lower number is ignored. A new session instance gets a new tracker
/// instead of resetting this one, so a heartbeat still holding the old
/// tracker can never report a number from the new session.
#[derive(Debug, Default)]
pub struct SequenceTracker {
    last: AtomicU64,
}

impl SequenceTracker {
    /// Creates a tracker that has seen nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a dispatch sequence number. Returns `true` if it advanced
    /// the tracker.
    pub fn observe(&self, seq: u64) -> bool {
        let previous = self.last.fetch_max(seq, Ordering::AcqRel);
        if seq < previous {
            tracing::debug!(seq, last = previous, "ignoring out-of-order sequence number");
        }
        seq > previous
    }

    /// The last sequence number, or `None` before the first dispatch.
    pub fn get(&self) -> Option<u64> {
        match self.last.load(Ordering::Acquire) {
            0 => None,
            seq => Some(seq),
        }
    }
}
