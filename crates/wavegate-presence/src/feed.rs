//! The presence feed: a single task that applies cache writes in order.
//!
//! The read loop hands every snapshot and delta to the feed as it decodes
//! them. Submitting never blocks (the channel is unbounded), and the feed
//! task applies commands one at a time, so the cache always reflects the
//! frames in the order they arrived even though the handlers that react to
//! them run concurrently.

use tokio::sync::{mpsc, oneshot};
use wavegate_protocol::RoomId;

use crate::{DeltaOutcome, ParticipantCache, ParticipantRecord, PresenceError};

/// A write the feed applies to the cache.
#[derive(Debug)]
pub enum PresenceCommand {
    /// Replace one room's table.
    Snapshot {
        /// The room.
        room: RoomId,
        /// Its participants.
        records: Vec<ParticipantRecord>,
    },
    /// Change one participant.
    Delta(ParticipantRecord),
    /// Drop every room.
    Clear,
}

/// Result of an applied command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied {
    /// A snapshot stored this many participants.
    Snapshot(usize),
    /// A delta had this effect.
    Delta(DeltaOutcome),
    /// A clear dropped this many rooms.
    Cleared(usize),
}

struct Envelope {
    command: PresenceCommand,
    reply: oneshot::Sender<Result<Applied, PresenceError>>,
}

/// Completion of a submitted command.
///
/// Dropping it does not cancel the command; the feed applies it anyway.
#[derive(Debug)]
#[must_use = "await `wait` to learn when the command was applied"]
pub struct Pending(oneshot::Receiver<Result<Applied, PresenceError>>);

impl Pending {
    /// Waits until the feed has applied the command.
    ///
    /// # Errors
    /// The cache error for the command, or [`PresenceError::FeedClosed`] if
    /// the feed stopped before applying it.
    pub async fn wait(self) -> Result<Applied, PresenceError> {
        self.0.await.map_err(|_| PresenceError::FeedClosed)?
    }
}

/// Handle to a running presence feed. Cheap to clone.
///
/// The feed task ends once every handle is dropped.
#[derive(Debug, Clone)]
pub struct PresenceFeed {
    sender: mpsc::UnboundedSender<Envelope>,
    cache: ParticipantCache,
}

impl std::fmt::Debug for Envelope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Envelope").field("command", &self.command).finish()
    }
}

impl PresenceFeed {
    /// Queues a command. Commands are applied in submission order.
    pub fn submit(&self, command: PresenceCommand) -> Pending {
        let (reply, rx) = oneshot::channel();
        if self.sender.send(Envelope { command, reply }).is_err() {
            tracing::warn!("presence feed closed; command dropped");
        }
        Pending(rx)
    }

    /// Queues a room snapshot.
    pub fn snapshot(&self, room: RoomId, records: Vec<ParticipantRecord>) -> Pending {
        self.submit(PresenceCommand::Snapshot { room, records })
    }

    /// Queues a participant delta.
    pub fn delta(&self, record: ParticipantRecord) -> Pending {
        self.submit(PresenceCommand::Delta(record))
    }

    /// Queues a clear of the whole cache.
    pub fn clear(&self) -> Pending {
        self.submit(PresenceCommand::Clear)
    }

    /// The cache this feed writes to.
    pub fn cache(&self) -> &ParticipantCache {
        &self.cache
    }
}

/// Spawns the feed task for `cache` and returns its handle.
pub fn spawn_feed(cache: ParticipantCache) -> PresenceFeed {
    let (sender, receiver) = mpsc::unbounded_channel();
    tokio::spawn(run(cache.clone(), receiver));
    PresenceFeed { sender, cache }
}

async fn run(cache: ParticipantCache, mut receiver: mpsc::UnboundedReceiver<Envelope>) {
    tracing::debug!("presence feed started");

    while let Some(Envelope { command, reply }) = receiver.recv().await {
        let result = match command {
            PresenceCommand::Snapshot { room, records } => {
                Ok(Applied::Snapshot(cache.apply_snapshot(room, records).await))
            }
            PresenceCommand::Delta(record) => {
                let room = record.room_id.clone();
                let participant = record.participant_id.clone();
                cache.apply_delta(record).await.map(Applied::Delta).inspect_err(|e| {
                    tracing::warn!(
                        room_id = %room,
                        participant_id = %participant,
                        error = %e,
                        "participant update for uninitialized room ignored"
                    );
                })
            }
            PresenceCommand::Clear => Ok(Applied::Cleared(cache.clear().await)),
        };
        let _ = reply.send(result);
    }

    tracing::debug!("presence feed stopped");
}
