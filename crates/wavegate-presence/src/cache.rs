//! The participant cache: room id → participant id → record.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use wavegate_protocol::{ChannelId, ParticipantId, RoomId};

use crate::{ParticipantRecord, PresenceError};

type RoomTable = HashMap<ParticipantId, ParticipantRecord>;

/// What a delta did to the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeltaOutcome {
    /// A new participant was added.
    Inserted,
    /// An existing record was overwritten.
    Updated,
    /// The participant left and the record was removed.
    Removed,
    /// The participant left but had no record.
    Unchanged,
}

/// Voice membership for every room the session has seen a snapshot of.
///
/// Cheap to clone; clones share the same table. All access goes through
/// one async `RwLock`, so a reader never sees a half-applied update.
///
/// A room key, once created by a snapshot, stays for the life of the cache
/// even if the room empties: a missing key means "never initialized", not
/// "empty". Only [`ParticipantCache::clear`] removes rooms.
///
/// Writes from concurrent tasks race; the client serializes them through a
/// [`PresenceFeed`](crate::PresenceFeed) so they land in receipt order.
#[derive(Debug, Clone, Default)]
pub struct ParticipantCache {
    rooms: Arc<RwLock<HashMap<RoomId, RoomTable>>>,
}

impl ParticipantCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Initializes or wholesale replaces `room`'s table.
    ///
    /// Records without a channel are skipped. Returns how many records were
    /// stored.
    pub async fn apply_snapshot(
        &self,
        room: RoomId,
        records: impl IntoIterator<Item = ParticipantRecord>,
    ) -> usize {
        let table: RoomTable = records
            .into_iter()
            .filter(ParticipantRecord::is_connected)
            .map(|mut record| {
                record.room_id = room.clone();
                (record.participant_id.clone(), record)
            })
            .collect();
        let stored = table.len();

        let replaced = self.rooms.write().await.insert(room.clone(), table);
        tracing::debug!(
            room_id = %room,
            participants = stored,
            replaced = replaced.is_some(),
            "room snapshot applied"
        );
        stored
    }

    /// Applies one participant change to an initialized room.
    ///
    /// A record without a channel removes the participant (a no-op if it
    /// was absent); otherwise the record is inserted or overwritten.
    ///
    /// # Errors
    /// [`PresenceError::UnknownRoom`] if no snapshot was ever applied for
    /// the record's room. The room is not created.
    pub async fn apply_delta(
        &self,
        record: ParticipantRecord,
    ) -> Result<DeltaOutcome, PresenceError> {
        let mut rooms = self.rooms.write().await;
        let table = rooms
            .get_mut(&record.room_id)
            .ok_or_else(|| PresenceError::UnknownRoom(record.room_id.clone()))?;

        let outcome = if record.is_connected() {
            match table.insert(record.participant_id.clone(), record.clone()) {
                Some(_) => DeltaOutcome::Updated,
                None => DeltaOutcome::Inserted,
            }
        } else {
            match table.remove(&record.participant_id) {
                Some(_) => DeltaOutcome::Removed,
                None => DeltaOutcome::Unchanged,
            }
        };

        tracing::trace!(
            room_id = %record.room_id,
            participant_id = %record.participant_id,
            channel_id = ?record.channel_id,
            ?outcome,
            "participant delta applied"
        );
        Ok(outcome)
    }

    /// Reads one participant's record.
    ///
    /// # Errors
    /// [`PresenceError::UnknownRoom`] if `room` was never initialized.
    pub async fn lookup(
        &self,
        room: &RoomId,
        participant: &ParticipantId,
    ) -> Result<Option<ParticipantRecord>, PresenceError> {
        let rooms = self.rooms.read().await;
        let table = rooms
            .get(room)
            .ok_or_else(|| PresenceError::UnknownRoom(room.clone()))?;
        Ok(table.get(participant).cloned())
    }

    /// All records of one room, in no particular order.
    ///
    /// # Errors
    /// [`PresenceError::UnknownRoom`] if `room` was never initialized.
    pub async fn room_participants(
        &self,
        room: &RoomId,
    ) -> Result<Vec<ParticipantRecord>, PresenceError> {
        let rooms = self.rooms.read().await;
        let table = rooms
            .get(room)
            .ok_or_else(|| PresenceError::UnknownRoom(room.clone()))?;
        Ok(table.values().cloned().collect())
    }

    /// Participants of `room` currently in `channel`.
    ///
    /// # Errors
    /// [`PresenceError::UnknownRoom`] if `room` was never initialized.
    pub async fn channel_members(
        &self,
        room: &RoomId,
        channel: &ChannelId,
    ) -> Result<Vec<ParticipantId>, PresenceError> {
        let rooms = self.rooms.read().await;
        let table = rooms
            .get(room)
            .ok_or_else(|| PresenceError::UnknownRoom(room.clone()))?;
        let mut members: Vec<ParticipantId> = table
            .values()
            .filter(|record| record.channel_id.as_ref() == Some(channel))
            .map(|record| record.participant_id.clone())
            .collect();
        members.sort();
        Ok(members)
    }

    /// `true` if a snapshot was applied for `room`.
    pub async fn contains_room(&self, room: &RoomId) -> bool {
        self.rooms.read().await.contains_key(room)
    }

    /// Number of initialized rooms.
    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }

    /// Drops every room. Returns how many there were.
    pub async fn clear(&self) -> usize {
        let mut rooms = self.rooms.write().await;
        let count = rooms.len();
        rooms.clear();
        tracing::debug!(rooms = count, "participant cache cleared");
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(room: &str, user: &str, channel: Option<&str>) -> ParticipantRecord {
        ParticipantRecord::new(room.into(), user.into(), channel.map(ChannelId::from))
    }

    #[tokio::test]
    async fn test_apply_snapshot_skips_records_without_channel() {
        let cache = ParticipantCache::new();
        let stored = cache
            .apply_snapshot(
                "R1".into(),
                [record("R1", "A", Some("C1")), record("R1", "B", None)],
            )
            .await;
        assert_eq!(stored, 1);
        assert!(cache.lookup(&"R1".into(), &"B".into()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_apply_snapshot_replaces_room_wholesale() {
        let cache = ParticipantCache::new();
        cache.apply_snapshot("R1".into(), [record("R1", "A", Some("C1"))]).await;
        cache.apply_snapshot("R1".into(), [record("R1", "B", Some("C2"))]).await;

        assert!(cache.lookup(&"R1".into(), &"A".into()).await.unwrap().is_none());
        assert!(cache.lookup(&"R1".into(), &"B".into()).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_apply_snapshot_uses_snapshot_room_id() {
        let cache = ParticipantCache::new();
        cache.apply_snapshot("R1".into(), [record("other", "A", Some("C1"))]).await;
        let found = cache.lookup(&"R1".into(), &"A".into()).await.unwrap().unwrap();
        assert_eq!(found.room_id, RoomId::from("R1"));
    }

    #[tokio::test]
    async fn test_apply_snapshot_empty_room_still_initializes() {
        let cache = ParticipantCache::new();
        cache.apply_snapshot("R1".into(), []).await;
        assert!(cache.contains_room(&"R1".into()).await);
        assert_eq!(cache.lookup(&"R1".into(), &"A".into()).await, Ok(None));
    }

    #[tokio::test]
    async fn test_apply_delta_reports_outcome() {
        let cache = ParticipantCache::new();
        cache.apply_snapshot("R1".into(), []).await;

        let inserted = cache.apply_delta(record("R1", "A", Some("C1"))).await;
        assert_eq!(inserted, Ok(DeltaOutcome::Inserted));
        let updated = cache.apply_delta(record("R1", "A", Some("C2"))).await;
        assert_eq!(updated, Ok(DeltaOutcome::Updated));
        let removed = cache.apply_delta(record("R1", "A", None)).await;
        assert_eq!(removed, Ok(DeltaOutcome::Removed));
        let unchanged = cache.apply_delta(record("R1", "A", None)).await;
        assert_eq!(unchanged, Ok(DeltaOutcome::Unchanged));
    }

    #[tokio::test]
    async fn test_room_stays_after_last_participant_leaves() {
        let cache = ParticipantCache::new();
        cache.apply_snapshot("R1".into(), [record("R1", "A", Some("C1"))]).await;
        cache.apply_delta(record("R1", "A", None)).await.unwrap();

        assert!(cache.contains_room(&"R1".into()).await);
        assert!(cache.room_participants(&"R1".into()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_channel_members_filters_by_channel() {
        let cache = ParticipantCache::new();
        cache
            .apply_snapshot(
                "R1".into(),
                [
                    record("R1", "B", Some("C1")),
                    record("R1", "A", Some("C1")),
                    record("R1", "C", Some("C2")),
                ],
            )
            .await;

        let members = cache.channel_members(&"R1".into(), &"C1".into()).await.unwrap();
        assert_eq!(members, vec![ParticipantId::from("A"), ParticipantId::from("B")]);
    }

    #[tokio::test]
    async fn test_clear_drops_all_rooms() {
        let cache = ParticipantCache::new();
        cache.apply_snapshot("R1".into(), []).await;
        cache.apply_snapshot("R2".into(), []).await;
        assert_eq!(cache.room_count().await, 2);

        assert_eq!(cache.clear().await, 2);
        assert_eq!(cache.room_count().await, 0);
        assert!(matches!(
            cache.lookup(&"R1".into(), &"A".into()).await,
            Err(PresenceError::UnknownRoom(_))
        ));
    }
}
