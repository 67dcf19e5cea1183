//! Integration tests for the participant cache and presence feed.

use wavegate_presence::{
    Applied, DeltaOutcome, ParticipantCache, ParticipantRecord, PresenceError, spawn_feed,
};
use wavegate_protocol::{ChannelId, ParticipantId, RoomId, VoiceState};

// =========================================================================
// Helpers
// =========================================================================

fn record(room: &str, user: &str, channel: Option<&str>) -> ParticipantRecord {
    ParticipantRecord::new(room.into(), user.into(), channel.map(ChannelId::from))
}

fn r1() -> RoomId {
    RoomId::from("R1")
}

// =========================================================================
// Cache semantics
// =========================================================================

#[tokio::test]
async fn test_snapshot_then_leave_delta_removes_participant() {
    let cache = ParticipantCache::new();
    cache.apply_snapshot(r1(), [record("R1", "A", Some("C1"))]).await;
    cache.apply_delta(record("R1", "A", None)).await.unwrap();

    assert_eq!(cache.lookup(&r1(), &"A".into()).await, Ok(None));
}

#[tokio::test]
async fn test_state_equals_fold_of_snapshot_and_deltas() {
    let cache = ParticipantCache::new();
    cache
        .apply_snapshot(r1(), [record("R1", "A", Some("C1")), record("R1", "B", Some("C1"))])
        .await;

    let deltas = [
        record("R1", "C", Some("C2")),
        record("R1", "A", Some("C2")),
        record("R1", "B", None),
        record("R1", "D", Some("C1")),
        record("R1", "D", None),
        record("R1", "C", Some("C1")),
    ];
    for delta in deltas {
        cache.apply_delta(delta).await.unwrap();
    }

    let a = cache.lookup(&r1(), &"A".into()).await.unwrap().unwrap();
    assert_eq!(a.channel_id, Some(ChannelId::from("C2")));
    assert_eq!(cache.lookup(&r1(), &"B".into()).await, Ok(None));
    assert_eq!(cache.lookup(&r1(), &"D".into()).await, Ok(None));
    assert_eq!(
        cache.channel_members(&r1(), &"C1".into()).await.unwrap(),
        vec![ParticipantId::from("C")]
    );
    assert_eq!(cache.room_participants(&r1()).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_leave_delta_for_absent_participant_is_idempotent() {
    let cache = ParticipantCache::new();
    cache.apply_snapshot(r1(), [record("R1", "A", Some("C1"))]).await;

    for _ in 0..3 {
        assert_eq!(
            cache.apply_delta(record("R1", "Z", None)).await,
            Ok(DeltaOutcome::Unchanged)
        );
    }
    assert_eq!(cache.room_participants(&r1()).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_delta_for_unknown_room_errors_and_changes_nothing() {
    let cache = ParticipantCache::new();
    cache.apply_snapshot(r1(), [record("R1", "A", Some("C1"))]).await;

    let err = cache.apply_delta(record("R9", "A", Some("C1"))).await.unwrap_err();
    assert_eq!(err, PresenceError::UnknownRoom("R9".into()));
    assert!(!cache.contains_room(&"R9".into()).await);
    assert_eq!(cache.room_count().await, 1);
    assert!(cache.lookup(&r1(), &"A".into()).await.unwrap().is_some());
}

#[tokio::test]
async fn test_lookup_unknown_room_is_error() {
    let cache = ParticipantCache::new();
    assert_eq!(
        cache.lookup(&r1(), &"A".into()).await,
        Err(PresenceError::UnknownRoom(r1()))
    );
}

#[tokio::test]
async fn test_record_from_voice_state_keeps_flags() {
    let state: VoiceState = serde_json::from_value(serde_json::json!({
        "user_id": "A",
        "channel_id": "C1",
        "session_id": "voice-session",
        "self_mute": true,
        "self_deaf": false
    }))
    .unwrap();

    let record = ParticipantRecord::from_voice_state(r1(), &state);
    assert_eq!(record.room_id, r1());
    assert_eq!(record.session_id.as_deref(), Some("voice-session"));
    assert!(record.self_mute);
    assert!(!record.self_deaf);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_readers_never_see_partial_snapshot() {
    let cache = ParticipantCache::new();
    cache.apply_snapshot(r1(), []).await;

    let writer = {
        let cache = cache.clone();
        tokio::spawn(async move {
            for round in 0..50 {
                let channel = format!("C{round}");
                let records: Vec<_> = (0..20)
                    .map(|i| record("R1", &format!("P{i}"), Some(&channel)))
                    .collect();
                cache.apply_snapshot(r1(), records).await;
            }
        })
    };

    let mut readers = Vec::new();
    for _ in 0..4 {
        let cache = cache.clone();
        readers.push(tokio::spawn(async move {
            for _ in 0..50 {
                let participants = cache.room_participants(&r1()).await.unwrap();
                let mut channels: Vec<_> =
                    participants.iter().map(|r| r.channel_id.clone()).collect();
                channels.dedup();
                assert!(channels.len() <= 1, "a snapshot was observed half-applied");
                tokio::task::yield_now().await;
            }
        }));
    }

    writer.await.unwrap();
    for reader in readers {
        reader.await.unwrap();
    }
}

// =========================================================================
// Presence feed
// =========================================================================

#[tokio::test]
async fn test_feed_applies_commands_in_submission_order() {
    let feed = spawn_feed(ParticipantCache::new());

    // Queue everything without waiting in between.
    let _ = feed.snapshot(r1(), vec![record("R1", "A", Some("C1"))]);
    let _ = feed.delta(record("R1", "A", Some("C2")));
    let _ = feed.delta(record("R1", "B", Some("C2")));
    let last = feed.delta(record("R1", "A", None));

    assert_eq!(last.wait().await, Ok(Applied::Delta(DeltaOutcome::Removed)));
    let cache = feed.cache();
    assert_eq!(cache.lookup(&r1(), &"A".into()).await, Ok(None));
    assert!(cache.lookup(&r1(), &"B".into()).await.unwrap().is_some());
}

#[tokio::test]
async fn test_feed_delta_before_snapshot_reports_unknown_room() {
    let feed = spawn_feed(ParticipantCache::new());

    let early = feed.delta(record("R1", "A", Some("C1")));
    let snapshot = feed.snapshot(r1(), vec![]);

    assert_eq!(early.wait().await, Err(PresenceError::UnknownRoom(r1())));
    assert_eq!(snapshot.wait().await, Ok(Applied::Snapshot(0)));
    assert_eq!(feed.cache().lookup(&r1(), &"A".into()).await, Ok(None));
}

#[tokio::test]
async fn test_feed_clear_runs_in_order_with_updates() {
    let feed = spawn_feed(ParticipantCache::new());

    let _ = feed.snapshot(r1(), vec![record("R1", "A", Some("C1"))]);
    let cleared = feed.clear();
    let after = feed.snapshot("R2".into(), vec![]);

    assert_eq!(cleared.wait().await, Ok(Applied::Cleared(1)));
    after.wait().await.unwrap();
    assert_eq!(feed.cache().room_count().await, 1);
    assert!(feed.cache().contains_room(&"R2".into()).await);
}
