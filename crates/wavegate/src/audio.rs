//! The audio backend seam.
//!
//! Playback runs on an external node. The client only forwards the voice
//! events that backend needs (its own voice-update sink) and gives
//! handlers a typed way to drive it.

use futures_util::future::BoxFuture;
use wavegate_protocol::{Frame, ParticipantId, RoomId};

/// Errors reported by an audio backend.
#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    /// No player exists for the room.
    #[error("no audio player for room {0}")]
    NoPlayer(RoomId),

    /// The query resolved to nothing playable.
    #[error("no track found for {0:?}")]
    NoTrack(String),

    /// Anything else the backend reports.
    #[error("audio backend error: {0}")]
    Backend(String),
}

/// A resolved, queueable track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    /// Backend-specific track handle.
    pub id: String,
    /// Display title, when known.
    pub title: Option<String>,
}

/// An audio-playback backend with one player per room.
///
/// Methods return boxed futures so the client can hold the backend as
/// `Arc<dyn AudioBackend>`.
pub trait AudioBackend: Send + Sync + 'static {
    /// Creates (or reuses) the room's player.
    fn create_player_for_room<'a>(
        &'a self,
        room: &'a RoomId,
    ) -> BoxFuture<'a, Result<(), AudioError>>;

    /// Resolves `query` and queues the first result for `requester`.
    fn resolve_and_queue<'a>(
        &'a self,
        room: &'a RoomId,
        requester: &'a ParticipantId,
        query: &'a str,
    ) -> BoxFuture<'a, Result<Track, AudioError>>;

    /// Starts playback of the room's queue.
    fn play<'a>(&'a self, room: &'a RoomId) -> BoxFuture<'a, Result<(), AudioError>>;

    /// `true` while the room's player is playing.
    fn is_playing<'a>(&'a self, room: &'a RoomId) -> BoxFuture<'a, bool>;

    /// Receives `VOICE_STATE_UPDATE` and `VOICE_SERVER_UPDATE` frames
    /// verbatim.
    fn voice_update(&self, frame: Frame) -> BoxFuture<'_, ()>;
}

/// Queues `query` in `room` and starts playback if the player is idle.
pub async fn enqueue(
    backend: &dyn AudioBackend,
    room: &RoomId,
    requester: &ParticipantId,
    query: &str,
) -> Result<Track, AudioError> {
    backend.create_player_for_room(room).await?;
    let track = backend.resolve_and_queue(room, requester, query).await?;
    if !backend.is_playing(room).await {
        backend.play(room).await?;
    }
    tracing::info!(room_id = %room, track = %track.id, "track queued");
    Ok(track)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingBackend {
        playing: bool,
        calls: Mutex<Vec<String>>,
    }

    impl RecordingBackend {
        fn log(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }
    }

    impl AudioBackend for RecordingBackend {
        fn create_player_for_room<'a>(
            &'a self,
            room: &'a RoomId,
        ) -> BoxFuture<'a, Result<(), AudioError>> {
            Box::pin(async move {
                self.log(format!("create {room}"));
                Ok(())
            })
        }

        fn resolve_and_queue<'a>(
            &'a self,
            room: &'a RoomId,
            requester: &'a ParticipantId,
            query: &'a str,
        ) -> BoxFuture<'a, Result<Track, AudioError>> {
            Box::pin(async move {
                if query.is_empty() {
                    return Err(AudioError::NoTrack(query.to_owned()));
                }
                self.log(format!("queue {room} {requester} {query}"));
                Ok(Track {
                    id: format!("track:{query}"),
                    title: None,
                })
            })
        }

        fn play<'a>(&'a self, room: &'a RoomId) -> BoxFuture<'a, Result<(), AudioError>> {
            Box::pin(async move {
                self.log(format!("play {room}"));
                Ok(())
            })
        }

        fn is_playing<'a>(&'a self, _room: &'a RoomId) -> BoxFuture<'a, bool> {
            Box::pin(async move { self.playing })
        }

        fn voice_update(&self, _frame: Frame) -> BoxFuture<'_, ()> {
            Box::pin(async {})
        }
    }

    #[tokio::test]
    async fn test_enqueue_idle_player_starts_playback() {
        let backend = RecordingBackend::default();
        let track = enqueue(&backend, &"R1".into(), &"A".into(), "lofi").await.unwrap();

        assert_eq!(track.id, "track:lofi");
        assert_eq!(
            *backend.calls.lock().unwrap(),
            vec!["create R1", "queue R1 A lofi", "play R1"]
        );
    }

    #[tokio::test]
    async fn test_enqueue_playing_player_only_queues() {
        let backend = RecordingBackend {
            playing: true,
            ..Default::default()
        };
        enqueue(&backend, &"R1".into(), &"A".into(), "lofi").await.unwrap();
        assert!(!backend.calls.lock().unwrap().iter().any(|c| c.starts_with("play")));
    }

    #[tokio::test]
    async fn test_enqueue_unresolvable_query_is_error() {
        let backend = RecordingBackend::default();
        let err = enqueue(&backend, &"R1".into(), &"A".into(), "").await.unwrap_err();
        assert!(matches!(err, AudioError::NoTrack(_)));
    }
}
