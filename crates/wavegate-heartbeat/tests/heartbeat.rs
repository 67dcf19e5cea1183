//! Integration tests for the heartbeat supervisor.
//!
//! All tests run on a paused clock; `sleep` auto-advances time once every
//! task is idle, so timings are exact.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time;

use wavegate_heartbeat::{HeartbeatConfig, HeartbeatError, HeartbeatSupervisor};

const INTERVAL: Duration = Duration::from_millis(41_250);

/// Starts a supervisor whose beacon reports the current value of `seq`.
fn start_reporting(
    config: HeartbeatConfig,
    seq: Arc<AtomicU64>,
) -> (HeartbeatSupervisor, mpsc::UnboundedReceiver<u64>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let supervisor = HeartbeatSupervisor::start(config, move || {
        let value = seq.load(Ordering::SeqCst);
        let tx = tx.clone();
        async move { tx.send(value).map_err(|e| e.to_string()) }
    })
    .unwrap();
    (supervisor, rx)
}

#[tokio::test(start_paused = true)]
async fn test_start_first_beacon_not_before_interval() {
    let (_heartbeat, mut rx) = start_reporting(HeartbeatConfig::new(INTERVAL), Arc::default());

    time::sleep(INTERVAL - Duration::from_millis(1)).await;
    assert!(rx.try_recv().is_err(), "no beacon before one interval");

    time::sleep(Duration::from_millis(2)).await;
    assert!(rx.try_recv().is_ok(), "beacon right after one interval");
}

#[tokio::test(start_paused = true)]
async fn test_start_beacons_repeat_every_interval() {
    let (heartbeat, mut rx) = start_reporting(HeartbeatConfig::new(INTERVAL), Arc::default());

    time::sleep(INTERVAL * 3 + Duration::from_millis(1)).await;
    let mut count = 0;
    while rx.try_recv().is_ok() {
        count += 1;
    }
    assert_eq!(count, 3);
    assert_eq!(heartbeat.metrics().beats_sent, 3);
    assert_eq!(heartbeat.metrics().late_beats, 0);
}

#[tokio::test(start_paused = true)]
async fn test_start_beacon_reads_sequence_at_send_time() {
    let seq = Arc::new(AtomicU64::new(5));
    let (_heartbeat, mut rx) =
        start_reporting(HeartbeatConfig::new(INTERVAL), Arc::clone(&seq));

    time::sleep(INTERVAL + Duration::from_millis(1)).await;
    assert_eq!(rx.recv().await, Some(5));

    seq.store(9, Ordering::SeqCst);
    time::sleep(INTERVAL).await;
    assert_eq!(rx.recv().await, Some(9));
}

#[tokio::test(start_paused = true)]
async fn test_stop_is_idempotent_and_silences_beacons() {
    let (mut heartbeat, mut rx) =
        start_reporting(HeartbeatConfig::new(INTERVAL), Arc::default());
    assert!(heartbeat.is_running());

    heartbeat.stop();
    heartbeat.stop();
    assert!(!heartbeat.is_running());

    time::sleep(INTERVAL * 2).await;
    assert!(rx.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn test_drop_stops_task() {
    let (heartbeat, mut rx) = start_reporting(HeartbeatConfig::new(INTERVAL), Arc::default());
    drop(heartbeat);

    time::sleep(INTERVAL * 2).await;
    assert!(rx.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn test_send_failure_ends_loop() {
    let heartbeat = HeartbeatSupervisor::start(HeartbeatConfig::new(INTERVAL), || async {
        Err::<(), _>("connection gone")
    })
    .unwrap();

    time::sleep(INTERVAL + Duration::from_millis(1)).await;
    tokio::task::yield_now().await;
    assert!(!heartbeat.is_running());
    assert_eq!(heartbeat.metrics().beats_sent, 0);
}

#[tokio::test(start_paused = true)]
async fn test_record_ack_measures_latency() {
    let (heartbeat, mut rx) = start_reporting(HeartbeatConfig::new(INTERVAL), Arc::default());

    time::sleep(INTERVAL + Duration::from_millis(1)).await;
    rx.recv().await.unwrap();
    time::sleep(Duration::from_millis(99)).await;

    let latency = heartbeat.record_ack().unwrap();
    assert!(latency >= Duration::from_millis(100));
    assert!(latency < Duration::from_millis(200));

    let metrics = heartbeat.metrics();
    assert_eq!(metrics.acks_received, 1);
    assert_eq!(metrics.last_latency, Some(latency));
}

#[tokio::test]
async fn test_start_zero_interval_is_error() {
    let result = HeartbeatSupervisor::start(HeartbeatConfig::new(Duration::ZERO), || async {
        Ok::<(), String>(())
    });
    assert!(matches!(result, Err(HeartbeatError::ZeroInterval)));
}
