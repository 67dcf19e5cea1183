//! Heartbeat supervisor for Wavegate.
//!
//! A gateway drops any connection that stops sending heartbeats, so the
//! beacon runs on its own Tokio task with its own timer. It never waits on
//! the read loop, on dispatch, or on handlers.
//!
//! # Integration
//!
//! The session starts a supervisor after writing Identify/Resume, handing
//! it a closure that sends one beacon:
//!
//! ```ignore
//! let sequence = session.sequence();
//! let heartbeat = HeartbeatSupervisor::start(
//!     HeartbeatConfig::new(hello.interval()),
//!     move || {
//!         let text = encode_heartbeat(sequence.get());
//!         let conn = Arc::clone(&conn);
//!         async move { conn.send(&text).await }
//!     },
//! )?;
//! // on op 11:
//! heartbeat.record_ack();
//! ```
//!
//! The closure is called at send time, so it reads the sequence number as
//! it is at that moment, not when the supervisor started.

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use rand::Rng;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::{debug, trace, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Errors raised when starting a supervisor.
#[derive(Debug, thiserror::Error)]
pub enum HeartbeatError {
    /// The gateway announced an interval of zero.
    #[error("heartbeat interval must be greater than zero")]
    ZeroInterval,
}

/// Heartbeat timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeartbeatConfig {
    /// Time between beacons, from the gateway's Hello.
    pub interval: Duration,
    /// Upper bound of a random extra delay before the *first* beacon.
    /// The first beacon is never sent earlier than one `interval`.
    pub initial_jitter: Duration,
}

impl HeartbeatConfig {
    /// A beacon is "late" when the task wakes more than
    /// `interval / LATE_DIVISOR` after its deadline (10%).
    pub const LATE_DIVISOR: u32 = 10;

    /// Config with the given interval and no initial jitter.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            initial_jitter: Duration::ZERO,
        }
    }

    /// Adds a random delay of up to `jitter` before the first beacon.
    pub fn with_initial_jitter(mut self, jitter: Duration) -> Self {
        self.initial_jitter = jitter;
        self
    }

    fn first_delay(&self) -> Duration {
        let max_ms = self.initial_jitter.as_millis() as u64;
        let jitter = if max_ms > 0 {
            Duration::from_millis(rand::rng().random_range(0..=max_ms))
        } else {
            Duration::ZERO
        };
        self.interval + jitter
    }
}

// ---------------------------------------------------------------------------
// Schedule
// ---------------------------------------------------------------------------

/// Information about one beacon slot, returned by
/// [`BeaconSchedule::wait_for_beat`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BeatInfo {
    /// Beacon number, starting at 1.
    pub beat: u64,
    /// How long after its deadline the slot fired.
    pub late_by: Duration,
    /// `true` if `late_by` exceeded 10% of the interval.
    pub late: bool,
}

/// Deadline bookkeeping for a periodic beacon.
///
/// After a late wake-up the next deadline is measured from now, not from
/// the missed one, so a stalled runtime never produces a burst of beacons.
#[derive(Debug)]
pub struct BeaconSchedule {
    interval: Duration,
    next: Instant,
    beats: u64,
}

impl BeaconSchedule {
    /// Schedules the first beacon one interval (plus jitter) from now.
    pub fn new(config: &HeartbeatConfig) -> Self {
        Self {
            interval: config.interval,
            next: Instant::now() + config.first_delay(),
            beats: 0,
        }
    }

    /// When the next beacon is due.
    pub fn next_deadline(&self) -> Instant {
        self.next
    }

    /// Sleeps until the next beacon is due.
    pub async fn wait_for_beat(&mut self) -> BeatInfo {
        time::sleep_until(self.next).await;

        let now = Instant::now();
        let late_by = now.saturating_duration_since(self.next);
        let late = late_by > self.interval / HeartbeatConfig::LATE_DIVISOR;
        self.beats += 1;
        self.next = now + self.interval;

        if late {
            warn!(
                beat = self.beats,
                late_ms = late_by.as_millis() as u64,
                interval_ms = self.interval.as_millis() as u64,
                "heartbeat fired late"
            );
        }

        BeatInfo {
            beat: self.beats,
            late_by,
            late,
        }
    }
}

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

/// A snapshot of heartbeat counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HeartbeatMetrics {
    /// Beacons written successfully.
    pub beats_sent: u64,
    /// Acks received.
    pub acks_received: u64,
    /// Beacons that fired late.
    pub late_beats: u64,
    /// Round trip of the most recent beacon that was acked.
    pub last_latency: Option<Duration>,
}

#[derive(Debug, Default)]
struct HeartbeatStats {
    beats_sent: AtomicU64,
    acks_received: AtomicU64,
    late_beats: AtomicU64,
    timing: Mutex<Timing>,
}

#[derive(Debug, Default)]
struct Timing {
    last_sent: Option<Instant>,
    last_latency: Option<Duration>,
}

impl HeartbeatStats {
    fn timing(&self) -> std::sync::MutexGuard<'_, Timing> {
        self.timing.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record_attempt(&self, late: bool) {
        if late {
            self.late_beats.fetch_add(1, Ordering::Relaxed);
        }
        self.timing().last_sent = Some(Instant::now());
    }

    fn record_sent(&self) {
        self.beats_sent.fetch_add(1, Ordering::Relaxed);
    }

    fn record_ack(&self) -> Option<Duration> {
        self.acks_received.fetch_add(1, Ordering::Relaxed);
        let mut timing = self.timing();
        let latency = timing.last_sent.take().map(|sent| sent.elapsed());
        if latency.is_some() {
            timing.last_latency = latency;
        }
        latency
    }

    fn snapshot(&self) -> HeartbeatMetrics {
        HeartbeatMetrics {
            beats_sent: self.beats_sent.load(Ordering::Relaxed),
            acks_received: self.acks_received.load(Ordering::Relaxed),
            late_beats: self.late_beats.load(Ordering::Relaxed),
            last_latency: self.timing().last_latency,
        }
    }
}

// ---------------------------------------------------------------------------
// Supervisor
// ---------------------------------------------------------------------------

/// Runs the heartbeat loop for one connection.
///
/// Dropping the supervisor stops the loop.
pub struct HeartbeatSupervisor {
    task: Option<JoinHandle<()>>,
    stats: Arc<HeartbeatStats>,
    interval: Duration,
}

impl HeartbeatSupervisor {
    /// Spawns the heartbeat task.
    ///
    /// `send_beacon` is called once per interval. If it fails the loop
    /// logs and ends; the read loop notices the dead connection on its own.
    ///
    /// # Errors
    /// [`HeartbeatError::ZeroInterval`] if `config.interval` is zero.
    pub fn start<F, Fut, E>(
        config: HeartbeatConfig,
        mut send_beacon: F,
    ) -> Result<Self, HeartbeatError>
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: fmt::Display + Send + 'static,
    {
        if config.interval.is_zero() {
            return Err(HeartbeatError::ZeroInterval);
        }

        let stats = Arc::new(HeartbeatStats::default());
        let task_stats = Arc::clone(&stats);
        let mut schedule = BeaconSchedule::new(&config);

        debug!(
            interval_ms = config.interval.as_millis() as u64,
            "heartbeat started"
        );

        let task = tokio::spawn(async move {
            loop {
                let info = schedule.wait_for_beat().await;
                task_stats.record_attempt(info.late);
                match send_beacon().await {
                    Ok(()) => {
                        task_stats.record_sent();
                        trace!(beat = info.beat, "heartbeat sent");
                    }
                    Err(e) => {
                        warn!(beat = info.beat, error = %e, "heartbeat send failed; stopping");
                        break;
                    }
                }
            }
        });

        Ok(Self {
            task: Some(task),
            stats,
            interval: config.interval,
        })
    }

    /// Records a heartbeat ack. Returns the round trip since the last
    /// beacon, or `None` for an ack with no beacon outstanding.
    pub fn record_ack(&self) -> Option<Duration> {
        let latency = self.stats.record_ack();
        match latency {
            Some(latency) => debug!(latency_ms = latency.as_millis() as u64, "heartbeat acked"),
            None => debug!("heartbeat ack without outstanding beacon"),
        }
        latency
    }

    /// Current counters.
    pub fn metrics(&self) -> HeartbeatMetrics {
        self.stats.snapshot()
    }

    /// The interval this supervisor beats at.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// `true` while the heartbeat task is alive.
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Stops the heartbeat task. Safe to call any number of times.
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            debug!("heartbeat stopped");
        }
    }
}

impl Drop for HeartbeatSupervisor {
    fn drop(&mut self) {
        self.stop();
    }
}

impl fmt::Debug for HeartbeatSupervisor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HeartbeatSupervisor")
            .field("interval", &self.interval)
            .field("running", &self.is_running())
            .field("metrics", &self.metrics())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_beat_on_time_is_not_late() {
        let mut schedule = BeaconSchedule::new(&HeartbeatConfig::new(Duration::from_secs(10)));
        let start = Instant::now();

        let info = schedule.wait_for_beat().await;
        assert_eq!(info.beat, 1);
        assert!(!info.late);
        assert_eq!(Instant::now() - start, Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_beat_after_stall_is_late_and_reschedules_from_now() {
        let mut schedule = BeaconSchedule::new(&HeartbeatConfig::new(Duration::from_secs(10)));

        time::advance(Duration::from_secs(15)).await;
        let info = schedule.wait_for_beat().await;
        assert!(info.late);
        assert!(info.late_by >= Duration::from_secs(5));

        let now = Instant::now();
        assert_eq!(schedule.next_deadline(), now + Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_beat_within_ten_percent_is_not_late() {
        let mut schedule = BeaconSchedule::new(&HeartbeatConfig::new(Duration::from_secs(10)));

        time::advance(Duration::from_millis(10_500)).await;
        let info = schedule.wait_for_beat().await;
        assert!(!info.late);
    }

    #[tokio::test(start_paused = true)]
    async fn test_initial_jitter_never_fires_early() {
        let config = HeartbeatConfig::new(Duration::from_secs(10))
            .with_initial_jitter(Duration::from_secs(3));
        for _ in 0..20 {
            let schedule = BeaconSchedule::new(&config);
            let delay = schedule.next_deadline() - Instant::now();
            assert!(delay >= Duration::from_secs(10));
            assert!(delay <= Duration::from_secs(13));
        }
    }

    #[test]
    fn test_record_ack_without_beacon_has_no_latency() {
        let stats = HeartbeatStats::default();
        assert_eq!(stats.record_ack(), None);
        let metrics = stats.snapshot();
        assert_eq!(metrics.acks_received, 1);
        assert_eq!(metrics.last_latency, None);
    }
}
