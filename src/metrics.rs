// Engine metrics module
//
// Lightweight counters for the scan and cycle loops, logged on shutdown

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Engine counters
///
/// Uses atomic operations so both loops can record without locks.
/// Shared by `Arc` between the supervisor and the loops.
#[derive(Debug)]
pub struct Metrics {
    /// Frames captured and scanned
    pub frames_scanned: AtomicU64,

    /// Frames that contained a palette color
    pub matches_found: AtomicU64,

    /// Alert sounds played to completion
    pub alerts_played: AtomicU64,

    /// Reminder sounds played to completion
    pub reminders_played: AtomicU64,

    /// Capture failures (each one ends a scan run)
    pub capture_failures: AtomicU64,

    /// Playback failures (each one ends the run that hit it)
    pub playback_failures: AtomicU64,

    /// Runs started, both loop kinds
    pub runs_started: AtomicU64,

    /// Total time spent capturing, in milliseconds
    pub total_capture_time_ms: AtomicU64,

    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            frames_scanned: AtomicU64::new(0),
            matches_found: AtomicU64::new(0),
            alerts_played: AtomicU64::new(0),
            reminders_played: AtomicU64::new(0),
            capture_failures: AtomicU64::new(0),
            playback_failures: AtomicU64::new(0),
            runs_started: AtomicU64::new(0),
            total_capture_time_ms: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn record_frame_scanned(&self, capture_time: Duration) {
        self.frames_scanned.fetch_add(1, Ordering::Relaxed);
        self.total_capture_time_ms
            .fetch_add(capture_time.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn record_match(&self) {
        self.matches_found.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_alert(&self) {
        self.alerts_played.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_reminder(&self) {
        self.reminders_played.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_capture_failure(&self) {
        self.capture_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_playback_failure(&self) {
        self.playback_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_run_started(&self) {
        self.runs_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Average capture time per frame in milliseconds
    pub fn avg_capture_time_ms(&self) -> f64 {
        let total = self.total_capture_time_ms.load(Ordering::Relaxed);
        let count = self.frames_scanned.load(Ordering::Relaxed);
        if count > 0 {
            total as f64 / count as f64
        } else {
            0.0
        }
    }

    /// Log metrics summary
    pub fn log_summary(&self) {
        tracing::info!("=== Engine Metrics Summary ===");
        tracing::info!("Uptime: {:.2}s", self.uptime().as_secs_f64());
        tracing::info!(
            "Frames: {} scanned, {} matched (avg capture {:.2}ms)",
            self.frames_scanned.load(Ordering::Relaxed),
            self.matches_found.load(Ordering::Relaxed),
            self.avg_capture_time_ms()
        );
        tracing::info!(
            "Sounds: {} alerts, {} reminders",
            self.alerts_played.load(Ordering::Relaxed),
            self.reminders_played.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Runs: {} started, {} capture failures, {} playback failures",
            self.runs_started.load(Ordering::Relaxed),
            self.capture_failures.load(Ordering::Relaxed),
            self.playback_failures.load(Ordering::Relaxed)
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
