//! Scan-and-alert engine.
//!
//! Two independent loops run as tokio tasks:
//! - [`ScanLoop`]: capture → scan → (alert + pause | sleep), repeated
//! - [`CycleLoop`]: wait a fixed duration → play the reminder, repeated
//!
//! Both are started and stopped by [`LoopSupervisor`](crate::supervisor::LoopSupervisor).
//! Cancellation is cooperative: every run gets its own [`CancelToken`], polled
//! without blocking at iteration boundaries and raced against sleeps and pauses.
//! A token is never reused, so a stop aimed at one run cannot reach the next.

pub mod cycle_loop;
pub mod scan_loop;

pub use cycle_loop::CycleLoop;
pub use scan_loop::ScanLoop;

use crate::services::{CaptureError, PlaybackError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;

/// The two loop kinds the supervisor manages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoopKind {
    Scan,
    Cycle,
}

impl std::fmt::Display for LoopKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoopKind::Scan => f.write_str("scanner"),
            LoopKind::Cycle => f.write_str("reminder cycle"),
        }
    }
}

/// How a run ended without error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    /// The run's cancel token fired
    Cancelled,
    /// The scan loop alerted under [`MatchPolicy::Stop`](crate::models::MatchPolicy::Stop)
    StoppedOnMatch,
}

/// Fatal loop errors. The failure sound has already been attempted when
/// one of these is returned; the loop does not restart itself.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoopError {
    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error(transparent)]
    Playback(#[from] PlaybackError),
}

/// Why a run ended, as reported in [`EngineEvent::LoopStopped`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    Cancelled,
    StoppedOnMatch,
    Failed(String),
}

impl From<&Result<LoopExit, LoopError>> for StopReason {
    fn from(result: &Result<LoopExit, LoopError>) -> Self {
        match result {
            Ok(LoopExit::Cancelled) => StopReason::Cancelled,
            Ok(LoopExit::StoppedOnMatch) => StopReason::StoppedOnMatch,
            Err(err) => StopReason::Failed(err.to_string()),
        }
    }
}

/// Events broadcast to observers (console output, tests)
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    LoopStarted { kind: LoopKind },
    LoopStopped { kind: LoopKind, reason: StopReason },

    /// A palette color was found; the alert sound follows
    MatchFound { label: String, rgb: [u8; 3] },

    /// Scanning is suspended until a resume signal
    ScanPaused,
    ScanResumed,

    ReminderPlayed,

    /// Elapsed fraction (0.0..=1.0) of the current reminder wait
    CycleProgress { fraction: f32 },
}

/// Sending half of a per-run cancellation token
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

/// Receiving half of a per-run cancellation token, owned by the running loop
#[derive(Debug, Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

/// Create a fresh, unsignalled token for one run.
pub fn cancel_pair() -> (CancelHandle, CancelToken) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx }, CancelToken { rx })
}

impl CancelHandle {
    /// Signal the run to stop. Never blocks; repeated calls are harmless.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }
}

impl CancelToken {
    /// Non-blocking poll. A dropped handle counts as cancelled.
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow() || self.rx.has_changed().is_err()
    }

    /// Resolve once the run is cancelled (or its handle is dropped).
    pub async fn cancelled(&mut self) {
        let _ = self.rx.wait_for(|cancelled| *cancelled).await;
    }
}

/// Sleep for `duration` unless cancelled first. Returns true if the full
/// duration elapsed.
pub async fn sleep_or_cancel(duration: Duration, cancel: &mut CancelToken) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(duration) => true,
        _ = cancel.cancelled() => false,
    }
}

/// Holds a loop's running flag high for the lifetime of one run.
pub struct RunningGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> RunningGuard<'a> {
    pub fn enter(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self { flag }
    }
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}
