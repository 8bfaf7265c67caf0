use super::{CancelToken, EngineEvent, LoopError, LoopExit, sleep_or_cancel};
use crate::config::ActiveConfig;
use crate::metrics::Metrics;
use crate::models::{CaptureRegion, ColorMatchTable, Frame, MatchPolicy};
use crate::services::{AlertPlayer, CaptureError, Cue, FrameScanner, ScreenCapturer};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, watch};

/// Capture → scan → alert control loop.
///
/// One `ScanLoop` value is built per profile and reused for every run; the
/// per-run state (cancel token, resume receiver) is passed to [`ScanLoop::run`].
///
/// Per iteration:
/// 1. Poll the cancel token (non-blocking)
/// 2. Capture the region on a blocking thread. Failure → failure sound, `Err`
/// 3. Scan. On a match: alert sound under the playback lock, then apply the
///    [`MatchPolicy`]. Without a match: sleep the scan interval
pub struct ScanLoop {
    capturer: Arc<dyn ScreenCapturer>,
    player: Arc<AlertPlayer>,
    table: Arc<ColorMatchTable>,
    region: CaptureRegion,
    interval: Duration,
    policy: MatchPolicy,
    scanner: FrameScanner,
    events: broadcast::Sender<EngineEvent>,
    metrics: Arc<Metrics>,
}

impl ScanLoop {
    pub fn new(
        capturer: Arc<dyn ScreenCapturer>,
        player: Arc<AlertPlayer>,
        active: &ActiveConfig,
        events: broadcast::Sender<EngineEvent>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            capturer,
            player,
            table: Arc::clone(&active.table),
            region: active.region,
            interval: active.settings.scan_interval(),
            policy: active.settings.on_match,
            scanner: FrameScanner::new(),
            events,
            metrics,
        }
    }

    /// Run until cancelled, stopped by policy, or failed.
    ///
    /// `resume` carries a counter bumped by each resume request; only bumps
    /// that arrive while the loop is paused release it.
    pub async fn run(
        &self,
        mut cancel: CancelToken,
        mut resume: watch::Receiver<u64>,
    ) -> Result<LoopExit, LoopError> {
        tracing::info!(
            "Scan loop running: region {}, interval {:?}, {} palette colors, on match: {:?}",
            self.region,
            self.interval,
            self.table.len(),
            self.policy
        );

        loop {
            if cancel.is_cancelled() {
                return Ok(LoopExit::Cancelled);
            }

            let frame = match self.capture().await {
                Ok(frame) => frame,
                Err(err) => {
                    tracing::error!("Capture failed, stopping scan loop: {}", err);
                    self.metrics.record_capture_failure();
                    self.sound_failure().await;
                    return Err(err.into());
                }
            };

            let Some(found) = self.scanner.scan(&frame, &self.table) else {
                if !sleep_or_cancel(self.interval, &mut cancel).await {
                    return Ok(LoopExit::Cancelled);
                }
                continue;
            };

            tracing::info!(
                "Found: {} ({}, {}, {})",
                found.label,
                found.r,
                found.g,
                found.b
            );
            self.metrics.record_match();
            self.emit(EngineEvent::MatchFound {
                rgb: found.rgb(),
                label: found.label,
            });

            if let Err(err) = self.player.play_blocking(Cue::Alert).await {
                tracing::error!("Alert playback failed, stopping scan loop: {}", err);
                self.metrics.record_playback_failure();
                self.sound_failure().await;
                return Err(err.into());
            }
            self.metrics.record_alert();

            match self.policy {
                MatchPolicy::Stop => {
                    tracing::info!("Match policy is stop, ending scan run");
                    return Ok(LoopExit::StoppedOnMatch);
                }
                MatchPolicy::Pause => {
                    if !self.wait_for_resume(&mut cancel, &mut resume).await {
                        return Ok(LoopExit::Cancelled);
                    }
                }
            }
        }
    }

    async fn capture(&self) -> Result<Frame, CaptureError> {
        let capturer = Arc::clone(&self.capturer);
        let region = self.region;
        let started = Instant::now();

        let frame = tokio::task::spawn_blocking(move || capturer.capture(&region))
            .await
            .map_err(|e| CaptureError::Backend(format!("capture worker failed: {e}")))??;

        self.metrics.record_frame_scanned(started.elapsed());
        Ok(frame)
    }

    /// Suspend until a resume request or cancellation. Returns true on resume.
    async fn wait_for_resume(
        &self,
        cancel: &mut CancelToken,
        resume: &mut watch::Receiver<u64>,
    ) -> bool {
        // Requests made before the pause do not count
        resume.borrow_and_update();

        tracing::info!("Scanning paused, waiting for resume");
        self.emit(EngineEvent::ScanPaused);

        let resumed = tokio::select! {
            changed = resume.changed() => changed.is_ok(),
            _ = cancel.cancelled() => false,
        };

        if resumed {
            tracing::info!("Resuming scanning");
            self.emit(EngineEvent::ScanResumed);
        }
        resumed
    }

    /// Best-effort failure sound before the loop exits
    async fn sound_failure(&self) {
        if let Err(err) = self.player.play_blocking(Cue::Failure).await {
            tracing::error!("Failure sound could not be played: {}", err);
        }
    }

    fn emit(&self, event: EngineEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}
