use super::{CancelToken, EngineEvent, LoopError, LoopExit};
use crate::metrics::Metrics;
use crate::models::EngineSettings;
use crate::services::{AlertPlayer, Cue};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{Instant, MissedTickBehavior};

/// Periodic reminder loop: wait the configured duration, play the reminder,
/// repeat. Progress through each wait is broadcast as
/// [`EngineEvent::CycleProgress`] and has no effect on control flow.
pub struct CycleLoop {
    player: Arc<AlertPlayer>,
    wait: Duration,
    progress_interval: Duration,
    events: broadcast::Sender<EngineEvent>,
    metrics: Arc<Metrics>,
}

impl CycleLoop {
    pub fn new(
        player: Arc<AlertPlayer>,
        settings: &EngineSettings,
        events: broadcast::Sender<EngineEvent>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self::with_timing(
            player,
            settings.cycle_wait(),
            settings.progress_interval(),
            events,
            metrics,
        )
    }

    pub fn with_timing(
        player: Arc<AlertPlayer>,
        wait: Duration,
        progress_interval: Duration,
        events: broadcast::Sender<EngineEvent>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            player,
            wait,
            progress_interval,
            events,
            metrics,
        }
    }

    /// Run until cancelled or a playback failure.
    pub async fn run(&self, mut cancel: CancelToken) -> Result<LoopExit, LoopError> {
        tracing::info!("Starting cycle timer noises every {:?}", self.wait);

        loop {
            if !self.wait_with_progress(&mut cancel).await {
                break;
            }

            // A stop that lands exactly as the wait ends still skips the chime
            if cancel.is_cancelled() {
                break;
            }

            if let Err(err) = self.player.play_blocking(Cue::Reminder).await {
                tracing::error!("Reminder playback failed, stopping cycle loop: {}", err);
                self.metrics.record_playback_failure();
                if let Err(err) = self.player.play_blocking(Cue::Failure).await {
                    tracing::error!("Failure sound could not be played: {}", err);
                }
                return Err(err.into());
            }

            self.metrics.record_reminder();
            let _ = self.events.send(EngineEvent::ReminderPlayed);
        }

        tracing::info!("Ending cycle timer noises");
        Ok(LoopExit::Cancelled)
    }

    /// Wait the full cycle duration, reporting progress. Returns false if
    /// cancelled first.
    async fn wait_with_progress(&self, cancel: &mut CancelToken) -> bool {
        let started = Instant::now();
        let deadline = started + self.wait;

        let mut ticker = tokio::time::interval(self.progress_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = tokio::time::sleep_until(deadline) => {
                    self.report_progress(1.0);
                    return true;
                }
                _ = ticker.tick() => {
                    let fraction = started.elapsed().as_secs_f32() / self.wait.as_secs_f32();
                    self.report_progress(fraction.min(1.0));
                }
                _ = cancel.cancelled() => return false,
            }
        }
    }

    fn report_progress(&self, fraction: f32) {
        let _ = self.events.send(EngineEvent::CycleProgress { fraction });
    }
}
