// Loop supervisor
//
// Starts and stops the scan and cycle loops on external intent, guarantees at
// most one run per loop kind, and broadcasts engine events to observers.

use crate::config::ActiveConfig;
use crate::engine::{
    CancelHandle, CancelToken, CycleLoop, EngineEvent, LoopKind, RunningGuard, ScanLoop,
    StopReason, cancel_pair,
};
use crate::metrics::Metrics;
use crate::services::{AlertPlayer, ScreenCapturer};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

/// Capacity of the engine event broadcast channel
const EVENT_CHANNEL_CAPACITY: usize = 100;

/// One spawned run of a loop
struct RunHandle {
    cancel: CancelHandle,
    /// Set as soon as the loop body returns, before its stop event goes out
    done: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl RunHandle {
    /// Active = not asked to stop and not finished on its own
    fn is_active(&self) -> bool {
        !self.cancel.is_cancelled()
            && !self.done.load(Ordering::SeqCst)
            && !self.task.is_finished()
    }
}

/// Per-kind lifecycle state
struct LoopSlot {
    /// High while a run is inside its loop body
    running: Arc<AtomicBool>,
    current: Option<RunHandle>,
}

impl LoopSlot {
    fn new() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(false)),
            current: None,
        }
    }
}

/// Starts/stops [`ScanLoop`] and [`CycleLoop`] runs.
///
/// - [`set_intent`](Self::set_intent) is idempotent: a start while a run is
///   active is a no-op, a stop while idle is discarded.
/// - Every run gets a fresh [`CancelToken`], so a stale stop can never end a
///   later run.
/// - A start that arrives while the previous run is still winding down is
///   queued behind it, so two runs of one kind never overlap.
///
/// Observers subscribe to [`EngineEvent`]s via [`subscribe`](Self::subscribe).
pub struct LoopSupervisor {
    runtime: Handle,
    scan_loop: Arc<ScanLoop>,
    cycle_loop: Arc<CycleLoop>,
    scan: Mutex<LoopSlot>,
    cycle: Mutex<LoopSlot>,
    resume_tx: watch::Sender<u64>,
    events: broadcast::Sender<EngineEvent>,
    metrics: Arc<Metrics>,
}

impl LoopSupervisor {
    /// Build a supervisor and its two loops for the active profile.
    pub fn new(
        runtime: Handle,
        capturer: Arc<dyn ScreenCapturer>,
        player: Arc<AlertPlayer>,
        active: &ActiveConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let metrics = Arc::new(Metrics::new());

        let scan_loop = ScanLoop::new(
            capturer,
            Arc::clone(&player),
            active,
            events.clone(),
            Arc::clone(&metrics),
        );
        let cycle_loop = CycleLoop::new(
            player,
            &active.settings,
            events.clone(),
            Arc::clone(&metrics),
        );

        Self::from_loops(runtime, scan_loop, cycle_loop, events, metrics)
    }

    /// Build a supervisor around pre-built loops. `events` must be the sender
    /// the loops were built with.
    pub fn from_loops(
        runtime: Handle,
        scan_loop: ScanLoop,
        cycle_loop: CycleLoop,
        events: broadcast::Sender<EngineEvent>,
        metrics: Arc<Metrics>,
    ) -> Self {
        let (resume_tx, _) = watch::channel(0);
        Self {
            runtime,
            scan_loop: Arc::new(scan_loop),
            cycle_loop: Arc::new(cycle_loop),
            scan: Mutex::new(LoopSlot::new()),
            cycle: Mutex::new(LoopSlot::new()),
            resume_tx,
            events,
            metrics,
        }
    }

    fn slot(&self, kind: LoopKind) -> MutexGuard<'_, LoopSlot> {
        let slot = match kind {
            LoopKind::Scan => &self.scan,
            LoopKind::Cycle => &self.cycle,
        };
        slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply a desired running state for one loop kind.
    ///
    /// Returns true if a run was started or a stop was delivered, false if
    /// the call was a no-op.
    pub fn set_intent(&self, kind: LoopKind, desired_running: bool) -> bool {
        let mut slot = self.slot(kind);

        if !desired_running {
            return match &slot.current {
                Some(run) if run.is_active() => {
                    tracing::info!("Stopping {}", kind);
                    run.cancel.cancel();
                    true
                }
                _ => {
                    tracing::debug!("{} is not running, stop ignored", kind);
                    false
                }
            };
        }

        if slot.current.as_ref().is_some_and(RunHandle::is_active) {
            tracing::debug!("{} already running, start ignored", kind);
            return false;
        }

        // Dropping the old handle closes its token; the old run is already
        // cancelled or finished at this point
        let previous = slot.current.take().map(|run| run.task);
        let (cancel, token) = cancel_pair();
        let done = Arc::new(AtomicBool::new(false));
        let task = self.runtime.spawn(self.run_task(
            kind,
            token,
            previous,
            Arc::clone(&slot.running),
            Arc::clone(&done),
        ));

        slot.current = Some(RunHandle { cancel, done, task });
        tracing::info!("Started {}", kind);
        true
    }

    fn run_task(
        &self,
        kind: LoopKind,
        token: CancelToken,
        previous: Option<JoinHandle<()>>,
        running: Arc<AtomicBool>,
        done: Arc<AtomicBool>,
    ) -> impl Future<Output = ()> + Send + 'static {
        let scan_loop = Arc::clone(&self.scan_loop);
        let cycle_loop = Arc::clone(&self.cycle_loop);
        let resume = self.resume_tx.subscribe();
        let events = self.events.clone();
        let metrics = Arc::clone(&self.metrics);

        async move {
            if let Some(previous) = previous {
                tracing::debug!("Waiting for previous {} run to finish", kind);
                let _ = previous.await;
            }

            let _running = RunningGuard::enter(&running);
            metrics.record_run_started();
            let _ = events.send(EngineEvent::LoopStarted { kind });

            let result = match kind {
                LoopKind::Scan => scan_loop.run(token, resume).await,
                LoopKind::Cycle => cycle_loop.run(token).await,
            };
            done.store(true, Ordering::SeqCst);

            let reason = StopReason::from(&result);
            match &reason {
                StopReason::Failed(message) => {
                    tracing::error!("{} stopped after failure: {}", kind, message)
                }
                other => tracing::info!("{} stopped: {:?}", kind, other),
            }
            let _ = events.send(EngineEvent::LoopStopped { kind, reason });
        }
    }

    /// Release a paused scan loop. Ignored if the scanner is not paused.
    pub fn resume_scan(&self) {
        self.resume_tx.send_modify(|generation| *generation = generation.wrapping_add(1));
    }

    /// True while a run of `kind` is inside its loop body.
    pub fn is_running(&self, kind: LoopKind) -> bool {
        self.slot(kind).running.load(Ordering::SeqCst)
    }

    /// True if a run of `kind` exists and has not been asked to stop.
    pub fn is_active(&self, kind: LoopKind) -> bool {
        self.slot(kind).current.as_ref().is_some_and(RunHandle::is_active)
    }

    /// Subscribe to engine events.
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    pub fn metrics(&self) -> Arc<Metrics> {
        Arc::clone(&self.metrics)
    }

    /// Cancel both loops and wait up to `timeout` for each run to exit.
    ///
    /// A run blocked inside a capture or playback call exits once that call
    /// returns; if that takes longer than `timeout` it is left to the runtime
    /// shutdown.
    pub async fn shutdown(&self, timeout: Duration) {
        tracing::info!("Shutting down loops");

        let tasks: Vec<(LoopKind, JoinHandle<()>)> = [LoopKind::Scan, LoopKind::Cycle]
            .into_iter()
            .filter_map(|kind| {
                let run = self.slot(kind).current.take()?;
                run.cancel.cancel();
                Some((kind, run.task))
            })
            .collect();

        for (kind, task) in tasks {
            match tokio::time::timeout(timeout, task).await {
                Ok(Ok(())) => tracing::debug!("{} shut down", kind),
                Ok(Err(err)) => tracing::error!("{} task failed: {}", kind, err),
                Err(_) => tracing::warn!("{} did not stop within {:?}", kind, timeout),
            }
        }
    }
}
