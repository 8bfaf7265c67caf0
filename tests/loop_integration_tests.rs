//! Integration tests for the scan and cycle loops, driven directly
//!
//! These tests verify:
//! - No match keeps scanning; a match plays exactly one alert and pauses
//! - Resume requests only count while paused
//! - Capture and playback failures end the run with one failure sound
//! - The cycle loop plays one reminder per elapsed wait and stops promptly

mod common;

use common::{
    RecordingOutput, ScriptedCapturer, active_config, background_frame, frame_with_red, wait_until,
};
use pixelwatch::engine::{CycleLoop, EngineEvent, LoopError, LoopExit, ScanLoop, cancel_pair};
use pixelwatch::metrics::Metrics;
use pixelwatch::models::MatchPolicy;
use pixelwatch::services::{AlertPlayer, CaptureError, Cue};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use tokio::sync::{broadcast, watch};
use tokio::time::{Duration, timeout};

const GENEROUS: Duration = Duration::from_secs(5);

fn drain(rx: &mut broadcast::Receiver<EngineEvent>) -> Vec<EngineEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Receive events until `target` arrives; returns everything seen, target included.
async fn collect_until(
    rx: &mut broadcast::Receiver<EngineEvent>,
    target: EngineEvent,
) -> Vec<EngineEvent> {
    let mut seen = Vec::new();
    timeout(GENEROUS, async {
        loop {
            let event = rx.recv().await.unwrap();
            let done = event == target;
            seen.push(event);
            if done {
                break;
            }
        }
    })
    .await
    .unwrap();
    seen
}

struct ScanHarness {
    scan_loop: Arc<ScanLoop>,
    output: RecordingOutput,
    metrics: Arc<Metrics>,
    events: broadcast::Receiver<EngineEvent>,
}

fn scan_harness(
    capturer: Arc<ScriptedCapturer>,
    output: RecordingOutput,
    policy: MatchPolicy,
) -> ScanHarness {
    let (events, rx) = broadcast::channel(256);
    let metrics = Arc::new(Metrics::new());
    let scan_loop = ScanLoop::new(
        capturer,
        Arc::new(AlertPlayer::new(output.clone())),
        &active_config(policy),
        events,
        Arc::clone(&metrics),
    );
    ScanHarness {
        scan_loop: Arc::new(scan_loop),
        output,
        metrics,
        events: rx,
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_match_after_clean_frames_alerts_once_and_pauses() {
    let capturer = ScriptedCapturer::new(vec![
        Ok(background_frame()),
        Ok(background_frame()),
        Ok(frame_with_red()),
    ]);
    let mut harness = scan_harness(
        Arc::clone(&capturer),
        RecordingOutput::new(),
        MatchPolicy::Pause,
    );

    let (cancel, token) = cancel_pair();
    let (_resume_tx, resume_rx) = watch::channel(0u64);
    let scan_loop = Arc::clone(&harness.scan_loop);
    let run = tokio::spawn(async move { scan_loop.run(token, resume_rx).await });

    let output = harness.output.clone();
    assert!(wait_until(GENEROUS, || output.count(Cue::Alert) == 1).await);

    // Paused: no more captures, no more alerts
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(capturer.calls(), 3);
    assert_eq!(harness.output.played(), vec![Cue::Alert]);

    let events = drain(&mut harness.events);
    assert_eq!(
        events,
        vec![
            EngineEvent::MatchFound {
                label: "red".to_string(),
                rgb: common::RED,
            },
            EngineEvent::ScanPaused,
        ]
    );
    assert_eq!(harness.metrics.frames_scanned.load(Ordering::Relaxed), 3);
    assert_eq!(harness.metrics.matches_found.load(Ordering::Relaxed), 1);

    cancel.cancel();
    let exit = timeout(GENEROUS, run).await.unwrap().unwrap();
    assert_eq!(exit, Ok(LoopExit::Cancelled));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_resume_releases_pause_and_scanning_continues() {
    let capturer = ScriptedCapturer::constant(frame_with_red());
    let mut harness = scan_harness(
        Arc::clone(&capturer),
        RecordingOutput::new(),
        MatchPolicy::Pause,
    );

    let (cancel, token) = cancel_pair();
    let (resume_tx, resume_rx) = watch::channel(0u64);
    let scan_loop = Arc::clone(&harness.scan_loop);
    let run = tokio::spawn(async move { scan_loop.run(token, resume_rx).await });

    // Only a resume sent while paused counts, so wait for the pause itself
    collect_until(&mut harness.events, EngineEvent::ScanPaused).await;
    assert_eq!(harness.output.count(Cue::Alert), 1);
    assert_eq!(capturer.calls(), 1);

    resume_tx.send_modify(|generation| *generation += 1);

    // The red pixel is still there, so the next frame alerts and pauses again
    let events = collect_until(&mut harness.events, EngineEvent::ScanPaused).await;
    assert_eq!(events.first(), Some(&EngineEvent::ScanResumed));
    assert_eq!(harness.output.count(Cue::Alert), 2);
    assert_eq!(capturer.calls(), 2);

    cancel.cancel();
    assert_eq!(timeout(GENEROUS, run).await.unwrap().unwrap(), Ok(LoopExit::Cancelled));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_resume_sent_before_pause_is_ignored() {
    let capturer = ScriptedCapturer::new(vec![Ok(background_frame()), Ok(frame_with_red())]);
    let harness = scan_harness(Arc::clone(&capturer), RecordingOutput::new(), MatchPolicy::Pause);

    let (cancel, token) = cancel_pair();
    let (resume_tx, resume_rx) = watch::channel(0u64);

    // Pressed while nothing was paused
    resume_tx.send_modify(|generation| *generation += 1);

    let scan_loop = Arc::clone(&harness.scan_loop);
    let run = tokio::spawn(async move { scan_loop.run(token, resume_rx).await });

    let output = harness.output.clone();
    assert!(wait_until(GENEROUS, || output.count(Cue::Alert) == 1).await);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(harness.output.count(Cue::Alert), 1);
    assert_eq!(capturer.calls(), 2);

    cancel.cancel();
    assert_eq!(timeout(GENEROUS, run).await.unwrap().unwrap(), Ok(LoopExit::Cancelled));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_stop_policy_ends_run_after_alert() {
    let capturer = ScriptedCapturer::constant(frame_with_red());
    let harness = scan_harness(capturer, RecordingOutput::new(), MatchPolicy::Stop);

    let (_cancel, token) = cancel_pair();
    let (_resume_tx, resume_rx) = watch::channel(0u64);

    let exit = timeout(GENEROUS, harness.scan_loop.run(token, resume_rx))
        .await
        .unwrap();

    assert_eq!(exit, Ok(LoopExit::StoppedOnMatch));
    assert_eq!(harness.output.played(), vec![Cue::Alert]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_capture_failure_plays_failure_sound_once() {
    let failure = CaptureError::Backend("display went away".to_string());
    let capturer = ScriptedCapturer::new(vec![Ok(background_frame()), Err(failure.clone())]);
    let harness = scan_harness(Arc::clone(&capturer), RecordingOutput::new(), MatchPolicy::Pause);

    let (_cancel, token) = cancel_pair();
    let (_resume_tx, resume_rx) = watch::channel(0u64);

    let exit = timeout(GENEROUS, harness.scan_loop.run(token, resume_rx))
        .await
        .unwrap();

    assert_eq!(exit, Err(LoopError::Capture(failure)));
    assert_eq!(harness.output.played(), vec![Cue::Failure]);
    assert_eq!(capturer.calls(), 2);
    assert_eq!(harness.metrics.capture_failures.load(Ordering::Relaxed), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_alert_failure_plays_failure_sound() {
    let capturer = ScriptedCapturer::constant(frame_with_red());
    let harness = scan_harness(
        capturer,
        RecordingOutput::failing_on(Cue::Alert),
        MatchPolicy::Pause,
    );

    let (_cancel, token) = cancel_pair();
    let (_resume_tx, resume_rx) = watch::channel(0u64);

    let exit = timeout(GENEROUS, harness.scan_loop.run(token, resume_rx))
        .await
        .unwrap();

    assert!(matches!(exit, Err(LoopError::Playback(_))));
    assert_eq!(harness.output.played(), vec![Cue::Failure]);
    assert_eq!(harness.metrics.playback_failures.load(Ordering::Relaxed), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_stop_during_scan_sleep_is_prompt() {
    let capturer = ScriptedCapturer::constant(background_frame());
    let (events, _rx) = broadcast::channel(16);
    let mut active = active_config(MatchPolicy::Pause);
    active.settings.scan_interval_ms = 60_000;
    let scan_loop = ScanLoop::new(
        capturer.clone(),
        Arc::new(AlertPlayer::new(RecordingOutput::new())),
        &active,
        events,
        Arc::new(Metrics::new()),
    );

    let (cancel, token) = cancel_pair();
    let (_resume_tx, resume_rx) = watch::channel(0u64);
    let run = tokio::spawn(async move { scan_loop.run(token, resume_rx).await });

    assert!(wait_until(GENEROUS, || capturer.calls() == 1).await);
    cancel.cancel();

    let exit = timeout(Duration::from_secs(1), run).await.unwrap().unwrap();
    assert_eq!(exit, Ok(LoopExit::Cancelled));
    assert_eq!(capturer.calls(), 1);
}

fn cycle_harness(
    output: RecordingOutput,
    wait: Duration,
) -> (Arc<CycleLoop>, broadcast::Receiver<EngineEvent>) {
    let (events, rx) = broadcast::channel(1024);
    let cycle = CycleLoop::with_timing(
        Arc::new(AlertPlayer::new(output)),
        wait,
        Duration::from_millis(20),
        events,
        Arc::new(Metrics::new()),
    );
    (Arc::new(cycle), rx)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_cycle_plays_one_reminder_per_wait() {
    let output = RecordingOutput::new();
    let (cycle, mut rx) = cycle_harness(output.clone(), Duration::from_millis(100));

    let (cancel, token) = cancel_pair();
    let runner = Arc::clone(&cycle);
    let run = tokio::spawn(async move { runner.run(token).await });

    let counter = output.clone();
    assert!(wait_until(GENEROUS, || counter.count(Cue::Reminder) >= 2).await);
    cancel.cancel();
    assert_eq!(timeout(GENEROUS, run).await.unwrap().unwrap(), Ok(LoopExit::Cancelled));

    let events = drain(&mut rx);
    let reminders = events.iter().filter(|e| **e == EngineEvent::ReminderPlayed).count();
    assert_eq!(reminders, output.count(Cue::Reminder));
    assert!(output.played().iter().all(|cue| *cue == Cue::Reminder));

    // Each wait reports progress, ending at 1.0 right before its reminder
    let first_reminder = events
        .iter()
        .position(|e| *e == EngineEvent::ReminderPlayed)
        .unwrap();
    let fractions: Vec<f32> = events[..first_reminder]
        .iter()
        .filter_map(|e| match e {
            EngineEvent::CycleProgress { fraction } => Some(*fraction),
            _ => None,
        })
        .collect();
    assert!(fractions.len() >= 2);
    assert!(fractions.windows(2).all(|pair| pair[0] <= pair[1]));
    assert_eq!(fractions.last().copied(), Some(1.0));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_cycle_first_wait_ends_with_exactly_one_reminder() {
    let wait = Duration::from_millis(300);
    let output = RecordingOutput::new();
    let (cycle, mut rx) = cycle_harness(output.clone(), wait);

    let (cancel, token) = cancel_pair();
    let started = tokio::time::Instant::now();
    let run = tokio::spawn(async move { cycle.run(token).await });

    // Nothing plays during the first wait
    tokio::time::sleep(wait / 2).await;
    assert!(output.played().is_empty());

    let events = collect_until(&mut rx, EngineEvent::ReminderPlayed).await;
    let elapsed = started.elapsed();

    // One chime for the finished wait, none yet for the second
    assert!(elapsed >= wait);
    assert!(elapsed < wait * 2);
    assert_eq!(output.played(), vec![Cue::Reminder]);
    assert_eq!(
        events.iter().filter(|e| **e == EngineEvent::ReminderPlayed).count(),
        1
    );

    cancel.cancel();
    assert_eq!(timeout(GENEROUS, run).await.unwrap().unwrap(), Ok(LoopExit::Cancelled));
    assert_eq!(output.count(Cue::Reminder), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_cycle_stop_mid_wait_skips_reminder() {
    let output = RecordingOutput::new();
    let (cycle, _rx) = cycle_harness(output.clone(), Duration::from_secs(30));

    let (cancel, token) = cancel_pair();
    let run = tokio::spawn(async move { cycle.run(token).await });

    tokio::time::sleep(Duration::from_millis(50)).await;
    cancel.cancel();

    let exit = timeout(Duration::from_secs(1), run).await.unwrap().unwrap();
    assert_eq!(exit, Ok(LoopExit::Cancelled));
    assert!(output.played().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_cycle_reminder_failure_ends_run() {
    let output = RecordingOutput::failing_on(Cue::Reminder);
    let (cycle, _rx) = cycle_harness(output.clone(), Duration::from_millis(30));

    let (_cancel, token) = cancel_pair();
    let exit = timeout(GENEROUS, cycle.run(token)).await.unwrap();

    assert!(matches!(exit, Err(LoopError::Playback(_))));
    assert_eq!(output.played(), vec![Cue::Failure]);
}
