//! Shared fakes for the integration tests.
//!
//! The mockall mocks are only compiled into the library's own unit tests, so
//! the integration tests use these hand-written collaborators instead.

#![allow(dead_code)]

use pixelwatch::config::ActiveConfig;
use pixelwatch::models::{
    CaptureRegion, ColorMatch, ColorMatchTable, EngineSettings, Frame, MatchPolicy,
};
use pixelwatch::services::{CaptureError, Cue, PlaybackError, ScreenCapturer, SoundOutput};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const RED: [u8; 3] = [117, 10, 10];
pub const BACKGROUND: [u8; 3] = [20, 20, 20];

/// Capturer that replays a script of results, then repeats the last one.
pub struct ScriptedCapturer {
    script: Mutex<VecDeque<Result<Frame, CaptureError>>>,
    last: Mutex<Option<Result<Frame, CaptureError>>>,
    calls: AtomicUsize,
}

impl ScriptedCapturer {
    pub fn new(script: Vec<Result<Frame, CaptureError>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            last: Mutex::new(None),
            calls: AtomicUsize::new(0),
        })
    }

    /// Always returns the same frame
    pub fn constant(frame: Frame) -> Arc<Self> {
        Self::new(vec![Ok(frame)])
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ScreenCapturer for ScriptedCapturer {
    fn capture(&self, _region: &CaptureRegion) -> Result<Frame, CaptureError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut last = self.last.lock().unwrap();
        if let Some(next) = self.script.lock().unwrap().pop_front() {
            *last = Some(next);
        }
        last.clone()
            .unwrap_or_else(|| Err(CaptureError::Backend("empty script".to_string())))
    }
}

/// Sound output that records every cue it is asked to play.
#[derive(Clone, Default)]
pub struct RecordingOutput {
    played: Arc<Mutex<Vec<Cue>>>,
    fail_on: Option<Cue>,
    duration: Duration,
}

impl RecordingOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every play of `cue` fails with a device error (and is not recorded)
    pub fn failing_on(cue: Cue) -> Self {
        Self {
            fail_on: Some(cue),
            ..Self::default()
        }
    }

    /// Each cue blocks for `duration` before returning
    pub fn with_duration(duration: Duration) -> Self {
        Self {
            duration,
            ..Self::default()
        }
    }

    pub fn played(&self) -> Vec<Cue> {
        self.played.lock().unwrap().clone()
    }

    pub fn count(&self, cue: Cue) -> usize {
        self.played().iter().filter(|played| **played == cue).count()
    }
}

impl SoundOutput for RecordingOutput {
    fn play(&self, cue: Cue) -> Result<(), PlaybackError> {
        if self.fail_on == Some(cue) {
            return Err(PlaybackError::Device("no output device".to_string()));
        }
        if !self.duration.is_zero() {
            std::thread::sleep(self.duration);
        }
        self.played.lock().unwrap().push(cue);
        Ok(())
    }
}

pub fn background_frame() -> Frame {
    Frame::filled(16, 16, BACKGROUND)
}

pub fn frame_with_red() -> Frame {
    let mut frame = background_frame();
    frame.set_pixel(9, 4, RED);
    frame
}

pub fn active_config(policy: MatchPolicy) -> ActiveConfig {
    ActiveConfig {
        profile_name: "test".to_string(),
        region: CaptureRegion::from_corners(0, 0, 16, 16),
        table: Arc::new(ColorMatchTable::build(vec![ColorMatch::new(
            "red", RED[0], RED[1], RED[2],
        )])),
        settings: EngineSettings {
            scan_interval_ms: 10,
            cycle_wait_secs: 1,
            progress_interval_ms: 20,
            on_match: policy,
            ..EngineSettings::default()
        },
    }
}

/// Poll `condition` every few milliseconds until it holds or `timeout` passes.
pub async fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}
