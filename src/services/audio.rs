use std::io::Cursor;
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;

const ALERT_WAV: &[u8] = include_bytes!("../../assets/alert.wav");
const REMINDER_WAV: &[u8] = include_bytes!("../../assets/reminder.wav");
const FAILURE_WAV: &[u8] = include_bytes!("../../assets/failure.wav");

/// The three sounds the engine can play
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cue {
    /// A palette color was found in the capture region
    Alert,
    /// Periodic reminder from the cycle loop
    Reminder,
    /// A loop hit a fatal capture or playback error
    Failure,
}

impl std::fmt::Display for Cue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Cue::Alert => "alert",
            Cue::Reminder => "reminder",
            Cue::Failure => "failure",
        };
        f.write_str(name)
    }
}

/// Errors from playing a cue. Fatal to the loop that requested playback.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlaybackError {
    #[error("Audio device unavailable: {0}")]
    Device(String),

    #[error("Failed to decode {cue} sound: {message}")]
    Decode { cue: Cue, message: String },

    #[error("Playback worker failed: {0}")]
    Worker(String),
}

/// Raw audio backend. `play` blocks until the cue has finished playing.
#[cfg_attr(test, mockall::automock)]
pub trait SoundOutput: Send + Sync {
    fn play(&self, cue: Cue) -> Result<(), PlaybackError>;
}

/// Shared playback resource.
///
/// Both loops hold the same `Arc<AlertPlayer>`. The internal lock is held for
/// exactly one playback call, so two cues never overlap: a second caller
/// blocks until the first cue returns.
pub struct AlertPlayer {
    output: Box<dyn SoundOutput>,
    lock: Mutex<()>,
}

impl AlertPlayer {
    pub fn new(output: impl SoundOutput + 'static) -> Self {
        Self {
            output: Box::new(output),
            lock: Mutex::new(()),
        }
    }

    /// Play `cue` while holding the playback lock. Blocks.
    pub fn play(&self, cue: Cue) -> Result<(), PlaybackError> {
        // A panic inside a previous playback leaves nothing to repair
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        tracing::debug!("Playing {} sound", cue);
        self.output.play(cue)
    }

    pub fn play_alert(&self) -> Result<(), PlaybackError> {
        self.play(Cue::Alert)
    }

    pub fn play_reminder(&self) -> Result<(), PlaybackError> {
        self.play(Cue::Reminder)
    }

    pub fn play_failure(&self) -> Result<(), PlaybackError> {
        self.play(Cue::Failure)
    }

    /// Play `cue` on tokio's blocking pool and wait for it to finish.
    pub async fn play_blocking(self: &Arc<Self>, cue: Cue) -> Result<(), PlaybackError> {
        let player = Arc::clone(self);
        tokio::task::spawn_blocking(move || player.play(cue))
            .await
            .map_err(|e| PlaybackError::Worker(e.to_string()))?
    }
}

/// [`SoundOutput`] that decodes the embedded WAV assets with `rodio`.
///
/// The output stream is opened per call and dropped once the cue ends, so no
/// audio device is held between alerts.
#[derive(Debug, Clone, Copy, Default)]
pub struct RodioOutput;

impl RodioOutput {
    pub fn new() -> Self {
        Self
    }

    fn asset(cue: Cue) -> &'static [u8] {
        match cue {
            Cue::Alert => ALERT_WAV,
            Cue::Reminder => REMINDER_WAV,
            Cue::Failure => FAILURE_WAV,
        }
    }
}

impl SoundOutput for RodioOutput {
    fn play(&self, cue: Cue) -> Result<(), PlaybackError> {
        let source = rodio::Decoder::new(Cursor::new(Self::asset(cue))).map_err(|e| {
            PlaybackError::Decode {
                cue,
                message: e.to_string(),
            }
        })?;

        let mut stream = rodio::OutputStreamBuilder::open_default_stream()
            .map_err(|e| PlaybackError::Device(e.to_string()))?;
        stream.log_on_drop(false);

        let sink = rodio::Sink::connect_new(stream.mixer());
        sink.append(source);
        sink.sleep_until_end();

        Ok(())
    }
}
