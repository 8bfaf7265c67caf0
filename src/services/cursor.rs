//! Mouse cursor readout for finding region corners.
//!
//! `pixelwatch --cursor` prints the cursor position every few seconds so the
//! `BottomLeftX`/`TopRightY` values of a profile can be read off the screen.

use crate::engine::{CancelToken, sleep_or_cancel};
use std::fmt;
use std::io::{self, Write};
use std::time::Duration;
use thiserror::Error;

/// Default pause between two readouts
pub const CURSOR_INTERVAL: Duration = Duration::from_secs(5);

/// Absolute screen position of the cursor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CursorPosition {
    pub x: i32,
    pub y: i32,
}

impl fmt::Display for CursorPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[cursor.Pos] X:{} Y:{}", self.x, self.y)
    }
}

#[derive(Debug, Error)]
pub enum CursorError {
    #[error("Failed to read cursor position: {0}")]
    Query(String),

    #[error("Failed to write cursor position: {0}")]
    Output(#[from] io::Error),
}

/// Read the cursor position from the OS.
#[cfg(windows)]
pub fn system_cursor() -> Result<CursorPosition, CursorError> {
    use windows::Win32::Foundation::POINT;
    use windows::Win32::UI::WindowsAndMessaging::GetCursorPos;

    let mut point = POINT::default();
    // SAFETY: `point` is a live, writable POINT for the whole call
    unsafe { GetCursorPos(&mut point) }.map_err(|err| CursorError::Query(err.to_string()))?;
    Ok(CursorPosition {
        x: point.x,
        y: point.y,
    })
}

/// Print one line per reading to `out` every `interval` until cancelled.
///
/// A failed reading is printed and logged, then tracking carries on. Only a
/// failed write ends the loop early.
pub async fn track_cursor<S, W>(
    mut source: S,
    interval: Duration,
    mut out: W,
    mut cancel: CancelToken,
) -> Result<(), CursorError>
where
    S: FnMut() -> Result<CursorPosition, CursorError>,
    W: Write,
{
    tracing::info!("Tracking cursor every {:?}", interval);

    loop {
        match source() {
            Ok(position) => writeln!(out, "{position}")?,
            Err(err) => {
                tracing::warn!("{}", err);
                writeln!(out, "{err}")?;
            }
        }
        out.flush()?;

        if !sleep_or_cancel(interval, &mut cancel).await {
            break;
        }
    }

    tracing::info!("Cursor tracking stopped");
    Ok(())
}
