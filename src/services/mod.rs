//! Services module - the scanner and the external collaborators it sits between.
//!
//! # Components
//!
//! - [`FrameScanner`]: exact-RGB search of a captured frame against the palette,
//!   short-circuiting on the first hit.
//!
//! - [`ScreenCapturer`]: trait seam for grabbing the configured region.
//!   [`XcapCapturer`] is the real implementation; it maps the absolute-screen
//!   region onto the one display that fully contains it.
//!
//! - [`AlertPlayer`]: the shared playback resource. Wraps a [`SoundOutput`]
//!   backend ([`RodioOutput`] in production) behind a mutex so that alert,
//!   reminder and failure sounds never overlap.
//!
//! - [`track_cursor`]: prints the mouse position on a timer, a setup aid for
//!   reading region corners off the screen. The OS source is Windows only.
//!
//! Capture and playback are blocking calls. The loops in [`crate::engine`]
//! push them onto tokio's blocking pool; nothing here is async except
//! [`AlertPlayer::play_blocking`], which does exactly that.

pub mod audio;
pub mod capture;
pub mod cursor;
pub mod scanner;

pub use audio::{AlertPlayer, Cue, PlaybackError, RodioOutput, SoundOutput};
pub use capture::{CaptureError, ScreenCapturer, XcapCapturer, locate_display, save_frame_png};
pub use cursor::{CURSOR_INTERVAL, CursorError, CursorPosition, track_cursor};
#[cfg(windows)]
pub use cursor::system_cursor;
pub use scanner::FrameScanner;
