//! Data models for pixelwatch.
//!
//! - [`ColorMatch`] / [`ColorMatchTable`]: the alert palette and its exact-RGB lookup
//! - [`CaptureRegion`], [`DisplayBounds`], [`Frame`]: screen geometry and captured pixels
//! - [`WatchConfig`], [`ScanProfile`], [`EngineSettings`]: the config.yaml schema
//!
//! Config structs derive `Serialize`/`Deserialize`; everything built from them
//! is immutable once loaded and shared by `Arc` between the loops.

pub mod color;
pub mod config;
pub mod frame;

pub use color::{ColorMatch, ColorMatchEntry, ColorMatchTable};
pub use config::{EngineSettings, MatchPolicy, ScanProfile, WatchConfig};
pub use frame::{CaptureRegion, DisplayBounds, Frame};
