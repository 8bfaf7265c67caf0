// pixelwatch - screen-region color watcher with audible alerts
//
// This is the library crate containing the scan-and-alert engine and its collaborators.
// The binary crate (main.rs) provides the console entry point.

pub mod config;
pub mod control;
pub mod engine;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod services;
pub mod supervisor;

// Re-export commonly used types for convenience
pub use config::{ActiveConfig, ConfigError, ConfigManager};
pub use engine::{EngineEvent, LoopKind};
pub use models::{CaptureRegion, ColorMatch, ColorMatchTable, Frame};
pub use services::{AlertPlayer, FrameScanner};
pub use supervisor::LoopSupervisor;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
