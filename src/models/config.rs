use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::color::ColorMatchEntry;

/// Root of config.yaml
///
/// Contains the named capture-region profiles, the alert palette and the
/// optional engine settings block.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WatchConfig {
    #[serde(rename = "ScanConfigs", default)]
    pub scan_configs: IndexMap<String, ScanProfile>,

    #[serde(rename = "ColorMatches", default)]
    pub color_matches: Vec<ColorMatchEntry>,

    #[serde(rename = "Settings", default)]
    pub settings: EngineSettings,
}

/// One named capture region.
///
/// The two corners may be given in any order; they are canonicalized when the
/// region is built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanProfile {
    /// Display index hint. Informational only, the region's coordinates decide
    /// which display is captured.
    #[serde(rename = "Monitor", default)]
    pub monitor: Option<u32>,

    #[serde(rename = "BottomLeftX")]
    pub bottom_left_x: i32,

    #[serde(rename = "BottomLeftY")]
    pub bottom_left_y: i32,

    #[serde(rename = "TopRightX")]
    pub top_right_x: i32,

    #[serde(rename = "TopRightY")]
    pub top_right_y: i32,
}

/// What the scan loop does after the alert for a match has played.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchPolicy {
    /// Suspend scanning until a resume signal arrives
    #[default]
    Pause,
    /// End the run; a fresh start is required
    Stop,
}

/// Timing and behavior settings from the optional `Settings` block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSettings {
    #[serde(rename = "DefaultProfile", default)]
    pub default_profile: Option<String>,

    #[serde(rename = "ScanIntervalMs", default = "default_scan_interval_ms")]
    pub scan_interval_ms: u64,

    #[serde(rename = "CycleWaitSecs", default = "default_cycle_wait_secs")]
    pub cycle_wait_secs: u64,

    #[serde(rename = "ProgressIntervalMs", default = "default_progress_interval_ms")]
    pub progress_interval_ms: u64,

    #[serde(rename = "OnMatch", default)]
    pub on_match: MatchPolicy,

    #[serde(rename = "CycleOnStartup", default)]
    pub cycle_on_startup: bool,

    #[serde(rename = "SavePreview", default)]
    pub save_preview: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            default_profile: None,
            scan_interval_ms: default_scan_interval_ms(),
            cycle_wait_secs: default_cycle_wait_secs(),
            progress_interval_ms: default_progress_interval_ms(),
            on_match: MatchPolicy::Pause,
            cycle_on_startup: false,
            save_preview: false,
        }
    }
}

impl EngineSettings {
    pub fn scan_interval(&self) -> Duration {
        Duration::from_millis(self.scan_interval_ms)
    }

    pub fn cycle_wait(&self) -> Duration {
        Duration::from_secs(self.cycle_wait_secs)
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }
}

fn default_scan_interval_ms() -> u64 {
    1000
}

fn default_cycle_wait_secs() -> u64 {
    95
}

fn default_progress_interval_ms() -> u64 {
    250
}
