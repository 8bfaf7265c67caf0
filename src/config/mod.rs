use crate::models::{
    CaptureRegion, ColorMatch, ColorMatchEntry, ColorMatchTable, EngineSettings, ScanProfile,
    WatchConfig,
};
use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;
use std::fs;
use std::io::{BufRead, Write};
use std::sync::Arc;
use thiserror::Error;

/// Default config file name, resolved against the working directory
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";

/// Errors raised while loading or validating config.yaml. All are fatal at startup.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(Utf8PathBuf),

    #[error("Failed to read config {path}: {source}")]
    Read {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config {path}: {source}")]
    Parse {
        path: Utf8PathBuf,
        #[source]
        source: serde_yaml_ng::Error,
    },

    #[error("Failed to write config {path}: {source}")]
    Write {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No scan profiles defined under ScanConfigs")]
    NoProfiles,

    #[error("Unknown scan profile '{name}' (available: {available})")]
    UnknownProfile { name: String, available: String },

    #[error("Color '{label}' has {channel}={value}, expected 0..=255")]
    ChannelOutOfRange {
        label: String,
        channel: char,
        value: i64,
    },

    #[error("Profile '{0}' has a zero-area capture region")]
    EmptyRegion(String),

    #[error("{0} must be greater than zero")]
    InvalidTiming(&'static str),
}

/// Errors from the interactive profile prompt. The selection is aborted, never retried.
#[derive(Error, Debug)]
pub enum InputError {
    #[error("Failed to read profile selection: {0}")]
    Read(#[from] std::io::Error),

    #[error("No profile name entered")]
    Empty,
}

/// Everything the engine needs from configuration, resolved for one profile.
#[derive(Debug, Clone)]
pub struct ActiveConfig {
    pub profile_name: String,
    pub region: CaptureRegion,
    pub table: Arc<ColorMatchTable>,
    pub settings: EngineSettings,
}

/// Configuration manager for config.yaml.
///
/// Loads, validates and saves the profile/palette file and resolves the
/// selected profile into an [`ActiveConfig`].
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_path: Utf8PathBuf,
}

impl ConfigManager {
    /// Create a manager for the given config file path.
    pub fn new<P: AsRef<Utf8Path>>(config_path: P) -> Self {
        Self {
            config_path: config_path.as_ref().to_path_buf(),
        }
    }

    /// Load and validate the config file.
    ///
    /// A missing file is an error: there is no usable default capture region.
    pub fn load(&self) -> Result<WatchConfig, ConfigError> {
        if !self.config_path.exists() {
            return Err(ConfigError::NotFound(self.config_path.clone()));
        }

        let file_contents =
            fs::read_to_string(&self.config_path).map_err(|source| ConfigError::Read {
                path: self.config_path.clone(),
                source,
            })?;

        let config: WatchConfig =
            serde_yaml_ng::from_str(&file_contents).map_err(|source| ConfigError::Parse {
                path: self.config_path.clone(),
                source,
            })?;

        Self::validate(&config)?;

        tracing::info!(
            "Loaded config from {}: {} profiles, {} palette colors",
            self.config_path,
            config.scan_configs.len(),
            config.color_matches.len()
        );
        Ok(config)
    }

    /// Save a config file, overwriting any existing one.
    pub fn save(&self, config: &WatchConfig) -> Result<(), ConfigError> {
        let yaml_string = serde_yaml_ng::to_string(config).map_err(|source| ConfigError::Parse {
            path: self.config_path.clone(),
            source,
        })?;

        fs::write(&self.config_path, yaml_string).map_err(|source| ConfigError::Write {
            path: self.config_path.clone(),
            source,
        })?;

        tracing::info!("Saved config to {}", self.config_path);
        Ok(())
    }

    /// Write a starter config if none exists yet. Returns true if a file was written.
    pub fn write_starter_if_missing(&self) -> Result<bool, ConfigError> {
        if self.config_path.exists() {
            return Ok(false);
        }
        self.save(&starter_config())?;
        Ok(true)
    }

    fn validate(config: &WatchConfig) -> Result<(), ConfigError> {
        if config.scan_configs.is_empty() {
            return Err(ConfigError::NoProfiles);
        }

        for (name, profile) in &config.scan_configs {
            if profile_region(profile).is_empty() {
                return Err(ConfigError::EmptyRegion(name.clone()));
            }
        }

        build_palette(&config.color_matches)?;

        let settings = &config.settings;
        if settings.scan_interval_ms == 0 {
            return Err(ConfigError::InvalidTiming("ScanIntervalMs"));
        }
        if settings.cycle_wait_secs == 0 {
            return Err(ConfigError::InvalidTiming("CycleWaitSecs"));
        }
        if settings.progress_interval_ms == 0 {
            return Err(ConfigError::InvalidTiming("ProgressIntervalMs"));
        }

        if config.color_matches.is_empty() {
            tracing::warn!("Palette is empty, the scanner will never match");
        }

        Ok(())
    }

    /// Resolve `profile_name` into the engine's active configuration.
    pub fn activate(
        &self,
        config: &WatchConfig,
        profile_name: &str,
    ) -> Result<ActiveConfig, ConfigError> {
        let profile = config.scan_configs.get(profile_name).ok_or_else(|| {
            ConfigError::UnknownProfile {
                name: profile_name.to_string(),
                available: profile_names(config).join(", "),
            }
        })?;

        let region = profile_region(profile);
        if region.is_empty() {
            return Err(ConfigError::EmptyRegion(profile_name.to_string()));
        }

        let table = ColorMatchTable::build(build_palette(&config.color_matches)?);

        tracing::info!(
            "Active profile '{}': region {}, monitor hint {:?}, {} distinct colors",
            profile_name,
            region,
            profile.monitor,
            table.len()
        );

        Ok(ActiveConfig {
            profile_name: profile_name.to_string(),
            region,
            table: Arc::new(table),
            settings: config.settings.clone(),
        })
    }

    /// Get the config file path.
    pub fn config_path(&self) -> &Utf8Path {
        &self.config_path
    }
}

/// Canonical capture region for a profile
pub fn profile_region(profile: &ScanProfile) -> CaptureRegion {
    CaptureRegion::from_corners(
        profile.bottom_left_x,
        profile.bottom_left_y,
        profile.top_right_x,
        profile.top_right_y,
    )
}

/// Profile names in file order
pub fn profile_names(config: &WatchConfig) -> Vec<String> {
    config.scan_configs.keys().cloned().collect()
}

/// Convert raw palette entries, rejecting channel values outside 0..=255.
pub fn build_palette(entries: &[ColorMatchEntry]) -> Result<Vec<ColorMatch>, ConfigError> {
    entries
        .iter()
        .map(|entry| {
            let channel = |name: char, value: i64| {
                u8::try_from(value).map_err(|_| ConfigError::ChannelOutOfRange {
                    label: entry.match_name.clone(),
                    channel: name,
                    value,
                })
            };
            Ok(ColorMatch::new(
                entry.match_name.clone(),
                channel('R', entry.r)?,
                channel('G', entry.g)?,
                channel('B', entry.b)?,
            ))
        })
        .collect()
}

/// Prompt for a profile name and read one line.
///
/// The name is not checked here; [`ConfigManager::activate`] reports unknown names.
pub fn prompt_profile<R: BufRead, W: Write>(
    config: &WatchConfig,
    mut input: R,
    mut output: W,
) -> Result<String, InputError> {
    writeln!(output, "Available profiles: {}", profile_names(config).join(", "))?;
    write!(output, "Select Config: ")?;
    output.flush()?;

    let mut line = String::new();
    input.read_line(&mut line)?;

    let name = line.trim().to_string();
    if name.is_empty() {
        return Err(InputError::Empty);
    }
    Ok(name)
}

/// Starter config written by `--init`: one example profile and the stock palette.
pub fn starter_config() -> WatchConfig {
    let mut scan_configs = IndexMap::new();
    scan_configs.insert(
        "left".to_string(),
        ScanProfile {
            monitor: Some(0),
            bottom_left_x: 100,
            bottom_left_y: 200,
            top_right_x: 400,
            top_right_y: 260,
        },
    );

    let color_matches = [
        ("red", 117, 10, 10),
        ("orange", 153, 60, 10),
        ("orange", 132, 67, 33),
        ("orange", 147, 112, 38),
        ("yellow", 153, 110, 10),
    ]
    .into_iter()
    .map(|(name, r, g, b)| ColorMatchEntry {
        match_name: name.to_string(),
        r,
        g,
        b,
    })
    .collect();

    WatchConfig {
        scan_configs,
        color_matches,
        settings: EngineSettings {
            default_profile: Some("left".to_string()),
            ..EngineSettings::default()
        },
    }
}
