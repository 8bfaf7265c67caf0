use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A single palette entry from the `ColorMatches` list in config.yaml.
///
/// Identity is the `(r, g, b)` triple; labels are free text and may repeat.
/// Channels are validated to the 0..=255 range by
/// [`ConfigManager`](crate::config::ConfigManager) before a `ColorMatch` is built,
/// so the raw YAML form lives in [`ColorMatchEntry`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColorMatch {
    pub label: String,
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl ColorMatch {
    pub fn new(label: impl Into<String>, r: u8, g: u8, b: u8) -> Self {
        Self {
            label: label.into(),
            r,
            g,
            b,
        }
    }

    /// Lookup key for this entry
    pub fn rgb(&self) -> [u8; 3] {
        [self.r, self.g, self.b]
    }
}

/// Raw `ColorMatches` entry as written in config.yaml.
///
/// Channel values are read as wide integers so that an out-of-range value
/// produces a readable configuration error instead of a YAML type error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColorMatchEntry {
    #[serde(rename = "MatchName")]
    pub match_name: String,

    #[serde(rename = "R")]
    pub r: i64,

    #[serde(rename = "G")]
    pub g: i64,

    #[serde(rename = "B")]
    pub b: i64,
}

/// Exact-RGB lookup table built once from the configured palette.
///
/// Later entries with the same `(r, g, b)` overwrite earlier ones.
#[derive(Debug, Clone, Default)]
pub struct ColorMatchTable {
    entries: HashMap<[u8; 3], ColorMatch>,
}

impl ColorMatchTable {
    /// Build the table from an ordered palette (last-wins on duplicate colors)
    pub fn build<I>(matches: I) -> Self
    where
        I: IntoIterator<Item = ColorMatch>,
    {
        let mut entries = HashMap::new();
        for color_match in matches {
            if let Some(previous) = entries.insert(color_match.rgb(), color_match) {
                tracing::debug!(
                    "Palette entry '{}' ({}, {}, {}) replaced by a later entry",
                    previous.label,
                    previous.r,
                    previous.g,
                    previous.b
                );
            }
        }
        Self { entries }
    }

    pub fn lookup(&self, r: u8, g: u8, b: u8) -> Option<&ColorMatch> {
        self.entries.get(&[r, g, b])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ColorMatch> {
        self.entries.values()
    }
}
