use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// On-disk sound configuration document.
///
/// This is the raw, untyped shape of the JSON file: logical ids mapped to
/// asset files plus optional behavior overrides, and a soundtrack listing.
/// Materializing these entries into typed descriptors (including `inherit`
/// resolution) is the catalog's job; this module only parses.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SoundConfig {
    #[serde(default)]
    pub volume: VolumeConfig,

    #[serde(default)]
    pub soundtrack: SoundtrackConfig,

    /// Logical effect ids mapped to asset files and playback behavior.
    #[serde(default)]
    pub effects: BTreeMap<String, EffectEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolumeConfig {
    /// Soundtrack volume in percent (0-100)
    #[serde(default = "default_volume_percent")]
    pub soundtrack: u8,

    /// Effects volume in percent (0-100)
    #[serde(default = "default_volume_percent")]
    pub effects: u8,
}

fn default_volume_percent() -> u8 {
    100
}

impl Default for VolumeConfig {
    fn default() -> Self {
        Self {
            soundtrack: default_volume_percent(),
            effects: default_volume_percent(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SoundtrackConfig {
    /// Track ids in preferred order; the first entry is the default track.
    #[serde(default)]
    pub songs: Vec<String>,

    /// Track id to asset file mapping.
    #[serde(default)]
    pub files: BTreeMap<String, String>,
}

/// One logical effect entry. Every field is optional so an entry can
/// override just the pieces it cares about; `inherit` copies a full
/// descriptor from another entry before the overrides apply.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EffectEntry {
    #[serde(default)]
    pub file: Option<String>,

    #[serde(default)]
    pub inherit: Option<String>,

    #[serde(default)]
    pub behavior: Option<BehaviorEntry>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BehaviorEntry {
    /// "simultaneous" (default), "queue", or "truncate" (alias "cutoff")
    #[serde(default)]
    pub mode: Option<String>,

    #[serde(default)]
    pub duration_ticks: Option<u32>,

    #[serde(default)]
    pub delay_ticks: Option<u32>,

    #[serde(default)]
    pub scale: Option<ScaleEntry>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScaleEntry {
    #[serde(default)]
    pub per_quantity: Option<f64>,

    #[serde(default)]
    pub min_loops: Option<u32>,

    #[serde(default)]
    pub max_loops: Option<u32>,
}

impl SoundConfig {
    /// Load a sound configuration document from disk.
    ///
    /// Callers are expected to treat any error as non-fatal and fall back to
    /// built-in defaults; nothing in the audio stack hard-fails on a bad or
    /// missing config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::ReadFailed {
            path: path.display().to_string(),
            source,
        })?;

        let config: SoundConfig =
            serde_json::from_str(&content).map_err(|source| ConfigError::ParseFailed {
                path: path.display().to_string(),
                source,
            })?;

        Ok(config)
    }
}
