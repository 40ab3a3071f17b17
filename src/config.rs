//! Aggregate device presets
//!
//! A preset file is a JSON document listing aggregate compositions by device
//! UID, so a setup can be recreated with one command:
//!
//! ```json
//! {
//!   "presets": [
//!     {
//!       "name": "Studio",
//!       "uid": "com.example.studio",
//!       "main": "AppleUSBAudioEngine:Focusrite:1",
//!       "sub_devices": ["BuiltInSpeakerDevice"],
//!       "options": { "is_private": false, "is_stacked": false },
//!       "sub_device_settings": [
//!         { "uid": "BuiltInSpeakerDevice", "extra_latency": 32.0 }
//!       ]
//!     }
//!   ]
//! }
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::aggregate::{AggregateDescription, AggregateOptions};
use crate::audio::error::{AudioHalError, Result};

/// Per-member settings applied once the aggregate exists
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubDeviceSettings {
    pub uid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra_latency: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drift_compensation: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drift_compensation_quality: Option<u32>,
}

/// One aggregate composition, devices named by UID
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatePreset {
    pub name: String,
    pub uid: String,
    /// Main sub-device; also the drift reference
    #[serde(default)]
    pub main: Option<String>,
    #[serde(default)]
    pub sub_devices: Vec<String>,
    #[serde(default)]
    pub options: AggregateOptions,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clock_device: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sub_device_settings: Vec<SubDeviceSettings>,
}

impl AggregatePreset {
    /// The description this preset asks the HAL for
    pub fn description(&self) -> Result<AggregateDescription> {
        let description = AggregateDescription::compose(
            self.name.as_str(),
            self.uid.as_str(),
            self.main.as_deref(),
            self.sub_devices.iter().map(String::as_str),
            self.options,
        )?;
        Ok(match &self.clock_device {
            Some(clock) => description.with_clock_device(clock.as_str()),
            None => description,
        })
    }

    pub fn settings_for(&self, uid: &str) -> Option<&SubDeviceSettings> {
        self.sub_device_settings.iter().find(|s| s.uid == uid)
    }
}

/// A set of presets as stored on disk
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PresetFile {
    #[serde(default)]
    pub presets: Vec<AggregatePreset>,
}

impl PresetFile {
    /// `<config dir>/coreaudio-aggregate/presets.json`
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("coreaudio-aggregate")
            .join("presets.json")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            AudioHalError::Config(format!("Cannot read {}: {}", path.display(), e))
        })?;
        let file: Self = serde_json::from_str(&content).map_err(|e| {
            AudioHalError::Config(format!("Cannot parse {}: {}", path.display(), e))
        })?;
        file.validate()?;

        debug!("Loaded {} preset(s) from {}", file.presets.len(), path.display());
        Ok(file)
    }

    /// Load from the default location; a missing file means no presets
    pub fn load_default() -> Result<Self> {
        let path = Self::default_path();
        if !path.exists() {
            info!("No preset file at {}", path.display());
            return Ok(Self::default());
        }
        Self::load(&path)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        self.validate()?;
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| AudioHalError::Config(format!("Cannot serialize presets: {}", e)))?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                AudioHalError::Config(format!("Cannot create {}: {}", parent.display(), e))
            })?;
        }
        fs::write(path, content).map_err(|e| {
            AudioHalError::Config(format!("Cannot write {}: {}", path.display(), e))
        })
    }

    pub fn find(&self, name: &str) -> Option<&AggregatePreset> {
        self.presets.iter().find(|p| p.name == name)
    }

    /// Names and UIDs must be unique and non-empty
    pub fn validate(&self) -> Result<()> {
        for (i, preset) in self.presets.iter().enumerate() {
            if preset.name.is_empty() || preset.uid.is_empty() {
                return Err(AudioHalError::Config(format!(
                    "Preset #{} needs a name and a uid",
                    i
                )));
            }
            let earlier = &self.presets[..i];
            if earlier.iter().any(|p| p.name == preset.name) {
                return Err(AudioHalError::Config(format!(
                    "Duplicate preset name {}",
                    preset.name
                )));
            }
            if earlier.iter().any(|p| p.uid == preset.uid) {
                return Err(AudioHalError::Config(format!(
                    "Duplicate preset uid {}",
                    preset.uid
                )));
            }
        }
        Ok(())
    }
}
