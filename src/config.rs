//! World settings - capacity hints and engine tuning
//!
//! Loaded from YAML for bootstrap code that assembles worlds from files;
//! everything here is a hint or a bound, never behavior.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Sizing hints for a new world plus engine tuning knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldSettings {
    /// Expected peak entity count; pre-sizes the slot and bitset tables.
    #[serde(default = "default_expected_entities")]
    pub expected_entities: usize,
    /// Expected distinct component types; pre-sizes the registry and the
    /// initial width of entity bitsets (both grow past it on demand).
    #[serde(default = "default_expected_component_types")]
    pub expected_component_types: usize,
    /// Tick summaries the engine retains for timing reports.
    #[serde(default = "default_stats_history")]
    pub stats_history: usize,
}

fn default_expected_entities() -> usize {
    128
}

fn default_expected_component_types() -> usize {
    64
}

fn default_stats_history() -> usize {
    100
}

impl Default for WorldSettings {
    fn default() -> Self {
        Self {
            expected_entities: default_expected_entities(),
            expected_component_types: default_expected_component_types(),
            stats_history: default_stats_history(),
        }
    }
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("settings parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("settings validation error: {0}")]
    Validation(String),
}

impl WorldSettings {
    /// Load settings from a YAML file.
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let contents = fs::read_to_string(path)?;
        let settings: WorldSettings = serde_yaml::from_str(&contents)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Save settings to a YAML file.
    pub fn to_yaml<P: AsRef<Path>>(&self, path: P) -> Result<(), SettingsError> {
        let yaml = serde_yaml::to_string(self)?;
        fs::write(path, yaml)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.expected_entities == 0 {
            return Err(SettingsError::Validation(
                "expected_entities must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
