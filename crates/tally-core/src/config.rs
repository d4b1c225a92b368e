//! Service configuration
//!
//! ## Configuration Resolution
//!
//! 1. An explicit path (`--config`), if given, must exist
//! 2. Otherwise the override in the data dir (~/.local/share/tally/config.toml)
//! 3. Otherwise the embedded defaults (compiled into binary)
//!
//! Missing keys in an override fall back to the defaults.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveTime;
use serde::Deserialize;
use tracing::debug;

use crate::analytics::DEFAULT_PALETTE;
use crate::error::{Error, Result};

/// Embedded default config (compiled into binary)
const DEFAULT_CONFIG: &str = include_str!("../../../config/tally.toml");

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RecurrenceConfig {
    /// Run the sweep when enabled
    pub enabled: bool,
    /// Local wall-clock time of the daily sweep, `HH:MM`
    pub run_at: String,
}

impl Default for RecurrenceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            run_at: "00:00".to_string(),
        }
    }
}

impl RecurrenceConfig {
    pub fn run_at_time(&self) -> Result<NaiveTime> {
        parse_run_at(&self.run_at)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    pub palette: Vec<String>,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            palette: DEFAULT_PALETTE.iter().map(|c| c.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct TallyConfig {
    pub recurrence: RecurrenceConfig,
    pub analytics: AnalyticsConfig,
}

impl TallyConfig {
    /// Load configuration (explicit path, then data dir override, then default)
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            let content = fs::read_to_string(path).map_err(|e| {
                Error::Config(format!("Failed to read {}: {}", path.display(), e))
            })?;
            debug!(path = %path.display(), "Loaded config");
            return Self::from_toml_str(&content);
        }

        if let Some(default_path) = default_config_path() {
            if default_path.exists() {
                let content = fs::read_to_string(&default_path).map_err(|e| {
                    Error::Config(format!("Failed to read {}: {}", default_path.display(), e))
                })?;
                debug!(path = %default_path.display(), "Loaded config override");
                return Self::from_toml_str(&content);
            }
        }

        Self::from_toml_str(DEFAULT_CONFIG)
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: TallyConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Invalid config TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        self.recurrence.run_at_time()?;
        for color in &self.analytics.palette {
            if color.trim().is_empty() {
                return Err(Error::Config("palette colors must not be empty".to_string()));
            }
        }
        Ok(())
    }
}

/// Default override location in the platform data dir
pub fn default_config_path() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("tally").join("config.toml"))
}

/// Parse an `HH:MM` wall-clock time
pub fn parse_run_at(s: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(s.trim(), "%H:%M")
        .map_err(|_| Error::Config(format!("Invalid run_at '{}', expected HH:MM", s)))
}
