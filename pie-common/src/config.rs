//! Configuration management for Pie Planner.
//!
//! Configuration lives at `~/.pieplanner/config.json`. A missing file means
//! defaults.
//!
//! # Configuration Priority
//!
//! 1. Environment variables (PIE_* prefix)
//! 2. Explicit config file values
//! 3. Default values
//!
//! # Environment Variable Mapping
//!
//! - `PIE_LOG_LEVEL` → log_level
//! - `PIE_LOG_FORMAT` → log_format
//! - `PIE_STATE_FILE` → state_file
//! - `PIE_INVESTMENT_AMOUNT` → default_investment_amount

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Get the configuration directory path.
pub fn config_dir() -> PathBuf {
    directories::UserDirs::new().map_or_else(
        || PathBuf::from(".pieplanner"),
        |dirs| dirs.home_dir().join(".pieplanner"),
    )
}

/// Get the configuration file path.
pub fn config_path() -> PathBuf {
    config_dir().join("config.json")
}

// ============================================================================
// Import Configuration
// ============================================================================

/// Markers used to pick position rows out of a brokerage CSV export.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportConfig {
    /// Every marker must appear on the header line.
    #[serde(default = "default_header_markers")]
    pub header_markers: Vec<String>,

    /// Rows whose description column contains this are skipped.
    #[serde(default = "default_skip_marker")]
    pub skip_marker: String,

    /// A row whose first column contains this ends the position table.
    #[serde(default = "default_footer_marker")]
    pub footer_marker: String,
}

fn default_header_markers() -> Vec<String> {
    vec!["Account Number".into(), "Symbol".into()]
}

fn default_skip_marker() -> String {
    "Pending activity".into()
}

fn default_footer_marker() -> String {
    "The data and information".into()
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            header_markers: default_header_markers(),
            skip_marker: default_skip_marker(),
            footer_marker: default_footer_marker(),
        }
    }
}

// ============================================================================
// Root Configuration
// ============================================================================

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Base log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// "pretty" or "json"
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Where the portfolio snapshot is stored. `~` is expanded.
    #[serde(default)]
    pub state_file: Option<String>,

    /// Investment amount used when a snapshot does not carry one.
    #[serde(default = "default_investment_amount")]
    pub default_investment_amount: f64,

    #[serde(default)]
    pub import: ImportConfig,
}

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "pretty".into()
}

fn default_investment_amount() -> f64 {
    1000.0
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
            state_file: None,
            default_investment_amount: default_investment_amount(),
            import: ImportConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from the default path.
    pub fn load() -> Result<Self> {
        let path = config_path();
        if !path.exists() {
            tracing::debug!("Config file not found, using defaults");
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// Load configuration with environment variable overrides.
    pub fn load_with_env() -> Result<Self> {
        let mut config = Self::load()?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_with(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary key lookup.
    pub fn apply_overrides_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(level) = lookup("PIE_LOG_LEVEL") {
            self.log_level = level;
        }
        if let Some(format) = lookup("PIE_LOG_FORMAT") {
            self.log_format = format;
        }
        if let Some(path) = lookup("PIE_STATE_FILE") {
            self.state_file = Some(path);
        }
        if let Some(amount) = lookup("PIE_INVESTMENT_AMOUNT") {
            match amount.parse() {
                Ok(a) => self.default_investment_amount = a,
                Err(_) => tracing::warn!(value = %amount, "Ignoring unparsable PIE_INVESTMENT_AMOUNT"),
            }
        }
    }

    /// Save configuration to the default path.
    pub fn save(&self) -> Result<()> {
        self.save_to(&config_path())
    }

    /// Save configuration to a specific path, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() && !dir.exists() {
                fs::create_dir_all(dir).with_context(|| {
                    format!("Failed to create config directory {}", dir.display())
                })?;
            }
        }

        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write config to {}", path.display()))
    }

    /// Resolved snapshot path: `state_file` with `~` expanded, or
    /// `portfolio.json` next to the config file.
    pub fn state_path(&self) -> PathBuf {
        match &self.state_file {
            Some(raw) => PathBuf::from(shellexpand::tilde(raw).into_owned()),
            None => config_dir().join("portfolio.json"),
        }
    }
}
