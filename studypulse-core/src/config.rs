//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/studypulse/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/studypulse/` (~/.config/studypulse/)
//! - State/Logs: `$XDG_STATE_HOME/studypulse/` (~/.local/state/studypulse/)

use crate::analytics::AnalyticsOptions;
use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Analytics thresholds
    #[serde(default)]
    pub analytics: AnalyticsConfig,

    /// Record export locations
    #[serde(default)]
    pub sources: SourcesConfig,

    /// Watch mode settings
    #[serde(default)]
    pub watch: WatchConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Minimum-data thresholds and cohort limits.
#[derive(Debug, Deserialize)]
pub struct AnalyticsConfig {
    /// Sessions required before the correlation analysis runs
    #[serde(default = "default_min_sessions_for_correlation")]
    pub min_sessions_for_correlation: usize,

    /// Sessions required before cohort retention is computed
    #[serde(default = "default_min_sessions_for_cohorts")]
    pub min_sessions_for_cohorts: usize,

    /// Number of most recent cohorts to report
    #[serde(default = "default_max_cohorts")]
    pub max_cohorts: usize,

    /// Weeks after the cohort week to track
    #[serde(default = "default_retention_weeks")]
    pub retention_weeks: u32,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            min_sessions_for_correlation: default_min_sessions_for_correlation(),
            min_sessions_for_cohorts: default_min_sessions_for_cohorts(),
            max_cohorts: default_max_cohorts(),
            retention_weeks: default_retention_weeks(),
        }
    }
}

impl AnalyticsConfig {
    /// Options handed to [`crate::analytics::compute_analytics`].
    pub fn options(&self) -> AnalyticsOptions {
        AnalyticsOptions {
            min_sessions_for_correlation: self.min_sessions_for_correlation,
            min_sessions_for_cohorts: self.min_sessions_for_cohorts,
            max_cohorts: self.max_cohorts,
            retention_weeks: self.retention_weeks,
        }
    }

    /// Validate configuration, returning error message if invalid
    pub fn validate(&self) -> Result<()> {
        if self.max_cohorts == 0 {
            return Err(Error::Config(
                "analytics.max_cohorts must be at least 1".to_string(),
            ));
        }
        if self.retention_weeks == 0 || self.retention_weeks > 52 {
            return Err(Error::Config(
                "analytics.retention_weeks must be between 1 and 52".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_min_sessions_for_correlation() -> usize {
    5
}

fn default_min_sessions_for_cohorts() -> usize {
    10
}

fn default_max_cohorts() -> usize {
    8
}

fn default_retention_weeks() -> u32 {
    4
}

/// Paths to the record exports.
///
/// Each file is either a JSON array of objects or JSON Lines.
#[derive(Debug, Deserialize, Default, Clone)]
pub struct SourcesConfig {
    /// App-usage session export
    pub sessions: Option<PathBuf>,
    /// Pretest questionnaire export
    pub pretest: Option<PathBuf>,
    /// Posttest questionnaire export
    pub posttest: Option<PathBuf>,
    /// Demographic survey export
    pub demographics: Option<PathBuf>,
}

/// Watch mode settings
#[derive(Debug, Deserialize)]
pub struct WatchConfig {
    /// Debounce window for file change notifications (milliseconds)
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
        }
    }
}

fn default_debounce_ms() -> u64 {
    500
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Maximum number of log files to keep
    #[serde(default = "default_max_log_files")]
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_files: default_max_log_files(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_log_files() -> usize {
    5
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        config.analytics.validate()?;
        Ok(config)
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/studypulse/config.toml` (~/.config/studypulse/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("studypulse").join("config.toml")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/studypulse/` (~/.local/state/studypulse/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("studypulse")
    }

    /// Returns the log file path
    ///
    /// `$XDG_STATE_HOME/studypulse/studypulse.log` (~/.local/state/studypulse/studypulse.log)
    pub fn log_path() -> PathBuf {
        Self::state_dir().join("studypulse.log")
    }
}
