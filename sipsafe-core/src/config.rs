//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/sipsafe/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/sipsafe/` (~/.config/sipsafe/)
//! - Data: `$XDG_DATA_HOME/sipsafe/` (~/.local/share/sipsafe/)
//! - State/Logs: `$XDG_STATE_HOME/sipsafe/` (~/.local/state/sipsafe/)

use crate::error::{Error, Result};
use crate::types::{EmergencyContact, PhysiologicalProfile, Sex};
use serde::Deserialize;
use std::path::PathBuf;

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

/// Returns XDG_DATA_HOME or ~/.local/share
fn xdg_data_home() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/share"))
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
    /// Physiological profile used for BAC estimation (optional)
    #[serde(default)]
    pub profile: Option<ProfileConfig>,

    /// Emergency contacts notified on a danger alert
    #[serde(default)]
    pub contacts: Vec<EmergencyContact>,

    /// Live session tracking
    #[serde(default)]
    pub session: SessionConfig,

    /// Analytics configuration
    #[serde(default)]
    pub analytics: AnalyticsConfig,

    /// SipSafe backend configuration (optional)
    #[serde(default)]
    pub backend: BackendConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Profile section as written by the user.
///
/// Both fields are optional so a half-filled profile still loads; the
/// missing parts fall back to [`PhysiologicalProfile::default`].
#[derive(Debug, Deserialize, Clone, Default)]
pub struct ProfileConfig {
    pub weight_lbs: Option<f64>,
    pub sex: Option<Sex>,
}

impl ProfileConfig {
    /// Build a usable profile, filling gaps with defaults.
    pub fn to_profile(&self) -> PhysiologicalProfile {
        let default = PhysiologicalProfile::default();
        PhysiologicalProfile {
            weight_lbs: self.weight_lbs.unwrap_or(default.weight_lbs),
            sex: self.sex.unwrap_or(default.sex),
        }
        .sanitized()
    }
}

/// Session tracking configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    /// Seconds between live BAC recomputations
    #[serde(default = "default_tick_interval")]
    pub tick_interval_secs: u64,

    /// A hydration nudge fires on every Nth logged drink
    #[serde(default = "default_hydration_nudge_every")]
    pub hydration_nudge_every: u32,

    /// Seconds to wait for photo verification before giving up
    #[serde(default = "default_verification_timeout")]
    pub verification_timeout_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            tick_interval_secs: default_tick_interval(),
            hydration_nudge_every: default_hydration_nudge_every(),
            verification_timeout_secs: default_verification_timeout(),
        }
    }
}

fn default_tick_interval() -> u64 {
    60
}

fn default_hydration_nudge_every() -> u32 {
    3
}

fn default_verification_timeout() -> u64 {
    20
}

/// Analytics configuration
#[derive(Debug, Deserialize, Clone)]
pub struct AnalyticsConfig {
    /// How many raw logs to pull when aggregating locally
    #[serde(default = "default_fallback_log_limit")]
    pub fallback_log_limit: usize,

    /// Range used when none is given ("1d", "1w", "1m", "1y", "all")
    #[serde(default = "default_range")]
    pub default_range: String,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            fallback_log_limit: default_fallback_log_limit(),
            default_range: default_range(),
        }
    }
}

fn default_fallback_log_limit() -> usize {
    500
}

fn default_range() -> String {
    "1w".to_string()
}

/// SipSafe backend configuration
///
/// When enabled, drink logs are mirrored to the backend, analytics are
/// fetched pre-aggregated, and photo scans and SMS alerts go through it.
#[derive(Debug, Deserialize, Clone)]
pub struct BackendConfig {
    /// Enable/disable backend integration
    #[serde(default)]
    pub enabled: bool,

    /// Backend base URL (e.g., `https://sipsafe.example.com`)
    pub server_url: Option<String>,

    /// Bearer token issued by the backend's login endpoint
    pub api_token: Option<String>,

    /// HTTP request timeout in seconds
    #[serde(default = "default_backend_timeout")]
    pub timeout_secs: u64,

    /// Max retry attempts for transient failures
    #[serde(default = "default_backend_max_retries")]
    pub max_retries: usize,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            server_url: None,
            api_token: None,
            timeout_secs: default_backend_timeout(),
            max_retries: default_backend_max_retries(),
        }
    }
}

impl BackendConfig {
    /// Check if the backend is properly configured and enabled
    pub fn is_ready(&self) -> bool {
        self.enabled && self.server_url.is_some() && self.api_token.is_some()
    }

    /// Validate configuration, returning error message if invalid
    pub fn validate(&self) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }

        if self.server_url.is_none() {
            return Err(Error::Config(
                "backend.server_url is required when backend is enabled".to_string(),
            ));
        }
        if self.api_token.is_none() {
            return Err(Error::Config(
                "backend.api_token is required when backend is enabled".to_string(),
            ));
        }
        if self.timeout_secs == 0 {
            return Err(Error::Config(
                "backend.timeout_secs must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_backend_timeout() -> u64 {
    15
}

fn default_backend_max_retries() -> usize {
    2
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
    pub fn load_from(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        Ok(config)
    }

    /// Profile from config, or the default profile when none is configured.
    pub fn profile(&self) -> PhysiologicalProfile {
        self.profile
            .as_ref()
            .map(ProfileConfig::to_profile)
            .unwrap_or_default()
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/sipsafe/config.toml` (~/.config/sipsafe/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("sipsafe").join("config.toml")
    }

    /// Returns the data directory path (for SQLite database)
    ///
    /// `$XDG_DATA_HOME/sipsafe/` (~/.local/share/sipsafe/)
    pub fn data_dir() -> PathBuf {
        xdg_data_home().join("sipsafe")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/sipsafe/` (~/.local/state/sipsafe/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("sipsafe")
    }

    /// Returns the database file path
    ///
    /// `$XDG_DATA_HOME/sipsafe/sipsafe.db`
    pub fn database_path() -> PathBuf {
        Self::data_dir().join("sipsafe.db")
    }
}
