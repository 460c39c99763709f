//! Display Configuration
//!
//! Settings for the terminal display, loaded from an optional TOML file at
//! `$XDG_CONFIG_HOME/console-display/display.toml`.
//!
//! # Configuration Priority
//!
//! 1. Environment variables (`CONSOLE_DISPLAY_*`)
//! 2. TOML configuration file
//! 3. Default values
//!
//! # Example Configuration
//!
//! ```toml
//! title = " XiaoZhi AI Terminal "
//! prompt = "Input: "
//! log_capacity = 6
//! truncate_limit = 80
//! poll_interval_ms = 1000
//! input_poll_ms = 100
//! log_filter = "warn"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::state::DEFAULT_LOG_CAPACITY;

/// Errors that can occur when loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file at {path}: {source}")]
    ReadError {
        /// The path that was attempted
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("Failed to parse TOML config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Terminal display settings
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Title centered in the dashboard frame
    pub title: String,
    /// Prompt written at the start of the input row
    pub prompt: String,
    /// Number of intercepted log lines kept on the dashboard
    pub log_capacity: usize,
    /// Dashboard fields longer than this many characters are cut with an ellipsis
    pub truncate_limit: usize,
    /// How long the command dispatcher waits for work before re-checking shutdown
    pub poll_interval_ms: u64,
    /// How long the input reader waits for a keystroke before re-checking shutdown
    pub input_poll_ms: u64,
    /// Override terminal detection (`None` = detect from stdout)
    pub force_ansi: Option<bool>,
    /// `EnvFilter` directives used when `RUST_LOG` is not set
    pub log_filter: String,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            title: " XiaoZhi AI Terminal ".to_string(),
            prompt: "Input: ".to_string(),
            log_capacity: DEFAULT_LOG_CAPACITY,
            truncate_limit: 80,
            poll_interval_ms: 1000,
            input_poll_ms: 100,
            force_ansi: None,
            log_filter: "warn".to_string(),
        }
    }
}

impl DisplayConfig {
    /// Default location of the configuration file
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("console-display").join("display.toml"))
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Defaults with environment overrides applied
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_overrides(|key| std::env::var(key).ok());
        config
    }

    /// Full load: file (if present), then environment, then validation
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match Self::default_path() {
            Some(path) if path.exists() => Self::load_from_file(&path)?,
            _ => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Apply `CONSOLE_DISPLAY_*` overrides from `lookup`
    ///
    /// Values that fail to parse are ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("CONSOLE_DISPLAY_TITLE") {
            self.title = v;
        }
        if let Some(v) = lookup("CONSOLE_DISPLAY_PROMPT") {
            self.prompt = v;
        }
        if let Some(v) = lookup("CONSOLE_DISPLAY_LOG_CAPACITY").and_then(|v| v.parse().ok()) {
            self.log_capacity = v;
        }
        if let Some(v) = lookup("CONSOLE_DISPLAY_TRUNCATE_LIMIT").and_then(|v| v.parse().ok()) {
            self.truncate_limit = v;
        }
        if let Some(v) = lookup("CONSOLE_DISPLAY_POLL_INTERVAL_MS").and_then(|v| v.parse().ok()) {
            self.poll_interval_ms = v;
        }
        if let Some(v) = lookup("CONSOLE_DISPLAY_INPUT_POLL_MS").and_then(|v| v.parse().ok()) {
            self.input_poll_ms = v;
        }
        if let Some(v) = lookup("CONSOLE_DISPLAY_FORCE_ANSI") {
            self.force_ansi = match v.to_lowercase().as_str() {
                "1" | "true" | "yes" => Some(true),
                "0" | "false" | "no" => Some(false),
                _ => self.force_ansi,
            };
        }
        if let Some(v) = lookup("CONSOLE_DISPLAY_LOG_FILTER") {
            self.log_filter = v;
        }
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.log_capacity == 0 {
            return Err(ConfigError::ValidationError(
                "log_capacity must be at least 1".to_string(),
            ));
        }
        if self.truncate_limit < 2 {
            return Err(ConfigError::ValidationError(
                "truncate_limit must be at least 2".to_string(),
            ));
        }
        if self.poll_interval_ms == 0 || self.input_poll_ms == 0 {
            return Err(ConfigError::ValidationError(
                "poll intervals must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn input_poll(&self) -> Duration {
        Duration::from_millis(self.input_poll_ms)
    }
}

// =============================================================================
// Tests
// =============================================================================
