//! TOML settings file for the notifier.
//!
//! ```toml
//! [notifier]
//! endpoint = "ws://localhost:8000/ws"
//! reconnect_delay_ms = 5000
//! connect_timeout_ms = 10000
//! sentinel = "balance_done"
//!
//! [logging]
//! level = "info"
//! ```
//!
//! # Serde default values
//!
//! Every field carries `#[serde(default = "...")]`, so a file may set only the
//! values it cares about (an empty file is valid) and older files keep working
//! when new fields are added.

use std::path::{Path, PathBuf};
use std::time::Duration;

use balance_notify_core::domain::config::{
    DEFAULT_CONNECT_TIMEOUT, DEFAULT_ENDPOINT, DEFAULT_RECONNECT_DELAY, DEFAULT_SENTINEL,
};
use balance_notify_core::NotifierConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for config file operations.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config could not be serialized to TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level settings file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppConfig {
    #[serde(default)]
    pub notifier: NotifierSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

/// Connection settings.  Durations are stored in whole milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NotifierSection {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_sentinel")]
    pub sentinel: String,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoggingSection {
    /// `tracing` filter directive used when `RUST_LOG` is not set, e.g.
    /// `"info"` or `"balance_notify=debug"`.
    #[serde(default = "default_log_level")]
    pub level: String,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}
fn default_reconnect_delay_ms() -> u64 {
    DEFAULT_RECONNECT_DELAY.as_millis() as u64
}
fn default_connect_timeout_ms() -> u64 {
    DEFAULT_CONNECT_TIMEOUT.as_millis() as u64
}
fn default_sentinel() -> String {
    DEFAULT_SENTINEL.to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for NotifierSection {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
            sentinel: default_sentinel(),
        }
    }
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl NotifierSection {
    /// Converts the file representation into the domain config.
    ///
    /// The endpoint is trimmed, so stray whitespace from a hand-edited file or
    /// an environment variable does not end up in the dialled URL.
    pub fn to_notifier_config(&self) -> NotifierConfig {
        NotifierConfig {
            endpoint: self.endpoint.trim().to_string(),
            reconnect_delay: Duration::from_millis(self.reconnect_delay_ms),
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            sentinel: self.sentinel.clone(),
        }
    }
}

impl From<&NotifierConfig> for NotifierSection {
    fn from(config: &NotifierConfig) -> Self {
        Self {
            endpoint: config.endpoint.clone(),
            reconnect_delay_ms: config.reconnect_delay.as_millis() as u64,
            connect_timeout_ms: config.connect_timeout.as_millis() as u64,
            sentinel: config.sentinel.clone(),
        }
    }
}

impl AppConfig {
    /// Parses a settings file body.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigFileError::Parse`] if the TOML is malformed or a field
    /// has the wrong type.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigFileError> {
        Ok(toml::from_str(content)?)
    }

    /// Returns the settings as the bridge will use them, with the notifier
    /// section passed through [`NotifierConfig`] and back.
    pub fn normalized(&self) -> Self {
        Self {
            notifier: NotifierSection::from(&self.notifier.to_notifier_config()),
            logging: self.logging.clone(),
        }
    }

    /// Renders the settings as pretty-printed TOML.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigFileError::Serialize`] if serialization fails.
    pub fn to_toml_string(&self) -> Result<String, ConfigFileError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Loads `AppConfig` from `path`, returning `AppConfig::default()` if the file
/// does not exist.
///
/// # Errors
///
/// Returns [`ConfigFileError::Io`] for file-system errors other than "not
/// found", and [`ConfigFileError::Parse`] if the TOML is malformed.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigFileError> {
    match std::fs::read_to_string(path) {
        Ok(content) => AppConfig::from_toml_str(&content),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(AppConfig::default()),
        Err(source) => Err(ConfigFileError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
