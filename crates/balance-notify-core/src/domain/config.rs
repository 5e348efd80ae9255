//! Notifier configuration.
//!
//! [`NotifierConfig`] is a plain struct with no global state.  The binary
//! builds it from defaults, an optional TOML file, and CLI flags, then hands it
//! to the bridge by value.  Tests build it directly with short delays.

use std::time::Duration;

use thiserror::Error;

/// Endpoint used by the reference deployment.
pub const DEFAULT_ENDPOINT: &str = "ws://localhost:8000/ws";

/// Payload the server sends when a background balance run finishes.
pub const DEFAULT_SENTINEL: &str = "balance_done";

/// Fixed wait between a close and the next connection attempt.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(5000);

/// Upper bound on the WebSocket opening handshake.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Reasons a [`NotifierConfig`] is rejected by [`NotifierConfig::validate`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// The endpoint is not a `ws://` or `wss://` URL, or contains whitespace.
    #[error("endpoint must be a ws:// or wss:// URL without whitespace, got '{0}'")]
    InvalidEndpoint(String),

    /// A zero reconnect delay would turn a dead server into a busy loop.
    #[error("reconnect delay must be greater than zero")]
    ZeroReconnectDelay,

    /// A zero connect timeout would fail every attempt immediately.
    #[error("connect timeout must be greater than zero")]
    ZeroConnectTimeout,

    /// An empty sentinel would never match a text frame worth reporting.
    #[error("sentinel payload must not be empty")]
    EmptySentinel,
}

/// All runtime settings for the notification bridge.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use balance_notify_core::NotifierConfig;
///
/// let cfg = NotifierConfig::default();
/// assert_eq!(cfg.endpoint, "ws://localhost:8000/ws");
/// assert_eq!(cfg.reconnect_delay, Duration::from_millis(5000));
/// assert!(cfg.is_sentinel("balance_done"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotifierConfig {
    /// WebSocket URL of the backend notification endpoint.
    pub endpoint: String,

    /// Delay between a close (normal or not) and the next connection attempt.
    ///
    /// The delay is constant: there is no backoff growth and no retry ceiling.
    pub reconnect_delay: Duration,

    /// Maximum time allowed for the opening handshake.  An attempt that runs
    /// past it is treated exactly like any other close.
    pub connect_timeout: Duration,

    /// The one payload that triggers subscriber notification.
    pub sentinel: String,
}

impl Default for NotifierConfig {
    /// | Field             | Default                    |
    /// |-------------------|----------------------------|
    /// | endpoint          | `ws://localhost:8000/ws`   |
    /// | reconnect_delay   | 5000 ms                    |
    /// | connect_timeout   | 10 s                       |
    /// | sentinel          | `balance_done`             |
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            sentinel: DEFAULT_SENTINEL.to_string(),
        }
    }
}

impl NotifierConfig {
    /// Creates a config for `endpoint` with every other field at its default.
    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Self::default()
        }
    }

    /// Checks the config, returning the first rule it breaks.
    ///
    /// # Errors
    ///
    /// See [`ConfigError`] for the individual rules.
    pub fn validate(&self) -> Result<(), ConfigError> {
        // Checked as stored: this exact string is what gets dialled.
        let endpoint = self.endpoint.as_str();
        let has_ws_scheme = ["ws://", "wss://"].iter().any(|scheme| {
            endpoint.len() > scheme.len()
                && endpoint
                    .get(..scheme.len())
                    .is_some_and(|prefix| prefix.eq_ignore_ascii_case(scheme))
        });
        if !has_ws_scheme || endpoint.chars().any(char::is_whitespace) {
            return Err(ConfigError::InvalidEndpoint(self.endpoint.clone()));
        }
        if self.reconnect_delay.is_zero() {
            return Err(ConfigError::ZeroReconnectDelay);
        }
        if self.connect_timeout.is_zero() {
            return Err(ConfigError::ZeroConnectTimeout);
        }
        if self.sentinel.is_empty() {
            return Err(ConfigError::EmptySentinel);
        }
        Ok(())
    }

    /// Returns `true` when `payload` is exactly the sentinel.
    ///
    /// The comparison is byte-for-byte: no trimming, no case folding.
    pub fn is_sentinel(&self, payload: &str) -> bool {
        payload == self.sentinel
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
