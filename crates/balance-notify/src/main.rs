//! balance-notify: entry point.
//!
//! Keeps a WebSocket open to the administrative backend and logs every
//! completed balance run.  Useful on its own as a watchdog for the background
//! balancer, and as a reference for wiring [`NotificationBridge`] into a
//! larger application.
//!
//! # Usage
//!
//! ```text
//! balance-notify [OPTIONS]
//!
//! Options:
//!   --config <PATH>               TOML settings file
//!   --endpoint <URL>              WebSocket endpoint [default: ws://localhost:8000/ws]
//!   --reconnect-delay-ms <MS>     Delay before reconnecting [default: 5000]
//!   --connect-timeout-ms <MS>     Opening handshake timeout [default: 10000]
//!   --sentinel <TEXT>             Payload that signals completion [default: balance_done]
//!   --print-config                Print the effective settings as TOML and exit
//! ```
//!
//! # Precedence
//!
//! CLI flags and environment variables beat the settings file, which beats the
//! built-in defaults.
//!
//! | Variable                              | Flag                   |
//! |---------------------------------------|------------------------|
//! | `BALANCE_NOTIFY_CONFIG`               | `--config`             |
//! | `BALANCE_NOTIFY_ENDPOINT`             | `--endpoint`           |
//! | `BALANCE_NOTIFY_RECONNECT_DELAY_MS`   | `--reconnect-delay-ms` |
//! | `BALANCE_NOTIFY_CONNECT_TIMEOUT_MS`   | `--connect-timeout-ms` |
//! | `BALANCE_NOTIFY_SENTINEL`             | `--sentinel`           |

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use balance_notify::infrastructure::config_file::{load_config, AppConfig, NotifierSection};
use balance_notify::infrastructure::ws_transport::WsConnector;
use balance_notify::NotificationBridge;

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Listens for balance completion signals from the administrative backend.
#[derive(Debug, Parser)]
#[command(
    name = "balance-notify",
    about = "Persistent WebSocket listener for balance completion signals",
    version
)]
struct Cli {
    /// TOML settings file.  A missing file is treated as empty.
    #[arg(long, env = "BALANCE_NOTIFY_CONFIG")]
    config: Option<PathBuf>,

    /// WebSocket URL of the notification endpoint.
    #[arg(long, env = "BALANCE_NOTIFY_ENDPOINT")]
    endpoint: Option<String>,

    /// Fixed delay in milliseconds between a disconnect and the next attempt.
    #[arg(long, env = "BALANCE_NOTIFY_RECONNECT_DELAY_MS")]
    reconnect_delay_ms: Option<u64>,

    /// Maximum time in milliseconds for the opening handshake.
    #[arg(long, env = "BALANCE_NOTIFY_CONNECT_TIMEOUT_MS")]
    connect_timeout_ms: Option<u64>,

    /// Text payload that signals a completed balance run.
    #[arg(long, env = "BALANCE_NOTIFY_SENTINEL")]
    sentinel: Option<String>,

    /// Print the effective settings as TOML and exit.
    #[arg(long)]
    print_config: bool,
}

impl Cli {
    /// Loads the settings file (if any), applies CLI overrides on top, and
    /// normalizes the result the way the bridge will see it.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings file exists but cannot be read or
    /// parsed.
    fn resolve(&self) -> anyhow::Result<AppConfig> {
        let mut config = match &self.config {
            Some(path) => load_config(path)
                .with_context(|| format!("failed to load settings from {}", path.display()))?,
            None => AppConfig::default(),
        };
        self.apply_overrides(&mut config.notifier);
        Ok(config.normalized())
    }

    fn apply_overrides(&self, section: &mut NotifierSection) {
        if let Some(endpoint) = &self.endpoint {
            section.endpoint = endpoint.clone();
        }
        if let Some(delay) = self.reconnect_delay_ms {
            section.reconnect_delay_ms = delay;
        }
        if let Some(timeout) = self.connect_timeout_ms {
            section.connect_timeout_ms = timeout;
        }
        if let Some(sentinel) = &self.sentinel {
            section.sentinel = sentinel.clone();
        }
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let app_config = cli.resolve()?;

    if cli.print_config {
        print!("{}", app_config.to_toml_string()?);
        return Ok(());
    }

    // `RUST_LOG` wins; otherwise use the settings file's level.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&app_config.logging.level)),
        )
        .init();

    let config = app_config.notifier.to_notifier_config();
    config
        .validate()
        .context("invalid notifier settings")?;

    info!(
        endpoint = %config.endpoint,
        reconnect_delay_ms = app_config.notifier.reconnect_delay_ms,
        sentinel = %config.sentinel,
        "balance-notify starting"
    );

    let bridge = NotificationBridge::new(config, WsConnector::new());

    let completed = Arc::new(AtomicU64::new(0));
    let completed_in_callback = Arc::clone(&completed);
    let _subscription = bridge.subscribe_fn(move || {
        let total = completed_in_callback.fetch_add(1, Ordering::Relaxed) + 1;
        info!(total, "balance run completed");
    });

    bridge.connect();

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl+C")?;
    info!("received Ctrl+C, shutting down");

    bridge.stop();

    info!(
        completed = completed.load(Ordering::Relaxed),
        "balance-notify stopped"
    );
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
