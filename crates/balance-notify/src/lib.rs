//! balance-notify library crate.
//!
//! Keeps one persistent WebSocket open to the administrative backend and tells
//! every interested party when a background balance run has finished.
//!
//! # Architecture (clean architecture)
//!
//! ```text
//! Backend  ("balance_done" text frames over WebSocket)
//!         ↓
//! [balance-notify]
//!   ├── application/        NotificationBridge state machine, Connector seam
//!   └── infrastructure/
//!         ├── ws_transport/      tokio-tungstenite client transport
//!         ├── channel_transport/ in-memory transport for tests
//!         └── config_file/       TOML settings file
//!         ↓
//! Subscribers  (zero-argument callbacks)
//! ```
//!
//! Domain types (config, connection state, subscriber registry) live in the
//! `balance-notify-core` crate and are re-exported here.
//!
//! # Layer rules
//!
//! - `application` depends on `balance-notify-core` and `tokio` only; it never
//!   names a WebSocket type.
//! - `infrastructure` implements the application's `Connector` trait and owns
//!   every file and socket.

/// Application layer: the notification bridge and its transport seam.
pub mod application;

/// Infrastructure layer: WebSocket and in-memory transports, config file.
pub mod infrastructure;

pub use application::{Connector, NotificationBridge, Subscription, Transport, TransportError};
pub use balance_notify_core::{ConnectionState, NotifierConfig, Subscriber};
