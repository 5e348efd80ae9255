//! # balance-notify-core
//!
//! Shared domain types for the balance completion notifier.
//!
//! The administrative backend (departments, instructors, students) rebalances
//! department assignments in background jobs.  When a job finishes, the server
//! pushes the text frame `"balance_done"` over a persistent WebSocket.  This
//! crate holds everything about that contract that does not need a socket:
//!
//! - **`domain::config`** – [`NotifierConfig`]: which endpoint to dial, how long
//!   to wait before reconnecting, and which payload counts as the sentinel.
//!
//! - **`domain::state`** – [`ConnectionState`]: the lifecycle of the single
//!   connection (`Disconnected → Connecting → Connected → Disconnected → …`).
//!
//! - **`domain::subscribers`** – [`SubscriberRegistry`]: the set of zero-argument
//!   callbacks that are told when a balance run completes, plus [`deliver`],
//!   which fans a notification out to them with per-callback panic isolation.
//!
//! This crate has no dependency on an async runtime or a network library, so
//! all of it can be unit-tested without opening a socket.

pub mod domain;

pub use domain::config::{ConfigError, NotifierConfig};
pub use domain::state::ConnectionState;
pub use domain::subscribers::{
    deliver, DeliveryReport, Subscriber, SubscriberId, SubscriberRegistry,
};
