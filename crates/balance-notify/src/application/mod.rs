//! Application layer for balance-notify.
//!
//! # Responsibilities
//!
//! - Owning the single connection and the reconnect timer
//! - Deciding which inbound payloads are the sentinel
//! - Fanning the sentinel out to subscribers
//!
//! # What does NOT belong here?
//!
//! - Opening sockets or speaking WebSocket (that is infrastructure, behind
//!   the [`Connector`] trait)
//! - Reading config files or parsing CLI flags

pub mod notification_bridge;
pub mod transport;

pub use notification_bridge::{NotificationBridge, Subscription};
pub use transport::{Connector, Transport, TransportError};
