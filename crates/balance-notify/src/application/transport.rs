//! The seam between the bridge and whatever carries the messages.
//!
//! The bridge only needs two things from a transport: a way to open it, and a
//! way to wait for the next inbound text frame.  Keeping that behind traits
//! lets the bridge run against a real WebSocket in production and against an
//! in-memory channel (or a `mockall` mock) in tests.

use async_trait::async_trait;
use thiserror::Error;

/// Transport-level failures.
///
/// The bridge treats every variant the same way as a normal close: clear the
/// connection and schedule a reconnect.  The variants only exist so the log
/// line says what happened.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// The transport could not be opened.
    #[error("failed to connect to {endpoint}: {reason}")]
    Connect { endpoint: String, reason: String },

    /// The opening handshake did not finish in time.
    #[error("timed out connecting to {endpoint}")]
    Timeout { endpoint: String },

    /// An established transport failed while reading.
    #[error("receive failed: {0}")]
    Receive(String),
}

/// Opens transports to an endpoint.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Opens a new transport to `endpoint`.
    ///
    /// Returning `Ok` is the "open" confirmation: the bridge moves to
    /// `Connected` as soon as this resolves successfully.
    async fn open(&self, endpoint: &str) -> Result<Box<dyn Transport>, TransportError>;
}

/// A receive-only, message-oriented connection.
#[async_trait]
pub trait Transport: Send {
    /// Waits for the next inbound text payload.
    ///
    /// - `Ok(Some(text))` – a text frame arrived.
    /// - `Ok(None)` – the peer closed the connection.
    /// - `Err(_)` – the connection failed.
    ///
    /// Non-text frames are the transport's business and are never surfaced.
    async fn recv(&mut self) -> Result<Option<String>, TransportError>;
}
