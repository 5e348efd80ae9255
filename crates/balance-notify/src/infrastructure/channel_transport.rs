//! In-memory transport for driving the bridge without a network.
//!
//! # Why an in-memory transport?
//!
//! The interesting behaviour of the bridge (idempotent connect, fan-out,
//! reconnect timing) has nothing to do with WebSocket framing.  Driving it
//! through `tokio::sync::mpsc` channels lets tests play the server's part
//! precisely: accept a connection, push a payload, close it, refuse the next
//! attempt, and count how many attempts were made.
//!
//! # Usage in tests
//!
//! ```ignore
//! let (connector, mut server) = channel_pair();
//! let bridge = NotificationBridge::new(config, connector);
//! bridge.connect();
//!
//! let peer = server.accept().await.unwrap();
//! peer.send_text("balance_done");
//! peer.close();
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::application::{Connector, Transport, TransportError};

/// How the fake server answers the next connection attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AcceptMode {
    /// Hand out a new connection.
    #[default]
    Accept,
    /// Fail the attempt straight away.
    Refuse,
    /// Never answer, so the attempt runs into the connect timeout.
    Stall,
}

/// What the server side pushes down a connection.
#[derive(Debug)]
enum Frame {
    Text(String),
    Close,
    Fail(String),
}

struct Shared {
    attempts: AtomicUsize,
    mode: Mutex<AcceptMode>,
    accepted: mpsc::UnboundedSender<RemotePeer>,
}

/// Creates a connected connector / server pair.
pub fn channel_pair() -> (ChannelConnector, ChannelServer) {
    let (accepted_tx, accepted_rx) = mpsc::unbounded_channel();
    let shared = Arc::new(Shared {
        attempts: AtomicUsize::new(0),
        mode: Mutex::new(AcceptMode::Accept),
        accepted: accepted_tx,
    });
    (
        ChannelConnector {
            shared: Arc::clone(&shared),
        },
        ChannelServer {
            shared,
            accepted: accepted_rx,
        },
    )
}

/// Client half: give this to the bridge.
pub struct ChannelConnector {
    shared: Arc<Shared>,
}

#[async_trait]
impl Connector for ChannelConnector {
    async fn open(&self, endpoint: &str) -> Result<Box<dyn Transport>, TransportError> {
        self.shared.attempts.fetch_add(1, Ordering::SeqCst);
        let mode = *self
            .shared
            .mode
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        match mode {
            AcceptMode::Accept => {}
            AcceptMode::Refuse => {
                return Err(TransportError::Connect {
                    endpoint: endpoint.to_string(),
                    reason: "connection refused".to_string(),
                });
            }
            AcceptMode::Stall => return std::future::pending().await,
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let peer = RemotePeer {
            endpoint: endpoint.to_string(),
            tx,
        };
        self.shared
            .accepted
            .send(peer)
            .map_err(|_| TransportError::Connect {
                endpoint: endpoint.to_string(),
                reason: "channel server is gone".to_string(),
            })?;

        Ok(Box::new(ChannelTransport { rx }))
    }
}

struct ChannelTransport {
    rx: mpsc::UnboundedReceiver<Frame>,
}

#[async_trait]
impl Transport for ChannelTransport {
    async fn recv(&mut self) -> Result<Option<String>, TransportError> {
        match self.rx.recv().await {
            Some(Frame::Text(text)) => Ok(Some(text)),
            Some(Frame::Close) | None => Ok(None),
            Some(Frame::Fail(reason)) => Err(TransportError::Receive(reason)),
        }
    }
}

/// Server half: accepts connections and controls how new attempts are
/// answered.
pub struct ChannelServer {
    shared: Arc<Shared>,
    accepted: mpsc::UnboundedReceiver<RemotePeer>,
}

impl ChannelServer {
    /// Waits for the next accepted connection.
    pub async fn accept(&mut self) -> Option<RemotePeer> {
        self.accepted.recv().await
    }

    /// Returns an already accepted connection without waiting.
    pub fn try_accept(&mut self) -> Option<RemotePeer> {
        self.accepted.try_recv().ok()
    }

    /// Total connection attempts seen so far, including refused and stalled
    /// ones.
    pub fn attempts(&self) -> usize {
        self.shared.attempts.load(Ordering::SeqCst)
    }

    /// Changes how subsequent attempts are answered.
    pub fn set_mode(&self, mode: AcceptMode) {
        *self
            .shared
            .mode
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = mode;
    }
}

/// The server's end of one accepted connection.
///
/// Dropping it closes the connection just like [`close`](Self::close).
#[derive(Debug)]
pub struct RemotePeer {
    endpoint: String,
    tx: mpsc::UnboundedSender<Frame>,
}

impl RemotePeer {
    /// The endpoint the client dialled.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Pushes a text payload.  Returns `false` if the client side is gone.
    pub fn send_text(&self, payload: &str) -> bool {
        self.tx.send(Frame::Text(payload.to_string())).is_ok()
    }

    /// Returns `true` while the client still holds its end.
    pub fn is_open(&self) -> bool {
        !self.tx.is_closed()
    }

    /// Closes the connection normally.
    pub fn close(self) {
        let _ = self.tx.send(Frame::Close);
    }

    /// Breaks the connection with a transport error.
    pub fn fail(self, reason: &str) {
        let _ = self.tx.send(Frame::Fail(reason.to_string()));
    }
}
