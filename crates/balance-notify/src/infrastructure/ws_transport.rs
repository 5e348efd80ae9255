//! WebSocket transport built on tokio-tungstenite.
//!
//! The notifier is receive-only: it performs the opening handshake and then
//! only ever reads.  Text frames are handed to the bridge; binary frames and
//! control frames never leave this module.
//!
//! # Ping / Pong
//!
//! tungstenite queues the Pong reply to a server Ping by itself and flushes it
//! on the next read, so nothing needs to be written here.

use async_trait::async_trait;
use futures_util::StreamExt;
use tokio::net::TcpStream;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{Error as WsError, Message as WsMessage},
    MaybeTlsStream, WebSocketStream,
};
use tracing::debug;

use crate::application::{Connector, Transport, TransportError};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Opens WebSocket connections with [`connect_async`].
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

impl WsConnector {
    /// Creates a connector.  It holds no state; every `open` dials afresh.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn open(&self, endpoint: &str) -> Result<Box<dyn Transport>, TransportError> {
        let (stream, response) =
            connect_async(endpoint)
                .await
                .map_err(|e| TransportError::Connect {
                    endpoint: endpoint.to_string(),
                    reason: e.to_string(),
                })?;

        debug!(endpoint, status = %response.status(), "websocket handshake complete");
        Ok(Box::new(WsTransport { stream }))
    }
}

/// An open WebSocket, read side only.
pub struct WsTransport {
    stream: WsStream,
}

#[async_trait]
impl Transport for WsTransport {
    async fn recv(&mut self) -> Result<Option<String>, TransportError> {
        loop {
            let frame = match self.stream.next().await {
                Some(Ok(frame)) => frame,
                Some(Err(WsError::ConnectionClosed | WsError::AlreadyClosed)) | None => {
                    return Ok(None);
                }
                Some(Err(e)) => return Err(TransportError::Receive(e.to_string())),
            };

            match frame {
                WsMessage::Text(text) => return Ok(Some(text)),
                WsMessage::Close(close_frame) => {
                    debug!(?close_frame, "websocket close frame received");
                    return Ok(None);
                }
                WsMessage::Binary(data) => {
                    debug!(len = data.len(), "binary websocket frame ignored");
                }
                WsMessage::Ping(_) | WsMessage::Pong(_) | WsMessage::Frame(_) => {}
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
//
// The full network path (handshake, text frames, close, reconnect) is covered
// by `tests/websocket_loopback.rs` against a real local listener.
