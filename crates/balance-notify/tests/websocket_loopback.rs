//! End-to-end tests over a real WebSocket on the loopback interface.
//!
//! # Purpose
//!
//! These tests run a small tokio-tungstenite server on `127.0.0.1:0` (the OS
//! picks a free port) and point a [`NotificationBridge`] with the production
//! [`WsConnector`] at it.  They verify the parts the in-memory transport
//! cannot: the opening handshake, text framing, non-text frames being ignored,
//! and reconnecting after the server closes the socket.
//!
//! Real time is used throughout, so the reconnect delay is shortened to keep
//! the suite fast and every wait is bounded by `tokio::time::timeout`.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_async, WebSocketStream};

use balance_notify::infrastructure::ws_transport::WsConnector;
use balance_notify::{ConnectionState, NotificationBridge, NotifierConfig};

const WAIT: Duration = Duration::from_secs(5);

type ServerSocket = WebSocketStream<TcpStream>;

/// Starts a listener and forwards every completed handshake to the returned
/// channel.
async fn start_server() -> (String, mpsc::UnboundedReceiver<ServerSocket>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let tx = tx.clone();
            tokio::spawn(async move {
                if let Ok(socket) = accept_async(stream).await {
                    let _ = tx.send(socket);
                }
            });
        }
    });

    (format!("ws://{addr}/ws"), rx)
}

fn loopback_config(endpoint: &str) -> NotifierConfig {
    NotifierConfig {
        endpoint: endpoint.to_string(),
        reconnect_delay: Duration::from_millis(100),
        connect_timeout: Duration::from_secs(2),
        sentinel: "balance_done".to_string(),
    }
}

/// Subscribes a callback that reports each call on a channel.
fn signalling_subscriber(
    bridge: &NotificationBridge<WsConnector>,
) -> (
    mpsc::UnboundedReceiver<()>,
    balance_notify::Subscription,
) {
    let (tx, rx) = mpsc::unbounded_channel();
    let subscription = bridge.subscribe_fn(move || {
        let _ = tx.send(());
    });
    (rx, subscription)
}

async fn next_socket(sockets: &mut mpsc::UnboundedReceiver<ServerSocket>) -> ServerSocket {
    timeout(WAIT, sockets.recv())
        .await
        .expect("bridge did not connect in time")
        .expect("server task ended")
}

async fn wait_for_state(bridge: &NotificationBridge<WsConnector>, wanted: ConnectionState) {
    let mut states = bridge.watch_state();
    timeout(WAIT, states.wait_for(|state| *state == wanted))
        .await
        .expect("state not reached in time")
        .expect("state channel closed");
}

// ── Delivery ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_sentinel_text_frame_reaches_subscriber() {
    // Arrange
    let (endpoint, mut sockets) = start_server().await;
    let bridge = NotificationBridge::new(loopback_config(&endpoint), WsConnector::new());
    let (mut signals, _subscription) = signalling_subscriber(&bridge);

    // Act
    bridge.connect();
    let mut socket = next_socket(&mut sockets).await;
    wait_for_state(&bridge, ConnectionState::Connected).await;
    socket.send(Message::text("balance_done")).await.unwrap();

    // Assert
    timeout(WAIT, signals.recv())
        .await
        .expect("subscriber was not called")
        .unwrap();

    bridge.stop();
}

#[tokio::test]
async fn test_other_frames_are_ignored() {
    // Arrange
    let (endpoint, mut sockets) = start_server().await;
    let bridge = NotificationBridge::new(loopback_config(&endpoint), WsConnector::new());
    let (mut signals, _subscription) = signalling_subscriber(&bridge);
    bridge.connect();
    let mut socket = next_socket(&mut sockets).await;

    // Act: noise first, then one sentinel
    socket.send(Message::text("student_added")).await.unwrap();
    socket
        .send(Message::binary(b"balance_done".to_vec()))
        .await
        .unwrap();
    socket.send(Message::Ping(vec![1, 2, 3])).await.unwrap();
    socket.send(Message::text("balance_done")).await.unwrap();

    // Assert: exactly one call, and the connection is still up
    timeout(WAIT, signals.recv()).await.unwrap().unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(signals.try_recv().is_err());
    assert!(bridge.is_connected());

    bridge.stop();
}

// ── Reconnect ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_reconnects_after_server_close_and_keeps_subscribers() {
    // Arrange
    let (endpoint, mut sockets) = start_server().await;
    let bridge = NotificationBridge::new(loopback_config(&endpoint), WsConnector::new());
    let (mut signals, _subscription) = signalling_subscriber(&bridge);
    bridge.connect();
    let mut first = next_socket(&mut sockets).await;
    first.send(Message::text("balance_done")).await.unwrap();
    timeout(WAIT, signals.recv()).await.unwrap().unwrap();

    // Act: the server closes the first socket
    first.close(None).await.unwrap();
    drop(first);
    let mut second = next_socket(&mut sockets).await;
    wait_for_state(&bridge, ConnectionState::Connected).await;
    second.send(Message::text("balance_done")).await.unwrap();

    // Assert: the same subscriber hears the new connection
    timeout(WAIT, signals.recv())
        .await
        .expect("subscriber was not called after reconnect")
        .unwrap();
    assert_eq!(bridge.subscriber_count(), 1);

    bridge.stop();
}

#[tokio::test]
async fn test_reconnects_after_server_drops_tcp() {
    let (endpoint, mut sockets) = start_server().await;
    let bridge = NotificationBridge::new(loopback_config(&endpoint), WsConnector::new());
    bridge.connect();

    // Drop without a close handshake.
    drop(next_socket(&mut sockets).await);

    let _second = next_socket(&mut sockets).await;
    wait_for_state(&bridge, ConnectionState::Connected).await;
    bridge.stop();
}

// ── Stop ──────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_stop_closes_socket_and_does_not_reconnect() {
    // Arrange
    let (endpoint, mut sockets) = start_server().await;
    let bridge = NotificationBridge::new(loopback_config(&endpoint), WsConnector::new());
    bridge.connect();
    let mut socket = next_socket(&mut sockets).await;
    wait_for_state(&bridge, ConnectionState::Connected).await;

    // Act
    bridge.stop();

    // Assert: the server sees the socket end
    let ended = timeout(WAIT, async {
        loop {
            match socket.next().await {
                None | Some(Err(_)) | Some(Ok(Message::Close(_))) => break,
                Some(Ok(_)) => {}
            }
        }
    })
    .await;
    assert!(ended.is_ok(), "socket stayed open after stop");

    // Assert: no new connection after several reconnect delays
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(sockets.try_recv().is_err());
    assert_eq!(bridge.state(), ConnectionState::Stopped);
}

#[tokio::test]
async fn test_unreachable_endpoint_keeps_retrying_without_connecting() {
    // Arrange: bind then release a port so nothing listens on it
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let bridge = NotificationBridge::new(
        loopback_config(&format!("ws://{addr}/ws")),
        WsConnector::new(),
    );

    // Act
    bridge.connect();
    tokio::time::sleep(Duration::from_millis(350)).await;

    // Assert: still trying, never connected, never stopped on its own
    assert_ne!(bridge.state(), ConnectionState::Connected);
    assert!(!bridge.is_stopped());

    bridge.stop();
    assert_eq!(bridge.state(), ConnectionState::Stopped);
}
