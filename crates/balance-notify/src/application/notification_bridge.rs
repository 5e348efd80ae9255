//! The notification bridge: one connection, many subscribers, endless retry.
//!
//! [`NotificationBridge`] owns exactly one connection to the backend's
//! notification endpoint.  Every text frame equal to the configured sentinel
//! (`"balance_done"` by default) is fanned out to all registered subscribers.
//! When the connection closes for any reason (normal close, transport error,
//! failed or timed-out open) the bridge waits a fixed delay and connects again,
//! forever, until [`NotificationBridge::stop`] is called.
//!
//! # State machine
//!
//! ```text
//! Disconnected ──connect()──► Connecting ──open ok──► Connected
//!      ▲                          │                       │
//!      └───────── close / error / open failure ───────────┘
//!      │
//!      └── reconnect_delay ──► connect() ──► …
//! ```
//!
//! # Task model (for beginners)
//!
//! `connect()` does not wait for the network.  It spawns a Tokio task that
//! opens the transport and then reads frames until the connection ends; the
//! caller gets control back immediately.  When that task sees the connection
//! end it clears the handle and spawns a second, tiny task that sleeps for
//! `reconnect_delay` and calls `connect()` again.  That sleeping task is the
//! only pending background work, and `stop()` aborts it.
//!
//! Each connection carries a *generation* number.  A connection task only ever
//! clears or updates the handle whose generation matches its own, so a stale
//! task can never tear down a newer connection.
//!
//! All shared state sits behind short-lived `std::sync::Mutex` locks that are
//! never held across an `.await`.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use balance_notify_core::{
    deliver, ConnectionState, NotifierConfig, Subscriber, SubscriberId, SubscriberRegistry,
};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, timeout, Instant};
use tracing::{debug, info, warn};

use super::transport::{Connector, TransportError};

// ── Public API ────────────────────────────────────────────────────────────────

/// Long-lived owner of the notification connection and the subscriber set.
///
/// Cloning is cheap and every clone drives the same connection.
///
/// Dropping the last clone does not stop a live connection: its task keeps
/// the bridge alive and subscribers keep hearing the sentinel.  Once that
/// connection closes, though, nothing reconnects, because the pending retry
/// timer only holds a weak reference.  Keep a clone for as long as retries
/// are wanted, and call [`stop`](Self::stop) to end everything explicitly.
///
/// # Example
///
/// ```no_run
/// use balance_notify::infrastructure::ws_transport::WsConnector;
/// use balance_notify::{NotificationBridge, NotifierConfig};
///
/// # async fn example() {
/// let bridge = NotificationBridge::new(NotifierConfig::default(), WsConnector::new());
/// let subscription = bridge.subscribe_fn(|| println!("balance finished"));
/// bridge.connect();
/// // ... later
/// subscription.unsubscribe();
/// bridge.stop();
/// # }
/// ```
pub struct NotificationBridge<C: Connector> {
    inner: Arc<BridgeInner<C>>,
}

impl<C: Connector> Clone for NotificationBridge<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: Connector> NotificationBridge<C> {
    /// Creates a disconnected bridge.
    ///
    /// `config` is used as given; validate it with
    /// [`NotifierConfig::validate`] first when it comes from user input.
    pub fn new(config: NotifierConfig, connector: C) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            inner: Arc::new(BridgeInner {
                config,
                connector,
                subscribers: Arc::new(Mutex::new(SubscriberRegistry::new())),
                connection: Mutex::new(None),
                reconnect: Mutex::new(None),
                state,
                generations: AtomicU64::new(0),
                stopped: AtomicBool::new(false),
            }),
        }
    }

    /// Opens the connection unless one already exists.
    ///
    /// Returns immediately; the open happens on a spawned task.  Repeated
    /// calls while a connection exists (or is being opened) are no-ops, and so
    /// is any call after [`stop`](Self::stop).
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn connect(&self) {
        self.inner.connect();
    }

    /// Registers `subscriber` to be called on every sentinel message.
    ///
    /// Registering the same `Arc` twice keeps a single entry, so it is still
    /// called only once per sentinel.  Subscribers survive reconnects.
    pub fn subscribe(&self, subscriber: Subscriber) -> Subscription {
        let id = lock(&self.inner.subscribers).insert(subscriber);
        debug!(subscriber = %id, "subscriber registered");
        Subscription {
            id,
            registry: Arc::downgrade(&self.inner.subscribers),
        }
    }

    /// Convenience wrapper around [`subscribe`](Self::subscribe) for a plain
    /// closure.  Every call registers a new subscriber.
    pub fn subscribe_fn<F>(&self, callback: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.subscribe(Arc::new(callback))
    }

    /// Cancels the pending reconnect, closes the live connection, and
    /// prevents any further connection attempts.  Idempotent.
    ///
    /// Subscribers stay registered; they just never hear from this bridge
    /// again.
    pub fn stop(&self) {
        self.inner.stop();
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        *self.inner.state.borrow()
    }

    /// Returns a receiver that observes every state transition.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    /// Returns `true` while the transport is open.
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Returns `true` once [`stop`](Self::stop) has been called.
    pub fn is_stopped(&self) -> bool {
        self.inner.stopped.load(Ordering::SeqCst)
    }

    /// Number of registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        lock(&self.inner.subscribers).len()
    }

    /// The configuration this bridge was built with.
    pub fn config(&self) -> &NotifierConfig {
        &self.inner.config
    }
}

/// Handle returned by [`NotificationBridge::subscribe`].
///
/// Dropping it does **not** unsubscribe; call
/// [`unsubscribe`](Self::unsubscribe) to remove the callback.
#[derive(Debug, Clone)]
pub struct Subscription {
    id: SubscriberId,
    registry: Weak<Mutex<SubscriberRegistry>>,
}

impl Subscription {
    /// Identifier of the registry entry this handle controls.
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Removes exactly this subscriber.  Returns `false` if it was already
    /// removed or the bridge no longer exists.
    pub fn unsubscribe(&self) -> bool {
        let Some(registry) = self.registry.upgrade() else {
            return false;
        };
        let removed = lock(&registry).remove(self.id);
        if removed {
            debug!(subscriber = %self.id, "subscriber removed");
        }
        removed
    }

    /// Returns `true` while the subscriber is still registered.
    pub fn is_active(&self) -> bool {
        self.registry
            .upgrade()
            .is_some_and(|registry| lock(&registry).contains(self.id))
    }
}

// ── Internals ─────────────────────────────────────────────────────────────────

/// The live (or opening) connection.  At most one exists at a time.
struct ConnectionHandle {
    generation: u64,
    task: JoinHandle<()>,
}

struct BridgeInner<C> {
    config: NotifierConfig,
    connector: C,
    subscribers: Arc<Mutex<SubscriberRegistry>>,
    connection: Mutex<Option<ConnectionHandle>>,
    reconnect: Mutex<Option<JoinHandle<()>>>,
    state: watch::Sender<ConnectionState>,
    generations: AtomicU64,
    stopped: AtomicBool,
}

impl<C: Connector> BridgeInner<C> {
    fn connect(self: &Arc<Self>) {
        if self.stopped.load(Ordering::SeqCst) {
            debug!("connect ignored; bridge is stopped");
            return;
        }

        let mut slot = lock(&self.connection);
        // Re-check under the lock so a concurrent stop() cannot be outrun.
        if self.stopped.load(Ordering::SeqCst) {
            return;
        }
        if let Some(existing) = slot.as_ref() {
            debug!(
                generation = existing.generation,
                "connect ignored; connection already exists"
            );
            return;
        }

        let generation = self.generations.fetch_add(1, Ordering::Relaxed) + 1;
        self.set_state(ConnectionState::Connecting);

        let inner = Arc::clone(self);
        let task = tokio::spawn(async move { inner.run_connection(generation).await });
        *slot = Some(ConnectionHandle { generation, task });
    }

    /// Body of the connection task: open, read until the end, then hand over
    /// to the close hook.
    async fn run_connection(self: Arc<Self>, generation: u64) {
        let endpoint = self.config.endpoint.as_str();
        info!(endpoint, generation, "opening notification connection");

        match timeout(self.config.connect_timeout, self.connector.open(endpoint)).await {
            Ok(Ok(mut transport)) => {
                self.on_open(generation);
                loop {
                    match transport.recv().await {
                        Ok(Some(payload)) => self.on_message(&payload),
                        Ok(None) => {
                            info!(generation, "notification connection closed");
                            break;
                        }
                        Err(e) => {
                            warn!(generation, error = %e, "notification connection failed");
                            break;
                        }
                    }
                }
            }
            Ok(Err(e)) => {
                warn!(generation, error = %e, "could not open notification connection");
            }
            Err(_) => {
                let e = TransportError::Timeout {
                    endpoint: endpoint.to_string(),
                };
                warn!(generation, error = %e, "could not open notification connection");
            }
        }

        self.on_close(generation);
    }

    fn on_open(&self, generation: u64) {
        let slot = lock(&self.connection);
        if slot.as_ref().map(|h| h.generation) == Some(generation) {
            self.set_state(ConnectionState::Connected);
            info!(
                endpoint = %self.config.endpoint,
                generation, "notification connection established"
            );
        }
    }

    fn on_message(&self, payload: &str) {
        if !self.config.is_sentinel(payload) {
            debug!(payload, "ignoring non-sentinel message");
            return;
        }

        let subscribers = lock(&self.subscribers).snapshot();
        let report = deliver(&subscribers);
        info!(
            delivered = report.delivered,
            failed = report.failed,
            "balance completion delivered"
        );
    }

    fn on_close(self: &Arc<Self>, generation: u64) {
        {
            let mut slot = lock(&self.connection);
            match slot.as_ref() {
                Some(handle) if handle.generation == generation => *slot = None,
                _ => {
                    debug!(generation, "stale connection task finished");
                    return;
                }
            }
            self.set_state(ConnectionState::Disconnected);
        }

        if self.stopped.load(Ordering::SeqCst) {
            return;
        }

        let delay = self.config.reconnect_delay;
        self.schedule_reconnect(Instant::now() + delay);
        info!(
            generation,
            delay_ms = delay.as_millis() as u64,
            "reconnect scheduled"
        );
    }

    fn schedule_reconnect(self: &Arc<Self>, deadline: Instant) {
        let inner = Arc::downgrade(self);
        let timer = tokio::spawn(async move {
            sleep_until(deadline).await;
            if let Some(inner) = inner.upgrade() {
                inner.connect();
            }
        });
        if let Some(previous) = lock(&self.reconnect).replace(timer) {
            previous.abort();
        }
    }

    fn stop(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }

        if let Some(timer) = lock(&self.reconnect).take() {
            timer.abort();
        }

        let mut slot = lock(&self.connection);
        if let Some(handle) = slot.take() {
            handle.task.abort();
        }
        self.state.send_replace(ConnectionState::Stopped);
        drop(slot);

        info!(endpoint = %self.config.endpoint, "notification bridge stopped");
    }

    /// Publishes `next` unless the bridge has already reached `Stopped`.
    fn set_state(&self, next: ConnectionState) {
        self.state.send_if_modified(|current| {
            if current.is_terminal() || *current == next {
                return false;
            }
            debug!(from = %current, to = %next, "connection state changed");
            *current = next;
            true
        });
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::transport::MockConnector;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    fn test_config() -> NotifierConfig {
        NotifierConfig {
            endpoint: "ws://backend.test/ws".to_string(),
            reconnect_delay: Duration::from_millis(5000),
            connect_timeout: Duration::from_secs(1),
            sentinel: "balance_done".to_string(),
        }
    }

    fn refusing_connector(attempts: &Arc<AtomicUsize>) -> MockConnector {
        let attempts = Arc::clone(attempts);
        let mut connector = MockConnector::new();
        connector.expect_open().returning(move |endpoint| {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err(TransportError::Connect {
                endpoint: endpoint.to_string(),
                reason: "connection refused".to_string(),
            })
        });
        connector
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[test]
    fn test_new_bridge_starts_disconnected_with_no_subscribers() {
        // Arrange / Act
        let bridge = NotificationBridge::new(test_config(), MockConnector::new());

        // Assert
        assert_eq!(bridge.state(), ConnectionState::Disconnected);
        assert_eq!(bridge.subscriber_count(), 0);
        assert!(!bridge.is_stopped());
    }

    #[test]
    fn test_subscribe_before_connect_is_allowed() {
        let bridge = NotificationBridge::new(test_config(), MockConnector::new());

        let subscription = bridge.subscribe_fn(|| {});

        assert!(subscription.is_active());
        assert_eq!(bridge.subscriber_count(), 1);
    }

    #[test]
    fn test_unsubscribe_after_bridge_dropped_returns_false() {
        let bridge = NotificationBridge::new(test_config(), MockConnector::new());
        let subscription = bridge.subscribe_fn(|| {});

        drop(bridge);

        assert!(!subscription.unsubscribe());
        assert!(!subscription.is_active());
    }

    #[test]
    fn test_on_message_delivers_only_for_sentinel() {
        // Arrange
        let bridge = NotificationBridge::new(test_config(), MockConnector::new());
        let hits = Arc::new(AtomicUsize::new(0));
        let hits_clone = Arc::clone(&hits);
        let _subscription = bridge.subscribe_fn(move || {
            hits_clone.fetch_add(1, Ordering::SeqCst);
        });

        // Act
        bridge.inner.on_message("student_added");
        bridge.inner.on_message("balance_done");
        bridge.inner.on_message("balance_done\n");

        // Assert
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_failure_follows_close_and_retry_path() {
        // Arrange
        let attempts = Arc::new(AtomicUsize::new(0));
        let bridge = NotificationBridge::new(test_config(), refusing_connector(&attempts));

        // Act: first attempt fails immediately
        bridge.connect();
        settle().await;

        // Assert: one attempt, back to Disconnected, no error surfaced
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        assert_eq!(bridge.state(), ConnectionState::Disconnected);

        // Act: the fixed delay elapses
        tokio::time::advance(Duration::from_millis(5000)).await;
        settle().await;

        // Assert: exactly one more attempt
        assert_eq!(attempts.load(Ordering::SeqCst), 2);

        bridge.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_delay_does_not_grow() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let bridge = NotificationBridge::new(test_config(), refusing_connector(&attempts));

        bridge.connect();
        settle().await;
        for expected in 2..=5 {
            tokio::time::advance(Duration::from_millis(5000)).await;
            settle().await;
            assert_eq!(attempts.load(Ordering::SeqCst), expected);
        }

        bridge.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_cancels_pending_reconnect() {
        // Arrange: a failed attempt leaves a reconnect timer pending
        let attempts = Arc::new(AtomicUsize::new(0));
        let bridge = NotificationBridge::new(test_config(), refusing_connector(&attempts));
        bridge.connect();
        settle().await;

        // Act
        bridge.stop();
        tokio::time::advance(Duration::from_secs(60)).await;
        settle().await;

        // Assert
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        assert_eq!(bridge.state(), ConnectionState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_after_stop_is_noop() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let bridge = NotificationBridge::new(test_config(), refusing_connector(&attempts));

        bridge.stop();
        bridge.connect();
        settle().await;

        assert_eq!(attempts.load(Ordering::SeqCst), 0);
        assert!(bridge.is_stopped());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_is_idempotent() {
        let bridge = NotificationBridge::new(test_config(), MockConnector::new());

        bridge.stop();
        bridge.stop();

        assert_eq!(bridge.state(), ConnectionState::Stopped);
    }

    #[test]
    fn test_set_state_never_leaves_stopped() {
        let bridge = NotificationBridge::new(test_config(), MockConnector::new());
        bridge.inner.state.send_replace(ConnectionState::Stopped);

        bridge.inner.set_state(ConnectionState::Connected);

        assert_eq!(bridge.state(), ConnectionState::Stopped);
    }
}
