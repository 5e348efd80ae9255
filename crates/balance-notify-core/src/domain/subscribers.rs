//! The subscriber set and notification fan-out.
//!
//! # Identity (for beginners)
//!
//! Closures in Rust have no built-in notion of "the same callback".  The
//! registry therefore uses the `Arc` allocation as the identity: registering
//! a clone of an `Arc` that is already present is a no-op that hands back the
//! existing [`SubscriberId`], while two separately allocated closures are two
//! subscribers even if their code is identical.
//!
//! # Fault isolation
//!
//! [`deliver`] runs every callback behind its own `catch_unwind` boundary.  A
//! subscriber that panics is logged and counted, and delivery continues with
//! the next one.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tracing::warn;
use uuid::Uuid;

/// A zero-argument callback invoked once per sentinel occurrence.
pub type Subscriber = Arc<dyn Fn() + Send + Sync>;

/// Opaque identifier of one registry entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(Uuid);

impl SubscriberId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Set of registered subscribers, kept in registration order.
#[derive(Default)]
pub struct SubscriberRegistry {
    entries: Vec<(SubscriberId, Subscriber)>,
}

impl SubscriberRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `subscriber` unless the same `Arc` is already registered.
    ///
    /// Returns the id of the entry holding the subscriber, which is the
    /// existing id for a repeated registration.
    pub fn insert(&mut self, subscriber: Subscriber) -> SubscriberId {
        if let Some((id, _)) = self
            .entries
            .iter()
            .find(|(_, existing)| same_subscriber(existing, &subscriber))
        {
            return *id;
        }
        let id = SubscriberId::new();
        self.entries.push((id, subscriber));
        id
    }

    /// Removes the entry with `id`.  Returns `false` if it was already gone.
    pub fn remove(&mut self, id: SubscriberId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry_id, _)| *entry_id != id);
        self.entries.len() != before
    }

    /// Returns `true` if an entry with `id` is registered.
    pub fn contains(&self, id: SubscriberId) -> bool {
        self.entries.iter().any(|(entry_id, _)| *entry_id == id)
    }

    /// Number of registered subscribers.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nobody is subscribed.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Clones the current subscribers, in registration order.
    ///
    /// Delivery works on a snapshot so callbacks may subscribe or unsubscribe
    /// while a notification is in flight without affecting that notification.
    pub fn snapshot(&self) -> Vec<(SubscriberId, Subscriber)> {
        self.entries.clone()
    }
}

impl fmt::Debug for SubscriberRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriberRegistry")
            .field("len", &self.entries.len())
            .finish()
    }
}

/// Outcome of one fan-out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Callbacks that returned normally.
    pub delivered: usize,
    /// Callbacks that panicked.
    pub failed: usize,
}

/// Invokes every subscriber exactly once, in order.
///
/// A panicking subscriber is logged and counted in
/// [`DeliveryReport::failed`]; it does not stop delivery to the others.
pub fn deliver(subscribers: &[(SubscriberId, Subscriber)]) -> DeliveryReport {
    let mut report = DeliveryReport::default();
    for (id, subscriber) in subscribers {
        match panic::catch_unwind(AssertUnwindSafe(|| (**subscriber)())) {
            Ok(()) => report.delivered += 1,
            Err(payload) => {
                report.failed += 1;
                warn!(
                    subscriber = %id,
                    panic = panic_message(payload.as_ref()),
                    "subscriber panicked during notification"
                );
            }
        }
    }
    report
}

/// Compares the data pointers only; vtable pointers for the same closure may
/// differ between codegen units.
fn same_subscriber(a: &Subscriber, b: &Subscriber) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        *message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
