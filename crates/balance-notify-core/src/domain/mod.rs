//! Domain entities for the balance completion notifier.
//!
//! Nothing in this module performs I/O.  The application crate owns the
//! connection task and the reconnect timer; the types here only describe what
//! those pieces act on.

/// Notifier settings and their validation rules.
pub mod config;

/// Connection lifecycle states.
pub mod state;

/// The subscriber set and notification fan-out.
pub mod subscribers;
