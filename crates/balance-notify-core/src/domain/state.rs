//! Connection lifecycle states.
//!
//! ```text
//!                 connect()            transport open
//! Disconnected ─────────────► Connecting ─────────────► Connected
//!      ▲                          │                         │
//!      │        close / error / open failure                │
//!      └──────────────────────────┴─────────────────────────┘
//!      │
//!      └── reconnect_delay elapses ──► Connecting ──► …
//!
//! any state ── stop() ──► Stopped
//! ```
//!
//! The loop has no terminal state of its own.  `Stopped` is only reached by an
//! explicit `stop()` on the bridge.

use std::fmt;

/// Where the single notification connection currently is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    /// No transport exists.  Initial state, and the state while a reconnect
    /// is pending.
    #[default]
    Disconnected,
    /// A transport open has been issued but not yet confirmed.
    Connecting,
    /// The transport is open and inbound messages are being processed.
    Connected,
    /// The bridge was stopped; no further attempts will be made.
    Stopped,
}

impl ConnectionState {
    /// Returns `true` once the bridge has been stopped for good.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Stopped)
    }

    /// Lower-case name used in log fields.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Stopped => "stopped",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
