//! Session configuration and connection state.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Settings shared by every session created from one
/// [`SessionContext`](crate::SessionContext).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Delay between a failed connect attempt (or a lost connection) and
    /// the automatic retry.
    pub reconnect_delay: Duration,

    /// Ask the server to delete the session's subscriptions on disconnect.
    pub delete_subscriptions: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            reconnect_delay: Duration::from_secs(10),
            delete_subscriptions: true,
        }
    }
}

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// Connection state of a session.
///
/// ```text
///                  connect()
///   Disconnected ────────────→ Connecting
///        ▲  ▲                   │      │
///        │  └─── failure ───────┘      │ success
///        │                             ▼
///        │        disconnect()     Connected
///        └──── Disconnecting ◄─────────┤
///        ▲                             │
///        └──── connection lost ────────┘
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
}

impl SessionState {
    pub fn is_connected(self) -> bool {
        matches!(self, Self::Connected)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Disconnected => "Disconnected",
            Self::Connecting => "Connecting",
            Self::Connected => "Connected",
            Self::Disconnecting => "Disconnecting",
        };
        f.write_str(s)
    }
}
