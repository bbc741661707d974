//! Named client sessions for uaconnect.
//!
//! This crate handles the lifecycle of server connections:
//!
//! 1. **Sessions**: one named connection to one server URL ([`Session`]),
//!    driven by its own task so connect and disconnect never overlap
//! 2. **Auto-reconnect**: a failed or lost connection is retried after the
//!    configured delay while `autoconnect` is on
//! 3. **Registry**: process-wide lookup by name ([`SessionRegistry`])
//!
//! # How it fits in the stack
//!
//! ```text
//! Host application (above)  ← subscriptions, status listener
//!     ↕
//! Session Layer (this crate)  ← lifecycle, options, namespace mapping
//!     ↕
//! Security + Timer (beside)   ← policies, PKI, endpoint selection, retries
//!     ↕
//! Transport Layer (below)  ← channels to the server
//! ```

mod actor;
mod config;
mod error;
mod listener;
mod namespace;
mod options;
mod registry;
mod session;

use std::sync::{Mutex, MutexGuard, PoisonError};

pub use config::{SessionConfig, SessionState};
pub use error::SessionError;
pub use listener::{StatusChange, StatusListener, Subscription};
pub use options::{OPTION_HELP, SessionSettings, parse_yes_no};
pub use registry::SessionRegistry;
pub use session::{Session, SessionContext};

/// Locks `mutex`, recovering the data from a poisoned lock. Every guarded
/// value stays consistent across a panic, so the poison flag carries no
/// information here.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
