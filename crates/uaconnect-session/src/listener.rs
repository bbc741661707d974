//! Hooks the hosting application plugs into a session.
//!
//! The session layer doesn't know what the host does with a connection.
//! It reports state changes through [`StatusListener`] and asks the host's
//! [`Subscription`]s to drop their state when the server side is gone.

use crate::SessionState;

/// One connection state transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChange {
    pub session: String,
    pub from: SessionState,
    pub to: SessionState,
    /// Why the transition happened, when it wasn't requested: the connect
    /// error or the server status that ended the connection.
    pub reason: Option<String>,
}

/// Receives every connection state transition of the sessions it is
/// attached to.
///
/// # Trait bounds
///
/// - `Send + Sync` → called from the session tasks, which may run on any
///   worker thread.
///
/// Calls happen on the session's own task, in transition order. An
/// implementation must not block; hand heavy work to another task.
///
/// Closures work directly:
///
/// ```rust
/// use uaconnect_session::{StatusChange, StatusListener};
///
/// let listener = |change: &StatusChange| {
///     println!("{}: {} -> {}", change.session, change.from, change.to);
/// };
/// # fn takes(_: impl StatusListener) {}
/// # takes(listener);
/// ```
pub trait StatusListener: Send + Sync + 'static {
    fn on_status_change(&self, change: &StatusChange);
}

impl<F> StatusListener for F
where
    F: Fn(&StatusChange) + Send + Sync + 'static,
{
    fn on_status_change(&self, change: &StatusChange) {
        self(change)
    }
}

/// A host-side subscription owned by a session.
pub trait Subscription: Send + Sync + 'static {
    fn name(&self) -> &str;

    /// Number of monitored items.
    fn item_count(&self) -> usize;

    /// One-line description for diagnostics.
    fn summary(&self) -> String {
        format!("subscription={} items={}", self.name(), self.item_count())
    }

    /// Called when the server side of the subscription is gone
    /// (disconnect or connection loss).
    fn clear(&self);
}
