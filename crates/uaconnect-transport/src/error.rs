/// Errors reported by a [`Transport`](crate::Transport) or
/// [`Channel`](crate::Channel).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The server did not answer at all.
    #[error("server unreachable: {url}")]
    Unreachable { url: String },

    /// The server answered but refused the session (bad credentials,
    /// untrusted certificate, too many sessions, ...).
    #[error("handshake with {url} rejected: {reason}")]
    HandshakeRejected { url: String, reason: String },

    /// Reading the server's endpoint list failed.
    #[error("endpoint discovery at {url} failed: {reason}")]
    DiscoveryFailed { url: String, reason: String },

    /// The channel is no longer usable.
    #[error("channel closed: {0}")]
    ChannelClosed(String),

    /// Closing the channel did not complete cleanly. The channel is gone
    /// either way.
    #[error("close failed: {0}")]
    CloseFailed(String),
}
