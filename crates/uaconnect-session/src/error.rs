//! Error types for the session layer.

use std::path::PathBuf;

use uaconnect_security::SecurityError;
use uaconnect_transport::TransportError;

/// Errors that can occur during session management.
///
/// Registry and option errors are returned synchronously. Connect failures
/// never reach the caller of [`Session::connect`](crate::Session::connect);
/// they are logged and reported through the
/// [`StatusListener`](crate::StatusListener).
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// A session with this name is already registered.
    #[error("session name '{0}' already in use")]
    DuplicateName(String),

    /// No session with this name is registered.
    #[error("session '{0}' does not exist")]
    NotFound(String),

    /// `set_option` was called with a name it does not know.
    #[error("unknown option '{0}'")]
    UnknownOption(String),

    /// The option is known but the value cannot be used. The previous value
    /// is kept.
    #[error("invalid value '{value}' for option '{name}': {reason}")]
    InvalidOptionValue {
        name: String,
        value: String,
        reason: String,
    },

    /// The session task has stopped.
    #[error("session '{0}' is unavailable")]
    Unavailable(String),

    /// Security setup for a connect attempt failed.
    #[error(transparent)]
    Security(#[from] SecurityError),

    /// The transport failed during a connect attempt.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The identity file could not be read.
    #[error("cannot read identity file '{}': {source}", path.display())]
    Identity {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
