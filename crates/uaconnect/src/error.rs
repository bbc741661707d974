//! Unified error type for uaconnect.

use uaconnect_security::SecurityError;
use uaconnect_session::SessionError;
use uaconnect_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attributes let `?` convert sub-crate errors directly.
#[derive(Debug, thiserror::Error)]
pub enum UaConnectError {
    /// Policy, PKI or endpoint negotiation error.
    #[error(transparent)]
    Security(#[from] SecurityError),

    /// Registry or option error.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Connection, discovery or teardown error.
    #[error(transparent)]
    Transport(#[from] TransportError),
}
