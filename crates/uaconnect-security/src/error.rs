//! Error types for the security layer.

use std::path::PathBuf;

/// Errors that can occur while configuring or negotiating security.
///
/// None of these abort the process. Configuration errors are returned to
/// whoever called the setter; negotiation errors end one connect attempt
/// (which is retried when the session auto-connects).
#[derive(Debug, thiserror::Error)]
pub enum SecurityError {
    /// The policy name or URI is not in the supported-policy registry.
    #[error("unknown security policy '{0}'")]
    UnknownPolicy(String),

    /// The message security mode is not one of `None`, `Sign`,
    /// `SignAndEncrypt`.
    #[error("invalid security mode '{0}' (valid: None Sign SignAndEncrypt)")]
    InvalidMode(String),

    /// Secure channels are only negotiated for URLs with the
    /// [`SECURE_URL_SCHEME`](crate::SECURE_URL_SCHEME) scheme.
    #[error("unsupported URL '{0}': only opc.tcp URLs can be secured")]
    UnsupportedUrl(String),

    /// Discovery returned no endpoint satisfying mode, policy, and level.
    #[error("no endpoint of {url} matches the security requirements")]
    NoMatchingEndpoint { url: String },

    /// A client certificate was needed but none is configured.
    #[error("no client certificate configured")]
    NoClientCertificate,

    /// The certificate loader could not read or parse the certificate.
    #[error("failed to load certificate '{}': {reason}", path.display())]
    CertificateLoad { path: PathBuf, reason: String },
}
