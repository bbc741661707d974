//! Client certificate identity, as far as diagnostics need it.
//!
//! Parsing X.509 is not this crate's job. A [`CertificateLoader`] supplied by
//! the application turns a certificate file into a [`CertificateInfo`]; the
//! security configuration only stores and prints the result.

use std::path::Path;

use crate::SecurityError;

/// Common name and organization of a certificate subject or issuer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DistinguishedName {
    pub common_name: String,
    pub organization: String,
}

impl std::fmt::Display for DistinguishedName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.organization.is_empty() {
            write!(f, "{}", self.common_name)
        } else {
            write!(f, "{} ({})", self.common_name, self.organization)
        }
    }
}

/// Identity fields of a loaded certificate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CertificateInfo {
    pub subject: DistinguishedName,
    pub issuer: DistinguishedName,
    /// Serial number, hex encoded.
    pub serial_number: String,
    /// SHA-1 thumbprint, hex encoded.
    pub fingerprint: String,
    pub self_signed: bool,
}

/// Reads a certificate file and extracts its identity fields.
///
/// Implemented by the application on top of whatever crypto library it
/// links; tests use small in-memory loaders.
pub trait CertificateLoader: Send + Sync {
    /// Loads the certificate at `path`.
    ///
    /// # Errors
    /// [`SecurityError::CertificateLoad`] when the file cannot be read or
    /// parsed.
    fn load(&self, path: &Path) -> Result<CertificateInfo, SecurityError>;
}

impl<F> CertificateLoader for F
where
    F: Fn(&Path) -> Result<CertificateInfo, SecurityError> + Send + Sync,
{
    fn load(&self, path: &Path) -> Result<CertificateInfo, SecurityError> {
        self(path)
    }
}
