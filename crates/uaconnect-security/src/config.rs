//! Process-wide client security configuration.
//!
//! A [`SecurityConfig`] is built once at startup (PKI directories, client
//! certificate, rejected-certificate handling), then wrapped in an `Arc` and
//! handed to every session. Sessions only ever read it.
//!
//! ```text
//! startup:   SecurityConfig::new(identity)
//!              .setup_pki(..)            ← probes each directory
//!              .save_rejected("")
//!              .set_client_certificate(..)
//!                     │
//!                     ▼
//!            Arc<SecurityConfig>  ──→ every Session (read-only)
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{CertificateInfo, CertificateLoader, ProcessIdentity, SecurityError, is_writable};

// ---------------------------------------------------------------------------
// PkiPaths
// ---------------------------------------------------------------------------

/// The four certificate store directories.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PkiPaths {
    /// Trusted server certificates.
    pub trusted_certs: PathBuf,
    /// Server certificate revocation lists.
    pub revoked_certs: PathBuf,
    /// Trusted issuer (CA) certificates.
    pub trusted_issuers: PathBuf,
    /// Issuer revocation lists.
    pub revoked_issuers: PathBuf,
}

impl PkiPaths {
    /// The directories with their operator-facing labels, in display order.
    pub fn labeled(&self) -> [(&'static str, &Path); 4] {
        [
            ("trusted certificates", self.trusted_certs.as_path()),
            ("certificate revocation lists", self.revoked_certs.as_path()),
            ("trusted issuers", self.trusted_issuers.as_path()),
            ("issuer revocation lists", self.revoked_issuers.as_path()),
        ]
    }
}

/// Outcome of [`SecurityConfig::setup_pki`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PkiSetupReport {
    /// Store directories that accepted a probe write. Each one was also
    /// logged as a warning.
    pub writable: Vec<PathBuf>,
}

impl PkiSetupReport {
    /// `true` when no store directory is writable.
    pub fn is_clean(&self) -> bool {
        self.writable.is_empty()
    }
}

// ---------------------------------------------------------------------------
// SecurityConfig
// ---------------------------------------------------------------------------

/// Client security settings shared by all sessions.
///
/// Every setter replaces what an earlier call set; there is no partial
/// update.
#[derive(Debug, Clone)]
pub struct SecurityConfig {
    identity: ProcessIdentity,
    pki: Option<PkiPaths>,
    client_certificate: Option<PathBuf>,
    client_private_key: Option<PathBuf>,
    /// `Some(dir)` when rejected server certificates are saved.
    rejected_dir: Option<PathBuf>,
    client_certificate_info: Option<CertificateInfo>,
}

impl SecurityConfig {
    /// Creates an empty configuration for the given process identity.
    pub fn new(identity: ProcessIdentity) -> Self {
        Self {
            identity,
            pki: None,
            client_certificate: None,
            client_private_key: None,
            rejected_dir: None,
            client_certificate_info: None,
        }
    }

    /// Sets the four PKI store directories and probes each for writability.
    ///
    /// A writable store could be tampered with, so each writable directory
    /// is logged as a warning and listed in the returned report. Setup
    /// succeeds either way. Empty paths are stored but not probed.
    pub fn setup_pki(
        &mut self,
        trusted_certs: impl Into<PathBuf>,
        revoked_certs: impl Into<PathBuf>,
        trusted_issuers: impl Into<PathBuf>,
        revoked_issuers: impl Into<PathBuf>,
    ) -> PkiSetupReport {
        self.set_pki(PkiPaths {
            trusted_certs: trusted_certs.into(),
            revoked_certs: revoked_certs.into(),
            trusted_issuers: trusted_issuers.into(),
            revoked_issuers: revoked_issuers.into(),
        })
    }

    /// Same as [`setup_pki`](Self::setup_pki), taking the paths as one value.
    pub fn set_pki(&mut self, paths: PkiPaths) -> PkiSetupReport {
        let mut report = PkiSetupReport::default();

        for (label, dir) in paths.labeled() {
            if dir.as_os_str().is_empty() {
                continue;
            }
            if is_writable(dir) {
                warn!(
                    path = %dir.display(),
                    store = label,
                    "PKI directory {} is writable",
                    dir.display()
                );
                report.writable.push(dir.to_path_buf());
            }
        }

        info!(
            trusted_certs = %paths.trusted_certs.display(),
            trusted_issuers = %paths.trusted_issuers.display(),
            "PKI store configured"
        );
        self.pki = Some(paths);
        report
    }

    /// Enables saving of rejected server certificates.
    ///
    /// An empty `location` selects `/tmp/<process>@<host>`. Otherwise the
    /// location is used with trailing path separators stripped.
    pub fn save_rejected(&mut self, location: &str) {
        let dir = if location.is_empty() {
            self.identity.default_rejected_dir()
        } else {
            let trimmed = location.trim_end_matches(['/', std::path::MAIN_SEPARATOR]);
            if trimmed.is_empty() {
                PathBuf::from("/")
            } else {
                PathBuf::from(trimmed)
            }
        };
        info!(path = %dir.display(), "saving rejected certificates");
        self.rejected_dir = Some(dir);
    }

    /// Sets the client certificate (public key) and private key files.
    pub fn set_client_certificate(
        &mut self,
        certificate: impl Into<PathBuf>,
        private_key: impl Into<PathBuf>,
    ) {
        self.client_certificate = Some(certificate.into());
        self.client_private_key = Some(private_key.into());
        self.client_certificate_info = None;
    }

    /// Loads the configured client certificate through `loader` and keeps
    /// its identity fields for diagnostics.
    ///
    /// # Errors
    /// - [`SecurityError::NoClientCertificate`]: no certificate configured
    /// - whatever the loader returns
    pub fn load_client_certificate(
        &mut self,
        loader: &dyn CertificateLoader,
    ) -> Result<&CertificateInfo, SecurityError> {
        let path = self
            .client_certificate
            .as_deref()
            .ok_or(SecurityError::NoClientCertificate)?;

        let info = loader.load(path).inspect_err(|e| {
            warn!(path = %path.display(), error = %e, "loading client certificate failed");
        })?;

        Ok(self.client_certificate_info.insert(info))
    }

    pub fn identity(&self) -> &ProcessIdentity {
        &self.identity
    }

    pub fn pki(&self) -> Option<&PkiPaths> {
        self.pki.as_ref()
    }

    pub fn client_certificate(&self) -> Option<&Path> {
        self.client_certificate.as_deref()
    }

    pub fn client_private_key(&self) -> Option<&Path> {
        self.client_private_key.as_deref()
    }

    /// Whether rejected certificates are saved.
    pub fn saves_rejected(&self) -> bool {
        self.rejected_dir.is_some()
    }

    /// Where rejected certificates are saved, if enabled.
    pub fn rejected_dir(&self) -> Option<&Path> {
        self.rejected_dir.as_deref()
    }

    /// Identity fields of the loaded client certificate.
    pub fn client_certificate_info(&self) -> Option<&CertificateInfo> {
        self.client_certificate_info.as_ref()
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self::new(ProcessIdentity::detect())
    }
}
