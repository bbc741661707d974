//! Integration tests for PKI setup and the client security report.
//!
//! The writability checks run against real directories created with
//! `tempfile`, so they exercise the actual filesystem probe.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use uaconnect_security::{
    CertificateInfo, DistinguishedName, ProcessIdentity, SecurityConfig, SecurityError,
    SecurityPolicyRegistry, client_security_report,
};

// =========================================================================
// Helpers
// =========================================================================

fn config() -> SecurityConfig {
    SecurityConfig::new(ProcessIdentity::new("iocA", "hostB"))
}

/// Creates `name` under `root` and returns its path.
fn subdir(root: &Path, name: &str) -> PathBuf {
    let dir = root.join(name);
    fs::create_dir(&dir).expect("create store dir");
    dir
}

struct CapturedWriter(Arc<Mutex<Vec<u8>>>);

impl io::Write for CapturedWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Runs `f` under a subscriber that records WARN and above; returns the
/// result and the formatted log lines.
fn capture_warnings<R>(f: impl FnOnce() -> R) -> (R, String) {
    let buf = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&buf);
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .with_ansi(false)
        .with_writer(move || CapturedWriter(Arc::clone(&sink)))
        .finish();

    let result = tracing::subscriber::with_default(subscriber, f);
    let logs = String::from_utf8(buf.lock().unwrap().clone()).unwrap();
    (result, logs)
}

#[cfg(unix)]
fn make_read_only(dir: &Path) {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(dir, fs::Permissions::from_mode(0o555)).expect("chmod");
}

/// Privileged users (root in containers) can write into 0o555 directories,
/// which makes the "read-only" fixture meaningless.
#[cfg(unix)]
fn write_permission_is_enforced(dir: &Path) -> bool {
    let canary = dir.join("canary");
    match fs::write(&canary, b"x") {
        Ok(()) => {
            let _ = fs::remove_file(&canary);
            false
        }
        Err(_) => true,
    }
}

// =========================================================================
// setup_pki()
// =========================================================================

#[test]
fn test_setup_pki_writable_dirs_reported_once_each() {
    let root = tempfile::tempdir().unwrap();
    let trusted = subdir(root.path(), "trusted");
    let crl = subdir(root.path(), "crl");
    let issuers = subdir(root.path(), "issuers");
    let issuers_crl = subdir(root.path(), "issuers-crl");
    let mut cfg = config();

    let (report, logs) = capture_warnings(|| cfg.setup_pki(&trusted, &crl, &issuers, &issuers_crl));

    assert_eq!(
        report.writable,
        vec![trusted.clone(), crl.clone(), issuers.clone(), issuers_crl.clone()]
    );
    assert!(!report.is_clean());
    assert_eq!(logs.matches("is writable").count(), 4);
    for dir in [&trusted, &crl, &issuers, &issuers_crl] {
        assert!(logs.contains(&format!("PKI directory {} is writable", dir.display())));
    }
    // Setup still succeeded and the paths are stored.
    assert_eq!(cfg.pki().map(|p| p.trusted_certs.clone()), Some(trusted));
}

#[test]
fn test_setup_pki_missing_dirs_are_not_writable() {
    let root = tempfile::tempdir().unwrap();
    let mut cfg = config();

    let report = cfg.setup_pki(
        root.path().join("a"),
        root.path().join("b"),
        root.path().join("c"),
        "",
    );

    assert!(report.is_clean());
    assert_eq!(cfg.pki().map(|p| p.revoked_issuers.as_os_str().is_empty()), Some(true));
}

#[cfg(unix)]
#[test]
fn test_setup_pki_read_only_dir_produces_no_warning() {
    let root = tempfile::tempdir().unwrap();
    let locked = subdir(root.path(), "locked");
    let open = subdir(root.path(), "open");
    make_read_only(&locked);
    if !write_permission_is_enforced(&locked) {
        eprintln!(
            "skipping test_setup_pki_read_only_dir_produces_no_warning: \
             directory permissions are not enforced for this user"
        );
        return;
    }
    let mut cfg = config();

    let (report, logs) = capture_warnings(|| cfg.setup_pki(&locked, &locked, &locked, &open));

    assert_eq!(report.writable, vec![open.clone()]);
    assert_eq!(logs.matches("is writable").count(), 1);
    assert!(logs.contains(&format!("PKI directory {} is writable", open.display())));
    assert!(!logs.contains(&format!("PKI directory {} is", locked.display())));
}

#[test]
fn test_setup_pki_second_call_replaces_first() {
    let mut cfg = config();

    cfg.setup_pki("/nonexistent/a", "/nonexistent/b", "/nonexistent/c", "/nonexistent/d");
    cfg.setup_pki("/nonexistent/w", "/nonexistent/x", "/nonexistent/y", "/nonexistent/z");

    let pki = cfg.pki().expect("configured");
    assert_eq!(pki.trusted_certs, PathBuf::from("/nonexistent/w"));
    assert_eq!(pki.revoked_issuers, PathBuf::from("/nonexistent/z"));
}

// =========================================================================
// client_security_report()
// =========================================================================

#[test]
fn test_report_lists_setup_and_policies() {
    let mut cfg = config();
    cfg.setup_pki("/pki/trusted", "/pki/crl", "/pki/issuers", "/pki/issuers-crl");
    cfg.save_rejected("");
    cfg.set_client_certificate("/pki/own/cert.der", "/pki/own/key.pem");
    let loader = |_: &Path| -> Result<CertificateInfo, SecurityError> {
        Ok(CertificateInfo {
            subject: DistinguishedName {
                common_name: "iocA".into(),
                organization: "Controls".into(),
            },
            issuer: DistinguishedName {
                common_name: "Site CA".into(),
                organization: String::new(),
            },
            serial_number: "7f01".into(),
            fingerprint: "a1b2c3".into(),
            self_signed: false,
        })
    };
    cfg.load_client_certificate(&loader).unwrap();
    let policies = SecurityPolicyRegistry::default();

    let report = client_security_report(&cfg, &policies);

    assert!(report.contains("PKI trusted certificates: /pki/trusted"));
    assert!(report.contains("PKI issuer revocation lists: /pki/issuers-crl"));
    assert!(report.contains("Rejected certificates: saved in /tmp/iocA@hostB"));
    assert!(report.contains("Application URI: urn:hostB:iocA"));
    assert!(report.contains("Subject: iocA (Controls)"));
    assert!(report.contains("Issuer:  Site CA"));
    assert!(report.contains("Serial: 7f01  Fingerprint: a1b2c3"));
    assert!(!report.contains("self-signed"));
    for policy in policies.iter() {
        assert!(report.contains(&policy.uri), "missing {}", policy.uri);
    }
    assert!(!report.contains("not supported"));
}

#[test]
fn test_report_without_security_capability_is_degraded_but_lists_policies() {
    let mut cfg = config();
    cfg.setup_pki("/pki/trusted", "/pki/crl", "/pki/issuers", "/pki/issuers-crl");
    let policies = SecurityPolicyRegistry::none_only();

    let report = client_security_report(&cfg, &policies);

    assert!(report.starts_with("Client security is not supported by this build"));
    assert!(report.contains("Supported security policies:"));
    assert!(report.contains("http://opcfoundation.org/UA/SecurityPolicy#None"));
    assert!(!report.contains("/pki/trusted"));
}

#[test]
fn test_report_unconfigured_setup() {
    let cfg = config();

    let report = client_security_report(&cfg, &SecurityPolicyRegistry::default());

    assert!(report.contains("PKI: not configured"));
    assert!(report.contains("Rejected certificates: not saved"));
    assert!(report.contains("Client certificate: none"));
}
