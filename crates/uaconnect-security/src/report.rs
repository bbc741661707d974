//! Operator-facing dump of the client security setup.

use std::fmt::Write;

use crate::{SecurityConfig, SecurityPolicyRegistry};

/// Renders the client security diagnostics.
///
/// With security available: PKI directories, rejected-certificate handling,
/// application URI, client certificate identity (when loaded), and the
/// supported policies. Without it: a not-supported notice followed by the
/// same policy list.
pub fn client_security_report(config: &SecurityConfig, policies: &SecurityPolicyRegistry) -> String {
    let mut out = String::new();

    if policies.security_available() {
        // Writing into a String cannot fail.
        let _ = write_security_setup(&mut out, config);
    } else {
        out.push_str("Client security is not supported by this build\n");
    }

    let _ = writeln!(out, "Supported security policies:");
    for policy in policies.iter() {
        let _ = writeln!(out, "  {:<20} {}", policy.name, policy.uri);
    }
    out
}

/// Prints [`client_security_report`] on stdout.
pub fn show_client_security(config: &SecurityConfig, policies: &SecurityPolicyRegistry) {
    print!("{}", client_security_report(config, policies));
}

fn write_security_setup(out: &mut String, config: &SecurityConfig) -> std::fmt::Result {
    writeln!(out, "Client security")?;

    match config.pki() {
        Some(pki) => {
            for (label, dir) in pki.labeled() {
                writeln!(out, "  PKI {label}: {}", dir.display())?;
            }
        }
        None => writeln!(out, "  PKI: not configured")?,
    }

    match config.rejected_dir() {
        Some(dir) => writeln!(out, "  Rejected certificates: saved in {}", dir.display())?,
        None => writeln!(out, "  Rejected certificates: not saved")?,
    }

    writeln!(out, "  Application URI: {}", config.identity().application_uri())?;

    match config.client_certificate() {
        Some(path) => writeln!(out, "  Client certificate: {}", path.display())?,
        None => writeln!(out, "  Client certificate: none")?,
    }
    if let Some(cert) = config.client_certificate_info() {
        writeln!(out, "    Subject: {}", cert.subject)?;
        writeln!(out, "    Issuer:  {}", cert.issuer)?;
        writeln!(
            out,
            "    Serial: {}  Fingerprint: {}{}",
            cert.serial_number,
            cert.fingerprint,
            if cert.self_signed { "  self-signed" } else { "" }
        )?;
    }
    Ok(())
}
