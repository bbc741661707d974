//! Writability probe for certificate store directories.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

use rand::Rng;
use tracing::{trace, warn};

/// Checks whether files can be written into `dir`.
///
/// Creates a uniquely named file inside the directory, writes a few bytes,
/// and removes it again. Any failure along the way (missing directory, no
/// permission, a regular file instead of a directory) counts as "not
/// writable".
pub fn is_writable(dir: &Path) -> bool {
    let probe = dir.join(format!(".uaconnect-probe-{}", probe_token()));

    let mut file = match OpenOptions::new().write(true).create_new(true).open(&probe) {
        Ok(file) => file,
        Err(e) => {
            trace!(dir = %dir.display(), error = %e, "writability probe: cannot create file");
            return false;
        }
    };

    let written = file.write_all(b"uaconnect writability probe").is_ok();
    drop(file);

    if let Err(e) = fs::remove_file(&probe) {
        warn!(path = %probe.display(), error = %e, "could not remove writability probe file");
    }

    written
}

/// 16 random bytes as lowercase hex.
fn probe_token() -> String {
    let bytes: [u8; 16] = rand::rng().random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
