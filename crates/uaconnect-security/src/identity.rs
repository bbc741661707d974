//! Process identity: who this client is on the network.

use std::path::PathBuf;

const UNKNOWN_HOST: &str = "unknown-host";
const UNKNOWN_PROCESS: &str = "unknown-process";

/// Host and process name of the running client.
///
/// Only used for two things: the default directory for rejected
/// certificates and the application URI shown in diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessIdentity {
    pub process_name: String,
    pub host_name: String,
}

impl ProcessIdentity {
    /// Creates an identity from explicit names.
    pub fn new(process_name: impl Into<String>, host_name: impl Into<String>) -> Self {
        Self {
            process_name: process_name.into(),
            host_name: host_name.into(),
        }
    }

    /// Detects the identity of the current process.
    ///
    /// Host name: `HOSTNAME`, then `/proc/sys/kernel/hostname`, then
    /// `unknown-host`. Process name: the executable's file stem, then
    /// `unknown-process`.
    pub fn detect() -> Self {
        let host_name = std::env::var("HOSTNAME")
            .ok()
            .filter(|h| !h.trim().is_empty())
            .or_else(|| {
                std::fs::read_to_string("/proc/sys/kernel/hostname")
                    .ok()
                    .map(|h| h.trim().to_string())
                    .filter(|h| !h.is_empty())
            })
            .unwrap_or_else(|| UNKNOWN_HOST.to_string());

        let process_name = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.file_stem().map(|s| s.to_string_lossy().into_owned()))
            .unwrap_or_else(|| UNKNOWN_PROCESS.to_string());

        Self {
            process_name,
            host_name,
        }
    }

    /// `urn:<host>:<process>`
    pub fn application_uri(&self) -> String {
        format!("urn:{}:{}", self.host_name, self.process_name)
    }

    /// `/tmp/<process>@<host>`
    pub fn default_rejected_dir(&self) -> PathBuf {
        PathBuf::from(format!("/tmp/{}@{}", self.process_name, self.host_name))
    }
}
