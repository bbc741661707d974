//! Client configuration, as deserialized from the host's config file.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use uaconnect_security::PkiPaths;
use uaconnect_session::SessionConfig;

/// Everything [`Client::from_config`](crate::Client::from_config) needs.
///
/// Every field has a default, so a config only lists what it changes:
///
/// ```json
/// {
///   "reconnect_delay_ms": 5000,
///   "sessions": [
///     { "name": "plc1", "url": "opc.tcp://plc1:4840",
///       "options": { "sec-mode": "SignAndEncrypt" } }
///   ]
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Delay before an automatic reconnect, in milliseconds.
    pub reconnect_delay_ms: u64,

    /// Delete server-side subscriptions on disconnect.
    pub delete_subscriptions: bool,

    /// PKI store directories. Each is checked for writability.
    pub pki: Option<PkiPaths>,

    /// Process-wide client certificate and private key.
    pub client_certificate: Option<PathBuf>,
    pub client_private_key: Option<PathBuf>,

    /// Save rejected server certificates; `""` selects the default
    /// directory.
    pub save_rejected: Option<String>,

    /// Restricts the supported security policies (short names). `None`
    /// keeps every known policy.
    pub policies: Option<Vec<String>>,

    pub sessions: Vec<SessionSpec>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            reconnect_delay_ms: 10_000,
            delete_subscriptions: true,
            pki: None,
            client_certificate: None,
            client_private_key: None,
            save_rejected: None,
            policies: None,
            sessions: Vec::new(),
        }
    }
}

impl ClientConfig {
    /// The settings every session shares.
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            reconnect_delay: Duration::from_millis(self.reconnect_delay_ms),
            delete_subscriptions: self.delete_subscriptions,
        }
    }
}

/// One session to create at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSpec {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub debug: u32,
    #[serde(default = "default_autoconnect")]
    pub autoconnect: bool,
    /// Session options by name (see `Session::option_help`).
    #[serde(default)]
    pub options: BTreeMap<String, String>,
    /// Local namespace index → namespace URI.
    #[serde(default)]
    pub namespaces: BTreeMap<u16, String>,
}

fn default_autoconnect() -> bool {
    true
}
