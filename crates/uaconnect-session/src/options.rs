//! Per-session options set through [`Session::set_option`](crate::Session::set_option).

use std::io;
use std::path::{Path, PathBuf};

use tracing::warn;
use uaconnect_security::{MessageSecurityMode, SecurityPolicyRegistry, SecurityRequest};
use uaconnect_transport::UserIdentity;

use crate::SessionError;

/// Help text listing every recognized option.
pub const OPTION_HELP: &str = "\
Session options:
  clientcert       client certificate (public key) file
  clientkey        client private key file
  nodes-max        max nodes per service call [0 = no limit]
  batch-nodes      deprecated, use nodes-max
  read-nodes-max   max nodes per read service call [0 = no limit]
  write-nodes-max  max nodes per write service call [0 = no limit]
  sec-mode         requested security mode: None Sign SignAndEncrypt
  sec-policy       requested security policy (short name or URI)
  sec-level-min    minimal acceptable endpoint security level [0-255]
  sec-id           identity file (line 1: user name, line 2: password)
  autoconnect      connect automatically and retry on failure [y|n]
";

/// Settings a session reads on every connect attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSettings {
    pub autoconnect: bool,
    /// Per-session client certificate, overriding the process-wide one.
    pub client_certificate: Option<PathBuf>,
    pub client_private_key: Option<PathBuf>,
    /// Nodes per batched service call; 0 = unlimited.
    pub nodes_max: u32,
    pub read_nodes_max: u32,
    pub write_nodes_max: u32,
    pub security: SecurityRequest,
    pub identity_file: Option<PathBuf>,
}

impl SessionSettings {
    pub fn new(autoconnect: bool) -> Self {
        Self {
            autoconnect,
            client_certificate: None,
            client_private_key: None,
            nodes_max: 0,
            read_nodes_max: 0,
            write_nodes_max: 0,
            security: SecurityRequest::default(),
            identity_file: None,
        }
    }

    /// Applies one option. On error nothing changes.
    pub fn apply(
        &mut self,
        name: &str,
        value: &str,
        policies: &SecurityPolicyRegistry,
    ) -> Result<(), SessionError> {
        let invalid = |reason: &str| SessionError::InvalidOptionValue {
            name: name.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        };

        let path = || non_empty_path(value).ok_or_else(|| invalid("empty path"));
        let count = || parse_count(value).ok_or_else(|| invalid("expected a non-negative integer"));

        match name {
            "clientcert" => self.client_certificate = Some(path()?),
            "clientkey" => self.client_private_key = Some(path()?),
            "nodes-max" => self.nodes_max = count()?,
            "batch-nodes" => {
                self.nodes_max = count()?;
                warn!("DEPRECATED: option 'batch-nodes'; use 'nodes-max' instead");
            }
            "read-nodes-max" => self.read_nodes_max = count()?,
            "write-nodes-max" => self.write_nodes_max = count()?,
            "sec-mode" => {
                self.security.mode = value
                    .trim()
                    .parse::<MessageSecurityMode>()
                    .map_err(|e| invalid(&e.to_string()))?;
            }
            "sec-policy" => {
                let policy = policies.resolve(value.trim()).ok_or_else(|| {
                    invalid(&format!("supported policies: {}", policies.names()))
                })?;
                self.security.policy_uri = policy.uri.clone();
            }
            "sec-level-min" => {
                self.security.min_level = value
                    .trim()
                    .parse::<u8>()
                    .map_err(|_| invalid("expected an integer in 0-255"))?;
            }
            "sec-id" => self.identity_file = Some(path()?),
            "autoconnect" => {
                self.autoconnect = parse_yes_no(value).ok_or_else(|| invalid("expected y or n"))?;
            }
            _ => return Err(SessionError::UnknownOption(name.to_string())),
        }
        Ok(())
    }

    /// Effective read batch size: the smaller of the nonzero caps,
    /// 0 when both are unlimited.
    pub fn read_batch_size(&self) -> u32 {
        combine_caps(self.nodes_max, self.read_nodes_max)
    }

    /// Effective write batch size, same rule as
    /// [`read_batch_size`](Self::read_batch_size).
    pub fn write_batch_size(&self) -> u32 {
        combine_caps(self.nodes_max, self.write_nodes_max)
    }

    /// Reads the identity file, if one is configured.
    pub async fn identity(&self) -> Result<UserIdentity, SessionError> {
        match &self.identity_file {
            None => Ok(UserIdentity::Anonymous),
            Some(path) => read_identity_file(path).await,
        }
    }
}

fn combine_caps(general: u32, specific: u32) -> u32 {
    match (general, specific) {
        (0, n) | (n, 0) => n,
        (a, b) => a.min(b),
    }
}

fn non_empty_path(value: &str) -> Option<PathBuf> {
    let value = value.trim();
    (!value.is_empty()).then(|| PathBuf::from(value))
}

fn parse_count(value: &str) -> Option<u32> {
    value.trim().parse().ok()
}

/// Interprets the first character: `y`/`1`/`t` on, `n`/`0`/`f` off
/// (either case).
pub fn parse_yes_no(value: &str) -> Option<bool> {
    match value.trim_start().chars().next()? {
        'y' | 'Y' | '1' | 't' | 'T' => Some(true),
        'n' | 'N' | '0' | 'f' | 'F' => Some(false),
        _ => None,
    }
}

/// First non-empty line is the user name, the line after it the password.
async fn read_identity_file(path: &Path) -> Result<UserIdentity, SessionError> {
    let identity_error = |source| SessionError::Identity {
        path: path.to_path_buf(),
        source,
    };
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(identity_error)?;

    let mut lines = content.lines().skip_while(|line| line.trim().is_empty());
    let user = lines
        .next()
        .map(str::trim)
        .ok_or_else(|| identity_error(io::Error::new(io::ErrorKind::InvalidData, "no user name")))?;
    let password = lines.next().unwrap_or_default().trim_end_matches('\r');

    Ok(UserIdentity::UserName {
        user: user.to_string(),
        password: password.to_string(),
    })
}
