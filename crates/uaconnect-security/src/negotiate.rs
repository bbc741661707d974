//! Endpoint selection for secure channels.
//!
//! Before a session connects with security, the server's endpoints are read
//! (discovery) and one of them is chosen:
//!
//! ```text
//! request: mode=Sign, policy=None-URI (any), min level=10
//!
//!   endpoint 0  opc.tcp  None            level 0    ✗ mode
//!   endpoint 1  opc.tcp  Sign  Basic256  level 20   ✓
//!   endpoint 2  opc.tcp  Sign  Aes256    level 60   ✓ ← highest level wins
//!   endpoint 3  https    Sign  Aes256    level 90   ✗ scheme
//! ```

use serde::{Deserialize, Serialize};

use crate::{MessageSecurityMode, NONE_POLICY_URI, SecurityError};

/// URL scheme for which secure channels can be negotiated.
pub const SECURE_URL_SCHEME: &str = "opc.tcp";

/// What the session asks for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityRequest {
    /// Requested mode. `None` accepts any mode when other criteria are set.
    pub mode: MessageSecurityMode,
    /// Requested policy URI. The None-policy URI accepts any policy.
    pub policy_uri: String,
    /// Minimum acceptable endpoint security level.
    pub min_level: u8,
}

impl Default for SecurityRequest {
    fn default() -> Self {
        Self {
            mode: MessageSecurityMode::None,
            policy_uri: NONE_POLICY_URI.to_string(),
            min_level: 0,
        }
    }
}

impl SecurityRequest {
    /// `true` when nothing beyond the defaults is requested, so no
    /// discovery is needed and the channel stays unsecured.
    pub fn is_unsecured(&self) -> bool {
        self.mode == MessageSecurityMode::None
            && self.policy_uri == NONE_POLICY_URI
            && self.min_level == 0
    }

    fn accepts(&self, endpoint: &EndpointDescription) -> bool {
        endpoint.url.starts_with(SECURE_URL_SCHEME)
            && (self.mode == MessageSecurityMode::None || self.mode == endpoint.mode)
            && (self.policy_uri == NONE_POLICY_URI || self.policy_uri == endpoint.policy_uri)
            && endpoint.level >= self.min_level
    }
}

/// One endpoint as reported by server discovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointDescription {
    pub url: String,
    pub mode: MessageSecurityMode,
    pub policy_uri: String,
    /// Server-assigned relative security level; higher is more secure.
    pub level: u8,
    /// DER-encoded server certificate (empty for unsecured endpoints).
    #[serde(default)]
    pub server_certificate: Vec<u8>,
}

/// The security settings a channel ends up with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NegotiatedSecurity {
    pub mode: MessageSecurityMode,
    pub policy_uri: String,
    pub level: u8,
    pub server_certificate: Vec<u8>,
    /// URL of the selected endpoint; `None` for unsecured channels.
    pub endpoint_url: Option<String>,
}

impl NegotiatedSecurity {
    /// No security: mode `None`, None-policy, no server certificate.
    pub fn unsecured() -> Self {
        Self {
            mode: MessageSecurityMode::None,
            policy_uri: NONE_POLICY_URI.to_string(),
            level: 0,
            server_certificate: Vec::new(),
            endpoint_url: None,
        }
    }

    /// Whether `endpoint` is the one this negotiation picked.
    pub fn uses(&self, endpoint: &EndpointDescription) -> bool {
        self.endpoint_url.as_deref() == Some(endpoint.url.as_str())
            && self.mode == endpoint.mode
            && self.policy_uri == endpoint.policy_uri
    }
}

/// Fails unless `url` uses the [`SECURE_URL_SCHEME`] scheme.
///
/// # Errors
/// [`SecurityError::UnsupportedUrl`]
pub fn ensure_secure_scheme(url: &str) -> Result<(), SecurityError> {
    if url.starts_with(SECURE_URL_SCHEME) {
        Ok(())
    } else {
        Err(SecurityError::UnsupportedUrl(url.to_string()))
    }
}

/// Picks the endpoint with the highest level that satisfies `request`.
///
/// On equal levels the last endpoint in discovery order wins.
///
/// # Errors
/// [`SecurityError::NoMatchingEndpoint`] when no endpoint qualifies.
pub fn select_endpoint(
    url: &str,
    request: &SecurityRequest,
    endpoints: &[EndpointDescription],
) -> Result<NegotiatedSecurity, SecurityError> {
    let best = endpoints
        .iter()
        .filter(|ep| request.accepts(ep))
        .fold(None::<&EndpointDescription>, |best, ep| match best {
            Some(b) if b.level > ep.level => Some(b),
            _ => Some(ep),
        })
        .ok_or_else(|| SecurityError::NoMatchingEndpoint {
            url: url.to_string(),
        })?;

    Ok(NegotiatedSecurity {
        mode: best.mode,
        policy_uri: best.policy_uri.clone(),
        level: best.level,
        server_certificate: best.server_certificate.clone(),
        endpoint_url: Some(best.url.clone()),
    })
}
