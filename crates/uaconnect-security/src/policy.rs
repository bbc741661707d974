//! Security policies and message security modes.
//!
//! A security policy is a named combination of cryptographic algorithms. On
//! the wire it is identified by a URI whose fragment is the policy's short
//! name:
//!
//! ```text
//! http://opcfoundation.org/UA/SecurityPolicy#Basic256Sha256
//!                                             └── suffix ──┘
//! ```
//!
//! The [`SecurityPolicyRegistry`] is the client's list of policies it is able
//! to use. It is built once at startup from a list of names and never changes
//! afterwards.

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::SecurityError;

/// Common prefix of all well-known policy URIs.
pub const POLICY_URI_PREFIX: &str = "http://opcfoundation.org/UA/SecurityPolicy#";

/// URI of the "no security" policy. Always present in every registry.
pub const NONE_POLICY_URI: &str = "http://opcfoundation.org/UA/SecurityPolicy#None";

/// Well-known policies: (URI suffix, display name).
const KNOWN_POLICIES: &[(&str, &str)] = &[
    ("None", "None"),
    ("Basic128Rsa15", "Basic128Rsa15"),
    ("Basic256", "Basic256"),
    ("Basic256Sha256", "Basic256Sha256"),
    ("Aes128_Sha256_RsaOaep", "Aes128Sha256RsaOaep"),
    ("Aes256_Sha256_RsaPss", "Aes256Sha256RsaPss"),
];

// ---------------------------------------------------------------------------
// MessageSecurityMode
// ---------------------------------------------------------------------------

/// How messages on a secure channel are protected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageSecurityMode {
    /// No signing, no encryption.
    #[default]
    None,
    /// Messages are signed.
    Sign,
    /// Messages are signed and encrypted.
    SignAndEncrypt,
}

impl fmt::Display for MessageSecurityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "None"),
            Self::Sign => write!(f, "Sign"),
            Self::SignAndEncrypt => write!(f, "SignAndEncrypt"),
        }
    }
}

impl FromStr for MessageSecurityMode {
    type Err = SecurityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "None" | "none" => Ok(Self::None),
            "Sign" => Ok(Self::Sign),
            "SignAndEncrypt" => Ok(Self::SignAndEncrypt),
            other => Err(SecurityError::InvalidMode(other.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// SecurityPolicy
// ---------------------------------------------------------------------------

/// One entry of the registry: identifier URI plus display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityPolicy {
    /// Full policy URI, e.g. `http://opcfoundation.org/UA/SecurityPolicy#None`.
    pub uri: String,
    /// Short name shown to operators and accepted by the `sec-policy` option.
    pub name: String,
}

impl SecurityPolicy {
    /// Creates a policy entry.
    pub fn new(uri: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            name: name.into(),
        }
    }

    /// Returns `true` for the "no security" policy.
    pub fn is_none(&self) -> bool {
        self.uri == NONE_POLICY_URI
    }
}

// ---------------------------------------------------------------------------
// SecurityPolicyRegistry
// ---------------------------------------------------------------------------

/// The set of security policies this client supports.
///
/// Entries keep their registration order, which is also the order the
/// diagnostics print them in. The `None` policy is always the first entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityPolicyRegistry {
    policies: Vec<SecurityPolicy>,
}

impl SecurityPolicyRegistry {
    /// Creates a registry holding the `None` policy plus `policies`.
    ///
    /// Duplicate URIs are dropped (first one wins).
    pub fn new(policies: impl IntoIterator<Item = SecurityPolicy>) -> Self {
        let mut registry = Self::none_only();
        for policy in policies {
            if registry.lookup(&policy.uri).is_none() {
                registry.policies.push(policy);
            }
        }
        registry
    }

    /// A registry that only knows the `None` policy.
    ///
    /// This is what a build without any cryptographic support uses; the
    /// client-security diagnostics report the capability as unsupported.
    pub fn none_only() -> Self {
        Self {
            policies: vec![SecurityPolicy::new(NONE_POLICY_URI, "None")],
        }
    }

    /// Builds a registry from well-known policy names, e.g.
    /// `["Basic256Sha256", "Aes256Sha256RsaPss"]`.
    ///
    /// `None` is implied and may be omitted.
    ///
    /// # Errors
    /// Returns [`SecurityError::UnknownPolicy`] for names that are not
    /// well-known policies.
    pub fn from_names<I, S>(names: I) -> Result<Self, SecurityError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut policies = Vec::new();
        for name in names {
            let name = name.as_ref();
            let (suffix, display) = KNOWN_POLICIES
                .iter()
                .find(|(suffix, display)| *display == name || *suffix == name)
                .ok_or_else(|| SecurityError::UnknownPolicy(name.to_string()))?;
            policies.push(SecurityPolicy::new(
                format!("{POLICY_URI_PREFIX}{suffix}"),
                *display,
            ));
        }
        Ok(Self::new(policies))
    }

    /// Returns the registered entry for an exact URI.
    pub fn lookup(&self, uri: &str) -> Option<&SecurityPolicy> {
        self.policies.iter().find(|p| p.uri == uri)
    }

    /// Resolves a short name (`Basic256Sha256`, case-sensitive; `none` is
    /// also accepted) or a full registered URI.
    pub fn resolve(&self, name_or_uri: &str) -> Option<&SecurityPolicy> {
        if name_or_uri == "none" {
            return self.lookup(NONE_POLICY_URI);
        }
        self.policies
            .iter()
            .find(|p| p.name == name_or_uri || p.uri == name_or_uri)
    }

    /// Returns `true` if the exact URI is registered.
    pub fn is_supported(&self, uri: &str) -> bool {
        self.lookup(uri).is_some()
    }

    /// Display name for a policy URI.
    ///
    /// - registered URI → its display name
    /// - `...#Suffix` not registered → `"Suffix (unsupported)"`
    /// - no `#` separator, or nothing after it → `"Invalid"`
    pub fn display_name<'a>(&'a self, uri: &str) -> Cow<'a, str> {
        if let Some(policy) = self.lookup(uri) {
            return Cow::Borrowed(&policy.name);
        }
        match uri.rsplit_once('#') {
            Some((_, suffix)) if !suffix.is_empty() => {
                Cow::Owned(format!("{suffix} (unsupported)"))
            }
            _ => Cow::Borrowed("Invalid"),
        }
    }

    /// Whether any policy beyond `None` is available.
    pub fn security_available(&self) -> bool {
        self.policies.iter().any(|p| !p.is_none())
    }

    /// Iterates over the supported policies in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &SecurityPolicy> {
        self.policies.iter()
    }

    /// Short names of all supported policies, space separated.
    ///
    /// Used in error messages for the `sec-policy` option.
    pub fn names(&self) -> String {
        self.policies
            .iter()
            .map(|p| p.name.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Number of supported policies (including `None`).
    pub fn len(&self) -> usize {
        self.policies.len()
    }

    /// Always `false`: the `None` policy is always registered.
    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }
}

/// All well-known policies.
impl Default for SecurityPolicyRegistry {
    fn default() -> Self {
        Self::new(KNOWN_POLICIES.iter().map(|(suffix, display)| {
            SecurityPolicy::new(format!("{POLICY_URI_PREFIX}{suffix}"), *display)
        }))
    }
}
