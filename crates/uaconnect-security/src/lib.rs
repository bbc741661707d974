//! Client-side security configuration for uaconnect.
//!
//! This crate holds everything a session consults before it opens a secure
//! channel:
//!
//! - **Policies** ([`SecurityPolicyRegistry`]): which security policies the
//!   client supports, and how policy URIs are displayed to operators.
//! - **PKI setup** ([`SecurityConfig`]): certificate store directories, the
//!   client certificate pair, and where rejected server certificates go.
//! - **Negotiation** ([`select_endpoint`]): picking the server endpoint that
//!   satisfies the requested mode, policy, and minimum level.
//! - **Diagnostics** ([`client_security_report`]): the operator-facing dump
//!   of all of the above.
//!
//! # Architecture
//!
//! ```text
//! Session (above)   ← reads SecurityConfig + registry when connecting
//!     ↕
//! Security (this crate)   ← pure configuration, no networking
//! ```
//!
//! Nothing in here talks to the network. Discovery results are handed in as
//! [`EndpointDescription`] values by the transport layer.

mod certificate;
mod config;
mod error;
mod identity;
mod negotiate;
mod policy;
mod probe;
mod report;

pub use certificate::{CertificateInfo, CertificateLoader, DistinguishedName};
pub use config::{PkiPaths, PkiSetupReport, SecurityConfig};
pub use error::SecurityError;
pub use identity::ProcessIdentity;
pub use negotiate::{
    EndpointDescription, NegotiatedSecurity, SECURE_URL_SCHEME, SecurityRequest,
    ensure_secure_scheme, select_endpoint,
};
pub use policy::{
    MessageSecurityMode, NONE_POLICY_URI, POLICY_URI_PREFIX, SecurityPolicy,
    SecurityPolicyRegistry,
};
pub use probe::is_writable;
pub use report::{client_security_report, show_client_security};
