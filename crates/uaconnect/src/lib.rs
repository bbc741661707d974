//! # uaconnect
//!
//! Client-side session connection manager for OPC UA style servers.
//!
//! uaconnect keeps a set of named sessions connected: it negotiates channel
//! security against the server's endpoints, retries failed or lost
//! connections on a timer, and reports every state change to the host
//! application. The wire protocol lives behind the [`Transport`] trait.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use uaconnect::prelude::*;
//!
//! # async fn run() -> Result<(), UaConnectError> {
//! let client = Client::builder(MemoryTransport::new()).build();
//! let session = client.create_session("plc1", "opc.tcp://plc1:4840", 0, true)?;
//! session.set_option("sec-mode", "SignAndEncrypt")?;
//!
//! client.start();
//! // ...
//! client.shutdown().await;
//! # Ok(())
//! # }
//! ```
//!
//! [`Transport`]: uaconnect_transport::Transport

mod client;
mod config;
mod error;
pub mod logging;

pub use client::{Client, ClientBuilder};
pub use config::{ClientConfig, SessionSpec};
pub use error::UaConnectError;

pub mod prelude {
    pub use crate::{Client, ClientBuilder, ClientConfig, SessionSpec, UaConnectError};
    pub use uaconnect_security::{
        MessageSecurityMode, PkiPaths, ProcessIdentity, SecurityConfig, SecurityPolicyRegistry,
    };
    pub use uaconnect_session::{
        Session, SessionConfig, SessionError, SessionRegistry, SessionState, StatusChange,
        StatusListener, Subscription,
    };
    pub use uaconnect_timer::TimerQueue;
    pub use uaconnect_transport::{Channel, MemoryTransport, ServerStatus, Transport};
}
