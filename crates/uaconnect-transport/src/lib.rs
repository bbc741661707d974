//! Transport abstraction layer for uaconnect.
//!
//! Sessions never speak the wire protocol themselves. They go through the
//! [`Transport`] trait to open a [`Channel`] to a server, read the server's
//! endpoints, and receive asynchronous [`ServerStatus`] events.
//!
//! ```text
//!   Session task ──connect(request, sink)──→ Transport ──→ server
//!        ▲                                       │
//!        │        StatusEvent { generation, .. } │ (any thread, never blocks)
//!        └────────────── StatusSink ◄────────────┘
//! ```
//!
//! [`MemoryTransport`] is an in-process implementation for tests and
//! simulations.

mod error;
mod memory;

pub use error::TransportError;
pub use memory::{MemoryChannel, MemoryTransport};
pub use uaconnect_security::{EndpointDescription, NegotiatedSecurity};

use std::fmt;
use std::future::Future;
use std::path::PathBuf;

use tokio::sync::mpsc;
use tracing::trace;

/// Opaque identifier for an open channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelId(u64);

impl ChannelId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "chan-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Connect request
// ---------------------------------------------------------------------------

/// User identity presented during session activation.
#[derive(Clone, Default, PartialEq, Eq)]
pub enum UserIdentity {
    #[default]
    Anonymous,
    UserName { user: String, password: String },
}

impl UserIdentity {
    /// The user name, if any.
    pub fn user(&self) -> Option<&str> {
        match self {
            Self::Anonymous => None,
            Self::UserName { user, .. } => Some(user),
        }
    }
}

// Hand-written so passwords never reach a log line.
impl fmt::Debug for UserIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Anonymous => f.write_str("Anonymous"),
            Self::UserName { user, .. } => f
                .debug_struct("UserName")
                .field("user", user)
                .field("password", &"<redacted>")
                .finish(),
        }
    }
}

/// Everything a transport needs to open a session channel.
#[derive(Debug, Clone)]
pub struct ConnectRequest {
    /// Name of the requesting session, for logging.
    pub session_name: String,
    pub url: String,
    pub security: NegotiatedSecurity,
    pub client_certificate: Option<PathBuf>,
    pub client_private_key: Option<PathBuf>,
    pub identity: UserIdentity,
}

impl ConnectRequest {
    /// An anonymous, unsecured request.
    pub fn new(session_name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            session_name: session_name.into(),
            url: url.into(),
            security: NegotiatedSecurity::unsecured(),
            client_certificate: None,
            client_private_key: None,
            identity: UserIdentity::Anonymous,
        }
    }
}

// ---------------------------------------------------------------------------
// Status events
// ---------------------------------------------------------------------------

/// Asynchronous server status reported on an open channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerStatus {
    /// The connection to the server was lost.
    ConnectionLost,
    /// The server announced that it is shutting down.
    ServerShutdown,
    /// Keep-alive responses are late; the connection may be failing.
    WatchdogWarning,
    /// The server side session was recreated (e.g. after a server restart
    /// the client transparently reconnected to).
    NewSessionCreated,
}

impl fmt::Display for ServerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::ConnectionLost => "connection lost",
            Self::ServerShutdown => "server shutdown",
            Self::WatchdogWarning => "watchdog warning",
            Self::NewSessionCreated => "new session created",
        };
        f.write_str(s)
    }
}

/// A [`ServerStatus`] tagged with the channel generation that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusEvent {
    pub generation: u64,
    pub status: ServerStatus,
}

/// Where a channel reports its [`ServerStatus`] events.
///
/// Sending never blocks and never fails visibly: once the receiving session
/// is gone, events are dropped.
#[derive(Debug, Clone)]
pub struct StatusSink {
    tx: mpsc::UnboundedSender<StatusEvent>,
    generation: u64,
}

impl StatusSink {
    pub fn new(tx: mpsc::UnboundedSender<StatusEvent>, generation: u64) -> Self {
        Self { tx, generation }
    }

    pub fn notify(&self, status: ServerStatus) {
        let event = StatusEvent {
            generation: self.generation,
            status,
        };
        if self.tx.send(event).is_err() {
            trace!(%status, generation = self.generation, "status receiver gone, event dropped");
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Opens session channels to servers.
///
/// One transport is shared by all sessions (`Arc<T>`), so methods take
/// `&self` and may run concurrently for different sessions.
pub trait Transport: Send + Sync + 'static {
    /// The channel type produced by this transport.
    type Channel: Channel;

    /// Performs the full handshake (secure channel, session creation,
    /// activation) and returns the open channel.
    ///
    /// Status events of the channel are reported through `sink` until the
    /// channel is closed.
    fn connect(
        &self,
        request: ConnectRequest,
        sink: StatusSink,
    ) -> impl Future<Output = Result<Self::Channel, TransportError>> + Send;

    /// Reads the endpoint list of the server at `url` (discovery).
    fn endpoints(
        &self,
        url: &str,
    ) -> impl Future<Output = Result<Vec<EndpointDescription>, TransportError>> + Send;
}

/// An open session channel.
pub trait Channel: Send + Sync + 'static {
    /// Closes the session. With `delete_subscriptions` the server is asked
    /// to drop the subscriptions created on it.
    ///
    /// After this returns (with either result) the channel is unusable.
    fn close(
        &mut self,
        delete_subscriptions: bool,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Reads the server's namespace array (index → URI).
    fn namespace_array(&self) -> impl Future<Output = Result<Vec<String>, TransportError>> + Send;

    /// Server limit for operations per service call, if it reports one.
    fn max_operations_per_call(&self) -> Option<u32>;

    fn id(&self) -> ChannelId;
}
