//! The session handle and the context sessions are created from.
//!
//! A [`Session`] is a cheap, clonable handle. The connection itself is
//! owned by a per-session actor task (see `actor.rs`); the handle only
//! enqueues commands and reads shared, lock-protected diagnostics:
//!
//! ```text
//!   Session (handle, any thread)
//!     │ connect()      ──Command::Connect──────────┐
//!     │ disconnect()   ──Command::Disconnect──┐    │   (unbounded mpsc)
//!     │                     ◄── oneshot ──────┤    ▼
//!     │                                   SessionActor task
//!     │ is_connected() ◄── watch<SessionState> ────┤
//!     │ report()       ◄── Mutex<RuntimeInfo> ─────┘
//! ```

use std::fmt::{self, Write};
use std::sync::{Arc, Mutex};

use tokio::sync::{mpsc, oneshot, watch};
use tracing::warn;
use uaconnect_security::{NegotiatedSecurity, SecurityConfig, SecurityPolicyRegistry};
use uaconnect_timer::TimerQueue;
use uaconnect_transport::Transport;

use crate::actor::{Command, spawn_session};
use crate::namespace::NamespaceMap;
use crate::options::{OPTION_HELP, SessionSettings};
use crate::{SessionConfig, SessionError, SessionState, StatusListener, Subscription, lock};

// ---------------------------------------------------------------------------
// SessionContext
// ---------------------------------------------------------------------------

/// Everything sessions share: the transport, the process-wide security
/// setup, the timer queue, and the status listener.
///
/// Built once at startup. Every session keeps an `Arc` to it.
pub struct SessionContext<T: Transport> {
    pub(crate) transport: Arc<T>,
    pub(crate) security: Arc<SecurityConfig>,
    pub(crate) policies: Arc<SecurityPolicyRegistry>,
    pub(crate) timers: TimerQueue,
    pub(crate) config: SessionConfig,
    pub(crate) listener: Option<Arc<dyn StatusListener>>,
}

impl<T: Transport> SessionContext<T> {
    /// A context with default security (all known policies, nothing
    /// configured) and default [`SessionConfig`].
    pub fn new(transport: Arc<T>, timers: TimerQueue) -> Self {
        Self {
            transport,
            security: Arc::new(SecurityConfig::default()),
            policies: Arc::new(SecurityPolicyRegistry::default()),
            timers,
            config: SessionConfig::default(),
            listener: None,
        }
    }

    pub fn with_security(mut self, security: Arc<SecurityConfig>) -> Self {
        self.security = security;
        self
    }

    pub fn with_policies(mut self, policies: Arc<SecurityPolicyRegistry>) -> Self {
        self.policies = policies;
        self
    }

    pub fn with_config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_listener(mut self, listener: impl StatusListener) -> Self {
        self.listener = Some(Arc::new(listener));
        self
    }

    /// Same as [`with_listener`](Self::with_listener) for a listener that
    /// is already shared.
    pub fn with_shared_listener(mut self, listener: Arc<dyn StatusListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    pub fn security(&self) -> &SecurityConfig {
        &self.security
    }

    pub fn policies(&self) -> &SecurityPolicyRegistry {
        &self.policies
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }
}

// ---------------------------------------------------------------------------
// Shared session state
// ---------------------------------------------------------------------------

/// Negotiated values of the current (or last) connection.
#[derive(Debug, Clone)]
pub(crate) struct RuntimeInfo {
    pub(crate) security: NegotiatedSecurity,
    pub(crate) server_max_operations: Option<u32>,
}

impl Default for RuntimeInfo {
    fn default() -> Self {
        Self {
            security: NegotiatedSecurity::unsecured(),
            server_max_operations: None,
        }
    }
}

/// State read by the handle and written by the actor.
pub(crate) struct Shared {
    pub(crate) name: String,
    pub(crate) url: String,
    pub(crate) debug: u32,
    pub(crate) settings: Mutex<SessionSettings>,
    pub(crate) runtime: Mutex<RuntimeInfo>,
    pub(crate) namespaces: Mutex<NamespaceMap>,
    pub(crate) subscriptions: Mutex<Vec<Arc<dyn Subscription>>>,
    pub(crate) state: watch::Sender<SessionState>,
}

impl Shared {
    pub(crate) fn new(name: String, url: String, debug: u32, autoconnect: bool) -> Self {
        let (state, _) = watch::channel(SessionState::Disconnected);
        Self {
            name,
            url,
            debug,
            settings: Mutex::new(SessionSettings::new(autoconnect)),
            runtime: Mutex::new(RuntimeInfo::default()),
            namespaces: Mutex::new(NamespaceMap::default()),
            subscriptions: Mutex::new(Vec::new()),
            state,
        }
    }

    pub(crate) fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    pub(crate) fn settings(&self) -> SessionSettings {
        lock(&self.settings).clone()
    }

    /// Tells every subscription its server side is gone.
    pub(crate) fn clear_subscriptions(&self) {
        // Cloned so `clear` may call back into the session.
        let subscriptions = lock(&self.subscriptions).clone();
        for subscription in &subscriptions {
            subscription.clear();
        }
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Handle to one named session.
///
/// Cloning yields another handle to the same session; the registry hands
/// out clones.
pub struct Session<T: Transport> {
    shared: Arc<Shared>,
    ctx: Arc<SessionContext<T>>,
    cmd_tx: mpsc::UnboundedSender<Command>,
}

impl<T: Transport> Clone for Session<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            ctx: Arc::clone(&self.ctx),
            cmd_tx: self.cmd_tx.clone(),
        }
    }
}

impl<T: Transport> fmt::Debug for Session<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("name", &self.shared.name)
            .field("url", &self.shared.url)
            .field("state", &self.state())
            .finish()
    }
}

impl<T: Transport> Session<T> {
    /// Creates the session and spawns its task. Does not connect.
    ///
    /// Sessions are normally created through
    /// [`SessionRegistry::create_session`](crate::SessionRegistry::create_session),
    /// which also enforces unique names.
    ///
    /// # Panics
    /// Panics when called outside a Tokio runtime.
    pub fn new(
        ctx: Arc<SessionContext<T>>,
        name: impl Into<String>,
        url: impl Into<String>,
        debug: u32,
        autoconnect: bool,
    ) -> Self {
        let shared = Arc::new(Shared::new(name.into(), url.into(), debug, autoconnect));
        let cmd_tx = spawn_session(Arc::clone(&shared), Arc::clone(&ctx));

        Self {
            shared,
            ctx,
            cmd_tx,
        }
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn url(&self) -> &str {
        &self.shared.url
    }

    pub fn debug(&self) -> u32 {
        self.shared.debug
    }

    /// Whether two handles refer to the same session.
    pub fn same_session(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    // -- lifecycle ----------------------------------------------------------

    /// Starts connecting and returns immediately.
    ///
    /// A no-op when already connected. The outcome of the handshake is
    /// reported through the [`StatusListener`] and the log; on failure an
    /// auto-connecting session retries after the configured delay.
    ///
    /// # Errors
    /// [`SessionError::Unavailable`] when the session task has stopped.
    pub fn connect(&self) -> Result<(), SessionError> {
        if self.is_connected() {
            return Ok(());
        }
        self.cmd_tx
            .send(Command::Connect)
            .map_err(|_| SessionError::Unavailable(self.shared.name.clone()))
    }

    /// Disconnects and waits until the session is quiescent.
    ///
    /// Cancels a pending automatic retry, closes the channel (deleting the
    /// server-side subscriptions), and clears the host subscriptions. Always
    /// ends in [`SessionState::Disconnected`]; a failing teardown is logged.
    /// Commands queued before this one (a running connect attempt) complete
    /// first.
    ///
    /// # Errors
    /// [`SessionError::Unavailable`] when the session task has stopped.
    pub async fn disconnect(&self) -> Result<(), SessionError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Disconnect { reply: reply_tx })
            .map_err(|_| SessionError::Unavailable(self.shared.name.clone()))?;
        reply_rx
            .await
            .map_err(|_| SessionError::Unavailable(self.shared.name.clone()))
    }

    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    pub fn state(&self) -> SessionState {
        self.shared.state()
    }

    /// A receiver that observes every state change.
    pub fn watch_state(&self) -> watch::Receiver<SessionState> {
        self.shared.state.subscribe()
    }

    // -- configuration ------------------------------------------------------

    /// Sets a session option (see [`Session::option_help`]).
    ///
    /// Takes effect on the next connect attempt.
    ///
    /// # Errors
    /// - [`SessionError::UnknownOption`]: also logged as a warning
    /// - [`SessionError::InvalidOptionValue`]: previous value kept
    pub fn set_option(&self, name: &str, value: &str) -> Result<(), SessionError> {
        let result = lock(&self.shared.settings).apply(name, value, &self.ctx.policies);
        if let Err(e @ SessionError::UnknownOption(_)) = &result {
            warn!(session = %self.shared.name, error = %e, "option ignored");
        }
        result
    }

    /// The recognized options with a short description each.
    pub fn option_help() -> &'static str {
        OPTION_HELP
    }

    /// Snapshot of the current settings.
    pub fn settings(&self) -> SessionSettings {
        self.shared.settings()
    }

    pub fn autoconnect(&self) -> bool {
        lock(&self.shared.settings).autoconnect
    }

    /// Binds the local namespace `index` to `uri`.
    ///
    /// Resolved against the server's namespace array on the next connect.
    pub fn add_namespace_mapping(&self, index: u16, uri: impl Into<String>) {
        lock(&self.shared.namespaces).add(index, uri);
    }

    /// The server namespace index for a local one; the local index itself
    /// when it is not mapped or not resolved.
    pub fn map_namespace_index(&self, local: u16) -> u16 {
        lock(&self.shared.namespaces).map_index(local)
    }

    /// Attaches a host subscription to this session.
    pub fn add_subscription(&self, subscription: Arc<dyn Subscription>) {
        lock(&self.shared.subscriptions).push(subscription);
    }

    pub fn subscription_count(&self) -> usize {
        lock(&self.shared.subscriptions).len()
    }

    /// Negotiated security of the current (or last) connection.
    pub fn negotiated_security(&self) -> NegotiatedSecurity {
        lock(&self.shared.runtime).security.clone()
    }

    // -- diagnostics --------------------------------------------------------

    /// One status line, then (level ≥ 1) one line per subscription, then
    /// (level ≥ 2) the namespace mapping.
    pub fn report(&self, level: u32) -> String {
        let mut out = self.status_line();
        out.push('\n');

        if level >= 1 {
            for subscription in lock(&self.shared.subscriptions).iter() {
                let _ = writeln!(out, "  {}", subscription.summary());
            }
        }
        if level >= 2 {
            lock(&self.shared.namespaces).write_report(&mut out);
        }
        out
    }

    /// Prints [`report`](Self::report) on stdout.
    pub fn show(&self, level: u32) {
        print!("{}", self.report(level));
    }

    fn status_line(&self) -> String {
        let settings = self.shared.settings();
        let runtime = lock(&self.shared.runtime).clone();
        let state = self.state();
        let policies = &self.ctx.policies;

        let batch = match (state.is_connected(), runtime.server_max_operations) {
            (true, Some(max)) => max.to_string(),
            _ => "?".to_string(),
        };

        format!(
            "session={} url={} status={} sec-mode={}({}) sec-policy={}({}) sec-level={} \
             debug={} batch={}({}) autoconnect={} subscriptions={}",
            self.shared.name,
            self.shared.url,
            state,
            runtime.security.mode,
            settings.security.mode,
            policies.display_name(&runtime.security.policy_uri),
            policies.display_name(&settings.security.policy_uri),
            settings.security.min_level,
            self.shared.debug,
            batch,
            settings.nodes_max,
            if settings.autoconnect { "y" } else { "n" },
            self.subscription_count(),
        )
    }

    /// Reads the server's endpoints and describes each secure-capable one.
    ///
    /// The endpoint in use by the current connection is marked with `=`
    /// instead of `-`.
    ///
    /// # Errors
    /// Discovery failures from the transport.
    pub async fn security_report(&self) -> Result<String, SessionError> {
        let endpoints = self.ctx.transport.endpoints(&self.shared.url).await?;
        let in_use = self.is_connected().then(|| self.negotiated_security());
        let policies = &self.ctx.policies;

        let mut out = format!("Session {} ({}) endpoints:\n", self.shared.name, self.shared.url);
        for (k, endpoint) in endpoints.iter().enumerate() {
            if !endpoint.url.starts_with(uaconnect_security::SECURE_URL_SCHEME) {
                continue;
            }
            let mark = if in_use.as_ref().is_some_and(|sec| sec.uses(endpoint)) {
                '='
            } else {
                '-'
            };
            let _ = writeln!(
                out,
                "  {short} Level: {:>3} {long} Endpoint {k}",
                endpoint.level,
                short = mark.to_string().repeat(5),
                long = mark.to_string().repeat(45),
            );
            let _ = writeln!(
                out,
                "    Security Mode: {}    Policy: {}",
                endpoint.mode,
                policies.display_name(&endpoint.policy_uri)
            );
            let _ = writeln!(out, "    URL: {}", endpoint.url);
            let _ = writeln!(
                out,
                "    Server Certificate: {} bytes",
                endpoint.server_certificate.len()
            );
        }
        Ok(out)
    }

    /// Prints [`security_report`](Self::security_report) on stdout, or the
    /// discovery error on stderr.
    pub async fn show_security(&self) {
        match self.security_report().await {
            Ok(report) => print!("{report}"),
            Err(e) => eprintln!("Session {}: endpoint discovery failed: {e}", self.shared.name),
        }
    }
}
