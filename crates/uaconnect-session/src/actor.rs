//! Session actor: the task that owns a session's connection.
//!
//! Every operation that touches the connection runs here, one at a time,
//! so a session never has two handshakes in flight:
//!
//! ```text
//! loop {
//!     select! {
//!         cmd   = commands.recv()  → Connect | Retry | Disconnect
//!         event = status.recv()    → ServerStatus of the current channel
//!     }
//! }
//! ```
//!
//! Automatic retries come from the session's [`AutoConnectTimer`], whose
//! callback posts [`Command::Retry`] through a weak sender so the timer
//! never keeps the session alive.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, trace, warn};
use uaconnect_security::{
    NegotiatedSecurity, SecurityRequest, ensure_secure_scheme, select_endpoint,
};
use uaconnect_timer::AutoConnectTimer;
use uaconnect_transport::{
    Channel, ConnectRequest, ServerStatus, StatusEvent, StatusSink, Transport,
};

use crate::session::{RuntimeInfo, Shared};
use crate::{SessionContext, SessionError, SessionState, StatusChange, lock};

/// Commands sent to a session actor.
pub(crate) enum Command {
    /// Connect unless already connected.
    Connect,
    /// Posted by the auto-connect timer.
    Retry,
    /// Tear down and reply once quiescent.
    Disconnect { reply: oneshot::Sender<()> },
}

/// Spawns the actor for `shared` and returns its command sender.
pub(crate) fn spawn_session<T: Transport>(
    shared: Arc<Shared>,
    ctx: Arc<SessionContext<T>>,
) -> mpsc::UnboundedSender<Command> {
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let (event_tx, event_rx) = mpsc::unbounded_channel();

    let retry_tx = cmd_tx.downgrade();
    let timer = ctx.timers.timer(ctx.config.reconnect_delay, move || {
        if let Some(tx) = retry_tx.upgrade() {
            let _ = tx.send(Command::Retry);
        }
    });

    let actor = SessionActor {
        timer,
        retry_pending: false,
        shared,
        ctx,
        channel: None,
        generation: 0,
        cmd_rx,
        event_tx,
        event_rx,
    };
    tokio::spawn(actor.run());
    cmd_tx
}

/// The internal session state. Runs inside a Tokio task.
struct SessionActor<T: Transport> {
    // Declared first so it is released before everything else.
    timer: AutoConnectTimer,
    /// Set while a retry armed by this actor is outstanding. A `Retry`
    /// arriving without it is stale (the retry was cancelled after the
    /// timer already fired).
    retry_pending: bool,
    shared: Arc<Shared>,
    ctx: Arc<SessionContext<T>>,
    channel: Option<T::Channel>,
    /// Incremented for every handshake; events of older channels are
    /// ignored.
    generation: u64,
    cmd_rx: mpsc::UnboundedReceiver<Command>,
    event_tx: mpsc::UnboundedSender<StatusEvent>,
    event_rx: mpsc::UnboundedReceiver<StatusEvent>,
}

impl<T: Transport> SessionActor<T> {
    async fn run(mut self) {
        debug!(session = %self.shared.name, "session task started");

        loop {
            tokio::select! {
                cmd = self.cmd_rx.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd).await,
                    None => break,
                },
                Some(event) = self.event_rx.recv() => self.handle_status(event).await,
            }
        }

        // Every handle is gone: release the timer, then the connection.
        self.cancel_retry();
        self.close_channel().await;
        debug!(session = %self.shared.name, "session task stopped");
    }

    async fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::Connect => self.connect().await,
            Command::Retry => {
                if !self.retry_pending {
                    trace!(session = %self.shared.name, "stale retry ignored");
                    return;
                }
                self.retry_pending = false;
                debug!(session = %self.shared.name, "automatic reconnect");
                self.connect().await;
            }
            Command::Disconnect { reply } => {
                self.disconnect().await;
                let _ = reply.send(());
            }
        }
    }

    // -- connect ------------------------------------------------------------

    async fn connect(&mut self) {
        let name = self.shared.name.clone();
        if self.shared.state() == SessionState::Connected {
            debug!(session = %name, "already connected");
            return;
        }

        // Start from a clean slate, e.g. after a connection loss.
        self.close_channel().await;
        self.set_state(SessionState::Connecting, None);

        let settings = self.shared.settings();
        match self.establish().await {
            Ok((channel, security)) => {
                self.cancel_retry();
                if security.endpoint_url.is_some() {
                    info!(
                        session = %name,
                        level = security.level,
                        mode = %security.mode,
                        policy = %self.ctx.policies.display_name(&security.policy_uri),
                        "connect service succeeded with security"
                    );
                } else {
                    info!(session = %name, "connect service succeeded with no security");
                }
                *lock(&self.shared.runtime) = RuntimeInfo {
                    security,
                    server_max_operations: channel.max_operations_per_call(),
                };
                self.channel = Some(channel);
                self.update_namespaces().await;
                self.set_state(SessionState::Connected, None);
            }
            Err(e) => {
                if !settings.autoconnect || self.shared.debug > 0 {
                    warn!(session = %name, url = %self.shared.url, error = %e, "connect failed");
                } else {
                    debug!(session = %name, error = %e, "connect failed, will retry");
                }
                self.set_state(SessionState::Disconnected, Some(e.to_string()));
                if settings.autoconnect {
                    self.arm_retry();
                }
            }
        }
    }

    /// Security setup plus handshake.
    async fn establish(&mut self) -> Result<(T::Channel, NegotiatedSecurity), SessionError> {
        let settings = self.shared.settings();
        let security = self.negotiate(&settings.security).await?;
        let identity = settings.identity().await?;

        self.generation += 1;
        let sink = StatusSink::new(self.event_tx.clone(), self.generation);
        let request = ConnectRequest {
            session_name: self.shared.name.clone(),
            url: self.shared.url.clone(),
            security: security.clone(),
            client_certificate: settings
                .client_certificate
                .or_else(|| self.ctx.security.client_certificate().map(Into::into)),
            client_private_key: settings
                .client_private_key
                .or_else(|| self.ctx.security.client_private_key().map(Into::into)),
            identity,
        };
        if let Some(user) = request.identity.user() {
            debug!(session = %self.shared.name, user, "activating with user identity");
        }

        let channel = self.ctx.transport.connect(request, sink).await?;
        Ok((channel, security))
    }

    /// Picks the endpoint to use. Without any security request no
    /// discovery happens.
    async fn negotiate(
        &self,
        request: &SecurityRequest,
    ) -> Result<NegotiatedSecurity, SessionError> {
        if request.is_unsecured() {
            trace!(session = %self.shared.name, "no security configured");
            return Ok(NegotiatedSecurity::unsecured());
        }

        let url = &self.shared.url;
        ensure_secure_scheme(url)?;
        debug!(session = %self.shared.name, %url, "reading endpoints");
        let endpoints = self.ctx.transport.endpoints(url).await?;
        Ok(select_endpoint(url, request, &endpoints)?)
    }

    /// Resolves the configured namespace mapping against the server.
    async fn update_namespaces(&mut self) {
        let Some(channel) = &self.channel else {
            return;
        };
        match channel.namespace_array().await {
            Ok(array) => {
                let unknown = lock(&self.shared.namespaces).update(&array);
                for uri in unknown {
                    warn!(
                        session = %self.shared.name,
                        %uri,
                        "locally mapped namespace not found on server"
                    );
                }
            }
            Err(e) => {
                warn!(session = %self.shared.name, error = %e, "reading namespace array failed");
            }
        }
    }

    // -- disconnect ---------------------------------------------------------

    async fn disconnect(&mut self) {
        self.cancel_retry();

        if self.channel.is_none() && self.shared.state() == SessionState::Disconnected {
            debug!(session = %self.shared.name, "already disconnected");
            return;
        }

        self.set_state(SessionState::Disconnecting, None);
        self.close_channel().await;
        self.shared.clear_subscriptions();
        self.set_state(SessionState::Disconnected, None);
    }

    /// Closes the current channel, if any. Failure is logged only: the
    /// channel is gone either way.
    async fn close_channel(&mut self) {
        let Some(mut channel) = self.channel.take() else {
            return;
        };
        let delete = self.ctx.config.delete_subscriptions;
        match channel.close(delete).await {
            Ok(()) => debug!(session = %self.shared.name, channel = %channel.id(), "channel closed"),
            Err(e) => warn!(
                session = %self.shared.name,
                channel = %channel.id(),
                error = %e,
                "disconnect failed"
            ),
        }
        *lock(&self.shared.runtime) = RuntimeInfo::default();
    }

    // -- server status ------------------------------------------------------

    async fn handle_status(&mut self, event: StatusEvent) {
        if event.generation != self.generation || self.channel.is_none() {
            trace!(
                session = %self.shared.name,
                generation = event.generation,
                status = %event.status,
                "status of stale channel ignored"
            );
            return;
        }

        match event.status {
            ServerStatus::ConnectionLost | ServerStatus::ServerShutdown => {
                if self.shared.state() != SessionState::Connected {
                    return;
                }
                warn!(session = %self.shared.name, status = %event.status, "connection lost");
                self.shared.clear_subscriptions();
                self.set_state(SessionState::Disconnected, Some(event.status.to_string()));
                if self.shared.settings().autoconnect {
                    self.arm_retry();
                }
            }
            ServerStatus::WatchdogWarning => {
                warn!(session = %self.shared.name, "connection watchdog warning");
            }
            ServerStatus::NewSessionCreated => {
                info!(session = %self.shared.name, "server created a new session");
                self.update_namespaces().await;
            }
        }
    }

    // -- helpers ------------------------------------------------------------

    fn arm_retry(&mut self) {
        self.retry_pending = true;
        self.timer.start();
    }

    fn cancel_retry(&mut self) {
        self.retry_pending = false;
        self.timer.cancel();
    }

    /// Publishes a state change and tells the listener.
    fn set_state(&self, to: SessionState, reason: Option<String>) {
        let from = self.shared.state.send_replace(to);
        if from == to {
            return;
        }
        info!(session = %self.shared.name, %from, %to, "connection status changed");

        if let Some(listener) = &self.ctx.listener {
            listener.on_status_change(&StatusChange {
                session: self.shared.name.clone(),
                from,
                to,
                reason,
            });
        }
    }
}
