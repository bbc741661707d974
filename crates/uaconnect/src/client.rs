//! `Client` builder: one transport, one timer queue, one session registry.
//!
//! This is the entry point for host applications. It ties the layers
//! together: security setup → timer queue → session registry → transport.

use std::sync::Arc;

use tracing::{debug, info};
use uaconnect_security::{
    SecurityConfig, SecurityPolicyRegistry, client_security_report, show_client_security,
};
use uaconnect_session::{Session, SessionConfig, SessionContext, SessionRegistry, StatusListener};
use uaconnect_timer::TimerQueue;
use uaconnect_transport::Transport;

use crate::{ClientConfig, UaConnectError};

/// Builder for a [`Client`].
///
/// # Example
///
/// ```rust,ignore
/// let client = Client::builder(transport)
///     .session_config(SessionConfig::default())
///     .listener(|change: &StatusChange| println!("{change:?}"))
///     .build();
/// ```
pub struct ClientBuilder<T: Transport> {
    transport: T,
    security: SecurityConfig,
    policies: SecurityPolicyRegistry,
    session_config: SessionConfig,
    listener: Option<Arc<dyn StatusListener>>,
}

impl<T: Transport> ClientBuilder<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            security: SecurityConfig::default(),
            policies: SecurityPolicyRegistry::default(),
            session_config: SessionConfig::default(),
            listener: None,
        }
    }

    /// Sets the process-wide security configuration.
    pub fn security(mut self, security: SecurityConfig) -> Self {
        self.security = security;
        self
    }

    /// Sets the supported security policies.
    pub fn policies(mut self, policies: SecurityPolicyRegistry) -> Self {
        self.policies = policies;
        self
    }

    pub fn session_config(mut self, config: SessionConfig) -> Self {
        self.session_config = config;
        self
    }

    /// Receives the state changes of every session.
    pub fn listener(mut self, listener: impl StatusListener) -> Self {
        self.listener = Some(Arc::new(listener));
        self
    }

    /// Starts the timer queue and returns the client. No session exists
    /// yet.
    ///
    /// # Panics
    /// Panics when called outside a Tokio runtime.
    pub fn build(self) -> Client<T> {
        let timers = TimerQueue::spawn();
        let mut ctx = SessionContext::new(Arc::new(self.transport), timers.clone())
            .with_security(Arc::new(self.security))
            .with_policies(Arc::new(self.policies))
            .with_config(self.session_config);
        if let Some(listener) = self.listener {
            ctx = ctx.with_shared_listener(listener);
        }

        Client {
            registry: SessionRegistry::new(Arc::new(ctx)),
            timers,
        }
    }
}

/// A set of named sessions sharing one transport and security setup.
pub struct Client<T: Transport> {
    registry: SessionRegistry<T>,
    timers: TimerQueue,
}

impl<T: Transport> Client<T> {
    pub fn builder(transport: T) -> ClientBuilder<T> {
        ClientBuilder::new(transport)
    }

    /// Builds a client from a deserialized [`ClientConfig`] and creates its
    /// sessions (without connecting them).
    ///
    /// Writable PKI directories are logged, not rejected.
    ///
    /// # Errors
    /// - an unknown name in `policies`
    /// - a duplicate session name
    /// - an unknown session option or an invalid option value
    pub fn from_config(transport: T, config: &ClientConfig) -> Result<Self, UaConnectError> {
        let policies = match &config.policies {
            Some(names) => SecurityPolicyRegistry::from_names(names)?,
            None => SecurityPolicyRegistry::default(),
        };

        let mut security = SecurityConfig::default();
        if let Some(pki) = &config.pki {
            let report = security.set_pki(pki.clone());
            if !report.is_clean() {
                debug!(writable = report.writable.len(), "PKI setup finished with warnings");
            }
        }
        if let (Some(cert), Some(key)) = (&config.client_certificate, &config.client_private_key) {
            security.set_client_certificate(cert, key);
        }
        if let Some(location) = &config.save_rejected {
            security.save_rejected(location);
        }

        let client = Self::builder(transport)
            .security(security)
            .policies(policies)
            .session_config(config.session_config())
            .build();

        for spec in &config.sessions {
            let session =
                client.create_session(&spec.name, &spec.url, spec.debug, spec.autoconnect)?;
            for (name, value) in &spec.options {
                session.set_option(name, value)?;
            }
            for (&index, uri) in &spec.namespaces {
                session.add_namespace_mapping(index, uri.as_str());
            }
        }
        info!(sessions = config.sessions.len(), "client configured");
        Ok(client)
    }

    pub fn registry(&self) -> &SessionRegistry<T> {
        &self.registry
    }

    pub fn context(&self) -> &SessionContext<T> {
        self.registry.context()
    }

    pub fn timers(&self) -> &TimerQueue {
        &self.timers
    }

    /// See [`SessionRegistry::create_session`].
    ///
    /// # Errors
    /// [`SessionError::DuplicateName`](uaconnect_session::SessionError::DuplicateName)
    pub fn create_session(
        &self,
        name: &str,
        url: &str,
        debug: u32,
        autoconnect: bool,
    ) -> Result<Session<T>, UaConnectError> {
        Ok(self.registry.create_session(name, url, debug, autoconnect)?)
    }

    /// # Errors
    /// [`SessionError::NotFound`](uaconnect_session::SessionError::NotFound)
    pub fn find_session(&self, name: &str) -> Result<Session<T>, UaConnectError> {
        Ok(self.registry.find_session(name)?)
    }

    /// Starts connecting every auto-connect session. Returns how many were
    /// started.
    pub fn start(&self) -> usize {
        let started = self.registry.connect_all_auto();
        info!(started, total = self.registry.len(), "client started");
        started
    }

    /// Disconnects every session and waits until all are quiescent.
    pub async fn shutdown(&self) {
        self.registry.disconnect_all().await;
        info!("client shut down");
    }

    /// See [`SessionRegistry::report_all`].
    pub fn report(&self, level: u32) -> String {
        self.registry.report_all(level)
    }

    pub fn show(&self, level: u32) {
        self.registry.show_all(level);
    }

    /// The process-wide security setup (PKI, certificate, policies).
    pub fn security_report(&self) -> String {
        let ctx = self.context();
        client_security_report(ctx.security(), ctx.policies())
    }

    pub fn show_security(&self) {
        let ctx = self.context();
        show_client_security(ctx.security(), ctx.policies());
    }
}
