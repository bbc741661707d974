//! Session registry: creates sessions and finds them by name.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, info};
use uaconnect_transport::Transport;

use crate::{Session, SessionContext, SessionError};

/// Every session of the process, keyed by name.
///
/// Names are unique for the lifetime of the registry; sessions are never
/// removed. Lookups return handles to the same session every time.
pub struct SessionRegistry<T: Transport> {
    ctx: Arc<SessionContext<T>>,
    sessions: RwLock<BTreeMap<String, Session<T>>>,
}

impl<T: Transport> SessionRegistry<T> {
    pub fn new(ctx: Arc<SessionContext<T>>) -> Self {
        Self {
            ctx,
            sessions: RwLock::new(BTreeMap::new()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<String, Session<T>>> {
        self.sessions.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<String, Session<T>>> {
        self.sessions.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Creates and registers a session. Does not connect.
    ///
    /// # Errors
    /// [`SessionError::DuplicateName`] if `name` is taken; the existing
    /// session is unaffected.
    pub fn create_session(
        &self,
        name: &str,
        url: &str,
        debug: u32,
        autoconnect: bool,
    ) -> Result<Session<T>, SessionError> {
        let mut sessions = self.write();
        if sessions.contains_key(name) {
            return Err(SessionError::DuplicateName(name.to_string()));
        }

        let session = Session::new(Arc::clone(&self.ctx), name, url, debug, autoconnect);
        sessions.insert(name.to_string(), session.clone());
        info!(session = name, url, autoconnect, "session created");
        Ok(session)
    }

    /// # Errors
    /// [`SessionError::NotFound`] if no session has this name.
    pub fn find_session(&self, name: &str) -> Result<Session<T>, SessionError> {
        self.read()
            .get(name)
            .cloned()
            .ok_or_else(|| SessionError::NotFound(name.to_string()))
    }

    pub fn session_exists(&self, name: &str) -> bool {
        self.read().contains_key(name)
    }

    /// Handles to all sessions, ordered by name.
    pub fn sessions(&self) -> Vec<Session<T>> {
        self.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn context(&self) -> &Arc<SessionContext<T>> {
        &self.ctx
    }

    /// Starts connecting every session with `autoconnect` set. Returns how
    /// many were started.
    pub fn connect_all_auto(&self) -> usize {
        let mut started = 0;
        for session in self.sessions() {
            if !session.autoconnect() {
                continue;
            }
            match session.connect() {
                Ok(()) => started += 1,
                Err(e) => debug!(session = session.name(), error = %e, "connect not started"),
            }
        }
        started
    }

    /// Disconnects every session and waits for each to finish.
    pub async fn disconnect_all(&self) {
        for session in self.sessions() {
            if let Err(e) = session.disconnect().await {
                debug!(session = session.name(), error = %e, "disconnect skipped");
            }
        }
    }

    /// A summary line; level ≥ 1 adds each session's report at one level
    /// less, so level 3 reaches the namespace mappings.
    pub fn report_all(&self, level: u32) -> String {
        let sessions = self.sessions();
        let connected = sessions.iter().filter(|s| s.is_connected()).count();
        let subscriptions: usize = sessions.iter().map(Session::subscription_count).sum();

        let mut out = format!(
            "total of {} session(s) ({} connected) with {} subscription(s)\n",
            sessions.len(),
            connected,
            subscriptions
        );
        if level >= 1 {
            for session in &sessions {
                out.push_str(&session.report(level - 1));
            }
        }
        out
    }

    /// Prints [`report_all`](Self::report_all) on stdout.
    pub fn show_all(&self, level: u32) {
        print!("{}", self.report_all(level));
    }
}
