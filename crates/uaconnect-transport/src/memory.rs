//! In-process transport.
//!
//! [`MemoryTransport`] simulates one server without any I/O. Tests flip its
//! reachability, inspect what was requested, and inject status events into
//! the open channels.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time;
use tracing::{debug, info};

use crate::{
    Channel, ChannelId, ConnectRequest, EndpointDescription, ServerStatus, StatusSink, Transport,
    TransportError,
};

/// Namespace 0 of every server.
const BASE_NAMESPACE: &str = "http://opcfoundation.org/UA/";

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

struct Inner {
    reachable: AtomicBool,
    close_fails: AtomicBool,
    handshake_delay: Mutex<Duration>,
    endpoints: Mutex<Vec<EndpointDescription>>,
    namespaces: Mutex<Vec<String>>,
    max_operations: Mutex<Option<u32>>,

    next_channel: AtomicU64,
    handshakes: AtomicUsize,
    discoveries: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,

    open: Mutex<Vec<(ChannelId, StatusSink)>>,
    requests: Mutex<Vec<ConnectRequest>>,
    closes: Mutex<Vec<(ChannelId, bool)>>,
}

impl Inner {
    fn is_open(&self, id: ChannelId) -> bool {
        lock(&self.open).iter().any(|(open, _)| *open == id)
    }

    fn remove_open(&self, id: ChannelId) -> Option<StatusSink> {
        let mut open = lock(&self.open);
        let pos = open.iter().position(|(open, _)| *open == id)?;
        Some(open.remove(pos).1)
    }
}

/// Counts a running handshake for as long as it lives.
struct InFlight<'a>(&'a Inner);

impl<'a> InFlight<'a> {
    fn enter(inner: &'a Inner) -> Self {
        let now = inner.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        inner.max_in_flight.fetch_max(now, Ordering::SeqCst);
        Self(inner)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// MemoryTransport
// ---------------------------------------------------------------------------

/// A simulated server reachable through any URL.
///
/// Cloning yields another handle to the same server.
#[derive(Clone)]
pub struct MemoryTransport {
    inner: Arc<Inner>,
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTransport {
    /// A reachable server with only the base namespace and no endpoints.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                reachable: AtomicBool::new(true),
                close_fails: AtomicBool::new(false),
                handshake_delay: Mutex::new(Duration::ZERO),
                endpoints: Mutex::new(Vec::new()),
                namespaces: Mutex::new(vec![BASE_NAMESPACE.to_string()]),
                max_operations: Mutex::new(None),
                next_channel: AtomicU64::new(1),
                handshakes: AtomicUsize::new(0),
                discoveries: AtomicUsize::new(0),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
                open: Mutex::new(Vec::new()),
                requests: Mutex::new(Vec::new()),
                closes: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn with_endpoints(self, endpoints: Vec<EndpointDescription>) -> Self {
        *lock(&self.inner.endpoints) = endpoints;
        self
    }

    pub fn with_namespaces<I, S>(self, namespaces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.set_namespaces(namespaces);
        self
    }

    /// Simulated time every handshake takes.
    pub fn with_handshake_delay(self, delay: Duration) -> Self {
        *lock(&self.inner.handshake_delay) = delay;
        self
    }

    pub fn with_max_operations(self, max: u32) -> Self {
        *lock(&self.inner.max_operations) = Some(max);
        self
    }

    /// Makes handshakes and discovery succeed or fail with
    /// [`TransportError::Unreachable`].
    pub fn set_reachable(&self, reachable: bool) {
        self.inner.reachable.store(reachable, Ordering::SeqCst);
        info!(reachable, "memory server reachability changed");
    }

    /// Makes [`Channel::close`] report a failure (the channel still closes).
    pub fn set_close_fails(&self, fails: bool) {
        self.inner.close_fails.store(fails, Ordering::SeqCst);
    }

    /// Replaces the namespace array. Namespace 0 is always the base
    /// namespace, so the given URIs start at index 1.
    pub fn set_namespaces<I, S>(&self, namespaces: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut array = vec![BASE_NAMESPACE.to_string()];
        array.extend(namespaces.into_iter().map(Into::into));
        *lock(&self.inner.namespaces) = array;
    }

    /// Sends `status` to every open channel.
    pub fn broadcast(&self, status: ServerStatus) {
        for (id, sink) in lock(&self.inner.open).iter() {
            debug!(channel = %id, %status, "injecting server status");
            sink.notify(status);
        }
    }

    /// Drops every open channel as if the network went away, reporting
    /// [`ServerStatus::ConnectionLost`] on each.
    pub fn drop_connections(&self) {
        let dropped: Vec<_> = lock(&self.inner.open).drain(..).collect();
        for (id, sink) in dropped {
            debug!(channel = %id, "dropping connection");
            sink.notify(ServerStatus::ConnectionLost);
        }
    }

    /// Total handshakes attempted.
    pub fn handshake_count(&self) -> usize {
        self.inner.handshakes.load(Ordering::SeqCst)
    }

    /// Total discovery requests served.
    pub fn discovery_count(&self) -> usize {
        self.inner.discoveries.load(Ordering::SeqCst)
    }

    /// The largest number of handshakes that ever ran at the same time.
    pub fn max_concurrent_handshakes(&self) -> usize {
        self.inner.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn open_channels(&self) -> usize {
        lock(&self.inner.open).len()
    }

    /// Every connect request received, oldest first.
    pub fn requests(&self) -> Vec<ConnectRequest> {
        lock(&self.inner.requests).clone()
    }

    /// Every close call as `(channel, delete_subscriptions)`.
    pub fn closes(&self) -> Vec<(ChannelId, bool)> {
        lock(&self.inner.closes).clone()
    }
}

impl Transport for MemoryTransport {
    type Channel = MemoryChannel;

    async fn connect(
        &self,
        request: ConnectRequest,
        sink: StatusSink,
    ) -> Result<MemoryChannel, TransportError> {
        let inner = &*self.inner;
        let _in_flight = InFlight::enter(inner);
        inner.handshakes.fetch_add(1, Ordering::SeqCst);

        let delay = *lock(&inner.handshake_delay);
        if !delay.is_zero() {
            time::sleep(delay).await;
        }

        let url = request.url.clone();
        lock(&inner.requests).push(request);

        if !inner.reachable.load(Ordering::SeqCst) {
            return Err(TransportError::Unreachable { url });
        }

        let id = ChannelId::new(inner.next_channel.fetch_add(1, Ordering::Relaxed));
        lock(&inner.open).push((id, sink));
        debug!(channel = %id, %url, "memory channel opened");

        Ok(MemoryChannel {
            id,
            inner: Arc::clone(&self.inner),
            max_operations: *lock(&inner.max_operations),
        })
    }

    async fn endpoints(&self, url: &str) -> Result<Vec<EndpointDescription>, TransportError> {
        let inner = &*self.inner;
        inner.discoveries.fetch_add(1, Ordering::SeqCst);
        if !inner.reachable.load(Ordering::SeqCst) {
            return Err(TransportError::Unreachable {
                url: url.to_string(),
            });
        }
        Ok(lock(&inner.endpoints).clone())
    }
}

// ---------------------------------------------------------------------------
// MemoryChannel
// ---------------------------------------------------------------------------

/// A channel opened by [`MemoryTransport`].
pub struct MemoryChannel {
    id: ChannelId,
    inner: Arc<Inner>,
    max_operations: Option<u32>,
}

impl Channel for MemoryChannel {
    async fn close(&mut self, delete_subscriptions: bool) -> Result<(), TransportError> {
        let was_open = self.inner.remove_open(self.id).is_some();
        lock(&self.inner.closes).push((self.id, delete_subscriptions));
        debug!(channel = %self.id, delete_subscriptions, was_open, "memory channel closed");

        if self.inner.close_fails.load(Ordering::SeqCst) {
            return Err(TransportError::CloseFailed(format!("{}: simulated failure", self.id)));
        }
        Ok(())
    }

    async fn namespace_array(&self) -> Result<Vec<String>, TransportError> {
        if !self.inner.is_open(self.id) {
            return Err(TransportError::ChannelClosed(self.id.to_string()));
        }
        Ok(lock(&self.inner.namespaces).clone())
    }

    fn max_operations_per_call(&self) -> Option<u32> {
        self.max_operations
    }

    fn id(&self) -> ChannelId {
        self.id
    }
}
