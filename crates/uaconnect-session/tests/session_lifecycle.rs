//! Integration tests for the session lifecycle against the in-process
//! transport.

use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::{self, Instant};
use uaconnect_security::{EndpointDescription, MessageSecurityMode, POLICY_URI_PREFIX};
use uaconnect_session::{
    Session, SessionConfig, SessionContext, SessionError, SessionRegistry, SessionState,
    StatusChange, Subscription,
};
use uaconnect_timer::TimerQueue;
use uaconnect_transport::{MemoryTransport, ServerStatus, UserIdentity};

// =========================================================================
// Helpers
// =========================================================================

const URL: &str = "opc.tcp://plc:4840";
const RETRY: Duration = Duration::from_secs(10);
const WAIT: Duration = Duration::from_secs(120);

type Changes = Arc<Mutex<Vec<StatusChange>>>;

struct Fixture {
    transport: MemoryTransport,
    registry: SessionRegistry<MemoryTransport>,
    changes: Changes,
}

impl Fixture {
    fn new(transport: MemoryTransport) -> Self {
        let changes: Changes = Arc::default();
        let sink = Arc::clone(&changes);
        let ctx = SessionContext::new(Arc::new(transport.clone()), TimerQueue::spawn())
            .with_config(SessionConfig {
                reconnect_delay: RETRY,
                ..SessionConfig::default()
            })
            .with_listener(move |change: &StatusChange| {
                sink.lock().unwrap().push(change.clone());
            });
        Self {
            transport,
            registry: SessionRegistry::new(Arc::new(ctx)),
            changes,
        }
    }

    fn session(&self, autoconnect: bool) -> Session<MemoryTransport> {
        self.registry.create_session("s1", URL, 0, autoconnect).unwrap()
    }

    fn transitions(&self) -> Vec<(SessionState, SessionState)> {
        self.changes
            .lock()
            .unwrap()
            .iter()
            .map(|c| (c.from, c.to))
            .collect()
    }
}

async fn wait_for_state(session: &Session<MemoryTransport>, state: SessionState) {
    let mut rx = session.watch_state();
    let reached = time::timeout(WAIT, rx.wait_for(|s| *s == state)).await;
    assert!(
        matches!(reached, Ok(Ok(_))),
        "session {} never reached {state}",
        session.name()
    );
}

/// Lets spawned tasks run without reaching the retry deadline.
async fn settle() {
    time::sleep(Duration::from_millis(1)).await;
}

fn endpoint(url: &str, mode: MessageSecurityMode, policy: &str, level: u8) -> EndpointDescription {
    EndpointDescription {
        url: url.into(),
        mode,
        policy_uri: format!("{POLICY_URI_PREFIX}{policy}"),
        level,
        server_certificate: vec![0; 16],
    }
}

fn secure_server() -> MemoryTransport {
    MemoryTransport::new().with_endpoints(vec![
        endpoint(URL, MessageSecurityMode::None, "None", 0),
        endpoint(URL, MessageSecurityMode::Sign, "Basic256Sha256", 40),
        endpoint(URL, MessageSecurityMode::SignAndEncrypt, "Basic256Sha256", 90),
        endpoint(URL, MessageSecurityMode::SignAndEncrypt, "Basic128Rsa15", 10),
        endpoint("https://plc:443", MessageSecurityMode::SignAndEncrypt, "Basic256Sha256", 99),
    ])
}

struct CountingSubscription {
    clears: AtomicUsize,
}

impl Subscription for CountingSubscription {
    fn name(&self) -> &str {
        "sub1"
    }

    fn item_count(&self) -> usize {
        3
    }

    fn clear(&self) {
        self.clears.fetch_add(1, Ordering::SeqCst);
    }
}

// =========================================================================
// Connect
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_connect_reachable_reaches_connected() {
    let fx = Fixture::new(MemoryTransport::new());
    let session = fx.session(true);
    assert_eq!(session.state(), SessionState::Disconnected);

    session.connect().unwrap();
    wait_for_state(&session, SessionState::Connected).await;

    assert!(session.is_connected());
    assert_eq!(fx.transport.open_channels(), 1);
    assert_eq!(
        fx.transitions(),
        [
            (SessionState::Disconnected, SessionState::Connecting),
            (SessionState::Connecting, SessionState::Connected),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_connect_repeated_runs_single_handshake() {
    let fx = Fixture::new(MemoryTransport::new().with_handshake_delay(Duration::from_secs(2)));
    let session = fx.session(true);

    session.connect().unwrap();
    session.connect().unwrap();
    session.connect().unwrap();
    wait_for_state(&session, SessionState::Connected).await;
    settle().await;

    assert_eq!(fx.transport.handshake_count(), 1);
    assert_eq!(fx.transport.max_concurrent_handshakes(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_connect_from_many_tasks_never_overlaps() {
    let fx = Fixture::new(MemoryTransport::new().with_handshake_delay(Duration::from_secs(1)));
    fx.transport.set_reachable(false);
    let session = fx.session(true);

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let session = session.clone();
            tokio::spawn(async move { session.connect() })
        })
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap();
    }
    time::sleep(Duration::from_secs(30)).await;

    assert_eq!(fx.transport.max_concurrent_handshakes(), 1);
    assert!(fx.transport.handshake_count() >= 8);
}

#[tokio::test(start_paused = true)]
async fn test_connect_when_connected_is_noop() {
    let fx = Fixture::new(MemoryTransport::new());
    let session = fx.session(false);
    session.connect().unwrap();
    wait_for_state(&session, SessionState::Connected).await;

    session.connect().unwrap();
    settle().await;

    assert_eq!(fx.transport.handshake_count(), 1);
    assert_eq!(fx.transitions().len(), 2);
}

// =========================================================================
// Auto-connect
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_autoconnect_retries_after_delay_until_reachable() {
    let fx = Fixture::new(MemoryTransport::new());
    fx.transport.set_reachable(false);
    let session = fx.session(true);
    let start = Instant::now();

    session.connect().unwrap();
    settle().await;
    assert_eq!(fx.transport.handshake_count(), 1);
    assert_eq!(session.state(), SessionState::Disconnected);

    time::sleep(RETRY / 2).await;
    assert_eq!(fx.transport.handshake_count(), 1);

    fx.transport.set_reachable(true);
    wait_for_state(&session, SessionState::Connected).await;

    assert_eq!(fx.transport.handshake_count(), 2);
    assert!(start.elapsed() >= RETRY);
}

#[tokio::test(start_paused = true)]
async fn test_autoconnect_keeps_retrying_while_unreachable() {
    let fx = Fixture::new(MemoryTransport::new());
    fx.transport.set_reachable(false);
    let session = fx.session(true);

    session.connect().unwrap();
    time::sleep(RETRY * 3 + Duration::from_secs(1)).await;

    assert_eq!(fx.transport.handshake_count(), 4);
    assert_eq!(fx.transport.max_concurrent_handshakes(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_connect_failure_without_autoconnect_does_not_retry() {
    let fx = Fixture::new(MemoryTransport::new());
    fx.transport.set_reachable(false);
    let session = fx.session(false);

    session.connect().unwrap();
    time::sleep(RETRY * 6).await;

    assert_eq!(fx.transport.handshake_count(), 1);
    assert_eq!(session.state(), SessionState::Disconnected);
    let changes = fx.changes.lock().unwrap().clone();
    let failure = changes.last().unwrap();
    assert_eq!(failure.to, SessionState::Disconnected);
    assert!(failure.reason.as_deref().unwrap().contains("unreachable"));
}

#[tokio::test(start_paused = true)]
async fn test_autoconnect_option_off_stops_retries() {
    let fx = Fixture::new(MemoryTransport::new());
    fx.transport.set_reachable(false);
    let session = fx.session(true);
    session.set_option("autoconnect", "n").unwrap();

    session.connect().unwrap();
    time::sleep(RETRY * 3).await;

    assert_eq!(fx.transport.handshake_count(), 1);
}

// =========================================================================
// Disconnect
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_disconnect_connected_closes_and_deletes_subscriptions() {
    let fx = Fixture::new(MemoryTransport::new());
    let session = fx.session(true);
    let subscription = Arc::new(CountingSubscription {
        clears: AtomicUsize::new(0),
    });
    session.add_subscription(subscription.clone());
    session.connect().unwrap();
    wait_for_state(&session, SessionState::Connected).await;

    session.disconnect().await.unwrap();

    assert_eq!(session.state(), SessionState::Disconnected);
    assert_eq!(fx.transport.open_channels(), 0);
    let closes = fx.transport.closes();
    assert_eq!(closes.len(), 1);
    assert!(closes[0].1, "server subscriptions are deleted");
    assert_eq!(subscription.clears.load(Ordering::SeqCst), 1);
    assert_eq!(
        fx.transitions()[2..],
        [
            (SessionState::Connected, SessionState::Disconnecting),
            (SessionState::Disconnecting, SessionState::Disconnected),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_twice_is_idempotent() {
    let fx = Fixture::new(MemoryTransport::new());
    let session = fx.session(true);
    session.connect().unwrap();
    wait_for_state(&session, SessionState::Connected).await;

    session.disconnect().await.unwrap();
    let after_first = fx.transitions();
    session.disconnect().await.unwrap();

    assert_eq!(session.state(), SessionState::Disconnected);
    assert_eq!(fx.transitions(), after_first);
    assert_eq!(fx.transport.closes().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_never_connected_returns_immediately() {
    let fx = Fixture::new(MemoryTransport::new());
    let session = fx.session(true);

    session.disconnect().await.unwrap();

    assert_eq!(session.state(), SessionState::Disconnected);
    assert!(fx.transitions().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_cancels_pending_retry() {
    let fx = Fixture::new(MemoryTransport::new());
    fx.transport.set_reachable(false);
    let session = fx.session(true);
    session.connect().unwrap();
    settle().await;

    session.disconnect().await.unwrap();
    fx.transport.set_reachable(true);
    time::sleep(RETRY * 3).await;

    assert_eq!(fx.transport.handshake_count(), 1);
    assert_eq!(session.state(), SessionState::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_while_connecting_ends_disconnected() {
    let fx = Fixture::new(MemoryTransport::new().with_handshake_delay(Duration::from_secs(3)));
    let session = fx.session(true);
    session.connect().unwrap();
    settle().await;
    assert_eq!(session.state(), SessionState::Connecting);

    session.disconnect().await.unwrap();
    time::sleep(RETRY * 3).await;

    assert_eq!(session.state(), SessionState::Disconnected);
    assert_eq!(fx.transport.open_channels(), 0);
    assert_eq!(fx.transport.handshake_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_teardown_failure_still_disconnects() {
    let fx = Fixture::new(MemoryTransport::new());
    let session = fx.session(true);
    session.connect().unwrap();
    wait_for_state(&session, SessionState::Connected).await;
    fx.transport.set_close_fails(true);

    let result = session.disconnect().await;

    assert!(result.is_ok());
    assert_eq!(session.state(), SessionState::Disconnected);
    assert_eq!(fx.transport.closes().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_connect_after_disconnect_reconnects() {
    let fx = Fixture::new(MemoryTransport::new());
    let session = fx.session(false);
    session.connect().unwrap();
    wait_for_state(&session, SessionState::Connected).await;
    session.disconnect().await.unwrap();

    session.connect().unwrap();
    wait_for_state(&session, SessionState::Connected).await;

    assert_eq!(fx.transport.handshake_count(), 2);
    assert_eq!(fx.transport.open_channels(), 1);
}

// =========================================================================
// Server status
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_connection_lost_triggers_reconnect() {
    let fx = Fixture::new(MemoryTransport::new());
    let session = fx.session(true);
    let subscription = Arc::new(CountingSubscription {
        clears: AtomicUsize::new(0),
    });
    session.add_subscription(subscription.clone());
    session.connect().unwrap();
    wait_for_state(&session, SessionState::Connected).await;

    fx.transport.drop_connections();
    wait_for_state(&session, SessionState::Disconnected).await;
    assert_eq!(subscription.clears.load(Ordering::SeqCst), 1);

    wait_for_state(&session, SessionState::Connected).await;
    assert_eq!(fx.transport.handshake_count(), 2);
    assert_eq!(fx.transport.open_channels(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_connection_lost_without_autoconnect_stays_disconnected() {
    let fx = Fixture::new(MemoryTransport::new());
    let session = fx.session(false);
    session.connect().unwrap();
    wait_for_state(&session, SessionState::Connected).await;

    fx.transport.drop_connections();
    wait_for_state(&session, SessionState::Disconnected).await;
    time::sleep(RETRY * 3).await;

    assert_eq!(session.state(), SessionState::Disconnected);
    assert_eq!(fx.transport.handshake_count(), 1);
    let changes = fx.changes.lock().unwrap().clone();
    assert_eq!(changes.last().unwrap().reason.as_deref(), Some("connection lost"));
}

#[tokio::test(start_paused = true)]
async fn test_server_shutdown_disconnects() {
    let fx = Fixture::new(MemoryTransport::new());
    let session = fx.session(false);
    session.connect().unwrap();
    wait_for_state(&session, SessionState::Connected).await;

    fx.transport.broadcast(ServerStatus::ServerShutdown);
    wait_for_state(&session, SessionState::Disconnected).await;

    // The lost channel is held until an explicit disconnect.
    assert_eq!(fx.transport.open_channels(), 1);
    session.disconnect().await.unwrap();
    assert_eq!(fx.transport.open_channels(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_watchdog_warning_keeps_connection() {
    let fx = Fixture::new(MemoryTransport::new());
    let session = fx.session(true);
    session.connect().unwrap();
    wait_for_state(&session, SessionState::Connected).await;

    fx.transport.broadcast(ServerStatus::WatchdogWarning);
    settle().await;

    assert!(session.is_connected());
    assert_eq!(fx.transitions().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_repeated_loss_events_handled_once() {
    let fx = Fixture::new(MemoryTransport::new());
    let session = fx.session(true);
    session.connect().unwrap();
    wait_for_state(&session, SessionState::Connected).await;

    fx.transport.broadcast(ServerStatus::ServerShutdown);
    fx.transport.broadcast(ServerStatus::ConnectionLost);
    settle().await;

    let losses = fx
        .transitions()
        .iter()
        .filter(|t| **t == (SessionState::Connected, SessionState::Disconnected))
        .count();
    assert_eq!(losses, 1);
}

// =========================================================================
// Security
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_unsecured_connect_skips_discovery() {
    let fx = Fixture::new(secure_server());
    let session = fx.session(true);

    session.connect().unwrap();
    wait_for_state(&session, SessionState::Connected).await;

    assert_eq!(fx.transport.discovery_count(), 0);
    assert_eq!(session.negotiated_security().endpoint_url, None);
}

#[tokio::test(start_paused = true)]
async fn test_secure_connect_picks_highest_matching_level() {
    let fx = Fixture::new(secure_server());
    let session = fx.session(true);
    session.set_option("sec-mode", "SignAndEncrypt").unwrap();

    session.connect().unwrap();
    wait_for_state(&session, SessionState::Connected).await;

    let negotiated = session.negotiated_security();
    assert_eq!(negotiated.level, 90);
    assert_eq!(negotiated.mode, MessageSecurityMode::SignAndEncrypt);
    assert_eq!(negotiated.endpoint_url.as_deref(), Some(URL));
    assert_eq!(fx.transport.requests()[0].security, negotiated);
}

#[tokio::test(start_paused = true)]
async fn test_secure_connect_respects_policy_and_min_level() {
    let fx = Fixture::new(secure_server());
    let session = fx.session(false);
    session.set_option("sec-policy", "Basic256Sha256").unwrap();
    session.set_option("sec-level-min", "20").unwrap();
    session.set_option("sec-mode", "Sign").unwrap();

    session.connect().unwrap();
    wait_for_state(&session, SessionState::Connected).await;

    assert_eq!(session.negotiated_security().level, 40);
}

#[tokio::test(start_paused = true)]
async fn test_secure_connect_without_match_fails_before_handshake() {
    let fx = Fixture::new(secure_server());
    let session = fx.session(false);
    session.set_option("sec-level-min", "200").unwrap();

    session.connect().unwrap();
    settle().await;

    assert_eq!(session.state(), SessionState::Disconnected);
    assert_eq!(fx.transport.handshake_count(), 0);
    let changes = fx.changes.lock().unwrap().clone();
    assert!(changes.last().unwrap().reason.is_some());
}

#[tokio::test(start_paused = true)]
async fn test_secure_connect_rejects_non_opc_tcp_url() {
    let fx = Fixture::new(secure_server());
    let session = fx.registry.create_session("web", "https://plc:443", 0, false).unwrap();
    session.set_option("sec-mode", "Sign").unwrap();

    session.connect().unwrap();
    settle().await;

    assert_eq!(session.state(), SessionState::Disconnected);
    assert_eq!(fx.transport.discovery_count(), 0);
    assert_eq!(fx.transport.handshake_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_security_report_marks_endpoint_in_use() {
    let fx = Fixture::new(secure_server());
    let session = fx.session(true);
    session.set_option("sec-mode", "SignAndEncrypt").unwrap();
    session.connect().unwrap();
    wait_for_state(&session, SessionState::Connected).await;

    let report = session.security_report().await.unwrap();

    let headers: Vec<&str> = report.lines().filter(|l| l.contains("Level:")).collect();
    assert_eq!(headers.len(), 4, "non opc.tcp endpoints are skipped");
    let in_use: Vec<&str> = headers.iter().copied().filter(|l| l.contains("=====")).collect();
    assert_eq!(in_use.len(), 1);
    assert!(in_use[0].contains("Level:  90"));
    assert!(report.contains("Security Mode: SignAndEncrypt    Policy: Basic256Sha256"));
    assert!(report.contains("Server Certificate: 16 bytes"));
}

#[tokio::test(start_paused = true)]
async fn test_security_report_unreachable_returns_error() {
    let fx = Fixture::new(secure_server());
    fx.transport.set_reachable(false);
    let session = fx.session(false);

    let result = session.security_report().await;

    assert!(matches!(result, Err(SessionError::Transport(_))));
}

// =========================================================================
// Identity and certificates
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_identity_file_sent_as_user_name() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "operator\nsecret").unwrap();
    let fx = Fixture::new(MemoryTransport::new());
    let session = fx.session(false);
    session
        .set_option("sec-id", file.path().to_str().unwrap())
        .unwrap();

    session.connect().unwrap();
    wait_for_state(&session, SessionState::Connected).await;

    assert_eq!(
        fx.transport.requests()[0].identity,
        UserIdentity::UserName {
            user: "operator".into(),
            password: "secret".into()
        }
    );
}

#[tokio::test(start_paused = true)]
async fn test_missing_identity_file_fails_connect() {
    let dir = tempfile::tempdir().unwrap();
    let fx = Fixture::new(MemoryTransport::new());
    let session = fx.session(false);
    session
        .set_option("sec-id", dir.path().join("nope").to_str().unwrap())
        .unwrap();

    session.connect().unwrap();
    settle().await;

    assert_eq!(session.state(), SessionState::Disconnected);
    assert_eq!(fx.transport.handshake_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_session_certificate_sent_with_request() {
    let fx = Fixture::new(MemoryTransport::new());
    let session = fx.session(false);
    session.set_option("clientcert", "/pki/own/s1.der").unwrap();
    session.set_option("clientkey", "/pki/private/s1.pem").unwrap();

    session.connect().unwrap();
    wait_for_state(&session, SessionState::Connected).await;

    let request = &fx.transport.requests()[0];
    assert_eq!(request.client_certificate, Some(PathBuf::from("/pki/own/s1.der")));
    assert_eq!(request.client_private_key, Some(PathBuf::from("/pki/private/s1.pem")));
}

// =========================================================================
// Options, namespaces, diagnostics
// =========================================================================

#[tokio::test]
async fn test_set_option_unknown_returns_error() {
    let fx = Fixture::new(MemoryTransport::new());
    let session = fx.session(false);

    let result = session.set_option("frobnicate", "1");

    assert!(matches!(result, Err(SessionError::UnknownOption(_))));
    assert_eq!(session.settings(), uaconnect_session::SessionSettings::new(false));
}

#[tokio::test(start_paused = true)]
async fn test_namespace_mapping_resolves_after_connect() {
    let fx = Fixture::new(
        MemoryTransport::new().with_namespaces(["urn:a", "urn:b", "urn:plc:machine"]),
    );
    let session = fx.session(false);
    session.add_namespace_mapping(2, "urn:plc:machine");
    session.add_namespace_mapping(4, "urn:unknown");
    assert_eq!(session.map_namespace_index(2), 2);

    session.connect().unwrap();
    wait_for_state(&session, SessionState::Connected).await;

    assert_eq!(session.map_namespace_index(2), 3);
    assert_eq!(session.map_namespace_index(4), 4);

    fx.transport.set_namespaces(["urn:plc:machine"]);
    fx.transport.broadcast(ServerStatus::NewSessionCreated);
    settle().await;

    assert_eq!(session.map_namespace_index(2), 1);
    assert!(session.report(2).contains(" 2 -> urn:plc:machine -> 1\n"));
}

#[tokio::test(start_paused = true)]
async fn test_report_line_format() {
    let fx = Fixture::new(MemoryTransport::new().with_max_operations(500));
    let session = fx.session(true);
    session.set_option("nodes-max", "100").unwrap();

    assert_eq!(
        session.report(0),
        "session=s1 url=opc.tcp://plc:4840 status=Disconnected sec-mode=None(None) \
         sec-policy=None(None) sec-level=0 debug=0 batch=?(100) autoconnect=y subscriptions=0\n"
    );

    session.connect().unwrap();
    wait_for_state(&session, SessionState::Connected).await;
    session.add_subscription(Arc::new(CountingSubscription {
        clears: AtomicUsize::new(0),
    }));

    let report = session.report(1);
    let mut lines = report.lines();
    let status = lines.next().unwrap();
    assert!(status.contains("status=Connected"));
    assert!(status.contains("batch=500(100)"));
    assert!(status.ends_with("subscriptions=1"));
    assert_eq!(lines.next(), Some("  subscription=sub1 items=3"));
    assert_eq!(lines.next(), None);
}

#[tokio::test(start_paused = true)]
async fn test_report_all_counts_connected_sessions() {
    let fx = Fixture::new(MemoryTransport::new());
    let s1 = fx.session(true);
    fx.registry.create_session("s2", URL, 0, false).unwrap();
    fx.registry.create_session("s3", URL, 0, true).unwrap();

    assert_eq!(fx.registry.connect_all_auto(), 2);
    wait_for_state(&s1, SessionState::Connected).await;
    wait_for_state(&fx.registry.find_session("s3").unwrap(), SessionState::Connected).await;

    assert!(
        fx.registry
            .report_all(0)
            .starts_with("total of 3 session(s) (2 connected) with 0 subscription(s)")
    );

    fx.registry.disconnect_all().await;
    assert_eq!(fx.transport.open_channels(), 0);
}

// =========================================================================
// Teardown
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_dropping_last_handle_closes_channel_and_timer() {
    let transport = MemoryTransport::new();
    let ctx = Arc::new(SessionContext::new(
        Arc::new(transport.clone()),
        TimerQueue::spawn(),
    ));
    let session = Session::new(ctx, "solo", URL, 0, true);
    session.connect().unwrap();
    wait_for_state(&session, SessionState::Connected).await;

    drop(session);
    settle().await;

    assert_eq!(transport.open_channels(), 0);
    assert_eq!(transport.closes().len(), 1);
}
