//! Tests for client and server sessions.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::net::UdpSocket;

use pge_net::{
    BytesCodec, CallbackKind, ClientSession, ClientState, Endpoint, JsonCodec, NetworkError,
    ServerSession, SessionConfig, SessionState,
};

const PROBE_JSON: &[u8] = b"\"CONNECTING\"";

/// Poll `condition` every 10ms until it holds or `timeout` elapses.
async fn wait_until(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

/// Read one datagram from a raw socket, if any arrives within `timeout`.
async fn recv_raw(socket: &UdpSocket, timeout: Duration) -> Option<(Vec<u8>, SocketAddr)> {
    let mut buffer = vec![0u8; 2048];
    match tokio::time::timeout(timeout, socket.recv_from(&mut buffer)).await {
        Ok(Ok((n, from))) => Some((buffer[..n].to_vec(), from)),
        _ => None,
    }
}

/// Discard everything queued on a raw socket.
async fn drain(socket: &UdpSocket) {
    while recv_raw(socket, Duration::from_millis(20)).await.is_some() {}
}

async fn start_server(config: SessionConfig) -> ServerSession<JsonCodec<Value>> {
    ServerSession::start(config, JsonCodec::new()).await.unwrap()
}

fn server_config() -> SessionConfig {
    SessionConfig::new("127.0.0.1", 0)
        .tick_rate(20)
        .receive_timeout(Duration::from_millis(20))
}

fn client_config(server: SocketAddr, tick_rate: u32) -> SessionConfig {
    SessionConfig::new(server.ip().to_string(), server.port())
        .tick_rate(tick_rate)
        .receive_timeout(Duration::from_millis(20))
        .local_address("127.0.0.1:0")
}

// -----------------------------------------------------------------------------
// Client
// -----------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_client_probes_until_first_reply() {
    let raw = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let client = ClientSession::start(
        client_config(raw.local_addr().unwrap(), 20),
        JsonCodec::<Value>::new(),
    )
    .await
    .unwrap();

    assert_eq!(client.state(), ClientState::Probing);

    // About one probe per 50ms tick.
    let mut probes = 0;
    let mut client_addr = None;
    let deadline = tokio::time::Instant::now() + Duration::from_millis(300);
    while tokio::time::Instant::now() < deadline {
        if let Some((data, from)) = recv_raw(&raw, Duration::from_millis(60)).await {
            assert_eq!(data, PROBE_JSON);
            client_addr = Some(from);
            probes += 1;
        }
    }
    assert!((3..=9).contains(&probes), "unexpected probe count {probes}");

    let client_addr = client_addr.unwrap();
    assert_eq!(client_addr, client.local_addr());

    raw.send_to(br#"{"hello":"client"}"#, client_addr).await.unwrap();
    assert!(client.wait_established(Duration::from_secs(2)).await);
    assert!(client.is_established());
    assert_eq!(client.received(), Some(json!({"hello": "client"})));

    // Established with no outbound value: nothing more is sent.
    tokio::time::sleep(Duration::from_millis(100)).await;
    drain(&raw).await;
    assert!(recv_raw(&raw, Duration::from_millis(200)).await.is_none());

    client.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_client_sends_outbound_every_tick_once_established() {
    let raw = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let client = ClientSession::start(
        client_config(raw.local_addr().unwrap(), 20),
        JsonCodec::<Value>::new(),
    )
    .await
    .unwrap();

    // Outbound set while probing is held back until the server answers.
    client.set_outbound(json!({"x": 1}));
    let (data, client_addr) = recv_raw(&raw, Duration::from_secs(1)).await.unwrap();
    assert_eq!(data, PROBE_JSON);

    raw.send_to(b"0", client_addr).await.unwrap();
    assert!(client.wait_established(Duration::from_secs(2)).await);
    assert_eq!(client.received(), Some(json!(0)));

    tokio::time::sleep(Duration::from_millis(60)).await;
    drain(&raw).await;

    let mut payloads = 0;
    for _ in 0..3 {
        let (data, _) = recv_raw(&raw, Duration::from_millis(500)).await.unwrap();
        assert_eq!(serde_json::from_slice::<Value>(&data).unwrap(), json!({"x": 1}));
        payloads += 1;
    }
    assert_eq!(payloads, 3);

    client.clear_outbound();
    tokio::time::sleep(Duration::from_millis(100)).await;
    drain(&raw).await;
    assert!(recv_raw(&raw, Duration::from_millis(200)).await.is_none());

    client.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_client_reports_undecodable_datagram() {
    let raw = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let client = ClientSession::start(
        client_config(raw.local_addr().unwrap(), 20),
        JsonCodec::<Value>::new(),
    )
    .await
    .unwrap();

    let errors: Arc<Mutex<Vec<NetworkError>>> = Arc::new(Mutex::new(Vec::new()));
    let errors_clone = errors.clone();
    client.set_error_handler(move |e| errors_clone.lock().push(e.clone()));

    let (_, client_addr) = recv_raw(&raw, Duration::from_secs(1)).await.unwrap();
    raw.send_to(b"{broken", client_addr).await.unwrap();

    assert!(wait_until(Duration::from_secs(2), || !errors.lock().is_empty()).await);
    assert!(matches!(errors.lock()[0], NetworkError::Codec(_)));
    assert_eq!(client.state(), ClientState::Probing);
    assert_eq!(client.stats().decode_errors, 1);

    // The receive loop survived.
    raw.send_to(b"true", client_addr).await.unwrap();
    assert!(client.wait_established(Duration::from_secs(2)).await);
    assert_eq!(client.received(), Some(json!(true)));

    client.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_client_rejects_oversized_outbound() {
    let raw = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let client = ClientSession::start(
        client_config(raw.local_addr().unwrap(), 20).max_datagram_size(32),
        JsonCodec::<Value>::new(),
    )
    .await
    .unwrap();

    let errors = Arc::new(AtomicUsize::new(0));
    let errors_clone = errors.clone();
    client.set_error_handler(move |e| {
        if matches!(e, NetworkError::PayloadTooLarge { max: 32, .. }) {
            errors_clone.fetch_add(1, Ordering::SeqCst);
        }
    });

    let (_, client_addr) = recv_raw(&raw, Duration::from_secs(1)).await.unwrap();
    raw.send_to(b"1", client_addr).await.unwrap();
    assert!(client.wait_established(Duration::from_secs(2)).await);

    client.set_outbound(json!({"padding": "x".repeat(100)}));
    assert!(wait_until(Duration::from_secs(2), || errors.load(Ordering::SeqCst) > 0).await);
    assert!(client.stats().rejected_sends > 0);

    tokio::time::sleep(Duration::from_millis(60)).await;
    drain(&raw).await;
    assert!(recv_raw(&raw, Duration::from_millis(200)).await.is_none());

    client.shutdown().await;
}

#[tokio::test]
async fn test_client_invalid_config() {
    let err = ClientSession::start(
        SessionConfig::new("127.0.0.1", 9000).tick_rate(0),
        JsonCodec::<Value>::new(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, NetworkError::InvalidConfig(_)));
}

#[tokio::test]
async fn test_sub_nanosecond_tick_rate_rejected() {
    let err = ServerSession::start(
        SessionConfig::new("127.0.0.1", 0).tick_rate(2_000_000_000),
        JsonCodec::<Value>::new(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, NetworkError::InvalidConfig(_)));
}

// -----------------------------------------------------------------------------
// Server
// -----------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_server_and_client_connect() {
    let server = start_server(server_config().tick_rate(10)).await;
    server.set_send(|_| json!("tick"));

    let connects = Arc::new(AtomicUsize::new(0));
    let connects_clone = connects.clone();
    server.set_connected(move |_| {
        connects_clone.fetch_add(1, Ordering::SeqCst);
    });

    // One server tick at 10 ticks per second, plus 50ms for scheduling.
    let bound = Duration::from_millis(100) + Duration::from_millis(50);
    let started = tokio::time::Instant::now();

    let client = ClientSession::start(
        client_config(server.local_addr(), 10),
        JsonCodec::<Value>::new(),
    )
    .await
    .unwrap();
    let client_endpoint = Endpoint::from(client.local_addr());

    assert!(client.wait_established(bound).await);
    let elapsed = started.elapsed();
    assert!(elapsed <= bound, "established after {elapsed:?}");

    // The server only sends to endpoints it already knows.
    assert_eq!(server.endpoints(), vec![client_endpoint]);
    assert_eq!(client.received(), Some(json!("tick")));

    // More probes and ticks do not add the endpoint again.
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(server.endpoints(), vec![client_endpoint]);
    assert_eq!(connects.load(Ordering::SeqCst), 1);

    client.shutdown().await;
    server.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_server_receives_client_payload() {
    let server = start_server(server_config()).await;
    server.set_send(|_| json!(null));

    let received: Arc<Mutex<Vec<(Value, Endpoint)>>> = Arc::new(Mutex::new(Vec::new()));
    let received_clone = received.clone();
    server.set_received(move |value, endpoint| {
        received_clone.lock().push((value.clone(), *endpoint));
    });

    let client = ClientSession::start(
        client_config(server.local_addr(), 20),
        JsonCodec::<Value>::new(),
    )
    .await
    .unwrap();
    client.set_outbound(json!({"x": 1}));

    assert!(wait_until(Duration::from_secs(2), || !received.lock().is_empty()).await);

    let (value, endpoint) = received.lock()[0].clone();
    assert_eq!(value, json!({"x": 1}));
    assert_eq!(endpoint, Endpoint::from(client.local_addr()));

    // Probes never reach the receive hook.
    assert!(received.lock().iter().all(|(value, _)| *value == json!({"x": 1})));

    client.shutdown().await;
    server.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_server_without_send_hook_sends_nothing() {
    let server = start_server(server_config().tick_rate(10)).await;

    let raw = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let raw_endpoint = Endpoint::from(raw.local_addr().unwrap());
    raw.send_to(PROBE_JSON, server.local_addr()).await.unwrap();

    assert!(wait_until(Duration::from_secs(1), || server.endpoints() == vec![raw_endpoint]).await);

    // Ten ticks at 10 ticks per second.
    tokio::time::sleep(Duration::from_millis(1050)).await;

    assert_eq!(server.stats().datagrams_sent, 0);
    let silent = server.silent_ticks(&raw_endpoint).unwrap();
    assert!(silent >= 9, "counter only reached {silent}");
    assert!(recv_raw(&raw, Duration::from_millis(100)).await.is_none());

    server.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_liveness_counter_resets_on_receive() {
    let server = start_server(server_config().tick_rate(20)).await;

    let raw = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let raw_endpoint = Endpoint::from(raw.local_addr().unwrap());
    raw.send_to(PROBE_JSON, server.local_addr()).await.unwrap();

    assert!(
        wait_until(Duration::from_secs(1), || {
            server.silent_ticks(&raw_endpoint).is_some_and(|ticks| ticks >= 4)
        })
        .await
    );

    raw.send_to(PROBE_JSON, server.local_addr()).await.unwrap();
    assert!(
        wait_until(Duration::from_secs(1), || {
            server.silent_ticks(&raw_endpoint).is_some_and(|ticks| ticks <= 1)
        })
        .await
    );

    server.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_silent_endpoint_disconnects_once() {
    let server = start_server(server_config().tick_rate(20).disconnect_after_ticks(5)).await;

    let events: Arc<Mutex<Vec<(&'static str, Endpoint)>>> = Arc::new(Mutex::new(Vec::new()));
    let on_send = events.clone();
    server.set_send(move |endpoint| {
        on_send.lock().push(("send", *endpoint));
        json!("ping")
    });
    let on_disconnect = events.clone();
    server.set_disconnected(move |endpoint| {
        on_disconnect.lock().push(("disconnect", *endpoint));
    });

    let raw = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let raw_endpoint = Endpoint::from(raw.local_addr().unwrap());
    raw.send_to(PROBE_JSON, server.local_addr()).await.unwrap();

    assert!(wait_until(Duration::from_secs(1), || server.endpoints() == vec![raw_endpoint]).await);

    // Five silent ticks at 50ms, plus slack.
    assert!(wait_until(Duration::from_secs(2), || server.endpoints().is_empty()).await);
    tokio::time::sleep(Duration::from_millis(200)).await;

    let events = events.lock().clone();
    let disconnects: Vec<_> = events.iter().filter(|(kind, _)| *kind == "disconnect").collect();
    assert_eq!(disconnects, vec![&("disconnect", raw_endpoint)]);

    // No send after the eviction, including on the eviction tick.
    let position = events.iter().position(|(kind, _)| *kind == "disconnect").unwrap();
    assert!(events[position + 1..].is_empty());
    assert!(events[..position].iter().all(|(kind, _)| *kind == "send"));
    assert_eq!(server.silent_ticks(&raw_endpoint), None);

    server.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_client_goes_quiet_and_is_dropped() {
    let server = start_server(server_config().tick_rate(20).disconnect_after_ticks(6)).await;
    server.set_send(|_| json!(1));

    let disconnected: Arc<Mutex<Vec<Endpoint>>> = Arc::new(Mutex::new(Vec::new()));
    let disconnected_clone = disconnected.clone();
    server.set_disconnected(move |endpoint| disconnected_clone.lock().push(*endpoint));

    let client = ClientSession::start(
        client_config(server.local_addr(), 20),
        JsonCodec::<Value>::new(),
    )
    .await
    .unwrap();
    let client_endpoint = Endpoint::from(client.local_addr());

    assert!(client.wait_established(Duration::from_secs(2)).await);
    assert!(wait_until(Duration::from_secs(1), || server.endpoints() == vec![client_endpoint]).await);

    // Established with no outbound value: the client goes silent.
    assert!(wait_until(Duration::from_secs(2), || server.endpoints().is_empty()).await);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(*disconnected.lock(), vec![client_endpoint]);

    client.shutdown().await;
    server.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_server_reports_undecodable_datagram() {
    let server = start_server(server_config()).await;

    let errors: Arc<Mutex<Vec<NetworkError>>> = Arc::new(Mutex::new(Vec::new()));
    let errors_clone = errors.clone();
    server.set_error_handler(move |e| errors_clone.lock().push(e.clone()));

    let received = Arc::new(AtomicUsize::new(0));
    let received_clone = received.clone();
    server.set_received(move |_, _| {
        received_clone.fetch_add(1, Ordering::SeqCst);
    });

    let raw = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    raw.send_to(b"{not json", server.local_addr()).await.unwrap();

    assert!(wait_until(Duration::from_secs(1), || !errors.lock().is_empty()).await);
    assert!(matches!(errors.lock()[0], NetworkError::Codec(_)));
    assert_eq!(server.stats().decode_errors, 1);

    // The sender still counts as alive, and the loop keeps going.
    assert_eq!(server.endpoints(), vec![Endpoint::from(raw.local_addr().unwrap())]);
    raw.send_to(br#"{"x":2}"#, server.local_addr()).await.unwrap();
    assert!(wait_until(Duration::from_secs(1), || received.load(Ordering::SeqCst) == 1).await);

    server.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_server_rejects_oversized_payload() {
    let server = start_server(server_config().max_datagram_size(64)).await;
    server.set_send(|_| json!({"padding": "y".repeat(200)}));

    let errors = Arc::new(AtomicUsize::new(0));
    let errors_clone = errors.clone();
    server.set_error_handler(move |e| {
        if let NetworkError::PayloadTooLarge { size, max } = e {
            assert_eq!(*max, 64);
            assert!(*size > 200);
            errors_clone.fetch_add(1, Ordering::SeqCst);
        }
    });

    let raw = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    raw.send_to(PROBE_JSON, server.local_addr()).await.unwrap();

    assert!(wait_until(Duration::from_secs(1), || errors.load(Ordering::SeqCst) >= 2).await);
    assert_eq!(server.stats().datagrams_sent, 0);
    assert!(recv_raw(&raw, Duration::from_millis(100)).await.is_none());

    server.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_panicking_hook_does_not_stop_server() {
    let server = start_server(server_config()).await;
    server.set_received(|_, _| panic!("bad hook"));

    let errors: Arc<Mutex<Vec<NetworkError>>> = Arc::new(Mutex::new(Vec::new()));
    let errors_clone = errors.clone();
    server.set_error_handler(move |e| errors_clone.lock().push(e.clone()));

    let connects = Arc::new(AtomicUsize::new(0));
    let connects_clone = connects.clone();
    server.set_connected(move |_| {
        connects_clone.fetch_add(1, Ordering::SeqCst);
    });

    let first = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    first.send_to(b"1", server.local_addr()).await.unwrap();
    assert!(wait_until(Duration::from_secs(1), || !errors.lock().is_empty()).await);
    assert_eq!(
        errors.lock()[0],
        NetworkError::Callback {
            kind: "received",
            message: "bad hook".into(),
        }
    );

    let second = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    second.send_to(PROBE_JSON, server.local_addr()).await.unwrap();
    assert!(wait_until(Duration::from_secs(1), || connects.load(Ordering::SeqCst) == 2).await);
    assert_eq!(server.endpoints().len(), 2);

    server.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_send_hook_replaced_and_unset() {
    let server = start_server(server_config()).await;

    server.set_send(|_| json!("first"));
    server.set_send(|_| json!("second"));
    assert!(server.is_set(CallbackKind::Send));

    let raw = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    raw.send_to(PROBE_JSON, server.local_addr()).await.unwrap();

    let (data, from) = recv_raw(&raw, Duration::from_secs(1)).await.unwrap();
    assert_eq!(serde_json::from_slice::<Value>(&data).unwrap(), json!("second"));
    assert_eq!(from, server.local_addr());

    server.unset(CallbackKind::Send);
    assert!(!server.is_set(CallbackKind::Send));
    tokio::time::sleep(Duration::from_millis(100)).await;
    drain(&raw).await;
    assert!(recv_raw(&raw, Duration::from_millis(200)).await.is_none());

    server.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_endpoints_in_observation_order() {
    let server = start_server(server_config()).await;

    let a = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let b = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let a_endpoint = Endpoint::from(a.local_addr().unwrap());
    let b_endpoint = Endpoint::from(b.local_addr().unwrap());

    b.send_to(PROBE_JSON, server.local_addr()).await.unwrap();
    assert!(wait_until(Duration::from_secs(1), || server.endpoints().len() == 1).await);
    a.send_to(PROBE_JSON, server.local_addr()).await.unwrap();
    assert!(wait_until(Duration::from_secs(1), || server.endpoints().len() == 2).await);

    assert_eq!(server.endpoints(), vec![b_endpoint, a_endpoint]);
    let status = server.endpoint_status();
    assert_eq!(status[0].endpoint, b_endpoint);
    assert_eq!(status[1].endpoint, a_endpoint);

    server.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_oversized_datagram_reported_not_delivered() {
    let server = ServerSession::start(server_config().max_datagram_size(8), BytesCodec)
        .await
        .unwrap();

    let received: Arc<Mutex<Vec<Bytes>>> = Arc::new(Mutex::new(Vec::new()));
    let received_clone = received.clone();
    server.set_received(move |value, _| received_clone.lock().push(value.clone()));

    let errors: Arc<Mutex<Vec<NetworkError>>> = Arc::new(Mutex::new(Vec::new()));
    let errors_clone = errors.clone();
    server.set_error_handler(move |e| errors_clone.lock().push(e.clone()));

    let raw = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let raw_endpoint = Endpoint::from(raw.local_addr().unwrap());
    raw.send_to(b"0123456789ABCDEF", server.local_addr()).await.unwrap();

    assert!(wait_until(Duration::from_secs(1), || !errors.lock().is_empty()).await);
    assert_eq!(
        errors.lock()[0],
        NetworkError::DatagramTooLarge {
            sender: raw_endpoint,
            max: 8,
        }
    );
    assert!(received.lock().is_empty());
    assert_eq!(server.stats().oversized_datagrams, 1);

    // A datagram that fits is still delivered whole.
    raw.send_to(b"01234567", server.local_addr()).await.unwrap();
    assert!(wait_until(Duration::from_secs(1), || !received.lock().is_empty()).await);
    assert_eq!(*received.lock(), vec![Bytes::from_static(b"01234567")]);

    server.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_bytes_codec_session() {
    let server = ServerSession::start(server_config(), BytesCodec).await.unwrap();
    server.set_send(|_| Bytes::from_static(b"\x01\x02"));

    let received: Arc<Mutex<Option<Bytes>>> = Arc::new(Mutex::new(None));
    let received_clone = received.clone();
    server.set_received(move |value, _| *received_clone.lock() = Some(value.clone()));

    let client = ClientSession::start(client_config(server.local_addr(), 20), BytesCodec)
        .await
        .unwrap();
    assert!(client.wait_established(Duration::from_secs(2)).await);
    assert_eq!(client.received(), Some(Bytes::from_static(b"\x01\x02")));

    client.set_outbound(Bytes::from_static(b"raw payload"));
    assert!(wait_until(Duration::from_secs(2), || received.lock().is_some()).await);
    assert_eq!(*received.lock(), Some(Bytes::from_static(b"raw payload")));

    client.shutdown().await;
    server.shutdown().await;
}

// -----------------------------------------------------------------------------
// Lifecycle
// -----------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_stop_is_idempotent() {
    let server = start_server(server_config()).await;
    let client = ClientSession::start(
        client_config(server.local_addr(), 20),
        JsonCodec::<Value>::new(),
    )
    .await
    .unwrap();

    assert_eq!(server.session_state(), SessionState::Running);
    assert_eq!(client.session_state(), SessionState::Running);

    client.stop();
    client.stop();
    client.join().await;
    client.stop();
    assert!(!client.is_running());
    assert_eq!(client.session_state(), SessionState::Stopped);

    server.shutdown().await;
    server.shutdown().await;
    server.stop();
    assert_eq!(server.session_state(), SessionState::Stopped);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_shutdown_is_bounded() {
    let server = start_server(
        SessionConfig::new("127.0.0.1", 0)
            .tick_rate(10)
            .receive_timeout(Duration::from_millis(100)),
    )
    .await;

    let started = tokio::time::Instant::now();
    server.shutdown().await;
    assert!(started.elapsed() < Duration::from_millis(500));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_stopped_server_releases_port() {
    let server = start_server(server_config()).await;
    let addr = server.local_addr();
    server.shutdown().await;
    drop(server);

    let again = ServerSession::start(
        SessionConfig::new("127.0.0.1", addr.port()).tick_rate(20),
        JsonCodec::<Value>::new(),
    )
    .await
    .unwrap();
    assert_eq!(again.local_addr(), addr);
    again.shutdown().await;
}

#[tokio::test]
async fn test_server_bind_conflict() {
    let server = start_server(server_config()).await;
    let err = ServerSession::start(
        SessionConfig::new("127.0.0.1", server.local_addr().port()),
        JsonCodec::<Value>::new(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, NetworkError::Bind { .. }));
    server.shutdown().await;
}
