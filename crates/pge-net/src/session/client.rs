//! Client session: probe until the server answers, then exchange payloads.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use super::callbacks::{CallbackSlot, ErrorHook};
use super::config::SessionConfig;
use super::io::{self, Inbound, Receiver};
use super::state::{ClientState, SessionState};
use super::stats::{SessionStats, StatsSnapshot};
use crate::Result;
use crate::codec::{Codec, Packet};
use crate::error::NetworkError;
use crate::logging::targets;
use crate::transport::{self, Endpoint, Transport};

/// One logical connection to a server over UDP.
///
/// The session starts in [`ClientState::Probing`] and sends the probe every
/// tick. The first decodable datagram moves it to
/// [`ClientState::Established`], after which the outbound value (if any) is
/// sent every tick. There is no reconnection: if the server goes away the
/// client keeps sending without reporting anything.
///
/// Two tasks run per session. The receive task decodes datagrams and hands
/// them to the tick task, which owns the connection state and publishes it
/// for [`state`](Self::state) and [`received`](Self::received).
///
/// # Example
///
/// ```ignore
/// let config = SessionConfig::new("127.0.0.1", 9000).tick_rate(60);
/// let client = ClientSession::start(config, JsonCodec::<serde_json::Value>::new()).await?;
///
/// client.set_outbound(serde_json::json!({"x": 1}));
///
/// if let Some(reply) = client.received() {
///     println!("server says {reply}");
/// }
///
/// client.shutdown().await;
/// ```
pub struct ClientSession<C: Codec> {
    config: SessionConfig,
    server: Endpoint,
    local_addr: SocketAddr,
    running: Arc<AtomicBool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    outbound: watch::Sender<Option<C::Value>>,
    received: watch::Receiver<Option<C::Value>>,
    state: watch::Receiver<ClientState>,
    stats: Arc<SessionStats>,
    on_error: Arc<CallbackSlot<ErrorHook>>,
}

impl<C: Codec> ClientSession<C> {
    /// Resolve the server in `config`, bind a local socket and start both
    /// loops.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn start(config: SessionConfig, codec: C) -> Result<Self> {
        config.validate()?;

        let server = transport::resolve(&config.address, config.port).await?;
        let local = match &config.local_address {
            Some(address) => address.clone(),
            None if server.ip().is_ipv6() => "[::]:0".to_string(),
            None => "0.0.0.0:0".to_string(),
        };
        let transport = Arc::new(Transport::bind(&local, config.max_datagram_size).await?);
        let local_addr = transport.local_addr();

        let codec = Arc::new(codec);
        let running = Arc::new(AtomicBool::new(true));
        let stats = Arc::new(SessionStats::default());
        let on_error = Arc::new(CallbackSlot::new());

        let (events_tx, events_rx) = mpsc::channel(io::EVENT_QUEUE_CAPACITY);
        let (outbound_tx, outbound_rx) = watch::channel(None);
        let (received_tx, received_rx) = watch::channel(None);
        let (state_tx, state_rx) = watch::channel(ClientState::Probing);

        let receiver = Receiver {
            transport: transport.clone(),
            codec: codec.clone(),
            timeout: config.receive_timeout,
            running: running.clone(),
            stats: stats.clone(),
            events: events_tx,
        };

        let ticker = ClientLoop {
            transport,
            codec,
            server,
            tick_interval: config.tick_interval(),
            running: running.clone(),
            stats: stats.clone(),
            on_error: on_error.clone(),
            events: events_rx,
            outbound: outbound_rx,
            received: received_tx,
            state: state_tx,
        };

        let tasks = vec![tokio::spawn(receiver.run()), tokio::spawn(ticker.run())];

        tracing::debug!(
            target: targets::CLIENT,
            %server,
            %local_addr,
            tick_rate = config.tick_rate,
            "client session started"
        );

        Ok(Self {
            config,
            server,
            local_addr,
            running,
            tasks: Mutex::new(tasks),
            outbound: outbound_tx,
            received: received_rx,
            state: state_rx,
            stats,
            on_error,
        })
    }

    /// The configuration this session was started with.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// The server endpoint.
    pub fn server(&self) -> Endpoint {
        self.server
    }

    /// The local address of the client socket.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Current connection state.
    pub fn state(&self) -> ClientState {
        *self.state.borrow()
    }

    /// Whether the server has answered at least once.
    pub fn is_established(&self) -> bool {
        self.state() == ClientState::Established
    }

    /// Wait until the session is established or `timeout` elapses.
    ///
    /// Returns whether the session is established.
    pub async fn wait_established(&self, timeout: Duration) -> bool {
        let mut state = self.state.clone();
        let wait = async move {
            state
                .wait_for(|current| *current == ClientState::Established)
                .await
                .is_ok()
        };
        tokio::time::timeout(timeout, wait).await.unwrap_or(false)
    }

    /// The most recently received application value.
    pub fn received(&self) -> Option<C::Value> {
        self.received.borrow().clone()
    }

    /// Set the value sent to the server on every tick once established.
    pub fn set_outbound(&self, value: C::Value) {
        self.outbound.send_replace(Some(value));
    }

    /// Stop sending an outbound value.
    pub fn clear_outbound(&self) {
        self.outbound.send_replace(None);
    }

    /// Install the hook that receives decode failures and rejected sends.
    pub fn set_error_handler<F>(&self, hook: F)
    where
        F: Fn(&NetworkError) + Send + Sync + 'static,
    {
        self.on_error.set(Arc::new(hook));
    }

    /// Remove the error hook.
    pub fn clear_error_handler(&self) {
        self.on_error.clear();
    }

    /// Traffic counters.
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Whether the loops have been asked to keep running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Lifecycle state of the background loops.
    pub fn session_state(&self) -> SessionState {
        if self.is_running() {
            SessionState::Running
        } else if self.tasks.lock().iter().all(JoinHandle::is_finished) {
            SessionState::Stopped
        } else {
            SessionState::Stopping
        }
    }

    /// Ask both loops to exit.
    ///
    /// Returns immediately; the loops notice within one receive timeout or one
    /// tick. Calling this on a stopped session does nothing.
    pub fn stop(&self) {
        if self.running.swap(false, Ordering::SeqCst) {
            tracing::debug!(target: targets::CLIENT, server = %self.server, "client session stopping");
        }
    }

    /// Wait for both loops to exit. Call [`stop`](Self::stop) first.
    pub async fn join(&self) {
        let tasks = std::mem::take(&mut *self.tasks.lock());
        for task in tasks {
            if let Err(e) = task.await {
                tracing::warn!(target: targets::CLIENT, error = %e, "client task failed");
            }
        }
    }

    /// Stop the session and wait for both loops to exit.
    pub async fn shutdown(&self) {
        self.stop();
        self.join().await;
    }
}

impl<C: Codec> Drop for ClientSession<C> {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

impl<C: Codec> std::fmt::Debug for ClientSession<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientSession")
            .field("server", &self.server)
            .field("local_addr", &self.local_addr)
            .field("state", &self.state())
            .field("session_state", &self.session_state())
            .finish()
    }
}

/// The tick task. Sole owner of the client's connection state.
struct ClientLoop<C: Codec> {
    transport: Arc<Transport>,
    codec: Arc<C>,
    server: Endpoint,
    tick_interval: Duration,
    running: Arc<AtomicBool>,
    stats: Arc<SessionStats>,
    on_error: Arc<CallbackSlot<ErrorHook>>,
    events: mpsc::Receiver<Inbound<C::Value>>,
    outbound: watch::Receiver<Option<C::Value>>,
    received: watch::Sender<Option<C::Value>>,
    state: watch::Sender<ClientState>,
}

impl<C: Codec> ClientLoop<C> {
    async fn run(mut self) {
        let mut ticker = io::ticker(self.tick_interval);

        while self.running.load(Ordering::SeqCst) {
            tokio::select! {
                _ = ticker.tick() => self.tick().await,
                event = self.events.recv() => match event {
                    Some(inbound) => self.handle(inbound),
                    None => break,
                },
            }
        }

        tracing::debug!(target: targets::CLIENT, server = %self.server, "client session stopped");
    }

    fn handle(&mut self, inbound: Inbound<C::Value>) {
        match inbound.packet {
            Ok(packet) => {
                if *self.state.borrow() == ClientState::Probing {
                    self.state.send_replace(ClientState::Established);
                    tracing::debug!(
                        target: targets::CLIENT,
                        server = %self.server,
                        "connection established"
                    );
                }
                if let Packet::Data(value) = packet {
                    self.received.send_replace(Some(value));
                }
            }
            Err(e) => {
                tracing::warn!(
                    target: targets::CLIENT,
                    source = %inbound.source,
                    error = %e,
                    "dropping datagram"
                );
                self.on_error.report(&e);
            }
        }
    }

    async fn tick(&mut self) {
        let state = *self.state.borrow();
        let encoded = match state {
            ClientState::Probing => self.codec.encode(Packet::Probe),
            ClientState::Established => {
                let outbound = self.outbound.borrow();
                match outbound.as_ref() {
                    Some(value) => self.codec.encode(Packet::Data(value)),
                    None => return,
                }
            }
        };

        match encoded {
            Ok(bytes) => {
                io::deliver(
                    &self.transport,
                    &self.stats,
                    &self.on_error,
                    self.server,
                    &bytes,
                )
                .await
            }
            Err(e) => {
                self.stats.record_rejected_send();
                tracing::warn!(target: targets::CLIENT, error = %e, "failed to encode outbound value");
                self.on_error.report(&e);
            }
        }
    }
}
