//! Server session: track endpoints by liveness and fan payloads out to them.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use super::callbacks::{CallbackKind, ServerCallbacks, guarded};
use super::config::SessionConfig;
use super::io::{self, Inbound, Receiver};
use super::liveness::{EndpointStatus, LivenessRegistry};
use super::state::SessionState;
use super::stats::{SessionStats, StatsSnapshot};
use crate::Result;
use crate::codec::{Codec, Packet};
use crate::error::NetworkError;
use crate::logging::targets;
use crate::transport::{Endpoint, Transport};

/// A UDP server that treats every address it hears from as a connected
/// endpoint.
///
/// Endpoints are added on their first datagram and dropped after
/// [`SessionConfig::disconnect_threshold`] ticks of silence. Every tick the
/// server first drops silent endpoints, then calls the send hook once per
/// remaining endpoint and sends the result. An endpoint dropped on a tick is
/// never sent to on that same tick.
///
/// # Hooks
///
/// - [`set_send`](Self::set_send): payload for one endpoint, called every tick
/// - [`set_received`](Self::set_received): decoded payload from an endpoint
/// - [`set_connected`](Self::set_connected): an endpoint was first heard from
/// - [`set_disconnected`](Self::set_disconnected): an endpoint went silent
/// - [`set_error_handler`](Self::set_error_handler): recoverable loop errors
///
/// Each hook slot holds at most one hook; setting it again replaces the
/// previous one. Hooks may be changed at any time from any thread.
///
/// Received datagrams wait in a queue of 1024 events for the tick task. If
/// hooks fall that far behind, further datagrams are dropped and counted in
/// [`StatsSnapshot::dropped_datagrams`].
///
/// # Example
///
/// ```ignore
/// let config = SessionConfig::any_address(9000).tick_rate(30);
/// let server = ServerSession::start(config, JsonCodec::<serde_json::Value>::new()).await?;
///
/// server.set_connected(|endpoint| println!("{endpoint} joined"));
/// server.set_received(|value, endpoint| println!("{endpoint}: {value}"));
/// server.set_send(|endpoint| serde_json::json!({ "you": endpoint.to_string() }));
///
/// // ...
///
/// server.shutdown().await;
/// ```
pub struct ServerSession<C: Codec> {
    config: SessionConfig,
    local_addr: SocketAddr,
    running: Arc<AtomicBool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    callbacks: Arc<ServerCallbacks<C::Value>>,
    endpoints: watch::Receiver<Vec<EndpointStatus>>,
    stats: Arc<SessionStats>,
}

impl<C: Codec> ServerSession<C> {
    /// Bind to the address in `config` and start both loops.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn start(config: SessionConfig, codec: C) -> Result<Self> {
        config.validate()?;

        let transport = Arc::new(Transport::bind(&config.addr(), config.max_datagram_size).await?);
        let local_addr = transport.local_addr();

        let codec = Arc::new(codec);
        let running = Arc::new(AtomicBool::new(true));
        let stats = Arc::new(SessionStats::default());
        let callbacks = Arc::new(ServerCallbacks::new());

        let (events_tx, events_rx) = mpsc::channel(io::EVENT_QUEUE_CAPACITY);
        let (endpoints_tx, endpoints_rx) = watch::channel(Vec::new());

        let receiver = Receiver {
            transport: transport.clone(),
            codec: codec.clone(),
            timeout: config.receive_timeout,
            running: running.clone(),
            stats: stats.clone(),
            events: events_tx,
        };

        let ticker = ServerLoop {
            transport,
            codec,
            tick_interval: config.tick_interval(),
            running: running.clone(),
            stats: stats.clone(),
            callbacks: callbacks.clone(),
            registry: LivenessRegistry::new(config.disconnect_threshold()),
            events: events_rx,
            endpoints: endpoints_tx,
        };

        let tasks = vec![tokio::spawn(receiver.run()), tokio::spawn(ticker.run())];

        tracing::debug!(
            target: targets::SERVER,
            %local_addr,
            tick_rate = config.tick_rate,
            disconnect_threshold = config.disconnect_threshold(),
            "server session started"
        );

        Ok(Self {
            config,
            local_addr,
            running,
            tasks: Mutex::new(tasks),
            callbacks,
            endpoints: endpoints_rx,
            stats,
        })
    }

    /// The configuration this session was started with.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// The address the server socket is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Set the hook that produces the payload for one endpoint each tick.
    ///
    /// Without a send hook the server sends nothing, but still drops silent
    /// endpoints.
    pub fn set_send<F>(&self, hook: F)
    where
        F: Fn(&Endpoint) -> C::Value + Send + Sync + 'static,
    {
        self.callbacks.on_send.set(Arc::new(hook));
    }

    /// Set the hook called with every decoded payload and its sender.
    ///
    /// Client probes are never passed to this hook. They still mark their
    /// sender as alive and can trigger the connected hook.
    pub fn set_received<F>(&self, hook: F)
    where
        F: Fn(&C::Value, &Endpoint) + Send + Sync + 'static,
    {
        self.callbacks.on_receive.set(Arc::new(hook));
    }

    /// Set the hook called when an endpoint is first heard from.
    pub fn set_connected<F>(&self, hook: F)
    where
        F: Fn(&Endpoint) + Send + Sync + 'static,
    {
        self.callbacks.on_connect.set(Arc::new(hook));
    }

    /// Set the hook called when an endpoint is dropped for silence.
    pub fn set_disconnected<F>(&self, hook: F)
    where
        F: Fn(&Endpoint) + Send + Sync + 'static,
    {
        self.callbacks.on_disconnect.set(Arc::new(hook));
    }

    /// Set the hook that receives decode failures, rejected sends and hook
    /// panics.
    pub fn set_error_handler<F>(&self, hook: F)
    where
        F: Fn(&NetworkError) + Send + Sync + 'static,
    {
        self.callbacks.on_error.set(Arc::new(hook));
    }

    /// Remove the hook in the given slot.
    pub fn unset(&self, kind: CallbackKind) {
        self.callbacks.unset(kind);
    }

    /// Whether a hook is installed in the given slot.
    pub fn is_set(&self, kind: CallbackKind) -> bool {
        self.callbacks.is_set(kind)
    }

    /// Known endpoints in the order they were first heard from.
    pub fn endpoints(&self) -> Vec<Endpoint> {
        self.endpoints
            .borrow()
            .iter()
            .map(|status| status.endpoint)
            .collect()
    }

    /// Known endpoints with their silent tick counters.
    pub fn endpoint_status(&self) -> Vec<EndpointStatus> {
        self.endpoints.borrow().clone()
    }

    /// Ticks since `endpoint` was last heard from, if it is known.
    pub fn silent_ticks(&self, endpoint: &Endpoint) -> Option<u32> {
        self.endpoints
            .borrow()
            .iter()
            .find(|status| status.endpoint == *endpoint)
            .map(|status| status.silent_ticks)
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
    /// Returns immediately. The socket is closed once both loops have exited.
    /// Calling this on a stopped session does nothing.
    pub fn stop(&self) {
        if self.running.swap(false, Ordering::SeqCst) {
            tracing::debug!(target: targets::SERVER, local_addr = %self.local_addr, "server session stopping");
        }
    }

    /// Wait for both loops to exit. Call [`stop`](Self::stop) first.
    pub async fn join(&self) {
        let tasks = std::mem::take(&mut *self.tasks.lock());
        for task in tasks {
            if let Err(e) = task.await {
                tracing::warn!(target: targets::SERVER, error = %e, "server task failed");
            }
        }
    }

    /// Stop the session and wait for both loops to exit.
    pub async fn shutdown(&self) {
        self.stop();
        self.join().await;
    }
}

impl<C: Codec> Drop for ServerSession<C> {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

impl<C: Codec> std::fmt::Debug for ServerSession<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerSession")
            .field("local_addr", &self.local_addr)
            .field("endpoints", &self.endpoints.borrow().len())
            .field("session_state", &self.session_state())
            .field("callbacks", &self.callbacks)
            .finish()
    }
}

/// The tick task. Sole owner of the liveness registry.
struct ServerLoop<C: Codec> {
    transport: Arc<Transport>,
    codec: Arc<C>,
    tick_interval: Duration,
    running: Arc<AtomicBool>,
    stats: Arc<SessionStats>,
    callbacks: Arc<ServerCallbacks<C::Value>>,
    registry: LivenessRegistry,
    events: mpsc::Receiver<Inbound<C::Value>>,
    endpoints: watch::Sender<Vec<EndpointStatus>>,
}

impl<C: Codec> ServerLoop<C> {
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

        tracing::debug!(
            target: targets::SERVER,
            endpoints = self.registry.len(),
            "server session stopped"
        );
    }

    fn handle(&mut self, inbound: Inbound<C::Value>) {
        let source = inbound.source;

        if self.registry.touch(source) {
            tracing::debug!(target: targets::SERVER, endpoint = %source, "endpoint connected");
            if let Some(hook) = self.callbacks.on_connect.get() {
                self.invoke(CallbackKind::Connected, || hook(&source));
            }
        }

        match inbound.packet {
            Ok(Packet::Data(value)) => {
                if let Some(hook) = self.callbacks.on_receive.get() {
                    self.invoke(CallbackKind::Received, || hook(&value, &source));
                }
            }
            Ok(Packet::Probe) => {
                tracing::trace!(target: targets::SERVER, endpoint = %source, "probe received");
            }
            Err(e) => {
                tracing::warn!(
                    target: targets::SERVER,
                    endpoint = %source,
                    error = %e,
                    "dropping datagram"
                );
                self.callbacks.on_error.report(&e);
            }
        }

        self.publish();
    }

    async fn tick(&mut self) {
        for endpoint in self.registry.sweep() {
            tracing::debug!(target: targets::SERVER, %endpoint, "endpoint disconnected");
            if let Some(hook) = self.callbacks.on_disconnect.get() {
                self.invoke(CallbackKind::Disconnected, || hook(&endpoint));
            }
        }
        self.publish();

        let Some(hook) = self.callbacks.on_send.get() else {
            return;
        };

        let endpoints = self.registry.endpoints().to_vec();
        for endpoint in endpoints {
            let encoded = guarded(CallbackKind::Send, || hook(&endpoint))
                .and_then(|value| self.codec.encode(Packet::Data(&value)));

            match encoded {
                Ok(bytes) => {
                    io::deliver(
                        &self.transport,
                        &self.stats,
                        &self.callbacks.on_error,
                        endpoint,
                        &bytes,
                    )
                    .await
                }
                Err(e) => {
                    self.stats.record_rejected_send();
                    tracing::warn!(target: targets::SERVER, %endpoint, error = %e, "no payload for endpoint");
                    self.callbacks.on_error.report(&e);
                }
            }
        }
    }

    /// Run a hook, reporting a panic instead of unwinding through the loop.
    fn invoke(&self, kind: CallbackKind, f: impl FnOnce()) {
        if let Err(e) = guarded(kind, f) {
            tracing::warn!(target: targets::SERVER, error = %e, "callback failed");
            self.callbacks.on_error.report(&e);
        }
    }

    fn publish(&self) {
        self.endpoints.send_replace(self.registry.snapshot());
    }
}
