//! Ping example: one server, one client, a few seconds of traffic.
//!
//! Run with: RUST_LOG=pge_net=debug cargo run -p pge-net --example ping

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use pge_net::{ClientSession, JsonCodec, ServerSession, SessionConfig};
use serde_json::{Value, json};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> pge_net::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let server = ServerSession::start(
        SessionConfig::new("127.0.0.1", 0).tick_rate(10),
        JsonCodec::<Value>::new(),
    )
    .await?;

    let ticks = Arc::new(AtomicU64::new(0));
    let server_ticks = ticks.clone();
    server.set_send(move |endpoint| {
        json!({ "tick": server_ticks.fetch_add(1, Ordering::Relaxed), "you": endpoint.to_string() })
    });
    server.set_connected(|endpoint| tracing::info!(%endpoint, "client connected"));
    server.set_disconnected(|endpoint| tracing::info!(%endpoint, "client timed out"));
    server.set_received(|value, endpoint| tracing::info!(%endpoint, %value, "server received"));
    server.set_error_handler(|error| tracing::warn!(%error, "server error"));

    let addr = server.local_addr();
    let client = ClientSession::start(
        SessionConfig::new(addr.ip().to_string(), addr.port()).tick_rate(10),
        JsonCodec::<Value>::new(),
    )
    .await?;

    if !client.wait_established(Duration::from_secs(2)).await {
        tracing::warn!("server never answered");
    }

    for n in 0..20 {
        client.set_outbound(json!({ "ping": n }));
        tokio::time::sleep(Duration::from_millis(100)).await;
        if let Some(reply) = client.received() {
            tracing::debug!(%reply, "client received");
        }
    }

    client.shutdown().await;
    tracing::info!(stats = ?client.stats(), "client stopped");

    // Let the server notice the silence.
    server.set_send(|_| Value::Null);
    tokio::time::sleep(Duration::from_secs(6)).await;

    server.shutdown().await;
    tracing::info!(stats = ?server.stats(), "server stopped");

    Ok(())
}
