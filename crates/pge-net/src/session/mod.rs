//! Client and server sessions over UDP.
//!
//! This module provides logical connections on top of a connectionless
//! socket:
//! - **ClientSession**: probes a server until it answers, then exchanges
//!   payloads every tick
//! - **ServerSession**: accepts datagrams from anyone, tracks endpoints by
//!   liveness and sends to all of them every tick
//!
//! There is no handshake. A server learns about a client from its first
//! datagram and forgets it after a configurable number of silent ticks
//! (`tick_rate * 5` by default, i.e. five seconds).
//!
//! # Example
//!
//! ```ignore
//! use pge_net::codec::JsonCodec;
//! use pge_net::session::{ClientSession, ServerSession, SessionConfig};
//! use serde_json::{Value, json};
//!
//! let server = ServerSession::start(
//!     SessionConfig::new("127.0.0.1", 9000).tick_rate(30),
//!     JsonCodec::<Value>::new(),
//! )
//! .await?;
//!
//! server.set_received(|value, endpoint| println!("{endpoint} sent {value}"));
//! server.set_send(|_| json!({"tick": true}));
//!
//! let client = ClientSession::start(
//!     SessionConfig::new("127.0.0.1", 9000).tick_rate(30),
//!     JsonCodec::<Value>::new(),
//! )
//! .await?;
//!
//! client.set_outbound(json!({"x": 1}));
//! ```
//!
//! # Threading
//!
//! Each session runs two tokio tasks. The receive task only decodes datagrams
//! and forwards them over a channel; the tick task owns all session state and
//! runs the hooks. Sessions must be started inside a tokio runtime.

mod callbacks;
mod client;
mod config;
mod io;
mod liveness;
mod server;
mod state;
mod stats;

pub use callbacks::{
    CallbackKind, CallbackSlot, EndpointHook, ErrorHook, ReceiveHook, SendHook, ServerCallbacks,
};
pub use client::ClientSession;
pub use config::{
    DEFAULT_DISCONNECT_SECONDS, DEFAULT_MAX_DATAGRAM_SIZE, DEFAULT_RECEIVE_TIMEOUT,
    DEFAULT_TICK_RATE, MAX_TICK_RATE, SessionConfig,
};
pub use liveness::{EndpointStatus, LivenessRegistry};
pub use server::ServerSession;
pub use state::{ClientState, SessionState};
pub use stats::{SessionStats, StatsSnapshot};
