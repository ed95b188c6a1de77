//! Networking module for PGE.
//!
//! This crate provides a small client/server session protocol over UDP:
//!
//! - **Sessions**: logical connections without a transport handshake, with
//!   liveness-based disconnect detection
//! - **Codecs**: pluggable wire formats for application payloads
//! - **Transport**: one bound datagram socket with bounded-timeout receive
//!
//! # Sessions
//!
//! A [`ServerSession`] binds a local address and treats every address it
//! hears from as a connected endpoint. A [`ClientSession`] sends a probe to
//! the server every tick until it gets a reply, then sends its outbound value
//! every tick.
//!
//! ```ignore
//! use pge_net::{JsonCodec, ServerSession, SessionConfig};
//!
//! let server = ServerSession::start(
//!     SessionConfig::any_address(9000),
//!     JsonCodec::<serde_json::Value>::new(),
//! )
//! .await?;
//!
//! server.set_connected(|endpoint| println!("{endpoint} connected"));
//! server.set_disconnected(|endpoint| println!("{endpoint} timed out"));
//! server.set_received(|value, endpoint| println!("{endpoint}: {value}"));
//! ```
//!
//! ## Hooks
//!
//! Server hooks have fixed signatures:
//!
//! - send: `Fn(&Endpoint) -> T`, once per endpoint per tick
//! - received: `Fn(&T, &Endpoint)`
//! - connected / disconnected: `Fn(&Endpoint)`
//! - error: `Fn(&NetworkError)`
//!
//! Hooks run on the session's tick task. A panicking hook is caught and
//! reported to the error hook; it never stops the session.
//!
//! # Errors
//!
//! Failures while starting a session are returned from `start`. Inside the
//! loops, socket errors are logged and the loop keeps going; undecodable
//! datagrams, oversized payloads and hook panics are logged and handed to the
//! error hook.
//!
//! # Logging
//!
//! All logging goes through `tracing` under the targets in
//! [`logging::targets`].

mod error;

pub mod codec;
pub mod logging;
pub mod session;
pub mod transport;

pub use error::{NetworkError, Result};

// Re-export commonly used types at the crate root
pub use codec::{BytesCodec, Codec, JsonCodec, PROBE, Packet};
pub use session::{
    CallbackKind, ClientSession, ClientState, EndpointStatus, LivenessRegistry, ServerSession,
    SessionConfig, SessionState, StatsSnapshot,
};
pub use transport::{Datagram, Endpoint, Transport};
