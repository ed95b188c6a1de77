//! Datagram transport.
//!
//! This module wraps one bound UDP socket:
//! - **Transport**: best-effort send and bounded-timeout receive
//! - **Endpoint**: the identity of a remote peer
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use pge_net::transport::{Transport, resolve};
//!
//! let transport = Transport::bind("0.0.0.0:0", 1048).await?;
//! let server = resolve("127.0.0.1", 9000).await?;
//!
//! transport.send(server, b"ping").await?;
//!
//! if let Some(datagram) = transport.receive(Duration::from_millis(100)).await? {
//!     println!("reply from {}", datagram.source);
//! }
//! ```

mod endpoint;
mod socket;

pub use endpoint::{Datagram, Endpoint};
pub use socket::{MAX_UDP_PAYLOAD, Transport, resolve};
