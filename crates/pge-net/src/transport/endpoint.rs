//! Remote endpoint identity and received datagrams.

use std::fmt;
use std::net::{IpAddr, SocketAddr};

/// A remote address identity (host and port).
///
/// Endpoints compare by value and are used both as the liveness registry key
/// and as the handle passed to session callbacks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Endpoint(SocketAddr);

impl Endpoint {
    /// Create an endpoint from a socket address.
    pub fn new(addr: SocketAddr) -> Self {
        Self(addr)
    }

    /// The underlying socket address.
    pub fn addr(&self) -> SocketAddr {
        self.0
    }

    /// The IP address of the endpoint.
    pub fn ip(&self) -> IpAddr {
        self.0.ip()
    }

    /// The port of the endpoint.
    pub fn port(&self) -> u16 {
        self.0.port()
    }
}

impl From<SocketAddr> for Endpoint {
    fn from(addr: SocketAddr) -> Self {
        Self(addr)
    }
}

impl From<Endpoint> for SocketAddr {
    fn from(endpoint: Endpoint) -> Self {
        endpoint.0
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A received datagram with its source endpoint.
#[derive(Clone, Debug)]
pub struct Datagram {
    /// The datagram payload.
    pub data: Vec<u8>,
    /// The endpoint the datagram came from.
    pub source: Endpoint,
}

impl Datagram {
    /// Create a new datagram.
    pub fn new(data: Vec<u8>, source: impl Into<Endpoint>) -> Self {
        Self {
            data,
            source: source.into(),
        }
    }
}
