//! Bound datagram socket with bounded-timeout receive.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::UdpSocket;

use super::endpoint::{Datagram, Endpoint};
use crate::Result;
use crate::error::NetworkError;
use crate::logging::targets;

/// Largest payload an IPv4 UDP datagram can carry.
pub const MAX_UDP_PAYLOAD: usize = 65_507;

/// One bound UDP socket.
///
/// All methods take `&self`, so a transport can be shared between a session's
/// receive loop and its tick loop behind an `Arc`.
///
/// # Example
///
/// ```ignore
/// let transport = Transport::bind("127.0.0.1:0", 1048).await?;
///
/// transport.send(peer, b"hello").await?;
///
/// match transport.receive(Duration::from_millis(100)).await? {
///     Some(datagram) => println!("{} bytes from {}", datagram.data.len(), datagram.source),
///     None => println!("nothing yet"),
/// }
/// ```
#[derive(Debug)]
pub struct Transport {
    socket: UdpSocket,
    local_addr: SocketAddr,
    max_datagram_size: usize,
}

impl Transport {
    /// Bind a socket to `addr` (`host:port`; port 0 lets the OS choose).
    pub async fn bind(addr: &str, max_datagram_size: usize) -> Result<Self> {
        let socket = UdpSocket::bind(addr).await.map_err(|e| NetworkError::Bind {
            address: addr.to_string(),
            message: e.to_string(),
        })?;
        let local_addr = socket.local_addr()?;

        tracing::debug!(target: targets::TRANSPORT, %local_addr, max_datagram_size, "socket bound");

        Ok(Self {
            socket,
            local_addr,
            max_datagram_size,
        })
    }

    /// The address this socket is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// The largest payload this transport will send or receive.
    pub fn max_datagram_size(&self) -> usize {
        self.max_datagram_size
    }

    /// Send `bytes` as one datagram to `endpoint`.
    ///
    /// Delivery and ordering are not guaranteed. Payloads larger than the
    /// configured maximum are rejected without touching the socket.
    pub async fn send(&self, endpoint: Endpoint, bytes: &[u8]) -> Result<usize> {
        if bytes.len() > self.max_datagram_size {
            return Err(NetworkError::PayloadTooLarge {
                size: bytes.len(),
                max: self.max_datagram_size,
            });
        }

        let sent = self.socket.send_to(bytes, endpoint.addr()).await?;
        tracing::trace!(target: targets::TRANSPORT, %endpoint, bytes = sent, "datagram sent");
        Ok(sent)
    }

    /// Wait up to `timeout` for one datagram.
    ///
    /// Returns `Ok(None)` when the timeout elapses with no data. A datagram
    /// longer than the maximum size is consumed and returned as
    /// [`NetworkError::DatagramTooLarge`], never as a truncated payload.
    pub async fn receive(&self, timeout: Duration) -> Result<Option<Datagram>> {
        // One spare byte tells a datagram that fits apart from one the OS cut short.
        let mut buffer = vec![0u8; self.max_datagram_size + 1];

        match tokio::time::timeout(timeout, self.socket.recv_from(&mut buffer)).await {
            Ok(Ok((n, source))) if n > self.max_datagram_size => {
                tracing::debug!(target: targets::TRANSPORT, %source, max = self.max_datagram_size, "oversized datagram dropped");
                Err(NetworkError::DatagramTooLarge {
                    sender: source.into(),
                    max: self.max_datagram_size,
                })
            }
            Ok(Ok((n, source))) => {
                buffer.truncate(n);
                tracing::trace!(target: targets::TRANSPORT, %source, bytes = n, "datagram received");
                Ok(Some(Datagram::new(buffer, source)))
            }
            Ok(Err(e)) => Err(e.into()),
            Err(_elapsed) => Ok(None),
        }
    }
}

/// Resolve `host:port` to a single endpoint, taking the first address returned.
pub async fn resolve(host: &str, port: u16) -> Result<Endpoint> {
    let mut addrs = tokio::net::lookup_host((host, port))
        .await
        .map_err(|e| NetworkError::InvalidAddress(format!("{host}:{port}: {e}")))?;

    addrs
        .next()
        .map(Endpoint::from)
        .ok_or_else(|| NetworkError::InvalidAddress(format!("{host}:{port}: no address found")))
}
