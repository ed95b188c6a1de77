//! Configuration for client and server sessions.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::Result;
use crate::error::NetworkError;
use crate::transport::MAX_UDP_PAYLOAD;

/// Default tick rate in ticks per second.
pub const DEFAULT_TICK_RATE: u32 = 120;
/// Default maximum datagram size in bytes.
pub const DEFAULT_MAX_DATAGRAM_SIZE: usize = 1048;
/// Default receive timeout.
pub const DEFAULT_RECEIVE_TIMEOUT: Duration = Duration::from_millis(100);
/// Highest tick rate with a non-zero tick interval.
pub const MAX_TICK_RATE: u32 = 1_000_000_000;
/// Seconds of silence after which an endpoint is dropped, unless overridden.
pub const DEFAULT_DISCONNECT_SECONDS: u32 = 5;

/// Configuration for a client or server session.
///
/// For a server, `address`/`port` is the local bind address. For a client it
/// is the server to connect to.
///
/// # Example
///
/// ```ignore
/// let config = SessionConfig::new("127.0.0.1", 9000)
///     .tick_rate(60)
///     .max_datagram_size(512)
///     .disconnect_after_ticks(120);
/// ```
///
/// The same configuration can be loaded from TOML:
///
/// ```toml
/// address = "0.0.0.0"
/// port = 9000
/// tick_rate = 60
/// receive_timeout_ms = 50
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Server address (client) or bind address (server).
    pub address: String,
    /// Server port (client) or bind port (server). Use 0 on a server for an
    /// OS-assigned port.
    pub port: u16,
    /// Ticks per second of the send loop.
    pub tick_rate: u32,
    /// Maximum datagram size in bytes, for both sending and receiving.
    pub max_datagram_size: usize,
    /// How long one receive call waits before checking for shutdown.
    #[serde(rename = "receive_timeout_ms", with = "millis")]
    pub receive_timeout: Duration,
    /// Silent ticks before an endpoint is dropped. `None` means
    /// `tick_rate * 5`.
    pub disconnect_after_ticks: Option<u32>,
    /// Local address a client binds to. `None` binds an OS-assigned port on
    /// the unspecified address of the server's family.
    pub local_address: Option<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1".into(),
            port: 0,
            tick_rate: DEFAULT_TICK_RATE,
            max_datagram_size: DEFAULT_MAX_DATAGRAM_SIZE,
            receive_timeout: DEFAULT_RECEIVE_TIMEOUT,
            disconnect_after_ticks: None,
            local_address: None,
        }
    }
}

impl SessionConfig {
    /// Create a configuration for the given address and port.
    pub fn new(address: impl Into<String>, port: u16) -> Self {
        Self {
            address: address.into(),
            port,
            ..Default::default()
        }
    }

    /// Create a configuration that binds to any address on the specified port.
    pub fn any_address(port: u16) -> Self {
        Self::new("0.0.0.0", port)
    }

    /// Parse a configuration from a TOML document. Missing keys take their
    /// defaults.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        Ok(toml::from_str(source)?)
    }

    /// Read a configuration from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|e| {
            NetworkError::InvalidConfig(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&source)
    }

    /// Render the configuration as a TOML document.
    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string(self)?)
    }

    /// Set the tick rate.
    pub fn tick_rate(mut self, ticks_per_second: u32) -> Self {
        self.tick_rate = ticks_per_second;
        self
    }

    /// Set the maximum datagram size.
    pub fn max_datagram_size(mut self, size: usize) -> Self {
        self.max_datagram_size = size;
        self
    }

    /// Set the receive timeout.
    pub fn receive_timeout(mut self, timeout: Duration) -> Self {
        self.receive_timeout = timeout;
        self
    }

    /// Drop endpoints after `ticks` silent ticks instead of `tick_rate * 5`.
    pub fn disconnect_after_ticks(mut self, ticks: u32) -> Self {
        self.disconnect_after_ticks = Some(ticks);
        self
    }

    /// Bind a client to a specific local address (`host:port`).
    pub fn local_address(mut self, address: impl Into<String>) -> Self {
        self.local_address = Some(address.into());
        self
    }

    /// Get the address string (address:port).
    pub fn addr(&self) -> String {
        if self.address.contains(':') {
            format!("[{}]:{}", self.address, self.port)
        } else {
            format!("{}:{}", self.address, self.port)
        }
    }

    /// Duration of one tick.
    pub fn tick_interval(&self) -> Duration {
        (Duration::from_secs(1) / self.tick_rate.max(1)).max(Duration::from_nanos(1))
    }

    /// Silent ticks after which an endpoint is dropped.
    pub fn disconnect_threshold(&self) -> u32 {
        self.disconnect_after_ticks
            .unwrap_or_else(|| self.tick_rate.saturating_mul(DEFAULT_DISCONNECT_SECONDS))
    }

    /// Check that the configuration can drive a session.
    pub fn validate(&self) -> Result<()> {
        if self.tick_rate == 0 || self.tick_rate > MAX_TICK_RATE {
            return Err(NetworkError::InvalidConfig(format!(
                "tick_rate must be between 1 and {MAX_TICK_RATE}, got {}",
                self.tick_rate
            )));
        }
        if self.max_datagram_size == 0 || self.max_datagram_size > MAX_UDP_PAYLOAD {
            return Err(NetworkError::InvalidConfig(format!(
                "max_datagram_size must be between 1 and {MAX_UDP_PAYLOAD}, got {}",
                self.max_datagram_size
            )));
        }
        if self.receive_timeout.is_zero() {
            return Err(NetworkError::InvalidConfig(
                "receive_timeout must be greater than zero".into(),
            ));
        }
        if self.disconnect_threshold() == 0 {
            return Err(NetworkError::InvalidConfig(
                "disconnect threshold must be at least one tick".into(),
            ));
        }
        Ok(())
    }
}

/// Serialize a `Duration` as whole milliseconds.
mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
