//! Error types for the networking module.

use thiserror::Error;

use crate::transport::Endpoint;

/// Network-specific errors.
///
/// Payloads are stored as strings or plain values so the error can be cloned
/// and handed to every registered error hook.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NetworkError {
    /// I/O error on the underlying socket.
    #[error("I/O error: {0}")]
    Io(String),

    /// The socket could not be bound to the requested address.
    #[error("failed to bind {address}: {message}")]
    Bind {
        /// The address that was requested.
        address: String,
        /// The underlying failure.
        message: String,
    },

    /// The address could not be parsed or resolved.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// The session configuration failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A payload could not be encoded or a datagram could not be decoded.
    #[error("codec error: {0}")]
    Codec(String),

    /// An encoded payload does not fit in one datagram.
    #[error("payload of {size} bytes exceeds the maximum datagram size of {max} bytes")]
    PayloadTooLarge {
        /// Encoded payload size in bytes.
        size: usize,
        /// Configured maximum datagram size in bytes.
        max: usize,
    },

    /// A received datagram was longer than the maximum datagram size and was
    /// dropped instead of being decoded from a truncated buffer.
    #[error("datagram from {sender} exceeds the maximum datagram size of {max} bytes")]
    DatagramTooLarge {
        /// The endpoint that sent the datagram.
        sender: Endpoint,
        /// Configured maximum datagram size in bytes.
        max: usize,
    },

    /// An application callback panicked.
    #[error("callback '{kind}' panicked: {message}")]
    Callback {
        /// Name of the callback slot.
        kind: &'static str,
        /// Panic message, if one could be recovered.
        message: String,
    },
}

impl From<std::io::Error> for NetworkError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for NetworkError {
    fn from(err: serde_json::Error) -> Self {
        Self::Codec(err.to_string())
    }
}

impl From<toml::de::Error> for NetworkError {
    fn from(err: toml::de::Error) -> Self {
        Self::InvalidConfig(err.to_string())
    }
}

impl From<toml::ser::Error> for NetworkError {
    fn from(err: toml::ser::Error) -> Self {
        Self::InvalidConfig(err.to_string())
    }
}

/// A specialized Result type for network operations.
pub type Result<T> = std::result::Result<T, NetworkError>;
