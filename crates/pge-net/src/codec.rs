//! Wire codecs for session payloads.
//!
//! A session never serializes values on its own: the application picks a
//! [`Codec`] and that codec defines the wire format. Two codecs ship with the
//! crate:
//!
//! - [`JsonCodec`]: any `serde` type, encoded as JSON
//! - [`BytesCodec`]: raw bytes passed through unchanged
//!
//! # Example
//!
//! ```ignore
//! use pge_net::codec::{Codec, JsonCodec, Packet};
//!
//! #[derive(Clone, serde::Serialize, serde::Deserialize)]
//! struct Position { x: i32, y: i32 }
//!
//! let codec = JsonCodec::<Position>::new();
//! let bytes = codec.encode(Packet::Data(&Position { x: 1, y: 2 }))?;
//! let packet = codec.decode(&bytes)?;
//! ```

use std::fmt;
use std::marker::PhantomData;

use bytes::Bytes;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::Result;

/// The reserved sentinel a client sends until the server first replies.
pub const PROBE: &str = "CONNECTING";

/// JSON encoding of [`PROBE`].
const JSON_PROBE: &[u8] = b"\"CONNECTING\"";

/// A session-level message: either the connection probe or an application
/// value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Packet<T> {
    /// The pre-connection probe.
    Probe,
    /// An application payload.
    Data(T),
}

impl<T> Packet<T> {
    /// Borrow the payload.
    pub fn as_ref(&self) -> Packet<&T> {
        match self {
            Packet::Probe => Packet::Probe,
            Packet::Data(value) => Packet::Data(value),
        }
    }

    /// Whether this is the probe.
    pub fn is_probe(&self) -> bool {
        matches!(self, Packet::Probe)
    }

    /// The application payload, if any.
    pub fn into_data(self) -> Option<T> {
        match self {
            Packet::Probe => None,
            Packet::Data(value) => Some(value),
        }
    }
}

/// Serializes session packets to and from datagram payloads.
///
/// `decode` must accept everything `encode` produces, including the probe.
/// Malformed input is reported as [`NetworkError::Codec`](crate::NetworkError::Codec).
pub trait Codec: Send + Sync + 'static {
    /// The application value exchanged over the session.
    type Value: Clone + Send + Sync + 'static;

    /// Encode a packet.
    fn encode(&self, packet: Packet<&Self::Value>) -> Result<Vec<u8>>;

    /// Decode a datagram payload.
    fn decode(&self, bytes: &[u8]) -> Result<Packet<Self::Value>>;
}

/// JSON codec for any `serde` type.
///
/// The probe is the JSON string `"CONNECTING"`. A `T` whose encoding is that
/// same string cannot be told apart from the probe and decodes as
/// [`Packet::Probe`].
pub struct JsonCodec<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonCodec<T> {
    /// Create a JSON codec.
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for JsonCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for JsonCodec<T> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for JsonCodec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonCodec")
            .field("value", &std::any::type_name::<T>())
            .finish()
    }
}

impl<T> Codec for JsonCodec<T>
where
    T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    type Value = T;

    fn encode(&self, packet: Packet<&T>) -> Result<Vec<u8>> {
        match packet {
            Packet::Probe => Ok(JSON_PROBE.to_vec()),
            Packet::Data(value) => Ok(serde_json::to_vec(value)?),
        }
    }

    fn decode(&self, bytes: &[u8]) -> Result<Packet<T>> {
        if bytes == JSON_PROBE {
            return Ok(Packet::Probe);
        }
        Ok(Packet::Data(serde_json::from_slice(bytes)?))
    }
}

/// Pass-through codec for raw byte payloads.
///
/// The probe is the ASCII text `CONNECTING`; a payload with exactly those
/// bytes decodes as [`Packet::Probe`].
#[derive(Clone, Copy, Debug, Default)]
pub struct BytesCodec;

impl Codec for BytesCodec {
    type Value = Bytes;

    fn encode(&self, packet: Packet<&Bytes>) -> Result<Vec<u8>> {
        match packet {
            Packet::Probe => Ok(PROBE.as_bytes().to_vec()),
            Packet::Data(value) => Ok(value.to_vec()),
        }
    }

    fn decode(&self, bytes: &[u8]) -> Result<Packet<Bytes>> {
        if bytes == PROBE.as_bytes() {
            return Ok(Packet::Probe);
        }
        Ok(Packet::Data(Bytes::copy_from_slice(bytes)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NetworkError;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    struct Position {
        x: i32,
        y: i32,
    }

    #[test]
    fn test_json_probe_round_trip() {
        let codec = JsonCodec::<serde_json::Value>::new();
        let bytes = codec.encode(Packet::Probe).unwrap();
        assert_eq!(bytes, b"\"CONNECTING\"");
        assert_eq!(codec.decode(&bytes).unwrap(), Packet::Probe);
    }

    #[test]
    fn test_json_value_round_trip() {
        let codec = JsonCodec::<serde_json::Value>::new();
        let value = json!({"x": 1});
        let bytes = codec.encode(Packet::Data(&value)).unwrap();
        assert_eq!(codec.decode(&bytes).unwrap(), Packet::Data(value));
    }

    #[test]
    fn test_json_struct_round_trip() {
        let codec = JsonCodec::<Position>::new();
        let value = Position { x: -3, y: 7 };
        let bytes = codec.encode(Packet::Data(&value)).unwrap();
        assert_eq!(codec.decode(&bytes).unwrap(), Packet::Data(value));
    }

    #[test]
    fn test_json_probe_decodes_for_struct_values() {
        // The probe must decode even when it is not a valid `T`.
        let codec = JsonCodec::<Position>::new();
        assert_eq!(codec.decode(b"\"CONNECTING\"").unwrap(), Packet::Probe);
    }

    #[test]
    fn test_json_malformed_is_codec_error() {
        let codec = JsonCodec::<Position>::new();
        let err = codec.decode(b"{not json").unwrap_err();
        assert!(matches!(err, NetworkError::Codec(_)));

        let err = codec.decode(br#"{"x": "one"}"#).unwrap_err();
        assert!(matches!(err, NetworkError::Codec(_)));
    }

    #[test]
    fn test_bytes_codec() {
        let codec = BytesCodec;
        let payload = Bytes::from_static(&[0, 1, 2, 255]);

        let bytes = codec.encode(Packet::Data(&payload)).unwrap();
        assert_eq!(bytes, vec![0, 1, 2, 255]);
        assert_eq!(codec.decode(&bytes).unwrap(), Packet::Data(payload));

        let probe = codec.encode(Packet::Probe).unwrap();
        assert_eq!(probe, b"CONNECTING");
        assert!(codec.decode(&probe).unwrap().is_probe());
    }

    #[test]
    fn test_packet_helpers() {
        let packet = Packet::Data(5);
        assert_eq!(packet.as_ref(), Packet::Data(&5));
        assert!(!packet.is_probe());
        assert_eq!(packet.into_data(), Some(5));
        assert_eq!(Packet::<i32>::Probe.into_data(), None);
    }
}
