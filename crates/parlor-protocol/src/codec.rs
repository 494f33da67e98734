//! Codec trait and implementations for serializing/deserializing events.
//!
//! The server only ever needs two directions: inbound frames decode into
//! [`ClientEvent`](crate::ClientEvent), outbound
//! [`ServerEvent`](crate::ServerEvent)s encode into text frames. The codec
//! is generic so tests can decode server events and encode client events
//! with the same type.

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// A codec that turns values into text frames and bytes back into values.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into one text frame.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails.
    fn encode<T: Serialize>(&self, value: &T) -> Result<String, ProtocolError>;

    /// Deserializes a received frame.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed or do
    /// not match the expected type.
    fn decode<T: DeserializeOwned>(
        &self,
        data: &[u8],
    ) -> Result<T, ProtocolError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that uses JSON (via `serde_json`).
///
/// ## Example
///
/// ```rust
/// use parlor_protocol::{ClientEvent, Codec, JsonCodec};
///
/// let codec = JsonCodec;
/// let event: ClientEvent = codec.decode(br#"{"event":"login","data":"alice"}"#).unwrap();
/// assert_eq!(event, ClientEvent::Login("alice".into()));
///
/// let frame = codec.encode(&event).unwrap();
/// assert_eq!(frame, r#"{"event":"login","data":"alice"}"#);
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<String, ProtocolError> {
        serde_json::to_string(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(
        &self,
        data: &[u8],
    ) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}
