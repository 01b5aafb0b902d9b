//! Codec trait and the JSON implementation.
//!
//! The server only ever talks through a [`Codec`], so the byte format can
//! be swapped without touching the handler or the arena.

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// Converts messages to bytes and back.
///
/// `Send + Sync + 'static` so one codec can be shared by every
/// connection task.
pub trait Codec: Send + Sync + 'static {
    /// # Errors
    /// Returns [`ProtocolError::Encode`] if the value cannot be represented.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// # Errors
    /// Returns [`ProtocolError::Decode`] for malformed input or input that
    /// does not match `T`.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] backed by `serde_json`. Frames are UTF-8 JSON objects.
///
/// ```rust
/// use riichi_protocol::{Codec, JsonCodec, ServerMessage};
///
/// let codec = JsonCodec;
/// let bytes = codec.encode(&ServerMessage::ListArenas).unwrap();
/// assert_eq!(bytes, br#"{"message_type":7,"data":{}}"#);
/// let back: ServerMessage = codec.decode(&bytes).unwrap();
/// assert_eq!(back, ServerMessage::ListArenas);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}
