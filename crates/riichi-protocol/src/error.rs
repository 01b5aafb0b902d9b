//! Error types for the protocol layer.
//!
//! A `ProtocolError` always means the bytes could not be turned into a
//! message (or back). It never says anything about whether the message
//! made sense for the game; that is the rules layer's job.

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed.
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// The bytes were not valid JSON, or the JSON did not match any
    /// message: unknown tag, missing `data`, or a payload that does not
    /// fit the tag.
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// Decoded fine but breaks a protocol rule, e.g. an empty name in
    /// the handshake.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
