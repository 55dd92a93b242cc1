//! Error types for the protocol layer.

/// Errors raised while encoding, decoding or validating wire data.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed.
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed: malformed bytes, missing fields, or an
    /// unknown message tag.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The message decoded but breaks a protocol rule (for example a
    /// server message arriving where a client message was expected).
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// A room code that is not exactly six ASCII digits.
    #[error("invalid room code {0:?}: expected 6 digits")]
    InvalidRoomCode(String),
}
