//! Error types for the client crate.

use std::time::Duration;

use skyduel_protocol::ProtocolError;
use skyduel_transport::TransportError;

/// Errors raised by client links.
///
/// None of these are fatal to the driver: the push and poll tasks log them
/// and retry on their next reconnect or interval.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The underlying connection failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A frame could not be encoded or decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The server answered with an `Error` frame.
    #[error("server rejected request ({code}): {message}")]
    Rejected { code: u16, message: String },

    /// The server answered with something other than what was asked for.
    #[error("unexpected reply: {0}")]
    UnexpectedReply(String),

    /// No reply arrived in time.
    #[error("no reply within {0:?}")]
    Timeout(Duration),

    /// The server closed the connection.
    #[error("connection closed by server")]
    Closed,
}

impl ClientError {
    /// The wire error code, for [`ClientError::Rejected`].
    pub fn code(&self) -> Option<u16> {
        match self {
            Self::Rejected { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Returns `true` if the room is gone for good (not found or finished),
    /// so retrying against it is pointless.
    pub fn is_room_gone(&self) -> bool {
        matches!(self.code(), Some(404 | 410))
    }
}
