//! Unified error type for the skyduel crates.

#[cfg(feature = "client")]
use skyduel_client::ClientError;
use skyduel_protocol::ProtocolError;
use skyduel_room::{PersistError, SessionError};
use skyduel_sim::SimError;
use skyduel_transport::TransportError;

/// Wraps every crate-specific error so `?` works across layers.
#[derive(Debug, thiserror::Error)]
pub enum SkyduelError {
    /// Connection, send or receive failure.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Encode, decode or invalid message.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Room lookup, membership or lifecycle violation.
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Persist(#[from] PersistError),

    #[error(transparent)]
    Simulation(#[from] SimError),

    #[cfg(feature = "client")]
    #[error(transparent)]
    Client(#[from] ClientError),

    /// The first frame was not a valid handshake.
    #[error("handshake failed: {0}")]
    Handshake(String),
}
