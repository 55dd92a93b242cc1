//! Wire protocol for skyduel.
//!
//! This crate is the vocabulary shared by the simulator, the server and the
//! clients:
//!
//! - **Identity** ([`RoomCode`], [`Slot`], [`PlayerAddress`])
//! - **Data model** ([`Snapshot`], [`PlayerState`], [`InputSample`], the
//!   entity types, [`RoomSnapshot`], [`MatchRecord`])
//! - **Messages** ([`Envelope`], [`ClientMessage`], [`ServerMessage`])
//! - **Codec** ([`Codec`], [`JsonCodec`])
//!
//! It knows nothing about connections, tasks or sessions.
//!
//! ```text
//! Transport (bytes) → Protocol (Envelope) → Room (session actor)
//! ```

mod codec;
mod error;
mod ids;
mod message;
mod model;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use ids::{PlayerAddress, RoomCode, Slot};
pub use message::{Channel, ClientMessage, Envelope, PROTOCOL_VERSION, Payload, ServerMessage};
pub use model::{
    Authority, Coin, Enemy, EnemyBullet, EnemyKind, Field, GameMode, InputSample, Laser,
    MatchRecord, PlayerPublicState, PlayerState, PowerUp, PowerUpKind, PowerUps, Projectile,
    RoomSnapshot, SessionStatus, SharedSnapshot, ShipStats, ShipTier, SlotInfo, Snapshot,
    unix_millis,
};
