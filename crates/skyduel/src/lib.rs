//! # Skyduel
//!
//! Real-time session server for a two-player space shooter.
//!
//! The server owns one authoritative simulation per room and delivers its
//! snapshots two ways: a push stream for subscribed connections and a
//! request/response poll path for clients that cannot keep one open.
//! Clients predict their own ship and reconcile against the snapshots
//! (see `skyduel-client`, re-exported under the `client` feature).
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use skyduel::prelude::*;
//!
//! # async fn demo() -> Result<(), SkyduelError> {
//! let server = SkyduelServerBuilder::new()
//!     .bind("0.0.0.0:8080")
//!     .build(MemoryMatchStore::new())
//!     .await?;
//! server.run().await
//! # }
//! ```

mod config;
mod error;
mod handler;
mod server;

pub use config::ServerConfig;
pub use error::SkyduelError;
pub use server::{SkyduelServer, SkyduelServerBuilder};

pub use skyduel_protocol as protocol;
pub use skyduel_room as room;
pub use skyduel_sim as sim;
pub use skyduel_tick as tick;
pub use skyduel_transport as transport;

#[cfg(feature = "client")]
pub use skyduel_client as client;

/// The types most servers and clients need.
pub mod prelude {
    pub use crate::{ServerConfig, SkyduelError, SkyduelServer, SkyduelServerBuilder};

    pub use skyduel_protocol::{
        Field, GameMode, InputSample, MatchRecord, PlayerAddress, RoomCode, RoomSnapshot,
        SessionStatus, ShipStats, ShipTier, Slot, SlotInfo, Snapshot,
    };
    pub use skyduel_room::{
        MatchStore, MemoryMatchStore, NoopMatchStore, PersistError, SessionConfig,
        SessionController, SessionError,
    };
    pub use skyduel_tick::{TickConfig, TickPolicy};

    #[cfg(feature = "client")]
    pub use skyduel_client::{
        AuthorityMode, ClientConfig, ClientDriver, ClientError, ClientView, DriverHandle,
        Intent, Link,
    };
}
