//! Session layer for skyduel.
//!
//! Every room runs as its own Tokio task (actor model) that owns the
//! roster, the lifecycle state machine and, while playing, the
//! authoritative [`World`](skyduel_sim::World) with its tick loop.
//!
//! ```text
//! waiting ──(all ready | solo)──▶ playing ──(all down | stop)──▶ finished ──(grace)──▶ removed
//! ```
//!
//! # Key types
//!
//! - [`SessionController`]: creates sessions, routes operations, tears down
//! - [`SessionHandle`]: talks to one running session actor
//! - [`SessionStore`]: the live sessions by room code
//! - [`InputCells`]: per-slot bounded input queues, written without the actor
//! - [`MatchStore`]: where finished matches are saved
//! - [`SessionConfig`]: tick period, field, grace periods

mod board;
mod config;
mod controller;
mod error;
mod input;
mod persist;
mod session;
mod store;

pub use board::PollBoard;
pub use config::SessionConfig;
pub use controller::SessionController;
pub use error::{PersistError, SessionError};
pub use input::{DEFAULT_INPUT_BACKLOG, InputCell, InputCells, InputOutcome};
pub use persist::{MatchStore, MemoryMatchStore, NoopMatchStore};
pub use session::{Departure, SessionHandle};
pub use store::SessionStore;
