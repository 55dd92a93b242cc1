//! Error types for the session layer.

use skyduel_protocol::{GameMode, PlayerAddress, RoomCode};
use skyduel_sim::SimError;

/// Errors returned by session operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// No session with this code exists.
    #[error("room {0} not found")]
    RoomNotFound(RoomCode),

    /// The guest slot is taken by someone else.
    #[error("room {0} is full")]
    RoomFull(RoomCode),

    /// The session left `waiting`; its roster is frozen.
    #[error("room {0} is already playing")]
    AlreadyPlaying(RoomCode),

    /// The room's mode does not take a guest.
    #[error("room {0} is a {1:?} room and does not accept guests")]
    WrongMode(RoomCode, GameMode),

    /// The host tried to join their own room as guest.
    #[error("the host of room {0} cannot join it as guest")]
    HostCannotJoin(RoomCode),

    /// The address holds no slot in this room.
    #[error("{0} is not in room {1}")]
    NotInRoom(PlayerAddress, RoomCode),

    /// The operation needs a running simulation.
    #[error("room {0} is not playing")]
    NotPlaying(RoomCode),

    /// The session is finished; nothing can restart it.
    #[error("room {0} is finished")]
    Finished(RoomCode),

    /// The session actor is gone or its command queue is closed.
    #[error("room {0} is unavailable")]
    Unavailable(RoomCode),

    /// The world could not be built (for example, a field smaller than
    /// a ship).
    #[error("cannot start simulation: {0}")]
    Simulation(#[from] SimError),
}

impl SessionError {
    /// Wire error code, following HTTP conventions.
    pub fn code(&self) -> u16 {
        match self {
            Self::RoomNotFound(_) => 404,
            Self::RoomFull(_) | Self::AlreadyPlaying(_) => 409,
            Self::WrongMode(..) | Self::HostCannotJoin(_) | Self::Simulation(_) => 400,
            Self::NotInRoom(..) => 403,
            Self::NotPlaying(_) => 409,
            Self::Finished(_) => 410,
            Self::Unavailable(_) => 503,
        }
    }
}

/// Errors raised by a [`MatchStore`](crate::MatchStore) backend.
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    /// The backend refused the record.
    #[error("match store rejected record: {0}")]
    Rejected(String),

    /// The backend could not be reached.
    #[error("match store unavailable: {0}")]
    Unavailable(String),
}
