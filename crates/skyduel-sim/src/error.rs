/// Errors raised when a world cannot be built from its configuration.
///
/// Once built, a world never fails: [`World::step`](crate::World::step)
/// has no error path.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    /// Neither slot is populated.
    #[error("a world needs at least one player")]
    NoPlayers,

    /// The field cannot hold a single ship.
    #[error("field {width}x{height} is smaller than a ship ({ship_size})")]
    FieldTooSmall {
        width: f32,
        height: f32,
        ship_size: f32,
    },

    /// A zero tick length would freeze simulation time.
    #[error("tick length must be at least 1 ms")]
    ZeroTick,
}
