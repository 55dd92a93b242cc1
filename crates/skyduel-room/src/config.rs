//! Session configuration.

use std::time::Duration;

use skyduel_protocol::Field;
use skyduel_sim::Tuning;
use skyduel_tick::TickConfig;

use crate::input::DEFAULT_INPUT_BACKLOG;

/// Settings shared by every session a controller creates.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Simulation tick period. The simulator advances by this amount of
    /// game time per tick regardless of wall-clock jitter.
    pub tick_period: Duration,

    /// Playfield used when a start request carries no field.
    pub field: Field,

    /// Fixed world seed. `None` draws a fresh seed per session.
    pub seed: Option<u64>,

    /// How long a finished session stays queryable before it is removed.
    pub finish_grace: Duration,

    /// A waiting session with no commands for this long is removed.
    pub idle_timeout: Duration,

    /// Capacity of each session actor's command queue.
    pub command_buffer: usize,

    /// Delay before the single retry of a failed match save.
    pub save_retry_delay: Duration,

    /// Pending input samples queued per slot. Once full, the oldest is
    /// dropped.
    pub input_backlog: usize,

    /// Gameplay constants handed to every world.
    pub tuning: Tuning,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            tick_period: Duration::from_millis(16),
            field: Field::default(),
            seed: None,
            finish_grace: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            command_buffer: 64,
            save_retry_delay: Duration::from_secs(1),
            input_backlog: DEFAULT_INPUT_BACKLOG,
            tuning: Tuning::default(),
        }
    }
}

impl SessionConfig {
    /// Simulation milliseconds per tick, never below one.
    pub fn tick_ms(&self) -> u64 {
        (self.tick_period.as_millis() as u64).max(1)
    }

    pub(crate) fn tick_config(&self) -> TickConfig {
        TickConfig::with_period(Duration::from_millis(self.tick_ms()))
    }
}
