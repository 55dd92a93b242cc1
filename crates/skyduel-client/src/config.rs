//! Client configuration.

use std::time::Duration;

use skyduel_protocol::{PlayerAddress, RoomCode};

/// Settings for one client in one room.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server endpoint, `ws://host:port`.
    pub url: String,
    pub address: PlayerAddress,
    pub room_code: RoomCode,
    /// Period of the fixed logic loop.
    pub logic_period: Duration,
    pub poll_interval: Duration,
    /// Upper bound for each poll request.
    pub poll_timeout: Duration,
    /// Upper bound for handshakes and lobby requests.
    pub request_timeout: Duration,
    /// Prediction drift (in field units) beyond which the local ship snaps
    /// to the server position.
    pub reconcile_threshold: f32,
    /// First delay before a push reconnect; doubles up to
    /// [`MAX_RECONNECT_BACKOFF`].
    pub reconnect_backoff: Duration,
    /// How long the driver waits for a fresh server snapshot before it
    /// simulates locally.
    pub authority_timeout: Duration,
    pub push_enabled: bool,
    pub poll_enabled: bool,
}

/// Ceiling for the push reconnect delay.
pub const MAX_RECONNECT_BACKOFF: Duration = Duration::from_secs(5);

impl ClientConfig {
    pub fn new(url: impl Into<String>, address: PlayerAddress, room_code: RoomCode) -> Self {
        Self {
            url: url.into(),
            address,
            room_code,
            logic_period: Duration::from_millis(16),
            poll_interval: Duration::from_millis(50),
            poll_timeout: Duration::from_millis(500),
            request_timeout: Duration::from_secs(2),
            reconcile_threshold: 30.0,
            reconnect_backoff: Duration::from_millis(250),
            authority_timeout: Duration::from_secs(3),
            push_enabled: true,
            poll_enabled: true,
        }
    }

    pub fn push_only(mut self) -> Self {
        self.poll_enabled = false;
        self
    }

    pub fn poll_only(mut self) -> Self {
        self.push_enabled = false;
        self
    }

    /// The delay before reconnect attempt `attempt` (0-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.min(16)).unwrap_or(u32::MAX);
        self.reconnect_backoff
            .saturating_mul(factor)
            .min(MAX_RECONNECT_BACKOFF)
    }
}
