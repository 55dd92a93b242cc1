//! Server configuration.

use std::time::Duration;

use skyduel_room::SessionConfig;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    /// How long a new connection may take to send its handshake.
    pub handshake_timeout: Duration,
    /// A connection silent for this long is closed.
    pub idle_timeout: Duration,
    pub session: SessionConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            handshake_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(15),
            session: SessionConfig::default(),
        }
    }
}
