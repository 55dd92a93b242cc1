//! `SkyduelServer` builder and accept loop.
//!
//! Ties the layers together: transport → protocol → session controller.
//! Push and poll clients connect to the same listener; what a connection
//! asks for decides which path it is.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use skyduel_protocol::{Codec, JsonCodec};
use skyduel_room::{MatchStore, SessionConfig, SessionController};
use skyduel_transport::{Transport, WebSocketTransport};

use crate::handler::handle_connection;
use crate::{ServerConfig, SkyduelError};

/// Shared by every connection task.
pub(crate) struct ServerState<M: MatchStore, C: Codec> {
    pub(crate) controller: SessionController<M>,
    pub(crate) codec: C,
    pub(crate) handshake_timeout: Duration,
    pub(crate) idle_timeout: Duration,
}

/// Configures and binds a [`SkyduelServer`].
///
/// ```rust,no_run
/// use skyduel::prelude::*;
///
/// # async fn demo() -> Result<(), SkyduelError> {
/// let server = SkyduelServerBuilder::new()
///     .bind("0.0.0.0:8080")
///     .build(MemoryMatchStore::new())
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct SkyduelServerBuilder {
    config: ServerConfig,
}

impl SkyduelServerBuilder {
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
        }
    }

    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind_addr = addr.to_string();
        self
    }

    pub fn session_config(mut self, config: SessionConfig) -> Self {
        self.config.session = config;
        self
    }

    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.config.handshake_timeout = timeout;
        self
    }

    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.config.idle_timeout = timeout;
        self
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Binds the listener and starts the session controller, saving
    /// finished matches to `match_store`. Uses [`JsonCodec`].
    pub async fn build<M: MatchStore>(
        self,
        match_store: M,
    ) -> Result<SkyduelServer<M, JsonCodec>, SkyduelError> {
        let transport = WebSocketTransport::bind(&self.config.bind_addr).await?;
        let state = Arc::new(ServerState {
            controller: SessionController::new(self.config.session, match_store),
            codec: JsonCodec,
            handshake_timeout: self.config.handshake_timeout,
            idle_timeout: self.config.idle_timeout,
        });
        Ok(SkyduelServer { transport, state })
    }
}

impl Default for SkyduelServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound server. Call [`run`](Self::run) to start accepting.
pub struct SkyduelServer<M: MatchStore, C: Codec> {
    transport: WebSocketTransport,
    state: Arc<ServerState<M, C>>,
}

impl<M, C> SkyduelServer<M, C>
where
    M: MatchStore,
    C: Codec + Clone,
{
    pub fn builder() -> SkyduelServerBuilder {
        SkyduelServerBuilder::new()
    }

    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// The controller behind this server, for in-process inspection.
    pub fn controller(&self) -> &SessionController<M> {
        &self.state.controller
    }

    /// Accepts connections until the process ends.
    pub async fn run(self) -> Result<(), SkyduelError> {
        self.run_until(std::future::pending()).await
    }

    /// Accepts connections until `signal` resolves, then stops every
    /// session.
    pub async fn run_until(mut self, signal: impl Future<Output = ()>) -> Result<(), SkyduelError> {
        tracing::info!(addr = ?self.local_addr().ok(), "skyduel server running");
        tokio::pin!(signal);

        loop {
            tokio::select! {
                accepted = self.transport.accept() => match accepted {
                    Ok(conn) => {
                        let state = Arc::clone(&self.state);
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(conn, state).await {
                                tracing::debug!(error = %e, "connection ended with error");
                            }
                        });
                    }
                    Err(e) => tracing::error!(error = %e, "accept failed"),
                },
                () = &mut signal => break,
            }
        }

        self.transport.shutdown().await.ok();
        self.state.controller.shutdown().await;
        tracing::info!("skyduel server stopped");
        Ok(())
    }
}
