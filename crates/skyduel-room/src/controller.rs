//! Session lifecycle controller: creates, routes to, and tears down
//! sessions.

use std::sync::{Arc, Weak};

use skyduel_protocol::{
    Field, GameMode, InputSample, MatchRecord, PlayerAddress, PlayerPublicState, RoomCode,
    RoomSnapshot, SharedSnapshot, SlotInfo,
};
use tokio::sync::{Mutex, mpsc, watch};
use tracing::{debug, info};

use crate::persist::spawn_persister;
use crate::session::{Reaped, spawn_session};
use crate::{
    Departure, InputOutcome, MatchStore, SessionConfig, SessionError, SessionHandle,
    SessionStore,
};

struct Inner<M> {
    sessions: Arc<Mutex<SessionStore>>,
    config: SessionConfig,
    records: mpsc::UnboundedSender<MatchRecord>,
    reaper: mpsc::UnboundedSender<Reaped>,
    match_store: Arc<M>,
}

/// Entry point for every session operation. Cheap to clone.
///
/// Must be created inside a Tokio runtime: construction spawns the match
/// persister and the reaper that removes sessions whose actor has exited.
pub struct SessionController<M: MatchStore> {
    inner: Arc<Inner<M>>,
}

impl<M: MatchStore> Clone for SessionController<M> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Removes reaped sessions from the store. Holds the store weakly so the
/// store (and every actor) can go away with the controller.
fn spawn_reaper(sessions: Weak<Mutex<SessionStore>>) -> mpsc::UnboundedSender<Reaped> {
    let (tx, mut rx) = mpsc::unbounded_channel::<Reaped>();
    tokio::spawn(async move {
        while let Some(reaped) = rx.recv().await {
            let Some(sessions) = sessions.upgrade() else {
                break;
            };
            let removed = sessions
                .lock()
                .await
                .remove_generation(&reaped.room_code, reaped.generation);
            if removed {
                info!(room_code = %reaped.room_code, "session removed");
            }
        }
        debug!("session reaper stopped");
    });
    tx
}

impl<M: MatchStore> SessionController<M> {
    pub fn new(config: SessionConfig, match_store: M) -> Self {
        let match_store = Arc::new(match_store);
        let records = spawn_persister(Arc::clone(&match_store), config.save_retry_delay);
        let sessions = Arc::new(Mutex::new(SessionStore::new()));
        let reaper = spawn_reaper(Arc::downgrade(&sessions));
        Self {
            inner: Arc::new(Inner {
                sessions,
                config,
                records,
                reaper,
                match_store,
            }),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    pub fn match_store(&self) -> &M {
        &self.inner.match_store
    }

    /// The handle of a live session.
    pub async fn session(&self, code: &RoomCode) -> Result<SessionHandle, SessionError> {
        self.inner
            .sessions
            .lock()
            .await
            .get(code)
            .cloned()
            .ok_or_else(|| SessionError::RoomNotFound(code.clone()))
    }

    pub async fn session_count(&self) -> usize {
        self.inner.sessions.lock().await.len()
    }

    /// Creates a session under a fresh random code with `host` in the host
    /// slot. Solo sessions start playing immediately.
    pub async fn create_session(
        &self,
        mode: GameMode,
        host: SlotInfo,
    ) -> Result<RoomCode, SessionError> {
        let address = host.address.clone();
        let handle = {
            let mut store = self.inner.sessions.lock().await;
            let code = store.allocate_code(&mut rand::rng());
            let handle = spawn_session(
                code,
                mode,
                host,
                &self.inner.config,
                self.inner.records.clone(),
                self.inner.reaper.clone(),
            );
            store.insert(handle.clone());
            handle
        };
        let code = handle.room_code().clone();
        info!(room_code = %code, ?mode, host = %address, "room created");

        if mode == GameMode::Solo {
            if let Err(e) = handle.start(None).await {
                self.teardown(&code).await.ok();
                return Err(e);
            }
        }
        Ok(code)
    }

    pub async fn join_session(
        &self,
        code: &RoomCode,
        guest: SlotInfo,
    ) -> Result<RoomSnapshot, SessionError> {
        self.session(code).await?.join(guest).await
    }

    pub async fn set_ready(
        &self,
        code: &RoomCode,
        address: PlayerAddress,
        ready: bool,
    ) -> Result<RoomSnapshot, SessionError> {
        self.session(code).await?.set_ready(address, ready).await
    }

    pub async fn start_simulation(
        &self,
        code: &RoomCode,
        field: Option<Field>,
    ) -> Result<RoomSnapshot, SessionError> {
        self.session(code).await?.start(field).await
    }

    pub async fn stop_simulation(
        &self,
        code: &RoomCode,
        reason: &str,
    ) -> Result<RoomSnapshot, SessionError> {
        self.session(code).await?.stop(reason).await
    }

    pub async fn get_room(&self, code: &RoomCode) -> Result<RoomSnapshot, SessionError> {
        self.session(code).await?.room().await
    }

    /// Removes a player. A host leaving a waiting room closes it.
    pub async fn leave(
        &self,
        code: &RoomCode,
        address: PlayerAddress,
    ) -> Result<Departure, SessionError> {
        let handle = self.session(code).await?;
        let departure = handle.leave(address).await?;
        if departure == Departure::Closed {
            self.inner
                .sessions
                .lock()
                .await
                .remove_generation(code, handle.generation());
        }
        Ok(departure)
    }

    /// Removes the session from the store and stops its actor, releasing
    /// its world and tick loop.
    pub async fn teardown(&self, code: &RoomCode) -> Result<(), SessionError> {
        let handle = self
            .inner
            .sessions
            .lock()
            .await
            .remove(code)
            .ok_or_else(|| SessionError::RoomNotFound(code.clone()))?;
        // An actor that already exited is as torn down as it gets.
        handle.shutdown().await.ok();
        info!(room_code = %code, "session torn down");
        Ok(())
    }

    /// Routes input for whoever sits at `address`. Unknown rooms, unknown
    /// senders and finished sessions yield [`InputOutcome::Stale`].
    pub async fn submit_input(
        &self,
        code: &RoomCode,
        address: &PlayerAddress,
        sample: InputSample,
    ) -> InputOutcome {
        match self.session(code).await {
            Ok(handle) => handle.submit_from(address, sample),
            Err(_) => {
                debug!(room_code = %code, %address, "input for unknown room dropped");
                InputOutcome::Stale
            }
        }
    }

    pub async fn push_self_state(
        &self,
        code: &RoomCode,
        address: PlayerAddress,
        state: PlayerPublicState,
    ) -> Result<(), SessionError> {
        self.session(code)
            .await?
            .push_self_state(address, state)
            .await
    }

    pub async fn other_players(
        &self,
        code: &RoomCode,
        address: PlayerAddress,
    ) -> Result<Vec<PlayerPublicState>, SessionError> {
        self.session(code).await?.other_players(address).await
    }

    pub async fn snapshot(&self, code: &RoomCode) -> Result<SharedSnapshot, SessionError> {
        Ok(self.session(code).await?.latest())
    }

    pub async fn subscribe(
        &self,
        code: &RoomCode,
    ) -> Result<watch::Receiver<SharedSnapshot>, SessionError> {
        Ok(self.session(code).await?.subscribe())
    }

    /// Stops every session.
    pub async fn shutdown(&self) {
        let handles = self.inner.sessions.lock().await.drain();
        let count = handles.len();
        for handle in handles {
            handle.shutdown().await.ok();
        }
        info!(sessions = count, "session controller shut down");
    }
}
