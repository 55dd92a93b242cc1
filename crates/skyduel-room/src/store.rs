//! The session store: every live session, keyed by room code.

use std::collections::HashMap;

use rand::Rng;
use skyduel_protocol::RoomCode;

use crate::SessionHandle;

/// Active sessions by room code.
///
/// A room code maps to at most one session at a time. Codes are reused
/// only after their session is removed, so removal checks the session's
/// generation to avoid evicting a newer session that took the same code.
#[derive(Default)]
pub struct SessionStore {
    sessions: HashMap<RoomCode, SessionHandle>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Draws random codes until one is free.
    pub fn allocate_code<R: Rng + ?Sized>(&self, rng: &mut R) -> RoomCode {
        loop {
            let code = RoomCode::random(rng);
            if !self.sessions.contains_key(&code) {
                return code;
            }
        }
    }

    /// Registers a session. Returns `false` if the code is taken.
    pub fn insert(&mut self, handle: SessionHandle) -> bool {
        if self.sessions.contains_key(handle.room_code()) {
            return false;
        }
        self.sessions.insert(handle.room_code().clone(), handle);
        true
    }

    pub fn get(&self, code: &RoomCode) -> Option<&SessionHandle> {
        self.sessions.get(code)
    }

    pub fn remove(&mut self, code: &RoomCode) -> Option<SessionHandle> {
        self.sessions.remove(code)
    }

    /// Removes `code` only if it still belongs to session `generation`.
    pub fn remove_generation(&mut self, code: &RoomCode, generation: u64) -> bool {
        if self
            .sessions
            .get(code)
            .is_some_and(|h| h.generation() == generation)
        {
            self.sessions.remove(code);
            return true;
        }
        false
    }

    pub fn contains(&self, code: &RoomCode) -> bool {
        self.sessions.contains_key(code)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn codes(&self) -> Vec<RoomCode> {
        self.sessions.keys().cloned().collect()
    }

    /// Empties the store, returning every handle.
    pub fn drain(&mut self) -> Vec<SessionHandle> {
        self.sessions.drain().map(|(_, h)| h).collect()
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use skyduel_protocol::{GameMode, PlayerAddress, ShipStats, SlotInfo};
    use tokio::sync::mpsc;

    use super::*;
    use crate::SessionConfig;
    use crate::session::spawn_session;

    fn spawn(code: &str) -> SessionHandle {
        let host = SlotInfo {
            address: PlayerAddress::new("host"),
            ship: ShipStats::default(),
        };
        spawn_session(
            RoomCode::parse(code).unwrap(),
            GameMode::Versus,
            host,
            &SessionConfig::default(),
            mpsc::unbounded_channel().0,
            mpsc::unbounded_channel().0,
        )
    }

    #[tokio::test]
    async fn test_insert_rejects_taken_code() {
        let mut store = SessionStore::new();
        assert!(store.insert(spawn("111111")));
        assert!(!store.insert(spawn("111111")));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_remove_generation_ignores_newer_session() {
        let mut store = SessionStore::new();
        let old = spawn("222222");
        let old_generation = old.generation();
        store.insert(old);
        store.remove(&RoomCode::parse("222222").unwrap());

        let newer = spawn("222222");
        store.insert(newer);
        let code = RoomCode::parse("222222").unwrap();
        assert!(!store.remove_generation(&code, old_generation));
        assert!(store.contains(&code));
        let current = store.get(&code).unwrap().generation();
        assert!(store.remove_generation(&code, current));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_allocate_code_skips_taken_codes() {
        let mut store = SessionStore::new();
        let mut rng = StdRng::seed_from_u64(3);
        let first = store.allocate_code(&mut rng);
        store.insert(spawn(first.as_str()));

        let mut rng = StdRng::seed_from_u64(3);
        let second = store.allocate_code(&mut rng);
        assert_ne!(first, second);
        assert_eq!(store.codes(), vec![first]);
    }
}
