//! The poll board: the latest self-reported state of each slot.

use skyduel_protocol::{PlayerPublicState, Slot};

/// Latest [`PlayerPublicState`] per slot, ordered by `(tick, timestamp)`.
#[derive(Debug, Default, Clone)]
pub struct PollBoard {
    slots: [Option<PlayerPublicState>; 2],
}

impl PollBoard {
    /// Stores `state` unless the slot already holds one that is not older.
    /// Returns whether it was stored.
    pub fn post(&mut self, state: PlayerPublicState) -> bool {
        let entry = &mut self.slots[state.slot.index()];
        if entry.as_ref().is_some_and(|held| !state.is_newer_than(held)) {
            return false;
        }
        *entry = Some(state);
        true
    }

    pub fn get(&self, slot: Slot) -> Option<&PlayerPublicState> {
        self.slots[slot.index()].as_ref()
    }

    pub fn clear(&mut self, slot: Slot) {
        self.slots[slot.index()] = None;
    }

    /// Everything the board knows about slots other than `me`.
    pub fn others(&self, me: Slot) -> Vec<PlayerPublicState> {
        self.get(me.other()).cloned().into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use skyduel_protocol::PlayerAddress;

    use super::*;

    fn state(slot: Slot, tick: u64, x: f32) -> PlayerPublicState {
        stamped(slot, tick, 0, x)
    }

    fn stamped(slot: Slot, tick: u64, timestamp: u64, x: f32) -> PlayerPublicState {
        PlayerPublicState {
            slot,
            address: PlayerAddress::new(slot.to_string()),
            tick,
            timestamp,
            x,
            y: 0.0,
            health: 100,
            score: 0,
            coins: 0,
            alive: true,
            inputs: Vec::new(),
        }
    }

    #[test]
    fn test_post_keeps_newest_tick() {
        let mut board = PollBoard::default();
        assert!(board.post(state(Slot::Guest, 5, 1.0)));
        assert!(!board.post(state(Slot::Guest, 5, 2.0)));
        assert!(!board.post(state(Slot::Guest, 4, 3.0)));
        assert!(board.post(state(Slot::Guest, 6, 4.0)));
        assert_eq!(board.get(Slot::Guest).unwrap().x, 4.0);
    }

    #[test]
    fn test_lobby_reports_at_same_tick_advance_by_timestamp() {
        let mut board = PollBoard::default();
        assert!(board.post(stamped(Slot::Host, 0, 1_000, 1.0)));
        assert!(board.post(stamped(Slot::Host, 0, 1_050, 2.0)));
        assert!(!board.post(stamped(Slot::Host, 0, 1_020, 3.0)));
        // The first in-game report wins over any lobby timestamp.
        assert!(board.post(stamped(Slot::Host, 1, 0, 4.0)));
        assert_eq!(board.get(Slot::Host).unwrap().x, 4.0);
    }

    #[test]
    fn test_others_excludes_self() {
        let mut board = PollBoard::default();
        board.post(state(Slot::Host, 1, 0.0));
        assert!(board.others(Slot::Host).is_empty());
        assert_eq!(board.others(Slot::Guest).len(), 1);
        board.clear(Slot::Host);
        assert!(board.others(Slot::Guest).is_empty());
    }
}
