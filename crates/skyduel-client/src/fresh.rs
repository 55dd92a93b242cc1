//! Freshness gate for updates arriving from two independent paths.

use skyduel_protocol::{PlayerPublicState, Snapshot};

/// Admits only updates newer than what has already been applied.
///
/// Push and poll may deliver the same snapshot, or deliver out of order;
/// the gate makes applying them idempotent. Snapshots are ordered by their
/// tick, peer reports per slot by `(tick, timestamp)`.
#[derive(Debug, Default, Clone)]
pub struct FreshnessGate {
    snapshot_tick: Option<u64>,
    peer_keys: [Option<(u64, u64)>; 2],
}

impl FreshnessGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records and admits `snapshot` if its tick is strictly newer.
    pub fn admit_snapshot(&mut self, snapshot: &Snapshot) -> bool {
        admit(&mut self.snapshot_tick, snapshot.tick)
    }

    pub fn admit_peer(&mut self, peer: &PlayerPublicState) -> bool {
        admit(
            &mut self.peer_keys[peer.slot.index()],
            (peer.tick, peer.timestamp),
        )
    }

    /// Tick of the last admitted snapshot.
    pub fn last_snapshot_tick(&self) -> Option<u64> {
        self.snapshot_tick
    }
}

fn admit<K: Ord + Copy>(last: &mut Option<K>, key: K) -> bool {
    if last.is_some_and(|last| key <= last) {
        return false;
    }
    *last = Some(key);
    true
}

#[cfg(test)]
mod tests {
    use skyduel_protocol::{
        Authority, Field, PlayerAddress, RoomCode, SessionStatus, Slot,
    };

    use super::*;

    fn snapshot(tick: u64) -> Snapshot {
        Snapshot {
            room_code: RoomCode::parse("123456").unwrap(),
            tick,
            time_ms: tick * 16,
            status: SessionStatus::Playing,
            authority: Authority::Server,
            field: Field::default(),
            players: [None, None],
            enemies: vec![],
            projectiles: vec![],
            enemy_bullets: vec![],
            power_ups: vec![],
            coins: vec![],
            lasers: vec![],
        }
    }

    fn peer(slot: Slot, tick: u64) -> PlayerPublicState {
        peer_at(slot, tick, 0)
    }

    fn peer_at(slot: Slot, tick: u64, timestamp: u64) -> PlayerPublicState {
        PlayerPublicState {
            slot,
            address: PlayerAddress::new("peer"),
            tick,
            timestamp,
            x: 0.0,
            y: 0.0,
            health: 100,
            score: 0,
            coins: 0,
            alive: true,
            inputs: Vec::new(),
        }
    }

    #[test]
    fn test_snapshot_ticks_must_increase() {
        let mut gate = FreshnessGate::new();
        assert!(gate.admit_snapshot(&snapshot(0)));
        assert!(!gate.admit_snapshot(&snapshot(0)));
        assert!(gate.admit_snapshot(&snapshot(5)));
        assert!(!gate.admit_snapshot(&snapshot(4)));
        assert!(gate.admit_snapshot(&snapshot(6)));
        assert_eq!(gate.last_snapshot_tick(), Some(6));
    }

    #[test]
    fn test_peer_ticks_are_per_slot() {
        let mut gate = FreshnessGate::new();
        assert!(gate.admit_peer(&peer(Slot::Guest, 10)));
        assert!(!gate.admit_peer(&peer(Slot::Guest, 9)));
        assert!(gate.admit_peer(&peer(Slot::Host, 1)));
        assert!(gate.admit_peer(&peer(Slot::Guest, 11)));
    }

    #[test]
    fn test_peer_reports_within_one_tick_order_by_timestamp() {
        let mut gate = FreshnessGate::new();
        assert!(gate.admit_peer(&peer_at(Slot::Guest, 0, 1_000)));
        assert!(gate.admit_peer(&peer_at(Slot::Guest, 0, 1_016)));
        assert!(!gate.admit_peer(&peer_at(Slot::Guest, 0, 1_016)));
        assert!(gate.admit_peer(&peer_at(Slot::Guest, 4, 900)));
        assert!(!gate.admit_peer(&peer_at(Slot::Guest, 0, 5_000)));
    }

    #[test]
    fn test_peer_and_snapshot_orders_are_independent() {
        let mut gate = FreshnessGate::new();
        assert!(gate.admit_snapshot(&snapshot(100)));
        assert!(gate.admit_peer(&peer(Slot::Guest, 3)));
    }
}
