//! Local fallback simulation for the client's own ship.

use std::time::Duration;

use skyduel_protocol::{
    Authority, Field, GameMode, InputSample, PlayerState, RoomCode, ShipStats, Slot, SlotInfo,
    Snapshot,
};
use skyduel_sim::{SimConfig, SimError, Tuning, World};

/// A solo [`World`] holding only the local slot.
///
/// Used while the server is unreachable or the room is gone. Its snapshots
/// are marked [`Authority::Client`] and never leave the client.
pub struct LocalSim {
    world: World,
    slot: Slot,
}

impl LocalSim {
    pub fn new(
        room_code: RoomCode,
        slot: Slot,
        info: SlotInfo,
        field: Field,
        period: Duration,
    ) -> Result<Self, SimError> {
        let mut roster = [None, None];
        roster[slot.index()] = Some(info);
        let config = SimConfig {
            field,
            tick_ms: u64::try_from(period.as_millis()).unwrap_or(u64::MAX),
            seed: rand::random(),
            mode: GameMode::Solo,
            tuning: Tuning::default(),
        };
        let world = World::new(room_code, config, roster)?;
        Ok(Self { world, slot })
    }

    /// Starts a local world that continues from `state`: same position,
    /// health, score and coins.
    pub fn handover(
        room_code: RoomCode,
        state: &PlayerState,
        field: Field,
        period: Duration,
    ) -> Result<Self, SimError> {
        let info = SlotInfo {
            address: state.address.clone(),
            ship: state.ship,
        };
        let mut sim = Self::new(room_code, state.slot, info, field, period)?;
        sim.world.restore_player(state.slot, state);
        Ok(sim)
    }

    pub fn slot(&self) -> Slot {
        self.slot
    }

    pub fn ship(&self) -> Option<ShipStats> {
        self.world.player(self.slot).map(|p| p.ship)
    }

    pub fn step(&mut self, input: InputSample) -> Snapshot {
        let mut inputs = [None, None];
        inputs[self.slot.index()] = Some(input);
        let mut snapshot = self.world.step(inputs);
        snapshot.authority = Authority::Client;
        snapshot
    }
}
