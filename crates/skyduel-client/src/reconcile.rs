//! Client-side prediction and reconciliation against server snapshots.

use skyduel_protocol::{
    Authority, Coin, Enemy, EnemyBullet, Field, InputSample, Laser, PlayerPublicState,
    PlayerState, PowerUp, PowerUps, Projectile, RoomCode, SessionStatus, ShipStats, Slot,
    Snapshot,
};
use skyduel_sim::movement::step_position;
use skyduel_sim::Tuning;
use tracing::{debug, trace};

/// Default drift threshold, in field units.
pub const DEFAULT_THRESHOLD: f32 = 30.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReconcileConfig {
    pub threshold: f32,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

/// What a snapshot did to the local prediction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reconciliation {
    /// Distance between the predicted and the authoritative position.
    pub drift: f32,
    /// Whether the local ship was snapped to the server position.
    pub corrected: bool,
}

/// Everything a renderer needs for one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientView {
    pub local_slot: Slot,
    pub room_code: Option<RoomCode>,
    pub tick: u64,
    pub status: SessionStatus,
    pub authority: Authority,
    pub field: Field,
    /// Indexed by [`Slot::index`].
    pub players: [Option<PlayerState>; 2],
    pub enemies: Vec<Enemy>,
    pub projectiles: Vec<Projectile>,
    pub enemy_bullets: Vec<EnemyBullet>,
    pub power_ups: Vec<PowerUp>,
    pub coins: Vec<Coin>,
    pub lasers: Vec<Laser>,
}

impl ClientView {
    pub fn new(local_slot: Slot) -> Self {
        Self {
            local_slot,
            room_code: None,
            tick: 0,
            status: SessionStatus::Waiting,
            authority: Authority::Server,
            field: Field::default(),
            players: [None, None],
            enemies: Vec::new(),
            projectiles: Vec::new(),
            enemy_bullets: Vec::new(),
            power_ups: Vec::new(),
            coins: Vec::new(),
            lasers: Vec::new(),
        }
    }

    pub fn local(&self) -> Option<&PlayerState> {
        self.players[self.local_slot.index()].as_ref()
    }

    pub fn remote(&self) -> Option<&PlayerState> {
        self.players[self.local_slot.other().index()].as_ref()
    }

    fn copy_world(&mut self, snapshot: &Snapshot) {
        self.room_code = Some(snapshot.room_code.clone());
        self.tick = snapshot.tick;
        self.status = snapshot.status;
        self.authority = snapshot.authority;
        self.field = snapshot.field;
        self.enemies.clone_from(&snapshot.enemies);
        self.projectiles.clone_from(&snapshot.projectiles);
        self.enemy_bullets.clone_from(&snapshot.enemy_bullets);
        self.power_ups.clone_from(&snapshot.power_ups);
        self.coins.clone_from(&snapshot.coins);
        self.lasers.clone_from(&snapshot.lasers);
    }
}

/// Keeps the local ship responsive while the server stays authoritative.
///
/// Only the local ship's position is ever predicted. Every other value in
/// the view comes straight from the newest snapshot (or, for the remote
/// ship on the poll path, the peer's own report).
pub struct Reconciler {
    config: ReconcileConfig,
    view: ClientView,
}

impl Reconciler {
    pub fn new(local_slot: Slot, config: ReconcileConfig) -> Self {
        Self {
            config,
            view: ClientView::new(local_slot),
        }
    }

    pub fn local_slot(&self) -> Slot {
        self.view.local_slot
    }

    pub fn view(&self) -> &ClientView {
        &self.view
    }

    /// Moves the local ship by `input` right away. A no-op until a snapshot
    /// has placed the ship, or once it is dead.
    pub fn predict(&mut self, input: &InputSample, ship: &ShipStats, field: Field) {
        let slot = self.view.local_slot;
        let Some(local) = self.view.players[slot.index()].as_mut() else {
            return;
        };
        if !local.alive {
            return;
        }
        let (x, y) = step_position(local.x, local.y, input, ship, field, local.width);
        local.x = x;
        local.y = y;
    }

    /// Folds an authoritative snapshot into the view.
    pub fn apply_snapshot(&mut self, snapshot: &Snapshot) -> Reconciliation {
        let slot = self.view.local_slot;
        let predicted = self.view.players[slot.index()]
            .as_ref()
            .map(|p| (p.x, p.y));
        let server = snapshot.player(slot).cloned();

        let reconciliation = match (&server, predicted) {
            (Some(server), Some((px, py))) => {
                let drift = ((server.x - px).powi(2) + (server.y - py).powi(2)).sqrt();
                let corrected = drift > self.config.threshold;
                Reconciliation { drift, corrected }
            }
            _ => Reconciliation {
                drift: 0.0,
                corrected: false,
            },
        };

        let local = server.map(|mut server| {
            if let Some((px, py)) = predicted {
                if !reconciliation.corrected && server.alive {
                    server.x = px;
                    server.y = py;
                }
            }
            server
        });
        if reconciliation.corrected {
            debug!(
                tick = snapshot.tick,
                drift = reconciliation.drift,
                "prediction corrected"
            );
        } else {
            trace!(tick = snapshot.tick, drift = reconciliation.drift, "snapshot applied");
        }

        self.view.copy_world(snapshot);
        self.view.players[slot.index()] = local;
        self.view.players[slot.other().index()] = snapshot.player(slot.other()).cloned();
        reconciliation
    }

    /// Adopts a snapshot wholesale, local position included.
    pub fn resync(&mut self, snapshot: &Snapshot) {
        self.view.copy_world(snapshot);
        self.view.players = snapshot.players.clone();
    }

    /// Folds a locally simulated snapshot into the view: the local slot and
    /// the world come from it, the remote slot is left to peer reports.
    pub fn apply_local(&mut self, snapshot: &Snapshot) {
        let slot = self.view.local_slot;
        self.view.copy_world(snapshot);
        self.view.players[slot.index()] = snapshot.player(slot).cloned();
    }

    /// Applies a poll-path report for the remote slot. Reports about the
    /// local slot are ignored.
    pub fn apply_peer(&mut self, peer: &PlayerPublicState) {
        if peer.slot == self.view.local_slot {
            return;
        }
        let remote = self.view.players[peer.slot.index()]
            .get_or_insert_with(|| placeholder(peer));
        remote.address.clone_from(&peer.address);
        remote.x = peer.x;
        remote.y = peer.y;
        remote.health = peer.health;
        remote.score = peer.score;
        remote.coins = peer.coins;
        remote.alive = peer.alive;
    }
}

/// A remote ship known only from a peer report.
fn placeholder(peer: &PlayerPublicState) -> PlayerState {
    let tuning = Tuning::default();
    PlayerState {
        slot: peer.slot,
        address: peer.address.clone(),
        ship: ShipStats::default(),
        x: peer.x,
        y: peer.y,
        width: tuning.player_size,
        height: tuning.player_size,
        health: peer.health,
        max_health: tuning.max_health,
        score: peer.score,
        coins: peer.coins,
        power_ups: PowerUps::default(),
        last_input_seq: 0,
        last_shot_ms: None,
        alive: peer.alive,
    }
}
