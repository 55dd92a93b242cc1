//! Game data model shared by the simulator, the server and clients.
//!
//! Everything here travels on the wire. Positions are top-left corners in
//! playfield units; times are simulation milliseconds since the session
//! started unless a field says otherwise.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::{PlayerAddress, RoomCode, Slot};

/// Wall clock in milliseconds since the UNIX epoch, for wire timestamps.
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis() as u64)
}

// ---------------------------------------------------------------------------
// Session-level enums
// ---------------------------------------------------------------------------

/// How a room was created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameMode {
    Solo,
    Versus,
    Multiplayer,
}

impl GameMode {
    /// Number of slots that must be populated and ready before play.
    pub fn required_slots(self) -> usize {
        match self {
            Self::Solo => 1,
            Self::Versus | Self::Multiplayer => 2,
        }
    }

    /// Whether a guest may join.
    pub fn accepts_guest(self) -> bool {
        !matches!(self, Self::Solo)
    }
}

/// Lifecycle status of a session.
///
/// ```text
/// waiting → playing → finished
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Waiting,
    Playing,
    Finished,
}

impl SessionStatus {
    /// Returns `true` if `target` is the one legal successor.
    pub fn can_transition_to(self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Waiting, Self::Playing) | (Self::Playing, Self::Finished)
        )
    }
}

/// Who produced a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Authority {
    /// The session's simulator on the server.
    Server,
    /// A client's local fallback simulation.
    Client,
}

/// Playfield dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub width: f32,
    pub height: f32,
}

impl Default for Field {
    fn default() -> Self {
        Self {
            width: 800.0,
            height: 600.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Ships
// ---------------------------------------------------------------------------

/// Combat stats of a ship, fixed for the whole session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipStats {
    /// Damage per projectile; the laser deals twice this per tick.
    pub attack: u32,
    /// Movement per tick along each pressed direction.
    pub speed: u32,
    /// Contact damage reduction, `floor(shield / 10)` per hit.
    pub shield: u32,
    /// Minimum milliseconds between shots.
    pub fire_rate_ms: u64,
}

/// The named ships players can own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShipTier {
    Classic,
    Common,
    Elite,
    Epic,
    Legendary,
    Master,
    Ultra,
}

impl ShipStats {
    /// Builds stats with the fire rate derived from speed:
    /// `max(50, 300 - speed * 10)` ms.
    pub fn new(attack: u32, speed: u32, shield: u32) -> Self {
        let fire_rate_ms = 300u64.saturating_sub(u64::from(speed) * 10).max(50);
        Self {
            attack,
            speed,
            shield,
            fire_rate_ms,
        }
    }

    pub fn preset(tier: ShipTier) -> Self {
        let (attack, speed, shield, fire_rate_ms) = match tier {
            ShipTier::Classic => (5, 5, 5, 300),
            ShipTier::Common => (10, 8, 12, 250),
            ShipTier::Elite => (10, 8, 12, 250),
            ShipTier::Epic => (20, 6, 18, 200),
            ShipTier::Legendary => (30, 15, 25, 150),
            ShipTier::Master => (40, 12, 35, 120),
            ShipTier::Ultra => (50, 18, 45, 100),
        };
        Self {
            attack,
            speed,
            shield,
            fire_rate_ms,
        }
    }
}

impl Default for ShipStats {
    fn default() -> Self {
        Self::preset(ShipTier::Classic)
    }
}

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// One control sample from a client.
///
/// `seq` increases strictly per (session, slot). The server queues a short
/// bounded backlog per slot, applies one sample per tick oldest first, and
/// applies each sequence number at most once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct InputSample {
    pub seq: u64,
    /// Client wall clock in milliseconds, informational only.
    pub client_ts: u64,
    #[serde(default)]
    pub up: bool,
    #[serde(default)]
    pub down: bool,
    #[serde(default)]
    pub left: bool,
    #[serde(default)]
    pub right: bool,
    #[serde(default)]
    pub fire: bool,
}

impl InputSample {
    /// Stick direction as `(dx, dy)` in `{-1, 0, 1}`.
    pub fn direction(&self) -> (f32, f32) {
        let axis = |neg: bool, pos: bool| match (neg, pos) {
            (true, false) => -1.0,
            (false, true) => 1.0,
            _ => 0.0,
        };
        (axis(self.left, self.right), axis(self.up, self.down))
    }
}

// ---------------------------------------------------------------------------
// Players
// ---------------------------------------------------------------------------

/// Kinds of collectible power-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerUpKind {
    /// Ignore all incoming damage.
    Shield,
    /// Fire three diverging projectiles per trigger.
    TripleShot,
    /// Continuous beam; suppresses normal and triple fire.
    Laser,
}

/// Per-player power-up expiries in simulation milliseconds.
///
/// Each kind is timed independently. Collecting a kind that is already
/// active restarts its timer; durations never add up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PowerUps {
    pub shield_until: Option<u64>,
    pub triple_until: Option<u64>,
    pub laser_until: Option<u64>,
}

impl PowerUps {
    fn until_mut(&mut self, kind: PowerUpKind) -> &mut Option<u64> {
        match kind {
            PowerUpKind::Shield => &mut self.shield_until,
            PowerUpKind::TripleShot => &mut self.triple_until,
            PowerUpKind::Laser => &mut self.laser_until,
        }
    }

    pub fn until(&self, kind: PowerUpKind) -> Option<u64> {
        match kind {
            PowerUpKind::Shield => self.shield_until,
            PowerUpKind::TripleShot => self.triple_until,
            PowerUpKind::Laser => self.laser_until,
        }
    }

    /// Active while `now < until`.
    pub fn is_active(&self, kind: PowerUpKind, now: u64) -> bool {
        self.until(kind).is_some_and(|until| now < until)
    }

    pub fn grant(&mut self, kind: PowerUpKind, now: u64, duration_ms: u64) {
        *self.until_mut(kind) = Some(now + duration_ms);
    }

    /// Clears expiries that have passed.
    pub fn expire(&mut self, now: u64) {
        for kind in [PowerUpKind::Shield, PowerUpKind::TripleShot, PowerUpKind::Laser] {
            let slot = self.until_mut(kind);
            if slot.is_some_and(|until| now >= until) {
                *slot = None;
            }
        }
    }
}

/// Authoritative state of one player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerState {
    pub slot: Slot,
    pub address: PlayerAddress,
    pub ship: ShipStats,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub health: u32,
    pub max_health: u32,
    /// Never decreases during a session.
    pub score: u64,
    /// Never decreases during a session.
    pub coins: u64,
    pub power_ups: PowerUps,
    /// Sequence number of the last input applied by the simulator.
    pub last_input_seq: u64,
    /// Simulation time of the last shot.
    pub last_shot_ms: Option<u64>,
    pub alive: bool,
}

impl PlayerState {
    pub fn center(&self) -> (f32, f32) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

/// A slot's roster entry: who sits there and with which ship.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotInfo {
    pub address: PlayerAddress,
    pub ship: ShipStats,
}

// ---------------------------------------------------------------------------
// Entities
// ---------------------------------------------------------------------------

/// Enemy variants, in rough order of strength.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnemyKind {
    Enemy1,
    Enemy2,
    EnemyLevel1,
    EnemyLevel2,
    Boss1,
    Boss2,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Enemy {
    pub id: u64,
    pub kind: EnemyKind,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub health: i32,
    pub max_health: i32,
    pub speed: f32,
    /// Pulsing damage radius, only for `enemylevel2`.
    pub aura_radius: Option<f32>,
    pub aura_phase: f32,
    /// Last aura hit per slot, simulation ms.
    pub aura_hit_ms: [Option<u64>; 2],
    /// Bosses only: last shot time.
    pub last_shot_ms: Option<u64>,
}

/// A player projectile. `owner` is fixed at creation and is the only
/// input to kill attribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Projectile {
    pub id: u64,
    pub owner: Slot,
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub width: f32,
    pub height: f32,
    pub damage: u32,
}

/// A boss projectile aimed at a player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnemyBullet {
    pub id: u64,
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub size: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PowerUp {
    pub id: u64,
    pub kind: PowerUpKind,
    pub x: f32,
    pub y: f32,
    pub size: f32,
    pub speed: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coin {
    pub id: u64,
    pub x: f32,
    pub y: f32,
    pub size: f32,
    pub speed: f32,
    pub value: u32,
}

/// An active laser beam, derived from its owner each tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Laser {
    pub owner: Slot,
    /// Beam center line.
    pub x: f32,
    pub width: f32,
    /// Beam runs from `top` (0) down to `bottom` (the owner's top edge).
    pub top: f32,
    pub bottom: f32,
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Complete state of a session at one tick.
///
/// Snapshots are total: rendering needs no earlier snapshot. They are
/// shared as `Arc<Snapshot>` between the simulator and every reader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub room_code: RoomCode,
    /// The ordering key for every consumer.
    pub tick: u64,
    /// Simulation time, `tick * tick_ms`.
    pub time_ms: u64,
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

impl Snapshot {
    pub fn player(&self, slot: Slot) -> Option<&PlayerState> {
        self.players[slot.index()].as_ref()
    }

    /// Sum of all players' scores; drives difficulty scaling.
    pub fn total_score(&self) -> u64 {
        self.players.iter().flatten().map(|p| p.score).sum()
    }
}

/// A shared, immutable snapshot.
pub type SharedSnapshot = Arc<Snapshot>;

// ---------------------------------------------------------------------------
// Poll board
// ---------------------------------------------------------------------------

/// A player's self-reported or server-derived public state, as carried on
/// the poll path.
///
/// `tick` is the last server tick the sender knew of, so self-reports and
/// server-derived states share one axis. Updates are ordered by
/// `(tick, timestamp)`: receivers discard anything not newer than what they
/// already applied for that slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerPublicState {
    pub slot: Slot,
    pub address: PlayerAddress,
    pub tick: u64,
    /// Sender wall clock, milliseconds since the UNIX epoch.
    pub timestamp: u64,
    pub x: f32,
    pub y: f32,
    pub health: u32,
    pub score: u64,
    pub coins: u64,
    pub alive: bool,
    /// Inputs the server has not acknowledged yet, fed into the input
    /// channel on arrival. Already-applied sequence numbers are dropped.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inputs: Vec<InputSample>,
}

impl PlayerPublicState {
    pub fn from_player(player: &PlayerState, tick: u64, timestamp: u64) -> Self {
        Self {
            slot: player.slot,
            address: player.address.clone(),
            tick,
            timestamp,
            x: player.x,
            y: player.y,
            health: player.health,
            score: player.score,
            coins: player.coins,
            alive: player.alive,
            inputs: Vec::new(),
        }
    }

    /// Whether this update supersedes `other` for the same slot.
    pub fn is_newer_than(&self, other: &Self) -> bool {
        (self.tick, self.timestamp) > (other.tick, other.timestamp)
    }
}

// ---------------------------------------------------------------------------
// Rooms and matches
// ---------------------------------------------------------------------------

/// Lobby-level view of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomSnapshot {
    pub room_code: RoomCode,
    pub mode: GameMode,
    pub status: SessionStatus,
    pub host: SlotInfo,
    pub guest: Option<SlotInfo>,
    /// Milliseconds since the UNIX epoch.
    pub created_at: u64,
    /// Indexed by [`Slot::index`].
    pub ready: [bool; 2],
    pub tick: u64,
}

impl RoomSnapshot {
    /// The slot `address` occupies, if any.
    pub fn slot_of(&self, address: &PlayerAddress) -> Option<Slot> {
        if &self.host.address == address {
            Some(Slot::Host)
        } else if self.guest.as_ref().is_some_and(|g| &g.address == address) {
            Some(Slot::Guest)
        } else {
            None
        }
    }
}

/// One player's result, persisted when a session finishes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub room_code: RoomCode,
    pub mode: GameMode,
    pub address: PlayerAddress,
    pub score: u64,
    pub coins: u64,
    pub duration_ms: u64,
}
