//! The session world and its tick pipeline.

use rand::SeedableRng;
use rand_pcg::Pcg32;
use skyduel_protocol::{
    Authority, Coin, Enemy, EnemyBullet, Field, GameMode, InputSample, Laser, PlayerState,
    PowerUp, PowerUpKind, PowerUps, Projectile, RoomCode, SessionStatus, Slot, SlotInfo,
    Snapshot,
};
use tracing::{debug, trace};

use crate::collision::{Aabb, aura_reaches, beam_hits};
use crate::spawn::{self, SpawnTimer};
use crate::{SimError, Tuning, movement};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Everything that determines a world's evolution besides its inputs.
#[derive(Debug, Clone, PartialEq)]
pub struct SimConfig {
    pub field: Field,
    /// Simulation milliseconds per tick.
    pub tick_ms: u64,
    pub seed: u64,
    pub mode: GameMode,
    pub tuning: Tuning,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            field: Field::default(),
            tick_ms: 16,
            seed: 0,
            mode: GameMode::Multiplayer,
            tuning: Tuning::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// World
// ---------------------------------------------------------------------------

/// One session's simulation state. Owned by exactly one task.
#[derive(Debug, Clone)]
pub struct World {
    room_code: RoomCode,
    config: SimConfig,
    rng: Pcg32,
    tick: u64,
    status: SessionStatus,
    players: [Option<PlayerState>; 2],
    enemies: Vec<Enemy>,
    projectiles: Vec<Projectile>,
    enemy_bullets: Vec<EnemyBullet>,
    power_ups: Vec<PowerUp>,
    coins: Vec<Coin>,
    next_id: u64,
    enemy_timer: SpawnTimer,
    power_up_timer: SpawnTimer,
    coin_timer: SpawnTimer,
}

fn next_id(counter: &mut u64) -> u64 {
    *counter += 1;
    *counter
}

fn player_box(p: &PlayerState) -> Aabb {
    Aabb::new(p.x, p.y, p.width, p.height)
}

fn enemy_box(e: &Enemy) -> Aabb {
    Aabb::new(e.x, e.y, e.width, e.height)
}

/// Takes `damage` off an enemy, saturating at both ends. Returns whether
/// the hit killed it.
fn hit_enemy(enemy: &mut Enemy, damage: u32) -> bool {
    let damage = i32::try_from(damage).unwrap_or(i32::MAX);
    enemy.health = enemy.health.saturating_sub(damage);
    enemy.health <= 0
}

/// Applies contact damage unless the shield power-up is up.
fn damage_player(player: &mut PlayerState, raw: u32, now: u64) {
    if player.power_ups.is_active(PowerUpKind::Shield, now) {
        return;
    }
    let reduced = raw.saturating_sub(player.ship.shield / 10).max(1);
    player.health = player.health.saturating_sub(reduced);
    player.alive = player.health > 0;
}

impl World {
    /// Builds a world with players placed along the bottom edge.
    ///
    /// # Errors
    /// [`SimError::NoPlayers`] for an empty roster,
    /// [`SimError::FieldTooSmall`] if a ship does not fit,
    /// [`SimError::ZeroTick`] for `tick_ms == 0`.
    pub fn new(
        room_code: RoomCode,
        config: SimConfig,
        roster: [Option<SlotInfo>; 2],
    ) -> Result<Self, SimError> {
        let tuning = &config.tuning;
        let field = config.field;
        if config.tick_ms == 0 {
            return Err(SimError::ZeroTick);
        }
        if field.width < tuning.player_size || field.height < tuning.player_size {
            return Err(SimError::FieldTooSmall {
                width: field.width,
                height: field.height,
                ship_size: tuning.player_size,
            });
        }
        if roster.iter().all(Option::is_none) {
            return Err(SimError::NoPlayers);
        }

        let two_players = roster.iter().all(Option::is_some);
        let size = tuning.player_size;
        let max_x = field.width - size;
        let y = (field.height - size - tuning.player_bottom_margin).max(0.0);
        let players = std::array::from_fn(|i| {
            let slot = Slot::ALL[i];
            roster[i].as_ref().map(|info| {
                let x = match (two_players, slot) {
                    (false, _) => max_x / 2.0,
                    (true, Slot::Host) => field.width * 0.375,
                    (true, Slot::Guest) => field.width * 0.625,
                };
                PlayerState {
                    slot,
                    address: info.address.clone(),
                    ship: info.ship,
                    x: x.min(max_x),
                    y,
                    width: size,
                    height: size,
                    health: tuning.max_health,
                    max_health: tuning.max_health,
                    score: 0,
                    coins: 0,
                    power_ups: PowerUps::default(),
                    last_input_seq: 0,
                    last_shot_ms: None,
                    alive: true,
                }
            })
        });

        let enemy_timer = SpawnTimer::starting_at(tuning.first_enemy_ms);
        let power_up_timer = SpawnTimer::starting_at(tuning.power_up_interval.at(0));
        let coin_timer = SpawnTimer::starting_at(tuning.coin_interval.at(0));
        debug!(%room_code, seed = config.seed, mode = ?config.mode, "world created");

        Ok(Self {
            room_code,
            rng: Pcg32::seed_from_u64(config.seed),
            config,
            tick: 0,
            status: SessionStatus::Playing,
            players,
            enemies: Vec::new(),
            projectiles: Vec::new(),
            enemy_bullets: Vec::new(),
            power_ups: Vec::new(),
            coins: Vec::new(),
            next_id: 0,
            enemy_timer,
            power_up_timer,
            coin_timer,
        })
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn player(&self, slot: Slot) -> Option<&PlayerState> {
        self.players[slot.index()].as_ref()
    }

    fn now(&self) -> u64 {
        self.tick * self.config.tick_ms
    }

    fn total_score(&self) -> u64 {
        self.players.iter().flatten().map(|p| p.score).sum()
    }

    /// Overwrites the mutable state of `slot`'s ship (position, health,
    /// score, coins, power-ups) from `state`, keeping its identity and
    /// ship stats. Used to hand a ship over to a local simulation.
    pub fn restore_player(&mut self, slot: Slot, state: &PlayerState) {
        let field = self.config.field;
        let Some(player) = self.players[slot.index()].as_mut() else {
            return;
        };
        player.x = state.x.clamp(0.0, (field.width - player.width).max(0.0));
        player.y = state.y.clamp(0.0, (field.height - player.height).max(0.0));
        player.health = state.health.min(player.max_health);
        player.score = state.score;
        player.coins = state.coins;
        player.power_ups = state.power_ups;
        player.alive = player.health > 0;
    }

    /// Ends the session from outside (explicit stop). Idempotent.
    pub fn finish(&mut self) {
        self.status = SessionStatus::Finished;
    }

    /// Advances one tick and returns its snapshot.
    ///
    /// `inputs` is indexed by [`Slot::index`]; `None` means no input for
    /// that slot this tick. A sample whose `seq` is not newer than the
    /// last applied one is ignored, so feeding the same sample twice moves
    /// the ship once. A finished world is frozen and returns its final
    /// snapshot.
    pub fn step(&mut self, inputs: [Option<InputSample>; 2]) -> Snapshot {
        if self.status == SessionStatus::Finished {
            return self.snapshot();
        }
        self.tick += 1;
        let now = self.now();

        self.apply_inputs(now, inputs);
        self.advance(now);
        self.spawn(now);
        self.resolve_projectile_hits();
        self.resolve_lasers(now);
        self.resolve_enemy_contacts(now);
        self.resolve_enemy_bullets(now);
        self.resolve_pickups(now);
        self.update_status();

        trace!(
            room_code = %self.room_code,
            tick = self.tick,
            enemies = self.enemies.len(),
            projectiles = self.projectiles.len(),
            "world stepped"
        );
        self.snapshot()
    }

    // -- 1. input ------------------------------------------------------------

    fn apply_inputs(&mut self, now: u64, inputs: [Option<InputSample>; 2]) {
        let Self {
            config,
            players,
            projectiles,
            next_id: id_counter,
            ..
        } = self;
        let tuning = &config.tuning;

        for slot in Slot::ALL {
            let Some(player) = players[slot.index()].as_mut() else {
                continue;
            };
            player.power_ups.expire(now);
            if !player.alive {
                continue;
            }
            let Some(input) = inputs[slot.index()] else {
                continue;
            };
            if input.seq <= player.last_input_seq {
                continue;
            }
            player.last_input_seq = input.seq;

            let (x, y) = movement::step_position(
                player.x,
                player.y,
                &input,
                &player.ship,
                config.field,
                player.width,
            );
            player.x = x;
            player.y = y;

            if !input.fire || player.power_ups.is_active(PowerUpKind::Laser, now) {
                continue;
            }
            let ready = player
                .last_shot_ms
                .is_none_or(|last| now.saturating_sub(last) >= player.ship.fire_rate_ms);
            if !ready {
                continue;
            }
            player.last_shot_ms = Some(now);

            let cx = player.x + player.width / 2.0;
            let bx = cx - tuning.bullet_width / 2.0;
            let spreads: &[f32] = if player.power_ups.is_active(PowerUpKind::TripleShot, now) {
                &[0.0, -1.0, 1.0]
            } else {
                &[0.0]
            };
            for &dir in spreads {
                projectiles.push(Projectile {
                    id: next_id(id_counter),
                    owner: slot,
                    x: bx + dir * tuning.bullet_width,
                    y: player.y,
                    vx: dir * tuning.triple_spread,
                    vy: -tuning.bullet_speed,
                    width: tuning.bullet_width,
                    height: tuning.bullet_height,
                    damage: player.ship.attack,
                });
            }
        }
    }

    // -- 2. advance ----------------------------------------------------------

    fn advance(&mut self, now: u64) {
        let field = self.config.field;
        let Self {
            config,
            players,
            enemies,
            projectiles,
            enemy_bullets,
            power_ups,
            coins,
            next_id: id_counter,
            ..
        } = self;
        let tuning = &config.tuning;

        for p in projectiles.iter_mut() {
            p.x += p.vx;
            p.y += p.vy;
        }
        projectiles.retain(|p| {
            p.y + p.height > 0.0 && p.y < field.height && p.x + p.width > 0.0 && p.x < field.width
        });

        for b in enemy_bullets.iter_mut() {
            b.x += b.vx;
            b.y += b.vy;
        }
        enemy_bullets.retain(|b| {
            b.y + b.size > 0.0 && b.y < field.height && b.x + b.size > 0.0 && b.x < field.width
        });

        let targets: Vec<(f32, f32)> = players
            .iter()
            .flatten()
            .filter(|p| p.alive)
            .map(PlayerState::center)
            .collect();
        let nearest = |ex: f32, ey: f32| {
            targets.iter().copied().min_by(|a, b| {
                let da = (a.0 - ex).powi(2) + (a.1 - ey).powi(2);
                let db = (b.0 - ex).powi(2) + (b.1 - ey).powi(2);
                da.total_cmp(&db)
            })
        };

        for enemy in enemies.iter_mut() {
            let profile = tuning.enemy(enemy.kind);
            let (ex, ey) = enemy_box(enemy).center();
            let target = nearest(ex, ey);

            enemy.y += enemy.speed;
            if let Some((tx, ty)) = target {
                let (dx, dy) = (tx - ex, ty - ey);
                let dist = (dx * dx + dy * dy).sqrt();
                if dist > 0.0 {
                    enemy.x += dx / dist * profile.homing_x;
                    enemy.y += dy / dist * profile.homing_y * tuning.homing_y_damping;
                }
            }
            enemy.x = enemy.x.clamp(0.0, (field.width - enemy.width).max(0.0));

            if let Some(radius) = enemy.aura_radius.as_mut() {
                enemy.aura_phase += tuning.aura_phase_step;
                *radius = tuning.aura_base_radius + enemy.aura_phase.sin() * tuning.aura_amplitude;
            }

            let (Some(cooldown), Some((tx, ty))) = (profile.shoot_cooldown_ms, target) else {
                continue;
            };
            let last = enemy.last_shot_ms.unwrap_or(0);
            if now.saturating_sub(last) < cooldown {
                continue;
            }
            enemy.last_shot_ms = Some(now);
            let (sx, sy) = enemy_box(enemy).center();
            let (dx, dy) = (tx - sx, ty - sy);
            let dist = (dx * dx + dy * dy).sqrt();
            if dist <= 0.0 {
                continue;
            }
            let size = tuning.enemy_bullet_size;
            enemy_bullets.push(EnemyBullet {
                id: next_id(id_counter),
                x: sx - size / 2.0,
                y: enemy.y + enemy.height,
                vx: dx / dist * tuning.enemy_bullet_speed,
                vy: dy / dist * tuning.enemy_bullet_speed,
                size,
            });
        }
        enemies.retain(|e| e.y < field.height + e.height);

        for p in power_ups.iter_mut() {
            p.y += p.speed;
        }
        power_ups.retain(|p| p.y < field.height);

        for c in coins.iter_mut() {
            c.y += c.speed;
        }
        coins.retain(|c| c.y < field.height);
    }

    // -- 3. spawn ------------------------------------------------------------

    fn spawn(&mut self, now: u64) {
        let score = self.total_score();
        let field = self.config.field;
        let tuning = &self.config.tuning;

        if self.enemy_timer.fire(now, &tuning.enemy_interval, score) {
            let id = next_id(&mut self.next_id);
            let enemy = spawn::enemy(id, &mut self.rng, tuning, field, score, now);
            trace!(room_code = %self.room_code, id, kind = ?enemy.kind, "enemy spawned");
            self.enemies.push(enemy);
        }
        if self.power_up_timer.fire(now, &tuning.power_up_interval, score) {
            let id = next_id(&mut self.next_id);
            self.power_ups
                .push(spawn::power_up(id, &mut self.rng, tuning, field));
        }
        if self.coin_timer.fire(now, &tuning.coin_interval, score) {
            let id = next_id(&mut self.next_id);
            self.coins.push(spawn::coin(id, &mut self.rng, tuning, field));
        }
    }

    // -- 4. collisions -------------------------------------------------------

    fn credit(&mut self, kills: Vec<(Slot, u64)>) {
        for (slot, points) in kills {
            if let Some(p) = self.players[slot.index()].as_mut() {
                p.score += points;
            }
        }
    }

    fn resolve_projectile_hits(&mut self) {
        let mut kills = Vec::new();
        let mut consumed = vec![false; self.projectiles.len()];
        for (i, proj) in self.projectiles.iter().enumerate() {
            let pb = Aabb::new(proj.x, proj.y, proj.width, proj.height);
            let hit = self
                .enemies
                .iter_mut()
                .find(|e| e.health > 0 && pb.overlaps(&enemy_box(e)));
            if let Some(enemy) = hit {
                consumed[i] = true;
                if hit_enemy(enemy, proj.damage) {
                    kills.push((proj.owner, self.config.tuning.enemy(enemy.kind).kill_score));
                }
            }
        }
        let mut idx = 0;
        self.projectiles.retain(|_| {
            let keep = !consumed[idx];
            idx += 1;
            keep
        });
        self.enemies.retain(|e| e.health > 0);
        self.credit(kills);
    }

    fn resolve_lasers(&mut self, now: u64) {
        let tuning = &self.config.tuning;
        let mut kills = Vec::new();
        for player in self.players.iter().flatten() {
            if !player.alive || !player.power_ups.is_active(PowerUpKind::Laser, now) {
                continue;
            }
            let cx = player.x + player.width / 2.0;
            let damage = player.ship.attack.saturating_mul(tuning.laser_damage_multiplier);
            for enemy in self.enemies.iter_mut().filter(|e| e.health > 0) {
                if beam_hits(cx, tuning.laser_width, 0.0, player.y, &enemy_box(enemy))
                    && hit_enemy(enemy, damage)
                {
                    kills.push((player.slot, tuning.enemy(enemy.kind).kill_score));
                }
            }
        }
        self.enemies.retain(|e| e.health > 0);
        self.credit(kills);
    }

    fn resolve_enemy_contacts(&mut self, now: u64) {
        let tuning = &self.config.tuning;
        let mut rammed = vec![false; self.enemies.len()];
        for (i, enemy) in self.enemies.iter_mut().enumerate() {
            let profile = tuning.enemy(enemy.kind);
            let eb = enemy_box(enemy);
            for slot in Slot::ALL {
                let Some(player) = self.players[slot.index()].as_mut() else {
                    continue;
                };
                if !player.alive {
                    continue;
                }
                let pb = player_box(player);
                let body = eb.overlaps(&pb);
                let mut aura = false;
                if let Some(radius) = enemy.aura_radius {
                    let last = enemy.aura_hit_ms[slot.index()];
                    let cooled = last
                        .is_none_or(|t| now.saturating_sub(t) > tuning.aura_hit_cooldown_ms);
                    if cooled && aura_reaches(&eb, radius, &pb) {
                        enemy.aura_hit_ms[slot.index()] = Some(now);
                        aura = true;
                    }
                }
                if body || aura {
                    damage_player(player, profile.contact_damage, now);
                }
                if body {
                    rammed[i] = true;
                }
            }
        }
        let mut idx = 0;
        self.enemies.retain(|_| {
            let keep = !rammed[idx];
            idx += 1;
            keep
        });
    }

    fn resolve_enemy_bullets(&mut self, now: u64) {
        let damage = self.config.tuning.enemy_bullet_damage;
        let players = &mut self.players;
        self.enemy_bullets.retain(|b| {
            let bb = Aabb::square(b.x, b.y, b.size);
            let hit = players
                .iter_mut()
                .flatten()
                .find(|p| p.alive && bb.overlaps(&player_box(p)));
            match hit {
                Some(player) => {
                    damage_player(player, damage, now);
                    false
                }
                None => true,
            }
        });
    }

    // -- 5. pickups ----------------------------------------------------------

    fn resolve_pickups(&mut self, now: u64) {
        let tuning = &self.config.tuning;
        let players = &mut self.players;

        self.power_ups.retain(|pu| {
            let pb = Aabb::square(pu.x, pu.y, pu.size);
            let claimer = players
                .iter_mut()
                .flatten()
                .find(|p| p.alive && pb.overlaps(&player_box(p)));
            let Some(player) = claimer else {
                return true;
            };
            let duration = match pu.kind {
                PowerUpKind::Shield => tuning.shield_ms,
                PowerUpKind::TripleShot => tuning.triple_ms,
                PowerUpKind::Laser => tuning.laser_ms,
            };
            player.power_ups.grant(pu.kind, now, duration);
            debug!(slot = %player.slot, kind = ?pu.kind, "power-up collected");
            false
        });

        self.coins.retain(|coin| {
            let cb = Aabb::square(coin.x, coin.y, coin.size);
            match players
                .iter_mut()
                .flatten()
                .find(|p| p.alive && cb.overlaps(&player_box(p)))
            {
                Some(player) => {
                    player.coins += u64::from(coin.value);
                    false
                }
                None => true,
            }
        });
    }

    // -- 6. death ------------------------------------------------------------

    fn update_status(&mut self) {
        let mut any_alive = false;
        for player in self.players.iter_mut().flatten() {
            player.alive = player.health > 0;
            any_alive |= player.alive;
        }
        if !any_alive {
            self.status = SessionStatus::Finished;
            debug!(room_code = %self.room_code, tick = self.tick, "all players down");
        }
    }

    // -- 7. emit -------------------------------------------------------------

    /// The current state as a total snapshot.
    pub fn snapshot(&self) -> Snapshot {
        let now = self.now();
        let tuning = &self.config.tuning;
        let lasers = self
            .players
            .iter()
            .flatten()
            .filter(|p| p.alive && p.power_ups.is_active(PowerUpKind::Laser, now))
            .map(|p| Laser {
                owner: p.slot,
                x: p.x + p.width / 2.0,
                width: tuning.laser_width,
                top: 0.0,
                bottom: p.y,
            })
            .collect();
        Snapshot {
            room_code: self.room_code.clone(),
            tick: self.tick,
            time_ms: now,
            status: self.status,
            authority: Authority::Server,
            field: self.config.field,
            players: self.players.clone(),
            enemies: self.enemies.clone(),
            projectiles: self.projectiles.clone(),
            enemy_bullets: self.enemy_bullets.clone(),
            power_ups: self.power_ups.clone(),
            coins: self.coins.clone(),
            lasers,
        }
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use skyduel_protocol::{EnemyKind, PlayerAddress, ShipStats};

    use super::*;

    // =====================================================================
    // Helpers
    // =====================================================================

    fn info(addr: &str) -> SlotInfo {
        SlotInfo {
            address: PlayerAddress::new(addr),
            ship: ShipStats::new(5, 5, 0),
        }
    }

    /// A two-player world with spawning pushed out of the way.
    fn quiet_world() -> World {
        let mut config = SimConfig::default();
        config.tuning = config.tuning.without_spawns();
        World::new(
            RoomCode::parse("123456").unwrap(),
            config,
            [Some(info("host")), Some(info("guest"))],
        )
        .unwrap()
    }

    fn input(seq: u64) -> InputSample {
        InputSample {
            seq,
            ..Default::default()
        }
    }

    fn enemy_at(world: &mut World, kind: EnemyKind, x: f32, y: f32) -> u64 {
        let profile = world.config.tuning.enemy(kind);
        let id = next_id(&mut world.next_id);
        world.enemies.push(Enemy {
            id,
            kind,
            x,
            y,
            width: profile.size,
            height: profile.size,
            health: profile.max_health,
            max_health: profile.max_health,
            speed: 0.0,
            aura_radius: profile
                .has_aura
                .then_some(world.config.tuning.aura_base_radius),
            aura_phase: 0.0,
            aura_hit_ms: [None, None],
            last_shot_ms: None,
        });
        id
    }

    fn player_mut(world: &mut World, slot: Slot) -> &mut PlayerState {
        world.players[slot.index()].as_mut().unwrap()
    }

    // =====================================================================
    // Construction
    // =====================================================================

    #[test]
    fn test_new_rejects_empty_roster() {
        let err = World::new(
            RoomCode::parse("123456").unwrap(),
            SimConfig::default(),
            [None, None],
        );
        assert!(matches!(err, Err(SimError::NoPlayers)));
    }

    #[test]
    fn test_new_rejects_tiny_field() {
        let config = SimConfig {
            field: Field {
                width: 50.0,
                height: 50.0,
            },
            ..SimConfig::default()
        };
        let err = World::new(RoomCode::parse("123456").unwrap(), config, [Some(info("a")), None]);
        assert!(matches!(err, Err(SimError::FieldTooSmall { .. })));
    }

    #[test]
    fn test_new_places_players_inside_field() {
        let world = quiet_world();
        let host = world.player(Slot::Host).unwrap();
        let guest = world.player(Slot::Guest).unwrap();
        assert_eq!((host.x, host.y), (300.0, 460.0));
        assert_eq!(guest.x, 500.0);
        assert_eq!(host.health, 100);
        assert_eq!(world.status(), SessionStatus::Playing);
    }

    // =====================================================================
    // Input and firing
    // =====================================================================

    #[test]
    fn test_step_missing_input_holds_position() {
        let mut world = quiet_world();
        let before = world.player(Slot::Host).unwrap().clone();
        let snap = world.step([None, None]);
        let after = snap.player(Slot::Host).unwrap();
        assert_eq!((after.x, after.y), (before.x, before.y));
        assert!(snap.projectiles.is_empty());
    }

    #[test]
    fn test_step_same_sample_twice_moves_once() {
        let mut world = quiet_world();
        let right = InputSample {
            right: true,
            ..input(1)
        };
        world.step([Some(right), None]);
        let snap = world.step([Some(right), None]);
        assert_eq!(snap.player(Slot::Host).unwrap().x, 305.0);
        assert_eq!(snap.player(Slot::Host).unwrap().last_input_seq, 1);
    }

    #[test]
    fn test_fire_respects_cooldown() {
        let mut world = quiet_world();
        let fire = |seq| InputSample {
            fire: true,
            ..input(seq)
        };
        // fire_rate for speed 5 is 250 ms, ticks are 16 ms.
        let snap = world.step([Some(fire(1)), None]);
        assert_eq!(snap.projectiles.len(), 1);
        for seq in 2..=16 {
            world.step([Some(fire(seq)), None]);
        }
        // Tick 16 is 240 ms after the first shot.
        assert_eq!(world.projectiles.len(), 1);
        world.step([Some(fire(17)), None]);
        assert_eq!(world.projectiles.len(), 2);
    }

    #[test]
    fn test_triple_shot_spawns_three_diverging_projectiles() {
        let mut world = quiet_world();
        player_mut(&mut world, Slot::Guest)
            .power_ups
            .grant(PowerUpKind::TripleShot, 0, 5_000);
        let snap = world.step([
            None,
            Some(InputSample {
                fire: true,
                ..input(1)
            }),
        ]);
        assert_eq!(snap.projectiles.len(), 3);
        let mut vx: Vec<f32> = snap.projectiles.iter().map(|p| p.vx).collect();
        vx.sort_by(f32::total_cmp);
        assert_eq!(vx, vec![-2.0, 0.0, 2.0]);
        assert!(snap.projectiles.iter().all(|p| p.owner == Slot::Guest && p.vy == -12.0));
    }

    #[test]
    fn test_laser_suppresses_normal_fire_and_is_reported() {
        let mut world = quiet_world();
        player_mut(&mut world, Slot::Host)
            .power_ups
            .grant(PowerUpKind::Laser, 0, 5_000);
        let snap = world.step([
            Some(InputSample {
                fire: true,
                ..input(1)
            }),
            None,
        ]);
        assert!(snap.projectiles.is_empty());
        assert_eq!(snap.lasers.len(), 1);
        assert_eq!(snap.lasers[0].owner, Slot::Host);
    }

    // =====================================================================
    // Collisions and attribution
    // =====================================================================

    #[test]
    fn test_kill_credits_projectile_owner() {
        let mut world = quiet_world();
        // Guest bullet right next to an enemy sitting over the host.
        enemy_at(&mut world, EnemyKind::Enemy1, 100.0, 100.0);
        world.projectiles.push(Projectile {
            id: 999,
            owner: Slot::Guest,
            x: 140.0,
            y: 200.0,
            vx: 0.0,
            vy: -12.0,
            width: 10.0,
            height: 20.0,
            damage: 10,
        });
        let snap = world.step([None, None]);
        assert!(snap.enemies.is_empty());
        assert_eq!(snap.player(Slot::Guest).unwrap().score, 10);
        assert_eq!(snap.player(Slot::Host).unwrap().score, 0);
    }

    #[test]
    fn test_projectile_damage_below_health_keeps_enemy() {
        let mut world = quiet_world();
        enemy_at(&mut world, EnemyKind::Boss1, 100.0, 50.0);
        world.projectiles.push(Projectile {
            id: 999,
            owner: Slot::Host,
            x: 160.0,
            y: 180.0,
            vx: 0.0,
            vy: -12.0,
            width: 10.0,
            height: 20.0,
            damage: 5,
        });
        let snap = world.step([None, None]);
        assert_eq!(snap.enemies.len(), 1);
        assert_eq!(snap.enemies[0].health, 45);
        assert!(snap.projectiles.is_empty());
    }

    #[test]
    fn test_laser_kills_credit_beam_owner() {
        let mut world = quiet_world();
        player_mut(&mut world, Slot::Host)
            .power_ups
            .grant(PowerUpKind::Laser, 0, 5_000);
        // Host center x = 360; enemy spans 320..410.
        enemy_at(&mut world, EnemyKind::Enemy2, 320.0, 100.0);
        let snap = world.step([None, None]);
        assert!(snap.enemies.is_empty());
        assert_eq!(snap.player(Slot::Host).unwrap().score, 10);
    }

    #[test]
    fn test_huge_attack_kills_instead_of_healing() {
        let mut world = quiet_world();
        enemy_at(&mut world, EnemyKind::Boss2, 100.0, 50.0);
        world.projectiles.push(Projectile {
            id: 999,
            owner: Slot::Host,
            x: 160.0,
            y: 180.0,
            vx: 0.0,
            vy: -12.0,
            width: 10.0,
            height: 20.0,
            damage: 3_000_000_000,
        });
        let snap = world.step([None, None]);
        assert!(snap.enemies.is_empty());
        assert_eq!(snap.player(Slot::Host).unwrap().score, 50);
    }

    #[test]
    fn test_laser_with_max_attack_does_not_overflow() {
        let mut world = quiet_world();
        let host = player_mut(&mut world, Slot::Host);
        host.ship.attack = u32::MAX;
        host.power_ups.grant(PowerUpKind::Laser, 0, 5_000);
        enemy_at(&mut world, EnemyKind::Boss1, 300.0, 100.0);
        let snap = world.step([None, None]);
        assert!(snap.enemies.is_empty());
        assert_eq!(snap.player(Slot::Host).unwrap().score, 50);
    }

    #[test]
    fn test_contact_damage_reduced_by_shield_stat_with_floor() {
        let mut world = quiet_world();
        player_mut(&mut world, Slot::Host).ship.shield = 45;
        let (x, y) = {
            let p = world.player(Slot::Host).unwrap();
            (p.x, p.y)
        };
        enemy_at(&mut world, EnemyKind::Enemy1, x, y);
        let snap = world.step([None, None]);
        // 20 - floor(45 / 10) = 16
        assert_eq!(snap.player(Slot::Host).unwrap().health, 84);
        assert!(snap.enemies.is_empty(), "body contact removes the enemy");

        player_mut(&mut world, Slot::Host).ship.shield = 500;
        enemy_at(&mut world, EnemyKind::Enemy1, x, y);
        let snap = world.step([None, None]);
        assert_eq!(snap.player(Slot::Host).unwrap().health, 83);
    }

    #[test]
    fn test_shield_power_up_blocks_contact_and_bullets() {
        let mut world = quiet_world();
        player_mut(&mut world, Slot::Host)
            .power_ups
            .grant(PowerUpKind::Shield, 0, 3_000);
        let (x, y) = {
            let p = world.player(Slot::Host).unwrap();
            (p.x, p.y)
        };
        enemy_at(&mut world, EnemyKind::Boss1, x, y);
        world.enemy_bullets.push(EnemyBullet {
            id: 1_000,
            x: x + 10.0,
            y: y + 10.0,
            vx: 0.0,
            vy: 0.0,
            size: 12.0,
        });
        let snap = world.step([None, None]);
        assert_eq!(snap.player(Slot::Host).unwrap().health, 100);
        assert!(snap.enemy_bullets.is_empty());
    }

    #[test]
    fn test_aura_hits_without_removing_enemy_and_respects_cooldown() {
        let mut world = quiet_world();
        let (x, y) = {
            let p = world.player(Slot::Host).unwrap();
            (p.x, p.y)
        };
        // Enemy box above the ship, not touching it, aura in reach.
        enemy_at(&mut world, EnemyKind::EnemyLevel2, x + 10.0, y - 110.0);
        // Near the top of the pulse.
        world.enemies[0].aura_phase = std::f32::consts::FRAC_PI_2;
        let snap = world.step([None, None]);
        assert_eq!(snap.player(Slot::Host).unwrap().health, 70);
        assert_eq!(snap.enemies.len(), 1);

        world.enemies[0].y = y - 110.0;
        let snap = world.step([None, None]);
        assert_eq!(snap.player(Slot::Host).unwrap().health, 70, "cooldown");
    }

    #[test]
    fn test_enemy_bullet_damage_uses_shield_reduction() {
        let mut world = quiet_world();
        let (x, y) = {
            let p = world.player(Slot::Guest).unwrap();
            (p.x, p.y)
        };
        world.enemy_bullets.push(EnemyBullet {
            id: 1_000,
            x: x + 50.0,
            y: y + 50.0,
            vx: 0.0,
            vy: 0.0,
            size: 12.0,
        });
        let snap = world.step([None, None]);
        assert_eq!(snap.player(Slot::Guest).unwrap().health, 50);
    }

    // =====================================================================
    // Pickups
    // =====================================================================

    #[test]
    fn test_first_overlapping_player_claims_power_up() {
        let mut world = quiet_world();
        // Move the guest onto the host so both overlap the pickup.
        let (x, y) = {
            let p = world.player(Slot::Host).unwrap();
            (p.x, p.y)
        };
        let guest = player_mut(&mut world, Slot::Guest);
        guest.x = x;
        world.power_ups.push(PowerUp {
            id: 1_000,
            kind: PowerUpKind::Shield,
            x: x + 40.0,
            y: y + 40.0,
            size: 30.0,
            speed: 0.0,
        });
        let snap = world.step([None, None]);
        assert!(snap.power_ups.is_empty());
        let host = snap.player(Slot::Host).unwrap();
        let guest = snap.player(Slot::Guest).unwrap();
        assert_eq!(host.power_ups.shield_until, Some(16 + 3_000));
        assert_eq!(guest.power_ups.shield_until, None);
    }

    #[test]
    fn test_coin_pickup_adds_value() {
        let mut world = quiet_world();
        let (x, y) = {
            let p = world.player(Slot::Guest).unwrap();
            (p.x, p.y)
        };
        world.coins.push(Coin {
            id: 1_000,
            x: x + 10.0,
            y: y + 10.0,
            size: 25.0,
            speed: 0.0,
            value: 3,
        });
        let snap = world.step([None, None]);
        assert_eq!(snap.player(Slot::Guest).unwrap().coins, 3);
        assert!(snap.coins.is_empty());
    }

    // =====================================================================
    // Death and status
    // =====================================================================

    #[test]
    fn test_one_death_does_not_finish_two_player_session() {
        let mut world = quiet_world();
        player_mut(&mut world, Slot::Host).health = 0;
        let snap = world.step([None, None]);
        assert!(!snap.player(Slot::Host).unwrap().alive);
        assert_eq!(snap.status, SessionStatus::Playing);
    }

    #[test]
    fn test_all_dead_finishes_and_freezes_world() {
        let mut world = quiet_world();
        player_mut(&mut world, Slot::Host).health = 0;
        player_mut(&mut world, Slot::Guest).health = 0;
        let snap = world.step([None, None]);
        assert_eq!(snap.status, SessionStatus::Finished);
        let again = world.step([Some(input(5)), None]);
        assert_eq!(again.tick, snap.tick);
    }

    #[test]
    fn test_solo_world_finishes_on_single_death() {
        let config = SimConfig {
            mode: GameMode::Solo,
            ..SimConfig::default()
        };
        let mut world = World::new(
            RoomCode::parse("123456").unwrap(),
            config,
            [Some(info("solo")), None],
        )
        .unwrap();
        player_mut(&mut world, Slot::Host).health = 0;
        assert_eq!(world.step([None, None]).status, SessionStatus::Finished);
    }

    #[test]
    fn test_restore_player_keeps_identity_and_clamps() {
        let mut world = quiet_world();
        let mut state = world.player(Slot::Guest).unwrap().clone();
        state.address = PlayerAddress::new("impostor");
        state.x = 10_000.0;
        state.health = 40;
        state.score = 70;
        world.restore_player(Slot::Guest, &state);
        let guest = world.player(Slot::Guest).unwrap();
        assert_eq!(guest.address, PlayerAddress::new("guest"));
        assert_eq!(guest.x, 680.0);
        assert_eq!((guest.health, guest.score), (40, 70));
    }

    #[test]
    fn test_finish_is_idempotent() {
        let mut world = quiet_world();
        world.finish();
        world.finish();
        assert_eq!(world.status(), SessionStatus::Finished);
    }

    // =====================================================================
    // Spawning
    // =====================================================================

    #[test]
    fn test_first_enemy_spawns_after_one_second() {
        let mut world = World::new(
            RoomCode::parse("123456").unwrap(),
            SimConfig::default(),
            [Some(info("host")), None],
        )
        .unwrap();
        // 62 ticks = 992 ms, 63 ticks = 1008 ms.
        for _ in 0..62 {
            world.step([None, None]);
        }
        assert!(world.enemies.is_empty());
        let snap = world.step([None, None]);
        assert_eq!(snap.enemies.len(), 1);
    }
}
