//! Gameplay constants.
//!
//! Everything the simulator treats as a magic number lives in [`Tuning`],
//! so tests and local fallback sessions can build worlds with the exact
//! same numbers the server uses.

use skyduel_protocol::EnemyKind;

/// An interval that shrinks linearly with score down to a floor:
/// `max(floor, base - score * per_point)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Interval {
    pub base_ms: u64,
    pub per_point_ms: u64,
    pub floor_ms: u64,
}

impl Interval {
    pub fn at(&self, score: u64) -> u64 {
        self.base_ms
            .saturating_sub(score.saturating_mul(self.per_point_ms))
            .max(self.floor_ms)
    }
}

/// Per-kind enemy numbers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnemyProfile {
    pub size: f32,
    pub max_health: i32,
    pub base_speed: f32,
    /// Speed gained per point of total score.
    pub speed_per_point: f32,
    pub homing_x: f32,
    pub homing_y: f32,
    /// Damage dealt on contact before shield reduction.
    pub contact_damage: u32,
    /// Score credited for the kill.
    pub kill_score: u64,
    /// Bosses shoot aimed bullets at this cadence.
    pub shoot_cooldown_ms: Option<u64>,
    pub has_aura: bool,
}

/// All gameplay constants.
#[derive(Debug, Clone, PartialEq)]
pub struct Tuning {
    pub player_size: f32,
    pub max_health: u32,
    /// Distance from the bottom edge at spawn.
    pub player_bottom_margin: f32,

    pub bullet_width: f32,
    pub bullet_height: f32,
    pub bullet_speed: f32,
    /// Horizontal speed of the two outer triple-shot bullets.
    pub triple_spread: f32,

    pub laser_width: f32,
    pub laser_damage_multiplier: u32,

    pub shield_ms: u64,
    pub triple_ms: u64,
    pub laser_ms: u64,

    pub enemy_interval: Interval,
    pub first_enemy_ms: u64,
    /// Homing vertical component is damped by this factor.
    pub homing_y_damping: f32,

    pub aura_base_radius: f32,
    pub aura_amplitude: f32,
    pub aura_phase_step: f32,
    pub aura_hit_cooldown_ms: u64,

    pub enemy_bullet_size: f32,
    pub enemy_bullet_speed: f32,
    pub enemy_bullet_damage: u32,

    pub power_up_interval: Interval,
    pub power_up_size: f32,
    pub power_up_speed: f32,
    /// Horizontal spawn margin on each side.
    pub power_up_margin: f32,

    pub coin_interval: Interval,
    pub coin_size: f32,
    pub coin_speed: f32,
    pub coin_margin: f32,
    pub coin_max_value: u32,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            player_size: 120.0,
            max_health: 100,
            player_bottom_margin: 20.0,

            bullet_width: 10.0,
            bullet_height: 20.0,
            bullet_speed: 12.0,
            triple_spread: 2.0,

            laser_width: 8.0,
            laser_damage_multiplier: 2,

            shield_ms: 3_000,
            triple_ms: 5_000,
            laser_ms: 5_000,

            enemy_interval: Interval {
                base_ms: 2_000,
                per_point_ms: 5,
                floor_ms: 300,
            },
            first_enemy_ms: 1_000,
            homing_y_damping: 0.3,

            aura_base_radius: 50.0,
            aura_amplitude: 35.0,
            aura_phase_step: 0.1,
            aura_hit_cooldown_ms: 500,

            enemy_bullet_size: 12.0,
            enemy_bullet_speed: 4.0,
            enemy_bullet_damage: 50,

            power_up_interval: Interval {
                base_ms: 8_000,
                per_point_ms: 10,
                floor_ms: 5_000,
            },
            power_up_size: 30.0,
            power_up_speed: 3.0,
            power_up_margin: 20.0,

            coin_interval: Interval {
                base_ms: 5_000,
                per_point_ms: 5,
                floor_ms: 3_000,
            },
            coin_size: 25.0,
            coin_speed: 4.0,
            coin_margin: 20.0,
            coin_max_value: 3,
        }
    }
}

impl Tuning {
    /// These constants with enemies, power-ups and coins switched off. The
    /// ships still move, fire and collide.
    pub fn without_spawns(mut self) -> Self {
        self.first_enemy_ms = u64::MAX;
        for interval in [&mut self.power_up_interval, &mut self.coin_interval] {
            interval.base_ms = u64::MAX;
            interval.floor_ms = u64::MAX;
        }
        self
    }

    pub fn enemy(&self, kind: EnemyKind) -> EnemyProfile {
        match kind {
            EnemyKind::Enemy1 | EnemyKind::Enemy2 => EnemyProfile {
                size: 90.0,
                max_health: 10,
                base_speed: 4.0,
                speed_per_point: 0.02,
                homing_x: 1.5,
                homing_y: 0.3,
                contact_damage: 20,
                kill_score: 10,
                shoot_cooldown_ms: None,
                has_aura: false,
            },
            EnemyKind::EnemyLevel1 => EnemyProfile {
                size: 100.0,
                max_health: 15,
                base_speed: 5.0,
                speed_per_point: 0.03,
                homing_x: 2.5,
                homing_y: 0.5,
                contact_damage: 30,
                kill_score: 20,
                shoot_cooldown_ms: None,
                has_aura: false,
            },
            EnemyKind::EnemyLevel2 => EnemyProfile {
                size: 100.0,
                max_health: 20,
                base_speed: 6.0,
                speed_per_point: 0.03,
                homing_x: 3.0,
                homing_y: 0.6,
                contact_damage: 30,
                kill_score: 20,
                shoot_cooldown_ms: None,
                has_aura: true,
            },
            EnemyKind::Boss1 | EnemyKind::Boss2 => EnemyProfile {
                size: 140.0,
                max_health: if kind == EnemyKind::Boss1 { 50 } else { 60 },
                base_speed: 2.0,
                speed_per_point: 0.015,
                homing_x: 1.0,
                homing_y: 0.2,
                contact_damage: 50,
                kill_score: 50,
                shoot_cooldown_ms: Some(if kind == EnemyKind::Boss1 { 2_000 } else { 1_500 }),
                has_aura: false,
            },
        }
    }

    /// Spawn weights by total score bracket, in declaration order of
    /// [`EnemyKind`].
    pub fn enemy_weights(&self, score: u64) -> &'static [(EnemyKind, f32)] {
        use EnemyKind::*;
        match score {
            0..100 => &[(Enemy1, 0.5), (Enemy2, 0.5)],
            100..300 => &[(Enemy1, 0.4), (Enemy2, 0.4), (EnemyLevel1, 0.2)],
            300..500 => &[
                (Enemy1, 0.3),
                (Enemy2, 0.3),
                (EnemyLevel1, 0.2),
                (EnemyLevel2, 0.2),
            ],
            _ => &[
                (Enemy1, 0.2),
                (Enemy2, 0.2),
                (EnemyLevel1, 0.15),
                (EnemyLevel2, 0.15),
                (Boss1, 0.15),
                (Boss2, 0.15),
            ],
        }
    }
}
