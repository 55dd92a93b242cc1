//! Spawn timers and entity construction.
//!
//! Each spawner keeps its own deadline. When a deadline passes the entity
//! is created and the next deadline is set from the interval at the
//! current score, so rising score tightens future spawns without touching
//! the one already scheduled.

use rand::Rng;
use rand_pcg::Pcg32;
use skyduel_protocol::{Coin, Enemy, EnemyKind, Field, PowerUp, PowerUpKind};

use crate::tuning::{Interval, Tuning};

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SpawnTimer {
    next_at_ms: u64,
}

impl SpawnTimer {
    pub(crate) fn starting_at(first_ms: u64) -> Self {
        Self {
            next_at_ms: first_ms,
        }
    }

    /// Returns `true` once per elapsed deadline and schedules the next.
    pub(crate) fn fire(&mut self, now: u64, interval: &Interval, score: u64) -> bool {
        if now < self.next_at_ms {
            return false;
        }
        self.next_at_ms = now + interval.at(score);
        true
    }
}

fn uniform_x(rng: &mut Pcg32, lo: f32, hi: f32) -> f32 {
    if hi > lo { rng.random_range(lo..hi) } else { lo.max(0.0) }
}

pub(crate) fn pick_enemy_kind(rng: &mut Pcg32, tuning: &Tuning, score: u64) -> EnemyKind {
    let weights = tuning.enemy_weights(score);
    let roll: f32 = rng.random();
    let mut acc = 0.0;
    for &(kind, w) in weights {
        acc += w;
        if roll < acc {
            return kind;
        }
    }
    // Rounding left the roll past the last bucket.
    weights.last().map_or(EnemyKind::Enemy1, |&(kind, _)| kind)
}

pub(crate) fn enemy(
    id: u64,
    rng: &mut Pcg32,
    tuning: &Tuning,
    field: Field,
    score: u64,
    now: u64,
) -> Enemy {
    let kind = pick_enemy_kind(rng, tuning, score);
    let profile = tuning.enemy(kind);
    let x = uniform_x(rng, 0.0, field.width - profile.size);
    Enemy {
        id,
        kind,
        x,
        y: -profile.size,
        width: profile.size,
        height: profile.size,
        health: profile.max_health,
        max_health: profile.max_health,
        speed: profile.base_speed + score as f32 * profile.speed_per_point,
        aura_radius: profile.has_aura.then_some(tuning.aura_base_radius),
        aura_phase: 0.0,
        aura_hit_ms: [None, None],
        last_shot_ms: profile.shoot_cooldown_ms.map(|_| now),
    }
}

pub(crate) fn power_up(id: u64, rng: &mut Pcg32, tuning: &Tuning, field: Field) -> PowerUp {
    let kind = match rng.random_range(0..3u8) {
        0 => PowerUpKind::Shield,
        1 => PowerUpKind::TripleShot,
        _ => PowerUpKind::Laser,
    };
    let x = uniform_x(
        rng,
        tuning.power_up_margin,
        field.width - 2.0 * tuning.power_up_margin,
    );
    PowerUp {
        id,
        kind,
        x,
        y: -tuning.power_up_size,
        size: tuning.power_up_size,
        speed: tuning.power_up_speed,
    }
}

pub(crate) fn coin(id: u64, rng: &mut Pcg32, tuning: &Tuning, field: Field) -> Coin {
    let value = rng.random_range(1..=tuning.coin_max_value.max(1));
    let x = uniform_x(
        rng,
        tuning.coin_margin,
        field.width - tuning.coin_margin - tuning.coin_size,
    );
    Coin {
        id,
        x,
        y: -tuning.coin_size,
        size: tuning.coin_size,
        speed: tuning.coin_speed,
        value,
    }
}
