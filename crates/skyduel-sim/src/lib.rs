//! Deterministic authoritative simulator for skyduel.
//!
//! A [`World`] is one session's combat simulation: ships, projectiles,
//! enemies, power-ups and coins. It is pure and synchronous:
//!
//! - fixed timestep only (`tick * tick_ms` is the clock)
//! - seeded RNG only ([`rand_pcg::Pcg32`])
//! - stable iteration order (vectors in spawn order, slots host first)
//! - no I/O, no tasks, no wall clock
//!
//! so two worlds built from the same [`SimConfig`] and fed the same inputs
//! produce identical [`Snapshot`](skyduel_protocol::Snapshot)s tick for
//! tick. The server runs one inside each session actor; clients run one in
//! solo mode when they fall back to local simulation.

mod collision;
mod error;
pub mod movement;
mod spawn;
pub mod tuning;
mod world;

pub use collision::Aabb;
pub use error::SimError;
pub use tuning::{EnemyProfile, Interval, Tuning};
pub use world::{SimConfig, World};
