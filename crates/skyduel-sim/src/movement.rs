//! Player movement, shared by the simulator and client-side prediction.
//!
//! Prediction only stays within the correction threshold if both sides move
//! a ship with the very same arithmetic, so this is the one place it lives.

use skyduel_protocol::{Field, InputSample, ShipStats};

/// Moves a ship of `size` at `(x, y)` by one input sample, clamped so the
/// ship stays fully inside `field`.
pub fn step_position(
    x: f32,
    y: f32,
    input: &InputSample,
    ship: &ShipStats,
    field: Field,
    size: f32,
) -> (f32, f32) {
    let (dx, dy) = input.direction();
    let speed = ship.speed as f32;
    let max_x = (field.width - size).max(0.0);
    let max_y = (field.height - size).max(0.0);
    (
        (x + dx * speed).clamp(0.0, max_x),
        (y + dy * speed).clamp(0.0, max_y),
    )
}
