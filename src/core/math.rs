//! Math helpers for angles and grid distances.

use std::f32::consts::PI;

/// Normalize an angle to [-π, π).
#[inline]
pub fn normalize_angle(angle: f32) -> f32 {
    let mut a = angle % (2.0 * PI);
    if a >= PI {
        a -= 2.0 * PI;
    } else if a < -PI {
        a += 2.0 * PI;
    }
    a
}

/// Octile distance between two cells, in cells.
///
/// The shortest 8-connected path length: diagonal steps for the shorter
/// axis, straight steps for the remainder.
#[inline]
pub fn octile_distance(dx: i32, dy: i32) -> f32 {
    let dx = dx.abs() as f32;
    let dy = dy.abs() as f32;
    let min = dx.min(dy);
    let max = dx.max(dy);
    min * std::f32::consts::SQRT_2 + (max - min)
}
