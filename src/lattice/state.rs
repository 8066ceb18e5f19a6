//! Lattice state: a discretized (x, y, heading) cell.

use crate::core::normalize_angle;
use std::f32::consts::TAU;

/// Integer displacement vectors for 16 discrete headings.
///
/// Heading k nominally points at k * 22.5 degrees; the vector is the
/// smallest integer cell step whose direction matches that heading, so a
/// "straight" primitive always ends exactly on the lattice.
const HEADING_VECTORS_16: [(i32, i32); 16] = [
    (1, 0),
    (2, 1),
    (1, 1),
    (1, 2),
    (0, 1),
    (-1, 2),
    (-1, 1),
    (-2, 1),
    (-1, 0),
    (-2, -1),
    (-1, -1),
    (-1, -2),
    (0, -1),
    (1, -2),
    (1, -1),
    (2, -1),
];

/// Integer displacement vectors for 8 discrete headings (45-degree steps).
const HEADING_VECTORS_8: [(i32, i32); 8] = [
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
    (-1, 0),
    (-1, -1),
    (0, -1),
    (1, -1),
];

/// A discretized lattice state. Immutable identity key for entry lookup.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct LatticeState {
    /// Cell X index.
    pub x: i32,
    /// Cell Y index.
    pub y: i32,
    /// Discrete heading index in `[0, num_headings)`.
    pub theta: u8,
}

impl LatticeState {
    /// Create a new lattice state.
    #[inline]
    pub fn new(x: i32, y: i32, theta: u8) -> Self {
        Self { x, y, theta }
    }
}

/// Unit cell step for a discrete heading.
#[inline]
pub fn heading_vector(num_headings: usize, heading: u8) -> (i32, i32) {
    match num_headings {
        8 => HEADING_VECTORS_8[heading as usize],
        _ => HEADING_VECTORS_16[heading as usize],
    }
}

/// Nominal angle of a discrete heading, radians in [-π, π).
#[inline]
pub fn heading_angle(num_headings: usize, heading: u8) -> f32 {
    normalize_angle(heading as f32 * TAU / num_headings as f32)
}

/// Discretize a continuous heading to the nearest heading index.
#[inline]
pub fn discretize_heading(num_headings: usize, theta: f32) -> u8 {
    let step = TAU / num_headings as f32;
    let idx = (normalize_angle(theta) / step).round() as i32;
    idx.rem_euclid(num_headings as i32) as u8
}

/// Wrap a heading index delta onto `[0, num_headings)`.
#[inline]
pub fn wrap_heading(num_headings: usize, heading: i32) -> u8 {
    heading.rem_euclid(num_headings as i32) as u8
}
