//! Point and cell coordinate types.

use serde::{Deserialize, Serialize};
use std::ops::{Add, Sub};

/// Grid cell coordinates (integer cell indices).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct GridCell {
    /// X coordinate (column index)
    pub x: i32,
    /// Y coordinate (row index)
    pub y: i32,
}

impl GridCell {
    /// Create a new cell coordinate.
    #[inline]
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl Add for GridCell {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        GridCell::new(self.x + other.x, self.y + other.y)
    }
}

impl Sub for GridCell {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        GridCell::new(self.x - other.x, self.y - other.y)
    }
}

/// World coordinates (meters).
#[derive(Clone, Copy, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct WorldPoint {
    /// X position in meters.
    pub x: f32,
    /// Y position in meters.
    pub y: f32,
}

impl WorldPoint {
    /// Origin point.
    pub const ZERO: WorldPoint = WorldPoint { x: 0.0, y: 0.0 };

    /// Create a new world point.
    #[inline]
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point.
    #[inline]
    pub fn distance(&self, other: &WorldPoint) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}
