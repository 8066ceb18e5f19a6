//! Bounded traversal-cost grid for the lattice window.
//!
//! Stores one cost byte per cell in `[0, lethal]` and remembers the last
//! value written, so externally reported cost updates can be diffed down to
//! the cells that actually changed.

use crate::core::{GridCell, WorldPoint};

/// Named cost levels used by the planner.
pub mod costs {
    /// Safe to traverse, no penalty.
    pub const FREE: u8 = 0;
    /// Default lethal threshold: at or above this the cell is an obstacle.
    pub const DEFAULT_LETHAL: u8 = 20;
}

/// Per-cell traversal cost over the lattice window.
///
/// Coordinates are window-local cells; world conversion uses the window
/// origin and resolution. Out-of-bounds queries return the lethal cost.
#[derive(Clone, Debug)]
pub struct CostGrid {
    width: usize,
    height: usize,
    resolution: f32,
    origin: WorldPoint,
    lethal: u8,
    cells: Vec<u8>,
}

impl CostGrid {
    /// Create a free grid of `width` x `height` cells.
    pub fn new(width: usize, height: usize, resolution: f32, origin: WorldPoint, lethal: u8) -> Self {
        Self {
            width,
            height,
            resolution,
            origin,
            lethal,
            cells: vec![costs::FREE; width * height],
        }
    }

    /// Grid width in cells.
    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Grid height in cells.
    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Resolution in meters per cell.
    #[inline]
    pub fn resolution(&self) -> f32 {
        self.resolution
    }

    /// The lethal cost bound.
    #[inline]
    pub fn lethal(&self) -> u8 {
        self.lethal
    }

    /// Whether a cell lies inside the window.
    #[inline]
    pub fn contains(&self, cell: GridCell) -> bool {
        cell.x >= 0 && cell.y >= 0 && (cell.x as usize) < self.width && (cell.y as usize) < self.height
    }

    /// Cost at a cell; lethal outside the window.
    #[inline]
    pub fn cost(&self, cell: GridCell) -> u8 {
        if !self.contains(cell) {
            return self.lethal;
        }
        self.cells[cell.y as usize * self.width + cell.x as usize]
    }

    /// Whether a cell is at or above the lethal bound.
    #[inline]
    pub fn is_lethal(&self, cell: GridCell) -> bool {
        self.cost(cell) >= self.lethal
    }

    /// Write a cost value, clamped to `[0, lethal]`.
    ///
    /// Returns true when the stored value changed (the diffable contract:
    /// callers collect changed cells for incremental search repair).
    pub fn update(&mut self, cell: GridCell, cost: u8) -> bool {
        if !self.contains(cell) {
            return false;
        }
        let clamped = cost.min(self.lethal);
        let slot = &mut self.cells[cell.y as usize * self.width + cell.x as usize];
        if *slot == clamped {
            return false;
        }
        *slot = clamped;
        true
    }

    /// Diff a full external cost window against the stored one.
    ///
    /// `external` must be row-major `width * height` values already in this
    /// grid's `[0, lethal]` range. Returns the cells whose stored cost
    /// changed.
    pub fn apply_external(&mut self, external: &[u8]) -> Vec<GridCell> {
        debug_assert_eq!(external.len(), self.cells.len());
        let mut changed = Vec::new();
        for y in 0..self.height as i32 {
            for x in 0..self.width as i32 {
                let cell = GridCell::new(x, y);
                if self.update(cell, external[y as usize * self.width + x as usize]) {
                    changed.push(cell);
                }
            }
        }
        changed
    }

    /// Convert world coordinates to a window cell.
    #[inline]
    pub fn world_to_cell(&self, point: WorldPoint) -> GridCell {
        GridCell::new(
            ((point.x - self.origin.x) / self.resolution).floor() as i32,
            ((point.y - self.origin.y) / self.resolution).floor() as i32,
        )
    }

    /// Convert a window cell to world coordinates (cell center).
    #[inline]
    pub fn cell_to_world(&self, cell: GridCell) -> WorldPoint {
        WorldPoint::new(
            self.origin.x + (cell.x as f32 + 0.5) * self.resolution,
            self.origin.y + (cell.y as f32 + 0.5) * self.resolution,
        )
    }
}
