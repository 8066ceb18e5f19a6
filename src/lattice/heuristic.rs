//! 2D grid heuristic provider.
//!
//! A Dijkstra sweep over (x, y) only, ignoring heading, rooted at the
//! search target. Because the search runs goal-to-start, the root is the
//! start cell and the value at (x, y) lower-bounds the remaining lattice
//! cost from any state in that cell. Built lazily: cost edits and root
//! moves mark it dirty, and `ensure_updated` recomputes at most once per
//! search call.

use crate::core::GridCell;
use crate::costmap::CostGrid;
use crate::lattice::INFINITE_COST;
use log::trace;
use std::cmp::Reverse;
use std::collections::BinaryHeap;

/// Straight-step base cost, matching one cell of octile travel.
const STEP_STRAIGHT: u32 = 1000;
/// Diagonal-step base cost (√2 cells).
const STEP_DIAGONAL: u32 = 1414;

/// Lazily refreshed per-cell lower bound on remaining path cost.
#[derive(Clone, Debug)]
pub struct GridHeuristic {
    width: usize,
    height: usize,
    dist: Vec<u32>,
    root: Option<GridCell>,
    dirty: bool,
}

impl GridHeuristic {
    /// Create an empty (stale) heuristic for a `width` x `height` window.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            dist: vec![INFINITE_COST; width * height],
            root: None,
            dirty: true,
        }
    }

    /// Invalidate cached values (cost change or generation bump).
    #[inline]
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Whether a refresh is pending for the given root.
    #[inline]
    pub fn is_stale(&self, root: GridCell) -> bool {
        self.dirty || self.root != Some(root)
    }

    /// Recompute the field if stale. Returns true when work was done.
    pub fn ensure_updated(&mut self, grid: &CostGrid, root: GridCell) -> bool {
        if !self.is_stale(root) {
            return false;
        }

        self.dist.fill(INFINITE_COST);
        let mut open: BinaryHeap<Reverse<(u32, u32)>> = BinaryHeap::new();

        if grid.contains(root) {
            let root_idx = self.index(root);
            self.dist[root_idx] = 0;
            open.push(Reverse((0, root_idx as u32)));
        }

        // 8-connected relaxation; lethal cells stay unreachable
        const NEIGHBORS: [(i32, i32, u32); 8] = [
            (1, 0, STEP_STRAIGHT),
            (-1, 0, STEP_STRAIGHT),
            (0, 1, STEP_STRAIGHT),
            (0, -1, STEP_STRAIGHT),
            (1, 1, STEP_DIAGONAL),
            (1, -1, STEP_DIAGONAL),
            (-1, 1, STEP_DIAGONAL),
            (-1, -1, STEP_DIAGONAL),
        ];

        let mut expanded = 0usize;
        while let Some(Reverse((d, idx))) = open.pop() {
            if d > self.dist[idx as usize] {
                continue;
            }
            expanded += 1;

            let x = (idx as usize % self.width) as i32;
            let y = (idx as usize / self.width) as i32;

            for &(dx, dy, step) in &NEIGHBORS {
                let cell = GridCell::new(x + dx, y + dy);
                if !grid.contains(cell) || grid.is_lethal(cell) {
                    continue;
                }
                let next_idx = self.index(cell);
                let step_cost = step * (grid.cost(cell) as u32 + 1);
                let next = d.saturating_add(step_cost).min(INFINITE_COST);
                if next < self.dist[next_idx] {
                    self.dist[next_idx] = next;
                    open.push(Reverse((next, next_idx as u32)));
                }
            }
        }

        trace!("[Heuristic] refreshed from ({}, {}): {} cells expanded", root.x, root.y, expanded);
        self.root = Some(root);
        self.dirty = false;
        true
    }

    /// Lower bound at a cell; infinite outside the window or unreachable.
    #[inline]
    pub fn value_at(&self, cell: GridCell) -> u32 {
        if cell.x < 0
            || cell.y < 0
            || cell.x as usize >= self.width
            || cell.y as usize >= self.height
        {
            return INFINITE_COST;
        }
        self.dist[cell.y as usize * self.width + cell.x as usize]
    }

    #[inline]
    fn index(&self, cell: GridCell) -> usize {
        cell.y as usize * self.width + cell.x as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::WorldPoint;
    use crate::costmap::costs;

    fn free_grid(size: usize) -> CostGrid {
        CostGrid::new(size, size, 0.1, WorldPoint::ZERO, costs::DEFAULT_LETHAL)
    }

    #[test]
    fn test_zero_at_root_and_octile_away() {
        let grid = free_grid(10);
        let mut heur = GridHeuristic::new(10, 10);
        heur.ensure_updated(&grid, GridCell::new(0, 0));

        assert_eq!(heur.value_at(GridCell::new(0, 0)), 0);
        assert_eq!(heur.value_at(GridCell::new(3, 0)), 3 * STEP_STRAIGHT);
        assert_eq!(heur.value_at(GridCell::new(2, 2)), 2 * STEP_DIAGONAL);
        assert_eq!(
            heur.value_at(GridCell::new(2, 1)),
            STEP_DIAGONAL + STEP_STRAIGHT
        );
    }

    #[test]
    fn test_wall_forces_detour() {
        let mut grid = free_grid(10);
        for y in 0..9 {
            grid.update(GridCell::new(5, y), costs::DEFAULT_LETHAL);
        }
        let mut heur = GridHeuristic::new(10, 10);
        heur.ensure_updated(&grid, GridCell::new(0, 0));

        let direct = 8 * STEP_STRAIGHT;
        assert!(heur.value_at(GridCell::new(8, 0)) > direct);
        assert!(heur.value_at(GridCell::new(8, 0)) < INFINITE_COST);
    }

    #[test]
    fn test_sealed_region_unreachable() {
        let mut grid = free_grid(10);
        for y in 0..10 {
            grid.update(GridCell::new(5, y), costs::DEFAULT_LETHAL);
        }
        let mut heur = GridHeuristic::new(10, 10);
        heur.ensure_updated(&grid, GridCell::new(0, 0));

        assert_eq!(heur.value_at(GridCell::new(8, 0)), INFINITE_COST);
    }

    #[test]
    fn test_cell_costs_scale_steps() {
        let mut grid = free_grid(10);
        grid.update(GridCell::new(1, 0), 4);
        let mut heur = GridHeuristic::new(10, 10);
        heur.ensure_updated(&grid, GridCell::new(0, 0));

        // Stepping into cost-4 cell pays (4 + 1) x the base step
        assert_eq!(heur.value_at(GridCell::new(1, 0)), 5 * STEP_STRAIGHT);
    }

    #[test]
    fn test_lazy_refresh() {
        let mut grid = free_grid(10);
        let mut heur = GridHeuristic::new(10, 10);
        let root = GridCell::new(0, 0);

        assert!(heur.ensure_updated(&grid, root));
        assert!(!heur.ensure_updated(&grid, root));

        grid.update(GridCell::new(3, 3), 9);
        heur.mark_dirty();
        assert!(heur.ensure_updated(&grid, root));

        // Root move also forces a refresh
        assert!(heur.ensure_updated(&grid, GridCell::new(2, 2)));
    }
}
