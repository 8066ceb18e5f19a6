//! Lattice environment: entry arena, successor/predecessor generation,
//! start/goal handling, and the cost-change template.
//!
//! The environment is the single allocator of search entries. States are
//! addressed by a dense (x, y, heading) slot table; entries materialize on
//! first touch and are lazily reset by generation stamp instead of being
//! swept between replans.

use std::collections::HashSet;

use log::debug;

use crate::config::PlannerConfig;
use crate::core::{GridCell, Pose2D, WorldPoint};
use crate::costmap::CostGrid;
use crate::error::Result;
use crate::lattice::entry::{Entry, EntryId, INFINITE_COST};
use crate::lattice::heuristic::GridHeuristic;
use crate::lattice::primitives::PrimitiveSet;
use crate::lattice::state::{discretize_heading, heading_angle, LatticeState};

/// Slot value for "no entry materialized yet".
const INVALID_SLOT: u32 = u32::MAX;

/// The discretized search environment.
pub struct Lattice {
    window: usize,
    num_headings: usize,
    grid: CostGrid,
    prims: PrimitiveSet,
    heuristic: GridHeuristic,
    entries: Vec<Entry>,
    slots: Vec<u32>,
    generation: u32,
    start: Option<EntryId>,
    goal: Option<EntryId>,
    /// (dx, dy, heading) offsets of states whose outgoing edges cross a
    /// changed cell at the origin; translated per changed cell.
    affected_template: Vec<(i32, i32, u8)>,
}

impl Lattice {
    /// Build the environment from configuration.
    pub fn new(config: &PlannerConfig) -> Result<Self> {
        config.validate()?;

        let window = config.window_size;
        let num_headings = config.num_headings;
        let grid = CostGrid::new(
            window,
            window,
            config.resolution,
            WorldPoint::ZERO,
            config.lethal_cost,
        );
        let prims = PrimitiveSet::build(config);
        let affected_template = build_affected_template(&prims);

        debug!(
            "[Lattice] window {}x{}x{}, {} primitives, {} affected-pred offsets",
            window,
            window,
            num_headings,
            prims.all().len(),
            affected_template.len()
        );

        Ok(Self {
            window,
            num_headings,
            grid,
            prims,
            heuristic: GridHeuristic::new(window, window),
            entries: Vec::new(),
            slots: vec![INVALID_SLOT; window * window * num_headings],
            generation: 1,
            start: None,
            goal: None,
            affected_template,
        })
    }

    /// Window size in cells per axis.
    #[inline]
    pub fn window_size(&self) -> usize {
        self.window
    }

    /// Number of discrete headings.
    #[inline]
    pub fn num_headings(&self) -> usize {
        self.num_headings
    }

    /// Total lattice state count (window² × headings).
    #[inline]
    pub fn state_count(&self) -> usize {
        self.slots.len()
    }

    /// The cost grid.
    #[inline]
    pub fn grid(&self) -> &CostGrid {
        &self.grid
    }

    /// The primitive table.
    #[inline]
    pub fn primitives(&self) -> &PrimitiveSet {
        &self.prims
    }

    /// Current environment generation.
    #[inline]
    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Invalidate every entry by bumping the generation stamp.
    pub fn bump_generation(&mut self) {
        self.generation += 1;
        debug!("[Lattice] generation -> {}", self.generation);
    }

    /// Whether a state lies inside the window.
    #[inline]
    pub fn in_window(&self, state: LatticeState) -> bool {
        state.x >= 0
            && state.y >= 0
            && (state.x as usize) < self.window
            && (state.y as usize) < self.window
            && (state.theta as usize) < self.num_headings
    }

    #[inline]
    fn slot_index(&self, state: LatticeState) -> usize {
        (state.y as usize * self.window + state.x as usize) * self.num_headings
            + state.theta as usize
    }

    /// Entry for a state, materializing (or generation-freshening) it.
    /// Returns `None` outside the window.
    pub fn get_entry(&mut self, state: LatticeState) -> Option<EntryId> {
        if !self.in_window(state) {
            return None;
        }
        let slot = self.slot_index(state);
        let id = if self.slots[slot] == INVALID_SLOT {
            let id = EntryId(self.entries.len() as u32);
            self.entries.push(Entry::new(state, self.generation));
            self.slots[slot] = id.0;
            id
        } else {
            let id = EntryId(self.slots[slot]);
            self.entries[id.index()].freshen(self.generation);
            id
        };
        Some(id)
    }

    /// Entry id only if the state was already touched this generation.
    pub fn materialized(&self, state: LatticeState) -> Option<EntryId> {
        if !self.in_window(state) {
            return None;
        }
        let slot = self.slots[self.slot_index(state)];
        if slot == INVALID_SLOT {
            return None;
        }
        let id = EntryId(slot);
        (self.entries[id.index()].generation == self.generation).then_some(id)
    }

    /// Immutable entry access.
    #[inline]
    pub fn entry(&self, id: EntryId) -> &Entry {
        &self.entries[id.index()]
    }

    /// Mutable entry access.
    #[inline]
    pub fn entry_mut(&mut self, id: EntryId) -> &mut Entry {
        &mut self.entries[id.index()]
    }

    /// The whole arena, for heap maintenance.
    #[inline]
    pub(crate) fn entries_mut(&mut self) -> &mut [Entry] {
        &mut self.entries
    }

    /// Discretize a world pose onto the lattice.
    pub fn discretize(&self, pose: Pose2D) -> Option<LatticeState> {
        let cell = self.grid.world_to_cell(pose.position());
        let state = LatticeState::new(
            cell.x,
            cell.y,
            discretize_heading(self.num_headings, pose.theta),
        );
        self.in_window(state).then_some(state)
    }

    /// World pose of a state (cell center, nominal heading angle).
    pub fn state_pose(&self, state: LatticeState) -> Pose2D {
        let center = self.grid.cell_to_world(GridCell::new(state.x, state.y));
        Pose2D::new(
            center.x,
            center.y,
            heading_angle(self.num_headings, state.theta),
        )
    }

    /// Set the canonical start state from a world pose.
    ///
    /// Returns the entry and whether the discretized state changed; `None`
    /// when the pose discretizes outside the window.
    pub fn set_start(&mut self, pose: Pose2D) -> Option<(EntryId, bool)> {
        let state = self.discretize(pose)?;
        let changed = match self.start {
            Some(id) => self.entries[id.index()].state != state,
            None => true,
        };
        let id = self.get_entry(state)?;
        self.start = Some(id);
        Some((id, changed))
    }

    /// Set the canonical goal state from a world pose. Same contract as
    /// [`Lattice::set_start`].
    pub fn set_goal(&mut self, pose: Pose2D) -> Option<(EntryId, bool)> {
        let state = self.discretize(pose)?;
        let changed = match self.goal {
            Some(id) => self.entries[id.index()].state != state,
            None => true,
        };
        let id = self.get_entry(state)?;
        self.goal = Some(id);
        Some((id, changed))
    }

    /// Canonical start entry.
    #[inline]
    pub fn start(&self) -> Option<EntryId> {
        self.start
    }

    /// Canonical goal entry.
    #[inline]
    pub fn goal(&self) -> Option<EntryId> {
        self.goal
    }

    /// Successor edges of a state: (target, edge cost, primitive index).
    ///
    /// Infeasible edges (lethal swept cell or out-of-window target) are
    /// omitted.
    pub fn successors(&mut self, id: EntryId) -> Vec<(EntryId, u32, u16)> {
        let state = self.entries[id.index()].state;
        let count = self.prims.starting_at(state.theta).len();
        let mut edges = Vec::with_capacity(count);

        for i in 0..count {
            let pidx = self.prims.starting_at(state.theta)[i];
            let (delta, end_heading) = {
                let prim = self.prims.prim(pidx);
                (prim.delta, prim.end_heading)
            };
            let target = LatticeState::new(state.x + delta.x, state.y + delta.y, end_heading);
            if !self.in_window(target) {
                continue;
            }
            let Some(cost) = self.edge_cost(pidx, state.x, state.y) else {
                continue;
            };
            let Some(tid) = self.get_entry(target) else {
                continue;
            };
            edges.push((tid, cost, pidx as u16));
        }
        edges
    }

    /// Predecessor edges of a state: (source, edge cost, primitive index).
    pub fn predecessors(&mut self, id: EntryId) -> Vec<(EntryId, u32, u16)> {
        let state = self.entries[id.index()].state;
        let count = self.prims.ending_at(state.theta).len();
        let mut edges = Vec::with_capacity(count);

        for i in 0..count {
            let pidx = self.prims.ending_at(state.theta)[i];
            let (delta, start_heading) = {
                let prim = self.prims.prim(pidx);
                (prim.delta, prim.start_heading)
            };
            let source = LatticeState::new(state.x - delta.x, state.y - delta.y, start_heading);
            if !self.in_window(source) {
                continue;
            }
            let Some(cost) = self.edge_cost(pidx, source.x, source.y) else {
                continue;
            };
            let Some(sid) = self.get_entry(source) else {
                continue;
            };
            edges.push((sid, cost, pidx as u16));
        }
        edges
    }

    /// Cost of applying a primitive from a source cell, or `None` when any
    /// swept cell is lethal (or outside the window).
    ///
    /// Edge cost = primitive base cost × (max swept cell cost + 1).
    pub fn edge_cost(&self, prim_idx: usize, source_x: i32, source_y: i32) -> Option<u32> {
        let prim = self.prims.prim(prim_idx);
        let mut max_cost = 0u8;
        for cell in &prim.sweep {
            let grid_cell = GridCell::new(source_x + cell.x, source_y + cell.y);
            let cost = self.grid.cost(grid_cell);
            if cost >= self.grid.lethal() {
                return None;
            }
            max_cost = max_cost.max(cost);
        }
        Some(
            prim.base_cost
                .saturating_mul(max_cost as u32 + 1)
                .min(INFINITE_COST),
        )
    }

    /// Mutate one cell cost; marks the heuristic stale when the stored
    /// value changes. Returns whether it changed.
    pub fn update_cost(&mut self, cell: GridCell, cost: u8) -> bool {
        let changed = self.grid.update(cell, cost);
        if changed {
            self.heuristic.mark_dirty();
        }
        changed
    }

    /// Diff a full external cost window; marks the heuristic stale when
    /// anything changed. Returns the changed cells.
    pub fn apply_external_costs(&mut self, external: &[u8]) -> Vec<GridCell> {
        let changed = self.grid.apply_external(external);
        if !changed.is_empty() {
            self.heuristic.mark_dirty();
        }
        changed
    }

    /// Refresh the heuristic field toward the current start cell.
    ///
    /// Must run once per generation (and after cost edits) before keys are
    /// computed; values read before the refresh are stale.
    pub fn ensure_heuristics_updated(&mut self) -> bool {
        let Some(start) = self.start else {
            return false;
        };
        let state = self.entries[start.index()].state;
        self.heuristic
            .ensure_updated(&self.grid, GridCell::new(state.x, state.y))
    }

    /// Heuristic lower bound for an entry's cell.
    #[inline]
    pub fn heuristic_of(&self, id: EntryId) -> u32 {
        let state = self.entries[id.index()].state;
        self.heuristic.value_at(GridCell::new(state.x, state.y))
    }

    /// States whose outgoing edge costs may be affected by a change at
    /// `cell`: the precomputed template translated to that cell.
    pub fn affected_states(&self, cell: GridCell) -> Vec<LatticeState> {
        self.affected_template
            .iter()
            .map(|&(dx, dy, theta)| LatticeState::new(cell.x + dx, cell.y + dy, theta))
            .filter(|&s| self.in_window(s))
            .collect()
    }
}

/// For every primitive and every cell its footprint sweeps, record the
/// source-state offset relative to the swept cell. Computed once; reused by
/// translation for every changed cell.
fn build_affected_template(prims: &PrimitiveSet) -> Vec<(i32, i32, u8)> {
    let mut seen = HashSet::new();
    let mut template = Vec::new();
    for prim in prims.all() {
        for cell in &prim.sweep {
            let offset = (-cell.x, -cell.y, prim.start_heading);
            if seen.insert(offset) {
                template.push(offset);
            }
        }
    }
    template
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::costmap::costs;

    fn test_config() -> PlannerConfig {
        PlannerConfig {
            window_size: 12,
            resolution: 0.1,
            ..Default::default()
        }
    }

    fn test_lattice() -> Lattice {
        Lattice::new(&test_config()).unwrap()
    }

    #[test]
    fn test_get_entry_bounds() {
        let mut lattice = test_lattice();
        assert!(lattice.get_entry(LatticeState::new(0, 0, 0)).is_some());
        assert!(lattice.get_entry(LatticeState::new(11, 11, 15)).is_some());
        assert!(lattice.get_entry(LatticeState::new(-1, 0, 0)).is_none());
        assert!(lattice.get_entry(LatticeState::new(12, 0, 0)).is_none());
    }

    #[test]
    fn test_get_entry_is_idempotent() {
        let mut lattice = test_lattice();
        let state = LatticeState::new(3, 4, 5);
        let a = lattice.get_entry(state).unwrap();
        let b = lattice.get_entry(state).unwrap();
        assert_eq!(a, b);
        assert_eq!(lattice.entry(a).state, state);
    }

    #[test]
    fn test_generation_bump_freshens_lazily() {
        let mut lattice = test_lattice();
        let state = LatticeState::new(5, 5, 0);
        let id = lattice.get_entry(state).unwrap();
        lattice.entry_mut(id).g = 123;
        lattice.entry_mut(id).rhs = 123;

        lattice.bump_generation();
        assert!(lattice.materialized(state).is_none());

        let id2 = lattice.get_entry(state).unwrap();
        assert_eq!(id, id2);
        assert_eq!(lattice.entry(id2).g, INFINITE_COST);
        assert_eq!(lattice.entry(id2).rhs, INFINITE_COST);
        assert!(lattice.materialized(state).is_some());
    }

    #[test]
    fn test_successor_predecessor_inverse() {
        let mut lattice = test_lattice();
        let id = lattice.get_entry(LatticeState::new(6, 6, 3)).unwrap();
        let succs = lattice.successors(id);
        assert!(!succs.is_empty());

        for (succ, cost, prim) in succs {
            let preds = lattice.predecessors(succ);
            assert!(
                preds.iter().any(|&(p, c, pr)| p == id && c == cost && pr == prim),
                "missing inverse edge for primitive {}",
                prim
            );
        }
    }

    #[test]
    fn test_lethal_cell_prunes_edges() {
        let mut lattice = test_lattice();
        let id = lattice.get_entry(LatticeState::new(6, 6, 0)).unwrap();
        let before = lattice.successors(id).len();

        // Heading 0 short-forward sweeps (7,6); making it lethal must
        // remove at least that edge
        lattice.update_cost(GridCell::new(7, 6), costs::DEFAULT_LETHAL);
        let after = lattice.successors(id).len();
        assert!(after < before);
    }

    #[test]
    fn test_cell_cost_scales_edge() {
        let mut lattice = test_lattice();
        let id = lattice.get_entry(LatticeState::new(6, 6, 0)).unwrap();
        let forward_cost = |lattice: &mut Lattice, id| {
            lattice
                .successors(id)
                .into_iter()
                .find(|&(succ, _, _)| {
                    lattice.entry(succ).state == LatticeState::new(7, 6, 0)
                })
                .map(|(_, c, _)| c)
                .unwrap()
        };

        let free = forward_cost(&mut lattice, id);
        lattice.update_cost(GridCell::new(7, 6), 9);
        let penalized = forward_cost(&mut lattice, id);
        assert_eq!(penalized, free * 10);
    }

    #[test]
    fn test_set_start_reports_cell_change() {
        let mut lattice = test_lattice();
        let (a, changed_a) = lattice.set_start(Pose2D::new(0.35, 0.35, 0.0)).unwrap();
        assert!(changed_a);

        // Same cell, slightly different pose: not a change
        let (b, changed_b) = lattice.set_start(Pose2D::new(0.33, 0.36, 0.05)).unwrap();
        assert_eq!(a, b);
        assert!(!changed_b);

        let (_, changed_c) = lattice.set_start(Pose2D::new(0.95, 0.35, 0.0)).unwrap();
        assert!(changed_c);
    }

    #[test]
    fn test_set_goal_out_of_window_rejected() {
        let mut lattice = test_lattice();
        assert!(lattice.set_goal(Pose2D::new(5.0, 5.0, 0.0)).is_none());
        assert!(lattice.set_goal(Pose2D::new(-0.2, 0.1, 0.0)).is_none());
    }

    #[test]
    fn test_heuristic_refresh_tracks_start() {
        let mut lattice = test_lattice();
        assert!(!lattice.ensure_heuristics_updated());

        lattice.set_start(Pose2D::new(0.05, 0.05, 0.0)).unwrap();
        assert!(lattice.ensure_heuristics_updated());
        assert!(!lattice.ensure_heuristics_updated());

        let goal = lattice.get_entry(LatticeState::new(8, 0, 0)).unwrap();
        let h = lattice.heuristic_of(goal);
        assert!(h > 0 && h < INFINITE_COST);

        // Cost edits mark the field stale
        lattice.update_cost(GridCell::new(4, 0), 10);
        assert!(lattice.ensure_heuristics_updated());
    }

    #[test]
    fn test_affected_states_cover_crossing_prims() {
        let mut lattice = test_lattice();
        let changed = GridCell::new(7, 6);
        let affected = lattice.affected_states(changed);
        assert!(!affected.is_empty());

        // The state whose forward primitive sweeps (7,6) must be listed
        assert!(affected.contains(&LatticeState::new(6, 6, 0)));
        // And the state standing on the cell itself (turn-in-place sweeps it)
        assert!(affected.contains(&LatticeState::new(7, 6, 0)));

        // Every listed state really has an edge crossing the cell
        for state in affected {
            let found = lattice
                .primitives()
                .starting_at(state.theta)
                .iter()
                .any(|&pidx| {
                    lattice.primitives().prim(pidx).sweep.iter().any(|c| {
                        state.x + c.x == changed.x && state.y + c.y == changed.y
                    })
                });
            assert!(found, "state {:?} has no edge over {:?}", state, changed);
        }
    }
}
