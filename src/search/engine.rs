//! Anytime incremental lattice search.
//!
//! Goal-to-start AD*-style search: `g` is the best known cost from a state
//! to the goal, `rhs` the one-step lookahead. The engine repairs the search
//! tree incrementally across replans and tightens an epsilon suboptimality
//! bound within each call while the time budget lasts. Expansion work is
//! reused: a converged search re-queried with nothing changed extracts the
//! same path with zero expansions.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use log::{debug, info, trace, warn};

use crate::config::PlannerConfig;
use crate::core::{GridCell, Pose2D};
use crate::error::Result;
use crate::lattice::entry::{add_costs, EntryId, SearchKey, INFINITE_COST};
use crate::lattice::state::wrap_heading;
use crate::lattice::{Lattice, LatticeState};

use super::open_list::OpenList;
use super::result::{PathPoint, PlanFailure, PlanResult};

/// Half-width of the cross of start candidates under start broadening.
const START_BROADEN_RANGE: i32 = 2;
/// Half-width of the seeded goal neighborhood under goal broadening.
const GOAL_BROADEN_CELLS: i32 = 3;
/// Heading half-range of the seeded goal neighborhood.
const GOAL_BROADEN_HEADINGS: i32 = 1;

/// Outcome of one expansion pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum PassOutcome {
    /// The start-side bound was met under the current epsilon.
    Satisfied,
    /// OPEN emptied before the start bound was met.
    NoSolution,
    /// The wall-clock budget elapsed mid-pass.
    OutOfTime,
}

/// The incremental anytime planner.
pub struct AdStarPlanner {
    config: PlannerConfig,
    lattice: Lattice,
    open: OpenList,
    incons: Vec<EntryId>,
    epsilon: f64,
    epsilon_satisfied: f64,
    round: u32,
    need_reinit: bool,
    goal_entries: HashSet<EntryId>,
    first_met: Option<EntryId>,
    deadline: Instant,
    expansions: usize,
}

impl AdStarPlanner {
    /// Build a planner from configuration.
    pub fn new(config: PlannerConfig) -> Result<Self> {
        let lattice = Lattice::new(&config)?;
        Ok(Self {
            epsilon: config.initial_epsilon,
            epsilon_satisfied: f64::INFINITY,
            config,
            lattice,
            open: OpenList::new(),
            incons: Vec::new(),
            round: 0,
            need_reinit: true,
            goal_entries: HashSet::new(),
            first_met: None,
            deadline: Instant::now(),
            expansions: 0,
        })
    }

    /// The environment (read-only).
    #[inline]
    pub fn lattice(&self) -> &Lattice {
        &self.lattice
    }

    /// Configuration in use.
    #[inline]
    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Suboptimality bound satisfied by the last successful search, or
    /// infinity when none is in force.
    #[inline]
    pub fn epsilon_satisfied(&self) -> f64 {
        self.epsilon_satisfied
    }

    /// Current environment generation.
    #[inline]
    pub fn generation(&self) -> u32 {
        self.lattice.generation()
    }

    /// Number of entries pending expansion.
    #[inline]
    pub fn open_len(&self) -> usize {
        self.open.len()
    }

    /// Force a from-scratch search on the next `plan` call.
    pub fn schedule_reinitialization(&mut self) {
        self.need_reinit = true;
    }

    /// Diagnostic: outside an expansion pass, every OPEN member must be
    /// inconsistent and no consistent entry may sit in OPEN or INCONS.
    pub fn check_queue_invariants(&self) -> bool {
        let open_ok = self
            .open
            .ids()
            .iter()
            .all(|&id| !self.lattice.entry(id).is_consistent());
        let incons_ok = self.incons.iter().all(|&id| {
            let e = self.lattice.entry(id);
            !e.in_incons() || !e.is_consistent()
        });
        open_ok && incons_ok
    }

    /// Apply external cell cost updates, diffing against stored values,
    /// and repair the search. Returns true when incremental repair was
    /// applied, false when a full reinitialization was scheduled instead.
    ///
    /// Must be called between searches, never concurrently with `plan`.
    pub fn update_costs(&mut self, updates: &[(GridCell, u8)]) -> bool {
        let mut changed = Vec::new();
        for &(cell, cost) in updates {
            if self.lattice.update_cost(cell, cost) {
                changed.push(cell);
            }
        }
        if changed.is_empty() {
            return true;
        }
        self.costs_changed(&changed)
    }

    /// Diff a full external cost window (row-major, window × window, in
    /// `[0, lethal]`) against the stored grid and repair the search.
    /// Returns the same incremental-vs-reinit flag as
    /// [`AdStarPlanner::costs_changed`].
    pub fn apply_external_costs(&mut self, external: &[u8]) -> bool {
        let changed = self.lattice.apply_external_costs(external);
        if changed.is_empty() {
            return true;
        }
        self.costs_changed(&changed)
    }

    /// Repair the search after the given cells changed cost.
    ///
    /// Translates the precomputed affected-predecessor template to every
    /// changed cell and refreshes the touched states' `rhs` and queue
    /// membership proactively. Returns true when incremental repair was
    /// applied, false when the affected-state count tripped the
    /// force-scratch threshold and a full reinitialization was scheduled.
    pub fn costs_changed(&mut self, changed_cells: &[GridCell]) -> bool {
        if changed_cells.is_empty() {
            return true;
        }
        if self.need_reinit {
            // a from-scratch search is already pending; nothing to repair
            return false;
        }

        let mut seen = HashSet::new();
        let mut affected = Vec::new();
        for &cell in changed_cells {
            for state in self.lattice.affected_states(cell) {
                if let Some(id) = self.lattice.materialized(state) {
                    if seen.insert(id) {
                        affected.push(id);
                    }
                }
            }
        }
        debug!(
            "[AdStar] {} changed cells touch {} materialized states",
            changed_cells.len(),
            affected.len()
        );
        if affected.is_empty() {
            return true;
        }

        // a changed cost map invalidates the proven bound
        self.epsilon = self.config.initial_epsilon;
        self.epsilon_satisfied = f64::INFINITY;

        if affected.len() > self.config.force_scratch_limit
            || affected.len() > self.lattice.state_count() / 10
        {
            info!(
                "[AdStar] {} affected states exceed the repair threshold, scheduling reinit",
                affected.len()
            );
            self.need_reinit = true;
            return false;
        }

        for id in affected {
            self.recompute_rhs(id);
            self.update_membership(id);
        }
        true
    }

    /// Plan from `start` to `goal` under the configured time budget.
    ///
    /// Reuses prior search effort when start, goal, and costs allow;
    /// otherwise reinitializes. All outcomes are reported through the
    /// result; no panics cross this boundary.
    pub fn plan(&mut self, start: Pose2D, goal: Pose2D) -> PlanResult {
        self.deadline = Instant::now()
            + Duration::from_secs_f32(self.config.allocated_time_secs.max(0.0));

        // Goal first: a goal change schedules reinitialization before any
        // start bookkeeping happens.
        let Some((_, goal_changed)) = self.lattice.set_goal(goal) else {
            debug!("[AdStar] rejected: goal discretizes outside the window");
            return PlanResult::failed(PlanFailure::InvalidRequest, 0);
        };
        let Some((_, start_changed)) = self.lattice.set_start(start) else {
            debug!("[AdStar] rejected: start discretizes outside the window");
            return PlanResult::failed(PlanFailure::InvalidRequest, 0);
        };

        if start_changed {
            // the proven bound belonged to the old start cell
            self.epsilon = self.config.initial_epsilon;
            self.epsilon_satisfied = f64::INFINITY;
        }
        if goal_changed {
            self.need_reinit = true;
        }

        self.search()
    }

    /// The anytime outer loop.
    fn search(&mut self) -> PlanResult {
        if self.need_reinit {
            self.reinitialize();
        }
        self.lattice.ensure_heuristics_updated();
        self.expansions = 0;

        let mut last_outcome = None;
        while self.epsilon_satisfied > 1.0 && Instant::now() < self.deadline {
            if (self.epsilon_satisfied - self.epsilon).abs() < 1e-6 {
                // the current target bound is proven: tighten it and open
                // a new round (previous round's CLOSED set is forgotten)
                self.epsilon = (self.epsilon - 1.0).max(1.0);
                self.round += 1;
            }

            // move deferred INCONS entries into OPEN
            let deferred: Vec<EntryId> = self.incons.drain(..).collect();
            for id in deferred {
                if !self.lattice.entry(id).in_incons() {
                    continue; // lazily removed
                }
                self.lattice.entry_mut(id).in_incons = false;
                if self.lattice.entry(id).in_open() {
                    continue;
                }
                self.compute_key(id);
                self.open.push(self.lattice.entries_mut(), id);
            }

            // every resident key depends on epsilon: recompute, re-heapify
            let resident: Vec<EntryId> = self.open.ids().to_vec();
            for id in resident {
                self.compute_key(id);
            }
            self.open.rebuild(self.lattice.entries_mut());

            let outcome = self.compute_or_improve_path();
            match outcome {
                PassOutcome::Satisfied => {
                    self.epsilon_satisfied = self.epsilon;
                    info!(
                        "[AdStar] bound {:.2} satisfied ({} expansions so far)",
                        self.epsilon, self.expansions
                    );
                    last_outcome = Some(outcome);
                }
                _ => {
                    last_outcome = Some(outcome);
                    break;
                }
            }
        }

        if self.epsilon_satisfied.is_finite() {
            let Some(first) = self.first_met else {
                warn!("[AdStar] satisfied bound without a start-side entry");
                return PlanResult::failed(
                    PlanFailure::ReconstructionInconsistency,
                    self.expansions,
                );
            };
            let cost = self.lattice.entry(first).g;
            match self.extract_path(first) {
                Some(path) => PlanResult {
                    path,
                    cost,
                    epsilon: self.epsilon_satisfied,
                    expansions: self.expansions,
                    success: true,
                    failure_reason: None,
                },
                None => PlanResult::failed(
                    PlanFailure::ReconstructionInconsistency,
                    self.expansions,
                ),
            }
        } else {
            let reason = match last_outcome {
                Some(PassOutcome::NoSolution) => PlanFailure::NoSolution,
                _ => PlanFailure::TimeExhausted,
            };
            debug!("[AdStar] no bound satisfied: {:?}", reason);
            PlanResult::failed(reason, self.expansions)
        }
    }

    /// Reset the search: clear queues, reseed the goal side, bump the
    /// environment generation so every stale entry reads as unvisited.
    fn reinitialize(&mut self) {
        let Some(goal_id) = self.lattice.goal() else {
            return;
        };
        let goal_state = self.lattice.entry(goal_id).state;

        self.open.clear(self.lattice.entries_mut());
        for id in self.incons.drain(..) {
            self.lattice.entry_mut(id).in_incons = false;
        }

        self.epsilon = self.config.initial_epsilon;
        self.epsilon_satisfied = f64::INFINITY;
        self.lattice.bump_generation();
        self.round += 1;
        self.first_met = None;
        self.goal_entries.clear();

        // re-materialize the canonical goal in the new generation
        let Some(goal_id) = self.lattice.get_entry(goal_state) else {
            return;
        };

        if self.config.broaden_goal {
            let n = self.lattice.num_headings();
            for dx in -GOAL_BROADEN_CELLS..=GOAL_BROADEN_CELLS {
                for dy in -GOAL_BROADEN_CELLS..=GOAL_BROADEN_CELLS {
                    for dt in -GOAL_BROADEN_HEADINGS..=GOAL_BROADEN_HEADINGS {
                        let state = LatticeState::new(
                            goal_state.x + dx,
                            goal_state.y + dy,
                            wrap_heading(n, goal_state.theta as i32 + dt),
                        );
                        let Some(id) = self.lattice.get_entry(state) else {
                            continue;
                        };
                        self.seed_goal_entry(id, goal_id);
                    }
                }
            }
        } else {
            self.seed_goal_entry(goal_id, goal_id);
        }

        self.need_reinit = false;
        debug!(
            "[AdStar] reinitialized: generation {}, {} goal entries seeded",
            self.lattice.generation(),
            self.goal_entries.len()
        );
    }

    /// Seed one terminal entry with `rhs = 0` and push it into OPEN.
    /// Non-canonical entries back-point at the canonical goal so path
    /// extraction always terminates there.
    fn seed_goal_entry(&mut self, id: EntryId, canonical: EntryId) {
        {
            let e = self.lattice.entry_mut(id);
            e.rhs = 0;
            e.best_next = (id != canonical).then_some(canonical);
        }
        self.compute_key(id);
        self.open.push(self.lattice.entries_mut(), id);
        self.goal_entries.insert(id);
    }

    /// One expansion pass under the current epsilon.
    fn compute_or_improve_path(&mut self) -> PassOutcome {
        let Some(canonical_start) = self.lattice.start() else {
            return PassOutcome::NoSolution;
        };
        let start_list = self.start_candidates(canonical_start);

        loop {
            if Instant::now() >= self.deadline {
                return PassOutcome::OutOfTime;
            }
            let Some(min_id) = self.open.peek() else {
                return PassOutcome::NoSolution;
            };
            let min_key = self.lattice.entry(min_id).key;

            // Termination: a start candidate is "first met" once it is
            // consistent and its key no longer exceeds the queue minimum.
            // Ties between candidates resolve to the lowest g, then the
            // lowest (x, y, theta).
            let mut met: Option<(u32, (i32, i32, u8), EntryId)> = None;
            for &cand in &start_list {
                let e = self.lattice.entry(cand);
                if e.rhs != e.g {
                    continue;
                }
                if min_key < self.key_for(cand) {
                    continue;
                }
                let rank = (e.g, (e.state.x, e.state.y, e.state.theta));
                if met.map_or(true, |(g, s, _)| rank < (g, s)) {
                    met = Some((rank.0, rank.1, cand));
                }
            }
            if let Some((_, _, id)) = met {
                self.first_met = Some(id);
                return PassOutcome::Satisfied;
            }

            self.open.pop(self.lattice.entries_mut());
            self.expansions += 1;
            trace!(
                "[AdStar] expand {:?}",
                self.lattice.entry(min_id).state
            );

            let (g, rhs) = {
                let e = self.lattice.entry(min_id);
                (e.g, e.rhs)
            };
            if g > rhs {
                // overconsistent: settle at the lookahead value, close for
                // this round, and offer the improvement to predecessors
                {
                    let round = self.round;
                    let e = self.lattice.entry_mut(min_id);
                    e.g = e.rhs;
                    e.closed_round = round;
                }
                self.propagate_overconsistent(min_id);
            } else {
                // underconsistent after a cost increase: invalidate and
                // let predecessors recompute from scratch
                self.lattice.entry_mut(min_id).g = INFINITE_COST;
                self.update_membership(min_id);
                self.propagate_underconsistent(min_id);
            }
        }
    }

    /// Start candidates: the canonical entry, plus a cross of neighbors at
    /// the same heading when start broadening is on.
    fn start_candidates(&mut self, canonical: EntryId) -> Vec<EntryId> {
        if !self.config.broaden_start {
            return vec![canonical];
        }
        let s = self.lattice.entry(canonical).state;
        let mut list = Vec::new();
        for dx in -START_BROADEN_RANGE..=START_BROADEN_RANGE {
            for dy in -START_BROADEN_RANGE..=START_BROADEN_RANGE {
                if dx != 0 && dy != 0 {
                    continue;
                }
                let state = LatticeState::new(s.x + dx, s.y + dy, s.theta);
                if let Some(id) = self.lattice.get_entry(state) {
                    list.push(id);
                }
            }
        }
        list
    }

    /// Offer an improved path through a freshly settled entry to each
    /// predecessor.
    fn propagate_overconsistent(&mut self, settled: EntryId) {
        let g = self.lattice.entry(settled).g;
        for (pred, cost, _) in self.lattice.predecessors(settled) {
            let candidate = add_costs(cost, g);
            let improved = {
                let e = self.lattice.entry_mut(pred);
                if e.rhs > candidate {
                    e.rhs = candidate;
                    e.best_next = Some(settled);
                    true
                } else {
                    false
                }
            };
            if improved {
                self.update_membership(pred);
            }
        }
    }

    /// After an entry was invalidated, every predecessor routed through it
    /// must recompute its lookahead from scratch (the entry may have
    /// gotten arbitrarily worse).
    fn propagate_underconsistent(&mut self, invalidated: EntryId) {
        for (pred, _, _) in self.lattice.predecessors(invalidated) {
            if self.lattice.entry(pred).best_next == Some(invalidated) {
                self.recompute_rhs(pred);
                self.update_membership(pred);
            }
        }
    }

    /// Recompute `rhs` as the minimum over successors of edge cost plus
    /// successor g, recording the minimizer as the back-pointer. Terminal
    /// (goal-seeded) entries keep `rhs = 0`.
    fn recompute_rhs(&mut self, id: EntryId) {
        if self.goal_entries.contains(&id) {
            return;
        }
        let mut best_rhs = INFINITE_COST;
        let mut best_next = None;
        for (succ, cost, _) in self.lattice.successors(id) {
            let candidate = add_costs(cost, self.lattice.entry(succ).g);
            if candidate < best_rhs {
                best_rhs = candidate;
                best_next = Some(succ);
            }
        }
        let e = self.lattice.entry_mut(id);
        e.rhs = best_rhs;
        e.best_next = best_next;
    }

    /// Restore queue membership for an entry whose g/rhs changed:
    /// inconsistent entries go to OPEN, unless already closed this round,
    /// in which case they defer to INCONS; consistent entries leave both.
    fn update_membership(&mut self, id: EntryId) {
        let (consistent, closed_this_round, in_open, in_incons) = {
            let e = self.lattice.entry(id);
            (
                e.is_consistent(),
                e.closed_round == self.round,
                e.in_open(),
                e.in_incons(),
            )
        };

        if !consistent {
            if !closed_this_round {
                self.compute_key(id);
                if in_open {
                    self.open.adjust(self.lattice.entries_mut(), id);
                } else {
                    self.open.push(self.lattice.entries_mut(), id);
                }
            } else {
                if in_open {
                    self.open.erase(self.lattice.entries_mut(), id);
                }
                if !in_incons {
                    self.lattice.entry_mut(id).in_incons = true;
                    self.incons.push(id);
                }
            }
        } else {
            if in_open {
                self.open.erase(self.lattice.entries_mut(), id);
            }
            if in_incons {
                // lazy removal: the INCONS vec skips cleared flags on merge
                self.lattice.entry_mut(id).in_incons = false;
            }
        }
    }

    /// Store the epsilon-dependent key for an entry.
    fn compute_key(&mut self, id: EntryId) {
        let h = self.lattice.heuristic_of(id);
        let epsilon = self.epsilon;
        let e = self.lattice.entry_mut(id);
        e.key = SearchKey::compute(e.g, e.rhs, h, epsilon);
    }

    /// Key an entry would have right now, without storing it.
    fn key_for(&self, id: EntryId) -> SearchKey {
        let e = self.lattice.entry(id);
        SearchKey::compute(e.g, e.rhs, self.lattice.heuristic_of(id), self.epsilon)
    }

    /// Walk back-pointers from the satisfied start entry to the canonical
    /// goal and interpolate each hop through its cheapest matching
    /// primitive. Any broken link yields `None` (empty path), never a
    /// partial or wrong one.
    fn extract_path(&mut self, first: EntryId) -> Option<Vec<PathPoint>> {
        let goal = self.lattice.goal()?;

        let mut chain = vec![first];
        let mut cursor = first;
        let max_hops = self.lattice.state_count();
        while cursor != goal {
            let e = self.lattice.entry(cursor);
            if e.rhs >= INFINITE_COST {
                warn!("[AdStar] reconstruction: infinite-cost hop at {:?}", e.state);
                return None;
            }
            if e.g < e.rhs {
                warn!("[AdStar] reconstruction: underconsistent hop at {:?}", e.state);
                return None;
            }
            let Some(next) = e.best_next else {
                warn!("[AdStar] reconstruction: missing back-pointer at {:?}", e.state);
                return None;
            };
            chain.push(next);
            cursor = next;
            if chain.len() > max_hops {
                warn!("[AdStar] reconstruction: back-pointer cycle detected");
                return None;
            }
        }

        let mut path = Vec::new();
        for hop in 0..chain.len() - 1 {
            let (a, b) = (chain[hop], chain[hop + 1]);

            // cheapest primitive whose end state matches the successor
            let mut best: Option<(u32, usize)> = None;
            for (succ, cost, prim) in self.lattice.successors(a) {
                if succ != b {
                    continue;
                }
                if best.map_or(true, |(c, _)| cost < c) {
                    best = Some((cost, prim as usize));
                }
            }
            let Some((_, prim_idx)) = best else {
                if b == goal && self.goal_entries.contains(&a) {
                    // virtual hop from a seeded goal neighbor: terminal
                    break;
                }
                warn!(
                    "[AdStar] reconstruction: no primitive for {:?} -> {:?}",
                    self.lattice.entry(a).state,
                    self.lattice.entry(b).state
                );
                return None;
            };

            // translate the interpolated sub-points by the source position
            let src = self.lattice.state_pose(self.lattice.entry(a).state);
            let prim = self.lattice.primitives().prim(prim_idx);
            for point in &prim.interp[..prim.interp.len() - 1] {
                path.push(PathPoint {
                    pose: Pose2D::new(
                        src.x + point.pose.x,
                        src.y + point.pose.y,
                        point.pose.theta,
                    ),
                    is_corner: point.is_corner,
                    radius: point.radius,
                });
            }
        }

        // close with the pose of the last entry reached on the chain
        let last = *chain.last()?;
        let pose = self.lattice.state_pose(self.lattice.entry(last).state);
        path.push(PathPoint {
            pose,
            is_corner: false,
            radius: f32::INFINITY,
        });
        Some(path)
    }
}
