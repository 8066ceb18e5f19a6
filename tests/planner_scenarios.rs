//! End-to-end planner scenarios.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use marga_plan::{
    AdStarPlanner, GridCell, PlanFailure, PlanResult, PlannerConfig, Pose2D,
};

const LETHAL: u8 = 20;
const RESOLUTION: f32 = 0.1;

fn config(window: usize) -> PlannerConfig {
    PlannerConfig {
        window_size: window,
        resolution: RESOLUTION,
        allocated_time_secs: 5.0,
        ..Default::default()
    }
}

/// Pose at the center of a cell.
fn pose(cell_x: i32, cell_y: i32, theta: f32) -> Pose2D {
    Pose2D::new(
        cell_x as f32 * RESOLUTION + RESOLUTION / 2.0,
        cell_y as f32 * RESOLUTION + RESOLUTION / 2.0,
        theta,
    )
}

fn cell_of(pose: Pose2D) -> GridCell {
    GridCell::new(
        (pose.x / RESOLUTION).floor() as i32,
        (pose.y / RESOLUTION).floor() as i32,
    )
}

fn assert_path_avoids(result: &PlanResult, planner: &AdStarPlanner) {
    for point in &result.path {
        let cell = cell_of(point.pose);
        assert!(
            !planner.lattice().grid().is_lethal(cell),
            "waypoint at ({:.2}, {:.2}) sits on a lethal cell",
            point.pose.x,
            point.pose.y
        );
    }
}

#[test]
fn free_lattice_converges_to_optimal_bound() {
    // 10x10 obstacle-free window, corner to corner
    let mut planner = AdStarPlanner::new(config(10)).unwrap();
    let result = planner.plan(pose(0, 0, 0.0), pose(9, 9, 0.0));

    assert!(result.success);
    assert_eq!(result.epsilon, 1.0);
    assert!(result.expansions > 0);
    assert!(planner.check_queue_invariants());

    // Primitive-consistent length: at least the diagonal, nowhere near a
    // perimeter walk
    let diagonal = 9.0 * std::f32::consts::SQRT_2 * RESOLUTION;
    let length = result.length_meters();
    assert!(length >= diagonal * 0.9, "length {} too short", length);
    assert!(length <= diagonal * 2.5, "length {} too long", length);
}

#[test]
fn separating_wall_yields_no_solution_with_empty_open() {
    let mut planner = AdStarPlanner::new(config(12)).unwrap();
    let wall: Vec<(GridCell, u8)> = (0..12).map(|y| (GridCell::new(6, y), LETHAL)).collect();
    planner.update_costs(&wall);

    let result = planner.plan(pose(1, 6, 0.0), pose(10, 6, 0.0));

    assert!(!result.success);
    assert_eq!(result.failure_reason, Some(PlanFailure::NoSolution));
    assert!(result.path.is_empty());
    assert_eq!(planner.open_len(), 0);
    assert!(planner.check_queue_invariants());
}

#[test]
fn zero_time_budget_fails_cleanly() {
    let mut planner = AdStarPlanner::new(PlannerConfig {
        allocated_time_secs: 0.0,
        ..config(12)
    })
    .unwrap();
    let result = planner.plan(pose(1, 1, 0.0), pose(10, 10, 0.0));

    assert!(!result.success);
    assert_eq!(result.failure_reason, Some(PlanFailure::TimeExhausted));
    assert!(result.path.is_empty());
    assert_eq!(result.expansions, 0);
}

#[test]
fn moved_goal_restarts_the_search() {
    let mut planner = AdStarPlanner::new(config(12)).unwrap();
    let first = planner.plan(pose(1, 1, 0.0), pose(10, 10, 0.0));
    assert!(first.success);

    let generation = planner.generation();
    assert_eq!(planner.epsilon_satisfied(), 1.0);

    // New goal: generation bumps, bound resets, search runs again
    let second = planner.plan(pose(1, 1, 0.0), pose(2, 10, 0.0));
    assert!(second.success);
    assert_eq!(planner.generation(), generation + 1);
    assert!(second.expansions > 0);
    assert_eq!(planner.epsilon_satisfied(), 1.0);
}

#[test]
fn converged_search_replays_for_free() {
    let mut planner = AdStarPlanner::new(config(12)).unwrap();
    let first = planner.plan(pose(1, 1, 0.0), pose(10, 10, 0.0));
    assert!(first.success);
    assert_eq!(first.epsilon, 1.0);

    let second = planner.plan(pose(1, 1, 0.0), pose(10, 10, 0.0));
    assert!(second.success);
    assert_eq!(second.expansions, 0);
    assert_eq!(second.cost, first.cost);
    assert_eq!(second.path.len(), first.path.len());
}

#[test]
fn lethal_on_path_cell_is_repaired_incrementally() {
    let mut planner = AdStarPlanner::new(config(30)).unwrap();
    let start = pose(2, 15, 0.0);
    let goal = pose(27, 15, 0.0);

    let first = planner.plan(start, goal);
    assert!(first.success);
    assert_eq!(first.epsilon, 1.0);

    // Block the cell under a mid-path waypoint
    let mid = first.path[first.path.len() / 2];
    let blocked = cell_of(mid.pose);
    let applied = planner.update_costs(&[(blocked, LETHAL)]);
    assert!(applied, "change should repair incrementally, not reinitialize");

    let second = planner.plan(start, goal);
    assert!(second.success);
    assert!(second.expansions > 0);
    assert!(second.cost >= first.cost);
    assert_path_avoids(&second, &planner);
    for point in &second.path {
        assert_ne!(cell_of(point.pose), blocked);
    }
    assert!(planner.check_queue_invariants());

    // Reopening the cell can only make the path cheaper again
    planner.update_costs(&[(blocked, 0)]);
    let third = planner.plan(start, goal);
    assert!(third.success);
    assert!(third.cost <= second.cost);
}

#[test]
fn oversized_change_schedules_full_reinitialization() {
    let mut planner = AdStarPlanner::new(PlannerConfig {
        force_scratch_limit: 1,
        ..config(12)
    })
    .unwrap();

    let first = planner.plan(pose(1, 1, 0.0), pose(10, 10, 0.0));
    assert!(first.success);
    let generation = planner.generation();

    // With the threshold at one affected state, any real change forces a
    // from-scratch search
    let applied = planner.update_costs(&[(GridCell::new(5, 5), LETHAL)]);
    assert!(!applied);

    let second = planner.plan(pose(1, 1, 0.0), pose(10, 10, 0.0));
    assert!(second.success);
    assert_eq!(planner.generation(), generation + 1);
    assert!(second.expansions > 0);
    assert_path_avoids(&second, &planner);
}

#[test]
fn reversing_in_a_dead_end_emits_corner_waypoints() {
    let mut planner = AdStarPlanner::new(config(12)).unwrap();

    // Pen the robot in: lethal ring two cells out from (5,5), so heading
    // changes can only happen as in-place rotations
    let mut ring = Vec::new();
    for dx in -2i32..=2 {
        for dy in -2i32..=2 {
            if dx.abs().max(dy.abs()) == 2 {
                ring.push((GridCell::new(5 + dx, 5 + dy), LETHAL));
            }
        }
    }
    planner.update_costs(&ring);

    let result = planner.plan(pose(5, 5, 0.0), pose(5, 5, std::f32::consts::PI));

    assert!(result.success);
    assert!(
        result.path.iter().any(|p| p.is_corner && p.radius == 0.0),
        "a penned-in reversal must carry corner-tagged waypoints"
    );
    // The robot never crosses the ring
    for point in &result.path {
        let cell = cell_of(point.pose);
        assert!((cell.x - 5).abs().max((cell.y - 5).abs()) <= 1);
    }
}

#[test]
fn broadened_endpoints_tolerate_offsets() {
    let mut planner = AdStarPlanner::new(PlannerConfig {
        broaden_start: true,
        broaden_goal: true,
        ..config(14)
    })
    .unwrap();

    let result = planner.plan(pose(2, 2, 0.0), pose(11, 11, 0.0));
    assert!(result.success);
    assert!(!result.path.is_empty());
    assert!(planner.check_queue_invariants());
}

#[test]
fn random_clutter_paths_stay_clear_of_obstacles() {
    let mut rng = StdRng::seed_from_u64(7);
    let mut planner = AdStarPlanner::new(config(20)).unwrap();

    let mut updates = Vec::new();
    while updates.len() < 30 {
        let cell = GridCell::new(rng.gen_range(0..20), rng.gen_range(0..20));
        // keep the corners usable
        if (cell.x <= 2 && cell.y <= 2) || (cell.x >= 17 && cell.y >= 17) {
            continue;
        }
        updates.push((cell, LETHAL));
    }
    planner.update_costs(&updates);

    let result = planner.plan(pose(1, 1, 0.0), pose(18, 18, 0.0));
    match result.failure_reason {
        None => {
            assert!(result.success);
            assert_eq!(result.epsilon, 1.0);
            assert_path_avoids(&result, &planner);
        }
        Some(PlanFailure::NoSolution) => {
            assert!(result.path.is_empty());
        }
        other => panic!("unexpected failure: {:?}", other),
    }
    assert!(planner.check_queue_invariants());
}

#[test]
fn out_of_window_requests_are_rejected_before_search() {
    let mut planner = AdStarPlanner::new(config(12)).unwrap();

    let result = planner.plan(pose(1, 1, 0.0), Pose2D::new(50.0, 50.0, 0.0));
    assert!(!result.success);
    assert_eq!(result.failure_reason, Some(PlanFailure::InvalidRequest));
    assert_eq!(result.expansions, 0);

    let result = planner.plan(Pose2D::new(-1.0, 0.0, 0.0), pose(5, 5, 0.0));
    assert_eq!(result.failure_reason, Some(PlanFailure::InvalidRequest));
}
