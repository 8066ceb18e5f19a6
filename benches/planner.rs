//! Planner benchmarks.
//!
//! Covers the three load profiles the engine sees in service:
//! - a cold search on a fresh environment
//! - a converged replan with nothing changed (pure path extraction)
//! - incremental repair after a single cost change
//!
//! Run with: `cargo bench`

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};

use marga_plan::{AdStarPlanner, GridCell, PlannerConfig, Pose2D};

const LETHAL: u8 = 20;

fn bench_config() -> PlannerConfig {
    PlannerConfig {
        window_size: 50,
        resolution: 0.1,
        allocated_time_secs: 10.0,
        ..Default::default()
    }
}

/// Two partial walls with offset gaps, forcing an S-shaped route.
fn office_walls() -> Vec<(GridCell, u8)> {
    let mut updates = Vec::new();
    for y in 0..40 {
        updates.push((GridCell::new(18, y), LETHAL));
    }
    for y in 10..50 {
        updates.push((GridCell::new(34, y), LETHAL));
    }
    updates
}

fn start() -> Pose2D {
    Pose2D::new(0.25, 0.25, 0.0)
}

fn goal() -> Pose2D {
    Pose2D::new(4.75, 4.75, 0.0)
}

fn cluttered_planner() -> AdStarPlanner {
    let mut planner = AdStarPlanner::new(bench_config()).unwrap();
    planner.update_costs(&office_walls());
    planner
}

fn bench_cold_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("planner");
    group.sample_size(20);

    group.bench_function("cold_search_50x50", |b| {
        b.iter_batched(
            cluttered_planner,
            |mut planner| black_box(planner.plan(start(), goal())),
            BatchSize::LargeInput,
        )
    });
    group.finish();
}

fn bench_converged_replan(c: &mut Criterion) {
    let mut planner = cluttered_planner();
    let first = planner.plan(start(), goal());
    assert!(first.success);

    c.bench_function("converged_replan_50x50", |b| {
        b.iter(|| black_box(planner.plan(start(), goal())))
    });
}

fn bench_incremental_repair(c: &mut Criterion) {
    let mut group = c.benchmark_group("planner");
    group.sample_size(20);

    group.bench_function("repair_one_cell_50x50", |b| {
        b.iter_batched(
            || {
                let mut planner = cluttered_planner();
                let first = planner.plan(start(), goal());
                assert!(first.success);
                let mid = first.path[first.path.len() / 2].pose;
                let cell = GridCell::new((mid.x / 0.1) as i32, (mid.y / 0.1) as i32);
                (planner, cell)
            },
            |(mut planner, cell)| {
                planner.update_costs(&[(cell, LETHAL)]);
                black_box(planner.plan(start(), goal()))
            },
            BatchSize::LargeInput,
        )
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_cold_search,
    bench_converged_replan,
    bench_incremental_repair
);
criterion_main!(benches);
