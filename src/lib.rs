//! MargaPlan - incremental anytime lattice planner for indoor robots.
//!
//! Plans over a discretized (x, y, heading) lattice with a fixed motion
//! primitive table, replanning continuously under a per-call wall-clock
//! budget. The search is goal-to-start and combines two classic tricks:
//!
//! - **Incremental** (D*-Lite style): search effort is reused across
//!   replans; cost changes repair only the affected states via a
//!   precomputed predecessor template, and a generation counter lazily
//!   invalidates the whole state space when the goal moves.
//! - **Anytime** (ARA* style): the first answer satisfies a loose epsilon
//!   suboptimality bound; while time remains the bound tightens toward a
//!   provably optimal path, and a timed-out call keeps its best bound.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                    worker/                          │  ← Dedicated search thread
//! └─────────────────────────────────────────────────────┘
//!                          │
//! ┌─────────────────────────────────────────────────────┐
//! │                    search/                          │  ← AD* engine, OPEN/INCONS
//! └─────────────────────────────────────────────────────┘
//!                          │
//! ┌─────────────────────────────────────────────────────┐
//! │                   lattice/                          │  ← States, primitives,
//! │                                                     │    entries, heuristic
//! └─────────────────────────────────────────────────────┘
//!                          │
//! ┌─────────────────────────────────────────────────────┐
//! │                core/ + costmap                      │  ← Poses, cells, cost grid
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! # Quick start
//!
//! ```rust
//! use marga_plan::{AdStarPlanner, PlannerConfig, Pose2D};
//!
//! let config = PlannerConfig {
//!     window_size: 20,
//!     resolution: 0.1,
//!     ..Default::default()
//! };
//! let mut planner = AdStarPlanner::new(config).unwrap();
//!
//! let result = planner.plan(
//!     Pose2D::new(0.25, 0.25, 0.0),
//!     Pose2D::new(1.55, 1.55, 0.0),
//! );
//! assert!(result.success);
//! for point in &result.path {
//!     println!("({:.2}, {:.2}) corner={}", point.pose.x, point.pose.y, point.is_corner);
//! }
//! ```

// Foundation (no internal deps)
pub mod core;
pub mod error;

// Cost grid over the lattice window
pub mod costmap;

// Configuration
pub mod config;

// State space: primitives, entries, environment, heuristic
pub mod lattice;

// The anytime incremental search engine
pub mod search;

// Boundary seams: worker thread and controller capability
pub mod controller;
pub mod worker;

// Convenience re-exports
pub use config::{CostClassMultipliers, FootprintConfig, PlannerConfig};
pub use controller::{LocalController, VelocityCommand};
pub use crate::core::{GridCell, Pose2D, WorldPoint};
pub use costmap::CostGrid;
pub use error::{MargaError, Result};
pub use lattice::{Lattice, LatticeState};
pub use search::{AdStarPlanner, PathPoint, PlanFailure, PlanResult};
pub use worker::{PlanRequest, PlannerWorker};
