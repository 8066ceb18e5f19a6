//! Discretized (x, y, heading) state lattice.
//!
//! The lattice couples the cost grid with a fixed motion-primitive table to
//! generate successor and predecessor states, keeps the arena of per-state
//! search entries, and serves the 2D heuristic used by the search engine.

pub mod entry;
pub mod environment;
pub mod footprint;
pub mod heuristic;
pub mod primitives;
pub mod state;

pub use entry::{add_costs, Entry, EntryId, SearchKey, INFINITE_COST};
pub use environment::Lattice;
pub use footprint::FootprintCover;
pub use heuristic::GridHeuristic;
pub use primitives::{InterpPoint, MotionClass, MotionPrimitive, PrimitiveSet};
pub use state::LatticeState;
