//! Motion primitive table.
//!
//! A fixed set of short kinematic segments per discrete heading, built once
//! from the lattice resolution and heading count. Each primitive carries its
//! end-state delta, a cost class, interpolated sub-points with per-point
//! turn metadata, and the grid cells its footprint sweeps.

use crate::config::PlannerConfig;
use crate::core::{normalize_angle, octile_distance, GridCell, Pose2D};
use crate::lattice::footprint::FootprintCover;
use crate::lattice::state::{heading_angle, heading_vector, wrap_heading};

/// Cost units per cell of octile travel at nominal velocity.
pub const CELL_COST_SCALE: f32 = 1000.0;

/// Interpolated samples per moving primitive.
const MOVE_INTERP_POINTS: usize = 8;
/// Interpolated samples per in-place turn.
const TURN_INTERP_POINTS: usize = 4;

/// Motion cost class, scaled by the configured multipliers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MotionClass {
    /// Straight motion, forward or backward.
    Forward,
    /// Forward motion with a heading change.
    ForwardAndTurn,
    /// Rotation in place.
    TurnInPlace,
}

/// One interpolated sub-point of a primitive, relative to the source cell
/// center.
#[derive(Clone, Copy, Debug)]
pub struct InterpPoint {
    /// Pose relative to the source cell center (meters / radians).
    pub pose: Pose2D,
    /// Sharp-turn marker (true for in-place rotation points).
    pub is_corner: bool,
    /// Local turn radius in meters; infinite on straight segments, zero
    /// while rotating in place.
    pub radius: f32,
    /// Heading at the end of the owning primitive, radians.
    pub theta_out: f32,
    /// Rotation sense: +1 left, -1 right, 0 straight.
    pub rotate_direction: i8,
}

/// A single motion primitive starting at one discrete heading.
#[derive(Clone, Debug)]
pub struct MotionPrimitive {
    /// Heading the primitive starts from.
    pub start_heading: u8,
    /// Heading the primitive ends at.
    pub end_heading: u8,
    /// End-cell displacement.
    pub delta: GridCell,
    /// Cost class.
    pub class: MotionClass,
    /// Base traversal cost before cell-cost scaling.
    pub base_cost: u32,
    /// Interpolated sub-points, source-relative.
    pub interp: Vec<InterpPoint>,
    /// Cells swept by the footprint, relative to the source cell.
    pub sweep: Vec<GridCell>,
}

/// The full primitive table plus forward/reverse heading indices.
#[derive(Clone, Debug)]
pub struct PrimitiveSet {
    num_headings: usize,
    prims: Vec<MotionPrimitive>,
    by_start: Vec<Vec<usize>>,
    by_end: Vec<Vec<usize>>,
}

impl PrimitiveSet {
    /// Build the table for the configured lattice.
    pub fn build(config: &PlannerConfig) -> Self {
        let n = config.num_headings;
        let footprint = FootprintCover::new(&config.footprint, config.resolution);
        let mut prims = Vec::with_capacity(n * config.num_primitives_per_heading);

        for heading in 0..n as u8 {
            for template in primitive_templates(n, heading)
                .into_iter()
                .take(config.num_primitives_per_heading)
            {
                prims.push(build_primitive(config, &footprint, template));
            }
        }

        let mut by_start = vec![Vec::new(); n];
        let mut by_end = vec![Vec::new(); n];
        for (idx, prim) in prims.iter().enumerate() {
            by_start[prim.start_heading as usize].push(idx);
            by_end[prim.end_heading as usize].push(idx);
        }

        Self {
            num_headings: n,
            prims,
            by_start,
            by_end,
        }
    }

    /// Number of discrete headings.
    #[inline]
    pub fn num_headings(&self) -> usize {
        self.num_headings
    }

    /// All primitives.
    #[inline]
    pub fn all(&self) -> &[MotionPrimitive] {
        &self.prims
    }

    /// Primitive by table index.
    #[inline]
    pub fn prim(&self, idx: usize) -> &MotionPrimitive {
        &self.prims[idx]
    }

    /// Indices of primitives starting at a heading.
    #[inline]
    pub fn starting_at(&self, heading: u8) -> &[usize] {
        &self.by_start[heading as usize]
    }

    /// Indices of primitives ending at a heading.
    #[inline]
    pub fn ending_at(&self, heading: u8) -> &[usize] {
        &self.by_end[heading as usize]
    }
}

/// Primitive shape before costs and interpolation are attached.
struct Template {
    start_heading: u8,
    end_heading: u8,
    delta: GridCell,
    class: MotionClass,
}

/// Canonical primitive list for one heading, most essential first, so the
/// configured per-heading count truncates from the tail.
fn primitive_templates(n: usize, heading: u8) -> Vec<Template> {
    let (vx, vy) = heading_vector(n, heading);
    let left = wrap_heading(n, heading as i32 + 1);
    let right = wrap_heading(n, heading as i32 - 1);
    let (lx, ly) = heading_vector(n, left);
    let (rx, ry) = heading_vector(n, right);

    vec![
        // Short forward: one unit step along the heading
        Template {
            start_heading: heading,
            end_heading: heading,
            delta: GridCell::new(vx, vy),
            class: MotionClass::Forward,
        },
        // In-place turns, one heading step each way
        Template {
            start_heading: heading,
            end_heading: left,
            delta: GridCell::new(0, 0),
            class: MotionClass::TurnInPlace,
        },
        Template {
            start_heading: heading,
            end_heading: right,
            delta: GridCell::new(0, 0),
            class: MotionClass::TurnInPlace,
        },
        // Forward arcs ending one heading step over
        Template {
            start_heading: heading,
            end_heading: left,
            delta: GridCell::new(vx + lx, vy + ly),
            class: MotionClass::ForwardAndTurn,
        },
        Template {
            start_heading: heading,
            end_heading: right,
            delta: GridCell::new(vx + rx, vy + ry),
            class: MotionClass::ForwardAndTurn,
        },
        // Long forward for fast open-space travel
        Template {
            start_heading: heading,
            end_heading: heading,
            delta: GridCell::new(4 * vx, 4 * vy),
            class: MotionClass::Forward,
        },
        // Backward unit step
        Template {
            start_heading: heading,
            end_heading: heading,
            delta: GridCell::new(-vx, -vy),
            class: MotionClass::Forward,
        },
    ]
}

fn build_primitive(
    config: &PlannerConfig,
    footprint: &FootprintCover,
    template: Template,
) -> MotionPrimitive {
    let n = config.num_headings;
    let start_angle = heading_angle(n, template.start_heading);
    let end_angle = heading_angle(n, template.end_heading);
    let turn = normalize_angle(end_angle - start_angle);

    // Base cost: octile travel distance in cells, or the in-place turn
    // time expressed in cell-traversal times, whichever dominates. Using
    // octile (not Euclidean) length keeps every edge at least as expensive
    // as the 2D grid path underneath it, which the heuristic relies on.
    let linear_cells = octile_distance(template.delta.x, template.delta.y);
    let cell_time = config.resolution / config.nominal_velocity_mps;
    let angular_cells =
        (turn.abs() / std::f32::consts::FRAC_PI_4) * config.time_to_turn_45deg_secs / cell_time;
    let base_units = linear_cells.max(angular_cells);

    let mult = match template.class {
        MotionClass::Forward => config.cost_multipliers.forward,
        MotionClass::ForwardAndTurn => config.cost_multipliers.forward_and_turn,
        MotionClass::TurnInPlace => config.cost_multipliers.turn_in_place,
    };
    let base_cost = ((base_units * CELL_COST_SCALE).round() as u32).max(1) * mult;

    let interp = interpolate(config, &template, start_angle, end_angle, turn);

    // Footprint sweep over the interpolated poses, source-relative
    let mut sweep = Vec::new();
    for point in &interp {
        for cell in footprint.covered_cells(point.pose) {
            if !sweep.contains(&cell) {
                sweep.push(cell);
            }
        }
    }

    MotionPrimitive {
        start_heading: template.start_heading,
        end_heading: template.end_heading,
        delta: template.delta,
        class: template.class,
        base_cost,
        interp,
        sweep,
    }
}

fn interpolate(
    config: &PlannerConfig,
    template: &Template,
    start_angle: f32,
    end_angle: f32,
    turn: f32,
) -> Vec<InterpPoint> {
    let is_turn_in_place = template.class == MotionClass::TurnInPlace;
    let count = if is_turn_in_place {
        TURN_INTERP_POINTS
    } else {
        MOVE_INTERP_POINTS
    };

    let end_x = template.delta.x as f32 * config.resolution;
    let end_y = template.delta.y as f32 * config.resolution;
    let chord = (end_x * end_x + end_y * end_y).sqrt();

    let radius = if is_turn_in_place {
        0.0
    } else if turn.abs() < 1e-6 {
        f32::INFINITY
    } else {
        // Circular-arc radius from chord length and heading change
        chord / (2.0 * (turn.abs() * 0.5).sin())
    };
    let rotate_direction = if turn > 1e-6 {
        1
    } else if turn < -1e-6 {
        -1
    } else {
        0
    };

    (0..count)
        .map(|i| {
            let frac = i as f32 / (count - 1) as f32;
            InterpPoint {
                pose: Pose2D::new(
                    end_x * frac,
                    end_y * frac,
                    normalize_angle(start_angle + turn * frac),
                ),
                is_corner: is_turn_in_place,
                radius,
                theta_out: end_angle,
                rotate_direction,
            }
        })
        .collect()
}
