//! Configuration loading for the lattice planner.

use crate::error::{MargaError, Result};
use serde::Deserialize;
use std::path::Path;

/// Cost multipliers per motion class.
///
/// Applied on top of the distance-derived base cost of each primitive.
/// High turn-in-place cost keeps the robot from spinning where an arc
/// would do.
#[derive(Clone, Debug, Deserialize)]
pub struct CostClassMultipliers {
    /// Straight motion, forward or backward (default: 1).
    #[serde(default = "default_forward_mult")]
    pub forward: u32,

    /// Forward motion with a heading change (default: 2).
    #[serde(default = "default_forward_and_turn_mult")]
    pub forward_and_turn: u32,

    /// In-place rotation (default: 50).
    #[serde(default = "default_turn_in_place_mult")]
    pub turn_in_place: u32,
}

impl Default for CostClassMultipliers {
    fn default() -> Self {
        Self {
            forward: default_forward_mult(),
            forward_and_turn: default_forward_and_turn_mult(),
            turn_in_place: default_turn_in_place_mult(),
        }
    }
}

/// Robot footprint as a set of covering circles.
///
/// Each center is an offset in the robot frame (meters); all circles share
/// one radius. A single zero-offset circle of radius zero reduces collision
/// checking to the swept cell centers, for cost maps that carry their own
/// inflation.
#[derive(Clone, Debug, Deserialize)]
pub struct FootprintConfig {
    /// Circle centers in the robot frame, meters.
    #[serde(default = "default_circle_centers")]
    pub circle_centers: Vec<[f32; 2]>,

    /// Shared circle radius in meters.
    #[serde(default = "default_circle_radius")]
    pub circle_radius: f32,
}

impl Default for FootprintConfig {
    fn default() -> Self {
        Self {
            circle_centers: default_circle_centers(),
            circle_radius: default_circle_radius(),
        }
    }
}

/// Lattice planner configuration.
#[derive(Clone, Debug, Deserialize)]
pub struct PlannerConfig {
    /// Wall-clock budget per `plan` call, seconds (default: 4.0).
    #[serde(default = "default_allocated_time")]
    pub allocated_time_secs: f32,

    /// Initial suboptimality bound, must be > 1 (default: 3.0).
    #[serde(default = "default_initial_epsilon")]
    pub initial_epsilon: f64,

    /// Discrete headings, 8 or 16 (default: 16).
    #[serde(default = "default_num_headings")]
    pub num_headings: usize,

    /// Primitives kept per heading, 3..=7 (default: 7).
    #[serde(default = "default_num_primitives")]
    pub num_primitives_per_heading: usize,

    /// Lattice window size in cells per axis (default: 400).
    #[serde(default = "default_window_size")]
    pub window_size: usize,

    /// Grid resolution, meters per cell (default: 0.05).
    #[serde(default = "default_resolution")]
    pub resolution: f32,

    /// Nominal forward velocity, m/s (default: 0.4).
    #[serde(default = "default_nominal_velocity")]
    pub nominal_velocity_mps: f32,

    /// Time for a 45-degree in-place turn, seconds (default: 0.6).
    #[serde(default = "default_time_to_turn_45deg")]
    pub time_to_turn_45deg_secs: f32,

    /// Cell cost at or above which a cell is an obstacle (default: 20).
    #[serde(default = "default_lethal_cost")]
    pub lethal_cost: u8,

    /// Affected-state count above which a cost change forces a from-scratch
    /// search instead of incremental repair (default: 500).
    #[serde(default = "default_force_scratch_limit")]
    pub force_scratch_limit: usize,

    /// Accept start candidates from a small neighborhood (default: false).
    #[serde(default)]
    pub broaden_start: bool,

    /// Seed a small goal neighborhood as terminal states (default: false).
    #[serde(default)]
    pub broaden_goal: bool,

    /// Per-class cost multipliers.
    #[serde(default)]
    pub cost_multipliers: CostClassMultipliers,

    /// Robot footprint circles.
    #[serde(default)]
    pub footprint: FootprintConfig,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            allocated_time_secs: default_allocated_time(),
            initial_epsilon: default_initial_epsilon(),
            num_headings: default_num_headings(),
            num_primitives_per_heading: default_num_primitives(),
            window_size: default_window_size(),
            resolution: default_resolution(),
            nominal_velocity_mps: default_nominal_velocity(),
            time_to_turn_45deg_secs: default_time_to_turn_45deg(),
            lethal_cost: default_lethal_cost(),
            force_scratch_limit: default_force_scratch_limit(),
            broaden_start: false,
            broaden_goal: false,
            cost_multipliers: CostClassMultipliers::default(),
            footprint: FootprintConfig::default(),
        }
    }
}

// Default value functions
fn default_allocated_time() -> f32 {
    4.0
}
fn default_initial_epsilon() -> f64 {
    3.0
}
fn default_num_headings() -> usize {
    16
}
fn default_num_primitives() -> usize {
    7
}
fn default_window_size() -> usize {
    400
}
fn default_resolution() -> f32 {
    0.05
}
fn default_nominal_velocity() -> f32 {
    0.4
}
fn default_time_to_turn_45deg() -> f32 {
    0.6
}
fn default_lethal_cost() -> u8 {
    20
}
fn default_force_scratch_limit() -> usize {
    500
}
fn default_forward_mult() -> u32 {
    1
}
fn default_forward_and_turn_mult() -> u32 {
    2
}
fn default_turn_in_place_mult() -> u32 {
    50
}
fn default_circle_centers() -> Vec<[f32; 2]> {
    vec![[0.0, 0.0]]
}
fn default_circle_radius() -> f32 {
    0.0
}

impl PlannerConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| MargaError::Config(format!("Failed to read config file: {}", e)))?;
        let config: PlannerConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check parameter ranges before the planner is built.
    pub fn validate(&self) -> Result<()> {
        if self.initial_epsilon <= 1.0 {
            return Err(MargaError::Config(format!(
                "initial_epsilon must be > 1, got {}",
                self.initial_epsilon
            )));
        }
        if self.num_headings != 8 && self.num_headings != 16 {
            return Err(MargaError::Config(format!(
                "num_headings must be 8 or 16, got {}",
                self.num_headings
            )));
        }
        if !(3..=7).contains(&self.num_primitives_per_heading) {
            return Err(MargaError::Config(format!(
                "num_primitives_per_heading must be in 3..=7, got {}",
                self.num_primitives_per_heading
            )));
        }
        if self.window_size < 4 {
            return Err(MargaError::Config(format!(
                "window_size must be at least 4 cells, got {}",
                self.window_size
            )));
        }
        if self.resolution <= 0.0 {
            return Err(MargaError::Config("resolution must be positive".into()));
        }
        if self.nominal_velocity_mps <= 0.0 {
            return Err(MargaError::Config("nominal_velocity_mps must be positive".into()));
        }
        if self.lethal_cost == 0 {
            return Err(MargaError::Config("lethal_cost must be non-zero".into()));
        }
        if self.footprint.circle_centers.is_empty() {
            return Err(MargaError::Config("footprint needs at least one circle".into()));
        }
        Ok(())
    }
}
