//! Downstream controller seam.
//!
//! The planner hands finished paths to a local controller that turns them
//! into velocity commands. Alternative controllers (e.g. a trajectory
//! rollout follower and a fixed-pattern follower) plug in behind this
//! trait; none of them live in this crate.

use crate::core::Pose2D;
use crate::search::PathPoint;

/// Velocity command produced by a controller.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct VelocityCommand {
    /// Linear velocity, m/s.
    pub linear: f32,
    /// Angular velocity, rad/s.
    pub angular: f32,
}

/// Capability interface for the local controller consuming planner output.
pub trait LocalController {
    /// Replace the plan being followed. Returns false when the controller
    /// rejects the path (e.g. it is empty or starts too far away).
    fn update_plan(&mut self, path: &[PathPoint]) -> bool;

    /// Compute the next velocity command from the current pose, or `None`
    /// when there is nothing to follow.
    fn compute_velocity(&mut self, pose: Pose2D) -> Option<VelocityCommand>;

    /// Check whether a candidate command is safe to execute from a pose.
    fn check_trajectory(&self, pose: Pose2D, command: VelocityCommand) -> bool;
}
