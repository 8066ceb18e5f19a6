//! Robot footprint as a set of covering circles.

use crate::config::FootprintConfig;
use crate::core::{GridCell, Pose2D, WorldPoint};

/// Computes the grid cells covered by the robot footprint at a pose.
///
/// The footprint is approximated by circles: offsets in the robot frame
/// sharing one radius. With a zero radius each circle covers exactly the
/// cell under its center, which suits cost grids that already carry
/// obstacle inflation.
#[derive(Clone, Debug)]
pub struct FootprintCover {
    centers: Vec<WorldPoint>,
    radius: f32,
    resolution: f32,
}

impl FootprintCover {
    /// Build from configuration at the given grid resolution.
    pub fn new(config: &FootprintConfig, resolution: f32) -> Self {
        Self {
            centers: config
                .circle_centers
                .iter()
                .map(|c| WorldPoint::new(c[0], c[1]))
                .collect(),
            radius: config.circle_radius.max(0.0),
            resolution,
        }
    }

    /// Cells covered at `pose`, expressed as offsets from the grid origin
    /// in cells. `pose` is relative to the same origin, in meters.
    pub fn covered_cells(&self, pose: Pose2D) -> Vec<GridCell> {
        let mut cells = Vec::with_capacity(self.centers.len());
        let radius_cells = (self.radius / self.resolution).ceil() as i32;

        for center in &self.centers {
            let world = pose.transform_point(*center);
            let cx = (world.x / self.resolution).round() as i32;
            let cy = (world.y / self.resolution).round() as i32;

            if radius_cells == 0 {
                push_unique(&mut cells, GridCell::new(cx, cy));
                continue;
            }

            for dy in -radius_cells..=radius_cells {
                for dx in -radius_cells..=radius_cells {
                    let cell_center = WorldPoint::new(
                        (cx + dx) as f32 * self.resolution,
                        (cy + dy) as f32 * self.resolution,
                    );
                    if cell_center.distance(&world) <= self.radius + self.resolution * 0.5 {
                        push_unique(&mut cells, GridCell::new(cx + dx, cy + dy));
                    }
                }
            }
        }
        cells
    }
}

fn push_unique(cells: &mut Vec<GridCell>, cell: GridCell) {
    if !cells.contains(&cell) {
        cells.push(cell);
    }
}
