//! Discretized occupancy grid for cheap placement validity checks.
//!
//! The grid trades exactness for O(local-volume) queries: instead of testing
//! a candidate position against every obstacle, the optimizer only inspects
//! the cells the moving object would cover. Static obstacles are rasterized
//! once at construction; the source and listener re-mark their cells on every
//! move.

use crate::error::{Result, SoundTraceError};
use crate::math::{EPSILON, Vec3};
use crate::scene::SceneObject;
use log::debug;

/// Occupancy state of one grid cell.
///
/// A cell never holds more than one state; `StaticObstacle` takes precedence
/// and is never overwritten by dynamic occupants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellState {
    Empty,
    StaticObstacle,
    Source,
    Listener,
    OutOfBounds,
}

/// Which movable object a dynamic cell belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DynamicRole {
    Source,
    Listener,
}

impl DynamicRole {
    pub fn cell_state(self) -> CellState {
        match self {
            DynamicRole::Source => CellState::Source,
            DynamicRole::Listener => CellState::Listener,
        }
    }
}

/// True if two spheres overlap, with a small tolerance for floating point
/// robustness.
pub fn spheres_intersect(pos_a: Vec3, radius_a: f32, pos_b: Vec3, radius_b: f32) -> bool {
    let sum = radius_a + radius_b;
    pos_a.distance_squared(pos_b) < sum * sum + EPSILON
}

/// 3D grid of occupancy cells over the room's bounding box.
pub struct OccupancyGrid {
    cells: Vec<CellState>,
    room_min: Vec3,
    cell_size: Vec3,
    counts: [usize; 3],
}

impl OccupancyGrid {
    /// Builds an empty grid covering `[room_min, room_max]`.
    ///
    /// Cell counts are derived by ceiling-dividing the extents by the cell
    /// size, with at least one cell per axis. Non-positive cell sizes or
    /// extents are configuration errors.
    pub fn new(room_min: Vec3, room_max: Vec3, cell_size: Vec3) -> Result<Self> {
        if cell_size.min_element() <= 0.0 {
            return Err(SoundTraceError::Configuration(format!(
                "occupancy cell size must be positive, got {:?}",
                cell_size
            )));
        }
        let extent = room_max - room_min;
        if extent.min_element() <= 0.0 {
            return Err(SoundTraceError::Configuration(format!(
                "room extents must be positive, got {:?}",
                extent
            )));
        }

        let counts = [
            ((extent.x / cell_size.x).ceil() as usize).max(1),
            ((extent.y / cell_size.y).ceil() as usize).max(1),
            ((extent.z / cell_size.z).ceil() as usize).max(1),
        ];
        debug!(
            "occupancy grid: {}x{}x{} cells of {:?}",
            counts[0], counts[1], counts[2], cell_size
        );
        Ok(Self {
            cells: vec![CellState::Empty; counts[0] * counts[1] * counts[2]],
            room_min,
            cell_size,
            counts,
        })
    }

    pub fn counts(&self) -> [usize; 3] {
        self.counts
    }

    /// Signed cell coordinates of a world position; may lie outside the grid.
    fn cell_coords(&self, pos: Vec3) -> [i64; 3] {
        let rel = (pos - self.room_min) / self.cell_size;
        [
            rel.x.floor() as i64,
            rel.y.floor() as i64,
            rel.z.floor() as i64,
        ]
    }

    /// World-space center of a cell.
    fn cell_center(&self, ix: i64, iy: i64, iz: i64) -> Vec3 {
        self.room_min
            + Vec3::new(
                (ix as f32 + 0.5) * self.cell_size.x,
                (iy as f32 + 0.5) * self.cell_size.y,
                (iz as f32 + 0.5) * self.cell_size.z,
            )
    }

    /// Closest-point overlap test between a sphere and a cell's box. The
    /// radius is shrunk by a small tolerance so exact tangency (a clamped
    /// object touching the room boundary) does not count as overlap.
    fn sphere_overlaps_cell(&self, ix: i64, iy: i64, iz: i64, center: Vec3, radius: f32) -> bool {
        let min = self.room_min
            + Vec3::new(
                ix as f32 * self.cell_size.x,
                iy as f32 * self.cell_size.y,
                iz as f32 * self.cell_size.z,
            );
        let closest = center.clamp(min, min + self.cell_size);
        closest.distance_squared(center) < radius * radius - EPSILON
    }

    fn flat_index(&self, ix: i64, iy: i64, iz: i64) -> Option<usize> {
        let in_range = ix >= 0
            && (ix as usize) < self.counts[0]
            && iy >= 0
            && (iy as usize) < self.counts[1]
            && iz >= 0
            && (iz as usize) < self.counts[2];
        in_range.then(|| {
            ((ix as usize) * self.counts[1] + iy as usize) * self.counts[2] + iz as usize
        })
    }

    /// State of a cell; coordinates outside the grid report `OutOfBounds`.
    pub fn state_at(&self, ix: i64, iy: i64, iz: i64) -> CellState {
        match self.flat_index(ix, iy, iz) {
            Some(i) => self.cells[i],
            None => CellState::OutOfBounds,
        }
    }

    /// State of the cell containing a world position.
    pub fn state_at_world(&self, pos: Vec3) -> CellState {
        let [ix, iy, iz] = self.cell_coords(pos);
        self.state_at(ix, iy, iz)
    }

    fn set_state(&mut self, ix: i64, iy: i64, iz: i64, state: CellState) {
        if let Some(i) = self.flat_index(ix, iy, iz) {
            self.cells[i] = state;
        }
    }

    /// Rasterizes the bounding boxes of all static obstacles into the grid.
    /// Called once at scene setup.
    pub fn mark_static_obstacles<'a>(
        &mut self,
        objects: impl IntoIterator<Item = &'a SceneObject>,
    ) {
        for obj in objects {
            if !obj.is_static {
                continue;
            }
            let (min, max) = obj.aabb();
            let [min_ix, min_iy, min_iz] = self.cell_coords(min);
            let [max_ix, max_iy, max_iz] = self.cell_coords(max);
            for ix in min_ix..=max_ix {
                for iy in min_iy..=max_iy {
                    for iz in min_iz..=max_iz {
                        self.set_state(ix, iy, iz, CellState::StaticObstacle);
                    }
                }
            }
        }
    }

    /// Whether a movable object of the given radius may occupy `candidate`.
    ///
    /// Every cell the candidate sphere overlaps must be inside the grid and
    /// free of static obstacles. The other dynamic object is tested directly
    /// sphere-against-sphere, bypassing grid granularity.
    pub fn is_position_valid(
        &self,
        candidate: Vec3,
        radius: f32,
        other_pos: Vec3,
        other_radius: f32,
    ) -> bool {
        if spheres_intersect(candidate, radius, other_pos, other_radius) {
            return false;
        }

        let r = Vec3::splat(radius);
        let [min_ix, min_iy, min_iz] = self.cell_coords(candidate - r);
        let [max_ix, max_iy, max_iz] = self.cell_coords(candidate + r);
        for ix in min_ix..=max_ix {
            for iy in min_iy..=max_iy {
                for iz in min_iz..=max_iz {
                    if !self.sphere_overlaps_cell(ix, iy, iz, candidate, radius) {
                        continue;
                    }
                    match self.state_at(ix, iy, iz) {
                        CellState::OutOfBounds | CellState::StaticObstacle => return false,
                        _ => {}
                    }
                }
            }
        }
        true
    }

    /// Re-marks the grid after a movable object's position changed.
    ///
    /// Cells near the old position are cleared only if still tagged by this
    /// object's role, so obstacles and the other object are never clobbered.
    /// The mark radius is padded by one cell as a safety margin against grid
    /// granularity.
    pub fn update_object(&mut self, role: DynamicRole, old_pos: Vec3, new_pos: Vec3, radius: f32) {
        let mark_radius = radius + self.cell_size.max_element();
        let r = Vec3::splat(mark_radius);
        let state = role.cell_state();

        let [min_ix, min_iy, min_iz] = self.cell_coords(old_pos - r);
        let [max_ix, max_iy, max_iz] = self.cell_coords(old_pos + r);
        for ix in min_ix..=max_ix {
            for iy in min_iy..=max_iy {
                for iz in min_iz..=max_iz {
                    if self.state_at(ix, iy, iz) == state {
                        self.set_state(ix, iy, iz, CellState::Empty);
                    }
                }
            }
        }

        let [min_ix, min_iy, min_iz] = self.cell_coords(new_pos - r);
        let [max_ix, max_iy, max_iz] = self.cell_coords(new_pos + r);
        for ix in min_ix..=max_ix {
            for iy in min_iy..=max_iy {
                for iz in min_iz..=max_iz {
                    if self.cell_center(ix, iy, iz).distance(new_pos) >= mark_radius {
                        continue;
                    }
                    if self.state_at(ix, iy, iz) == CellState::Empty {
                        self.set_state(ix, iy, iz, state);
                    }
                }
            }
        }
    }

    #[cfg(test)]
    fn snapshot(&self) -> Vec<CellState> {
        self.cells.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> OccupancyGrid {
        OccupancyGrid::new(
            Vec3::new(-10.0, 0.0, -10.0),
            Vec3::new(10.0, 5.0, 10.0),
            Vec3::splat(0.5),
        )
        .unwrap()
    }

    #[test]
    fn rejects_bad_configuration() {
        let err = OccupancyGrid::new(Vec3::ZERO, Vec3::ONE, Vec3::new(0.5, 0.0, 0.5));
        assert!(matches!(err, Err(SoundTraceError::Configuration(_))));
        let err = OccupancyGrid::new(Vec3::ONE, Vec3::ZERO, Vec3::splat(0.5));
        assert!(matches!(err, Err(SoundTraceError::Configuration(_))));
    }

    #[test]
    fn cell_counts_use_ceiling_division() {
        let g = OccupancyGrid::new(Vec3::ZERO, Vec3::new(1.1, 0.2, 3.0), Vec3::splat(0.5)).unwrap();
        assert_eq!(g.counts(), [3, 1, 6]);
    }

    #[test]
    fn out_of_bounds_queries() {
        let g = grid();
        assert_eq!(g.state_at(-1, 0, 0), CellState::OutOfBounds);
        assert_eq!(g.state_at_world(Vec3::new(0.0, 100.0, 0.0)), CellState::OutOfBounds);
        assert_eq!(g.state_at_world(Vec3::new(0.0, 1.0, 0.0)), CellState::Empty);
    }

    #[test]
    fn static_obstacles_fill_their_cells() {
        let mut g = grid();
        let obstacle = SceneObject::cuboid("Shelf", Vec3::new(2.0, 1.5, 0.0), Vec3::new(1.0, 1.5, 1.0));
        g.mark_static_obstacles([&obstacle]);
        assert_eq!(g.state_at_world(Vec3::new(2.0, 1.5, 0.0)), CellState::StaticObstacle);
        assert_eq!(g.state_at_world(Vec3::new(7.0, 1.5, 0.0)), CellState::Empty);
    }

    #[test]
    fn validity_checks() {
        let mut g = grid();
        let obstacle = SceneObject::cuboid("Shelf", Vec3::new(2.0, 1.5, 0.0), Vec3::new(1.0, 1.5, 1.0));
        g.mark_static_obstacles([&obstacle]);
        let other = Vec3::new(-5.0, 1.0, -5.0);

        // Open space, far from everything.
        assert!(g.is_position_valid(Vec3::new(5.0, 2.0, 5.0), 0.3, other, 0.25));
        // Inside the obstacle.
        assert!(!g.is_position_valid(Vec3::new(2.0, 1.5, 0.0), 0.3, other, 0.25));
        // Outside the room.
        assert!(!g.is_position_valid(Vec3::new(50.0, 1.0, 0.0), 0.3, other, 0.25));
        // Overlapping the other dynamic object.
        assert!(!g.is_position_valid(other + Vec3::X * 0.1, 0.3, other, 0.25));
    }

    #[test]
    fn grid_aligned_overlap_is_rejected() {
        let mut g = grid();
        let obstacle = SceneObject::cuboid("Shelf", Vec3::new(2.0, 1.5, 0.0), Vec3::new(1.0, 1.5, 1.0));
        g.mark_static_obstacles([&obstacle]);
        let other = Vec3::new(-5.0, 1.0, -5.0);

        // Candidate on the cell lattice, overlapping the shelf face without
        // being centered in it: the sphere reaches x = 1.3, the shelf starts
        // at x = 1.0.
        assert!(!g.is_position_valid(Vec3::new(1.0, 1.5, 0.0), 0.3, other, 0.25));
        // One step further out the sphere no longer reaches the shelf.
        assert!(g.is_position_valid(Vec3::new(0.5, 1.5, 0.0), 0.3, other, 0.25));
    }

    #[test]
    fn marking_pads_by_the_largest_cell_axis() {
        // Tall cells: the containing cell's center sits further from the
        // object than its radius plus the x cell size, so the pad must come
        // from the largest axis.
        let mut g =
            OccupancyGrid::new(Vec3::ZERO, Vec3::splat(4.0), Vec3::new(0.25, 1.0, 0.25)).unwrap();
        let pos = Vec3::new(2.0, 2.0, 2.0);
        g.update_object(DynamicRole::Source, pos, pos, 0.2);
        assert_eq!(g.state_at_world(pos), CellState::Source);
    }

    #[test]
    fn dynamic_update_round_trip() {
        let mut g = grid();
        let obstacle = SceneObject::cuboid("Shelf", Vec3::new(2.0, 1.5, 0.0), Vec3::new(1.0, 1.5, 1.0));
        g.mark_static_obstacles([&obstacle]);

        let pos_a = Vec3::new(-4.0, 1.5, 3.0);
        let pos_b = Vec3::new(4.0, 1.5, -6.0);
        g.update_object(DynamicRole::Source, pos_a, pos_a, 0.3);
        let before = g.snapshot();
        assert_eq!(g.state_at_world(pos_a), CellState::Source);

        g.update_object(DynamicRole::Source, pos_a, pos_b, 0.3);
        assert_eq!(g.state_at_world(pos_a), CellState::Empty);
        assert_eq!(g.state_at_world(pos_b), CellState::Source);

        g.update_object(DynamicRole::Source, pos_b, pos_a, 0.3);
        assert_eq!(g.snapshot(), before);
    }

    #[test]
    fn update_never_overwrites_static_cells() {
        let mut g = grid();
        let obstacle = SceneObject::cuboid("Shelf", Vec3::new(2.0, 1.5, 0.0), Vec3::new(1.0, 1.5, 1.0));
        g.mark_static_obstacles([&obstacle]);

        // Park the listener right next to the obstacle; padded marking would
        // otherwise spill into it.
        let pos = Vec3::new(0.6, 1.5, 0.0);
        g.update_object(DynamicRole::Listener, pos, pos, 0.3);
        assert_eq!(g.state_at_world(Vec3::new(2.0, 1.5, 0.0)), CellState::StaticObstacle);
        g.update_object(DynamicRole::Listener, pos, Vec3::new(-5.0, 1.5, 0.0), 0.3);
        assert_eq!(g.state_at_world(Vec3::new(2.0, 1.5, 0.0)), CellState::StaticObstacle);
    }

    #[test]
    fn sphere_overlap_helper() {
        assert!(spheres_intersect(Vec3::ZERO, 1.0, Vec3::X * 1.5, 1.0));
        assert!(!spheres_intersect(Vec3::ZERO, 1.0, Vec3::X * 3.0, 1.0));
    }
}
