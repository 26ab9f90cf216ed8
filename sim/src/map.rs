//! Obstacle maps queried by the agent motion model, the reward and reset sampling.
//!
//! The core only uses maps through [`ObstacleMap`]; map files and
//! rasterization live elsewhere. `GridMap` is built programmatically.

use sensor_models::geometry::to_polar_relative;
use serde::{Deserialize, Serialize};
use tracker_core::{Pose, Result, TrackingError};

/// Upper bound on grid size.
const MAX_CELLS: usize = 1 << 26;

/// Black-box obstacle predicates.
pub trait ObstacleMap {
    /// True if the point is occupied or outside the map.
    fn is_collision(&self, xy: [f64; 2]) -> bool;

    /// Distance and agent-relative bearing of the nearest obstacle within
    /// `max_range`, or `None`.
    fn closest_obstacle(&self, pose: &Pose, max_range: f64) -> Option<(f64, f64)>;

    /// True if the straight segment from `a` to `b` crosses an obstacle.
    fn is_blocked(&self, a: [f64; 2], b: [f64; 2]) -> bool;

    /// Axis-aligned bounds `(min, max)` if the map is finite.
    fn bounds(&self) -> Option<([f64; 2], [f64; 2])>;
}

/// Unbounded, obstacle-free plane.
#[derive(Clone, Copy, Debug, Default)]
pub struct EmptyMap;

impl ObstacleMap for EmptyMap {
    fn is_collision(&self, _xy: [f64; 2]) -> bool {
        false
    }

    fn closest_obstacle(&self, _pose: &Pose, _max_range: f64) -> Option<(f64, f64)> {
        None
    }

    fn is_blocked(&self, _a: [f64; 2], _b: [f64; 2]) -> bool {
        false
    }

    fn bounds(&self) -> Option<([f64; 2], [f64; 2])> {
        None
    }
}

/// Occupancy grid over a rectangular area.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GridMap {
    /// Lower-left corner (meters)
    pub origin: [f64; 2],
    /// Cell edge length (meters)
    pub resolution: f64,
    pub width: usize,
    pub height: usize,
    /// Row-major occupancy, `cells[iy * width + ix]`
    cells: Vec<bool>,
}

impl GridMap {
    /// Obstacle-free grid covering `[min, max]`.
    pub fn new(min: [f64; 2], max: [f64; 2], resolution: f64) -> Result<Self> {
        if !(resolution.is_finite() && resolution > 0.0) {
            return Err(TrackingError::Configuration(format!(
                "grid resolution must be positive, got {resolution}"
            )));
        }
        if !min.iter().chain(&max).all(|v| v.is_finite()) || min[0] >= max[0] || min[1] >= max[1] {
            return Err(TrackingError::Configuration(format!(
                "grid bounds {min:?}..{max:?} are empty or non-finite"
            )));
        }
        let width = ((max[0] - min[0]) / resolution).ceil() as usize;
        let height = ((max[1] - min[1]) / resolution).ceil() as usize;
        let n_cells = width
            .checked_mul(height)
            .filter(|n| *n <= MAX_CELLS)
            .ok_or_else(|| {
                TrackingError::Configuration(format!(
                    "grid of {width} x {height} cells exceeds {MAX_CELLS} cells"
                ))
            })?;
        Ok(Self {
            origin: min,
            resolution,
            width,
            height,
            cells: vec![false; n_cells],
        })
    }

    /// Mark every cell whose centre lies in the rectangle `[min, max]` occupied.
    pub fn with_rect(mut self, min: [f64; 2], max: [f64; 2]) -> Self {
        for iy in 0..self.height {
            for ix in 0..self.width {
                let [cx, cy] = self.cell_center(ix, iy);
                if cx >= min[0] && cx <= max[0] && cy >= min[1] && cy <= max[1] {
                    self.cells[iy * self.width + ix] = true;
                }
            }
        }
        self
    }

    /// Mark the cell containing `xy` occupied. Points outside the map are ignored.
    pub fn set_occupied(&mut self, xy: [f64; 2]) {
        if let Some((ix, iy)) = self.cell_of(xy) {
            self.cells[iy * self.width + ix] = true;
        }
    }

    pub fn is_occupied(&self, xy: [f64; 2]) -> bool {
        self.cell_of(xy)
            .map(|(ix, iy)| self.cells[iy * self.width + ix])
            .unwrap_or(false)
    }

    fn cell_of(&self, xy: [f64; 2]) -> Option<(usize, usize)> {
        let fx = (xy[0] - self.origin[0]) / self.resolution;
        let fy = (xy[1] - self.origin[1]) / self.resolution;
        if fx < 0.0 || fy < 0.0 {
            return None;
        }
        let (ix, iy) = (fx.floor() as usize, fy.floor() as usize);
        (ix < self.width && iy < self.height).then_some((ix, iy))
    }

    fn cell_center(&self, ix: usize, iy: usize) -> [f64; 2] {
        [
            self.origin[0] + (ix as f64 + 0.5) * self.resolution,
            self.origin[1] + (iy as f64 + 0.5) * self.resolution,
        ]
    }

    fn max_corner(&self) -> [f64; 2] {
        [
            self.origin[0] + self.width as f64 * self.resolution,
            self.origin[1] + self.height as f64 * self.resolution,
        ]
    }
}

impl ObstacleMap for GridMap {
    fn is_collision(&self, xy: [f64; 2]) -> bool {
        match self.cell_of(xy) {
            Some((ix, iy)) => self.cells[iy * self.width + ix],
            None => true,
        }
    }

    fn closest_obstacle(&self, pose: &Pose, max_range: f64) -> Option<(f64, f64)> {
        let mut best: Option<(f64, f64)> = None;
        for iy in 0..self.height {
            for ix in 0..self.width {
                if !self.cells[iy * self.width + ix] {
                    continue;
                }
                let (r, b) = to_polar_relative(self.cell_center(ix, iy), pose.xy(), pose.heading);
                if r <= max_range && best.map_or(true, |(br, _)| r < br) {
                    best = Some((r, b));
                }
            }
        }
        best
    }

    fn is_blocked(&self, a: [f64; 2], b: [f64; 2]) -> bool {
        let len = ((b[0] - a[0]).powi(2) + (b[1] - a[1]).powi(2)).sqrt();
        let n = (len / (self.resolution * 0.25)).ceil().max(1.0) as usize;
        (0..=n).any(|i| {
            let t = i as f64 / n as f64;
            self.is_occupied([a[0] + t * (b[0] - a[0]), a[1] + t * (b[1] - a[1])])
        })
    }

    fn bounds(&self) -> Option<([f64; 2], [f64; 2])> {
        Some((self.origin, self.max_corner()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn wall_map() -> GridMap {
        // 20 x 20 m area with a wall at x ∈ [4, 5]
        GridMap::new([-10.0, -10.0], [10.0, 10.0], 0.5)
            .unwrap()
            .with_rect([4.0, -10.0], [5.0, 10.0])
    }

    #[test]
    fn collision_inside_wall_and_outside_bounds() {
        let map = wall_map();
        assert!(map.is_collision([4.5, 0.0]));
        assert!(!map.is_collision([0.0, 0.0]));
        assert!(map.is_collision([11.0, 0.0]));
        assert!(map.is_collision([0.0, -10.5]));
    }

    #[test]
    fn closest_obstacle_is_ahead() {
        let map = wall_map();
        let pose = Pose::new(0.0, 0.0, 0.0);
        let (d, b) = map.closest_obstacle(&pose, 10.0).unwrap();
        // Nearest cell centres are (4.25, ±0.25)
        assert_abs_diff_eq!(d, (4.25f64 * 4.25 + 0.0625).sqrt(), epsilon = 1e-9);
        assert_abs_diff_eq!(b.abs(), (0.25f64 / 4.25).atan(), epsilon = 1e-9);
        assert!(map.closest_obstacle(&pose, 3.0).is_none());
    }

    #[test]
    fn degenerate_grids_are_rejected() {
        for res in [0.0, -0.5, f64::NAN, f64::INFINITY] {
            let err = GridMap::new([-1.0, -1.0], [1.0, 1.0], res).unwrap_err();
            assert!(matches!(err, TrackingError::Configuration(_)));
        }
        assert!(GridMap::new([1.0, -1.0], [1.0, 1.0], 0.5).is_err());
        assert!(GridMap::new([-1.0, -1.0], [1.0, f64::INFINITY], 0.5).is_err());
        assert!(GridMap::new([-1e9, -1e9], [1e9, 1e9], 1e-3).is_err());
        let map = GridMap::new([-1.0, -1.0], [1.0, 1.0], 0.5).unwrap();
        assert_eq!((map.width, map.height), (4, 4));
    }

    #[test]
    fn segment_through_wall_is_blocked() {
        let map = wall_map();
        assert!(map.is_blocked([0.0, 0.0], [8.0, 0.0]));
        assert!(!map.is_blocked([0.0, 0.0], [-8.0, 3.0]));
        assert!(!EmptyMap.is_blocked([0.0, 0.0], [8.0, 0.0]));
    }
}
