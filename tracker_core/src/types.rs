//! Fundamental types used across the entire workspace.

use nalgebra::{Matrix2, Matrix4, Vector2, Vector4};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Scalar type: use f64 throughout for numerical precision in Kalman filter.
// ---------------------------------------------------------------------------

/// Planar target state vector: [px, py, vx, vy]
pub type StateVec = Vector4<f64>;

/// 4×4 state covariance matrix
pub type StateCov = Matrix4<f64>;

/// Range-bearing measurement vector [range, bearing]
pub type MeasVec = Vector2<f64>;

/// 2×2 measurement / innovation covariance
pub type MeasCov = Matrix2<f64>;

/// Dimension of one target's state.
pub const STATE_DIM: usize = 4;

// ---------------------------------------------------------------------------
// Pose
// ---------------------------------------------------------------------------

/// Planar pose in the world frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub x: f64,
    pub y: f64,
    /// Heading (radians, counter-clockwise from +x)
    pub heading: f64,
}

impl Pose {
    pub fn new(x: f64, y: f64, heading: f64) -> Self {
        Self { x, y, heading }
    }

    pub fn xy(&self) -> [f64; 2] {
        [self.x, self.y]
    }
}

/// Linear / angular velocity pair applied to the agent for one step.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Control {
    /// Linear velocity (m/s)
    pub v: f64,
    /// Angular velocity (rad/s)
    pub w: f64,
}

impl Control {
    pub const STOP: Control = Control { v: 0.0, w: 0.0 };

    pub fn new(v: f64, w: f64) -> Self {
        Self { v, w }
    }
}

// ---------------------------------------------------------------------------
// Measurement
// ---------------------------------------------------------------------------

/// A single range-bearing measurement of one target.
///
/// Measurements are produced in target order, one per target, every step.
/// When `valid` is false the target was outside the sensor footprint and the
/// geometry must not be used for a correction.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RangeBearing {
    /// Range (meters)
    pub range: f64,
    /// Bearing relative to the agent heading (radians, (-π, π])
    pub bearing: f64,
    /// True if the target was inside the sensor footprint
    pub valid: bool,
}

impl RangeBearing {
    pub fn valid(range: f64, bearing: f64) -> Self {
        Self {
            range,
            bearing,
            valid: true,
        }
    }

    pub fn invalid(range: f64, bearing: f64) -> Self {
        Self {
            range,
            bearing,
            valid: false,
        }
    }

    pub fn as_vector(&self) -> MeasVec {
        MeasVec::new(self.range, self.bearing)
    }
}

/// Build a state vector from position and velocity.
pub fn state_from_parts(pos: [f64; 2], vel: [f64; 2]) -> StateVec {
    StateVec::new(pos[0], pos[1], vel[0], vel[1])
}

/// Position part of a state vector.
pub fn position(state: &StateVec) -> [f64; 2] {
    [state[0], state[1]]
}

/// Velocity part of a state vector.
pub fn velocity(state: &StateVec) -> [f64; 2] {
    [state[2], state[3]]
}
