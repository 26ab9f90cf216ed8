//! Observation models: expected measurement h(x), Jacobian H, noise R.
//!
//! # Measurement type
//! - **Range-bearing**: z = [range, bearing] of a target relative to the
//!   agent's pose. H is the Jacobian of h at the target state x = [px, py, vx, vy].

use crate::geometry::to_polar_relative;
use nalgebra::{Matrix2, Matrix2x4, Vector2, Vector4};
use serde::{Deserialize, Serialize};

/// Trait for a target observation model linearised at a state estimate.
pub trait ObservationModel {
    /// Expected measurement h(x)
    fn predict(&self, state: &Vector4<f64>) -> Vector2<f64>;
    /// Jacobian of h evaluated at `state`
    fn jacobian(&self, state: &Vector4<f64>) -> Matrix2x4<f64>;
    /// Measurement noise covariance R
    fn noise_cov(&self) -> Matrix2<f64>;
    /// Index of the angular component of z, if any (wrapped in innovations).
    fn angular_component(&self) -> Option<usize> {
        None
    }
}

/// Range-bearing observation of a target from an agent pose.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RangeBearingObservation {
    /// Agent position in world frame (x, y)
    pub agent_xy: [f64; 2],
    /// Agent heading (radians)
    pub agent_heading: f64,
    /// Range noise std dev (meters)
    pub sigma_r: f64,
    /// Bearing noise std dev (radians)
    pub sigma_b: f64,
}

impl RangeBearingObservation {
    pub fn new(agent_xy: [f64; 2], agent_heading: f64, sigma_r: f64, sigma_b: f64) -> Self {
        Self {
            agent_xy,
            agent_heading,
            sigma_r,
            sigma_b,
        }
    }
}

impl ObservationModel for RangeBearingObservation {
    fn predict(&self, state: &Vector4<f64>) -> Vector2<f64> {
        let (r, b) = to_polar_relative([state[0], state[1]], self.agent_xy, self.agent_heading);
        Vector2::new(r, b)
    }

    fn jacobian(&self, state: &Vector4<f64>) -> Matrix2x4<f64> {
        let dx = state[0] - self.agent_xy[0];
        let dy = state[1] - self.agent_xy[1];
        // Keep H finite when the estimate sits on top of the agent.
        let r = (dx * dx + dy * dy).sqrt().max(1e-3);
        let r2 = r * r;

        // ∂r/∂px = dx/r,    ∂r/∂py = dy/r
        // ∂b/∂px = -dy/r²,  ∂b/∂py = dx/r²   (heading is a constant offset)
        Matrix2x4::new(
             dx / r,   dy / r,  0.0, 0.0,
            -dy / r2,  dx / r2, 0.0, 0.0,
        )
    }

    fn noise_cov(&self) -> Matrix2<f64> {
        Matrix2::new(
            self.sigma_r * self.sigma_r, 0.0,
            0.0, self.sigma_b * self.sigma_b,
        )
    }

    fn angular_component(&self) -> Option<usize> {
        Some(1)
    }
}
