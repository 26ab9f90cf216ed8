//! Kalman filter prediction for planar integrator targets.
//!
//! # Design choices
//! - Linear prediction with a 2D double-integrator (constant velocity driven
//!   by white acceleration noise).
//! - All math is done in `f64` via `nalgebra` fixed-size matrices.
//! - The `KalmanFilter` trait is the seam for alternative motion models.
//!
//! ## State vector
//! x = [px, py, vx, vy]ᵀ  (4-dimensional)
//!
//! ## Transition model
//! F = [[I₂, dt·I₂]; [0₂, I₂]]
//!
//! ## Process noise Q (continuous white noise acceleration, intensity q)
//! Q = q · [[dt³/3·I₂, dt²/2·I₂]; [dt²/2·I₂, dt·I₂]]

use crate::types::{StateCov, StateVec};
use serde::{Deserialize, Serialize};

/// Trait for a Kalman filter motion model.
pub trait KalmanFilter {
    /// Predict state and covariance forward by `dt` seconds.
    fn predict(&self, state: &StateVec, cov: &StateCov, dt: f64) -> (StateVec, StateCov);
}

/// Configuration for the integrator Kalman filter.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IntegratorKfConfig {
    /// Process noise intensity q (m²/s³).
    pub process_noise: f64,
}

impl Default for IntegratorKfConfig {
    fn default() -> Self {
        Self {
            process_noise: 0.01,
        }
    }
}

/// Double-integrator Kalman filter (4-state, linear).
#[derive(Clone, Debug)]
pub struct IntegratorKalmanFilter {
    pub config: IntegratorKfConfig,
}

impl IntegratorKalmanFilter {
    pub fn new(config: IntegratorKfConfig) -> Self {
        Self { config }
    }

    /// Build state transition matrix F for timestep dt.
    pub fn transition_matrix(dt: f64) -> StateCov {
        let mut f = StateCov::identity();
        // position += velocity * dt
        f[(0, 2)] = dt;
        f[(1, 3)] = dt;
        f
    }

    /// Build process noise matrix Q for timestep dt and intensity q.
    pub fn process_noise(dt: f64, q: f64) -> StateCov {
        let dt2 = dt * dt;
        let dt3 = dt2 * dt;

        let mut qm = StateCov::zeros();
        for i in 0..2usize {
            qm[(i, i)] = q * dt3 / 3.0;
            qm[(i + 2, i + 2)] = q * dt;
            qm[(i, i + 2)] = q * dt2 / 2.0;
            qm[(i + 2, i)] = q * dt2 / 2.0;
        }
        qm
    }

    /// Lower-triangular factor L of Q (L·Lᵀ = Q), in closed form per axis.
    /// Used to draw ground-truth process noise as L·n with n ~ N(0, I).
    pub fn process_noise_factor(dt: f64, q: f64) -> StateCov {
        let mut l = StateCov::zeros();
        if q <= 0.0 || dt <= 0.0 {
            return l;
        }
        let l_pp = (q * dt * dt * dt / 3.0).sqrt();
        let l_vp = (q * dt * dt / 2.0) / l_pp;
        let l_vv = (q * dt).sqrt() / 2.0;
        for i in 0..2usize {
            l[(i, i)] = l_pp;
            l[(i + 2, i)] = l_vp;
            l[(i + 2, i + 2)] = l_vv;
        }
        l
    }
}

impl KalmanFilter for IntegratorKalmanFilter {
    fn predict(&self, state: &StateVec, cov: &StateCov, dt: f64) -> (StateVec, StateCov) {
        let f = Self::transition_matrix(dt);
        let q = Self::process_noise(dt, self.config.process_noise);
        let predicted_state = f * state;
        let predicted_cov = f * cov * f.transpose() + q;
        (predicted_state, predicted_cov)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
