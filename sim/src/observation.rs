//! Observation vector assembly.
//!
//! Layout, per target `i` in order, then one obstacle pair:
//!
//! ```text
//! [r_i, α_i, ṙ_i, α̇_i, ln det Σ_i, observed_i] × N, d_obs, α_obs
//! ```
//!
//! Geometry is agent-relative and computed from the belief, never from the
//! ground truth. With no obstacle in range the trailing pair is
//! `(max_range, π)`.

use sensor_models::geometry::{to_polar_rate_relative, to_polar_relative};
use std::f64::consts::PI;
use tracker_core::metrics::log_det;
use tracker_core::types::{position, velocity, STATE_DIM};
use tracker_core::{Control, Pose, Result, StateCov, StateVec, TrackingError};

/// Values per target in the observation vector.
pub const PER_TARGET_LEN: usize = 6;

/// Observation length for `num_targets` targets.
pub fn observation_len(num_targets: usize) -> usize {
    PER_TARGET_LEN * num_targets + 2
}

/// Trailing obstacle pair, or the "nothing in range" sentinel.
fn obstacle_pair(obstacle: Option<(f64, f64)>, max_range: f64) -> [f64; 2] {
    match obstacle {
        Some((d, b)) => [d, b],
        None => [max_range, PI],
    }
}

/// Observation at reset: beliefs at their prior positions, zero rates, the
/// prior log-determinant and nothing observed yet.
pub fn initial_observation(
    agent: &Pose,
    belief_positions: &[[f64; 2]],
    init_cov: f64,
    max_range: f64,
) -> Result<Vec<f64>> {
    let prior_logdet = (STATE_DIM as f64) * init_cov.ln();
    if !prior_logdet.is_finite() {
        return Err(TrackingError::Configuration(format!(
            "initial covariance {init_cov} has no finite log-determinant"
        )));
    }
    let mut obs = Vec::with_capacity(observation_len(belief_positions.len()));
    for xy in belief_positions {
        let (r, b) = to_polar_relative(*xy, agent.xy(), agent.heading);
        obs.extend_from_slice(&[r, b, 0.0, 0.0, prior_logdet, 0.0]);
    }
    obs.extend_from_slice(&obstacle_pair(None, max_range));
    Ok(obs)
}

/// Observation after a step.
///
/// `control` is the control applied by the agent this step and enters the
/// range / bearing rates.
pub fn compose_observation(
    agent: &Pose,
    control: Control,
    beliefs: &[StateVec],
    covs: &[StateCov],
    observed: &[bool],
    obstacle: Option<(f64, f64)>,
    max_range: f64,
) -> Result<Vec<f64>> {
    let n = beliefs.len();
    if covs.len() != n || observed.len() != n {
        return Err(TrackingError::BackendContractViolation(format!(
            "observation inputs disagree: {n} beliefs, {} covariances, {} flags",
            covs.len(),
            observed.len()
        )));
    }

    let mut obs = Vec::with_capacity(observation_len(n));
    for (i, ((state, cov), seen)) in beliefs.iter().zip(covs).zip(observed).enumerate() {
        let logdet = log_det(cov);
        if !logdet.is_finite() {
            return Err(TrackingError::NumericalInstability(format!(
                "target {i}: log-determinant of belief covariance is {logdet}"
            )));
        }
        let (r, b) = to_polar_relative(position(state), agent.xy(), agent.heading);
        let (r_dot, b_dot) = to_polar_rate_relative(
            position(state),
            velocity(state),
            agent.xy(),
            agent.heading,
            control.v,
            control.w,
        );
        obs.extend_from_slice(&[r, b, r_dot, b_dot, logdet, if *seen { 1.0 } else { 0.0 }]);
    }
    obs.extend_from_slice(&obstacle_pair(obstacle, max_range));
    Ok(obs)
}
