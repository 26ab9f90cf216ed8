//! Reward shaping.
//!
//! Training reward trades off covariance reduction, observation coverage and
//! obstacle proximity. The evaluation reward is a pure uncertainty measure.

use tracker_core::metrics::{det_mean_std, mean_log_det};
use tracker_core::StateCov;

/// Weight of the covariance term in the training reward.
const UNCERTAINTY_WEIGHT: f64 = 0.1;

/// `m² / max(m², d²)`: 1 at or inside the margin, decaying with distance
/// beyond it. Zero when no obstacle is in sensor range.
pub fn obstacle_penalty(obstacle_distance: Option<f64>, margin2wall: f64) -> f64 {
    match obstacle_distance {
        Some(d) => {
            let m2 = margin2wall * margin2wall;
            m2 / m2.max(d * d)
        }
        None => 0.0,
    }
}

/// Training reward for one step.
pub fn training_reward(covs: &[StateCov], observed: &[bool], penalty: f64) -> f64 {
    if !observed.iter().any(|o| *o) {
        return -penalty;
    }
    let (det_mean, det_std) = det_mean_std(covs);
    let uncertainty = -UNCERTAINTY_WEIGHT * (det_mean + det_std).ln();
    let coverage = observed.iter().filter(|o| **o).count() as f64 / observed.len() as f64;
    (uncertainty - penalty).max(0.0) + coverage
}

/// Evaluation reward: `-mean(ln det Σᵢ)`.
pub fn test_reward(covs: &[StateCov]) -> f64 {
    -mean_log_det(covs)
}
