//! Uncertainty metrics on belief covariances, and episode-level statistics.

use crate::types::{StateCov, StateVec};
use serde::{Deserialize, Serialize};

/// Natural log of det(Σ).
///
/// Returns `-inf` for a singular covariance and NaN if rounding pushed the
/// determinant negative; callers surface the latter as instability.
pub fn log_det(cov: &StateCov) -> f64 {
    cov.determinant().ln()
}

/// Mean and population standard deviation of det(Σᵢ) across targets.
pub fn det_mean_std(covs: &[StateCov]) -> (f64, f64) {
    if covs.is_empty() {
        return (0.0, 0.0);
    }
    let dets: Vec<f64> = covs.iter().map(|c| c.determinant()).collect();
    let n = dets.len() as f64;
    let mean = dets.iter().sum::<f64>() / n;
    let var = dets.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / n;
    (mean, var.sqrt())
}

/// Mean of ln det(Σᵢ) across targets.
pub fn mean_log_det(covs: &[StateCov]) -> f64 {
    if covs.is_empty() {
        return 0.0;
    }
    covs.iter().map(log_det).sum::<f64>() / covs.len() as f64
}

/// Accumulated per-episode statistics.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct EpisodeMetrics {
    /// Number of steps evaluated
    pub n_steps: u64,
    /// Sum of training rewards
    pub total_reward: f64,
    /// Sum of evaluation rewards (steps where one was produced)
    pub total_test_reward: f64,
    pub n_test_rewards: u64,
    /// Target-steps with a valid measurement
    pub n_observed: u64,
    /// Target-steps evaluated
    pub n_target_steps: u64,
    /// Steps where the requested action was vetoed
    pub n_vetoes: u64,
    /// Sum of squared belief position errors (for RMSE)
    pub sum_sq_pos_err: f64,
}

impl EpisodeMetrics {
    /// Accumulate one step's worth of outcomes.
    pub fn accumulate(
        &mut self,
        reward: f64,
        test_reward: Option<f64>,
        observed: &[bool],
        vetoed: bool,
        beliefs: &[StateVec],
        truths: &[StateVec],
    ) {
        self.n_steps += 1;
        self.total_reward += reward;
        if let Some(tr) = test_reward {
            self.total_test_reward += tr;
            self.n_test_rewards += 1;
        }
        self.n_observed += observed.iter().filter(|o| **o).count() as u64;
        self.n_target_steps += observed.len() as u64;
        if vetoed {
            self.n_vetoes += 1;
        }
        for (b, t) in beliefs.iter().zip(truths) {
            let dx = b[0] - t[0];
            let dy = b[1] - t[1];
            self.sum_sq_pos_err += dx * dx + dy * dy;
        }
    }

    /// Fold another episode into this one.
    pub fn merge(&mut self, other: &EpisodeMetrics) {
        self.n_steps += other.n_steps;
        self.total_reward += other.total_reward;
        self.total_test_reward += other.total_test_reward;
        self.n_test_rewards += other.n_test_rewards;
        self.n_observed += other.n_observed;
        self.n_target_steps += other.n_target_steps;
        self.n_vetoes += other.n_vetoes;
        self.sum_sq_pos_err += other.sum_sq_pos_err;
    }

    pub fn mean_reward(&self) -> f64 {
        if self.n_steps == 0 {
            return 0.0;
        }
        self.total_reward / self.n_steps as f64
    }

    pub fn mean_test_reward(&self) -> Option<f64> {
        if self.n_test_rewards == 0 {
            return None;
        }
        Some(self.total_test_reward / self.n_test_rewards as f64)
    }

    /// Fraction of target-steps with a valid measurement.
    pub fn observed_ratio(&self) -> f64 {
        if self.n_target_steps == 0 {
            return 0.0;
        }
        self.n_observed as f64 / self.n_target_steps as f64
    }

    /// Root-mean-square belief position error (meters).
    pub fn rmse_position(&self) -> f64 {
        if self.n_target_steps == 0 {
            return 0.0;
        }
        (self.sum_sq_pos_err / self.n_target_steps as f64).sqrt()
    }
}
