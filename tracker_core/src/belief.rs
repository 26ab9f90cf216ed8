//! Per-target Gaussian belief: mean state and covariance.

use crate::types::{StateCov, StateVec};
use serde::{Deserialize, Serialize};

/// Gaussian belief over one target's state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TargetBelief {
    /// Mean state [px, py, vx, vy]
    pub state: StateVec,
    /// State covariance (symmetric PSD)
    pub cov: StateCov,
}

impl TargetBelief {
    /// Belief at reset: given mean, isotropic covariance `cov_scale · I₄`.
    pub fn new(state: StateVec, cov_scale: f64) -> Self {
        Self {
            state,
            cov: StateCov::identity() * cov_scale,
        }
    }
}
