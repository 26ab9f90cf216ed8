//! Multi-target belief estimator: one predict + correct cycle per step.
//!
//! # Processing steps per call
//! 1. Check the measurement list matches the number of beliefs
//! 2. Predict every belief one sampling period ahead (integrator model)
//! 3. For each target with a valid measurement: EKF range-bearing correction
//! 4. Commit all new beliefs at once (nothing is written on error)
//!
//! The estimator also serves the belief-filter contract used by backends:
//! flat mean / block-diagonal covariance accessors and `update_belief`.

use crate::{
    belief::TargetBelief,
    ekf::update_ekf,
    error::{Result, TrackingError},
    kf::{IntegratorKalmanFilter, IntegratorKfConfig, KalmanFilter},
    types::{Pose, RangeBearing, StateCov, StateVec, STATE_DIM},
};
use nalgebra::DMatrix;
use sensor_models::RangeBearingObservation;
use serde::{Deserialize, Serialize};

/// Lower bound on the standard deviations used to build R.
pub const MIN_MEASUREMENT_STD: f64 = 1e-3;

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Configuration for the belief estimator.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EstimatorConfig {
    /// Prediction horizon per step (seconds)
    pub sampling_period: f64,
    /// Motion model assumed by the filter
    pub kf_config: IntegratorKfConfig,
    /// Range noise std assumed by the filter (meters)
    pub range_noise_std: f64,
    /// Bearing noise std assumed by the filter (radians)
    pub bearing_noise_std: f64,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            sampling_period: 0.5,
            kf_config: IntegratorKfConfig::default(),
            range_noise_std: 0.2,
            bearing_noise_std: 0.01,
        }
    }
}

/// Outputs of one estimator step.
#[derive(Clone, Debug, Default)]
pub struct EstimatorOutput {
    /// Per-target observed flag (valid measurement fused this step)
    pub observed: Vec<bool>,
    /// Number of corrections that needed the jitter retry
    pub regularized: usize,
}

// ---------------------------------------------------------------------------
// Estimator
// ---------------------------------------------------------------------------

/// Holds one Gaussian belief per target and the filter that advances them.
#[derive(Clone, Debug)]
pub struct BeliefEstimator {
    pub config: EstimatorConfig,
    kf: IntegratorKalmanFilter,
    beliefs: Vec<TargetBelief>,
}

impl BeliefEstimator {
    pub fn new(config: EstimatorConfig) -> Self {
        let kf = IntegratorKalmanFilter::new(config.kf_config.clone());
        Self {
            config,
            kf,
            beliefs: Vec::new(),
        }
    }

    /// Replace all beliefs: one per initial mean, covariance `cov_scale · I₄`.
    pub fn reset(&mut self, means: &[StateVec], cov_scale: f64) {
        self.beliefs = means
            .iter()
            .map(|m| TargetBelief::new(*m, cov_scale))
            .collect();
    }

    pub fn num_targets(&self) -> usize {
        self.beliefs.len()
    }

    pub fn beliefs(&self) -> &[TargetBelief] {
        &self.beliefs
    }

    /// Predict every belief, then correct those with a valid measurement.
    pub fn predict_and_update(
        &mut self,
        pose: &Pose,
        measurements: &[RangeBearing],
    ) -> Result<EstimatorOutput> {
        if measurements.len() != self.beliefs.len() {
            return Err(TrackingError::BackendContractViolation(format!(
                "expected {} measurements, got {}",
                self.beliefs.len(),
                measurements.len()
            )));
        }

        let model = RangeBearingObservation::new(
            pose.xy(),
            pose.heading,
            self.config.range_noise_std.max(MIN_MEASUREMENT_STD),
            self.config.bearing_noise_std.max(MIN_MEASUREMENT_STD),
        );
        let dt = self.config.sampling_period;

        let mut next = self.beliefs.clone();
        let mut out = EstimatorOutput {
            observed: Vec::with_capacity(next.len()),
            regularized: 0,
        };

        for (belief, meas) in next.iter_mut().zip(measurements) {
            let (pred_state, pred_cov) = self.kf.predict(&belief.state, &belief.cov, dt);
            belief.state = pred_state;
            belief.cov = (pred_cov + pred_cov.transpose()) * 0.5;

            if meas.valid {
                let res = update_ekf(&belief.state, &belief.cov, &meas.as_vector(), &model)?;
                belief.state = res.state;
                belief.cov = res.cov;
                if res.regularized {
                    out.regularized += 1;
                }
            }
            out.observed.push(meas.valid);
        }

        if next
            .iter()
            .any(|b| !b.state.iter().chain(b.cov.iter()).all(|v| v.is_finite()))
        {
            return Err(TrackingError::NumericalInstability(
                "non-finite belief after prediction".into(),
            ));
        }

        self.beliefs = next;
        tracing::trace!(
            observed = out.observed.iter().filter(|o| **o).count(),
            regularized = out.regularized,
            "belief step"
        );
        Ok(out)
    }

    // -----------------------------------------------------------------------
    // Belief-filter contract
    // -----------------------------------------------------------------------

    /// Mean state of every target, in target order.
    pub fn target_states(&self) -> Vec<StateVec> {
        self.beliefs.iter().map(|b| b.state).collect()
    }

    /// Covariance of every target, in target order.
    pub fn covariances(&self) -> Vec<StateCov> {
        self.beliefs.iter().map(|b| b.cov).collect()
    }

    /// Flattened means `[x₀ y₀ vx₀ vy₀ x₁ …]`.
    pub fn flat_state(&self) -> Vec<f64> {
        self.beliefs
            .iter()
            .flat_map(|b| b.state.iter().copied())
            .collect()
    }

    /// Block-diagonal joint covariance (4N × 4N).
    pub fn covariance_matrix(&self) -> DMatrix<f64> {
        let n = self.beliefs.len() * STATE_DIM;
        let mut joint = DMatrix::zeros(n, n);
        for (i, b) in self.beliefs.iter().enumerate() {
            let o = i * STATE_DIM;
            joint.view_mut((o, o), (STATE_DIM, STATE_DIM)).copy_from(&b.cov);
        }
        joint
    }

    /// Overwrite beliefs from a flat mean and a joint covariance; only the
    /// diagonal blocks are kept.
    pub fn update_belief(&mut self, mean: &[f64], cov: &DMatrix<f64>) -> Result<()> {
        let n = self.beliefs.len() * STATE_DIM;
        if mean.len() != n || cov.nrows() != n || cov.ncols() != n {
            return Err(TrackingError::BackendContractViolation(format!(
                "belief update expects mean of {n} and {n}x{n} covariance, got {} and {}x{}",
                mean.len(),
                cov.nrows(),
                cov.ncols()
            )));
        }
        if !mean.iter().chain(cov.iter()).all(|v| v.is_finite()) {
            return Err(TrackingError::NumericalInstability(
                "non-finite belief update".into(),
            ));
        }
        for (i, b) in self.beliefs.iter_mut().enumerate() {
            let o = i * STATE_DIM;
            b.state = StateVec::from_column_slice(&mean[o..o + STATE_DIM]);
            let block: StateCov = cov.fixed_view::<4, 4>(o, o).into_owned();
            b.cov = (block + block.transpose()) * 0.5;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use sensor_models::geometry::to_polar_relative;

    fn estimator(q: f64) -> BeliefEstimator {
        BeliefEstimator::new(EstimatorConfig {
            kf_config: IntegratorKfConfig { process_noise: q },
            ..Default::default()
        })
    }

    fn is_psd(cov: &StateCov) -> bool {
        let sym = (cov - cov.transpose()).abs().max() < 1e-9;
        let eig = cov.symmetric_eigenvalues();
        sym && eig.iter().all(|l| *l >= -1e-9)
    }

    fn measure(target: &StateVec, pose: &Pose, valid: bool) -> RangeBearing {
        let (r, b) = to_polar_relative([target[0], target[1]], pose.xy(), pose.heading);
        RangeBearing { range: r, bearing: b, valid }
    }

    #[test]
    fn invalid_measurement_is_pure_prediction() {
        let mut est = estimator(0.01);
        let mean = StateVec::new(4.0, 1.0, 0.5, -0.2);
        est.reset(&[mean], 30.0);

        let (pred_state, pred_cov) = IntegratorKalmanFilter::new(IntegratorKfConfig {
            process_noise: 0.01,
        })
        .predict(&mean, &(StateCov::identity() * 30.0), 0.5);

        let pose = Pose::default();
        let out = est
            .predict_and_update(&pose, &[RangeBearing::invalid(0.0, 0.0)])
            .unwrap();
        assert_eq!(out.observed, vec![false]);

        let b = &est.beliefs()[0];
        for i in 0..4 {
            assert_abs_diff_eq!(b.state[i], pred_state[i], epsilon = 1e-12);
            assert!(b.cov[(i, i)] >= pred_cov[(i, i)] - 1e-12);
        }
    }

    #[test]
    fn covariance_stays_psd_over_mixed_sequence() {
        let mut est = estimator(0.05);
        let truth = [StateVec::new(6.0, 2.0, 0.0, 0.0), StateVec::new(-3.0, 5.0, 0.0, 0.0)];
        est.reset(&[StateVec::new(5.0, 3.0, 0.0, 0.0), StateVec::new(-2.0, 4.0, 0.0, 0.0)], 30.0);
        let pose = Pose::new(0.0, 0.0, 0.3);

        for step in 0..40 {
            let meas: Vec<RangeBearing> = truth
                .iter()
                .enumerate()
                .map(|(i, t)| measure(t, &pose, (step + i) % 3 != 0))
                .collect();
            est.predict_and_update(&pose, &meas).unwrap();
            for cov in est.covariances() {
                assert!(is_psd(&cov), "covariance lost PSD at step {step}");
            }
        }
    }

    #[test]
    fn repeated_observation_shrinks_determinant() {
        let mut est = estimator(0.01);
        let truth = StateVec::new(5.0, 0.0, 0.0, 0.0);
        est.reset(&[truth], 30.0);
        let pose = Pose::default();
        let det0 = est.covariances()[0].determinant();
        for _ in 0..5 {
            est.predict_and_update(&pose, &[measure(&truth, &pose, true)]).unwrap();
        }
        assert!(est.covariances()[0].determinant() < det0);
    }

    #[test]
    fn wrong_measurement_count_is_contract_violation() {
        let mut est = estimator(0.01);
        est.reset(&[StateVec::zeros(), StateVec::zeros()], 1.0);
        let err = est
            .predict_and_update(&Pose::default(), &[RangeBearing::invalid(0.0, 0.0)])
            .unwrap_err();
        assert!(matches!(err, TrackingError::BackendContractViolation(_)));
        // Nothing was committed
        assert_eq!(est.covariances()[0], StateCov::identity());
    }

    #[test]
    fn joint_matrix_round_trips_through_update_belief() {
        let mut est = estimator(0.01);
        est.reset(&[StateVec::new(1.0, 2.0, 3.0, 4.0), StateVec::new(5.0, 6.0, 7.0, 8.0)], 2.0);
        let flat = est.flat_state();
        let joint = est.covariance_matrix();
        assert_eq!(flat.len(), 8);
        assert_eq!((joint.nrows(), joint.ncols()), (8, 8));
        assert_eq!(joint[(4, 4)], 2.0);
        assert_eq!(joint[(0, 4)], 0.0);

        let mut other = estimator(0.01);
        other.reset(&[StateVec::zeros(), StateVec::zeros()], 9.0);
        other.update_belief(&flat, &joint).unwrap();
        assert_eq!(other.target_states(), est.target_states());
        assert_eq!(other.covariances(), est.covariances());

        let bad = DMatrix::zeros(4, 4);
        assert!(matches!(
            other.update_belief(&flat, &bad),
            Err(TrackingError::BackendContractViolation(_))
        ));
    }
}
