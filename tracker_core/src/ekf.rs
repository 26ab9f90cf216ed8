//! Extended Kalman Filter (EKF) correction for range-bearing measurements.
//!
//! The observation model is linearised at the predicted estimate. Covariance
//! is updated in Joseph form and then symmetrized so it stays PSD.

use crate::error::{Result, TrackingError};
use crate::types::{MeasCov, MeasVec, StateCov, StateVec};
use sensor_models::geometry::wrap_angle;
use sensor_models::ObservationModel;

/// Diagonal jitter added to S for the single regularised retry.
pub const INNOVATION_JITTER: f64 = 1e-9;

/// Result of an EKF update step.
#[derive(Clone, Debug)]
pub struct KfUpdateResult {
    pub state: StateVec,
    pub cov: StateCov,
    /// Innovation ν = z − h(x)
    pub innovation: MeasVec,
    /// True if S needed the jitter retry to invert
    pub regularized: bool,
}

/// Invert S, retrying once with diagonal jitter.
fn invert_innovation_cov(s: &MeasCov) -> Result<(MeasCov, bool)> {
    if let Some(inv) = s.lu().try_inverse() {
        if inv.iter().all(|v| v.is_finite()) {
            return Ok((inv, false));
        }
    }
    tracing::warn!("innovation covariance singular, retrying with jitter");
    let jittered = s + MeasCov::identity() * INNOVATION_JITTER;
    match jittered.lu().try_inverse() {
        Some(inv) if inv.iter().all(|v| v.is_finite()) => Ok((inv, true)),
        _ => Err(TrackingError::NumericalInstability(
            "innovation covariance is singular".into(),
        )),
    }
}

/// EKF update of `(state, cov)` with measurement `z` under `model`.
pub fn update_ekf<M: ObservationModel>(
    state: &StateVec,
    cov: &StateCov,
    z: &MeasVec,
    model: &M,
) -> Result<KfUpdateResult> {
    let h = model.jacobian(state);
    let r = model.noise_cov();

    // Innovation: ν = z − h(x)
    let mut innovation = z - model.predict(state);
    if let Some(i) = model.angular_component() {
        innovation[i] = wrap_angle(innovation[i]);
    }

    // Innovation covariance: S = H·P·Hᵀ + R
    let s = h * cov * h.transpose() + r;
    let (s_inv, regularized) = invert_innovation_cov(&s)?;

    // Kalman gain: K = P·Hᵀ·S⁻¹
    let k = cov * h.transpose() * s_inv;

    // Updated state: x' = x + K·ν
    let new_state = state + k * innovation;

    // Updated covariance (Joseph form), then symmetrized
    let i_kh = StateCov::identity() - k * h;
    let joseph = i_kh * cov * i_kh.transpose() + k * r * k.transpose();
    let new_cov = (joseph + joseph.transpose()) * 0.5;

    if !new_state.iter().chain(new_cov.iter()).all(|v| v.is_finite()) {
        return Err(TrackingError::NumericalInstability(
            "non-finite posterior after EKF update".into(),
        ));
    }

    Ok(KfUpdateResult {
        state: new_state,
        cov: new_cov,
        innovation,
        regularized,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use sensor_models::RangeBearingObservation;

    #[test]
    fn polar_update_pulls_toward_measurement() {
        let model = RangeBearingObservation::new([0.0, 0.0], 0.0, 0.2, 0.01);
        let state = StateVec::new(10.0, 0.0, 0.0, 0.0);
        let cov = StateCov::identity() * 10.0;

        // Measured a bit further and slightly to the left
        let z = MeasVec::new(10.5, 0.05);
        let res = update_ekf(&state, &cov, &z, &model).unwrap();

        assert!(res.state[0] > 10.0);
        assert!(res.state[1] > 0.0);
        assert!(!res.regularized);
        assert!(res.cov.trace() < cov.trace(), "Update should reduce uncertainty");
        assert_eq!(res.cov, res.cov.transpose());
    }

    #[test]
    fn bearing_innovation_is_wrapped() {
        let model = RangeBearingObservation::new([0.0, 0.0], 0.0, 0.2, 0.01);
        // Target just behind the agent, slightly above the -x axis
        let state = StateVec::new(-5.0, 0.01, 0.0, 0.0);
        let cov = StateCov::identity();
        let z = MeasVec::new(5.0, -std::f64::consts::PI + 0.001);
        let res = update_ekf(&state, &cov, &z, &model).unwrap();
        assert!(res.innovation[1].abs() < 0.1);
    }

    #[test]
    fn singular_innovation_recovers_with_jitter() {
        let model = RangeBearingObservation::new([0.0, 0.0], 0.0, 0.0, 0.0);
        let state = StateVec::new(5.0, 0.0, 0.0, 0.0);
        let cov = StateCov::zeros();
        let z = MeasVec::new(5.0, 0.0);
        // S = 0 until the single jitter retry.
        let res = update_ekf(&state, &cov, &z, &model).unwrap();
        assert!(res.regularized);
    }

    #[test]
    fn nan_covariance_is_reported() {
        let model = RangeBearingObservation::new([0.0, 0.0], 0.0, 0.2, 0.01);
        let state = StateVec::new(5.0, 0.0, 0.0, 0.0);
        let cov = StateCov::identity() * f64::NAN;
        let z = MeasVec::new(5.0, 0.0);
        let err = update_ekf(&state, &cov, &z, &model).unwrap_err();
        assert!(matches!(err, TrackingError::NumericalInstability(_)));
    }
}
