//! Range-bearing measurement simulator.
//!
//! Generates one measurement per target per step with:
//! - validity: inside max range and the half field of view
//! - independent Gaussian range / bearing noise on valid measurements

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use rand_distr::Normal;
use sensor_models::geometry::{to_polar_relative, wrap_angle};
use sensor_models::RangeBearingParams;
use tracker_core::{Pose, RangeBearing, Result, StateVec, TrackingError};

/// Agent-mounted range-bearing sensor.
#[derive(Clone, Debug)]
pub struct RangeBearingSensor {
    pub params: RangeBearingParams,
    range_noise: Normal<f64>,
    bearing_noise: Normal<f64>,
    rng: ChaCha8Rng,
}

impl RangeBearingSensor {
    pub fn new(params: RangeBearingParams, seed: u64) -> Result<Self> {
        let range_noise = Normal::new(0.0, params.range_noise_std)
            .map_err(|e| TrackingError::Configuration(format!("range noise: {e}")))?;
        let bearing_noise = Normal::new(0.0, params.bearing_noise_std)
            .map_err(|e| TrackingError::Configuration(format!("bearing noise: {e}")))?;
        Ok(Self {
            params,
            range_noise,
            bearing_noise,
            rng: ChaCha8Rng::seed_from_u64(seed),
        })
    }

    /// Measure every target from `pose`, in target order.
    pub fn sense(&mut self, pose: &Pose, targets: &[StateVec]) -> Vec<RangeBearing> {
        targets
            .iter()
            .map(|t| {
                let (range, bearing) = to_polar_relative([t[0], t[1]], pose.xy(), pose.heading);
                if !self.params.in_footprint(range, bearing) {
                    return RangeBearing::invalid(range, bearing);
                }
                let noisy_range = (range + self.range_noise.sample(&mut self.rng)).max(0.0);
                let noisy_bearing = wrap_angle(bearing + self.bearing_noise.sample(&mut self.rng));
                RangeBearing::valid(noisy_range, noisy_bearing)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn noiseless() -> RangeBearingParams {
        RangeBearingParams {
            range_noise_std: 0.0,
            bearing_noise_std: 0.0,
            ..Default::default()
        }
    }

    #[test]
    fn validity_follows_range_and_fov() {
        let mut sensor = RangeBearingSensor::new(noiseless(), 0).unwrap();
        let pose = Pose::new(0.0, 0.0, 0.0);
        let targets = [
            StateVec::new(5.0, 1.0, 0.0, 0.0),   // in view
            StateVec::new(-5.0, 0.0, 0.0, 0.0),  // behind
            StateVec::new(20.0, 0.0, 0.0, 0.0),  // too far
            StateVec::new(1.0, 3.0, 0.0, 0.0),   // 71.6°, outside 60° half-FOV
        ];
        let m = sensor.sense(&pose, &targets);
        assert_eq!(
            m.iter().map(|x| x.valid).collect::<Vec<_>>(),
            vec![true, false, false, false]
        );
        assert_abs_diff_eq!(m[0].range, 26f64.sqrt(), epsilon = 1e-12);
        assert_abs_diff_eq!(m[0].bearing, 0.2f64.atan(), epsilon = 1e-12);
    }

    #[test]
    fn noise_has_configured_spread() {
        let params = RangeBearingParams {
            range_noise_std: 0.5,
            bearing_noise_std: 0.05,
            ..Default::default()
        };
        let mut sensor = RangeBearingSensor::new(params, 42).unwrap();
        let pose = Pose::default();
        let target = [StateVec::new(5.0, 0.0, 0.0, 0.0)];
        let n = 4000;
        let errs: Vec<f64> = (0..n).map(|_| sensor.sense(&pose, &target)[0].range - 5.0).collect();
        let mean = errs.iter().sum::<f64>() / n as f64;
        let std = (errs.iter().map(|e| (e - mean).powi(2)).sum::<f64>() / n as f64).sqrt();
        assert!(mean.abs() < 0.05, "mean {mean}");
        assert!((std - 0.5).abs() < 0.05, "std {std}");
    }

    #[test]
    fn noisy_range_is_never_negative() {
        let params = RangeBearingParams {
            range_noise_std: 1.0,
            ..Default::default()
        };
        let mut sensor = RangeBearingSensor::new(params, 8).unwrap();
        let pose = Pose::default();
        let target = [StateVec::new(0.05, 0.0, 0.0, 0.0)];
        let ranges: Vec<f64> = (0..500).map(|_| sensor.sense(&pose, &target)[0].range).collect();
        assert!(ranges.iter().all(|r| *r >= 0.0));
        assert!(ranges.iter().any(|r| *r == 0.0));
    }

    #[test]
    fn negative_noise_is_rejected() {
        let params = RangeBearingParams {
            range_noise_std: -1.0,
            ..Default::default()
        };
        assert!(RangeBearingSensor::new(params, 0).is_err());
    }
}
