//! Range-bearing sensor parameters.

use serde::{Deserialize, Serialize};

/// Physical configuration of the agent-mounted range-bearing sensor.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RangeBearingParams {
    /// Maximum sensing range (meters)
    pub max_range: f64,
    /// Full field of view (degrees)
    pub fov_deg: f64,
    /// Measurement noise: range standard deviation (meters)
    pub range_noise_std: f64,
    /// Measurement noise: bearing standard deviation (radians)
    pub bearing_noise_std: f64,
}

impl RangeBearingParams {
    /// Half field of view in radians.
    pub fn fov_half(&self) -> f64 {
        self.fov_deg.to_radians() / 2.0
    }

    /// True if a target at `(range, bearing)` is inside the sensing footprint.
    pub fn in_footprint(&self, range: f64, bearing: f64) -> bool {
        range <= self.max_range && bearing.abs() <= self.fov_half()
    }
}

impl Default for RangeBearingParams {
    fn default() -> Self {
        Self {
            max_range: 10.0,
            fov_deg: 120.0,
            range_noise_std: 0.2,
            bearing_noise_std: 0.01,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn footprint_edges_are_inclusive() {
        let p = RangeBearingParams::default();
        assert!(p.in_footprint(10.0, 0.0));
        assert!(p.in_footprint(3.0, p.fov_half()));
        assert!(!p.in_footprint(10.0 + 1e-9, 0.0));
        assert!(!p.in_footprint(3.0, -p.fov_half() - 1e-9));
    }
}
