//! Initial pose records and the reset-time sampler.
//!
//! A record fixes the agent pose, every true target pose and every belief
//! prior pose. Records are either sampled here or replayed from a pose set.

use crate::config::{check_range, InitPoseConfig};
use crate::map::ObstacleMap;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use sensor_models::geometry::{from_polar_relative, wrap_angle};
use serde::{Deserialize, Serialize};
use std::f64::consts::{FRAC_PI_2, PI};
use tracker_core::{Pose, Result, TrackingError};

/// Target placement tries per agent placement.
const TARGET_ATTEMPTS: usize = 100;

/// One episode's initial configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InitPose {
    pub agent: Pose,
    /// True target poses; heading is the direction of the initial velocity
    pub targets: Vec<Pose>,
    /// Belief prior poses (means start at zero velocity)
    pub belief_targets: Vec<Pose>,
}

// ---------------------------------------------------------------------------
// Reset options
// ---------------------------------------------------------------------------

/// Per-reset overrides of the sampling rules.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResetOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub init_distance_min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub init_distance_max: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_direction: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub belief_direction: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocked: Option<bool>,
}

impl ResetOptions {
    /// Parse options from a JSON object. Unknown keys and wrong value types
    /// are configuration errors.
    pub fn from_json(value: serde_json::Value) -> Result<Self> {
        serde_json::from_value(value)
            .map_err(|e| TrackingError::Configuration(format!("reset options: {e}")))
    }

    /// Parse options from key/value pairs.
    pub fn from_pairs<I, K>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, serde_json::Value)>,
        K: Into<String>,
    {
        let map: serde_json::Map<String, serde_json::Value> =
            pairs.into_iter().map(|(k, v)| (k.into(), v)).collect();
        Self::from_json(serde_json::Value::Object(map))
    }

    /// Overlay these options on `base` and validate the result.
    pub fn apply(&self, base: &InitPoseConfig) -> Result<InitPoseConfig> {
        let mut cfg = base.clone();
        if let Some(v) = self.init_distance_min {
            cfg.init_distance_min = v;
        }
        if let Some(v) = self.init_distance_max {
            cfg.init_distance_max = v;
        }
        if let Some(v) = self.target_direction {
            cfg.target_direction = v;
        }
        if let Some(v) = self.belief_direction {
            cfg.belief_direction = v;
        }
        if self.blocked.is_some() {
            cfg.blocked = self.blocked;
        }
        check_range("init_distance", cfg.init_distance_min, cfg.init_distance_max)?;
        Ok(cfg)
    }
}

// ---------------------------------------------------------------------------
// Sampler
// ---------------------------------------------------------------------------

/// Draws [`InitPose`] records that satisfy the placement rules.
#[derive(Clone, Debug)]
pub struct InitPoseSampler {
    pub num_targets: usize,
    /// Sensor half field of view (radians), the default target bearing window
    pub fov_half: f64,
    rng: ChaCha8Rng,
}

impl InitPoseSampler {
    pub fn new(num_targets: usize, fov_half: f64, seed: u64) -> Self {
        Self {
            num_targets,
            fov_half,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    pub fn sample<M: ObstacleMap + ?Sized>(
        &mut self,
        cfg: &InitPoseConfig,
        map: &M,
    ) -> Result<InitPose> {
        cfg.validate()?;
        for _ in 0..cfg.max_attempts {
            let agent = self.sample_agent(cfg, map);
            if map.is_collision(agent.xy()) {
                continue;
            }
            if let Some(pose) = self.place_targets(cfg, map, agent) {
                return Ok(pose);
            }
        }
        Err(TrackingError::Configuration(format!(
            "could not place agent and {} target(s) in {} attempts",
            self.num_targets, cfg.max_attempts
        )))
    }

    fn sample_agent<M: ObstacleMap + ?Sized>(&mut self, cfg: &InitPoseConfig, map: &M) -> Pose {
        let s = cfg.agent_spawn_range;
        let (lo, hi) = map.bounds().unwrap_or(([-s, -s], [s, s]));
        let x = self.rng.gen_range(lo[0]..hi[0]);
        let y = self.rng.gen_range(lo[1]..hi[1]);
        let heading = self.uniform_angle(PI);
        Pose::new(x, y, heading)
    }

    fn place_targets<M: ObstacleMap + ?Sized>(
        &mut self,
        cfg: &InitPoseConfig,
        map: &M,
        agent: Pose,
    ) -> Option<InitPose> {
        let target_window = if cfg.target_direction { PI } else { self.fov_half };
        let belief_window = if cfg.belief_direction { PI } else { FRAC_PI_2 };

        let mut targets = Vec::with_capacity(self.num_targets);
        let mut belief_targets = Vec::with_capacity(self.num_targets);
        for _ in 0..self.num_targets {
            let target = (0..TARGET_ATTEMPTS).find_map(|_| {
                let p = self.relative_pose(
                    &agent,
                    cfg.init_distance_min,
                    cfg.init_distance_max,
                    target_window,
                );
                let free = !map.is_collision(p.xy());
                let blocking_ok = cfg
                    .blocked
                    .map_or(true, |b| map.is_blocked(agent.xy(), p.xy()) == b);
                (free && blocking_ok).then_some(p)
            })?;
            let belief = (0..TARGET_ATTEMPTS).find_map(|_| {
                let p = self.relative_pose(
                    &target,
                    cfg.init_belief_distance_min,
                    cfg.init_belief_distance_max,
                    belief_window,
                );
                (!map.is_collision(p.xy())).then_some(p)
            })?;
            targets.push(target);
            belief_targets.push(belief);
        }
        Some(InitPose {
            agent,
            targets,
            belief_targets,
        })
    }

    /// Pose at a random range / bearing from `origin`, facing away from it.
    fn relative_pose(&mut self, origin: &Pose, r_min: f64, r_max: f64, window: f64) -> Pose {
        let r = if r_max > r_min {
            self.rng.gen_range(r_min..=r_max)
        } else {
            r_min
        };
        let bearing = self.uniform_angle(window);
        let xy = from_polar_relative(r, bearing, origin.xy(), origin.heading);
        Pose::new(xy[0], xy[1], wrap_angle(origin.heading + bearing))
    }

    fn uniform_angle(&mut self, half_width: f64) -> f64 {
        self.rng.gen_range(-half_width..=half_width)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::{EmptyMap, GridMap};
    use sensor_models::geometry::{distance, to_polar_relative};
    use serde_json::json;

    #[test]
    fn options_reject_unknown_keys_and_bad_types() {
        let err = ResetOptions::from_json(json!({ "init_distance_mim": 3.0 })).unwrap_err();
        assert!(matches!(err, TrackingError::Configuration(_)));
        let err = ResetOptions::from_pairs([("blocked", json!("yes"))]).unwrap_err();
        assert!(matches!(err, TrackingError::Configuration(_)));

        let ok = ResetOptions::from_pairs([
            ("init_distance_min", json!(2.0)),
            ("init_distance_max", json!(4.0)),
            ("blocked", json!(false)),
        ])
        .unwrap();
        assert_eq!(ok.init_distance_min, Some(2.0));
        assert_eq!(ok.blocked, Some(false));
    }

    #[test]
    fn options_reject_inverted_range() {
        let opts = ResetOptions {
            init_distance_min: Some(8.0),
            init_distance_max: Some(3.0),
            ..Default::default()
        };
        assert!(opts.apply(&InitPoseConfig::default()).is_err());
    }

    #[test]
    fn sampled_targets_respect_distance_and_fov() {
        let cfg = InitPoseConfig::default();
        let fov_half = 60f64.to_radians();
        let mut sampler = InitPoseSampler::new(3, fov_half, 5);
        for _ in 0..20 {
            let pose = sampler.sample(&cfg, &EmptyMap).unwrap();
            assert_eq!(pose.targets.len(), 3);
            assert_eq!(pose.belief_targets.len(), 3);
            for (t, b) in pose.targets.iter().zip(&pose.belief_targets) {
                let (r, bearing) = to_polar_relative(t.xy(), pose.agent.xy(), pose.agent.heading);
                assert!(r >= cfg.init_distance_min - 1e-9 && r <= cfg.init_distance_max + 1e-9);
                assert!(bearing.abs() <= fov_half + 1e-9);
                assert!(distance(t.xy(), b.xy()) <= cfg.init_belief_distance_max + 1e-9);
            }
        }
    }

    #[test]
    fn blocked_option_forces_obstacle_between() {
        let map = GridMap::new([-20.0, -20.0], [20.0, 20.0], 0.5)
            .unwrap()
            .with_rect([-1.0, -1.0], [1.0, 1.0]);
        let mut cfg = InitPoseConfig {
            target_direction: true,
            blocked: Some(true),
            ..Default::default()
        };
        let mut sampler = InitPoseSampler::new(1, 1.0, 9);
        let pose = sampler.sample(&cfg, &map).unwrap();
        assert!(map.is_blocked(pose.agent.xy(), pose.targets[0].xy()));

        cfg.blocked = Some(false);
        let pose = sampler.sample(&cfg, &map).unwrap();
        assert!(!map.is_blocked(pose.agent.xy(), pose.targets[0].xy()));
    }

    #[test]
    fn impossible_blocking_is_configuration_error() {
        let cfg = InitPoseConfig {
            blocked: Some(true),
            max_attempts: 5,
            ..Default::default()
        };
        let mut sampler = InitPoseSampler::new(1, 1.0, 0);
        let err = sampler.sample(&cfg, &EmptyMap).unwrap_err();
        assert!(matches!(err, TrackingError::Configuration(_)));
    }
}
