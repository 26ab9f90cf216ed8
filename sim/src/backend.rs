//! Simulation backend: agent pose, ground-truth targets and the sensor.
//!
//! The environment talks to the backend only through [`TrackingBackend`].
//! [`ModelBackend`] is the in-process implementation; an adapter to an
//! external planner / sensor library can be dropped in by implementing the
//! same trait.

use crate::agent::integrate_unicycle;
use crate::config::EnvConfig;
use crate::init_pose::InitPose;
use crate::sensor_sim::RangeBearingSensor;
use crate::target::TargetModel;
use tracker_core::types::state_from_parts;
use tracker_core::{Control, Pose, RangeBearing, Result, StateVec};

/// Capabilities the environment needs from a simulator.
pub trait TrackingBackend {
    /// Place the agent and targets from an initial pose record.
    fn reset(&mut self, init: &InitPose) -> Result<()>;

    /// Apply an already-vetted control for one step, returning the new pose.
    fn apply_control(&mut self, control: Control) -> Pose;

    fn agent_pose(&self) -> Pose;

    /// Advance the ground-truth targets by `steps` sampling periods.
    fn forward_simulate(&mut self, steps: usize);

    /// Ground-truth target states, in target order.
    fn target_states(&self) -> Vec<StateVec>;

    /// One measurement per target taken from `pose`, in target order.
    fn sense_multiple(&mut self, pose: &Pose) -> Vec<RangeBearing>;
}

/// Pure-model backend: unicycle agent, integrator targets, Gaussian sensor.
#[derive(Clone, Debug)]
pub struct ModelBackend {
    pose: Pose,
    sampling_period: f64,
    init_vel: f64,
    targets: TargetModel,
    sensor: RangeBearingSensor,
}

impl ModelBackend {
    /// Target noise and sensor noise use seeds derived from `config.seed`.
    pub fn new(config: &EnvConfig) -> Result<Self> {
        let dt = config.agent.sampling_period;
        Ok(Self {
            pose: Pose::default(),
            sampling_period: dt,
            init_vel: config.target.init_vel,
            targets: TargetModel::new(
                dt,
                config.target.q_true,
                config.target.vel_limit,
                config.seed.wrapping_add(1),
            ),
            sensor: RangeBearingSensor::new(config.sensor.clone(), config.seed.wrapping_add(2))?,
        })
    }
}

impl TrackingBackend for ModelBackend {
    fn reset(&mut self, init: &InitPose) -> Result<()> {
        self.pose = init.agent;
        let v = self.init_vel;
        let states = init
            .targets
            .iter()
            .map(|t| state_from_parts(t.xy(), [v * t.heading.cos(), v * t.heading.sin()]))
            .collect();
        self.targets.reset(states);
        Ok(())
    }

    fn apply_control(&mut self, control: Control) -> Pose {
        self.pose = integrate_unicycle(&self.pose, control, self.sampling_period);
        self.pose
    }

    fn agent_pose(&self) -> Pose {
        self.pose
    }

    fn forward_simulate(&mut self, steps: usize) {
        for _ in 0..steps {
            self.targets.advance();
        }
    }

    fn target_states(&self) -> Vec<StateVec> {
        self.targets.states().to_vec()
    }

    fn sense_multiple(&mut self, pose: &Pose) -> Vec<RangeBearing> {
        self.sensor.sense(pose, self.targets.states())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::f64::consts::FRAC_PI_2;

    fn init() -> InitPose {
        InitPose {
            agent: Pose::new(1.0, 2.0, 0.0),
            targets: vec![Pose::new(6.0, 2.0, FRAC_PI_2)],
            belief_targets: vec![Pose::new(7.0, 2.0, 0.0)],
        }
    }

    #[test]
    fn reset_gives_targets_their_initial_velocity() {
        let mut cfg = EnvConfig::default();
        cfg.target.init_vel = 1.0;
        let mut backend = ModelBackend::new(&cfg).unwrap();
        backend.reset(&init()).unwrap();
        let s = backend.target_states()[0];
        assert_abs_diff_eq!(s[2], 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(s[3], 1.0, epsilon = 1e-12);
        assert_eq!(backend.agent_pose(), Pose::new(1.0, 2.0, 0.0));
    }

    #[test]
    fn control_and_sensing_follow_the_agent() {
        let mut cfg = EnvConfig::default();
        cfg.target.q_true = 0.0;
        cfg.sensor.range_noise_std = 0.0;
        cfg.sensor.bearing_noise_std = 0.0;
        let mut backend = ModelBackend::new(&cfg).unwrap();
        backend.reset(&init()).unwrap();

        let pose = backend.apply_control(Control::new(2.0, 0.0));
        assert_abs_diff_eq!(pose.x, 2.0, epsilon = 1e-12);
        backend.forward_simulate(3);
        let m = backend.sense_multiple(&pose);
        assert_eq!(m.len(), 1);
        assert!(m[0].valid);
        assert_abs_diff_eq!(m[0].range, 4.0, epsilon = 1e-12);
    }
}
