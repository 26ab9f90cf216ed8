//! The target-tracking environment.
//!
//! # Step pipeline
//! 1. Agent motion: decode the action, veto unsafe moves
//! 2. Backend applies the vetted control
//! 3. Ground-truth targets advance one sampling period
//! 4. Sensor measures every target from the new pose
//! 5. Belief estimator predicts and corrects
//! 6. Nearest obstacle lookup
//! 7. Reward (and the evaluation reward outside training)
//! 8. Observation assembly
//!
//! `done` is always false; episode length is the caller's business.

use crate::agent::AgentMotion;
use crate::backend::{ModelBackend, TrackingBackend};
use crate::config::EnvConfig;
use crate::init_pose::{InitPose, InitPoseSampler, ResetOptions};
use crate::map::{EmptyMap, ObstacleMap};
use crate::observation::{compose_observation, initial_observation, observation_len};
use crate::reward::{obstacle_penalty, test_reward, training_reward};
use tracker_core::kf::IntegratorKfConfig;
use tracker_core::types::{position, state_from_parts};
use tracker_core::{BeliefEstimator, EstimatorConfig, Result, StateVec, TrackingError};

/// Everything one `step` returns.
#[derive(Clone, Debug, PartialEq)]
pub struct StepOutput {
    pub observation: Vec<f64>,
    pub reward: f64,
    pub done: bool,
    /// `-mean(ln det Σ)`, only outside training
    pub test_reward: Option<f64>,
    /// Action index actually applied after the safety veto
    pub actual_action: usize,
    pub vetoed: bool,
    /// Per-target valid-measurement flags
    pub observed: Vec<bool>,
}

/// Single-agent, multi-target tracking environment.
pub struct TargetTrackingEnv<B = ModelBackend, M = EmptyMap> {
    config: EnvConfig,
    backend: B,
    map: M,
    motion: AgentMotion,
    estimator: BeliefEstimator,
    sampler: InitPoseSampler,
    pose_set: Vec<InitPose>,
    pose_cursor: usize,
    initialized: bool,
}

impl TargetTrackingEnv<ModelBackend, EmptyMap> {
    /// Pure-model environment on an obstacle-free plane.
    pub fn new(config: EnvConfig) -> Result<Self> {
        Self::with_map(config, EmptyMap)
    }
}

impl<M: ObstacleMap> TargetTrackingEnv<ModelBackend, M> {
    /// Pure-model environment on `map`.
    pub fn with_map(config: EnvConfig, map: M) -> Result<Self> {
        config.validate()?;
        let backend = ModelBackend::new(&config)?;
        Self::with_backend(config, backend, map)
    }
}

impl<B: TrackingBackend, M: ObstacleMap> TargetTrackingEnv<B, M> {
    /// Environment over any backend honoring the [`TrackingBackend`] contract.
    pub fn with_backend(config: EnvConfig, backend: B, map: M) -> Result<Self> {
        config.validate()?;
        let motion = AgentMotion::new(&config.agent)?;
        let estimator = BeliefEstimator::new(EstimatorConfig {
            sampling_period: config.agent.sampling_period,
            kf_config: IntegratorKfConfig {
                process_noise: config.target.q_belief,
            },
            range_noise_std: config.sensor.range_noise_std,
            bearing_noise_std: config.sensor.bearing_noise_std,
        });
        let sampler = InitPoseSampler::new(config.num_targets, config.sensor.fov_half(), config.seed);
        Ok(Self {
            config,
            backend,
            map,
            motion,
            estimator,
            sampler,
            pose_set: Vec::new(),
            pose_cursor: 0,
            initialized: false,
        })
    }

    pub fn config(&self) -> &EnvConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn map(&self) -> &M {
        &self.map
    }

    pub fn estimator(&self) -> &BeliefEstimator {
        &self.estimator
    }

    pub fn motion(&self) -> &AgentMotion {
        &self.motion
    }

    pub fn num_actions(&self) -> usize {
        self.motion.action_map.len()
    }

    pub fn observation_len(&self) -> usize {
        observation_len(self.config.num_targets)
    }

    /// Replay `poses` in order (wrapping around) on every subsequent reset
    /// instead of sampling. An empty list restores sampling.
    pub fn set_pose_set(&mut self, poses: Vec<InitPose>) -> Result<()> {
        for (i, p) in poses.iter().enumerate() {
            self.check_init_pose(p)
                .map_err(|e| TrackingError::Configuration(format!("pose set record {i}: {e}")))?;
        }
        self.pose_set = poses;
        self.pose_cursor = 0;
        Ok(())
    }

    /// Start a new episode from the next pose-set record, or from a freshly
    /// sampled pose honoring `options`.
    pub fn reset(&mut self, options: &ResetOptions) -> Result<Vec<f64>> {
        let init_cfg = options.apply(&self.config.init)?;
        let init = if self.pose_set.is_empty() {
            self.sampler.sample(&init_cfg, &self.map)?
        } else {
            let record = self.pose_set[self.pose_cursor % self.pose_set.len()].clone();
            self.pose_cursor = (self.pose_cursor + 1) % self.pose_set.len();
            record
        };
        self.reset_with_pose(&init)
    }

    /// Start a new episode from an explicit initial pose record.
    pub fn reset_with_pose(&mut self, init: &InitPose) -> Result<Vec<f64>> {
        self.check_init_pose(init)?;
        self.backend.reset(init)?;
        self.check_target_count(self.backend.target_states().len(), "target states")?;

        let belief_means: Vec<StateVec> = init
            .belief_targets
            .iter()
            .map(|b| state_from_parts(b.xy(), [0.0, 0.0]))
            .collect();
        self.estimator.reset(&belief_means, self.config.target.init_cov);
        self.initialized = true;

        let agent = self.backend.agent_pose();
        tracing::info!(
            x = agent.x,
            y = agent.y,
            heading = agent.heading,
            targets = init.targets.len(),
            "episode reset"
        );
        let belief_xy: Vec<[f64; 2]> = init.belief_targets.iter().map(|b| b.xy()).collect();
        initial_observation(
            &agent,
            &belief_xy,
            self.config.target.init_cov,
            self.config.sensor.max_range,
        )
    }

    /// Advance one step with the discrete action `action`.
    ///
    /// Range and bearing rates in the observation use the requested control,
    /// even when the move was vetoed.
    ///
    /// Any error leaves the backend and the beliefs out of step; the episode
    /// is then closed and `reset` must be called before stepping again.
    pub fn step(&mut self, action: usize) -> Result<StepOutput> {
        if !self.initialized {
            return Err(TrackingError::Configuration("step called before reset".into()));
        }
        let out = self.advance(action);
        if let Err(e) = &out {
            tracing::warn!(action, error = %e, "step failed, episode closed");
            self.initialized = false;
        }
        out
    }

    fn advance(&mut self, action: usize) -> Result<StepOutput> {

        let truths = self.backend.target_states();
        self.check_target_count(truths.len(), "target states")?;
        let target_xy: Vec<[f64; 2]> = truths.iter().map(position).collect();
        let pose = self.backend.agent_pose();
        let outcome = self.motion.step(&pose, action, &target_xy, &self.map)?;

        let pose = self.backend.apply_control(outcome.control);
        self.backend.forward_simulate(1);
        let measurements = self.backend.sense_multiple(&pose);
        self.check_target_count(measurements.len(), "measurements")?;

        let est = self.estimator.predict_and_update(&pose, &measurements)?;
        let covs = self.estimator.covariances();
        let beliefs = self.estimator.target_states();

        let obstacle = self.map.closest_obstacle(&pose, self.config.sensor.max_range);
        let penalty = obstacle_penalty(obstacle.map(|(d, _)| d), self.config.reward.margin2wall);
        let reward = training_reward(&covs, &est.observed, penalty);
        let test = (!self.config.is_training).then(|| test_reward(&covs));

        let observation = compose_observation(
            &pose,
            outcome.requested,
            &beliefs,
            &covs,
            &est.observed,
            obstacle,
            self.config.sensor.max_range,
        )?;

        tracing::debug!(
            action,
            actual = outcome.action,
            reward,
            observed = est.observed.iter().filter(|o| **o).count(),
            regularized = est.regularized,
            "step"
        );

        Ok(StepOutput {
            observation,
            reward,
            done: false,
            test_reward: test,
            actual_action: outcome.action,
            vetoed: outcome.vetoed,
            observed: est.observed,
        })
    }

    fn check_init_pose(&self, init: &InitPose) -> Result<()> {
        let n = self.config.num_targets;
        if init.targets.len() != n || init.belief_targets.len() != n {
            return Err(TrackingError::Configuration(format!(
                "initial pose has {} targets and {} beliefs, environment expects {n}",
                init.targets.len(),
                init.belief_targets.len()
            )));
        }
        Ok(())
    }

    fn check_target_count(&self, got: usize, what: &str) -> Result<()> {
        if got != self.config.num_targets {
            return Err(TrackingError::BackendContractViolation(format!(
                "backend returned {got} {what} for {} targets",
                self.config.num_targets
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracker_core::Pose;

    #[test]
    fn step_before_reset_is_rejected() {
        let mut env = TargetTrackingEnv::new(EnvConfig::default()).unwrap();
        assert!(matches!(env.step(0), Err(TrackingError::Configuration(_))));
    }

    #[test]
    fn reset_rejects_wrong_target_count() {
        let mut env = TargetTrackingEnv::new(EnvConfig::default()).unwrap();
        let init = InitPose {
            agent: Pose::default(),
            targets: vec![Pose::new(5.0, 0.0, 0.0); 2],
            belief_targets: vec![Pose::new(5.0, 0.0, 0.0); 2],
        };
        assert!(matches!(
            env.reset_with_pose(&init),
            Err(TrackingError::Configuration(_))
        ));
    }

    #[test]
    fn sampled_episode_runs() {
        let mut cfg = EnvConfig::default();
        cfg.num_targets = 2;
        let mut env = TargetTrackingEnv::new(cfg).unwrap();
        let obs = env.reset(&ResetOptions::default()).unwrap();
        assert_eq!(obs.len(), env.observation_len());
        for k in 0..20 {
            let out = env.step(k % env.num_actions()).unwrap();
            assert_eq!(out.observation.len(), 14);
            assert!(!out.done);
            assert!(out.test_reward.is_none());
            assert!(out.reward.is_finite());
        }
    }
}
