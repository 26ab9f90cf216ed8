//! Environment configuration.
//!
//! Every section has a `Default` carrying the standard tracking setup; JSON
//! files may specify any subset of fields. Unknown keys are rejected.

use anyhow::Context;
use sensor_models::RangeBearingParams;
use serde::{Deserialize, Serialize};
use std::f64::consts::FRAC_PI_2;
use std::path::Path;
use tracker_core::{Result, TrackingError};

/// Agent kinematics and discrete action grid.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AgentConfig {
    /// Duration of one step (seconds)
    pub sampling_period: f64,
    /// Minimum allowed distance between the agent and any target (meters)
    pub margin: f64,
    /// Linear velocity choices (m/s)
    pub action_v: Vec<f64>,
    /// Angular velocity choices (rad/s)
    pub action_w: Vec<f64>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            sampling_period: 0.5,
            margin: 1.0,
            action_v: vec![2.0, 1.33, 0.67, 0.0],
            action_w: vec![FRAC_PI_2, 0.0, -FRAC_PI_2],
        }
    }
}

/// Ground-truth target dynamics and the belief prior.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TargetConfig {
    /// Initial diagonal belief covariance
    pub init_cov: f64,
    /// Initial target speed along its spawn heading (m/s)
    pub init_vel: f64,
    /// Per-axis velocity limit of the true targets (m/s)
    pub vel_limit: f64,
    /// Process noise intensity of the true targets
    pub q_true: f64,
    /// Process noise intensity assumed by the belief filter
    pub q_belief: f64,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            init_cov: 30.0,
            init_vel: 0.0,
            vel_limit: 2.0,
            q_true: 0.01,
            q_belief: 0.01,
        }
    }
}

/// Rules for sampling initial poses at reset.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InitPoseConfig {
    /// Agent–target separation bounds (meters)
    pub init_distance_min: f64,
    pub init_distance_max: f64,
    /// Target–belief separation bounds (meters)
    pub init_belief_distance_min: f64,
    pub init_belief_distance_max: f64,
    /// Targets may spawn in any direction (otherwise inside the sensor FOV)
    pub target_direction: bool,
    /// Belief priors may sit in any direction from the target (otherwise ahead of it)
    pub belief_direction: bool,
    /// If set, the agent–target segment must (true) / must not (false) cross an obstacle
    pub blocked: Option<bool>,
    /// Half-width of the agent spawn box when the map is unbounded (meters)
    pub agent_spawn_range: f64,
    /// Sampling attempts before giving up
    pub max_attempts: usize,
}

impl Default for InitPoseConfig {
    fn default() -> Self {
        Self {
            init_distance_min: 5.0,
            init_distance_max: 10.0,
            init_belief_distance_min: 0.0,
            init_belief_distance_max: 5.0,
            target_direction: false,
            belief_direction: false,
            blocked: None,
            agent_spawn_range: 20.0,
            max_attempts: 1000,
        }
    }
}

impl InitPoseConfig {
    pub fn validate(&self) -> Result<()> {
        check_range("init_distance", self.init_distance_min, self.init_distance_max)?;
        check_range(
            "init_belief_distance",
            self.init_belief_distance_min,
            self.init_belief_distance_max,
        )?;
        if !(self.agent_spawn_range.is_finite() && self.agent_spawn_range > 0.0) {
            return Err(config_err("agent_spawn_range must be positive"));
        }
        if self.max_attempts == 0 {
            return Err(config_err("max_attempts must be at least 1"));
        }
        Ok(())
    }
}

/// Reward shaping constants.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RewardConfig {
    /// Distance to obstacles below which the penalty saturates (meters)
    pub margin2wall: f64,
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self { margin2wall: 0.5 }
    }
}

/// Full environment configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EnvConfig {
    /// Seed for every random stream of the episode
    pub seed: u64,
    pub num_targets: usize,
    /// Training mode (no `test_reward` diagnostic)
    pub is_training: bool,
    pub agent: AgentConfig,
    pub target: TargetConfig,
    pub sensor: RangeBearingParams,
    pub init: InitPoseConfig,
    pub reward: RewardConfig,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            num_targets: 1,
            is_training: true,
            agent: AgentConfig::default(),
            target: TargetConfig::default(),
            sensor: RangeBearingParams::default(),
            init: InitPoseConfig::default(),
            reward: RewardConfig::default(),
        }
    }
}

impl EnvConfig {
    /// Reject configurations the environment cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.num_targets == 0 {
            return Err(config_err("num_targets must be at least 1"));
        }
        positive("agent.sampling_period", self.agent.sampling_period)?;
        non_negative("agent.margin", self.agent.margin)?;
        if self.agent.action_v.is_empty() || self.agent.action_w.is_empty() {
            return Err(config_err("action grids must not be empty"));
        }
        positive("target.init_cov", self.target.init_cov)?;
        non_negative("target.init_vel", self.target.init_vel)?;
        positive("target.vel_limit", self.target.vel_limit)?;
        non_negative("target.q_true", self.target.q_true)?;
        non_negative("target.q_belief", self.target.q_belief)?;
        positive("sensor.max_range", self.sensor.max_range)?;
        if !(self.sensor.fov_deg > 0.0 && self.sensor.fov_deg <= 360.0) {
            return Err(config_err("sensor.fov_deg must be in (0, 360]"));
        }
        non_negative("sensor.range_noise_std", self.sensor.range_noise_std)?;
        non_negative("sensor.bearing_noise_std", self.sensor.bearing_noise_std)?;
        positive("reward.margin2wall", self.reward.margin2wall)?;
        self.init.validate()
    }
}

/// Load and validate a JSON configuration file.
pub fn load_config(path: &Path) -> anyhow::Result<EnvConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    let config: EnvConfig = serde_json::from_str(&text)
        .with_context(|| format!("parsing config {}", path.display()))?;
    config.validate()?;
    Ok(config)
}

fn config_err(msg: impl Into<String>) -> TrackingError {
    TrackingError::Configuration(msg.into())
}

fn positive(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(config_err(format!("{name} must be positive, got {value}")))
    }
}

fn non_negative(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(config_err(format!("{name} must be non-negative, got {value}")))
    }
}

pub(crate) fn check_range(name: &str, min: f64, max: f64) -> Result<()> {
    non_negative(&format!("{name}_min"), min)?;
    non_negative(&format!("{name}_max"), max)?;
    if min > max {
        return Err(config_err(format!("{name}_min ({min}) exceeds {name}_max ({max})")));
    }
    Ok(())
}
