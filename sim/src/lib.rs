//! `sim`: target-tracking environment (agent, targets, sensor, reward, observation).
//!
//! # Module layout
//! - [`config`]      : Environment configuration (JSON, validated)
//! - [`map`]         : Obstacle map predicates
//! - [`agent`]       : Action map, unicycle kinematics, safety veto
//! - [`target`]      : Ground-truth target propagation
//! - [`sensor_sim`]  : Noisy range-bearing measurements
//! - [`backend`]     : Backend capability trait + pure-model backend
//! - [`init_pose`]   : Initial pose records, reset options, sampler
//! - [`pose_set`]    : Fixed evaluation pose sets on disk
//! - [`reward`]      : Training / evaluation rewards
//! - [`observation`] : Observation vector assembly
//! - [`env`]         : The step / reset environment

pub mod agent;
pub mod backend;
pub mod config;
pub mod env;
pub mod init_pose;
pub mod map;
pub mod observation;
pub mod pose_set;
pub mod reward;
pub mod sensor_sim;
pub mod target;

pub use agent::{ActionMap, AgentMotion, MotionOutcome};
pub use backend::{ModelBackend, TrackingBackend};
pub use config::{load_config, EnvConfig};
pub use env::{StepOutput, TargetTrackingEnv};
pub use init_pose::{InitPose, InitPoseSampler, ResetOptions};
pub use map::{EmptyMap, GridMap, ObstacleMap};
pub use pose_set::{load_pose_set, save_pose_set, PoseSet};
