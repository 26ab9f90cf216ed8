//! `tracker_core`: Belief tracking core for range-bearing target tracking.
//!
//! # Module layout
//! - [`types`]     : Fundamental types (poses, controls, state vectors, measurements)
//! - [`error`]     : Error taxonomy
//! - [`kf`]        : Integrator Kalman filter (predict)
//! - [`ekf`]       : Range-bearing EKF correction
//! - [`belief`]    : Per-target Gaussian belief
//! - [`estimator`] : Multi-target predict + correct orchestrator
//! - [`metrics`]   : Covariance uncertainty measures, episode statistics

pub mod belief;
pub mod ekf;
pub mod error;
pub mod estimator;
pub mod kf;
pub mod metrics;
pub mod types;

pub use belief::TargetBelief;
pub use error::{Result, TrackingError};
pub use estimator::{BeliefEstimator, EstimatorConfig, EstimatorOutput};
pub use types::{Control, Pose, RangeBearing, StateCov, StateVec};
