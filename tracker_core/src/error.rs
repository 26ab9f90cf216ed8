//! Error taxonomy shared by the estimator and the environment.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TrackingError {
    /// Unknown or out-of-range configuration / reset option.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Covariance inversion failed or produced a non-finite value.
    #[error("numerical instability: {0}")]
    NumericalInstability(String),

    /// A backend or belief handle returned data of the wrong shape.
    #[error("backend contract violation: {0}")]
    BackendContractViolation(String),
}

pub type Result<T> = std::result::Result<T, TrackingError>;
