//! Errors
//!
//! Custom error types used throughout the `conforma` crate.
use thiserror::Error;

/// Errors that can occur while splitting, fitting, or evaluating.
#[derive(Debug, Error)]
pub enum ConformaError {
    /// Bad split configuration or a split that would be empty.
    #[error("Invalid split configuration: {0}")]
    InvalidSplit(String),
    /// Calibration set too small for the requested coverage level.
    #[error("Calibration set of size {n} is too small for the requested coverage, at least {required} observations are needed.")]
    InsufficientCalibrationData { n: usize, required: usize },
    /// Use-before-fit ordering violation.
    #[error("{0} must be fit before predictions can be made.")]
    NotFitted(&'static str),
    /// Fit called twice on the same instance.
    #[error("{0} has already been fit, refitting requires a new instance.")]
    AlreadyFitted(&'static str),
    /// First value is the name of the parameter, second is expected, third is what was passed.
    #[error("Invalid parameter value passed for {0}, expected {1} but {2} provided.")]
    InvalidParameter(String, String, String),
}
