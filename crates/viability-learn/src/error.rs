//! Error types for viability-learn.

use thiserror::Error;
use viability_grid::GridError;
use viability_solver::SolverError;

/// Errors that can occur while fitting surrogates or running the
/// active sampler.
///
/// Per-step dynamics failures are data, not errors: the sampler records
/// them and continues. Only structural problems surface here.
#[derive(Debug, Error)]
pub enum LearnError {
    /// Sampler or surrogate configuration is invalid.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Seed data cannot initialize the learner.
    #[error("invalid seed data: {0}")]
    InvalidSeed(String),

    /// Surrogate fitting failed.
    #[error("model fit failed: {0}")]
    ModelFit(String),

    /// Prediction was requested before the surrogate was fitted.
    #[error("surrogate has not been fitted")]
    NotFitted,

    /// Input dimensionality does not match the surrogate or grid.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Expected dimensionality.
        expected: usize,
        /// Received dimensionality.
        actual: usize,
    },

    /// Underlying grid error.
    #[error(transparent)]
    Grid(#[from] GridError),

    /// Underlying solver error.
    #[error(transparent)]
    Solver(#[from] SolverError),

    /// Checkpoint file could not be read or written.
    #[error("checkpoint I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// Checkpoint could not be serialized or deserialized.
    #[error("checkpoint serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

impl LearnError {
    /// Creates a [`LearnError::Config`] from a message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a [`LearnError::InvalidSeed`] from a message.
    pub fn invalid_seed(msg: impl Into<String>) -> Self {
        Self::InvalidSeed(msg.into())
    }

    /// Creates a [`LearnError::ModelFit`] from a message.
    pub fn model_fit(msg: impl Into<String>) -> Self {
        Self::ModelFit(msg.into())
    }
}

/// Result type for learning operations.
pub type Result<T> = std::result::Result<T, LearnError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        assert_eq!(
            LearnError::config("empty schedule").to_string(),
            "invalid configuration: empty schedule"
        );
        assert_eq!(
            LearnError::NotFitted.to_string(),
            "surrogate has not been fitted"
        );
    }

    #[test]
    fn error_from_grid_error() {
        let err: LearnError = GridError::EmptyAxis(0).into();
        assert!(matches!(err, LearnError::Grid(_)));
    }
}
