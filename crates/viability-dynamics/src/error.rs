//! Error types for viability-dynamics.

use thiserror::Error;

/// Errors a dynamics collaborator can report.
///
/// Per-evaluation errors are always recoverable from the caller's point of
/// view: the solver and the sampler record them as failed transitions and
/// keep going, since grids deliberately visit infeasible configurations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DynamicsError {
    /// Numerical integration did not complete.
    #[error("integration failure: {0}")]
    Integration(String),

    /// The requested configuration is physically infeasible.
    #[error("infeasible configuration: {0}")]
    Infeasible(String),

    /// Parameter record failed validation.
    #[error("invalid parameters: {0}")]
    InvalidParams(String),

    /// State or action vector has the wrong dimensionality.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Expected dimensionality.
        expected: usize,
        /// Provided dimensionality.
        actual: usize,
    },
}

impl DynamicsError {
    /// Creates an integration error.
    #[must_use]
    pub fn integration(reason: impl Into<String>) -> Self {
        Self::Integration(reason.into())
    }

    /// Creates an infeasible-configuration error.
    #[must_use]
    pub fn infeasible(reason: impl Into<String>) -> Self {
        Self::Infeasible(reason.into())
    }

    /// Creates an invalid-parameters error.
    #[must_use]
    pub fn invalid_params(reason: impl Into<String>) -> Self {
        Self::InvalidParams(reason.into())
    }
}

/// Result type for dynamics operations.
pub type Result<T> = std::result::Result<T, DynamicsError>;
