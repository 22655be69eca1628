//! Error types for viability-solver.

use thiserror::Error;
use viability_grid::GridError;

/// Errors that can occur while building Q-maps or solving for the kernel.
///
/// Per-cell dynamics failures are never errors; they are recorded in the
/// failure map. Only structural problems (mismatched dimensionality,
/// malformed grids) surface here.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SolverError {
    /// Model dimensionality does not match the grid.
    #[error("model/grid dimension mismatch for {space}: grid has {grid}, model expects {model}")]
    DimensionMismatch {
        /// Which space disagrees ("state" or "action").
        space: &'static str,
        /// Grid dimensionality.
        grid: usize,
        /// Model dimensionality.
        model: usize,
    },

    /// Array shapes disagree between inputs.
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    /// Underlying grid error.
    #[error(transparent)]
    Grid(#[from] GridError),
}

/// Result type for solver operations.
pub type Result<T> = std::result::Result<T, SolverError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_dimension_mismatch() {
        let err = SolverError::DimensionMismatch {
            space: "state",
            grid: 1,
            model: 2,
        };
        let text = err.to_string();
        assert!(text.contains("state"));
        assert!(text.contains("grid has 1"));
    }

    #[test]
    fn error_from_grid_error() {
        let err: SolverError = GridError::EmptyAxis(0).into();
        assert!(matches!(err, SolverError::Grid(_)));
    }
}
