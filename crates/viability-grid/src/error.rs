//! Error types for viability-grid.

use thiserror::Error;

/// Errors that can occur when constructing or querying grids.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GridError {
    /// An axis was constructed with no coordinates.
    #[error("axis {0} is empty")]
    EmptyAxis(usize),

    /// An axis coordinate is NaN or infinite.
    #[error("axis {axis} has a non-finite coordinate at index {index}")]
    NonFiniteCoordinate {
        /// Axis position within the grid.
        axis: usize,
        /// Offending coordinate index.
        index: usize,
    },

    /// Axis coordinates are not strictly increasing.
    #[error("axis {axis} is not strictly increasing at index {index}")]
    NonMonotonicAxis {
        /// Axis position within the grid.
        axis: usize,
        /// Index of the first coordinate that does not increase.
        index: usize,
    },

    /// A value fell outside the axis range in strict digitization mode.
    #[error("value {value} is outside axis {axis} range [{min}, {max}]")]
    OutOfRange {
        /// Axis position within the grid.
        axis: usize,
        /// The out-of-range value.
        value: f64,
        /// Axis minimum.
        min: f64,
        /// Axis maximum.
        max: f64,
    },

    /// A vector or index tuple had the wrong number of dimensions.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Expected dimensionality.
        expected: usize,
        /// Provided dimensionality.
        actual: usize,
    },

    /// Data length does not match the product of the shape.
    #[error("shape {shape:?} requires {expected} elements, got {actual}")]
    ShapeMismatch {
        /// Requested array shape.
        shape: Vec<usize>,
        /// Number of elements the shape requires.
        expected: usize,
        /// Number of elements provided.
        actual: usize,
    },
}

/// Result type for grid operations.
pub type Result<T> = std::result::Result<T, GridError>;
