//! A single validated grid axis.

use serde::{Deserialize, Serialize};

use crate::error::{GridError, Result};

/// One discretized coordinate axis of a state or action space.
///
/// Coordinates are strictly increasing, finite, and non-empty. This is
/// validated at construction and holds for the lifetime of the axis.
///
/// # Example
///
/// ```
/// use viability_grid::Axis;
///
/// let axis = Axis::linspace(0.0, 1.0, 5);
/// assert_eq!(axis.len(), 5);
/// assert_eq!(axis.value(2), 0.5);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Axis {
    coords: Vec<f64>,
}

impl Axis {
    /// Creates an axis from explicit coordinates.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::EmptyAxis`] for empty input,
    /// [`GridError::NonFiniteCoordinate`] for NaN or infinite entries, and
    /// [`GridError::NonMonotonicAxis`] when coordinates do not strictly
    /// increase. The `axis` field in these errors is 0, since a lone axis
    /// has no position within a grid yet.
    pub fn new(coords: Vec<f64>) -> Result<Self> {
        Self::validated(coords, 0)
    }

    pub(crate) fn validated(coords: Vec<f64>, axis: usize) -> Result<Self> {
        if coords.is_empty() {
            return Err(GridError::EmptyAxis(axis));
        }
        for (index, &c) in coords.iter().enumerate() {
            if !c.is_finite() {
                return Err(GridError::NonFiniteCoordinate { axis, index });
            }
        }
        for index in 1..coords.len() {
            if coords[index] <= coords[index - 1] {
                return Err(GridError::NonMonotonicAxis { axis, index });
            }
        }
        Ok(Self { coords })
    }

    /// Creates an axis of `n` evenly spaced coordinates over `[start, end]`.
    ///
    /// With `n == 1` the single coordinate is `start`.
    ///
    /// # Panics
    ///
    /// Panics if `n == 0` or `start >= end` (with `n > 1`); these are
    /// programming errors, not data errors.
    ///
    /// # Example
    ///
    /// ```
    /// use viability_grid::Axis;
    ///
    /// let axis = Axis::linspace(0.1, 0.9, 9);
    /// assert_eq!(axis.min(), 0.1);
    /// assert_eq!(axis.max(), 0.9);
    /// ```
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn linspace(start: f64, end: f64, n: usize) -> Self {
        assert!(n > 0, "linspace needs at least one point");
        if n == 1 {
            return Self {
                coords: vec![start],
            };
        }
        assert!(start < end, "linspace needs start < end");
        let step = (end - start) / (n - 1) as f64;
        let coords = (0..n)
            .map(|i| {
                if i == n - 1 {
                    end
                } else {
                    (i as f64).mul_add(step, start)
                }
            })
            .collect();
        Self { coords }
    }

    /// Number of grid points on this axis.
    #[must_use]
    pub fn len(&self) -> usize {
        self.coords.len()
    }

    /// Returns `true` if the axis has exactly one point.
    ///
    /// Axes are never empty, so this is the degenerate case.
    #[must_use]
    pub fn is_singleton(&self) -> bool {
        self.coords.len() == 1
    }

    /// Smallest coordinate.
    #[must_use]
    pub fn min(&self) -> f64 {
        self.coords[0]
    }

    /// Largest coordinate.
    #[must_use]
    pub fn max(&self) -> f64 {
        self.coords[self.coords.len() - 1]
    }

    /// Coordinate at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= len()`.
    #[must_use]
    pub fn value(&self, index: usize) -> f64 {
        self.coords[index]
    }

    /// All coordinates, in increasing order.
    #[must_use]
    pub fn coords(&self) -> &[f64] {
        &self.coords
    }

    /// Maps a continuous value to the index of the nearest grid point.
    ///
    /// Policy: nearest coordinate wins; an exact midpoint resolves to the
    /// lower index; values outside the range clamp to the first or last
    /// index. Deterministic, never fails.
    ///
    /// # Example
    ///
    /// ```
    /// use viability_grid::Axis;
    ///
    /// let axis = Axis::linspace(0.0, 1.0, 5); // 0, 0.25, 0.5, 0.75, 1
    /// assert_eq!(axis.digitize(0.3), 1);
    /// assert_eq!(axis.digitize(0.375), 1); // midpoint goes low
    /// assert_eq!(axis.digitize(-4.0), 0);
    /// assert_eq!(axis.digitize(7.0), 4);
    /// ```
    #[must_use]
    pub fn digitize(&self, value: f64) -> usize {
        // NaN clamps low; the caller records such states as failures anyway.
        if value.is_nan() || value <= self.min() {
            return 0;
        }
        if value >= self.max() {
            return self.coords.len() - 1;
        }
        // First coordinate strictly greater than value.
        let upper = self.coords.partition_point(|&c| c <= value);
        let lower = upper - 1;
        let d_lower = value - self.coords[lower];
        let d_upper = self.coords[upper] - value;
        if d_upper < d_lower {
            upper
        } else {
            lower
        }
    }

    /// Strict digitization: like [`Axis::digitize`], but values outside the
    /// axis range are an error instead of clamping.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::OutOfRange`] if `value` is not inside
    /// `[min(), max()]` (the `axis` field is 0; [`crate::Grid`] fills it in).
    pub fn digitize_strict(&self, value: f64) -> Result<usize> {
        if !value.is_finite() || value < self.min() || value > self.max() {
            return Err(GridError::OutOfRange {
                axis: 0,
                value,
                min: self.min(),
                max: self.max(),
            });
        }
        Ok(self.digitize(value))
    }
}
