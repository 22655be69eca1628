//! Annealing schedules for sampler thresholds.

use serde::{Deserialize, Serialize};

use crate::error::{LearnError, Result};

/// A linearly annealed threshold: `start` at the first sample, `end` at
/// the last.
///
/// Loose early thresholds let the sampler roam; tight late thresholds
/// squeeze the estimate against the safety boundary.
///
/// # Example
///
/// ```
/// use viability_learn::ThresholdSchedule;
///
/// let s = ThresholdSchedule::new(0.8, 1.0);
/// assert!((s.value_at(0, 5) - 0.8).abs() < 1e-12);
/// assert!((s.value_at(2, 5) - 0.9).abs() < 1e-12);
/// assert!((s.value_at(4, 5) - 1.0).abs() < 1e-12);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdSchedule {
    /// Value at the first sample.
    pub start: f64,
    /// Value at the last sample.
    pub end: f64,
}

impl ThresholdSchedule {
    /// Creates a schedule annealing from `start` to `end`.
    #[must_use]
    pub const fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    /// Creates a schedule that holds a constant value.
    #[must_use]
    pub const fn constant(value: f64) -> Self {
        Self {
            start: value,
            end: value,
        }
    }

    /// Threshold for sample `iteration` out of `total`.
    ///
    /// A single-sample (or empty) run gets `start`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn value_at(&self, iteration: usize, total: usize) -> f64 {
        if total <= 1 {
            return self.start;
        }
        let t = (iteration.min(total - 1)) as f64 / (total - 1) as f64;
        (self.end - self.start).mul_add(t, self.start)
    }

    /// Checks that both endpoints are finite.
    ///
    /// # Errors
    ///
    /// Returns [`LearnError::Config`] otherwise.
    pub fn validate(&self, name: &str) -> Result<()> {
        if !self.start.is_finite() || !self.end.is_finite() {
            return Err(LearnError::config(format!(
                "{name} schedule has non-finite endpoints ({} -> {})",
                self.start, self.end
            )));
        }
        Ok(())
    }
}

/// The three thresholds resolved for one sampler iteration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    /// Confidence level gating which actions count as safe to try.
    pub exploration_confidence: f64,
    /// Confidence level for the reported kernel estimate.
    pub measure_confidence: f64,
    /// Minimum lower-bound measure for an action to count as safe.
    pub safety_threshold: f64,
}
