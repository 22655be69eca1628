//! Surrogate model contract for measure regression.

use crate::error::Result;

/// A predictive mean and its standard deviation at one query point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    /// Predictive mean.
    pub mean: f64,
    /// Predictive standard deviation (uncertainty).
    pub std: f64,
}

impl Prediction {
    /// Lower confidence bound `mean - z * std`.
    #[must_use]
    pub fn lower_bound(&self, z: f64) -> f64 {
        z.mul_add(-self.std, self.mean)
    }
}

/// A regression model with calibrated uncertainty over state-action
/// feature vectors.
///
/// The sampler only needs fit-and-predict; anything from a Gaussian
/// process to a bootstrapped ensemble can stand behind this trait.
pub trait Surrogate {
    /// Fits the model to feature rows `x` and targets `y`.
    ///
    /// # Errors
    ///
    /// Implementations return [`crate::LearnError::ModelFit`] when the
    /// data cannot be fitted and
    /// [`crate::LearnError::DimensionMismatch`] on ragged inputs.
    fn fit(&mut self, x: &[Vec<f64>], y: &[f64]) -> Result<()>;

    /// Fits the model, re-tuning its own hyperparameters if it can.
    ///
    /// The default is a plain [`fit`](Surrogate::fit); models with a
    /// hyperparameter search override this.
    ///
    /// # Errors
    ///
    /// Same contract as [`fit`](Surrogate::fit).
    fn fit_tuned(&mut self, x: &[Vec<f64>], y: &[f64]) -> Result<()> {
        self.fit(x, y)
    }

    /// Predicts mean and uncertainty at one query point.
    ///
    /// # Errors
    ///
    /// Returns [`crate::LearnError::NotFitted`] before the first
    /// successful [`fit`](Surrogate::fit).
    fn predict(&self, x: &[f64]) -> Result<Prediction>;

    /// Predicts a batch of query points.
    ///
    /// # Errors
    ///
    /// Propagates the first per-point prediction error.
    fn predict_batch(&self, xs: &[Vec<f64>]) -> Result<Vec<Prediction>> {
        xs.iter().map(|x| self.predict(x)).collect()
    }
}
