//! Gaussian-process regression with an ARD squared-exponential kernel.

use nalgebra::{Cholesky, DMatrix, DVector, Dyn};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{LearnError, Result};
use crate::surrogate::{Prediction, Surrogate};

/// Hyperparameters of the squared-exponential kernel, one length scale
/// per feature dimension (automatic relevance determination).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GpHyperparams {
    /// Kernel length scale per feature dimension.
    pub length_scales: Vec<f64>,
    /// Kernel signal variance.
    pub signal_variance: f64,
    /// Observation noise variance added to the diagonal.
    pub noise_variance: f64,
    /// Constant prior mean subtracted before regression.
    pub prior_mean: f64,
}

impl GpHyperparams {
    /// Isotropic hyperparameters: the same length scale on every
    /// dimension, unit signal, small noise, zero prior mean.
    #[must_use]
    pub fn isotropic(dims: usize, length_scale: f64) -> Self {
        Self {
            length_scales: vec![length_scale; dims],
            signal_variance: 1.0,
            noise_variance: 1e-3,
            prior_mean: 0.0,
        }
    }

    /// Sets the signal variance.
    #[must_use]
    pub fn with_signal_variance(mut self, signal_variance: f64) -> Self {
        self.signal_variance = signal_variance;
        self
    }

    /// Sets the noise variance.
    #[must_use]
    pub fn with_noise_variance(mut self, noise_variance: f64) -> Self {
        self.noise_variance = noise_variance;
        self
    }

    /// Sets the prior mean.
    #[must_use]
    pub fn with_prior_mean(mut self, prior_mean: f64) -> Self {
        self.prior_mean = prior_mean;
        self
    }

    /// Checks that all hyperparameters are finite and positive.
    ///
    /// # Errors
    ///
    /// Returns [`LearnError::Config`] otherwise.
    pub fn validate(&self) -> Result<()> {
        if self.length_scales.is_empty() {
            return Err(LearnError::config("no kernel length scales"));
        }
        if self
            .length_scales
            .iter()
            .any(|&l| !l.is_finite() || l <= 0.0)
        {
            return Err(LearnError::config("length scales must be finite and > 0"));
        }
        if !self.signal_variance.is_finite() || self.signal_variance <= 0.0 {
            return Err(LearnError::config("signal variance must be finite and > 0"));
        }
        if !self.noise_variance.is_finite() || self.noise_variance <= 0.0 {
            return Err(LearnError::config("noise variance must be finite and > 0"));
        }
        if !self.prior_mean.is_finite() {
            return Err(LearnError::config("prior mean must be finite"));
        }
        Ok(())
    }
}

/// Fitted state: training inputs plus the factored covariance.
#[derive(Debug, Clone)]
struct FittedGp {
    train_x: Vec<Vec<f64>>,
    chol: Cholesky<f64, Dyn>,
    alpha: DVector<f64>,
    log_marginal: f64,
}

/// Exact Gaussian-process regressor.
///
/// Refitted from scratch on every data update; the sampler's data sets
/// stay in the hundreds, where a dense Cholesky factorization is cheap.
///
/// # Example
///
/// ```
/// use viability_learn::{GpHyperparams, GpSurrogate, Surrogate};
///
/// let mut gp = GpSurrogate::new(GpHyperparams::isotropic(1, 0.5))?;
/// gp.fit(&[vec![0.0], vec![1.0]], &[0.0, 1.0])?;
///
/// let p = gp.predict(&[0.5])?;
/// assert!(p.mean > 0.0 && p.mean < 1.0);
/// # Ok::<(), viability_learn::LearnError>(())
/// ```
#[derive(Debug, Clone)]
pub struct GpSurrogate {
    hyper: GpHyperparams,
    fitted: Option<FittedGp>,
}

impl GpSurrogate {
    /// Creates an unfitted regressor after validating the
    /// hyperparameters.
    ///
    /// # Errors
    ///
    /// Returns [`LearnError::Config`] if validation fails.
    pub fn new(hyper: GpHyperparams) -> Result<Self> {
        hyper.validate()?;
        Ok(Self {
            hyper,
            fitted: None,
        })
    }

    /// Current hyperparameters.
    #[must_use]
    pub const fn hyperparams(&self) -> &GpHyperparams {
        &self.hyper
    }

    /// Log marginal likelihood of the last fit.
    #[must_use]
    pub fn log_marginal_likelihood(&self) -> Option<f64> {
        self.fitted.as_ref().map(|f| f.log_marginal)
    }

    /// ARD squared-exponential covariance between two feature rows.
    fn kernel(&self, a: &[f64], b: &[f64]) -> f64 {
        let mut sq = 0.0;
        for ((&x, &y), &l) in a.iter().zip(b).zip(&self.hyper.length_scales) {
            let d = (x - y) / l;
            sq = d.mul_add(d, sq);
        }
        self.hyper.signal_variance * (-0.5 * sq).exp()
    }

    fn check_rows(&self, x: &[Vec<f64>], y: &[f64]) -> Result<()> {
        if x.is_empty() {
            return Err(LearnError::model_fit("no training data"));
        }
        if x.len() != y.len() {
            return Err(LearnError::DimensionMismatch {
                expected: x.len(),
                actual: y.len(),
            });
        }
        let dims = self.hyper.length_scales.len();
        if let Some(row) = x.iter().find(|row| row.len() != dims) {
            return Err(LearnError::DimensionMismatch {
                expected: dims,
                actual: row.len(),
            });
        }
        Ok(())
    }

    /// Coarse maximum-likelihood search over kernel scale multipliers.
    ///
    /// Tries a small grid of length-scale and signal-variance multipliers
    /// around the current hyperparameters, keeps the fit with the best
    /// log marginal likelihood, and adopts its hyperparameters.
    ///
    /// # Errors
    ///
    /// Returns [`LearnError::ModelFit`] if no candidate factorizes.
    pub fn fit_with_search(&mut self, x: &[Vec<f64>], y: &[f64]) -> Result<()> {
        const LENGTH_MULTIPLIERS: [f64; 5] = [0.25, 0.5, 1.0, 2.0, 4.0];
        const SIGNAL_MULTIPLIERS: [f64; 3] = [0.5, 1.0, 2.0];

        self.check_rows(x, y)?;
        let base = self.hyper.clone();
        let mut best: Option<(f64, GpHyperparams, FittedGp)> = None;

        for &ml in &LENGTH_MULTIPLIERS {
            for &ms in &SIGNAL_MULTIPLIERS {
                let candidate = GpHyperparams {
                    length_scales: base.length_scales.iter().map(|l| l * ml).collect(),
                    signal_variance: base.signal_variance * ms,
                    ..base.clone()
                };
                let Ok(fitted) = factorize(&candidate, x, y) else {
                    continue;
                };
                if best
                    .as_ref()
                    .is_none_or(|(lml, _, _)| fitted.log_marginal > *lml)
                {
                    best = Some((fitted.log_marginal, candidate, fitted));
                }
            }
        }

        let (lml, hyper, fitted) = best
            .ok_or_else(|| LearnError::model_fit("no kernel candidate was positive definite"))?;
        debug!(
            log_marginal = lml,
            length_scale = hyper.length_scales[0],
            signal_variance = hyper.signal_variance,
            "hyperparameter search done"
        );
        self.hyper = hyper;
        self.fitted = Some(fitted);
        Ok(())
    }
}

/// Builds and factors the training covariance for fixed hyperparameters.
fn factorize(hyper: &GpHyperparams, x: &[Vec<f64>], y: &[f64]) -> Result<FittedGp> {
    let n = x.len();
    let kernel = |a: &[f64], b: &[f64]| {
        let mut sq = 0.0;
        for ((&p, &q), &l) in a.iter().zip(b).zip(&hyper.length_scales) {
            let d = (p - q) / l;
            sq = d.mul_add(d, sq);
        }
        hyper.signal_variance * (-0.5 * sq).exp()
    };

    let mut cov = DMatrix::from_fn(n, n, |i, j| kernel(&x[i], &x[j]));
    for i in 0..n {
        cov[(i, i)] += hyper.noise_variance;
    }

    let chol = Cholesky::new(cov)
        .ok_or_else(|| LearnError::model_fit("training covariance is not positive definite"))?;
    let centered = DVector::from_iterator(n, y.iter().map(|&v| v - hyper.prior_mean));
    let alpha = chol.solve(&centered);

    #[allow(clippy::cast_precision_loss)]
    let log_marginal = {
        let lower = chol.l();
        let log_det: f64 = (0..n).map(|i| lower[(i, i)].ln()).sum();
        -0.5 * centered.dot(&alpha) - log_det - 0.5 * n as f64 * (2.0 * std::f64::consts::PI).ln()
    };

    Ok(FittedGp {
        train_x: x.to_vec(),
        chol,
        alpha,
        log_marginal,
    })
}

impl Surrogate for GpSurrogate {
    fn fit(&mut self, x: &[Vec<f64>], y: &[f64]) -> Result<()> {
        self.check_rows(x, y)?;
        self.fitted = Some(factorize(&self.hyper, x, y)?);
        Ok(())
    }

    fn fit_tuned(&mut self, x: &[Vec<f64>], y: &[f64]) -> Result<()> {
        self.fit_with_search(x, y)
    }

    fn predict(&self, x: &[f64]) -> Result<Prediction> {
        let fitted = self.fitted.as_ref().ok_or(LearnError::NotFitted)?;
        if x.len() != self.hyper.length_scales.len() {
            return Err(LearnError::DimensionMismatch {
                expected: self.hyper.length_scales.len(),
                actual: x.len(),
            });
        }

        let n = fitted.train_x.len();
        let kstar = DVector::from_iterator(n, fitted.train_x.iter().map(|t| self.kernel(t, x)));
        let mean = self.hyper.prior_mean + kstar.dot(&fitted.alpha);
        let variance = self.hyper.signal_variance - kstar.dot(&fitted.chol.solve(&kstar));

        Ok(Prediction {
            mean,
            std: variance.max(0.0).sqrt(),
        })
    }
}
