//! Safe active learning of viability measures.
//!
//! Where the brute-force solver sweeps every grid cell, the learner
//! spends a small budget of dynamics evaluations and interpolates the
//! rest with a calibrated surrogate:
//!
//! - [`Surrogate`] / [`GpSurrogate`] - regression with uncertainty over
//!   state-action features (exact Gaussian process by default)
//! - [`MeasureLearner`] - the sampling loop: pick the most informative
//!   action whose lower confidence bound clears the safety threshold,
//!   execute it, refit
//! - [`ThresholdSchedule`] - linear annealing of the confidence and
//!   safety thresholds over the run
//! - [`Estimation`] - grid-wide estimates and confidence level sets
//! - [`CheckpointBundle`] - JSON snapshots of the estimate mid-run
//!
//! Failed samples are data: they enter the fit with a penalized target
//! and reset the state walk, mirroring how a real platform would be
//! reset after a fall.

// Safety: Deny unwrap/expect in library code. Tests may use them.
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod checkpoint;
mod error;
mod estimation;
mod gp;
mod sampler;
mod schedule;
mod surrogate;

pub use checkpoint::{CheckpointBundle, CheckpointObserver};
pub use error::{LearnError, Result};
pub use estimation::{probit, Estimation, LearnedSets, QPrediction};
pub use gp::{GpHyperparams, GpSurrogate};
pub use sampler::{
    FailedSample, MeasureLearner, NoopObserver, RunReport, SamplerConfig, SamplerObserver,
    SeedData,
};
pub use schedule::{ThresholdSchedule, Thresholds};
pub use surrogate::{Prediction, Surrogate};
