//! Dynamics collaborator contract for SLIP-family locomotion models.
//!
//! The viability solver and the measure learner never integrate dynamics
//! themselves; they consume a collaborator behind two traits:
//!
//! - [`PoincareMap`] - the apex-to-apex (step-to-step) return map the
//!   grid computations need: `(state, action) -> Transition`
//! - [`LegModel`] - the full step-level interface experiment scripts use
//!   (`reset_leg`, `step`, `compute_total_energy`)
//!
//! Supporting types:
//!
//! - [`SlipParams`] - typed, validated simulation parameter record
//! - [`Transition`] / [`Trajectory`] - evaluation outcomes
//! - [`ApexHopper`] - analytic apex-return toy model for demos and tests
//!
//! Per-evaluation failures (infeasible configurations, integration
//! breakdown) are data, not faults: callers record them and continue.

// Safety: Deny unwrap/expect in library code. Tests may use them.
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod apex;
mod error;
mod model;
mod params;
mod transition;

pub use apex::ApexHopper;
pub use error::{DynamicsError, Result};
pub use model::{LegModel, PoincareMap};
pub use params::SlipParams;
pub use transition::{Trajectory, Transition};
