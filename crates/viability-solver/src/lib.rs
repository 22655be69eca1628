//! Brute-force viability analysis over discretized state-action grids.
//!
//! Pipeline:
//!
//! 1. [`compute_q_map`] - exhaustively evaluate a dynamics collaborator
//!    over every state-action cell, in parallel, recording successors
//!    and failures ([`QMap`])
//! 2. [`compute_viable_set`] - backward fixed-point iteration to the
//!    viable kernel ([`ViableSet`])
//! 3. [`compute_measure`] - grade kernel states by the fraction of
//!    actions that keep them viable ([`Measure`])
//!
//! [`GroundTruthBundle`] packages the results for learners and plotting
//! tools; [`project_q2s`] is the Q-to-S fusion rule shared with learned
//! estimates.

// Safety: Deny unwrap/expect in library code. Tests may use them.
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod bundle;
mod error;
mod kernel;
mod measure;
mod qmap;

pub use bundle::GroundTruthBundle;
pub use error::{Result, SolverError};
pub use kernel::{compute_viable_set, compute_viable_set_traced, validate_viable_set, ViableSet};
pub use measure::{compute_measure, project_q2s, Measure};
pub use qmap::{compute_q_map, QMap};
