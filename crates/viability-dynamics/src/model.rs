//! Dynamics collaborator traits.

use crate::error::Result;
use crate::transition::{Trajectory, Transition};

/// The contract the viability solver and the measure learner consume.
///
/// `state` and `action` are expressed in **grid coordinates** (the
/// low-dimensional Poincaré-section coordinates the grids discretize);
/// the implementer owns the injective mapping from grid coordinates to
/// its full internal state, and back. All methods are pure functions of
/// their explicit inputs.
pub trait PoincareMap {
    /// Number of state dimensions on the Poincaré section.
    fn state_dims(&self) -> usize;

    /// Number of action dimensions.
    fn action_dims(&self) -> usize;

    /// Applies one action at one section state and returns the outcome of
    /// the next section crossing.
    ///
    /// # Errors
    ///
    /// Implementations report integration breakdowns or infeasible
    /// configurations as [`crate::DynamicsError`]; callers treat any error
    /// as a failed transition, never as fatal.
    fn poincare_map(&self, state: &[f64], action: &[f64]) -> Result<Transition>;
}

/// A full leg model: the Poincaré contract plus the step-level interface
/// the experiment scripts use.
pub trait LegModel: PoincareMap {
    /// Places the swing leg for touchdown given the current full state,
    /// returning the adjusted full state.
    ///
    /// # Errors
    ///
    /// Returns [`crate::DynamicsError`] if the state is infeasible.
    fn reset_leg(&self, state: &[f64]) -> Result<Vec<f64>>;

    /// Simulates one full step (flight, stance, flight to next apex).
    ///
    /// # Errors
    ///
    /// Returns [`crate::DynamicsError`] on integration breakdown or
    /// infeasible initial conditions.
    fn step(&self, state: &[f64]) -> Result<Trajectory>;

    /// Total mechanical energy of a full state.
    ///
    /// # Errors
    ///
    /// Returns [`crate::DynamicsError`] on dimension mismatch.
    fn compute_total_energy(&self, state: &[f64]) -> Result<f64>;
}
