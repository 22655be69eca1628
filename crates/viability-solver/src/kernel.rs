//! Backward fixed-point computation of the viable kernel.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use viability_grid::DenseGrid;

use crate::error::{Result, SolverError};
use crate::qmap::QMap;

/// The viable kernel of a transition map.
///
/// `q_v[s, a]` is `true` when taking action `a` in state `s` succeeds and
/// lands inside the viable state set; `s_v[s]` is `true` when at least one
/// such action exists. The pair is mutually consistent by construction:
/// `s_v` is exactly the action-wise disjunction of `q_v`, and `q_v` only
/// admits transitions into `s_v`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViableSet {
    q_v: DenseGrid<bool>,
    s_v: DenseGrid<bool>,
    iterations: usize,
    converged: bool,
}

impl ViableSet {
    /// Viable state-action cells, Q-shaped (`Q_V`).
    #[must_use]
    pub const fn q_v(&self) -> &DenseGrid<bool> {
        &self.q_v
    }

    /// Viable states, S-shaped (`S_V`).
    #[must_use]
    pub const fn s_v(&self) -> &DenseGrid<bool> {
        &self.s_v
    }

    /// Number of backward sweeps performed.
    #[must_use]
    pub const fn iterations(&self) -> usize {
        self.iterations
    }

    /// Whether the state set stopped changing within the sweep budget.
    #[must_use]
    pub const fn converged(&self) -> bool {
        self.converged
    }

    /// Fraction of state bins inside the kernel.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn viable_fraction(&self) -> f64 {
        self.s_v.count_true() as f64 / self.s_v.len() as f64
    }
}

/// Computes the viable kernel by backward fixed-point iteration.
///
/// Starting from the optimistic set of all states with at least one
/// non-failing action, each sweep removes states whose every action either
/// fails or transitions out of the current set. The set shrinks
/// monotonically, so the iteration terminates in at most one sweep per
/// state bin; an always-failing map converges to the empty kernel in a
/// single sweep.
///
/// # Errors
///
/// Returns [`SolverError::Grid`] if a recorded successor state cannot be
/// digitized (wrong arity for the grid).
///
/// # Example
///
/// ```
/// use viability_dynamics::{ApexHopper, SlipParams};
/// use viability_grid::{Axis, Grid};
/// use viability_solver::{compute_q_map, compute_viable_set};
///
/// let grid = Grid::new(
///     vec![Axis::linspace(0.1, 0.9, 9)],
///     vec![Axis::linspace(-0.17, 1.57, 11)],
/// )?;
/// let model = ApexHopper::new(SlipParams::default())?;
/// let qmap = compute_q_map(&grid, &model)?;
/// let viable = compute_viable_set(&qmap)?;
///
/// assert!(viable.converged());
/// assert!(viable.q_v().count_true() <= qmap.failed().len());
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn compute_viable_set(qmap: &QMap) -> Result<ViableSet> {
    compute_viable_set_traced(qmap, |_| {})
}

/// Like [`compute_viable_set`], but invokes `on_sweep` with the surviving
/// state set after every backward sweep (the converged repeat included).
///
/// Lets callers watch the kernel shrink toward its fixed point: each
/// reported set is a subset of the previous one.
///
/// # Errors
///
/// Returns [`SolverError::Grid`] if a recorded successor state cannot be
/// digitized (wrong arity for the grid).
pub fn compute_viable_set_traced(
    qmap: &QMap,
    mut on_sweep: impl FnMut(&[bool]),
) -> Result<ViableSet> {
    let grid = qmap.grid();
    let num_states = grid.num_state_bins();
    let num_actions = grid.num_action_bins();
    let total = grid.num_q_cells();

    // Successor state bins are fixed; digitize them once up front.
    let successors = qmap.successor_flat_states()?;
    let failed = qmap.failed().as_slice();

    // Optimistic seed: a state is a candidate while any action succeeds.
    let mut s_v: Vec<bool> = (0..num_states)
        .map(|s| {
            failed[s * num_actions..(s + 1) * num_actions]
                .iter()
                .any(|&f| !f)
        })
        .collect();

    let mut q_v = vec![false; total];
    let mut iterations = 0;
    let mut converged = false;

    // A strictly shrinking subset of `num_states` bins stabilizes within
    // `num_states + 1` sweeps.
    for _ in 0..=num_states {
        iterations += 1;
        q_v = (0..total)
            .into_par_iter()
            .map(|flat| !failed[flat] && successors[flat].is_some_and(|s| s_v[s]))
            .collect();
        let s_next: Vec<bool> = (0..num_states)
            .map(|s| {
                q_v[s * num_actions..(s + 1) * num_actions]
                    .iter()
                    .any(|&v| v)
            })
            .collect();
        on_sweep(&s_next);

        if s_next == s_v {
            converged = true;
            break;
        }
        debug!(
            sweep = iterations,
            viable_states = s_next.iter().filter(|&&v| v).count(),
            "kernel sweep removed states"
        );
        s_v = s_next;
    }

    let viable = ViableSet {
        q_v: DenseGrid::from_vec(&grid.q_shape(), q_v)?,
        s_v: DenseGrid::from_vec(&grid.state_shape(), s_v)?,
        iterations,
        converged,
    };
    info!(
        iterations = viable.iterations,
        converged = viable.converged,
        viable_fraction = viable.viable_fraction(),
        "viable kernel computed"
    );
    Ok(viable)
}

/// Checks that a kernel is consistent with the map it was computed from.
///
/// Intended for tests and post-load validation of persisted kernels.
///
/// # Errors
///
/// Returns [`SolverError::ShapeMismatch`] if the kernel arrays do not
/// match the map's grid.
pub fn validate_viable_set(qmap: &QMap, viable: &ViableSet) -> Result<()> {
    let grid = qmap.grid();
    if viable.q_v.shape() != grid.q_shape().as_slice()
        || viable.s_v.shape() != grid.state_shape().as_slice()
    {
        return Err(SolverError::ShapeMismatch(
            "kernel arrays do not match the map's grid".into(),
        ));
    }
    let num_actions = grid.num_action_bins();
    let successors = qmap.successor_flat_states()?;
    let failed = qmap.failed().as_slice();
    let q_v = viable.q_v.as_slice();
    let s_v = viable.s_v.as_slice();

    for (flat, &viable_cell) in q_v.iter().enumerate() {
        let expected = !failed[flat] && successors[flat].is_some_and(|s| s_v[s]);
        if viable_cell != expected {
            return Err(SolverError::ShapeMismatch(format!(
                "inconsistent kernel cell at flat index {flat}"
            )));
        }
    }
    for (s, &viable_state) in s_v.iter().enumerate() {
        let expected = q_v[s * num_actions..(s + 1) * num_actions]
            .iter()
            .any(|&v| v);
        if viable_state != expected {
            return Err(SolverError::ShapeMismatch(format!(
                "inconsistent kernel state at flat index {s}"
            )));
        }
    }
    Ok(())
}
