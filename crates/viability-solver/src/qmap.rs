//! Brute-force transition map construction.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use viability_dynamics::PoincareMap;
use viability_grid::{DenseGrid, Grid};

use crate::error::{Result, SolverError};

/// The dense transition map over a state-action grid.
///
/// For every state-bin x action-bin cell this records the continuous
/// successor state returned by the dynamics collaborator, or a failure
/// flag. Built once by [`compute_q_map`], immutable afterwards, and
/// safely shared read-only with any number of consumers.
///
/// Q-shaped arrays are row-major with state axes before action axes, so
/// the flat index of cell `(s, a)` is
/// `s_flat * num_action_bins + a_flat`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QMap {
    grid: Grid,
    next_state: DenseGrid<Option<Vec<f64>>>,
    failed: DenseGrid<bool>,
}

impl QMap {
    /// The grid this map was built over.
    #[must_use]
    pub const fn grid(&self) -> &Grid {
        &self.grid
    }

    /// Successor states, Q-shaped; `None` marks a failed cell.
    #[must_use]
    pub const fn next_states(&self) -> &DenseGrid<Option<Vec<f64>>> {
        &self.next_state
    }

    /// Failure flags, Q-shaped (`Q_F`).
    #[must_use]
    pub const fn failed(&self) -> &DenseGrid<bool> {
        &self.failed
    }

    /// Successor state of a flat `(state, action)` cell, if it succeeded.
    #[must_use]
    pub fn next_state_flat(&self, state_flat: usize, action_flat: usize) -> Option<&[f64]> {
        let flat = state_flat * self.grid.num_action_bins() + action_flat;
        self.next_state.get_flat(flat).as_deref()
    }

    /// Failure flag of a flat `(state, action)` cell.
    #[must_use]
    pub fn failed_flat(&self, state_flat: usize, action_flat: usize) -> bool {
        let flat = state_flat * self.grid.num_action_bins() + action_flat;
        *self.failed.get_flat(flat)
    }

    /// Fraction of cells whose evaluation failed.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn failure_fraction(&self) -> f64 {
        self.failed.count_true() as f64 / self.failed.len() as f64
    }

    /// Digitized successor state bin of every cell as a flat state index,
    /// in row-major cell order; `None` marks failed cells.
    ///
    /// Successors are clamped to the grid, so consumers can index
    /// S-shaped arrays directly. The kernel solver and the measure
    /// computation both start from this.
    ///
    /// # Errors
    ///
    /// Returns [`SolverError::Grid`] if a recorded successor does not
    /// have one component per state axis.
    pub fn successor_flat_states(&self) -> Result<Vec<Option<usize>>> {
        let shape = self.grid.state_shape();
        self.next_state
            .as_slice()
            .iter()
            .map(|next| {
                next.as_ref()
                    .map(|successor| {
                        let bins = self.grid.digitize_state(successor)?;
                        Ok::<usize, viability_grid::GridError>(bins
                            .iter()
                            .zip(shape.iter())
                            .fold(0, |flat, (&bin, &len)| flat * len + bin))
                    })
                    .transpose()
            })
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(SolverError::from)
    }
}

/// Builds the transition map by exhaustively evaluating the dynamics
/// collaborator over the full Cartesian product of state and action bins.
///
/// Cells are independent and evaluated in parallel. A cell whose
/// evaluation returns a [`viability_dynamics::DynamicsError`] is recorded
/// as failed — grids legitimately contain physically infeasible
/// configurations — and never aborts the sweep.
///
/// # Errors
///
/// Returns [`SolverError::DimensionMismatch`] if the model's state or
/// action dimensionality does not match the grid. This is the only fatal
/// condition.
///
/// # Example
///
/// ```
/// use viability_dynamics::{ApexHopper, SlipParams};
/// use viability_grid::{Axis, Grid};
/// use viability_solver::compute_q_map;
///
/// let grid = Grid::new(
///     vec![Axis::linspace(0.1, 0.9, 9)],
///     vec![Axis::linspace(-0.17, 1.57, 10)],
/// )?;
/// let model = ApexHopper::new(SlipParams::default())?;
/// let qmap = compute_q_map(&grid, &model)?;
///
/// assert_eq!(qmap.failed().shape(), &[9, 10]);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn compute_q_map<M>(grid: &Grid, model: &M) -> Result<QMap>
where
    M: PoincareMap + Sync,
{
    if model.state_dims() != grid.state_dims() {
        return Err(SolverError::DimensionMismatch {
            space: "state",
            grid: grid.state_dims(),
            model: model.state_dims(),
        });
    }
    if model.action_dims() != grid.action_dims() {
        return Err(SolverError::DimensionMismatch {
            space: "action",
            grid: grid.action_dims(),
            model: model.action_dims(),
        });
    }

    let q_shape = grid.q_shape();
    let state_dims = grid.state_dims();
    let total = grid.num_q_cells();

    info!(cells = total, "starting Q-map sweep");

    let cells: Vec<(Option<Vec<f64>>, bool)> = (0..total)
        .into_par_iter()
        .map(|flat| {
            let bins = unflatten(&q_shape, flat);
            let state = grid.state_value(&bins[..state_dims]);
            let action = grid.action_value(&bins[state_dims..]);
            match model.poincare_map(&state, &action) {
                Ok(transition) => match transition.next_state() {
                    Some(next) => (Some(next.to_vec()), false),
                    None => (None, true),
                },
                Err(err) => {
                    debug!(cell = flat, %err, "dynamics evaluation failed");
                    (None, true)
                }
            }
        })
        .collect();

    let mut next_state = Vec::with_capacity(total);
    let mut failed = Vec::with_capacity(total);
    for (next, fail) in cells {
        next_state.push(next);
        failed.push(fail);
    }

    let qmap = QMap {
        grid: grid.clone(),
        next_state: DenseGrid::from_vec(&q_shape, next_state)?,
        failed: DenseGrid::from_vec(&q_shape, failed)?,
    };

    info!(
        cells = total,
        failure_fraction = qmap.failure_fraction(),
        "Q-map sweep complete"
    );
    Ok(qmap)
}

/// Converts a flat row-major offset to a multi-index for `shape`.
fn unflatten(shape: &[usize], flat: usize) -> Vec<usize> {
    let mut index = vec![0; shape.len()];
    let mut rem = flat;
    for dim in (0..shape.len()).rev() {
        index[dim] = rem % shape[dim];
        rem /= shape[dim];
    }
    index
}
