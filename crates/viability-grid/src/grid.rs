//! State-action grid assembled from validated axes.

use serde::{Deserialize, Serialize};

use crate::axis::Axis;
use crate::error::{GridError, Result};

/// A discretized state-action space: one [`Axis`] per state dimension and
/// one per action dimension.
///
/// A **state bin** is a tuple of indices, one per state axis; likewise for
/// action bins. Q-shaped arrays are indexed by the state bin followed by
/// the action bin.
///
/// # Example
///
/// ```
/// use viability_grid::{Axis, Grid};
///
/// let grid = Grid::new(
///     vec![Axis::linspace(0.1, 0.9, 9)],
///     vec![Axis::linspace(-0.17, 1.57, 11)],
/// ).unwrap();
///
/// assert_eq!(grid.q_shape(), vec![9, 11]);
/// assert_eq!(grid.digitize_state(&[0.47]).unwrap(), vec![4]);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grid {
    states: Vec<Axis>,
    actions: Vec<Axis>,
}

impl Grid {
    /// Assembles a grid from state and action axes.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::EmptyAxis`] if either axis list is empty
    /// (a grid needs at least one state and one action dimension).
    pub fn new(states: Vec<Axis>, actions: Vec<Axis>) -> Result<Self> {
        if states.is_empty() {
            return Err(GridError::EmptyAxis(0));
        }
        if actions.is_empty() {
            return Err(GridError::EmptyAxis(states.len()));
        }
        Ok(Self { states, actions })
    }

    /// State axes in order.
    #[must_use]
    pub fn state_axes(&self) -> &[Axis] {
        &self.states
    }

    /// Action axes in order.
    #[must_use]
    pub fn action_axes(&self) -> &[Axis] {
        &self.actions
    }

    /// Number of state dimensions.
    #[must_use]
    pub fn state_dims(&self) -> usize {
        self.states.len()
    }

    /// Number of action dimensions.
    #[must_use]
    pub fn action_dims(&self) -> usize {
        self.actions.len()
    }

    /// Axis lengths of the state space.
    #[must_use]
    pub fn state_shape(&self) -> Vec<usize> {
        self.states.iter().map(Axis::len).collect()
    }

    /// Axis lengths of the action space.
    #[must_use]
    pub fn action_shape(&self) -> Vec<usize> {
        self.actions.iter().map(Axis::len).collect()
    }

    /// Shape of Q-indexed arrays: state shape followed by action shape.
    #[must_use]
    pub fn q_shape(&self) -> Vec<usize> {
        let mut shape = self.state_shape();
        shape.extend(self.action_shape());
        shape
    }

    /// Total number of state bins.
    #[must_use]
    pub fn num_state_bins(&self) -> usize {
        self.states.iter().map(Axis::len).product()
    }

    /// Total number of action bins.
    #[must_use]
    pub fn num_action_bins(&self) -> usize {
        self.actions.iter().map(Axis::len).product()
    }

    /// Total number of state-action cells.
    #[must_use]
    pub fn num_q_cells(&self) -> usize {
        self.num_state_bins() * self.num_action_bins()
    }

    /// Digitizes a continuous state vector to its nearest state bin,
    /// clamping per axis.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::DimensionMismatch`] if `state` does not have
    /// one component per state axis.
    pub fn digitize_state(&self, state: &[f64]) -> Result<Vec<usize>> {
        if state.len() != self.states.len() {
            return Err(GridError::DimensionMismatch {
                expected: self.states.len(),
                actual: state.len(),
            });
        }
        Ok(self
            .states
            .iter()
            .zip(state.iter())
            .map(|(axis, &v)| axis.digitize(v))
            .collect())
    }

    /// Strict digitization: errors instead of clamping out-of-range values.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::DimensionMismatch`] on arity mismatch and
    /// [`GridError::OutOfRange`] (with the axis position filled in) when a
    /// component falls outside its axis range.
    pub fn digitize_state_strict(&self, state: &[f64]) -> Result<Vec<usize>> {
        if state.len() != self.states.len() {
            return Err(GridError::DimensionMismatch {
                expected: self.states.len(),
                actual: state.len(),
            });
        }
        self.states
            .iter()
            .zip(state.iter())
            .enumerate()
            .map(|(axis_pos, (axis, &v))| {
                axis.digitize_strict(v).map_err(|err| match err {
                    GridError::OutOfRange {
                        value, min, max, ..
                    } => GridError::OutOfRange {
                        axis: axis_pos,
                        value,
                        min,
                        max,
                    },
                    other => other,
                })
            })
            .collect()
    }

    /// Continuous state at a state bin.
    ///
    /// # Panics
    ///
    /// Panics if `bin` has the wrong arity or out-of-range components.
    #[must_use]
    pub fn state_value(&self, bin: &[usize]) -> Vec<f64> {
        assert_eq!(bin.len(), self.states.len(), "state bin arity mismatch");
        self.states
            .iter()
            .zip(bin.iter())
            .map(|(axis, &i)| axis.value(i))
            .collect()
    }

    /// Continuous action at an action bin.
    ///
    /// # Panics
    ///
    /// Panics if `bin` has the wrong arity or out-of-range components.
    #[must_use]
    pub fn action_value(&self, bin: &[usize]) -> Vec<f64> {
        assert_eq!(bin.len(), self.actions.len(), "action bin arity mismatch");
        self.actions
            .iter()
            .zip(bin.iter())
            .map(|(axis, &i)| axis.value(i))
            .collect()
    }

    /// Von-Neumann neighborhood of a state bin: all bins one step along a
    /// single axis, plus the bin itself, clipped to the grid.
    ///
    /// Used for interpolated measure lookup when a continuous state falls
    /// between grid points.
    ///
    /// # Panics
    ///
    /// Panics if `bin` has the wrong arity.
    #[must_use]
    pub fn neighbors(&self, bin: &[usize]) -> Vec<Vec<usize>> {
        assert_eq!(bin.len(), self.states.len(), "state bin arity mismatch");
        let mut out = vec![bin.to_vec()];
        for (dim, axis) in self.states.iter().enumerate() {
            if bin[dim] > 0 {
                let mut lower = bin.to_vec();
                lower[dim] -= 1;
                out.push(lower);
            }
            if bin[dim] + 1 < axis.len() {
                let mut upper = bin.to_vec();
                upper[dim] += 1;
                out.push(upper);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn grid_1d() -> Grid {
        Grid::new(
            vec![Axis::linspace(0.1, 0.9, 9)],
            vec![Axis::linspace(-0.2, 0.8, 11)],
        )
        .unwrap()
    }

    #[test]
    fn grid_shapes() {
        let grid = grid_1d();
        assert_eq!(grid.state_shape(), vec![9]);
        assert_eq!(grid.action_shape(), vec![11]);
        assert_eq!(grid.q_shape(), vec![9, 11]);
        assert_eq!(grid.num_state_bins(), 9);
        assert_eq!(grid.num_action_bins(), 11);
        assert_eq!(grid.num_q_cells(), 99);
    }

    #[test]
    fn grid_needs_both_spaces() {
        assert!(Grid::new(vec![], vec![Axis::linspace(0.0, 1.0, 2)]).is_err());
        assert!(Grid::new(vec![Axis::linspace(0.0, 1.0, 2)], vec![]).is_err());
    }

    #[test]
    fn grid_digitize_state() {
        let grid = grid_1d();
        assert_eq!(grid.digitize_state(&[0.1]).unwrap(), vec![0]);
        assert_eq!(grid.digitize_state(&[0.47]).unwrap(), vec![4]);
        assert_eq!(grid.digitize_state(&[5.0]).unwrap(), vec![8]);
    }

    #[test]
    fn grid_digitize_arity_mismatch() {
        let grid = grid_1d();
        assert!(matches!(
            grid.digitize_state(&[0.1, 0.2]),
            Err(GridError::DimensionMismatch {
                expected: 1,
                actual: 2
            })
        ));
    }

    #[test]
    fn grid_digitize_strict_reports_axis() {
        let grid = Grid::new(
            vec![Axis::linspace(0.0, 1.0, 5), Axis::linspace(2.0, 3.0, 5)],
            vec![Axis::linspace(0.0, 1.0, 2)],
        )
        .unwrap();
        let err = grid.digitize_state_strict(&[0.5, 9.0]).unwrap_err();
        assert!(matches!(err, GridError::OutOfRange { axis: 1, .. }));
    }

    #[test]
    fn grid_values_roundtrip() {
        let grid = grid_1d();
        let state = grid.state_value(&[4]);
        assert_relative_eq!(state[0], 0.5, epsilon = 1e-12);
        assert_eq!(grid.digitize_state(&state).unwrap(), vec![4]);

        let action = grid.action_value(&[0]);
        assert_relative_eq!(action[0], -0.2);
    }

    #[test]
    fn grid_neighbors_interior() {
        let grid = Grid::new(
            vec![Axis::linspace(0.0, 1.0, 5), Axis::linspace(0.0, 1.0, 5)],
            vec![Axis::linspace(0.0, 1.0, 2)],
        )
        .unwrap();
        let n = grid.neighbors(&[2, 2]);
        assert_eq!(n.len(), 5); // self + 4 von-Neumann neighbors
        assert!(n.contains(&vec![2, 2]));
        assert!(n.contains(&vec![1, 2]));
        assert!(n.contains(&vec![3, 2]));
        assert!(n.contains(&vec![2, 1]));
        assert!(n.contains(&vec![2, 3]));
    }

    #[test]
    fn grid_neighbors_corner_clipped() {
        let grid = grid_1d();
        let n = grid.neighbors(&[0]);
        assert_eq!(n.len(), 2);
        assert!(n.contains(&vec![0]));
        assert!(n.contains(&vec![1]));

        let n = grid.neighbors(&[8]);
        assert_eq!(n.len(), 2);
    }

    #[test]
    fn grid_serialization_roundtrip() {
        let grid = grid_1d();
        let json = serde_json::to_string(&grid).unwrap();
        let back: Grid = serde_json::from_str(&json).unwrap();
        assert_eq!(back, grid);
    }
}
