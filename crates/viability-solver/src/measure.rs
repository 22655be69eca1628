//! Viability measure: how much of the action space keeps a state viable.

use serde::{Deserialize, Serialize};
use tracing::info;
use viability_grid::{DenseGrid, Grid};

use crate::error::{Result, SolverError};
use crate::kernel::ViableSet;
use crate::qmap::QMap;

/// The viability measure of a kernel.
///
/// `s_m[s]` is the fraction of actions that keep state `s` inside the
/// kernel; it grades states by how forgiving they are, from 0 (outside
/// the kernel) to 1 (every action works). `q_m[s, a]` propagates the
/// grade through the transition: the measure of the successor state for
/// viable cells, 0 for the rest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measure {
    q_m: DenseGrid<f64>,
    s_m: DenseGrid<f64>,
}

impl Measure {
    /// Cell-wise measure, Q-shaped (`Q_M`).
    #[must_use]
    pub const fn q_m(&self) -> &DenseGrid<f64> {
        &self.q_m
    }

    /// State-wise measure, S-shaped (`S_M`).
    #[must_use]
    pub const fn s_m(&self) -> &DenseGrid<f64> {
        &self.s_m
    }

    /// Mean state measure; a scalar summary of kernel volume and margin.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn mean(&self) -> f64 {
        self.s_m.as_slice().iter().sum::<f64>() / self.s_m.len() as f64
    }
}

/// Computes the viability measure of a kernel.
///
/// # Errors
///
/// Returns [`SolverError::ShapeMismatch`] if the kernel does not match
/// the map's grid, and [`SolverError::Grid`] if a recorded successor
/// cannot be digitized.
///
/// # Example
///
/// ```
/// use viability_dynamics::{ApexHopper, SlipParams};
/// use viability_grid::{Axis, Grid};
/// use viability_solver::{compute_measure, compute_q_map, compute_viable_set};
///
/// let grid = Grid::new(
///     vec![Axis::linspace(0.1, 0.9, 9)],
///     vec![Axis::linspace(-0.17, 1.57, 11)],
/// )?;
/// let model = ApexHopper::new(SlipParams::default())?;
/// let qmap = compute_q_map(&grid, &model)?;
/// let viable = compute_viable_set(&qmap)?;
/// let measure = compute_measure(&qmap, &viable)?;
///
/// assert!(measure.s_m().as_slice().iter().all(|&m| (0.0..=1.0).contains(&m)));
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn compute_measure(qmap: &QMap, viable: &ViableSet) -> Result<Measure> {
    let grid = qmap.grid();
    if viable.q_v().shape() != grid.q_shape().as_slice() {
        return Err(SolverError::ShapeMismatch(
            "kernel does not match the map's grid".into(),
        ));
    }

    let s_m = project_q2s(grid, &viable.q_v().map(|&v| f64::from(u8::from(v))))?;

    let successors = qmap.successor_flat_states()?;
    let q_m_data = viable
        .q_v()
        .as_slice()
        .iter()
        .zip(successors.iter())
        .map(|(&viable_cell, successor)| match (viable_cell, successor) {
            (true, Some(s)) => *s_m.get_flat(*s),
            _ => 0.0,
        })
        .collect();

    let measure = Measure {
        q_m: DenseGrid::from_vec(&grid.q_shape(), q_m_data)?,
        s_m,
    };
    info!(mean_measure = measure.mean(), "viability measure computed");
    Ok(measure)
}

/// Projects a Q-shaped array to the state space by averaging over the
/// action axes.
///
/// This is the fusion rule shared by ground-truth measures and learned
/// measure estimates.
///
/// # Errors
///
/// Returns [`SolverError::ShapeMismatch`] if `q` is not Q-shaped for
/// `grid`.
#[allow(clippy::cast_precision_loss)]
pub fn project_q2s(grid: &Grid, q: &DenseGrid<f64>) -> Result<DenseGrid<f64>> {
    if q.shape() != grid.q_shape().as_slice() {
        return Err(SolverError::ShapeMismatch(format!(
            "expected Q-shaped array {:?}, got {:?}",
            grid.q_shape(),
            q.shape()
        )));
    }
    let num_actions = grid.num_action_bins();
    let data = q
        .as_slice()
        .chunks_exact(num_actions)
        .map(|block| block.iter().sum::<f64>() / num_actions as f64)
        .collect();
    Ok(DenseGrid::from_vec(&grid.state_shape(), data)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::compute_viable_set;
    use crate::qmap::compute_q_map;
    use approx::assert_relative_eq;
    use viability_dynamics::{PoincareMap, Transition};
    use viability_grid::Axis;

    /// Identity map that fails for negative actions.
    struct SelfMap;

    impl PoincareMap for SelfMap {
        fn state_dims(&self) -> usize {
            1
        }

        fn action_dims(&self) -> usize {
            1
        }

        fn poincare_map(
            &self,
            state: &[f64],
            action: &[f64],
        ) -> viability_dynamics::Result<Transition> {
            if action[0] < 0.0 {
                Ok(Transition::Failure)
            } else {
                Ok(Transition::success(state.to_vec()))
            }
        }
    }

    fn grid() -> Grid {
        Grid::new(
            vec![Axis::linspace(0.1, 0.9, 9)],
            vec![Axis::linspace(-2.0, 7.0, 10)],
        )
        .unwrap()
    }

    fn ground_truth() -> (QMap, ViableSet) {
        let qmap = compute_q_map(&grid(), &SelfMap).unwrap();
        let viable = compute_viable_set(&qmap).unwrap();
        (qmap, viable)
    }

    #[test]
    fn measure_counts_viable_actions() {
        let (qmap, viable) = ground_truth();
        let measure = compute_measure(&qmap, &viable).unwrap();

        // 8 of 10 actions are non-negative for every state.
        for &m in measure.s_m().as_slice() {
            assert_relative_eq!(m, 0.8);
        }
        assert_relative_eq!(measure.mean(), 0.8);
    }

    #[test]
    fn cell_measure_is_successor_state_measure() {
        let (qmap, viable) = ground_truth();
        let measure = compute_measure(&qmap, &viable).unwrap();

        for s in 0..9 {
            for a in 0..10 {
                let expected = if qmap.failed_flat(s, a) { 0.0 } else { 0.8 };
                assert_relative_eq!(*measure.q_m().get(&[s, a]), expected);
            }
        }
    }

    #[test]
    fn measure_is_bounded() {
        let (qmap, viable) = ground_truth();
        let measure = compute_measure(&qmap, &viable).unwrap();
        assert!(measure
            .s_m()
            .as_slice()
            .iter()
            .chain(measure.q_m().as_slice())
            .all(|&m| (0.0..=1.0).contains(&m)));
    }

    #[test]
    fn measure_is_deterministic() {
        let (qmap, viable) = ground_truth();
        let a = compute_measure(&qmap, &viable).unwrap();
        let b = compute_measure(&qmap, &viable).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn project_q2s_averages_action_blocks() {
        let grid = Grid::new(
            vec![Axis::linspace(0.0, 1.0, 2)],
            vec![Axis::linspace(0.0, 1.0, 2)],
        )
        .unwrap();
        let q = DenseGrid::from_vec(&[2, 2], vec![1.0, 0.0, 0.5, 0.5]).unwrap();
        let s = project_q2s(&grid, &q).unwrap();
        assert_eq!(s.as_slice(), &[0.5, 0.5]);
    }

    #[test]
    fn project_q2s_rejects_wrong_shape() {
        let q = DenseGrid::from_vec(&[3, 3], vec![0.0; 9]).unwrap();
        assert!(matches!(
            project_q2s(&grid(), &q),
            Err(SolverError::ShapeMismatch(_))
        ));
    }

    #[test]
    fn measure_serialization_roundtrip() {
        let (qmap, viable) = ground_truth();
        let measure = compute_measure(&qmap, &viable).unwrap();
        let json = serde_json::to_string(&measure).unwrap();
        let back: Measure = serde_json::from_str(&json).unwrap();
        assert_eq!(back, measure);
    }
}
