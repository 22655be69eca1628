//! Serializable ground-truth bundle for downstream consumers.

use serde::{Deserialize, Serialize};
use viability_grid::{DenseGrid, Grid};

use crate::error::Result;
use crate::kernel::{compute_viable_set, ViableSet};
use crate::measure::{compute_measure, Measure};
use crate::qmap::QMap;

/// Everything a learner or plotter needs from a brute-force pass: the
/// grid, the failure map, the viable kernel, and the measure, in one
/// serializable record.
///
/// The successor map itself is deliberately not carried; it dominates
/// the payload size and consumers only need its derived sets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroundTruthBundle {
    /// The grid all arrays are shaped by.
    pub grid: Grid,
    /// Per-cell failure flags (`Q_F`).
    pub q_f: DenseGrid<bool>,
    /// Viable kernel cells (`Q_V`).
    pub q_v: DenseGrid<bool>,
    /// Viable states (`S_V`).
    pub s_v: DenseGrid<bool>,
    /// Cell-wise measure (`Q_M`).
    pub q_m: DenseGrid<f64>,
    /// State-wise measure (`S_M`).
    pub s_m: DenseGrid<f64>,
}

impl GroundTruthBundle {
    /// Assembles a bundle from already-computed pieces.
    #[must_use]
    pub fn new(qmap: &QMap, viable: &ViableSet, measure: &Measure) -> Self {
        Self {
            grid: qmap.grid().clone(),
            q_f: qmap.failed().clone(),
            q_v: viable.q_v().clone(),
            s_v: viable.s_v().clone(),
            q_m: measure.q_m().clone(),
            s_m: measure.s_m().clone(),
        }
    }

    /// Runs the full brute-force pipeline on a transition map.
    ///
    /// # Errors
    ///
    /// Propagates kernel and measure computation errors.
    pub fn from_q_map(qmap: &QMap) -> Result<Self> {
        let viable = compute_viable_set(qmap)?;
        let measure = compute_measure(qmap, &viable)?;
        Ok(Self::new(qmap, &viable, &measure))
    }
}
