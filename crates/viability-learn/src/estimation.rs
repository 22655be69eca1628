//! Grid-wide estimates and confidence level sets from a surrogate.

use serde::{Deserialize, Serialize};
use viability_grid::{DenseGrid, Grid};
use viability_solver::project_q2s;

use crate::error::{LearnError, Result};
use crate::schedule::Thresholds;
use crate::surrogate::Surrogate;

/// Inverse standard-normal CDF (the probit function).
///
/// Acklam's rational approximation; relative error below `1.2e-9` over
/// the open unit interval. Confidence levels map through this to the
/// `z` multiplier of lower confidence bounds.
///
/// Returns negative and positive infinity at `p = 0` and `p = 1`, and
/// NaN outside `[0, 1]`.
#[must_use]
pub fn probit(p: f64) -> f64 {
    const A: [f64; 6] = [
        -3.969_683_028_665_376e1,
        2.209_460_984_245_205e2,
        -2.759_285_104_469_687e2,
        1.383_577_518_672_69e2,
        -3.066_479_806_614_716e1,
        2.506_628_277_459_239,
    ];
    const B: [f64; 5] = [
        -5.447_609_879_822_406e1,
        1.615_858_368_580_409e2,
        -1.556_989_798_598_866e2,
        6.680_131_188_771_972e1,
        -1.328_068_155_288_572e1,
    ];
    const C: [f64; 6] = [
        -7.784_894_002_430_293e-3,
        -3.223_964_580_411_365e-1,
        -2.400_758_277_161_838,
        -2.549_732_539_343_734,
        4.374_664_141_464_968,
        2.938_163_982_698_783,
    ];
    const D: [f64; 4] = [
        7.784_695_709_041_462e-3,
        3.224_671_290_700_398e-1,
        2.445_134_137_142_996,
        3.754_408_661_907_416,
    ];
    const P_LOW: f64 = 0.02425;

    if p.is_nan() || !(0.0..=1.0).contains(&p) {
        return f64::NAN;
    }
    if p == 0.0 {
        return f64::NEG_INFINITY;
    }
    if p == 1.0 {
        return f64::INFINITY;
    }

    if p < P_LOW {
        let q = (-2.0 * p.ln()).sqrt();
        (((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    } else if p <= 1.0 - P_LOW {
        let q = p - 0.5;
        let r = q * q;
        (((((A[0] * r + A[1]) * r + A[2]) * r + A[3]) * r + A[4]) * r + A[5]) * q
            / (((((B[0] * r + B[1]) * r + B[2]) * r + B[3]) * r + B[4]) * r + 1.0)
    } else {
        let q = (-2.0 * (1.0 - p).ln()).sqrt();
        -(((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    }
}

/// Surrogate mean and uncertainty evaluated over every grid cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QPrediction {
    /// Predictive mean, Q-shaped.
    pub mean: DenseGrid<f64>,
    /// Predictive standard deviation, Q-shaped.
    pub std: DenseGrid<f64>,
}

/// Learned counterparts of the ground-truth viability sets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearnedSets {
    /// Estimated cell measure, clamped to `[0, 1]` (`Q_M` estimate).
    pub q_m: DenseGrid<f64>,
    /// Estimated state measure (`S_M` estimate).
    pub s_m: DenseGrid<f64>,
    /// Confident viable cells at the measure confidence (`Q_V` estimate).
    pub q_v: DenseGrid<bool>,
    /// States with at least one confident cell (`S_V` estimate).
    pub s_v: DenseGrid<bool>,
}

/// Precomputed cell features for querying a surrogate over a grid.
///
/// A cell's feature row is its continuous state followed by its
/// continuous action; the cache avoids regenerating those rows on every
/// sampler iteration.
#[derive(Debug, Clone)]
pub struct Estimation {
    grid: Grid,
    features: Vec<Vec<f64>>,
    action_values: Vec<Vec<f64>>,
}

impl Estimation {
    /// Builds the feature cache for a grid.
    #[must_use]
    pub fn new(grid: &Grid) -> Self {
        let state_shape = grid.state_shape();
        let action_shape = grid.action_shape();
        let action_values: Vec<Vec<f64>> = (0..grid.num_action_bins())
            .map(|flat| grid.action_value(&unflatten(&action_shape, flat)))
            .collect();

        let mut features = Vec::with_capacity(grid.num_q_cells());
        for s_flat in 0..grid.num_state_bins() {
            let state = grid.state_value(&unflatten(&state_shape, s_flat));
            for action in &action_values {
                let mut row = state.clone();
                row.extend_from_slice(action);
                features.push(row);
            }
        }

        Self {
            grid: grid.clone(),
            features,
            action_values,
        }
    }

    /// The grid the cache was built for.
    #[must_use]
    pub const fn grid(&self) -> &Grid {
        &self.grid
    }

    /// Continuous action per flat action bin.
    #[must_use]
    pub fn action_values(&self) -> &[Vec<f64>] {
        &self.action_values
    }

    /// Feature rows pairing one continuous state with every action bin.
    ///
    /// # Errors
    ///
    /// Returns [`LearnError::DimensionMismatch`] if `state` has the
    /// wrong arity.
    pub fn features_for_state(&self, state: &[f64]) -> Result<Vec<Vec<f64>>> {
        if state.len() != self.grid.state_dims() {
            return Err(LearnError::DimensionMismatch {
                expected: self.grid.state_dims(),
                actual: state.len(),
            });
        }
        Ok(self
            .action_values
            .iter()
            .map(|action| {
                let mut row = state.to_vec();
                row.extend_from_slice(action);
                row
            })
            .collect())
    }

    /// Evaluates the surrogate over every grid cell.
    ///
    /// # Errors
    ///
    /// Propagates surrogate prediction errors.
    pub fn predict_q<S: Surrogate>(&self, surrogate: &S) -> Result<QPrediction> {
        let q_shape = self.grid.q_shape();
        let predictions = surrogate.predict_batch(&self.features)?;
        let mean = predictions.iter().map(|p| p.mean).collect();
        let std = predictions.iter().map(|p| p.std).collect();
        Ok(QPrediction {
            mean: DenseGrid::from_vec(&q_shape, mean).map_err(LearnError::from)?,
            std: DenseGrid::from_vec(&q_shape, std).map_err(LearnError::from)?,
        })
    }

    /// Cells whose lower confidence bound clears `threshold`.
    ///
    /// The bound is `mean - z * std` with `z = probit(confidence)`.
    #[must_use]
    pub fn safe_level_set(
        prediction: &QPrediction,
        confidence: f64,
        threshold: f64,
    ) -> DenseGrid<bool> {
        let z = probit(confidence);
        let mean = prediction.mean.as_slice();
        let std = prediction.std.as_slice();
        let data = mean
            .iter()
            .zip(std)
            .map(|(&m, &s)| z.mul_add(-s, m) > threshold)
            .collect();
        // Shapes come from the same prediction, so from_vec cannot fail.
        DenseGrid::from_vec(prediction.mean.shape(), data)
            .unwrap_or_else(|_| prediction.mean.map(|_| false))
    }

    /// Full set of learned estimates at the given thresholds.
    ///
    /// # Errors
    ///
    /// Propagates surrogate prediction errors.
    pub fn learned_sets<S: Surrogate>(
        &self,
        surrogate: &S,
        thresholds: &Thresholds,
    ) -> Result<LearnedSets> {
        let prediction = self.predict_q(surrogate)?;
        let q_m = prediction.mean.map(|&m| m.clamp(0.0, 1.0));
        let s_m = project_q2s(&self.grid, &q_m)?;
        let q_v = Self::safe_level_set(
            &prediction,
            thresholds.measure_confidence,
            thresholds.safety_threshold,
        );

        let num_actions = self.grid.num_action_bins();
        let s_v_data = q_v
            .as_slice()
            .chunks_exact(num_actions)
            .map(|block| block.iter().any(|&v| v))
            .collect();

        Ok(LearnedSets {
            q_m,
            s_m,
            q_v,
            s_v: DenseGrid::from_vec(&self.grid.state_shape(), s_v_data)
                .map_err(LearnError::from)?,
        })
    }
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
