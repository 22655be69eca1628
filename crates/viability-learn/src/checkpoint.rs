//! Checkpointing of sampler progress to JSON files.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use viability_grid::{DenseGrid, Grid};

use crate::error::Result;
use crate::estimation::{Estimation, LearnedSets};
use crate::sampler::{FailedSample, MeasureLearner, SamplerObserver};
use crate::schedule::Thresholds;
use crate::surrogate::Surrogate;

/// A snapshot of the learner mid-run, with optional ground truth for
/// error reporting.
///
/// Everything a plotting or analysis script needs to reconstruct the
/// state of the estimate at one iteration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointBundle {
    /// Iteration the snapshot was taken after (0-indexed).
    pub iteration: usize,
    /// Thresholds in force at that iteration.
    pub thresholds: Thresholds,
    /// The grid all arrays are shaped by.
    pub grid: Grid,
    /// Learned measure and kernel estimates.
    pub learned: LearnedSets,
    /// Cells the sampler would consider safe to explore: lower bound
    /// above zero at the exploration confidence (`Q_V_exp`).
    pub q_v_exp: DenseGrid<bool>,
    /// Failed samples accumulated so far.
    pub failed_samples: Vec<FailedSample>,
    /// Brute-force state measure, when available.
    pub s_m_true: Option<DenseGrid<f64>>,
    /// Brute-force viable cells, when available.
    pub q_v_true: Option<DenseGrid<bool>>,
}

impl CheckpointBundle {
    /// Snapshots a learner at the given iteration.
    ///
    /// # Errors
    ///
    /// Propagates surrogate prediction errors.
    pub fn from_learner<S: Surrogate>(
        learner: &MeasureLearner<'_, S>,
        iteration: usize,
        thresholds: &Thresholds,
    ) -> Result<Self> {
        let prediction = learner.estimation().predict_q(learner.surrogate())?;
        let q_v_exp =
            Estimation::safe_level_set(&prediction, thresholds.exploration_confidence, 0.0);
        Ok(Self {
            iteration,
            thresholds: *thresholds,
            grid: learner.grid().clone(),
            learned: learner.learned_sets(thresholds)?,
            q_v_exp,
            failed_samples: learner.failed_samples().to_vec(),
            s_m_true: None,
            q_v_true: None,
        })
    }

    /// Attaches brute-force ground truth for error reporting.
    #[must_use]
    pub fn with_ground_truth(
        mut self,
        s_m_true: DenseGrid<f64>,
        q_v_true: DenseGrid<bool>,
    ) -> Self {
        self.s_m_true = Some(s_m_true);
        self.q_v_true = Some(q_v_true);
        self
    }

    /// Mean absolute error of the state-measure estimate against the
    /// attached ground truth, if any.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn measure_error(&self) -> Option<f64> {
        let truth = self.s_m_true.as_ref()?;
        if truth.shape() != self.learned.s_m.shape() {
            return None;
        }
        let total: f64 = truth
            .as_slice()
            .iter()
            .zip(self.learned.s_m.as_slice())
            .map(|(&t, &e)| (t - e).abs())
            .sum();
        Some(total / truth.len() as f64)
    }

    /// Writes the bundle as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns [`crate::LearnError::Io`] or [`crate::LearnError::Json`]
    /// on failure.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Reads a bundle back from JSON.
    ///
    /// # Errors
    ///
    /// Returns [`crate::LearnError::Io`] or [`crate::LearnError::Json`]
    /// on failure.
    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}

/// Observer that writes a [`CheckpointBundle`] at the first iteration,
/// every `every` iterations after, and at the final iteration of the run.
///
/// Write failures are logged and skipped; a checkpoint must never abort
/// a sampling run.
#[derive(Debug, Clone)]
pub struct CheckpointObserver {
    dir: PathBuf,
    every: usize,
    s_m_true: Option<DenseGrid<f64>>,
    q_v_true: Option<DenseGrid<bool>>,
    written: Vec<PathBuf>,
}

impl CheckpointObserver {
    /// Creates an observer writing into `dir` every `every` iterations.
    ///
    /// # Panics
    ///
    /// Panics if `every` is zero.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>, every: usize) -> Self {
        assert!(every > 0, "checkpoint interval must be positive");
        Self {
            dir: dir.into(),
            every,
            s_m_true: None,
            q_v_true: None,
            written: Vec::new(),
        }
    }

    /// Attaches ground truth to every written checkpoint.
    #[must_use]
    pub fn with_ground_truth(
        mut self,
        s_m_true: DenseGrid<f64>,
        q_v_true: DenseGrid<bool>,
    ) -> Self {
        self.s_m_true = Some(s_m_true);
        self.q_v_true = Some(q_v_true);
        self
    }

    /// Paths written so far.
    #[must_use]
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }
}

impl<S: Surrogate> SamplerObserver<S> for CheckpointObserver {
    fn on_iteration(
        &mut self,
        learner: &MeasureLearner<'_, S>,
        iteration: usize,
        thresholds: &Thresholds,
    ) {
        let last = learner.config().n_samples.saturating_sub(1);
        if iteration % self.every != 0 && iteration != last {
            return;
        }
        let bundle = match CheckpointBundle::from_learner(learner, iteration, thresholds) {
            Ok(bundle) => bundle,
            Err(err) => {
                warn!(iteration, %err, "skipping checkpoint, snapshot failed");
                return;
            }
        };
        let bundle = match (&self.s_m_true, &self.q_v_true) {
            (Some(s_m), Some(q_v)) => bundle.with_ground_truth(s_m.clone(), q_v.clone()),
            _ => bundle,
        };

        let path = self.dir.join(format!("checkpoint_{iteration:05}.json"));
        match bundle.save(&path) {
            Ok(()) => {
                info!(iteration, path = %path.display(), error = ?bundle.measure_error(), "checkpoint written");
                self.written.push(path);
            }
            Err(err) => warn!(iteration, %err, "skipping checkpoint, write failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gp::{GpHyperparams, GpSurrogate};
    use crate::sampler::{SamplerConfig, SeedData};
    use viability_dynamics::{PoincareMap, Transition};
    use viability_grid::Axis;

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
            _action: &[f64],
        ) -> viability_dynamics::Result<Transition> {
            Ok(Transition::success(state.to_vec()))
        }
    }

    fn learner() -> MeasureLearner<'static, GpSurrogate> {
        let grid = Grid::new(
            vec![Axis::linspace(0.1, 0.9, 5)],
            vec![Axis::linspace(0.0, 1.0, 5)],
        )
        .unwrap();
        let surrogate = GpSurrogate::new(GpHyperparams::isotropic(2, 0.3)).unwrap();
        let seed = SeedData {
            state: vec![0.5],
            action: vec![0.5],
            measure: 0.8,
        };
        MeasureLearner::new(
            &grid,
            &SelfMap,
            surrogate,
            SamplerConfig::new(4, vec![0.5]),
            &[seed],
        )
        .unwrap()
    }

    #[test]
    fn bundle_roundtrips_through_json() {
        let learner = learner();
        let thresholds = learner.config().thresholds_at(0);
        let bundle = CheckpointBundle::from_learner(&learner, 0, &thresholds).unwrap();

        let json = serde_json::to_string(&bundle).unwrap();
        let back: CheckpointBundle = serde_json::from_str(&json).unwrap();
        assert_eq!(back, bundle);
    }

    #[test]
    fn bundle_carries_the_exploration_safe_set() {
        let learner = learner();
        let thresholds = learner.config().thresholds_at(0);
        let bundle = CheckpointBundle::from_learner(&learner, 0, &thresholds).unwrap();

        assert_eq!(bundle.q_v_exp.shape(), learner.grid().q_shape().as_slice());
        // The persisted set matches a fresh evaluation at the same
        // confidence, thresholded at zero.
        let prediction = learner
            .estimation()
            .predict_q(learner.surrogate())
            .unwrap();
        let expected =
            Estimation::safe_level_set(&prediction, thresholds.exploration_confidence, 0.0);
        assert_eq!(bundle.q_v_exp, expected);
        // The seed sits at a known-viable cell, so something is explorable.
        assert!(bundle.q_v_exp.any());
    }

    #[test]
    fn measure_error_needs_ground_truth() {
        let learner = learner();
        let thresholds = learner.config().thresholds_at(0);
        let bundle = CheckpointBundle::from_learner(&learner, 0, &thresholds).unwrap();
        assert!(bundle.measure_error().is_none());

        let truth = bundle.learned.s_m.clone();
        let q_v = bundle.learned.q_v.clone();
        let with_truth = bundle.with_ground_truth(truth, q_v);
        let error = with_truth.measure_error().unwrap();
        assert!(error.abs() < 1e-12, "error against itself should vanish");
    }

    #[test]
    fn bundle_saves_and_loads() {
        let learner = learner();
        let thresholds = learner.config().thresholds_at(0);
        let bundle = CheckpointBundle::from_learner(&learner, 0, &thresholds).unwrap();

        let path =
            std::env::temp_dir().join(format!("viability-checkpoint-{}.json", std::process::id()));
        bundle.save(&path).unwrap();
        let back = CheckpointBundle::load(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(back, bundle);
    }

    #[test]
    fn observer_writes_on_the_interval() {
        let dir = std::env::temp_dir().join(format!("viability-ckpt-dir-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        let mut learner = learner();
        let mut observer = CheckpointObserver::new(&dir, 2);
        learner.run(&mut observer).unwrap();

        // 4 iterations, interval 2: iterations 0 and 2 are on the
        // interval, plus the final iteration 3.
        assert_eq!(observer.written().len(), 3);
        for path in observer.written() {
            assert!(path.exists());
        }
        let names: Vec<_> = observer
            .written()
            .iter()
            .filter_map(|p| p.file_name())
            .collect();
        assert_eq!(
            names,
            [
                "checkpoint_00000.json",
                "checkpoint_00002.json",
                "checkpoint_00003.json"
            ]
        );
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    #[should_panic(expected = "interval must be positive")]
    fn observer_rejects_zero_interval() {
        let _ = CheckpointObserver::new("/tmp", 0);
    }
}
