//! Safe active sampling of the viability measure.
//!
//! The learner walks the system itself: each iteration it queries the
//! surrogate over every action at its current state, picks the most
//! informative action whose lower confidence bound clears the safety
//! threshold, executes it on the real dynamics, and refits. Failures
//! are recorded with a penalized target and reset the walk to the
//! initial state.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use viability_dynamics::PoincareMap;
use viability_grid::Grid;

use crate::error::{LearnError, Result};
use crate::estimation::{probit, Estimation, LearnedSets};
use crate::schedule::{ThresholdSchedule, Thresholds};
use crate::surrogate::Surrogate;

/// Scores closer than this count as tied and are broken at random.
const TIE_EPSILON: f64 = 1e-12;

/// Configuration of an active sampling run.
///
/// Confidence schedules anneal over the run: exploration typically stays
/// tight throughout, while the measure confidence tightens and the
/// safety threshold relaxes toward the true boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplerConfig {
    /// Number of dynamics evaluations to spend.
    pub n_samples: usize,

    /// Seed for the sampler's tie-breaking RNG.
    pub rng_seed: u64,

    /// State the walk starts from and resets to after failures.
    pub initial_state: Vec<f64>,

    /// Magnitude of the negative target recorded for failed samples.
    pub failure_penalty: f64,

    /// Whether the surrogate re-tunes its hyperparameters while fitting.
    pub learn_hyperparameters: bool,

    /// Confidence gating which actions are safe to try.
    pub exploration_confidence: ThresholdSchedule,

    /// Confidence of the reported kernel estimate.
    pub measure_confidence: ThresholdSchedule,

    /// Minimum lower-bound measure for an action to count as safe.
    pub safety_threshold: ThresholdSchedule,
}

impl SamplerConfig {
    /// Creates a configuration with default schedules.
    #[must_use]
    pub fn new(n_samples: usize, initial_state: Vec<f64>) -> Self {
        Self {
            n_samples,
            rng_seed: 0,
            initial_state,
            failure_penalty: 0.1,
            learn_hyperparameters: false,
            exploration_confidence: ThresholdSchedule::constant(0.999),
            measure_confidence: ThresholdSchedule::new(0.8, 0.999),
            safety_threshold: ThresholdSchedule::new(0.1, 0.0),
        }
    }

    /// Sets the RNG seed.
    #[must_use]
    pub const fn with_rng_seed(mut self, rng_seed: u64) -> Self {
        self.rng_seed = rng_seed;
        self
    }

    /// Sets the failure penalty.
    #[must_use]
    pub const fn with_failure_penalty(mut self, failure_penalty: f64) -> Self {
        self.failure_penalty = failure_penalty;
        self
    }

    /// Enables or disables hyperparameter re-tuning.
    #[must_use]
    pub const fn with_learn_hyperparameters(mut self, learn: bool) -> Self {
        self.learn_hyperparameters = learn;
        self
    }

    /// Sets the exploration confidence schedule.
    #[must_use]
    pub const fn with_exploration_confidence(mut self, schedule: ThresholdSchedule) -> Self {
        self.exploration_confidence = schedule;
        self
    }

    /// Sets the measure confidence schedule.
    #[must_use]
    pub const fn with_measure_confidence(mut self, schedule: ThresholdSchedule) -> Self {
        self.measure_confidence = schedule;
        self
    }

    /// Sets the safety threshold schedule.
    #[must_use]
    pub const fn with_safety_threshold(mut self, schedule: ThresholdSchedule) -> Self {
        self.safety_threshold = schedule;
        self
    }

    /// Checks that the configuration is internally consistent.
    ///
    /// # Errors
    ///
    /// Returns [`LearnError::Config`] describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        if self.initial_state.is_empty() {
            return Err(LearnError::config("initial state is empty"));
        }
        if self.initial_state.iter().any(|v| !v.is_finite()) {
            return Err(LearnError::config("initial state has non-finite components"));
        }
        if !self.failure_penalty.is_finite() || self.failure_penalty < 0.0 {
            return Err(LearnError::config("failure penalty must be finite and >= 0"));
        }
        self.exploration_confidence
            .validate("exploration confidence")?;
        self.measure_confidence.validate("measure confidence")?;
        self.safety_threshold.validate("safety threshold")?;
        for (name, schedule) in [
            ("exploration confidence", &self.exploration_confidence),
            ("measure confidence", &self.measure_confidence),
        ] {
            for endpoint in [schedule.start, schedule.end] {
                if !(0.0..1.0).contains(&endpoint) || endpoint == 0.0 {
                    return Err(LearnError::config(format!(
                        "{name} must stay inside (0, 1), got {endpoint}"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Thresholds resolved for one iteration of this run.
    #[must_use]
    pub fn thresholds_at(&self, iteration: usize) -> Thresholds {
        Thresholds {
            exploration_confidence: self
                .exploration_confidence
                .value_at(iteration, self.n_samples),
            measure_confidence: self.measure_confidence.value_at(iteration, self.n_samples),
            safety_threshold: self.safety_threshold.value_at(iteration, self.n_samples),
        }
    }
}

/// One known-viable data point to initialize the surrogate with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeedData {
    /// Continuous state of the seed sample.
    pub state: Vec<f64>,
    /// Continuous action of the seed sample.
    pub action: Vec<f64>,
    /// Known measure value at the seed, in `(0, 1]`.
    pub measure: f64,
}

/// A state-action pair whose execution failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedSample {
    /// State the action was taken from.
    pub state: Vec<f64>,
    /// The failing action.
    pub action: Vec<f64>,
}

/// Summary of a finished sampling run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    /// Dynamics evaluations spent.
    pub evaluations: usize,
    /// Evaluations that ended in failure.
    pub failures: usize,
    /// Thresholds in force at the last iteration.
    pub final_thresholds: Thresholds,
}

impl RunReport {
    /// Fraction of evaluations that failed.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn failure_rate(&self) -> f64 {
        if self.evaluations == 0 {
            0.0
        } else {
            self.failures as f64 / self.evaluations as f64
        }
    }
}

/// Callback invoked after every sampler iteration.
///
/// Observers snapshot estimates, write checkpoints, or drive progress
/// reporting; [`NoopObserver`] does nothing.
pub trait SamplerObserver<S: Surrogate> {
    /// Called once per iteration, after the refit.
    fn on_iteration(
        &mut self,
        learner: &MeasureLearner<'_, S>,
        iteration: usize,
        thresholds: &Thresholds,
    );
}

/// Observer that ignores every iteration.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl<S: Surrogate> SamplerObserver<S> for NoopObserver {
    fn on_iteration(
        &mut self,
        _learner: &MeasureLearner<'_, S>,
        _iteration: usize,
        _thresholds: &Thresholds,
    ) {
    }
}

/// Active learner of the viability measure.
///
/// Owns the surrogate and the accumulated data; borrows the dynamics
/// model it samples from.
pub struct MeasureLearner<'m, S> {
    config: SamplerConfig,
    model: &'m dyn PoincareMap,
    estimation: Estimation,
    surrogate: S,
    rng: StdRng,
    train_x: Vec<Vec<f64>>,
    train_y: Vec<f64>,
    failed_samples: Vec<FailedSample>,
    current_state: Vec<f64>,
    evaluations: usize,
    failures: usize,
}

impl<S> std::fmt::Debug for MeasureLearner<'_, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MeasureLearner").finish_non_exhaustive()
    }
}

impl<'m, S: Surrogate> MeasureLearner<'m, S> {
    /// Creates a learner and fits the surrogate on the seed data.
    ///
    /// # Errors
    ///
    /// Returns [`LearnError::Config`] for invalid configurations,
    /// [`LearnError::DimensionMismatch`] when the model does not match
    /// the grid, and [`LearnError::InvalidSeed`] when no usable seed is
    /// provided.
    pub fn new(
        grid: &Grid,
        model: &'m dyn PoincareMap,
        surrogate: S,
        config: SamplerConfig,
        seeds: &[SeedData],
    ) -> Result<Self> {
        config.validate()?;
        if model.state_dims() != grid.state_dims() {
            return Err(LearnError::DimensionMismatch {
                expected: grid.state_dims(),
                actual: model.state_dims(),
            });
        }
        if model.action_dims() != grid.action_dims() {
            return Err(LearnError::DimensionMismatch {
                expected: grid.action_dims(),
                actual: model.action_dims(),
            });
        }
        if config.initial_state.len() != grid.state_dims() {
            return Err(LearnError::DimensionMismatch {
                expected: grid.state_dims(),
                actual: config.initial_state.len(),
            });
        }
        if seeds.is_empty() {
            return Err(LearnError::invalid_seed("no seed data"));
        }

        let mut train_x = Vec::with_capacity(seeds.len());
        let mut train_y = Vec::with_capacity(seeds.len());
        for seed in seeds {
            if seed.state.len() != grid.state_dims() || seed.action.len() != grid.action_dims() {
                return Err(LearnError::invalid_seed(
                    "seed state or action arity does not match the grid",
                ));
            }
            if !seed.measure.is_finite() || seed.measure <= 0.0 {
                return Err(LearnError::invalid_seed(format!(
                    "seed measure must be finite and > 0, got {}",
                    seed.measure
                )));
            }
            let mut row = seed.state.clone();
            row.extend_from_slice(&seed.action);
            train_x.push(row);
            train_y.push(seed.measure);
        }

        let mut learner = Self {
            rng: StdRng::seed_from_u64(config.rng_seed),
            current_state: config.initial_state.clone(),
            estimation: Estimation::new(grid),
            model,
            surrogate,
            train_x,
            train_y,
            failed_samples: Vec::new(),
            evaluations: 0,
            failures: 0,
            config,
        };
        learner.refit()?;
        Ok(learner)
    }

    /// The sampling configuration.
    #[must_use]
    pub const fn config(&self) -> &SamplerConfig {
        &self.config
    }

    /// The grid being learned over.
    #[must_use]
    pub const fn grid(&self) -> &Grid {
        self.estimation.grid()
    }

    /// The fitted surrogate.
    #[must_use]
    pub const fn surrogate(&self) -> &S {
        &self.surrogate
    }

    /// The cached cell features.
    #[must_use]
    pub const fn estimation(&self) -> &Estimation {
        &self.estimation
    }

    /// State the walk currently sits at.
    #[must_use]
    pub fn current_state(&self) -> &[f64] {
        &self.current_state
    }

    /// State-action pairs that failed so far.
    #[must_use]
    pub fn failed_samples(&self) -> &[FailedSample] {
        &self.failed_samples
    }

    /// Accumulated training data (feature rows and targets).
    #[must_use]
    pub fn training_data(&self) -> (&[Vec<f64>], &[f64]) {
        (&self.train_x, &self.train_y)
    }

    /// Dynamics evaluations spent so far.
    #[must_use]
    pub const fn evaluations(&self) -> usize {
        self.evaluations
    }

    /// Evaluations that ended in failure.
    #[must_use]
    pub const fn failures(&self) -> usize {
        self.failures
    }

    /// Learned estimates at the given thresholds.
    ///
    /// # Errors
    ///
    /// Propagates surrogate prediction errors.
    pub fn learned_sets(&self, thresholds: &Thresholds) -> Result<LearnedSets> {
        self.estimation.learned_sets(&self.surrogate, thresholds)
    }

    /// Runs one sampling iteration: select, execute, record, refit.
    ///
    /// Returns the thresholds that were in force.
    ///
    /// # Errors
    ///
    /// Propagates surrogate errors. Dynamics failures are recorded as
    /// data, never returned.
    pub fn step(&mut self, iteration: usize) -> Result<Thresholds> {
        let thresholds = self.config.thresholds_at(iteration);
        let features = self.estimation.features_for_state(&self.current_state)?;
        let predictions = self.surrogate.predict_batch(&features)?;
        let z = probit(thresholds.exploration_confidence);

        let safe: Vec<usize> = (0..predictions.len())
            .filter(|&i| predictions[i].lower_bound(z) > thresholds.safety_threshold)
            .collect();
        let chosen = if safe.is_empty() {
            // Nothing clears the bar; retreat to the most confident cell.
            warn!(iteration, "no safe action at current state");
            let all: Vec<usize> = (0..predictions.len()).collect();
            pick_max(&mut self.rng, &all, |i| predictions[i].lower_bound(z))
        } else {
            pick_max(&mut self.rng, &safe, |i| predictions[i].std)
        };
        let action = self.estimation.action_values()[chosen].clone();

        let successor = match self.model.poincare_map(&self.current_state, &action) {
            Ok(transition) => transition.next_state().map(<[f64]>::to_vec),
            Err(err) => {
                debug!(iteration, %err, "dynamics evaluation errored");
                None
            }
        };
        let (target, next_state) = match successor {
            Some(next) => {
                let measure = self.estimate_state_measure(&next)?;
                (measure, next)
            }
            None => {
                self.failed_samples.push(FailedSample {
                    state: self.current_state.clone(),
                    action: action.clone(),
                });
                self.failures += 1;
                (
                    -self.config.failure_penalty,
                    self.config.initial_state.clone(),
                )
            }
        };

        self.train_x.push(features[chosen].clone());
        self.train_y.push(target);
        self.refit()?;
        self.current_state = next_state;
        self.evaluations += 1;
        Ok(thresholds)
    }

    /// Runs the configured number of iterations, notifying `observer`
    /// after each one.
    ///
    /// # Errors
    ///
    /// Propagates the first surrogate error.
    pub fn run<O: SamplerObserver<S>>(&mut self, observer: &mut O) -> Result<RunReport> {
        info!(
            n_samples = self.config.n_samples,
            seeds = self.train_x.len(),
            "starting active sampling"
        );
        for iteration in 0..self.config.n_samples {
            let thresholds = self.step(iteration)?;
            observer.on_iteration(self, iteration, &thresholds);
        }

        let report = RunReport {
            evaluations: self.evaluations,
            failures: self.failures,
            final_thresholds: self
                .config
                .thresholds_at(self.config.n_samples.saturating_sub(1)),
        };
        info!(
            evaluations = report.evaluations,
            failures = report.failures,
            failure_rate = report.failure_rate(),
            "active sampling finished"
        );
        Ok(report)
    }

    /// Current estimate of the state measure at a continuous state.
    ///
    /// Averages the clamped predictive mean over the digitized bin and
    /// its grid neighbors, smoothing states that fall between bins.
    fn estimate_state_measure(&self, state: &[f64]) -> Result<f64> {
        let grid = self.estimation.grid();
        let bin = grid.digitize_state(state)?;
        let neighbors = grid.neighbors(&bin);

        let mut total = 0.0;
        for neighbor in &neighbors {
            let features = self
                .estimation
                .features_for_state(&grid.state_value(neighbor))?;
            let predictions = self.surrogate.predict_batch(&features)?;
            #[allow(clippy::cast_precision_loss)]
            let mean = predictions
                .iter()
                .map(|p| p.mean.clamp(0.0, 1.0))
                .sum::<f64>()
                / predictions.len() as f64;
            total += mean;
        }
        #[allow(clippy::cast_precision_loss)]
        Ok(total / neighbors.len() as f64)
    }

    fn refit(&mut self) -> Result<()> {
        if self.config.learn_hyperparameters {
            self.surrogate.fit_tuned(&self.train_x, &self.train_y)
        } else {
            self.surrogate.fit(&self.train_x, &self.train_y)
        }
    }
}

/// Index with the highest score; ties within [`TIE_EPSILON`] are broken
/// uniformly at random.
fn pick_max(rng: &mut StdRng, candidates: &[usize], score: impl Fn(usize) -> f64) -> usize {
    debug_assert!(!candidates.is_empty());
    let mut best = f64::NEG_INFINITY;
    let mut ties: Vec<usize> = Vec::new();
    for &i in candidates {
        let s = score(i);
        if s > best + TIE_EPSILON {
            best = s;
            ties.clear();
            ties.push(i);
        } else if (s - best).abs() <= TIE_EPSILON {
            ties.push(i);
        }
    }
    ties[rng.gen_range(0..ties.len())]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gp::{GpHyperparams, GpSurrogate};
    use viability_dynamics::Transition;
    use viability_grid::Axis;

    /// Stays put for actions inside [0, 1]; everything else fails.
    struct SafeBand;

    impl PoincareMap for SafeBand {
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
            if (0.0..=1.0).contains(&action[0]) {
                Ok(Transition::success(state.to_vec()))
            } else {
                Ok(Transition::Failure)
            }
        }
    }

    struct AlwaysFail;

    impl PoincareMap for AlwaysFail {
        fn state_dims(&self) -> usize {
            1
        }

        fn action_dims(&self) -> usize {
            1
        }

        fn poincare_map(
            &self,
            _state: &[f64],
            _action: &[f64],
        ) -> viability_dynamics::Result<Transition> {
            Ok(Transition::Failure)
        }
    }

    fn grid() -> Grid {
        Grid::new(
            vec![Axis::linspace(0.1, 0.9, 5)],
            vec![Axis::linspace(-0.5, 1.5, 9)],
        )
        .unwrap()
    }

    fn surrogate() -> GpSurrogate {
        GpSurrogate::new(GpHyperparams::isotropic(2, 0.3).with_prior_mean(0.3)).unwrap()
    }

    fn seed() -> SeedData {
        SeedData {
            state: vec![0.5],
            action: vec![0.5],
            measure: 0.8,
        }
    }

    fn learner(config: SamplerConfig) -> MeasureLearner<'static, GpSurrogate> {
        MeasureLearner::new(&grid(), &SafeBand, surrogate(), config, &[seed()]).unwrap()
    }

    /// Observer counting its invocations.
    #[derive(Default)]
    struct Counting {
        calls: usize,
    }

    impl<S: Surrogate> SamplerObserver<S> for Counting {
        fn on_iteration(
            &mut self,
            _learner: &MeasureLearner<'_, S>,
            _iteration: usize,
            _thresholds: &Thresholds,
        ) {
            self.calls += 1;
        }
    }

    #[test]
    fn config_validation() {
        assert!(SamplerConfig::new(10, vec![0.5]).validate().is_ok());
        assert!(SamplerConfig::new(10, vec![]).validate().is_err());
        assert!(SamplerConfig::new(10, vec![f64::NAN]).validate().is_err());
        assert!(SamplerConfig::new(10, vec![0.5])
            .with_failure_penalty(-1.0)
            .validate()
            .is_err());
        assert!(SamplerConfig::new(10, vec![0.5])
            .with_measure_confidence(ThresholdSchedule::new(0.8, 1.5))
            .validate()
            .is_err());
    }

    #[test]
    fn rejects_bad_seeds() {
        let err = MeasureLearner::new(
            &grid(),
            &SafeBand,
            surrogate(),
            SamplerConfig::new(5, vec![0.5]),
            &[],
        )
        .unwrap_err();
        assert!(matches!(err, LearnError::InvalidSeed(_)));

        let bad = SeedData {
            measure: 0.0,
            ..seed()
        };
        let err = MeasureLearner::new(
            &grid(),
            &SafeBand,
            surrogate(),
            SamplerConfig::new(5, vec![0.5]),
            &[bad],
        )
        .unwrap_err();
        assert!(matches!(err, LearnError::InvalidSeed(_)));
    }

    #[test]
    fn rejects_model_grid_mismatch() {
        struct TwoAction;
        impl PoincareMap for TwoAction {
            fn state_dims(&self) -> usize {
                1
            }
            fn action_dims(&self) -> usize {
                2
            }
            fn poincare_map(
                &self,
                _: &[f64],
                _: &[f64],
            ) -> viability_dynamics::Result<Transition> {
                Ok(Transition::Failure)
            }
        }
        let err = MeasureLearner::new(
            &grid(),
            &TwoAction,
            surrogate(),
            SamplerConfig::new(5, vec![0.5]),
            &[seed()],
        )
        .unwrap_err();
        assert!(matches!(err, LearnError::DimensionMismatch { .. }));
    }

    #[test]
    fn spends_exactly_the_sample_budget() {
        let mut learner = learner(SamplerConfig::new(10, vec![0.5]).with_rng_seed(7));
        let mut observer = Counting::default();
        let report = learner.run(&mut observer).unwrap();

        assert_eq!(report.evaluations, 10);
        assert_eq!(observer.calls, 10);
        assert_eq!(learner.training_data().0.len(), 11); // seed + samples
        assert!(report.failure_rate() >= 0.0 && report.failure_rate() <= 1.0);
    }

    #[test]
    fn zero_sample_run_reports_seed_only_fit() {
        let mut learner = learner(SamplerConfig::new(0, vec![0.5]));
        let report = learner.run(&mut NoopObserver).unwrap();

        assert_eq!(report.evaluations, 0);
        assert_eq!(report.failures, 0);
        let sets = learner
            .learned_sets(&learner.config().thresholds_at(0))
            .unwrap();
        assert_eq!(sets.s_m.len(), 5);
    }

    #[test]
    fn failures_reset_the_walk() {
        let config = SamplerConfig::new(5, vec![0.5])
            .with_rng_seed(3)
            .with_failure_penalty(0.2);
        let mut learner =
            MeasureLearner::new(&grid(), &AlwaysFail, surrogate(), config, &[seed()]).unwrap();
        let report = learner.run(&mut NoopObserver).unwrap();

        assert_eq!(report.failures, 5);
        assert_eq!(learner.failed_samples().len(), 5);
        assert_eq!(learner.current_state(), &[0.5]);
        // Every recorded target carries the failure penalty.
        let (_, y) = learner.training_data();
        assert!(y[1..].iter().all(|&v| (v + 0.2).abs() < 1e-12));
    }

    #[test]
    fn runs_are_deterministic_for_a_fixed_seed() {
        let run = |rng_seed| {
            let mut l = learner(SamplerConfig::new(8, vec![0.5]).with_rng_seed(rng_seed));
            l.run(&mut NoopObserver).unwrap();
            l.training_data().1.to_vec()
        };
        assert_eq!(run(42), run(42));
    }

    #[test]
    fn thresholds_anneal_over_the_run() {
        let config = SamplerConfig::new(11, vec![0.5]);
        let first = config.thresholds_at(0);
        let last = config.thresholds_at(10);
        assert!(first.safety_threshold > last.safety_threshold);
        assert!(first.measure_confidence < last.measure_confidence);
    }

    #[test]
    fn pick_max_prefers_the_highest_score() {
        let mut rng = StdRng::seed_from_u64(0);
        let scores = [0.1, 0.9, 0.4];
        let chosen = pick_max(&mut rng, &[0, 1, 2], |i| scores[i]);
        assert_eq!(chosen, 1);
    }

    #[test]
    fn pick_max_breaks_ties_within_the_tied_set() {
        let mut rng = StdRng::seed_from_u64(1);
        let scores = [0.5, 0.5, 0.1];
        for _ in 0..20 {
            let chosen = pick_max(&mut rng, &[0, 1, 2], |i| scores[i]);
            assert!(chosen == 0 || chosen == 1);
        }
    }
}
