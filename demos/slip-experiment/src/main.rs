//! End-to-end SLIP viability experiment.
//!
//! Computes the brute-force ground truth for the apex hopper on the
//! canonical grid, then learns the same measure with 500 safely chosen
//! samples, checkpointing the estimate along the way. Pass an output
//! directory as the first argument (default `out/`).

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::info;
use viability_dynamics::{ApexHopper, SlipParams};
use viability_grid::{Axis, Grid};
use viability_learn::{
    CheckpointBundle, CheckpointObserver, GpHyperparams, GpSurrogate, MeasureLearner,
    SamplerConfig, SeedData, ThresholdSchedule,
};
use viability_solver::{
    compute_measure, compute_q_map, compute_viable_set, GroundTruthBundle,
};

/// Dynamics evaluations spent by the learner.
const N_SAMPLES: usize = 500;

/// Checkpoint interval in iterations.
const CHECKPOINT_EVERY: usize = 50;

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_target(false).init();

    let out_dir = std::env::args()
        .nth(1)
        .map_or_else(|| PathBuf::from("out"), PathBuf::from);
    fs::create_dir_all(&out_dir)
        .with_context(|| format!("creating output directory {}", out_dir.display()))?;

    // 9 apex heights, 11 touchdown angles, matching the published
    // experiment resolution.
    let grid = Grid::new(
        vec![Axis::linspace(0.1, 0.9, 9)],
        vec![Axis::linspace(
            (-10.0_f64).to_radians(),
            90.0_f64.to_radians(),
            11,
        )],
    )?;
    let model = ApexHopper::new(SlipParams::default())?;

    info!(cells = grid.num_q_cells(), "computing brute-force ground truth");
    let qmap = compute_q_map(&grid, &model)?;
    let viable = compute_viable_set(&qmap)?;
    let measure = compute_measure(&qmap, &viable)?;
    let truth = GroundTruthBundle::new(&qmap, &viable, &measure);

    let truth_path = out_dir.join("ground_truth.json");
    fs::write(&truth_path, serde_json::to_string_pretty(&truth)?)
        .with_context(|| format!("writing {}", truth_path.display()))?;
    info!(
        path = %truth_path.display(),
        viable_fraction = viable.viable_fraction(),
        mean_measure = measure.mean(),
        "ground truth saved"
    );

    // One known-viable hop seeds the surrogate: 38 degree touchdown at
    // apex 0.45 has a brute-force measure of 0.2.
    let seed = SeedData {
        state: vec![0.45],
        action: vec![38.0_f64.to_radians()],
        measure: 0.2,
    };
    let config = SamplerConfig::new(N_SAMPLES, vec![0.45])
        .with_rng_seed(42)
        .with_failure_penalty(0.1)
        .with_exploration_confidence(ThresholdSchedule::constant(0.999))
        .with_measure_confidence(ThresholdSchedule::new(0.8, 0.999))
        .with_safety_threshold(ThresholdSchedule::new(0.1, 0.0));
    let surrogate = GpSurrogate::new(
        GpHyperparams::isotropic(2, 0.3)
            .with_prior_mean(0.2)
            .with_noise_variance(1e-3),
    )?;

    info!(n_samples = N_SAMPLES, "starting safe active sampling");
    let mut learner = MeasureLearner::new(&grid, &model, surrogate, config, &[seed])?;
    let mut observer = CheckpointObserver::new(&out_dir, CHECKPOINT_EVERY)
        .with_ground_truth(measure.s_m().clone(), viable.q_v().clone());
    let report = learner.run(&mut observer)?;

    let last_iteration = N_SAMPLES.saturating_sub(1);
    let thresholds = learner.config().thresholds_at(last_iteration);
    let final_bundle = CheckpointBundle::from_learner(&learner, last_iteration, &thresholds)?
        .with_ground_truth(measure.s_m().clone(), viable.q_v().clone());
    let final_path = out_dir.join("final_estimate.json");
    final_bundle.save(&final_path)?;

    info!(
        evaluations = report.evaluations,
        failures = report.failures,
        failure_rate = report.failure_rate(),
        measure_error = ?final_bundle.measure_error(),
        checkpoints = observer.written().len(),
        path = %final_path.display(),
        "experiment finished"
    );
    Ok(())
}
