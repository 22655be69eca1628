//! End-to-end brute-force pass over the apex hopper model.

use approx::assert_relative_eq;
use viability_dynamics::{ApexHopper, SlipParams};
use viability_grid::{Axis, Grid};
use viability_solver::{
    compute_measure, compute_q_map, compute_viable_set, validate_viable_set, GroundTruthBundle,
};

/// Canonical experiment grid: 9 apex heights, 11 touchdown angles.
fn canonical_grid() -> Grid {
    Grid::new(
        vec![Axis::linspace(0.1, 0.9, 9)],
        vec![Axis::linspace((-10.0_f64).to_radians(), 90.0_f64.to_radians(), 11)],
    )
    .unwrap()
}

fn model() -> ApexHopper {
    ApexHopper::new(SlipParams::default()).unwrap()
}

#[test]
fn every_apex_height_is_viable() {
    let qmap = compute_q_map(&canonical_grid(), &model()).unwrap();
    let viable = compute_viable_set(&qmap).unwrap();

    assert!(viable.converged());
    assert_eq!(viable.s_v().count_true(), 9);
    assert_relative_eq!(viable.viable_fraction(), 1.0);
}

#[test]
fn kernel_equals_non_failed_cells_when_all_states_viable() {
    // Hopper successors stay well inside the apex-height range, so once
    // every state is viable the kernel is exactly the non-failed set.
    let qmap = compute_q_map(&canonical_grid(), &model()).unwrap();
    let viable = compute_viable_set(&qmap).unwrap();

    let not_failed = qmap.failed().map(|&f| !f);
    assert_eq!(viable.q_v(), &not_failed);
    assert!(validate_viable_set(&qmap, &viable).is_ok());
}

#[test]
fn low_apex_states_have_few_viable_actions() {
    let qmap = compute_q_map(&canonical_grid(), &model()).unwrap();
    let viable = compute_viable_set(&qmap).unwrap();
    let measure = compute_measure(&qmap, &viable).unwrap();

    // At apex 0.1 only the two steepest angles clear the touchdown
    // height; at 0.2 the three steepest do.
    assert_relative_eq!(*measure.s_m().get(&[0]), 2.0 / 11.0);
    assert_relative_eq!(*measure.s_m().get(&[1]), 3.0 / 11.0);
    assert!(measure.mean() > 0.0 && measure.mean() < 1.0);
}

#[test]
fn failed_cells_carry_zero_measure() {
    let qmap = compute_q_map(&canonical_grid(), &model()).unwrap();
    let viable = compute_viable_set(&qmap).unwrap();
    let measure = compute_measure(&qmap, &viable).unwrap();

    for s in 0..9 {
        for a in 0..11 {
            if qmap.failed_flat(s, a) {
                assert_relative_eq!(*measure.q_m().get(&[s, a]), 0.0);
            } else {
                assert!(*measure.q_m().get(&[s, a]) > 0.0);
            }
        }
    }
}

#[test]
fn cell_measure_follows_the_successor() {
    let grid = canonical_grid();
    let qmap = compute_q_map(&grid, &model()).unwrap();
    let viable = compute_viable_set(&qmap).unwrap();
    let measure = compute_measure(&qmap, &viable).unwrap();

    // Apex 0.1 under the steepest angle relaxes toward 0.14, which
    // digitizes back to the lowest apex bin.
    let steepest = 10;
    assert!(!qmap.failed_flat(0, steepest));
    assert_relative_eq!(
        *measure.q_m().get(&[0, steepest]),
        *measure.s_m().get(&[0])
    );
}

#[test]
fn bundle_round_trips_through_json() {
    let qmap = compute_q_map(&canonical_grid(), &model()).unwrap();
    let bundle = GroundTruthBundle::from_q_map(&qmap).unwrap();

    let json = serde_json::to_string(&bundle).unwrap();
    let back: GroundTruthBundle = serde_json::from_str(&json).unwrap();
    assert_eq!(back, bundle);
    assert_eq!(back.s_v.count_true(), 9);
}
