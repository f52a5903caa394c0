//! End-to-end self-calibration scenario.
//!
//! The simulated robot drives with wheels 15% smaller than the nominal
//! geometry the filters are configured with. Dead reckoning on the raw
//! odometry diverges; the filters must both localize better than the
//! unfiltered trajectory and pull their calibration estimates towards the
//! true factors, using nothing but the motion model's calibration coupling.

use manifold_kalman::filters::{Ekf, Iekf, KalmanFilter, Sekf, Ukfm};
use manifold_kalman::manifold::{LieGroup, Rn, SE2};
use manifold_kalman::models::{DiffDriveState, SystemModel};
use nalgebra::{DMatrix, DVector};

use scenario_utils::*;

type TestResult = Result<(), Box<dyn std::error::Error>>;

const STEPS: usize = 24_000; // 240 s at 100 Hz
const TRUE_CALIBRATION: [f64; 3] = [0.85, 0.85, 1.0];

/// Step index at which a converged filter must already beat dead reckoning
/// (20 s into the run).
const CHECKPOINT: usize = 2_000;

/// Window length for averaging the calibration covariance trace.
const WINDOW: usize = 2_000;

fn squeezed_truth() -> DiffDriveState {
    DiffDriveState::new(SE2::identity(), Rn::from_slice(&TRUE_CALIBRATION))
}

/// Prior for a filter that believes the nominal geometry but is told the
/// wheel radii are uncertain enough to adapt. The wheel-separation factor
/// stays pinned: under a constant control only two combinations of the
/// three factors are observable, and a loose third prior leaves a slow
/// drift direction that corrupts the radii estimates.
fn adaptive_covariance() -> DMatrix<f64> {
    DMatrix::from_diagonal(&DVector::from_column_slice(&[
        0.1, 0.1, 0.17, 0.01, 0.01, 1e-5,
    ]))
}

fn position_error(estimate: &DiffDriveState, truth: &DiffDriveState) -> f64 {
    (estimate.first().translation() - truth.first().translation()).norm()
}

fn calibration_trace(covariance: &DMatrix<f64>) -> f64 {
    covariance.view((3, 3), (3, 3)).trace()
}

fn check_filter<F: KalmanFilter<DiffDriveState>>(
    filter: &mut F,
    sc: &Scenario,
    steps: &[Step],
    dead_reckoning: &[DiffDriveState],
    name: &str,
) -> TestResult {
    let mut trace_windows = Vec::new();
    let mut window_sum = 0.0;
    for (i, step) in steps.iter().enumerate() {
        apply_step(filter, sc, step)?;
        window_sum += calibration_trace(&filter.covariance());
        if (i + 1) % WINDOW == 0 {
            trace_windows.push(window_sum / WINDOW as f64);
            window_sum = 0.0;
        }

        if i + 1 == CHECKPOINT {
            let filtered = position_error(filter.state(), &step.truth);
            let unfiltered = position_error(&dead_reckoning[i], &step.truth);
            assert!(
                filtered < unfiltered,
                "{name} had not converged after 20 s: {filtered} vs unfiltered {unfiltered}"
            );
        }
    }

    let truth = &steps[steps.len() - 1].truth;
    let error = position_error(filter.state(), truth);
    let unfiltered_error = position_error(&dead_reckoning[steps.len() - 1], truth);
    assert!(
        error < unfiltered_error,
        "{name} did not beat dead reckoning: {error} vs {unfiltered_error}"
    );
    assert!(error < 0.2, "{name} final position error too large: {error}");

    let calib = filter.state().second().vector();
    for (i, &k_true) in TRUE_CALIBRATION.iter().enumerate().take(2) {
        assert!(
            (calib[i] - k_true).abs() < 0.1,
            "{name} calibration factor {i} did not adapt: {} vs {k_true}",
            calib[i]
        );
    }

    // The calibration block carries no process noise and updates only
    // subtract, so its windowed average must never grow and must at least
    // halve over the run.
    for pair in trace_windows.windows(2) {
        assert!(
            pair[1] <= pair[0] * (1.0 + 1e-9),
            "{name} calibration uncertainty grew between windows: {} -> {}",
            pair[0],
            pair[1]
        );
    }
    let first = trace_windows[0];
    let last = trace_windows[trace_windows.len() - 1];
    assert!(
        last < 0.5 * first,
        "{name} calibration uncertainty did not shrink: {last} vs {first}"
    );
    Ok(())
}

#[test]
fn test_filters_beat_dead_reckoning_and_self_calibrate() -> TestResult {
    let sc = scenario(WHEEL_VARIANCE);
    let steps = simulate(&sc, &squeezed_truth(), STEPS, Some(1234));

    // Dead reckoning: integrate the measured controls with the believed
    // (uncorrected) nominal calibration, keeping the whole trajectory so
    // the filters can be compared against it at intermediate steps.
    let mut unfiltered = nominal_state();
    let dead_reckoning: Vec<DiffDriveState> = steps
        .iter()
        .map(|step| {
            unfiltered = sc.model.step(&unfiltered, &step.control, None, None);
            unfiltered.clone()
        })
        .collect();
    let truth = &steps[steps.len() - 1].truth;
    let unfiltered_error = position_error(&dead_reckoning[STEPS - 1], truth);
    assert!(
        unfiltered_error > 0.1,
        "scenario too easy: dead reckoning error only {unfiltered_error}"
    );

    check_filter(
        &mut Ekf::new(nominal_state(), adaptive_covariance())?,
        &sc,
        &steps,
        &dead_reckoning,
        "ekf",
    )?;
    check_filter(
        &mut Sekf::new(nominal_state(), adaptive_covariance())?,
        &sc,
        &steps,
        &dead_reckoning,
        "sekf",
    )?;
    check_filter(
        &mut Iekf::new(nominal_state(), adaptive_covariance())?,
        &sc,
        &steps,
        &dead_reckoning,
        "iekf",
    )?;
    check_filter(
        &mut Ukfm::new(nominal_state(), adaptive_covariance())?,
        &sc,
        &steps,
        &dead_reckoning,
        "ukfm",
    )?;
    Ok(())
}
