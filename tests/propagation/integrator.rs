extern crate nyx_pvg as nyx;

use approx::assert_abs_diff_eq;
use nyx::dynamics::TwoBody;
use nyx::linalg::Vector6;
use nyx::propagators::error_ctrl::{ErrorCtrl, LargestError, RSSState, RSSStep};
use nyx::propagators::{PropOpts, PropagationError, Propagator};
use rstest::*;
use std::f64::consts::{FRAC_PI_2, PI, TAU};

use crate::init_logger;

#[fixture]
fn circular() -> Vector6<f64> {
    Vector6::new(1.0, 0.0, 0.0, 0.0, 1.0, 0.0)
}

fn period_error<E: ErrorCtrl>(error_ctrl: E, state: Vector6<f64>) -> f64 {
    let opts = PropOpts::with_adaptive_step(1e-9, 0.5, 1e-12, error_ctrl);
    let prop = Propagator::dp45(TwoBody::new(1.0), opts);
    let mut instance = prop.with(0.0, state);
    let end = instance.until(TAU).unwrap();
    assert_abs_diff_eq!(instance.t, TAU, epsilon = 1e-15);
    (end - state).norm()
}

#[rstest]
fn two_body_period_round_trip(circular: Vector6<f64>) {
    init_logger();
    let err = period_error(RSSState, circular);
    println!("RSS state error control: {err:e}");
    assert!(err < 1e-8, "error after one period: {err:e}");
    assert!(period_error(RSSStep, circular) < 1e-8);
    assert!(period_error(LargestError, circular) < 1e-8);
}

#[rstest]
fn checkpoints_are_hit_exactly(circular: Vector6<f64>) {
    let prop = Propagator::dp45(TwoBody::new(1.0), PropOpts::with_tolerance(1e-12));
    let mut instance = prop.with(0.0, circular);
    let checkpoints = [FRAC_PI_2, PI, 1.5 * PI];
    let states = instance.through(&checkpoints).unwrap();
    assert_eq!(states.len(), 3);
    for ((t, state), cp) in states.iter().zip(checkpoints) {
        assert_abs_diff_eq!(*t, cp, epsilon = f64::EPSILON);
        let expected = Vector6::new(cp.cos(), cp.sin(), 0.0, -cp.sin(), cp.cos(), 0.0);
        assert!((state - expected).norm() < 1e-9, "at t = {t}: {state}");
    }
    // The checkpoint at the current time is returned immediately
    let again = instance.through(&[1.5 * PI]).unwrap();
    assert_eq!(again.len(), 1);
}

#[rstest]
fn backward_returns_to_start() {
    let start = Vector6::new(1.0, 0.1, -0.2, 0.05, 1.1, 0.2);
    let prop = Propagator::dp45(TwoBody::new(1.0), PropOpts::with_tolerance(1e-12));
    let mut instance = prop.with(0.0, start);
    instance.until(3.7).unwrap();
    let back = instance.until(0.0).unwrap();
    assert!((back - start).norm() < 1e-9, "{}", (back - start).norm());
    assert_abs_diff_eq!(instance.t, 0.0, epsilon = f64::EPSILON);
}

#[test]
fn iteration_limit() {
    let mut opts = PropOpts::with_tolerance(1e-12);
    opts.max_iter = 5;
    opts.set_max_step(0.01);
    let prop = Propagator::dp45(TwoBody::new(1.0), opts);
    let mut instance = prop.with(0.0, Vector6::new(1.0, 0.0, 0.0, 0.0, 1.0, 0.0));
    match instance.until(1.0) {
        Err(PropagationError::IterationLimitExceeded { iterations, .. }) => {
            assert_eq!(iterations, 5)
        }
        other => panic!("expected the iteration limit, got {other:?}"),
    }
}

#[test]
fn invalid_checkpoints() {
    let prop = Propagator::default(TwoBody::new(1.0));
    let mut instance = prop.with(0.0, Vector6::new(1.0, 0.0, 0.0, 0.0, 1.0, 0.0));
    assert!(instance.through(&[]).is_err());
    assert!(instance.through(&[2.0, 1.0]).is_err());
    assert!(instance.until(f64::NAN).is_err());
    // Gravity singularity surfaces as a dynamics error
    let mut singular = prop.with(0.0, Vector6::zeros());
    assert!(matches!(
        singular.until(1.0),
        Err(PropagationError::Dynamics { .. })
    ));
}
