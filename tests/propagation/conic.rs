extern crate nyx_pvg as nyx;

use nyx::dynamics::{pos_costate, position, primer, pvg_state, velocity, PrimerDynamics, TwoBody};
use nyx::linalg::{Matrix6, Vector3, Vector6};
use nyx::propagators::{ConicError, ConicPropagator, ConicState, PropOpts, Propagator};
use rstest::*;

use crate::init_logger;

fn integrate(r: Vector3<f64>, v: Vector3<f64>, tau: f64) -> ConicState {
    let prop = Propagator::dp45(TwoBody::new(1.0), PropOpts::with_tolerance(1e-13));
    let end = prop
        .with(0.0, ConicState::new(r, v).to_vector())
        .until(tau)
        .unwrap();
    ConicState::from_vector(&end)
}

#[rstest]
#[case::elliptic(Vector3::new(0.0, 1.2, 0.1), 3.0)]
#[case::near_parabolic(Vector3::new(0.0, 1.414, 0.0), 2.0)]
#[case::hyperbolic(Vector3::new(0.2, 1.6, -0.3), 2.5)]
#[case::backward(Vector3::new(0.0, 0.9, 0.2), -4.0)]
fn conic_matches_integration(#[case] v0: Vector3<f64>, #[case] tau: f64) {
    init_logger();
    let r0 = Vector3::new(1.0, 0.0, 0.05);
    let conic = ConicPropagator::new(1.0).propagate(&r0, &v0, tau).unwrap();
    let ode = integrate(r0, v0, tau);
    let err_r = (conic.r - ode.r).norm();
    let err_v = (conic.v - ode.v).norm();
    assert!(err_r < 1e-8 && err_v < 1e-8, "r error {err_r:e}, v error {err_v:e}");
}

#[test]
fn forward_then_backward() {
    let conic = ConicPropagator::new(3.986_004_418e14);
    let r0 = Vector3::new(6.678e6, 1.0e5, -2.0e5);
    let v0 = Vector3::new(-100.0, 7.6e3, 1.1e3);
    let tau = 5_400.0;
    let there = conic.propagate(&r0, &v0, tau).unwrap();
    let back = conic.propagate(&there.r, &there.v, -tau).unwrap();
    assert!((back.r - r0).norm() / r0.norm() < 1e-9);
    assert!((back.v - v0).norm() / v0.norm() < 1e-9);
}

#[test]
fn stm_matches_finite_differences() {
    let conic = ConicPropagator::new(1.0);
    let r0 = Vector3::new(1.0, 0.2, -0.1);
    let v0 = Vector3::new(-0.1, 0.95, 0.3);
    let tau = 2.2;
    let (_, stm) = conic.propagate_with_stm(&r0, &v0, tau).unwrap();
    let phi = stm.to_matrix();

    let x0 = ConicState::new(r0, v0).to_vector();
    let h = 1e-6;
    let mut fd = Matrix6::zeros();
    for j in 0..6 {
        let mut plus = x0;
        plus[j] += h;
        let mut minus = x0;
        minus[j] -= h;
        let prop = |x: &Vector6<f64>| {
            let s = ConicState::from_vector(x);
            conic.propagate(&s.r, &s.v, tau).unwrap().to_vector()
        };
        fd.set_column(j, &((prop(&plus) - prop(&minus)) / (2.0 * h)));
    }
    let err = (phi - fd).abs().max();
    assert!(err < 1e-6, "STM error {err:e}\n{phi}\n{fd}");
}

#[test]
fn costate_mapping_matches_coast_integration() {
    let r0 = Vector3::new(1.0, 0.0, 0.1);
    let v0 = Vector3::new(0.1, 1.05, 0.0);
    let pr0 = Vector3::new(0.3, -0.2, 0.05);
    let pv0 = Vector3::new(0.2, 0.9, -0.1);
    let tau = 1.7;

    let (state, stm) = ConicPropagator::new(1.0)
        .propagate_with_stm(&r0, &v0, tau)
        .unwrap();
    let (pr, pv) = stm.map_costates(&pr0, &pv0);

    let prop = Propagator::dp45(PrimerDynamics::coast(), PropOpts::with_tolerance(1e-13));
    let y = prop
        .with(0.0, pvg_state(&r0, &v0, &pr0, &pv0, 1.0))
        .until(tau)
        .unwrap();
    assert!((position(&y) - state.r).norm() < 1e-8);
    assert!((velocity(&y) - state.v).norm() < 1e-8);
    assert!((pos_costate(&y) - pr).norm() < 1e-8);
    assert!((primer(&y) - pv).norm() < 1e-8);
}

#[test]
fn degenerate_inputs() {
    let conic = ConicPropagator::new(1.0);
    assert!(matches!(
        conic.propagate(&Vector3::zeros(), &Vector3::new(0.0, 1.0, 0.0), 1.0),
        Err(ConicError::DegenerateInput { .. })
    ));
    assert!(ConicPropagator::new(-1.0)
        .propagate(&Vector3::x(), &Vector3::y(), 1.0)
        .is_err());
}
