extern crate nyx_pvg as nyx;

use nyx::linalg::Vector3;
use nyx::propagators::ConicPropagator;
use nyx::tools::{lambert, LambertError, TransferKind};
use rstest::*;
use std::f64::consts::TAU;

use crate::init_logger;

#[rstest]
#[case(0.3)]
#[case(1.2)]
#[case(2.5)]
fn circular_short_way(#[case] theta: f64) {
    init_logger();
    let r1 = Vector3::new(1.0, 0.0, 0.0);
    let r2 = Vector3::new(theta.cos(), theta.sin(), 0.0);
    let sol = lambert(&r1, &r2, theta, 1.0, TransferKind::ShortWay).unwrap();
    assert!((sol.v_init - Vector3::new(0.0, 1.0, 0.0)).norm() < 1e-8);
    assert!((sol.v_final - Vector3::new(-theta.sin(), theta.cos(), 0.0)).norm() < 1e-8);
}

#[rstest]
#[case(0.3)]
#[case(2.5)]
fn circular_long_way(#[case] theta: f64) {
    let r1 = Vector3::new(1.0, 0.0, 0.0);
    let r2 = Vector3::new(theta.cos(), theta.sin(), 0.0);
    let sol = lambert(&r1, &r2, TAU - theta, 1.0, TransferKind::LongWay).unwrap();
    assert!((sol.v_init - Vector3::new(0.0, -1.0, 0.0)).norm() < 1e-8);
    assert!((sol.v_final - Vector3::new(theta.sin(), -theta.cos(), 0.0)).norm() < 1e-8);
}

#[rstest]
#[case::elliptic(1.5)]
#[case::hyperbolic(0.3)]
fn transfer_reaches_target(#[case] tof: f64) {
    let mu = 1.0;
    let r1 = Vector3::new(1.0, 0.1, 0.0);
    let r2 = Vector3::new(-0.4, 1.3, 0.2);
    let sol = lambert(&r1, &r2, tof, mu, TransferKind::ShortWay).unwrap();
    let end = ConicPropagator::new(mu)
        .propagate(&r1, &sol.v_init, tof)
        .unwrap();
    assert!((end.r - r2).norm() < 1e-7, "{} != {}", end.r, r2);
    assert!((end.v - sol.v_final).norm() < 1e-7);
}

#[test]
fn degenerate_geometry() {
    let r1 = Vector3::new(1.0, 0.0, 0.0);
    assert!(matches!(
        lambert(&r1, &(2.0 * r1), 1.0, 1.0, TransferKind::ShortWay),
        Err(LambertError::DegenerateInput { .. })
    ));
    assert!(matches!(
        lambert(&r1, &Vector3::y(), -1.0, 1.0, TransferKind::ShortWay),
        Err(LambertError::DegenerateInput { .. })
    ));
}
