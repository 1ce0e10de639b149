extern crate nyx_pvg as nyx;

use approx::assert_abs_diff_eq;
use nyx::tools::{brent_minimize, brent_root, RootError};
use rstest::*;

use crate::init_logger;

#[test]
fn root_needs_a_bracket() {
    init_logger();
    let err = brent_root(|x| x, 1.0, 2.0, 1e-12, 100, 0).unwrap_err();
    assert_eq!(
        err,
        RootError::Bracketing {
            a: 1.0,
            b: 2.0,
            fa: 1.0,
            fb: 2.0
        }
    );
}

#[test]
fn cosine_root() {
    let sol = brent_root(f64::cos, 0.0, 3.0, 1e-14, 100, 0).unwrap();
    assert_abs_diff_eq!(sol.x, std::f64::consts::FRAC_PI_2, epsilon = 1e-13);
    assert!(sol.iterations < 10, "{sol:?}");
}

#[rstest]
#[case::exponential(|x: f64| x.exp() - 10.0, 0.0, 5.0, 10.0_f64.ln())]
#[case::cubic(|x: f64| x * x * x - 2.0, 0.0, 2.0, 2.0_f64.cbrt())]
#[case::far_end_stuck(|x: f64| (x - 0.1).powi(3) + 1e-3 * (x - 0.1), -1.0, 4.0, 0.1)]
fn superlinear_convergence(
    #[case] f: fn(f64) -> f64,
    #[case] a: f64,
    #[case] b: f64,
    #[case] root: f64,
) {
    let sol = brent_root(f, a, b, 1e-14, 100, 0).unwrap();
    assert_abs_diff_eq!(sol.x, root, epsilon = 1e-12);
    // Bisection alone would need about 50 iterations
    assert!(sol.iterations < 40, "{sol:?}");
}

#[test]
fn zero_at_an_end_is_not_a_bracket() {
    let err = brent_root(|x| x - 2.0, 0.0, 2.0, 1e-12, 100, 0).unwrap_err();
    assert_eq!(
        err,
        RootError::Bracketing {
            a: 0.0,
            b: 2.0,
            fa: -2.0,
            fb: 0.0
        }
    );
}

#[rstest]
#[case::after(1)]
#[case::before(-1)]
fn root_side(#[case] sign: i8) {
    // Increasing function, so the positive side is above the root
    let sol = brent_root(|x| x * x * x - 2.0, 0.0, 2.0, 1e-10, 100, sign).unwrap();
    assert_abs_diff_eq!(sol.x, 2.0_f64.cbrt(), epsilon = 1e-9);
    assert!(sol.fx == 0.0 || sol.fx.signum() == f64::from(sign));
}

#[test]
fn root_iteration_limit() {
    let step = |x: f64| if x < 0.123_456 { -1.0 } else { 1.0 };
    let err = brent_root(step, 0.0, 1.0e6, 1e-15, 3, 0).unwrap_err();
    assert!(matches!(
        err,
        RootError::IterationLimitExceeded { iterations: 3, .. }
    ));
}

#[rstest]
#[case(0.3)]
#[case(0.05)]
#[case(1.1)]
fn parabola_minimum(#[case] center: f64) {
    let sol = brent_minimize(|x| (x - center).powi(2) + 1.0, 0.0, 1.2, 1e-8, 100).unwrap();
    assert_abs_diff_eq!(sol.x, center, epsilon = 1e-6);
    assert_abs_diff_eq!(sol.fx, 1.0, epsilon = 1e-10);
}

#[test]
fn minimum_on_boundary() {
    // Monotonic function: the minimum is pushed against the lower bound
    let sol = brent_minimize(|x| x, 0.5, 2.0, 1e-9, 200).unwrap();
    assert_abs_diff_eq!(sol.x, 0.5, epsilon = 1e-6);
}
