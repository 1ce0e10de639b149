extern crate nyx_pvg as nyx;

use approx::assert_abs_diff_eq;
use nyx::dynamics::{mass, position, velocity, PrimerDynamics};
use nyx::linalg::Vector3;
use nyx::md::pvg::{
    AnchoredSolution, AscentProblem, FlightArc, Optimizer, OptimizerError, OptimizerOpts, Solution,
    TargetConstraint, STD_GRAVITY,
};
use nyx::propagators::{PropOpts, Propagator};
use nyx::utils::{angular_momentum, eccentricity_vector};
use rstest::*;

use crate::init_logger;

/// Isp for an exhaust velocity of `c` in a problem with unit gravity
fn isp(c: f64) -> f64 {
    c / STD_GRAVITY
}

/// Vehicle at the apoapsis of a suborbital trajectory, with enough propellant to raise it to a circular orbit
/// five percent higher. All quantities are already normalized.
#[fixture]
fn single_burn() -> AscentProblem {
    AscentProblem::builder()
        .mu(1.0)
        .t(0.0)
        .r(Vector3::new(1.0, 0.0, 0.0))
        .v(Vector3::new(0.0, 0.9, 0.0))
        .mass(1.0)
        .arcs(vec![FlightArc::burn(0.5, isp(1.0), 1.4)])
        .target(TargetConstraint::from_apsides(1.0, 1.05, 1.05, 0.0, 0.0, None, None).unwrap())
        .build()
}

fn assert_on_target(solution: &Solution, h_target: Vector3<f64>) {
    let (h, e) = solution.terminal_orbit();
    assert!((h - h_target).norm() < 1e-6, "h = {h}");
    assert!(e.norm() < 1e-6, "e = {e}");
}

#[rstest]
fn single_burn_to_circular_orbit(single_burn: AscentProblem) {
    init_logger();
    let solution = Optimizer::default().solve(&single_burn, None).unwrap();
    println!("{solution}");

    assert_eq!(solution.arcs.len(), 1);
    assert!(solution.residual_norm <= OptimizerOpts::default().convergence_tol);
    let burn = solution.arcs[0].duration;
    assert!(burn > 0.0 && burn < 1.4, "burn time {burn}");
    assert_abs_diff_eq!(solution.tf(), burn, epsilon = 1e-12);
    assert_abs_diff_eq!(solution.tgo(0.0), burn, epsilon = 1e-12);
    assert_abs_diff_eq!(solution.throttle(0.5 * burn), 1.0);
    assert_abs_diff_eq!(solution.throttle(burn + 0.1), 0.0);
    assert!(!solution.is_coasting(0.0));

    let h_target = Vector3::new(0.0, 0.0, 1.05_f64.sqrt());
    assert_on_target(&solution, h_target);
    assert!(solution.terminal_miss() < 1e-6);

    // Ideal velocity change of the whole burn
    let m_final = 1.0 - 0.5 * burn;
    assert_abs_diff_eq!(solution.vgo(0.0), (1.0 / m_final).ln(), epsilon = 1e-8);

    // Flying the primer from the initial guidance state lands on the target orbit
    let y0 = solution.arcs[0].initial_state();
    let prop = Propagator::dp45(PrimerDynamics::burn(0.5, 1.0), PropOpts::with_tolerance(1e-12));
    let yf = prop.with(0.0, y0).until(burn).unwrap();
    let h = angular_momentum(&position(&yf), &velocity(&yf));
    let e = eccentricity_vector(&position(&yf), &velocity(&yf), 1.0);
    assert!((h - h_target).norm() < 1e-6, "h = {h}");
    assert!(e.norm() < 1e-6, "e = {e}");
    assert_abs_diff_eq!(mass(&yf), m_final, epsilon = 1e-10);

    // The vehicle first climbs: the thrust points above the horizon
    assert!(solution.pitch_deg(0.0) > 0.0);
}

#[test]
fn two_stage_ascent() {
    init_logger();
    let problem = AscentProblem::builder()
        .mu(1.0)
        .t(0.0)
        .r(Vector3::new(1.0, 0.0, 0.0))
        .v(Vector3::new(0.0, 0.85, 0.0))
        .mass(1.0)
        .arcs(vec![
            FlightArc::burn(0.6, isp(0.8), 0.3).with_stage(0),
            FlightArc::burn(0.25, isp(1.0), 1.6)
                .with_start_mass(0.6)
                .with_stage(1),
        ])
        .target(TargetConstraint::from_apsides(1.0, 1.05, 1.05, 0.0, 0.0, None, None).unwrap())
        .build();

    let solution = Optimizer::default().solve(&problem, None).unwrap();
    println!("{solution}");
    assert_eq!(solution.arcs.len(), 2);
    // The first stage burns to depletion
    assert_abs_diff_eq!(solution.arcs[0].duration, 0.3, epsilon = 1e-7);
    assert_abs_diff_eq!(mass(&solution.arcs[0].final_state()), 1.0 - 0.6 / 0.8 * 0.3, epsilon = 1e-7);
    // The upper stage starts with its own mass
    assert_abs_diff_eq!(mass(&solution.arcs[1].initial_state()), 0.6, epsilon = 1e-7);
    assert!(solution.arcs[1].duration < 1.6);
    assert_eq!(solution.arc_index(0.1), 0);
    assert_eq!(solution.arc_index(0.35), 1);
    assert_eq!(solution.arcs[1].stage, Some(1));

    // Position, velocity and costates are continuous at staging
    let before = solution.arcs[0].final_state();
    let after = solution.arcs[1].initial_state();
    assert!((before.rows(0, 12) - after.rows(0, 12)).norm() < 1e-7);

    assert_on_target(&solution, Vector3::new(0.0, 0.0, 1.05_f64.sqrt()));
}

#[rstest]
fn warm_start_follows_the_previous_solution(single_burn: AscentProblem) {
    init_logger();
    let optimizer = Optimizer::default();
    let first = optimizer.solve(&single_burn, None).unwrap();

    // Fly part of the burn, and solve again from there
    let t1 = 0.2;
    let (r, v, m) = first.vehicle_state(t1);
    let problem = AscentProblem::builder()
        .mu(1.0)
        .t(t1)
        .r(r)
        .v(v)
        .mass(m)
        .arcs(vec![FlightArc::burn(0.5, isp(1.0), 1.4 - t1)])
        .target(single_burn.target)
        .build();
    let previous = AnchoredSolution::from(first.clone());
    let second = optimizer.solve(&problem, Some(&previous)).unwrap();

    assert_abs_diff_eq!(second.epoch, t1);
    // The same cutoff time is found
    assert_abs_diff_eq!(second.tf(), first.tf(), epsilon = 1e-5);
    assert_abs_diff_eq!(second.pitch_deg(0.5), first.pitch_deg(0.5), epsilon = 1e-2);
    assert_abs_diff_eq!(second.heading_deg(0.5), first.heading_deg(0.5), epsilon = 1e-2);
}

#[rstest]
fn expired_previous_solution_is_ignored(single_burn: AscentProblem) {
    let optimizer = Optimizer::default();
    let first = optimizer.solve(&single_burn, None).unwrap();
    let mut previous = AnchoredSolution::from(first.clone());
    // Anchored such that it has already ended at the epoch of the problem
    previous.set_anchor(-10.0);
    assert!(previous.tf() < single_burn.t);

    let second = optimizer.solve(&single_burn, Some(&previous)).unwrap();
    assert_abs_diff_eq!(second.tf(), first.tf(), epsilon = 1e-6);
}

#[rstest]
fn short_final_burn_is_rejected(single_burn: AscentProblem) {
    let mut problem = single_burn;
    problem.arcs = vec![FlightArc::burn(0.5, isp(1.0), 0.1)];
    match Optimizer::default().solve(&problem, None) {
        Err(OptimizerError::ConvergenceFailure { .. }) => {}
        other => panic!("expected a convergence failure, got {other:?}"),
    }
}

#[rstest]
fn degenerate_problems(single_burn: AscentProblem) {
    let optimizer = Optimizer::new(OptimizerOpts::builder().patience(10).build());

    let mut no_mass = single_burn.clone();
    no_mass.mass = 0.0;
    let mut coasting = single_burn.clone();
    coasting.arcs.push(FlightArc::coast(0.5));
    let mut no_arcs = single_burn.clone();
    no_arcs.arcs.clear();
    let mut dry = single_burn.clone();
    dry.arcs = vec![FlightArc::burn(0.5, isp(1.0), 3.0)];
    let mut nowhere = single_burn;
    nowhere.r = Vector3::zeros();

    for problem in [no_mass, coasting, no_arcs, dry, nowhere] {
        match optimizer.solve(&problem, None) {
            Err(OptimizerError::DegenerateInput { msg }) => println!("{msg}"),
            other => panic!("expected degenerate input, got {other:?}"),
        }
    }
}

#[test]
fn attach_target() {
    // Elliptical orbit with a free argument of periapsis, entered at its periapsis
    let target = TargetConstraint::from_apsides(1.0, 1.05, 1.3, 0.0, 0.0, None, None).unwrap();
    match target {
        TargetConstraint::Attach {
            radius,
            radial_velocity,
            ..
        } => {
            assert_abs_diff_eq!(radius, 1.05);
            assert_abs_diff_eq!(radial_velocity, 0.0, epsilon = 1e-12);
        }
        _ => panic!("expected an attach target"),
    }
    // Velocity at periapsis is horizontal, faster than circular
    let v = target.velocity_at(&Vector3::new(1.05, 0.0, 0.0), 1.0);
    assert!(v[1] > (1.0 / 1.05_f64).sqrt());
    assert_abs_diff_eq!(v[0], 0.0, epsilon = 1e-12);
}
