extern crate nyx_pvg as nyx;

use super::{stages, state_at, target, time_unit, vehicle, Recorder};
use approx::assert_relative_eq;
use nyx::guidance::{
    Adapter, AdapterConfig, AdapterError, AdapterOutcome, AscentGuidance, AttitudeTarget,
    ControllerConfig, GuidanceController, PvgStatus, SolutionSlot, VehicleState, EARTH_GM,
};
use nyx::linalg::Vector3;
use nyx::md::pvg::OptimizerOpts;
use std::sync::Arc;

use crate::init_logger;

const MASS: f64 = 10_000.0;

#[test]
fn guided_ascent() {
    init_logger();
    let slot = Arc::new(SolutionSlot::new());
    let mut adapter = Adapter::new(AdapterConfig::default(), OptimizerOpts::default(), slot.clone());
    let mut ctrl = GuidanceController::new(ControllerConfig::default(), slot.clone());
    let mut act = Recorder::default();
    let (r, v) = vehicle();
    let stages = stages(MASS);

    // Nothing to fly yet
    let waiting = VehicleState::builder().t(0.0).r(r).v(v).mass(MASS).build();
    for _ in 0..3 {
        assert_eq!(ctrl.tick(&waiting, &mut act), PvgStatus::Enabled);
        assert_eq!(act.attitude, Some(AttitudeTarget::SurfacePrograde));
        assert!(!ctrl.is_stable());
    }

    let outcome = adapter
        .update(0.0, &r, &v, &stages, &target(), ctrl.status(), None)
        .unwrap();
    assert_eq!(outcome, AdapterOutcome::Installed);
    let solution = slot.current().unwrap();
    println!("{solution}");
    assert_relative_eq!(solution.tgo(0.0), 0.647_163_7 * time_unit(), max_relative = 1e-3);
    let h_target = Vector3::new(0.0, 0.0, (EARTH_GM * 1.05 * r.norm()).sqrt());
    let (h, e) = solution.terminal_orbit();
    assert_relative_eq!(h, h_target, max_relative = 1e-6);
    assert!(e.norm() < 1e-6);

    // Too soon for another attempt
    let outcome = adapter
        .update(0.5, &r, &v, &stages, &target(), ctrl.status(), None)
        .unwrap();
    assert_eq!(outcome, AdapterOutcome::RateLimited);

    assert_eq!(ctrl.tick(&state_at(&solution, 0.0), &mut act), PvgStatus::Initialized);
    assert_eq!(ctrl.tick(&state_at(&solution, 1.0), &mut act), PvgStatus::Burning);
    assert!((act.throttle - 1.0).abs() < f64::EPSILON);
    assert!(ctrl.is_stable());
    assert!(ctrl.pitch_deg() > 0.0 && ctrl.pitch_deg() < 90.0);
    assert!((ctrl.heading_deg() - 90.0).abs() < 1e-6);
    assert!(ctrl.vgo() > 0.0);

    // Time to go below the terminal threshold
    let t_terminal = solution.tf() - 5.0;
    assert_eq!(
        ctrl.tick(&state_at(&solution, t_terminal), &mut act),
        PvgStatus::Terminal
    );
    assert_eq!(act.warp_allowed, Some(false));
    assert!((act.throttle - 1.0).abs() < f64::EPSILON);

    // Solutions are frozen from now on
    let outcome = adapter
        .update(t_terminal, &r, &v, &stages, &target(), ctrl.status(), None)
        .unwrap();
    assert_eq!(outcome, AdapterOutcome::Terminal);

    ctrl.disable(&mut act);
    assert_eq!(ctrl.status(), PvgStatus::Finished);
    assert!(act.throttle.abs() < f64::EPSILON);
    assert!(slot.current().is_none());
}

#[test]
fn failed_solve_keeps_previous_solution() {
    init_logger();
    let slot = Arc::new(SolutionSlot::new());
    let mut adapter = Adapter::new(AdapterConfig::default(), OptimizerOpts::default(), slot.clone());
    let (r, v) = vehicle();
    let stages = stages(MASS);
    adapter
        .update(0.0, &r, &v, &stages, &target(), PvgStatus::Enabled, None)
        .unwrap();
    let installed = slot.current().unwrap();

    // The stage cannot burn long enough to reach the target anymore
    let mut short = stages.clone();
    short[0].burn_time = 0.1 * time_unit();
    let err = adapter
        .update(2.0, &r, &v, &short, &target(), PvgStatus::Burning, None)
        .unwrap_err();
    assert!(matches!(err, AdapterError::Optimizer { .. }), "{err}");
    assert!(Arc::ptr_eq(&slot.current().unwrap(), &installed));
}

#[test]
fn low_delta_v_is_not_solved() {
    let slot = Arc::new(SolutionSlot::new());
    let mut adapter = Adapter::new(AdapterConfig::default(), OptimizerOpts::default(), slot.clone());
    let (r, v) = vehicle();
    let mut stages = stages(MASS);
    stages[0].delta_v = 1.0;
    let outcome = adapter
        .update(0.0, &r, &v, &stages, &target(), PvgStatus::Enabled, None)
        .unwrap();
    assert_eq!(outcome, AdapterOutcome::LowDeltaV);
    assert!(slot.current().is_none());
}

#[test]
fn disabled_during_solve() {
    let slot = Arc::new(SolutionSlot::new());
    let mut adapter = Adapter::new(AdapterConfig::default(), OptimizerOpts::default(), slot.clone());
    let (r, v) = vehicle();
    let request = adapter
        .prepare(0.0, &r, &v, &stages(MASS), &target(), None)
        .unwrap();
    let solution = adapter.optimizer().solve(&request.problem, None).unwrap();
    slot.disable();
    assert!(!slot.install(request.ticket, solution));
    assert!(slot.current().is_none());
}
