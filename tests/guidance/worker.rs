extern crate nyx_pvg as nyx;

use super::{stages, target, vehicle};
use nyx::guidance::{Adapter, AdapterConfig, AdapterOutcome, PvgStatus, SolutionSlot, SolverWorker};
use nyx::md::pvg::{AnchoredSolution, OptimizerOpts};
use std::sync::Arc;
use std::thread::sleep;
use std::time::{Duration, Instant};

use crate::init_logger;

const MASS: f64 = 5_000.0;

/// Polls until the condition holds, for at most five minutes.
fn wait_for<F: Fn() -> bool>(condition: F) -> bool {
    let start = Instant::now();
    while start.elapsed() < Duration::from_secs(300) {
        if condition() {
            return true;
        }
        sleep(Duration::from_millis(10));
    }
    false
}

#[test]
fn background_solve() {
    init_logger();
    let slot = Arc::new(SolutionSlot::new());
    let mut adapter = Adapter::new(AdapterConfig::default(), OptimizerOpts::default(), slot.clone());
    let worker = SolverWorker::spawn(*adapter.optimizer(), slot.clone()).unwrap();
    let (r, v) = vehicle();
    let stages = stages(MASS);

    let outcome = adapter
        .dispatch(&worker, 0.0, &r, &v, &stages, &target(), PvgStatus::Enabled, None)
        .unwrap();
    assert_eq!(outcome, AdapterOutcome::Submitted);
    let outcome = adapter
        .dispatch(&worker, 0.5, &r, &v, &stages, &target(), PvgStatus::Enabled, None)
        .unwrap();
    assert_eq!(outcome, AdapterOutcome::RateLimited);

    assert!(wait_for(|| slot.current().is_some()));
    assert!(wait_for(|| !worker.is_busy()));
    let first = slot.current().unwrap();

    // Warm started update a little later along the solution
    let t = 2.0;
    let (r, v, mass) = first.vehicle_state(t);
    let mut later = stages.clone();
    later[0].start_mass = mass;
    later[0].burn_time -= t;
    let previous = AnchoredSolution::new(first.clone());
    let outcome = adapter
        .dispatch(&worker, t, &r, &v, &later, &target(), PvgStatus::Burning, Some(&previous))
        .unwrap();
    assert_eq!(outcome, AdapterOutcome::Submitted);
    assert!(wait_for(|| slot
        .current()
        .map_or(false, |sol| !Arc::ptr_eq(&sol, &first))));
    let second = slot.current().unwrap();
    assert!((second.tf() - first.tf()).abs() < 1e-3 * first.tf());
}

#[test]
fn stale_solution_is_discarded() {
    let slot = Arc::new(SolutionSlot::new());
    let mut adapter = Adapter::new(AdapterConfig::default(), OptimizerOpts::default(), slot.clone());
    let worker = SolverWorker::spawn(*adapter.optimizer(), slot.clone()).unwrap();
    let (r, v) = vehicle();

    let request = adapter
        .prepare(0.0, &r, &v, &stages(MASS), &target(), None)
        .unwrap();
    // Disabled after the request was made, before its solution is ready
    slot.disable();
    assert!(worker.submit(request));
    assert!(wait_for(|| !worker.is_busy()));
    assert!(slot.current().is_none());
    drop(worker);
}
