extern crate nyx_pvg as nyx;

use nyx::guidance::{Actuators, AttitudeTarget, StageInfo, TargetSpec, VehicleState, EARTH_GM};
use nyx::linalg::Vector3;
use nyx::md::pvg::{Solution, STD_GRAVITY};

mod adapter;
mod config;
mod worker;

/// Radius of the vehicle at the time of the first solve (m)
const RADIUS: f64 = 6.578e6;

fn circular_velocity() -> f64 {
    (EARTH_GM / RADIUS).sqrt()
}

/// Time unit of the guidance problems (s)
fn time_unit() -> f64 {
    RADIUS / circular_velocity()
}

/// Vehicle at the apoapsis of a suborbital trajectory
fn vehicle() -> (Vector3<f64>, Vector3<f64>) {
    (
        Vector3::new(RADIUS, 0.0, 0.0),
        Vector3::new(0.0, 0.9 * circular_velocity(), 0.0),
    )
}

/// A single stage with a thrust to weight ratio of one half and an exhaust velocity of the local circular
/// velocity
fn stages(mass: f64) -> Vec<StageInfo> {
    let exhaust_velocity = circular_velocity();
    let burn_time = 1.4 * time_unit();
    let thrust = 0.5 * mass * EARTH_GM / RADIUS.powi(2);
    let final_mass = mass - thrust / exhaust_velocity * burn_time;
    vec![StageInfo {
        start_mass: mass,
        thrust,
        isp: exhaust_velocity / STD_GRAVITY,
        burn_time,
        delta_v: exhaust_velocity * (mass / final_mass).ln(),
    }]
}

/// Equatorial circular orbit five percent above the vehicle
fn target() -> TargetSpec {
    TargetSpec {
        periapsis_radius: 1.05 * RADIUS,
        apoapsis_radius: 1.05 * RADIUS,
        inclination_deg: 0.0,
        lan_deg: None,
        argp_deg: None,
        attach_radius: None,
    }
}

fn state_at(solution: &Solution, t: f64) -> VehicleState {
    let (r, v, mass) = solution.vehicle_state(t);
    VehicleState::builder().t(t).r(r).v(v).mass(mass).build()
}

#[derive(Debug, Default)]
struct Recorder {
    throttle: f64,
    attitude: Option<AttitudeTarget>,
    rcs: bool,
    warp_allowed: Option<bool>,
}

impl Actuators for Recorder {
    fn set_throttle(&mut self, throttle: f64) {
        self.throttle = throttle;
    }
    fn set_attitude(&mut self, target: AttitudeTarget) {
        self.attitude = Some(target);
    }
    fn set_rcs(&mut self, enabled: bool) {
        self.rcs = enabled;
    }
    fn set_rcs_forward(&mut self, _level: f64) {}
    fn set_autostage_suspended(&mut self, _suspended: bool) {}
    fn set_time_warp_allowed(&mut self, allowed: bool) {
        self.warp_allowed = Some(allowed);
    }
}
