extern crate nyx_pvg as nyx;

use approx::assert_abs_diff_eq;
use nyx::dynamics::{Dynamics, DynamicsError, TwoBody};
use nyx::linalg::{SVector, Vector2, Vector6};
use nyx::propagators::error_ctrl::RSSState;
use nyx::propagators::{Event, EventAction, EventDirection, PropOpts, Propagator};
use rstest::*;

use crate::init_logger;

/// A ball thrown upward: height and vertical velocity.
#[derive(Copy, Clone, Debug)]
struct Ball {
    g: f64,
}

impl Dynamics<2> for Ball {
    fn eom(&self, _t: f64, state: &SVector<f64, 2>) -> Result<SVector<f64, 2>, DynamicsError> {
        Ok(Vector2::new(state[1], -self.g))
    }
}

const G: f64 = 9.81;
const V0: f64 = 10.0;

#[fixture]
fn ball() -> Propagator<Ball, RSSState, 2> {
    Propagator::dp45(
        Ball { g: G },
        PropOpts::with_adaptive_step(1e-9, 1.5, 1e-12, RSSState),
    )
}

#[rstest]
fn ball_lands_at_twice_apex_time(ball: Propagator<Ball, RSSState, 2>) {
    init_logger();
    // Thrown from the ground: the initial zero of the height is not an event
    let ground = Event::new("ground", |_, y: &SVector<f64, 2>| y[0])
        .with_direction(EventDirection::Falling);
    let out = ball
        .with(0.0, Vector2::new(0.0, V0))
        .until_event(10.0, &[ground])
        .unwrap();
    assert_eq!(out.stopped_on, Some(0));
    assert_eq!(out.events.len(), 1);
    assert_abs_diff_eq!(out.t, 2.0 * V0 / G, epsilon = 1e-9);
    assert_abs_diff_eq!(out.state[0], 0.0, epsilon = 1e-9);
    assert_abs_diff_eq!(out.state[1], -V0, epsilon = 1e-9);
    assert!(out.checkpoints.is_empty());
}

#[rstest]
fn several_events_in_one_step(ball: Propagator<Ball, RSSState, 2>) {
    init_logger();
    let events = [
        Event::new("three meters", |_, y: &SVector<f64, 2>| y[0] - 3.0)
            .with_action(EventAction::Continue),
        Event::new("apex", |_, y: &SVector<f64, 2>| y[1])
            .with_direction(EventDirection::Falling)
            .with_action(EventAction::Continue),
        Event::new("ground", |_, y: &SVector<f64, 2>| y[0]).with_direction(EventDirection::Falling),
    ];
    let out = ball
        .with(0.0, Vector2::new(0.0, V0))
        .until_event(10.0, &events)
        .unwrap();

    let disc = (V0 * V0 - 2.0 * G * 3.0).sqrt();
    let expected = [
        (0, (V0 - disc) / G),
        (1, V0 / G),
        (0, (V0 + disc) / G),
        (2, 2.0 * V0 / G),
    ];
    assert_eq!(out.events.len(), expected.len(), "{:?}", out.events);
    for (occurrence, (index, t)) in out.events.iter().zip(expected) {
        assert_eq!(occurrence.index, index);
        assert_abs_diff_eq!(occurrence.t, t, epsilon = 1e-9);
    }
    assert_eq!(out.stopped_on, Some(2));
}

#[rstest]
fn continue_events_do_not_stop(ball: Propagator<Ball, RSSState, 2>) {
    let apex = Event::new("apex", |_, y: &SVector<f64, 2>| y[1]).with_action(EventAction::Continue);
    let out = ball
        .with(0.0, Vector2::new(0.0, V0))
        .integrate(&[0.5, 1.5], &[apex])
        .unwrap();
    assert_eq!(out.stopped_on, None);
    assert_eq!(out.checkpoints.len(), 2);
    assert_eq!(out.events.len(), 1);
    assert_abs_diff_eq!(out.t, 1.5, epsilon = f64::EPSILON);
    assert_abs_diff_eq!(out.state[1], V0 - 1.5 * G, epsilon = 1e-9);
}

#[rstest]
fn event_on_a_checkpoint(ball: Propagator<Ball, RSSState, 2>) {
    // The event function is exactly zero at the end of the step landing on the checkpoint
    let clock = Event::new("one second", |t, _: &SVector<f64, 2>| t - 1.0)
        .with_action(EventAction::Continue);
    let out = ball
        .with(0.0, Vector2::new(0.0, V0))
        .integrate(&[1.0, 2.0], &[clock])
        .unwrap();
    assert_eq!(out.events.len(), 1);
    assert_eq!(out.events[0].t, 1.0);
    assert_eq!(out.checkpoints.len(), 2);
    assert_abs_diff_eq!(out.checkpoints[0].1[1], V0 - G, epsilon = 1e-9);
    assert_abs_diff_eq!(out.t, 2.0, epsilon = f64::EPSILON);
}

#[test]
fn periapsis_event_backward() {
    // Elliptic orbit started at apoapsis: propagating backward finds the previous periapsis half a period earlier
    let (rp, ra) = (1.0, 2.0);
    let sma: f64 = 0.5 * (rp + ra);
    let va = (2.0 / ra - 1.0 / sma).sqrt();
    let period = std::f64::consts::TAU * sma.powf(1.5);
    let prop = Propagator::dp45(TwoBody::new(1.0), PropOpts::with_tolerance(1e-12));
    let radial_velocity = |_t: f64, y: &Vector6<f64>| y[0] * y[3] + y[1] * y[4] + y[2] * y[5];
    let periapsis = Event::new("periapsis", radial_velocity);
    let out = prop
        .with(0.0, Vector6::new(-ra, 0.0, 0.0, 0.0, -va, 0.0))
        .until_event(-period, &[periapsis])
        .unwrap();
    assert_abs_diff_eq!(out.t, -0.5 * period, epsilon = 1e-8);
    let rmag = (out.state[0].powi(2) + out.state[1].powi(2)).sqrt();
    assert_abs_diff_eq!(rmag, rp, epsilon = 1e-8);
}
