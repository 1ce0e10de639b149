/*
    Nyx, blazing fast astrodynamics
    Copyright (C) 2018-onwards Christopher Rabotin <christopher.rabotin@gmail.com>

    This program is free software: you can redistribute it and/or modify
    it under the terms of the GNU Affero General Public License as published
    by the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.

    This program is distributed in the hope that it will be useful,
    but WITHOUT ANY WARRANTY; without even the implied warranty of
    MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
    GNU Affero General Public License for more details.

    You should have received a copy of the GNU Affero General Public License
    along with this program.  If not, see <https://www.gnu.org/licenses/>.
*/

use super::{Actuators, AscentGuidance, AttitudeTarget, ControllerConfig, PvgStatus, SolutionSlot, VehicleState};
use crate::linalg::Vector3;
use crate::md::pvg::AnchoredSolution;
use std::sync::Arc;

/// The finite state machine which flies the latest solution.
///
/// The controller never blocks on a solve: it reads whatever solution was last installed in its slot, and only
/// changes the time anchor of its own copy of that solution.
#[derive(Debug)]
pub struct GuidanceController {
    pub config: ControllerConfig,
    slot: Arc<SolutionSlot>,
    solution: Option<AnchoredSolution>,
    status: PvgStatus,
    pitch_deg: f64,
    heading_deg: f64,
    tgo: f64,
    vgo: f64,
    /// Last valid commanded thrust direction
    direction: Option<Vector3<f64>>,
    last_miss: Option<f64>,
    last_t: Option<f64>,
}

impl GuidanceController {
    pub fn new(config: ControllerConfig, slot: Arc<SolutionSlot>) -> Self {
        Self {
            config,
            slot,
            solution: None,
            status: PvgStatus::Enabled,
            pitch_deg: 0.0,
            heading_deg: 0.0,
            tgo: 0.0,
            vgo: 0.0,
            direction: None,
            last_miss: None,
            last_t: None,
        }
    }

    pub fn slot(&self) -> &Arc<SolutionSlot> {
        &self.slot
    }

    /// The solution being flown, with its time anchor
    pub fn solution(&self) -> Option<&AnchoredSolution> {
        self.solution.as_ref()
    }

    /// Restarts the guidance from scratch, waiting for a new solution.
    pub fn enable(&mut self) {
        let slot = self.slot.clone();
        *self = Self::new(self.config, slot);
        info!("PVG guidance enabled");
    }

    /// Stops the guidance: any solve in flight will not be installed and all of the actuators are released.
    pub fn disable<A: Actuators>(&mut self, actuators: &mut A) {
        self.slot.disable();
        self.solution = None;
        self.finish(actuators);
    }

    /// Runs one control tick and returns the new status.
    pub fn tick<A: Actuators>(&mut self, state: &VehicleState, actuators: &mut A) -> PvgStatus {
        if self.status == PvgStatus::Finished {
            actuators.set_throttle(0.0);
            return self.status;
        }

        let dt = match self.last_t {
            Some(prev) if state.t > prev => state.t - prev,
            _ => self.config.default_tick_s,
        };
        self.last_t = Some(state.t);

        let fresh = !self.status.is_terminal() && self.pick_up_solution();

        let solution = match self.solution.as_mut() {
            Some(solution) => solution,
            None => {
                actuators.set_attitude(AttitudeTarget::SurfacePrograde);
                return self.status;
            }
        };
        if !state.lifted_off && state.t > solution.t0 {
            solution.set_anchor(state.t);
        }

        match self.status {
            PvgStatus::Terminal | PvgStatus::TerminalRcs => self.terminal_tick(state, dt, actuators),
            _ => self.flight_tick(state, fresh, actuators),
        }
        self.status
    }

    /// Replaces the flown solution with the latest installed one. Returns whether it is new.
    fn pick_up_solution(&mut self) -> bool {
        let latest = match self.slot.current() {
            Some(latest) => latest,
            None => return false,
        };
        let is_new = self
            .solution
            .as_ref()
            .map_or(true, |flown| !Arc::ptr_eq(&flown.solution, &latest));
        if is_new {
            info!("PVG flying {latest}");
            self.solution = Some(AnchoredSolution::new(latest));
            if self.status == PvgStatus::Enabled {
                self.status = PvgStatus::Initialized;
            }
        }
        is_new
    }

    fn flight_tick<A: Actuators>(&mut self, state: &VehicleState, fresh: bool, actuators: &mut A) {
        let solution = match &self.solution {
            Some(solution) => solution,
            None => return,
        };
        // The status only reports the installation on the tick of a first solution
        let initializing = fresh && self.status == PvgStatus::Initialized;
        let t = state.t;
        self.tgo = solution.tgo(t);
        self.vgo = solution.vgo(t);

        if self.tgo < self.config.terminal_time_s && !initializing {
            info!("PVG terminal guidance with tgo = {:.2} s", self.tgo);
            self.status = PvgStatus::Terminal;
            self.last_miss = None;
            actuators.set_time_warp_allowed(false);
            self.command_frozen_attitude(actuators);
            actuators.set_throttle(1.0);
            return;
        }

        let (pitch, heading) = solution.pitch_heading_deg(t);
        if pitch.is_finite() && heading.is_finite() {
            self.pitch_deg = pitch;
            self.heading_deg = heading;
            self.direction = solution.thrust_direction(t);
            actuators.set_attitude(AttitudeTarget::PitchHeading {
                pitch_deg: pitch,
                heading_deg: heading,
            });
        } else {
            warn!("PVG steering is undefined at t = {t:.3} s, following surface prograde");
            actuators.set_attitude(AttitudeTarget::SurfacePrograde);
        }

        let coasting = solution.is_coasting(t);
        if !initializing {
            self.status = if coasting {
                PvgStatus::Coasting
            } else {
                PvgStatus::Burning
            };
        }
        if coasting {
            actuators.set_throttle(0.0);
            actuators.set_rcs(true);
            actuators.set_autostage_suspended(true);
        } else {
            actuators.set_throttle(solution.throttle(t));
            actuators.set_rcs(false);
            actuators.set_autostage_suspended(false);
        }
    }

    fn terminal_tick<A: Actuators>(&mut self, state: &VehicleState, dt: f64, actuators: &mut A) {
        let rcs = self.status == PvgStatus::TerminalRcs;
        if !rcs {
            if let Some(solution) = &self.solution {
                self.tgo = solution.tgo(state.t);
                self.vgo = solution.vgo(state.t);
            }
        }
        self.command_frozen_attitude(actuators);

        let accel = if rcs { state.rcs_accel } else { state.thrust_accel };
        let miss = match self.lookahead_miss(state, accel, dt) {
            Some(miss) => miss,
            None => {
                warn!("PVG miss metric is undefined, ending the guidance");
                self.finish(actuators);
                return;
            }
        };
        let improving = self.last_miss.map_or(true, |prev| miss < prev);
        self.last_miss = Some(miss);
        if improving {
            return;
        }

        if !rcs && state.rcs_accel > 0.0 && state.alignment_cos > self.config.min_alignment_cos {
            info!("PVG engine cutoff with miss {miss:.3e}, finishing on RCS");
            self.status = PvgStatus::TerminalRcs;
            self.last_miss = None;
            actuators.set_throttle(0.0);
            actuators.set_rcs(true);
            actuators.set_rcs_forward(1.0);
        } else {
            info!("PVG cutoff with miss {miss:.3e}");
            self.finish(actuators);
        }
    }

    /// Miss of the osculating orbit a few ticks ahead, assuming the current acceleration along the thrust axis.
    fn lookahead_miss(&self, state: &VehicleState, accel: f64, dt: f64) -> Option<f64> {
        let solution = &self.solution.as_ref()?.solution;
        let mu = solution.scales.mu;
        let lookahead = f64::from(self.config.tick_lookahead.max(1)) * dt;
        let rmag = state.r.norm();
        let gravity = -mu / rmag.powi(3) * state.r;
        let axis = self.direction.unwrap_or_else(|| state.v / state.v.norm());
        let v = state.v + (gravity + accel * axis) * lookahead;
        let r = state.r + state.v * lookahead;
        let miss = solution.target.miss(&r, &v, mu);
        miss.is_finite().then_some(miss)
    }

    fn command_frozen_attitude<A: Actuators>(&self, actuators: &mut A) {
        if self.direction.is_some() {
            actuators.set_attitude(AttitudeTarget::PitchHeading {
                pitch_deg: self.pitch_deg,
                heading_deg: self.heading_deg,
            });
        } else {
            actuators.set_attitude(AttitudeTarget::SurfacePrograde);
        }
    }

    fn finish<A: Actuators>(&mut self, actuators: &mut A) {
        self.status = PvgStatus::Finished;
        actuators.set_throttle(0.0);
        actuators.set_rcs_forward(0.0);
        actuators.set_rcs(false);
        actuators.set_autostage_suspended(false);
        actuators.set_time_warp_allowed(true);
        info!("PVG guidance finished");
    }
}

impl AscentGuidance for GuidanceController {
    fn status(&self) -> PvgStatus {
        self.status
    }

    fn pitch_deg(&self) -> f64 {
        self.pitch_deg
    }

    fn heading_deg(&self) -> f64 {
        self.heading_deg
    }

    fn tgo(&self) -> f64 {
        self.tgo
    }

    fn vgo(&self) -> f64 {
        self.vgo
    }
}
