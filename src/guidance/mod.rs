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

use crate::linalg::Vector3;
use serde_derive::{Deserialize, Serialize};
use std::fmt;
use typed_builder::TypedBuilder;

mod adapter;
pub use adapter::{Adapter, AdapterError, AdapterOutcome, StageInfo, TargetSpec};

mod config;
pub use config::{AdapterConfig, ControllerConfig, GuidanceConfig, EARTH_GM};

mod controller;
pub use controller::GuidanceController;

mod slot;
pub use slot::{SolutionSlot, Ticket};

mod worker;
pub use worker::{SolveRequest, SolverWorker};

/// Lifecycle of the guidance controller.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PvgStatus {
    /// Waiting for a first solution
    Enabled,
    /// A solution was just installed
    Initialized,
    Burning,
    Coasting,
    /// Steering is frozen until the miss metric stops improving
    Terminal,
    /// The main engine is off and the RCS finishes the burn
    TerminalRcs,
    /// All actuators are released
    Finished,
}

impl PvgStatus {
    /// Whether the guidance is flying a solution, in which case the attitude layer may follow it.
    pub fn is_stable(&self) -> bool {
        matches!(
            self,
            Self::Burning | Self::Coasting | Self::Terminal | Self::TerminalRcs
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Terminal | Self::TerminalRcs)
    }
}

impl fmt::Display for PvgStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Enabled => "enabled",
            Self::Initialized => "initialized",
            Self::Burning => "burning",
            Self::Coasting => "coasting",
            Self::Terminal => "terminal",
            Self::TerminalRcs => "terminal (RCS)",
            Self::Finished => "finished",
        };
        write!(f, "{name}")
    }
}

/// Attitude command for the attitude control layer.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum AttitudeTarget {
    /// Pitch above the local horizon and heading from north, in degrees
    PitchHeading { pitch_deg: f64, heading_deg: f64 },
    /// Follow the velocity relative to the surface
    SurfacePrograde,
}

/// Outputs of the controller, implemented by the vehicle.
pub trait Actuators {
    /// Throttle between zero and one
    fn set_throttle(&mut self, throttle: f64);
    fn set_attitude(&mut self, target: AttitudeTarget);
    /// Enables the RCS, e.g. for ullage during coasts
    fn set_rcs(&mut self, enabled: bool);
    /// RCS thrust along the thrust axis, between zero and one
    fn set_rcs_forward(&mut self, level: f64);
    /// Prevents automatic staging, which must not happen during coasts
    fn set_autostage_suspended(&mut self, suspended: bool);
    fn set_time_warp_allowed(&mut self, allowed: bool);
}

/// Vehicle telemetry at one control tick, in SI units and inertial axes.
#[derive(Copy, Clone, Debug, PartialEq, TypedBuilder)]
pub struct VehicleState {
    /// Mission time (s)
    pub t: f64,
    pub r: Vector3<f64>,
    pub v: Vector3<f64>,
    pub mass: f64,
    /// Current acceleration of the main engines (m/s²)
    #[builder(default = 0.0)]
    pub thrust_accel: f64,
    /// Acceleration the RCS can provide along the thrust axis (m/s²)
    #[builder(default = 0.0)]
    pub rcs_accel: f64,
    /// Cosine of the angle between the thrust axis and the commanded direction
    #[builder(default = 1.0)]
    pub alignment_cos: f64,
    #[builder(default = true)]
    pub lifted_off: bool,
}

/// What an ascent mode reads back from the guidance.
pub trait AscentGuidance {
    fn status(&self) -> PvgStatus;
    /// Commanded pitch in degrees
    fn pitch_deg(&self) -> f64;
    /// Commanded heading in degrees
    fn heading_deg(&self) -> f64;
    /// Time to go until the end of the final burn (s)
    fn tgo(&self) -> f64;
    /// Ideal velocity to go until the end of the final burn (m/s)
    fn vgo(&self) -> f64;

    fn is_stable(&self) -> bool {
        self.status().is_stable()
    }
}
