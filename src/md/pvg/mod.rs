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

use crate::propagators::{ConicError, PropagationError};
use crate::tools::RootError;
use serde_derive::{Deserialize, Serialize};
use snafu::prelude::*;
use typed_builder::TypedBuilder;

mod guess;
mod optimizer;
mod problem;
mod solution;
mod target;

pub use optimizer::Optimizer;
pub use problem::AscentProblem;
pub use solution::{AnchoredSolution, Solution, SolutionArc};
pub use target::TargetConstraint;

/// Standard gravity, used to convert a specific impulse into an exhaust velocity (m/s²).
pub const STD_GRAVITY: f64 = 9.80665;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArcKind {
    Burn,
    Coast,
}

/// One arc of the flight plan, in physical units (SI).
///
/// Burn arcs other than the last one are flown to depletion, so their duration is fixed. The duration of coast
/// arcs and of the last burn is solved for, and the provided duration is only a first guess (and, for the last
/// burn, an upper bound).
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize, TypedBuilder)]
pub struct FlightArc {
    pub kind: ArcKind,
    /// Vacuum thrust in N
    #[builder(default = 0.0)]
    pub thrust: f64,
    /// Specific impulse in seconds
    #[builder(default = 0.0)]
    pub isp: f64,
    /// Duration in seconds
    pub duration: f64,
    /// Mass at the start of the arc (kg) when it is not the mass at the end of the previous arc, e.g. after staging
    #[builder(default, setter(strip_option))]
    pub start_mass: Option<f64>,
    /// Index of the vehicle stage flying this arc
    #[builder(default, setter(strip_option))]
    pub stage: Option<usize>,
}

impl FlightArc {
    pub fn burn(thrust: f64, isp: f64, duration: f64) -> Self {
        Self {
            kind: ArcKind::Burn,
            thrust,
            isp,
            duration,
            start_mass: None,
            stage: None,
        }
    }

    pub fn coast(duration: f64) -> Self {
        Self {
            kind: ArcKind::Coast,
            thrust: 0.0,
            isp: 0.0,
            duration,
            start_mass: None,
            stage: None,
        }
    }

    pub fn with_start_mass(mut self, mass: f64) -> Self {
        self.start_mass = Some(mass);
        self
    }

    pub fn with_stage(mut self, stage: usize) -> Self {
        self.stage = Some(stage);
        self
    }

    pub fn is_coast(&self) -> bool {
        self.kind == ArcKind::Coast
    }

    /// Effective exhaust velocity in m/s
    pub fn exhaust_velocity(&self) -> f64 {
        self.isp * STD_GRAVITY
    }

    /// Mass flow rate in kg/s
    pub fn mass_flow(&self) -> f64 {
        match self.kind {
            ArcKind::Burn => self.thrust / self.exhaust_velocity(),
            ArcKind::Coast => 0.0,
        }
    }
}

/// Normalization of the problem: lengths by the current radius, velocities by the local circular velocity, masses by
/// the current mass, such that the gravitational parameter is one.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Scales {
    pub mu: f64,
    pub length: f64,
    pub velocity: f64,
    pub time: f64,
    pub acceleration: f64,
    pub mass: f64,
}

impl Scales {
    pub fn new(mu: f64, radius: f64, mass: f64) -> Self {
        let velocity = (mu / radius).sqrt();
        Self {
            mu,
            length: radius,
            velocity,
            time: radius / velocity,
            acceleration: mu / (radius * radius),
            mass,
        }
    }

    /// Normalized thrust of an engine
    pub fn thrust(&self, thrust_n: f64) -> f64 {
        thrust_n / (self.mass * self.acceleration)
    }
}

/// Options of the optimal ascent solver.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize, TypedBuilder)]
#[builder(doc)]
#[serde(default)]
pub struct OptimizerOpts {
    /// Maximum number of residual evaluations is `patience * (unknowns + 1)`
    #[builder(default = 100)]
    pub patience: usize,
    #[builder(default = 1e-12)]
    pub ftol: f64,
    #[builder(default = 1e-12)]
    pub xtol: f64,
    #[builder(default = 0.0)]
    pub gtol: f64,
    /// Maximum norm of the normalized residuals of a converged solution
    #[builder(default = 1e-7)]
    pub convergence_tol: f64,
    /// Propagate coast arcs with the closed form conic propagator instead of the integrator
    #[builder(default = true)]
    pub conic_coasts: bool,
    /// Number of stored states per arc, used to interpolate the solution
    #[builder(default = 32)]
    pub samples_per_arc: usize,
    /// Tolerance of the integrator on burn arcs
    #[builder(default = 1e-12)]
    pub integration_tolerance: f64,
    /// Maximum integration step in normalized time
    #[builder(default = 0.05)]
    pub max_step: f64,
    /// Relative step of the central finite differences of the Jacobian
    #[builder(default = 1e-6)]
    pub fd_step: f64,
}

impl Default for OptimizerOpts {
    fn default() -> Self {
        Self::builder().build()
    }
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum OptimizerError {
    #[snafu(display(
        "optimizer did not converge: residual norm {residual:e} after {evaluations} evaluations ({reason})"
    ))]
    ConvergenceFailure {
        residual: f64,
        evaluations: usize,
        reason: String,
    },
    #[snafu(display("degenerate guidance problem: {msg}"))]
    DegenerateInput { msg: String },
    #[snafu(display("propagation of arc {arc} failed: {source}"))]
    ArcPropagation {
        arc: usize,
        source: PropagationError,
    },
    #[snafu(display("conic propagation of coast arc {arc} failed: {source}"))]
    ConicCoast { arc: usize, source: ConicError },
    #[snafu(display("initial guess search failed: {source}"))]
    InitialGuess { source: RootError },
}
