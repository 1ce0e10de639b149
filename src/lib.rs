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

/*! # nyx-pvg

Powered explicit guidance for launch vehicles: the optimal ascent trajectory to a target orbit is solved with the
primer vector theory as a multi-arc boundary value problem, and flown by a finite state machine which drives the
throttle and attitude of the vehicle.

The numerical building blocks (Brent root finding, the Dormand Prince integrator with events, the universal variable
conic propagator and the Lambert solver) are usable on their own.
*/

/// Provides the adaptive integrator and the closed form conic propagator.
pub mod propagators;

/// Equations of motion, including the state and costate dynamics of the guidance problem.
pub mod dynamics;

/// Utility functions shared by different modules, and which may be useful to engineers.
pub mod utils;

mod errors;
/// Functions which may fail return an error: this is the union of all of them.
pub use self::errors::PvgError;

/// Loading of the guidance configuration.
pub mod io;

/// The optimal ascent problem and its solver.
pub mod md;

/// Simple tools (root finding, Lambert solver)
pub mod tools;

/// Closed loop guidance: controller, adapter and solver hand-off.
pub mod guidance;

#[macro_use]
extern crate log;
extern crate nalgebra as na;

/// Re-export nalgebra
pub mod linalg {
    pub use na::base::*;
}

/// Re-export some useful things
pub use self::guidance::{GuidanceController, PvgStatus};
pub use self::md::pvg::{AscentProblem, Optimizer, Solution};
