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

use crate::linalg::SVector;
use snafu::Snafu;

/// Two body point mass dynamics, used for coasting and as a reference for the closed form propagator.
pub mod orbital;
pub use self::orbital::*;

/// Powered flight dynamics with the Pontryagin costates, where the thrust follows the primer vector.
pub mod primer;
pub use self::primer::*;

/// A trait for models with equations of motion that can be integrated.
///
/// `N` is the dimension of the state vector. Time is an `f64` in the unit of the dynamics (seconds, or
/// normalized time for the guidance problem).
pub trait Dynamics<const N: usize>: Clone + Sync + Send {
    /// Defines the equations of motion.
    ///
    /// - `t`: Time of the evaluation, in the time unit of the dynamics.
    /// - `state`: The state vector, which changes at each integration step.
    fn eom(&self, t: f64, state: &SVector<f64, N>) -> Result<SVector<f64, N>, DynamicsError>;
}

/// Errors raised by the equations of motion.
#[derive(Debug, PartialEq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum DynamicsError {
    /// The radius vanished and the gravity term is undefined.
    #[snafu(display("gravity singularity at t = {t}: radius is {rmag}"))]
    GravitySingularity { t: f64, rmag: f64 },
    /// Mass is depleted while the engine is still firing.
    #[snafu(display("mass exhausted at t = {t}: mass is {mass}"))]
    MassExhausted { t: f64, mass: f64 },
}
