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

use super::error_ctrl::{ErrorCtrl, RSSState};
use super::{Dormand45, IntegrationDetails, PropInstance, PropOpts, RK};
use crate::dynamics::Dynamics;
use crate::linalg::SVector;

/// A Propagator allows propagating a set of dynamics forward or backward in time.
/// It includes the options and the set of coefficients used for the monomorphic instance.
#[derive(Clone, Debug)]
pub struct Propagator<D, E, const N: usize>
where
    D: Dynamics<N>,
    E: ErrorCtrl,
{
    pub dynamics: D, // Stores the dynamics used. *Must* use this to get the latest values
    pub opts: PropOpts<E>, // Stores the integration options (tolerance, min/max step, init step, etc.)
    pub(crate) order: u8,  // Order of the integrator
    pub(crate) stages: usize, // Number of stages, i.e. how many times the derivatives will be called
    pub(crate) fsal: bool,
    pub(crate) a_coeffs: &'static [f64],
    pub(crate) b_coeffs: &'static [f64],
}

impl<D, E, const N: usize> Propagator<D, E, N>
where
    D: Dynamics<N>,
    E: ErrorCtrl,
{
    /// Each propagator must be initialized with `new` which stores propagator information.
    pub fn new<T: RK>(dynamics: D, opts: PropOpts<E>) -> Self {
        Self {
            dynamics,
            opts,
            stages: T::STAGES,
            order: T::ORDER,
            fsal: T::FSAL,
            a_coeffs: T::A_COEFFS,
            b_coeffs: T::B_COEFFS,
        }
    }

    /// A Dormand Prince 5(4) propagator with custom propagator options.
    pub fn dp45(dynamics: D, opts: PropOpts<E>) -> Self {
        Self::new::<Dormand45>(dynamics, opts)
    }

    /// Set the tolerance for the propagator
    pub fn set_tolerance(&mut self, tol: f64) {
        self.opts.tolerance = tol;
    }

    /// Set the maximum step size for the propagator and sets the initial step to that value if currently greater
    pub fn set_max_step(&mut self, step: f64) {
        self.opts.set_max_step(step);
    }

    pub fn set_min_step(&mut self, step: f64) {
        self.opts.set_min_step(step);
    }

    /// Initializes an instance of this propagator at time `t` with the provided state.
    pub fn with(&self, t: f64, state: SVector<f64, N>) -> PropInstance<'_, D, E, N> {
        // Pre-allocate the k used in the propagator
        let k = vec![SVector::<f64, N>::zeros(); self.stages];
        PropInstance {
            t,
            state,
            prop: self,
            details: IntegrationDetails {
                step: self.opts.init_step,
                error: 0.0,
                attempts: 1,
            },
            step_size: self.opts.init_step.abs(),
            k,
            deriv: None,
            iterations: 0,
        }
    }
}

impl<D, const N: usize> Propagator<D, RSSState, N>
where
    D: Dynamics<N>,
{
    /// Default propagator is a Dormand Prince 5(4) with the default PropOpts.
    pub fn default(dynamics: D) -> Self {
        Self::new::<Dormand45>(dynamics, PropOpts::default())
    }
}
