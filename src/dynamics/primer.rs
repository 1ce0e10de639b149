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

use super::{Dynamics, DynamicsError};
use crate::linalg::{SVector, Vector3};

/// Dimension of the guidance state: position, velocity, position costate, velocity costate and mass.
pub const PVG_STATE_DIM: usize = 13;

/// The 13 element guidance state vector, in normalized units (`mu = 1`).
pub type PvgState = SVector<f64, PVG_STATE_DIM>;

/// Minimum norm of the primer vector for its direction to be defined.
const PRIMER_EPSILON: f64 = 1e-14;

pub fn position(y: &PvgState) -> Vector3<f64> {
    y.fixed_rows::<3>(0).into_owned()
}

pub fn velocity(y: &PvgState) -> Vector3<f64> {
    y.fixed_rows::<3>(3).into_owned()
}

/// Position costate, p_r
pub fn pos_costate(y: &PvgState) -> Vector3<f64> {
    y.fixed_rows::<3>(6).into_owned()
}

/// Velocity costate, p_v, which is the primer vector
pub fn primer(y: &PvgState) -> Vector3<f64> {
    y.fixed_rows::<3>(9).into_owned()
}

pub fn mass(y: &PvgState) -> f64 {
    y[12]
}

/// Assembles a guidance state from its components.
pub fn pvg_state(
    r: &Vector3<f64>,
    v: &Vector3<f64>,
    pr: &Vector3<f64>,
    pv: &Vector3<f64>,
    mass: f64,
) -> PvgState {
    let mut y = PvgState::zeros();
    y.fixed_rows_mut::<3>(0).copy_from(r);
    y.fixed_rows_mut::<3>(3).copy_from(v);
    y.fixed_rows_mut::<3>(6).copy_from(pr);
    y.fixed_rows_mut::<3>(9).copy_from(pv);
    y[12] = mass;
    y
}

/// Unit thrust direction along the primer vector, or `None` if the primer vanishes.
pub fn primer_direction(y: &PvgState) -> Option<Vector3<f64>> {
    let pv = primer(y);
    let pvmag = pv.norm();
    if pvmag > PRIMER_EPSILON && pvmag.is_finite() {
        Some(pv / pvmag)
    } else {
        None
    }
}

/// The part of the Hamiltonian which does not depend on thrust, `p_r·v - p_v·r/|r|³`.
///
/// It is constant along a coast arc, and it is the switching function between a coast and the next burn.
pub fn coast_hamiltonian(y: &PvgState) -> f64 {
    let r = position(y);
    let rmag = r.norm();
    pos_costate(y).dot(&velocity(y)) - primer(y).dot(&r) / rmag.powi(3)
}

/// `PrimerDynamics` are the normalized two body equations of motion of a vehicle whose thrust is steered along
/// the primer vector, together with the costate equations from the minimum principle.
///
/// A zero thrust makes this a coast arc, in which case the mass is constant.
#[derive(Copy, Clone, Debug)]
pub struct PrimerDynamics {
    /// Normalized thrust
    pub thrust: f64,
    /// Normalized effective exhaust velocity, `Isp * g0`
    pub exhaust_velocity: f64,
}

impl PrimerDynamics {
    pub fn burn(thrust: f64, exhaust_velocity: f64) -> Self {
        Self {
            thrust,
            exhaust_velocity,
        }
    }

    pub fn coast() -> Self {
        Self {
            thrust: 0.0,
            exhaust_velocity: 1.0,
        }
    }

    pub fn is_coast(&self) -> bool {
        self.thrust <= 0.0
    }

    /// Mass flow rate, positive while burning.
    pub fn mass_flow(&self) -> f64 {
        if self.is_coast() {
            0.0
        } else {
            self.thrust / self.exhaust_velocity
        }
    }
}

impl Dynamics<PVG_STATE_DIM> for PrimerDynamics {
    fn eom(&self, t: f64, y: &PvgState) -> Result<PvgState, DynamicsError> {
        let r = position(y);
        let v = velocity(y);
        let pr = pos_costate(y);
        let pv = primer(y);
        let m = mass(y);

        let rmag = r.norm();
        if rmag <= 0.0 || !rmag.is_finite() {
            return Err(DynamicsError::GravitySingularity { t, rmag });
        }
        let r3 = rmag.powi(3);
        let r5 = rmag.powi(5);

        let mut accel = -r / r3;
        if !self.is_coast() {
            if m <= 0.0 {
                return Err(DynamicsError::MassExhausted { t, mass: m });
            }
            if let Some(u) = primer_direction(y) {
                accel += (self.thrust / m) * u;
            }
        }

        let pr_dot = pv / r3 - (3.0 * r.dot(&pv) / r5) * r;
        let pv_dot = -pr;

        Ok(pvg_state(&v, &accel, &pr_dot, &pv_dot, -self.mass_flow()))
    }
}
