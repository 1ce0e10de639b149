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
use crate::linalg::{Vector3, Vector6};

/// `TwoBody` provides the equations of motion of a point mass around a spherical central body.
#[derive(Copy, Clone, Debug)]
pub struct TwoBody {
    /// Gravitational parameter of the central body
    pub mu: f64,
}

impl TwoBody {
    pub fn new(mu: f64) -> Self {
        Self { mu }
    }
}

impl Dynamics<6> for TwoBody {
    fn eom(&self, t: f64, state: &Vector6<f64>) -> Result<Vector6<f64>, DynamicsError> {
        let radius = Vector3::new(state[0], state[1], state[2]);
        let rmag = radius.norm();
        if rmag <= 0.0 || !rmag.is_finite() {
            return Err(DynamicsError::GravitySingularity { t, rmag });
        }
        let body_acceleration = (-self.mu / rmag.powi(3)) * radius;
        Ok(Vector6::new(
            state[3],
            state[4],
            state[5],
            body_acceleration[0],
            body_acceleration[1],
            body_acceleration[2],
        ))
    }
}
