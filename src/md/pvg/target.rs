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

use super::{OptimizerError, Scales};
use approx::abs_diff_eq;
use crate::dynamics::{coast_hamiltonian, pos_costate, position, primer, velocity, PvgState};
use crate::linalg::Vector3;
use crate::utils::{angular_momentum, ascending_node, eccentricity_vector, orbit_normal, rotate_about};

/// Eccentricity below which a target orbit is treated as circular.
const CIRCULAR_ECCENTRICITY: f64 = 1e-9;

/// Terminal conditions of the ascent.
///
/// Before a solve these are in physical units. The optimizer works with a copy normalized by its [`Scales`].
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum TargetConstraint {
    /// Reach the orbit given by its angular momentum and eccentricity vectors, anywhere along that orbit.
    Kepler { h: Vector3<f64>, e: Vector3<f64> },
    /// Reach the orbital plane and energy given by the angular momentum, at the provided radius and radial velocity,
    /// with a free argument of periapsis.
    Attach {
        h: Vector3<f64>,
        radius: f64,
        radial_velocity: f64,
    },
}

impl TargetConstraint {
    /// Builds the target from the apsides of the orbit and its orientation (angles in radians).
    ///
    /// Circular targets and targets with a set argument of periapsis are reached anywhere on the orbit. Otherwise the
    /// insertion happens at the attach radius (periapsis by default), on the ascending side of the orbit.
    #[allow(clippy::too_many_arguments)]
    pub fn from_apsides(
        mu: f64,
        periapsis_radius: f64,
        apoapsis_radius: f64,
        inc_rad: f64,
        raan_rad: f64,
        argp_rad: Option<f64>,
        attach_radius: Option<f64>,
    ) -> Result<Self, OptimizerError> {
        if !(periapsis_radius > 0.0 && apoapsis_radius >= periapsis_radius && mu > 0.0) {
            return Err(OptimizerError::DegenerateInput {
                msg: format!(
                    "invalid target apsides: periapsis {periapsis_radius}, apoapsis {apoapsis_radius}"
                ),
            });
        }
        let ecc = (apoapsis_radius - periapsis_radius) / (apoapsis_radius + periapsis_radius);
        let sma = 0.5 * (apoapsis_radius + periapsis_radius);
        let slr = sma * (1.0 - ecc * ecc);
        let h_hat = orbit_normal(inc_rad, raan_rad);
        let h = h_hat * (mu * slr).sqrt();

        if abs_diff_eq!(ecc, 0.0, epsilon = CIRCULAR_ECCENTRICITY) {
            return Ok(Self::Kepler {
                h,
                e: Vector3::zeros(),
            });
        }

        match argp_rad {
            Some(argp) => {
                let periapsis_dir = rotate_about(&ascending_node(raan_rad), &h_hat, argp);
                Ok(Self::Kepler {
                    h,
                    e: ecc * periapsis_dir,
                })
            }
            None => {
                let radius = attach_radius.unwrap_or(periapsis_radius);
                if radius < periapsis_radius || radius > apoapsis_radius {
                    return Err(OptimizerError::DegenerateInput {
                        msg: format!(
                            "attach radius {radius} is outside of the target orbit [{periapsis_radius}, {apoapsis_radius}]"
                        ),
                    });
                }
                // e·sin(nu) factored by the distances to both apsides, exactly zero at either of them
                let (rp, ra) = (periapsis_radius, apoapsis_radius);
                let e_sin_nu =
                    2.0 * (rp * ra * (radius - rp) * (ra - radius)).sqrt() / ((rp + ra) * radius);
                Ok(Self::Attach {
                    h,
                    radius,
                    radial_velocity: (mu / slr).sqrt() * e_sin_nu,
                })
            }
        }
    }

    /// Target angular momentum vector
    pub fn angular_momentum(&self) -> Vector3<f64> {
        match self {
            Self::Kepler { h, .. } | Self::Attach { h, .. } => *h,
        }
    }

    /// Radius at which the insertion is expected: periapsis for the orbit targets, attach radius otherwise.
    pub fn insertion_radius(&self, mu: f64) -> f64 {
        match self {
            Self::Kepler { h, e } => h.norm_squared() / mu / (1.0 + e.norm()),
            Self::Attach { radius, .. } => *radius,
        }
    }

    /// Velocity on the target orbit at the provided position, which is assumed to be in the target plane.
    pub fn velocity_at(&self, r: &Vector3<f64>, mu: f64) -> Vector3<f64> {
        let r_hat = r / r.norm();
        match self {
            Self::Kepler { h, e } => {
                let hmag = h.norm();
                (mu / hmag) * (h / hmag).cross(&(e + r_hat))
            }
            Self::Attach {
                h, radial_velocity, ..
            } => {
                let hmag = h.norm();
                *radial_velocity * r_hat + (hmag / r.norm()) * (h / hmag).cross(&r_hat)
            }
        }
    }

    /// Returns this target in normalized units.
    pub fn normalized(&self, scales: &Scales) -> Self {
        let h_scale = scales.length * scales.velocity;
        match self {
            Self::Kepler { h, e } => Self::Kepler { h: h / h_scale, e: *e },
            Self::Attach {
                h,
                radius,
                radial_velocity,
            } => Self::Attach {
                h: h / h_scale,
                radius: radius / scales.length,
                radial_velocity: radial_velocity / scales.velocity,
            },
        }
    }

    /// Terminal residuals of a normalized final state, including the transversality condition.
    pub fn residuals(&self, y: &PvgState) -> [f64; 6] {
        let r = position(y);
        let v = velocity(y);
        let h = angular_momentum(&r, &v);
        match self {
            Self::Kepler { h: h_t, e: e_t } => {
                let dh = h - h_t;
                let de = eccentricity_vector(&r, &v, 1.0) - e_t;
                // h·e = 0, so the eccentricity along the axis closest to the normal is redundant
                let h_hat = h_t / h_t.norm();
                let drop = h_hat.iamax();
                let kept: Vec<usize> = (0..3).filter(|k| *k != drop).collect();
                [
                    dh[0],
                    dh[1],
                    dh[2],
                    de[kept[0]],
                    de[kept[1]],
                    coast_hamiltonian(y),
                ]
            }
            Self::Attach {
                h: h_t,
                radius,
                radial_velocity,
            } => {
                let dh = h - h_t;
                let rmag = r.norm();
                let h_hat = h_t / h_t.norm();
                let rotation = h_hat.dot(&(r.cross(&pos_costate(y)) + v.cross(&primer(y))));
                [
                    dh[0],
                    dh[1],
                    dh[2],
                    rmag - radius,
                    r.dot(&v) / rmag - radial_velocity,
                    rotation,
                ]
            }
        }
    }

    /// Normalized distance of an osculating state from the target, in physical units.
    pub fn miss(&self, r: &Vector3<f64>, v: &Vector3<f64>, mu: f64) -> f64 {
        let h = angular_momentum(r, v);
        let h_t = self.angular_momentum();
        let dh = (h - h_t).norm() / h_t.norm();
        match self {
            Self::Kepler { e, .. } => dh + (eccentricity_vector(r, v, mu) - e).norm(),
            Self::Attach {
                radial_velocity, ..
            } => {
                let rmag = r.norm();
                dh + (r.dot(v) / rmag - radial_velocity).abs() / (mu / rmag).sqrt()
            }
        }
    }
}

#[cfg(test)]
mod ut_target {
    use super::*;
    use crate::dynamics::pvg_state;

    #[test]
    fn circular_target_residuals() {
        let target = TargetConstraint::from_apsides(1.0, 1.1, 1.1, 0.3, 0.2, None, None).unwrap();
        assert!(matches!(target, TargetConstraint::Kepler { .. }));
        let h_hat = orbit_normal(0.3, 0.2);
        let r = ascending_node(0.2) * 1.1;
        let v = target.velocity_at(&r, 1.0);
        assert!((v.norm() - (1.0 / 1.1_f64).sqrt()).abs() < 1e-12);
        assert!(v.dot(&h_hat).abs() < 1e-12);
        // Primer along the velocity and p_r along the radius: p_r·v - p_v·r/r³ is zero
        let y = pvg_state(&r, &v, &(r * 0.0), &v, 0.8);
        for res in target.residuals(&y) {
            assert!(res.abs() < 1e-12, "{res}");
        }
        assert!(target.miss(&r, &v, 1.0) < 1e-12);
        assert!(target.miss(&r, &(v * 1.01), 1.0) > 1e-3);
    }

    #[test]
    fn elliptical_targets() {
        // Free argument of periapsis: attach at periapsis
        let target = TargetConstraint::from_apsides(1.0, 1.0, 2.0, 0.5, 0.0, None, None).unwrap();
        match target {
            TargetConstraint::Attach {
                radius,
                radial_velocity,
                ..
            } => {
                assert!((radius - 1.0).abs() < f64::EPSILON);
                assert!(radial_velocity.abs() < 1e-12);
            }
            _ => panic!("expected an attach target"),
        }
        assert!((target.insertion_radius(1.0) - 1.0).abs() < f64::EPSILON);

        // Attach at apoapsis and in between, on the ascending side
        for (radius, vr_zero) in [(2.0, true), (1.3, false)] {
            let target =
                TargetConstraint::from_apsides(1.0, 1.0, 2.0, 0.5, 0.0, None, Some(radius)).unwrap();
            match target {
                TargetConstraint::Attach {
                    h, radial_velocity, ..
                } => {
                    if vr_zero {
                        assert!(radial_velocity.abs() < f64::EPSILON);
                    } else {
                        assert!(radial_velocity > 0.0);
                    }
                    // Vis-viva with a semi-major axis of 1.5
                    let v2 = radial_velocity.powi(2) + (h.norm() / radius).powi(2);
                    assert!((v2 - (2.0 / radius - 1.0 / 1.5)).abs() < 1e-12, "{v2}");
                }
                _ => panic!("expected an attach target"),
            }
        }

        // Set argument of periapsis
        let target =
            TargetConstraint::from_apsides(1.0, 1.0, 2.0, 0.5, 0.0, Some(0.0), None).unwrap();
        match target {
            TargetConstraint::Kepler { e, .. } => {
                assert!((e - Vector3::new(1.0 / 3.0, 0.0, 0.0)).norm() < 1e-12);
            }
            _ => panic!("expected a Kepler target"),
        }
        assert!((target.insertion_radius(1.0) - 1.0).abs() < 1e-12);

        assert!(TargetConstraint::from_apsides(1.0, 2.0, 1.0, 0.5, 0.0, None, None).is_err());
        assert!(
            TargetConstraint::from_apsides(1.0, 1.0, 2.0, 0.5, 0.0, None, Some(3.0)).is_err()
        );
    }

    #[test]
    fn polar_target_drops_another_axis() {
        // For a polar orbit, the normal is in the equatorial plane and the z eccentricity must be kept
        let target =
            TargetConstraint::from_apsides(1.0, 1.0, 1.0, std::f64::consts::FRAC_PI_2, 0.0, None, None)
                .unwrap();
        let h = target.angular_momentum();
        assert_eq!((h / h.norm()).iamax(), 1);
        let r = Vector3::new(1.0, 0.0, 0.0);
        // Slightly eccentric state in the target plane: ez must show up in the residuals
        let v = Vector3::new(0.0, 0.0, 1.05);
        let y = pvg_state(&r, &v, &Vector3::zeros(), &v, 1.0);
        let res = target.residuals(&y);
        let e = eccentricity_vector(&r, &v, 1.0);
        assert!((res[3] - e[0]).abs() < 1e-12);
        assert!((res[4] - e[2]).abs() < 1e-12);
    }
}
