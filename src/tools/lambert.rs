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
use snafu::prelude::*;
use std::f64::consts::PI;

const TAU: f64 = 2.0 * PI;
/// Relative tolerance on the time-of-flight residual.
const LAMBERT_EPSILON_TIME: f64 = 1e-12;
/// Sine of the transfer angle below which the two position vectors are considered collinear.
const LAMBERT_EPSILON_RAD: f64 = 1e-8;
/// Maximum number of iterations allowed in the Lambert problem solver.
const MAX_ITERATIONS: usize = 100;
/// Below this magnitude of the universal parameter, the Stumpff functions use their series expansion.
const STUMPFF_SERIES_LIMIT: f64 = 1e-3;

#[derive(Debug, PartialEq, Snafu)]
pub enum LambertError {
    #[snafu(display("degenerate Lambert problem: {msg}"))]
    DegenerateInput { msg: String },
    #[snafu(display("Lambert solver did not converge after {iterations} iterations (z = {z})"))]
    IterationLimitExceeded { iterations: usize, z: f64 },
}

/// Define the transfer kind for a Lambert
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TransferKind {
    /// Transfer angle below 180 degrees, motion along `r_init × r_final`.
    ShortWay,
    /// Transfer angle above 180 degrees, motion opposite to `r_init × r_final`.
    LongWay,
}

#[derive(Copy, Clone, Debug)]
pub struct LambertSolution {
    pub v_init: Vector3<f64>,
    pub v_final: Vector3<f64>,
    /// Converged universal parameter (positive for ellipses, negative for hyperbolas).
    pub z: f64,
    pub iterations: usize,
}

/// Stumpff function C(z)
pub fn stumpff_c(z: f64) -> f64 {
    if z.abs() < STUMPFF_SERIES_LIMIT {
        0.5 - z / 24.0 + z * z / 720.0 - z.powi(3) / 40_320.0
    } else if z > 0.0 {
        (1.0 - z.sqrt().cos()) / z
    } else {
        ((-z).sqrt().cosh() - 1.0) / (-z)
    }
}

/// Stumpff function S(z)
pub fn stumpff_s(z: f64) -> f64 {
    if z.abs() < STUMPFF_SERIES_LIMIT {
        1.0 / 6.0 - z / 120.0 + z * z / 5_040.0 - z.powi(3) / 362_880.0
    } else if z > 0.0 {
        let sz = z.sqrt();
        (sz - sz.sin()) / sz.powi(3)
    } else {
        let sz = (-z).sqrt();
        (sz.sinh() - sz) / sz.powi(3)
    }
}

/// Solves the Lambert boundary value problem with the universal variable formulation (Bate, Mueller & White;
/// Curtis, algorithm 5.2), iterating on the universal parameter `z` with a bracketed Newton method.
///
/// Only single revolution transfers are supported.
pub fn lambert(
    r_init: &Vector3<f64>,
    r_final: &Vector3<f64>,
    tof: f64,
    mu: f64,
    kind: TransferKind,
) -> Result<LambertSolution, LambertError> {
    let r1 = r_init.norm();
    let r2 = r_final.norm();

    ensure!(
        tof > 0.0 && tof.is_finite(),
        DegenerateInputSnafu {
            msg: format!("time of flight must be positive, got {tof}")
        }
    );
    ensure!(
        mu > 0.0,
        DegenerateInputSnafu {
            msg: format!("gravitational parameter must be positive, got {mu}")
        }
    );
    ensure!(
        r1 > 0.0 && r2 > 0.0,
        DegenerateInputSnafu {
            msg: "zero length position vector".to_string()
        }
    );

    let sin_abs = r_init.cross(r_final).norm() / (r1 * r2);
    ensure!(
        sin_abs > LAMBERT_EPSILON_RAD,
        DegenerateInputSnafu {
            msg: "position vectors are collinear, transfer plane undefined".to_string()
        }
    );

    let cos_dnu = (r_init.dot(r_final) / (r1 * r2)).clamp(-1.0, 1.0);
    let dnu = match kind {
        TransferKind::ShortWay => cos_dnu.acos(),
        TransferKind::LongWay => TAU - cos_dnu.acos(),
    };

    let a = dnu.sin() * (r1 * r2 / (1.0 - cos_dnu)).sqrt();
    let sqrt_mu = mu.sqrt();
    let target = sqrt_mu * tof;

    let y_of = |z: f64| r1 + r2 + a * (z * stumpff_s(z) - 1.0) / stumpff_c(z).sqrt();
    // Time-of-flight residual, undefined where y < 0
    let residual = |z: f64| -> Option<(f64, f64)> {
        let y = y_of(z);
        if y < 0.0 {
            return None;
        }
        let c = stumpff_c(z);
        let s = stumpff_s(z);
        Some(((y / c).powf(1.5) * s + a * y.sqrt() - target, y))
    };
    let derivative = |z: f64, y: f64| -> f64 {
        if z.abs() < 1e-6 {
            2.0_f64.sqrt() / 40.0 * y.powf(1.5)
                + a / 8.0 * (y.sqrt() + a * (1.0 / (2.0 * y)).sqrt())
        } else {
            let c = stumpff_c(z);
            let s = stumpff_s(z);
            (y / c).powf(1.5)
                * (1.0 / (2.0 * z) * (c - 1.5 * s / c) + 0.75 * s * s / c)
                + a / 8.0 * (3.0 * s / c * y.sqrt() + a * (c / y).sqrt())
        }
    };

    // Lower end of the bracket: the residual is negative or y is negative
    let mut z_lo = -100.0;
    while let Some((f, _)) = residual(z_lo) {
        if f < 0.0 {
            break;
        }
        z_lo *= 2.0;
        ensure!(
            z_lo > -1e5,
            DegenerateInputSnafu {
                msg: format!("time of flight {tof} too short for a hyperbolic transfer")
            }
        );
    }
    // The time of flight grows without bound as z approaches 4π²
    let mut z_hi = TAU * TAU * (1.0 - 1e-9);

    let mut z = if z_lo < 0.0 && residual(0.0).is_some() {
        0.0
    } else {
        0.5 * (z_lo + z_hi)
    };

    for iteration in 0..MAX_ITERATIONS {
        let (f, y) = match residual(z) {
            Some(fy) => fy,
            None => {
                z_lo = z;
                z = 0.5 * (z_lo + z_hi);
                continue;
            }
        };

        if f.abs() <= LAMBERT_EPSILON_TIME * target || (z_hi - z_lo).abs() < 1e-14 {
            let f_lag = 1.0 - y / r1;
            let g_lag = a * (y / mu).sqrt();
            let gdot = 1.0 - y / r2;
            debug!("Lambert converged in {iteration} iterations (z = {z})");
            return Ok(LambertSolution {
                v_init: (r_final - f_lag * r_init) / g_lag,
                v_final: (gdot * r_final - r_init) / g_lag,
                z,
                iterations: iteration,
            });
        }

        if f < 0.0 {
            z_lo = z;
        } else {
            z_hi = z;
        }

        let next = z - f / derivative(z, y);
        z = if next.is_finite() && next > z_lo && next < z_hi {
            next
        } else {
            0.5 * (z_lo + z_hi)
        };
    }

    Err(LambertError::IterationLimitExceeded {
        iterations: MAX_ITERATIONS,
        z,
    })
}

#[cfg(test)]
mod ut_lambert {
    use super::*;

    #[test]
    fn stumpff_continuity() {
        for z in [STUMPFF_SERIES_LIMIT, -STUMPFF_SERIES_LIMIT] {
            let below = z * (1.0 - 1e-9);
            let above = z * (1.0 + 1e-9);
            assert!((stumpff_c(below) - stumpff_c(above)).abs() < 1e-9);
            assert!((stumpff_s(below) - stumpff_s(above)).abs() < 1e-9);
        }
        assert!((stumpff_c(0.0) - 0.5).abs() < f64::EPSILON);
        assert!((stumpff_s(0.0) - 1.0 / 6.0).abs() < f64::EPSILON);
    }

    #[test]
    fn collinear_is_degenerate() {
        let r1 = Vector3::new(1.0, 0.0, 0.0);
        let r2 = Vector3::new(-2.0, 0.0, 0.0);
        let err = lambert(&r1, &r2, 1.0, 1.0, TransferKind::ShortWay).unwrap_err();
        assert!(matches!(err, LambertError::DegenerateInput { .. }));
    }

    #[test]
    fn quarter_circle() {
        let r1 = Vector3::new(1.0, 0.0, 0.0);
        let r2 = Vector3::new(0.0, 1.0, 0.0);
        let sol = lambert(&r1, &r2, PI / 2.0, 1.0, TransferKind::ShortWay).unwrap();
        assert!((sol.v_init - Vector3::new(0.0, 1.0, 0.0)).norm() < 1e-9);
        assert!((sol.v_final - Vector3::new(-1.0, 0.0, 0.0)).norm() < 1e-9);
        assert!(sol.z > 0.0);
    }
}
