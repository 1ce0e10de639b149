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

use crate::linalg::{SVector, Vector3};

/// Returns the provided angle bounded between 0.0 and 360.0.
pub fn between_0_360(angle: f64) -> f64 {
    let bounded = angle.rem_euclid(360.0);
    if bounded >= 360.0 {
        0.0
    } else {
        bounded
    }
}

/// Cubic Hermite interpolation between two states whose time derivatives are known.
///
/// Returns the endpoint states exactly at `t0` and `t1`. The interval may be reversed (`t1 < t0`) for backward
/// integration but must not be empty.
#[allow(clippy::too_many_arguments)]
pub fn hermite_interp<const N: usize>(
    t0: f64,
    y0: &SVector<f64, N>,
    f0: &SVector<f64, N>,
    t1: f64,
    y1: &SVector<f64, N>,
    f1: &SVector<f64, N>,
    t: f64,
) -> SVector<f64, N> {
    let h = t1 - t0;
    let s = (t - t0) / h;
    let s2 = s * s;
    let s3 = s2 * s;
    let h00 = 2.0 * s3 - 3.0 * s2 + 1.0;
    let h10 = s3 - 2.0 * s2 + s;
    let h01 = -2.0 * s3 + 3.0 * s2;
    let h11 = s3 - s2;
    y0 * h00 + f0 * (h10 * h) + y1 * h01 + f1 * (h11 * h)
}

/// Specific angular momentum vector.
pub fn angular_momentum(r: &Vector3<f64>, v: &Vector3<f64>) -> Vector3<f64> {
    r.cross(v)
}

/// Eccentricity vector, pointing towards periapsis.
pub fn eccentricity_vector(r: &Vector3<f64>, v: &Vector3<f64>, mu: f64) -> Vector3<f64> {
    v.cross(&angular_momentum(r, v)) / mu - r / r.norm()
}

/// Unit normal of an orbital plane from its inclination and right ascension of the ascending node (radians).
pub fn orbit_normal(inc_rad: f64, raan_rad: f64) -> Vector3<f64> {
    Vector3::new(
        inc_rad.sin() * raan_rad.sin(),
        -inc_rad.sin() * raan_rad.cos(),
        inc_rad.cos(),
    )
}

/// Unit vector towards the ascending node of the orbital plane.
pub fn ascending_node(raan_rad: f64) -> Vector3<f64> {
    Vector3::new(raan_rad.cos(), raan_rad.sin(), 0.0)
}

/// Rotates `v` about the unit vector `axis` by `angle_rad` (Rodrigues formula).
pub fn rotate_about(v: &Vector3<f64>, axis: &Vector3<f64>, angle_rad: f64) -> Vector3<f64> {
    let (s, c) = angle_rad.sin_cos();
    v * c + axis.cross(v) * s + axis * axis.dot(v) * (1.0 - c)
}

/// Local horizon frame at the provided position: up, east and north unit vectors.
///
/// East is along `ẑ × up`, so the frame is undefined exactly on the polar axis where the inertial X axis is used instead.
pub fn local_horizon(r: &Vector3<f64>) -> (Vector3<f64>, Vector3<f64>, Vector3<f64>) {
    let up = r / r.norm();
    let z_cross = Vector3::<f64>::z().cross(&up);
    let east = if z_cross.norm() > 1e-12 {
        z_cross.normalize()
    } else {
        Vector3::<f64>::x().cross(&up).normalize()
    };
    let north = up.cross(&east);
    (up, east, north)
}

/// Pitch above the local horizon and heading from north (clockwise, towards east) of the provided direction,
/// both in degrees. The heading is in [0, 360).
pub fn pitch_heading_deg(dir: &Vector3<f64>, r: &Vector3<f64>) -> (f64, f64) {
    let (up, east, north) = local_horizon(r);
    let u = dir / dir.norm();
    let pitch = u.dot(&up).clamp(-1.0, 1.0).asin().to_degrees();
    let heading = between_0_360(u.dot(&east).atan2(u.dot(&north)).to_degrees());
    (pitch, heading)
}
