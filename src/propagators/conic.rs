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

use crate::linalg::{Matrix3, Matrix6, Vector3, Vector6};
use snafu::prelude::*;

/// Above this magnitude of `alpha * psi^2`, the universal variable is halved before using the series.
const SERIES_LIMIT: f64 = 1.0;
/// Maximum number of terms of the series of the universal functions.
const SERIES_MAX_TERMS: usize = 70;
/// Maximum number of halvings of the universal variable.
const MAX_HALVINGS: usize = 30;
/// Maximum number of bracket expansions of the universal variable.
const MAX_BRACKET_EXPANSIONS: usize = 200;

#[derive(Debug, PartialEq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ConicError {
    #[snafu(display(
        "universal Kepler equation did not converge after {iterations} iterations (psi = {psi}, residual = {residual:e})"
    ))]
    IterationLimitExceeded {
        iterations: usize,
        psi: f64,
        residual: f64,
    },
    #[snafu(display("degenerate conic propagation: {msg}"))]
    DegenerateInput { msg: String },
}

/// Position and velocity of a conic propagation.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ConicState {
    pub r: Vector3<f64>,
    pub v: Vector3<f64>,
}

impl ConicState {
    pub fn new(r: Vector3<f64>, v: Vector3<f64>) -> Self {
        Self { r, v }
    }

    pub fn to_vector(&self) -> Vector6<f64> {
        Vector6::new(
            self.r[0], self.r[1], self.r[2], self.v[0], self.v[1], self.v[2],
        )
    }

    pub fn from_vector(y: &Vector6<f64>) -> Self {
        Self {
            r: y.fixed_rows::<3>(0).into_owned(),
            v: y.fixed_rows::<3>(3).into_owned(),
        }
    }
}

/// State transition matrix of a conic arc, stored as four 3x3 blocks.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ConicStm {
    /// ∂r_f/∂r_0
    pub rr: Matrix3<f64>,
    /// ∂r_f/∂v_0
    pub rv: Matrix3<f64>,
    /// ∂v_f/∂r_0
    pub vr: Matrix3<f64>,
    /// ∂v_f/∂v_0
    pub vv: Matrix3<f64>,
}

impl ConicStm {
    pub fn identity() -> Self {
        Self {
            rr: Matrix3::identity(),
            rv: Matrix3::zeros(),
            vr: Matrix3::zeros(),
            vv: Matrix3::identity(),
        }
    }

    /// Returns the full 6x6 state transition matrix.
    pub fn to_matrix(&self) -> Matrix6<f64> {
        let mut phi = Matrix6::zeros();
        phi.fixed_view_mut::<3, 3>(0, 0).copy_from(&self.rr);
        phi.fixed_view_mut::<3, 3>(0, 3).copy_from(&self.rv);
        phi.fixed_view_mut::<3, 3>(3, 0).copy_from(&self.vr);
        phi.fixed_view_mut::<3, 3>(3, 3).copy_from(&self.vv);
        phi
    }

    /// Maps the position and velocity costates across the arc.
    ///
    /// Costates evolve with the inverse transpose of the state transition matrix, which for the symplectic two
    /// body flow is `[[D, -C], [-B, A]]`.
    pub fn map_costates(
        &self,
        pr0: &Vector3<f64>,
        pv0: &Vector3<f64>,
    ) -> (Vector3<f64>, Vector3<f64>) {
        let pr_f = self.vv * pr0 - self.vr * pv0;
        let pv_f = -self.rv * pr0 + self.rr * pv0;
        (pr_f, pv_f)
    }
}

/// Universal functions s_0 through s_5 of `psi` for the energy parameter `alpha = v² - 2μ/r`.
///
/// The series is used directly when `alpha psi²` is small. Otherwise the variable is halved until it is, and s_0
/// and s_1 are doubled back with `s0(2x) = 2 s0² - 1` and `s1(2x) = 2 s0 s1` (Goodyear, 1965).
pub fn universal_functions(psi: f64, alpha: f64) -> [f64; 6] {
    let contr = 100.0 * f64::EPSILON;
    let beta = alpha * psi * psi;

    let series = |n: usize, x: f64, beta: f64| -> f64 {
        // x^n / n!
        let mut term = (1..=n).fold(1.0, |acc, i| acc * x / i as f64);
        let mut sum = term;
        for k in 1..=SERIES_MAX_TERMS {
            let nk = (n + 2 * k) as f64;
            term *= beta / ((nk - 1.0) * nk);
            sum += term;
            if term.abs() < contr * sum.abs().max(f64::MIN_POSITIVE) {
                break;
            }
        }
        sum
    };

    if beta.abs() < SERIES_LIMIT {
        let s2 = series(2, psi, beta);
        let s3 = series(3, psi, beta);
        let s4 = series(4, psi, beta);
        let s5 = series(5, psi, beta);
        [1.0 + alpha * s2, psi + alpha * s3, s2, s3, s4, s5]
    } else {
        let mut psi_half = psi;
        let mut nhalf = 0;
        while nhalf < MAX_HALVINGS && (alpha * psi_half * psi_half).abs() >= SERIES_LIMIT {
            psi_half *= 0.5;
            nhalf += 1;
        }
        let beta_half = alpha * psi_half * psi_half;
        let mut s0 = series(0, psi_half, beta_half);
        let mut s1 = series(1, psi_half, beta_half);
        for _ in 0..nhalf {
            let s0_dbl = 2.0 * s0 * s0 - 1.0;
            let s1_dbl = 2.0 * s0 * s1;
            s0 = s0_dbl;
            s1 = s1_dbl;
        }
        let s2 = (s0 - 1.0) / alpha;
        let s3 = (s1 - psi) / alpha;
        let s4 = (s2 - psi * psi / 2.0) / alpha;
        let s5 = (s3 - psi.powi(3) / 6.0) / alpha;
        [s0, s1, s2, s3, s4, s5]
    }
}

/// Converged universal Kepler solution, kept for the computation of the state transition matrix.
struct KeplerSolution {
    psi: f64,
    s: [f64; 6],
    /// Final radius
    r: f64,
}

/// Closed form two body propagator with the universal variable formulation, valid for elliptic, parabolic and
/// hyperbolic orbits.
#[derive(Copy, Clone, Debug)]
pub struct ConicPropagator {
    /// Gravitational parameter of the central body
    pub mu: f64,
    /// Maximum number of iterations on the universal Kepler equation
    pub max_iter: usize,
}

impl ConicPropagator {
    pub fn new(mu: f64) -> Self {
        Self { mu, max_iter: 50 }
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Propagates the provided position and velocity by `tau` (which may be negative).
    pub fn propagate(
        &self,
        r0: &Vector3<f64>,
        v0: &Vector3<f64>,
        tau: f64,
    ) -> Result<ConicState, ConicError> {
        if tau == 0.0 {
            self.check_inputs(r0, v0, tau)?;
            return Ok(ConicState::new(*r0, *v0));
        }
        let sol = self.solve_kepler(r0, v0, tau)?;
        Ok(self.state_from(r0, v0, &sol))
    }

    /// Propagates the provided position and velocity by `tau`, and also returns the state transition matrix.
    pub fn propagate_with_stm(
        &self,
        r0: &Vector3<f64>,
        v0: &Vector3<f64>,
        tau: f64,
    ) -> Result<(ConicState, ConicStm), ConicError> {
        if tau == 0.0 {
            self.check_inputs(r0, v0, tau)?;
            return Ok((ConicState::new(*r0, *v0), ConicStm::identity()));
        }
        let sol = self.solve_kepler(r0, v0, tau)?;
        let state = self.state_from(r0, v0, &sol);
        let stm = self.stm_from(r0, v0, &sol);
        Ok((state, stm))
    }

    fn check_inputs(&self, r0: &Vector3<f64>, v0: &Vector3<f64>, tau: f64) -> Result<(), ConicError> {
        ensure!(
            self.mu > 0.0 && self.mu.is_finite(),
            DegenerateInputSnafu {
                msg: format!("gravitational parameter must be positive, got {}", self.mu)
            }
        );
        ensure!(
            r0.iter().chain(v0.iter()).all(|x| x.is_finite()) && tau.is_finite(),
            DegenerateInputSnafu {
                msg: "non finite initial state or time".to_string()
            }
        );
        ensure!(
            r0.norm() > 0.0,
            DegenerateInputSnafu {
                msg: "zero initial radius".to_string()
            }
        );
        Ok(())
    }

    /// Solves `r0 s1 + σ0 s2 + μ s3 = τ` for the universal variable with Newton's method, safeguarded by bisection
    /// within a bracket of the root.
    fn solve_kepler(
        &self,
        r0: &Vector3<f64>,
        v0: &Vector3<f64>,
        tau: f64,
    ) -> Result<KeplerSolution, ConicError> {
        self.check_inputs(r0, v0, tau)?;
        let mu = self.mu;
        let r0n = r0.norm();
        let sig0 = r0.dot(v0);
        let alpha = v0.norm_squared() - 2.0 * mu / r0n;

        let residual = |psi: f64| -> (f64, [f64; 6]) {
            let s = universal_functions(psi, alpha);
            (r0n * s[1] + sig0 * s[2] + mu * s[3] - tau, s)
        };

        // The residual is increasing in psi and is -tau at zero, so the root has the sign of tau
        let dir = tau.signum();
        let mut psi_lo = 0.0;
        let mut psi_hi = if alpha < 0.0 {
            // Mean motion guess, exact for circular orbits
            tau * (-alpha) / mu
        } else {
            tau / r0n
        };
        let mut expansions = 0;
        loop {
            let (f_hi, _) = residual(psi_hi);
            if f_hi * dir >= 0.0 {
                break;
            }
            psi_lo = psi_hi;
            psi_hi *= 2.0;
            expansions += 1;
            ensure!(
                expansions < MAX_BRACKET_EXPANSIONS && psi_hi.is_finite(),
                IterationLimitExceededSnafu {
                    iterations: expansions,
                    psi: psi_hi,
                    residual: f_hi
                }
            );
        }

        // Start from the guess if it brackets tightly, else from the middle of the bracket
        let mut psi = if expansions == 0 {
            psi_hi
        } else {
            0.5 * (psi_lo + psi_hi)
        };
        let mut last_residual = f64::INFINITY;

        for iteration in 0..self.max_iter {
            let (f, s) = residual(psi);
            let r = r0n * s[0] + sig0 * s[1] + mu * s[2];
            last_residual = f;

            if f.abs() <= 4.0 * f64::EPSILON * tau.abs() {
                trace!("universal Kepler converged in {} iterations", iteration + 1);
                return Ok(KeplerSolution { psi, s, r });
            }
            if f * dir < 0.0 {
                psi_lo = psi;
            } else {
                psi_hi = psi;
            }

            let newton = psi - f / r;
            let inside = (newton - psi_lo) * (newton - psi_hi) <= 0.0;
            let next = if newton.is_finite() && inside {
                newton
            } else {
                0.5 * (psi_lo + psi_hi)
            };

            if (next - psi).abs() <= 4.0 * f64::EPSILON * psi.abs().max(1e-300)
                || (psi_hi - psi_lo).abs() <= 4.0 * f64::EPSILON * psi.abs()
            {
                let (_, s) = residual(next);
                let r = r0n * s[0] + sig0 * s[1] + mu * s[2];
                trace!("universal Kepler converged in {} iterations", iteration + 1);
                return Ok(KeplerSolution { psi: next, s, r });
            }
            psi = next;
        }

        Err(ConicError::IterationLimitExceeded {
            iterations: self.max_iter,
            psi,
            residual: last_residual,
        })
    }

    /// Lagrange coefficients f, g, fdot, gdot.
    fn lagrange(&self, r0n: f64, sig0: f64, sol: &KeplerSolution) -> (f64, f64, f64, f64) {
        let mu = self.mu;
        let s = &sol.s;
        let f = 1.0 - mu * s[2] / r0n;
        let g = r0n * s[1] + sig0 * s[2];
        let fdot = -mu * s[1] / (sol.r * r0n);
        let gdot = 1.0 - mu * s[2] / sol.r;
        (f, g, fdot, gdot)
    }

    fn state_from(&self, r0: &Vector3<f64>, v0: &Vector3<f64>, sol: &KeplerSolution) -> ConicState {
        let (f, g, fdot, gdot) = self.lagrange(r0.norm(), r0.dot(v0), sol);
        ConicState::new(f * r0 + g * v0, fdot * r0 + gdot * v0)
    }

    /// Analytical state transition matrix, by differentiating the Lagrange coefficients through the universal
    /// variable and the three invariants of the initial state (radius, `r·v` and `alpha`).
    fn stm_from(&self, r0: &Vector3<f64>, v0: &Vector3<f64>, sol: &KeplerSolution) -> ConicStm {
        let mu = self.mu;
        let r0n = r0.norm();
        let sig0 = r0.dot(v0);
        let alpha = v0.norm_squared() - 2.0 * mu / r0n;
        let psi = sol.psi;
        let s = &sol.s;
        let r = sol.r;
        let (f, g, fdot, gdot) = self.lagrange(r0n, sig0, sol);

        let ds_dpsi = [alpha * s[1], s[0], s[1], s[2]];
        let ds_dalpha = [
            0.5 * psi * s[1],
            0.5 * (psi * s[2] - s[3]),
            0.5 * (psi * s[3] - 2.0 * s[4]),
            0.5 * (psi * s[4] - 3.0 * s[5]),
        ];

        // Explicit partials of [f, g, fdot, gdot] given the partials of s0, s1, s2, and whether the variable is
        // the initial radius or the initial r·v
        let partials = |s0x: f64, s1x: f64, s2x: f64, e_r0n: f64, e_sig: f64| -> [f64; 4] {
            let rx = r0n * s0x + sig0 * s1x + mu * s2x + e_r0n * s[0] + e_sig * s[1];
            let fx = -mu * s2x / r0n + e_r0n * mu * s[2] / (r0n * r0n);
            let gx = r0n * s1x + sig0 * s2x + e_r0n * s[1] + e_sig * s[2];
            let fdotx =
                -mu * (s1x / (r * r0n) - s[1] * (rx * r0n + r * e_r0n) / (r * r0n).powi(2));
            let gdotx = -mu * (s2x / r - s[2] * rx / (r * r));
            [fx, gx, fdotx, gdotx]
        };

        let p_psi = partials(ds_dpsi[0], ds_dpsi[1], ds_dpsi[2], 0.0, 0.0);
        let p_r0n = partials(0.0, 0.0, 0.0, 1.0, 0.0);
        let p_sig = partials(0.0, 0.0, 0.0, 0.0, 1.0);
        let p_alpha = partials(ds_dalpha[0], ds_dalpha[1], ds_dalpha[2], 0.0, 0.0);

        // Implicit dependency of psi on the invariants through the Kepler equation
        let dpsi_dr0n = -s[1] / r;
        let dpsi_dsig = -s[2] / r;
        let dpsi_dalpha =
            -(r0n * ds_dalpha[1] + sig0 * ds_dalpha[2] + mu * ds_dalpha[3]) / r;

        let mut grad_r0 = [Vector3::zeros(); 4];
        let mut grad_v0 = [Vector3::zeros(); 4];
        for q in 0..4 {
            let d_r0n = p_r0n[q] + p_psi[q] * dpsi_dr0n;
            let d_sig = p_sig[q] + p_psi[q] * dpsi_dsig;
            let d_alpha = p_alpha[q] + p_psi[q] * dpsi_dalpha;
            grad_r0[q] = d_r0n * r0 / r0n + d_sig * v0 + d_alpha * 2.0 * mu * r0 / r0n.powi(3);
            grad_v0[q] = d_sig * r0 + d_alpha * 2.0 * v0;
        }

        let eye = Matrix3::identity();
        ConicStm {
            rr: eye * f + r0 * grad_r0[0].transpose() + v0 * grad_r0[1].transpose(),
            rv: eye * g + r0 * grad_v0[0].transpose() + v0 * grad_v0[1].transpose(),
            vr: eye * fdot + r0 * grad_r0[2].transpose() + v0 * grad_r0[3].transpose(),
            vv: eye * gdot + r0 * grad_v0[2].transpose() + v0 * grad_v0[3].transpose(),
        }
    }
}
