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

use snafu::prelude::*;

/// Golden section ratio used by the minimizer, (3 - sqrt(5)) / 2.
const CGOLD: f64 = 0.381_966_011_250_105_1;

#[derive(Copy, Clone, Debug, PartialEq, Snafu)]
pub enum RootError {
    #[snafu(display("root not bracketed: f({a}) = {fa} and f({b}) = {fb} have the same sign"))]
    Bracketing { a: f64, b: f64, fa: f64, fb: f64 },
    #[snafu(display(
        "no convergence after {iterations} iterations: best estimate {best} (f = {value})"
    ))]
    IterationLimitExceeded {
        best: f64,
        value: f64,
        iterations: usize,
    },
}

/// A located root, with the residual of the function at that point.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RootSolution {
    pub x: f64,
    pub fx: f64,
    pub iterations: usize,
}

/// A located minimum.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct MinimumSolution {
    pub x: f64,
    pub fx: f64,
    pub iterations: usize,
}

/// Finds a root of `f` in `[a, b]` using Brent's method (inverse quadratic interpolation, secant, bisection).
///
/// The function must strictly change sign over the interval: a zero at either end is a bracketing error, and
/// callers which may hit an exact zero at an end point should check for it first. The search stops when `f(b)`
/// is exactly zero or when the bracket is narrower than `tol` (plus a few ulps of the estimate).
///
/// If `sign` is non-zero, the returned point is the end of the final bracket whose residual has that sign,
/// which allows picking a specific side of the root (e.g. just after an event has triggered).
///
/// Source: Brent, R.P. (1973), "Algorithms for Minimization without Derivatives", chapter 4 (`zeroin`).
pub fn brent_root<F>(
    mut f: F,
    a: f64,
    b: f64,
    tol: f64,
    max_iter: usize,
    sign: i8,
) -> Result<RootSolution, RootError>
where
    F: FnMut(f64) -> f64,
{
    let (mut a, mut b) = (a, b);
    let mut fa = f(a);
    let mut fb = f(b);

    if !(fa * fb < 0.0) {
        // Also catches NaNs
        return Err(RootError::Bracketing { a, b, fa, fb });
    }

    let sign_matches = |fx: f64| sign == 0 || fx == 0.0 || (fx > 0.0) == (sign > 0);

    // [b, c] brackets the root, b is the best estimate and a the previous one
    let mut c = a;
    let mut fc = fa;
    // d is the latest step, e the one before
    let mut d = b - a;
    let mut e = d;

    for iter in 0..max_iter {
        if fb * fc > 0.0 {
            c = a;
            fc = fa;
            d = b - a;
            e = d;
        }
        if fc.abs() < fb.abs() {
            a = b;
            b = c;
            c = a;
            fa = fb;
            fb = fc;
            fc = fa;
        }

        let tol1 = 2.0 * f64::EPSILON * b.abs() + 0.5 * tol;
        let xm = 0.5 * (c - b);

        if xm.abs() <= tol1 || fb == 0.0 {
            let (x, fx) = if sign_matches(fb) { (b, fb) } else { (c, fc) };
            debug!("brent root {x} (f = {fx:e}) after {iter} iterations");
            return Ok(RootSolution {
                x,
                fx,
                iterations: iter,
            });
        }

        if e.abs() >= tol1 && fa.abs() > fb.abs() {
            let s = fb / fa;
            let (mut p, mut q) = if a == c {
                // Secant
                (2.0 * xm * s, 1.0 - s)
            } else {
                // Inverse quadratic interpolation
                let q = fa / fc;
                let r = fb / fc;
                (
                    s * (2.0 * xm * q * (q - r) - (b - a) * (r - 1.0)),
                    (q - 1.0) * (r - 1.0) * (s - 1.0),
                )
            };
            if p > 0.0 {
                q = -q;
            } else {
                p = -p;
            }
            if 2.0 * p < (3.0 * xm * q - (tol1 * q).abs()).min((e * q).abs()) {
                e = d;
                d = p / q;
            } else {
                d = xm;
                e = d;
            }
        } else {
            d = xm;
            e = d;
        }

        a = b;
        fa = fb;
        // Never step by less than the tolerance
        b += if d.abs() > tol1 { d } else { tol1.copysign(xm) };
        fb = f(b);
    }

    error!("Brent root finder failed after {max_iter} iterations");
    Err(RootError::IterationLimitExceeded {
        best: b,
        value: fb,
        iterations: max_iter,
    })
}

/// Minimizes `f` over `[a, b]` without derivatives, combining golden section search and successive parabolic
/// interpolation (Brent's `fmin`).
///
/// The function is assumed unimodal on the interval. The returned abscissa is within `tol` of the minimum.
pub fn brent_minimize<F>(
    mut f: F,
    a: f64,
    b: f64,
    tol: f64,
    max_iter: usize,
) -> Result<MinimumSolution, RootError>
where
    F: FnMut(f64) -> f64,
{
    let (mut a, mut b) = if a < b { (a, b) } else { (b, a) };

    let mut x = a + CGOLD * (b - a);
    let mut w = x;
    let mut v = x;
    let mut fx = f(x);
    let mut fw = fx;
    let mut fv = fx;
    // d is the latest step, e the one before
    let mut d: f64 = 0.0;
    let mut e: f64 = 0.0;

    for iter in 0..max_iter {
        let xm = 0.5 * (a + b);
        let tol1 = 0.5 * tol + f64::EPSILON * x.abs();
        let tol2 = 2.0 * tol1;

        if (x - xm).abs() <= tol2 - 0.5 * (b - a) {
            debug!("brent minimum {x} (f = {fx:e}) after {iter} iterations");
            return Ok(MinimumSolution {
                x,
                fx,
                iterations: iter,
            });
        }

        let mut golden = true;
        if e.abs() > tol1 {
            // Parabola through x, v, w
            let r = (x - w) * (fx - fv);
            let mut q = (x - v) * (fx - fw);
            let mut p = (x - v) * q - (x - w) * r;
            q = 2.0 * (q - r);
            if q > 0.0 {
                p = -p;
            }
            q = q.abs();
            let e_prev = e;
            e = d;
            if p.abs() < (0.5 * q * e_prev).abs() && p > q * (a - x) && p < q * (b - x) {
                d = p / q;
                let u = x + d;
                if u - a < tol2 || b - u < tol2 {
                    d = tol1.copysign(xm - x);
                }
                golden = false;
            }
        }

        if golden {
            e = if x >= xm { a - x } else { b - x };
            d = CGOLD * e;
        }

        let u = if d.abs() >= tol1 {
            x + d
        } else {
            x + tol1.copysign(d)
        };
        let fu = f(u);

        if fu <= fx {
            if u >= x {
                a = x;
            } else {
                b = x;
            }
            v = w;
            fv = fw;
            w = x;
            fw = fx;
            x = u;
            fx = fu;
        } else {
            if u < x {
                a = u;
            } else {
                b = u;
            }
            if fu <= fw || w == x {
                v = w;
                fv = fw;
                w = u;
                fw = fu;
            } else if fu <= fv || v == x || v == w {
                v = u;
                fv = fu;
            }
        }
    }

    error!("Brent minimizer failed after {max_iter} iterations");
    Err(RootError::IterationLimitExceeded {
        best: x,
        value: fx,
        iterations: max_iter,
    })
}
