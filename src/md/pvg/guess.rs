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

use super::problem::NormalizedProblem;
use super::{AnchoredSolution, ArcKind, InitialGuessSnafu, OptimizerError};
use crate::dynamics::{pos_costate, primer, pvg_state, PvgState};
use crate::linalg::{DVector, Vector3};
use crate::tools::{brent_minimize, lambert, RootError, TransferKind};
use crate::utils::rotate_about;
use snafu::prelude::*;

/// Bounds of the downrange angle to the insertion point, in radians.
const DOWNRANGE_BOUNDS: (f64, f64) = (0.05, 1.2);
/// Cost assigned to downrange angles for which no transfer exists.
const NO_TRANSFER_COST: f64 = 1e3;
/// Margin on the ideal velocity change of the cold start, for gravity and steering losses.
const LOSS_MARGIN: f64 = 1.1;
/// Minimum fraction of the available burn time used as a first guess of the final burn.
const MIN_FINAL_BURN_FRACTION: f64 = 0.05;

/// Scales the costates such that their joint norm is one.
fn normalize_costates(pr: Vector3<f64>, pv: Vector3<f64>) -> (Vector3<f64>, Vector3<f64>) {
    let norm = (pr.norm_squared() + pv.norm_squared()).sqrt();
    if norm > 0.0 && norm.is_finite() {
        (pr / norm, pv / norm)
    } else {
        (Vector3::zeros(), Vector3::zeros())
    }
}

/// Unit vector of `v`, or of `fallback` if `v` vanishes.
fn unit_or(v: Vector3<f64>, fallback: Vector3<f64>) -> Vector3<f64> {
    let norm = v.norm();
    if norm > 1e-12 {
        v / norm
    } else {
        fallback / fallback.norm()
    }
}

/// Integrates the arcs one after the other from the initial guidance state, storing each initial state in the
/// unknowns. The mass is reset at staging.
fn forward_shooting(
    problem: &NormalizedProblem,
    y0: PvgState,
    durations: &[f64],
) -> Result<DVector<f64>, OptimizerError> {
    let mut x = DVector::zeros(problem.num_unknowns());
    let mut y = y0;
    for (arc, duration) in durations.iter().enumerate() {
        if arc > 0 {
            y[12] = problem.start_mass(arc, y[12]);
        }
        NormalizedProblem::set_arc(&mut x, arc, &y, *duration);
        y = problem.propagate_arc(arc, &y, *duration)?;
    }
    Ok(x)
}

/// Guess of the duration of the final burn from the rocket equation, given the durations of the other arcs.
fn final_burn_guess(problem: &NormalizedProblem, dv_needed: f64) -> f64 {
    let last = problem.num_arcs() - 1;
    let mut mass = problem.m0;
    let mut dv = 0.0;
    for arc in &problem.arcs[..last] {
        if let Some(start_mass) = arc.start_mass {
            mass = start_mass;
        }
        if !arc.is_coast() {
            let m_end = mass - arc.thrust / arc.exhaust_velocity * arc.duration;
            dv += arc.exhaust_velocity * (mass / m_end).ln();
            mass = m_end;
        }
    }
    let final_arc = &problem.arcs[last];
    if let Some(start_mass) = final_arc.start_mass {
        mass = start_mass;
    }
    let remaining = (dv_needed - dv).max(0.0);
    let flow = final_arc.thrust / final_arc.exhaust_velocity;
    let burn = mass / flow * (1.0 - (-remaining / final_arc.exhaust_velocity).exp());
    burn.clamp(MIN_FINAL_BURN_FRACTION * final_arc.duration, final_arc.duration)
}

/// Builds a first guess without any previous solution.
///
/// The insertion point is searched along the target plane, downrange of the current position, for the transfer
/// of least velocity change. The initial primer is aligned with the velocity change at departure of that
/// transfer, and its rate is set such that the radial component vanishes halfway through the ascent.
pub(crate) fn cold_start(problem: &NormalizedProblem) -> Result<DVector<f64>, OptimizerError> {
    let r0 = problem.r0;
    let v0 = problem.v0;
    let h_t = problem.target.angular_momentum();
    let h_hat = h_t / h_t.norm();
    let r_ins = problem.target.insertion_radius(1.0);

    // Current position projected in the target plane
    let r_hat = r0 / r0.norm();
    let r_plane = unit_or(r0 - r0.dot(&h_hat) * h_hat, h_hat.cross(&Vector3::x()));

    let v_ins_mag = problem.target.velocity_at(&(r_plane * r_ins), 1.0).norm();
    let v_radial = v0.dot(&r_hat);
    let v_horizontal = (v0 - v_radial * r_hat).norm();
    let dv_needed = LOSS_MARGIN * ((v_ins_mag - v_horizontal).abs() + v_radial.abs());

    let mut durations: Vec<f64> = problem.arcs.iter().map(|arc| arc.duration).collect();
    let last = durations.len() - 1;
    durations[last] = final_burn_guess(problem, dv_needed);
    let tof: f64 = durations.iter().sum();

    let insertion = |theta: f64| r_ins * rotate_about(&r_plane, &h_hat, theta);
    let transfer_cost = |theta: f64| {
        let r_f = insertion(theta);
        match lambert(&r0, &r_f, tof, 1.0, TransferKind::ShortWay) {
            Ok(sol) => {
                (sol.v_init - v0).norm() + (problem.target.velocity_at(&r_f, 1.0) - sol.v_final).norm()
            }
            Err(_) => NO_TRANSFER_COST,
        }
    };

    let theta = match brent_minimize(
        transfer_cost,
        DOWNRANGE_BOUNDS.0,
        DOWNRANGE_BOUNDS.1,
        1e-4,
        100,
    ) {
        Ok(min) => min.x,
        Err(RootError::IterationLimitExceeded { best, .. }) => best,
        Err(e) => return Err(e).context(InitialGuessSnafu),
    };
    let r_f = insertion(theta);

    let pv = match lambert(&r0, &r_f, tof, 1.0, TransferKind::ShortWay) {
        Ok(sol) => unit_or(sol.v_init - v0, v0),
        Err(e) => {
            debug!("no transfer to the insertion point ({e}), aiming at the target velocity");
            unit_or(problem.target.velocity_at(&r_f, 1.0) - v0, v0)
        }
    };
    let pr = (2.0 * pv.dot(&r_hat) / tof) * r_hat;
    let (pr, pv) = normalize_costates(pr, pv);

    debug!(
        "cold start: insertion {:.1} deg downrange, time of flight {tof:.4}, primer {pv}",
        theta.to_degrees()
    );

    forward_shooting(problem, pvg_state(&r0, &v0, &pr, &pv, problem.m0), &durations)
}

/// Builds a first guess from a previous solution evaluated at the current time.
///
/// The costates are converted to the current normalization and applied to the current vehicle state. The
/// durations of the coasts and of the final burn come from the matching arcs of the previous solution.
pub(crate) fn warm_start(
    problem: &NormalizedProblem,
    previous: &AnchoredSolution,
) -> Result<DVector<f64>, OptimizerError> {
    let t = problem.epoch;
    if t >= previous.tf() {
        return Err(OptimizerError::DegenerateInput {
            msg: format!("previous solution ended at {} before {t}", previous.tf()),
        });
    }
    let prev = &previous.solution;
    let time_ratio = prev.scales.time / problem.scales.time;

    let y_prev = previous.state(t);
    let (pr, pv) = normalize_costates(pos_costate(&y_prev) / time_ratio, primer(&y_prev));
    let y0 = pvg_state(&problem.r0, &problem.v0, &pr, &pv, problem.m0);

    let first = previous.arc_index(t);
    let elapsed = (previous.local_time(t) - prev.epoch) / prev.scales.time;
    let last = problem.num_arcs() - 1;
    let durations: Vec<f64> = problem
        .arcs
        .iter()
        .enumerate()
        .map(|(idx, arc)| {
            if arc.kind == ArcKind::Burn && idx != last {
                return arc.duration;
            }
            let matched = prev.arcs.get(first + idx).filter(|prev_arc| {
                prev_arc.kind == arc.kind
                    && (prev_arc.stage.is_none() || arc.stage.is_none() || prev_arc.stage == arc.stage)
            });
            match matched {
                Some(prev_arc) => {
                    let remaining = if idx == 0 {
                        prev_arc.t_end() - elapsed
                    } else {
                        prev_arc.duration
                    };
                    let duration = remaining * time_ratio;
                    if idx == last {
                        duration.clamp(MIN_FINAL_BURN_FRACTION * arc.duration, arc.duration)
                    } else {
                        duration.max(0.0)
                    }
                }
                None => arc.duration,
            }
        })
        .collect();

    debug!("warm start from {prev} at t = {t:.3} s: durations {durations:?}");
    forward_shooting(problem, y0, &durations)
}
