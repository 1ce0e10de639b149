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
use super::{ArcKind, OptimizerError, Scales, TargetConstraint};
use crate::dynamics::{mass, position, primer_direction, velocity, PvgState};
use crate::linalg::{DVector, Vector3};
use crate::utils::{angular_momentum, eccentricity_vector, hermite_interp, pitch_heading_deg};
use std::fmt;
use std::sync::Arc;

/// State returned by the queries of a solution without any samples.
fn undefined_state() -> PvgState {
    PvgState::from_element(f64::NAN)
}

/// A sampled arc of a converged solution. All times and states are normalized.
#[derive(Clone, Debug)]
pub struct SolutionArc {
    pub kind: ArcKind,
    pub stage: Option<usize>,
    /// Start of the arc since the start of the solution
    pub t_start: f64,
    pub duration: f64,
    /// Normalized exhaust velocity, zero on coasts
    pub exhaust_velocity: f64,
    /// Time since the start of the arc, state and state derivative at evenly spaced instants
    pub(crate) samples: Vec<(f64, PvgState, PvgState)>,
}

impl SolutionArc {
    pub fn is_coast(&self) -> bool {
        self.kind == ArcKind::Coast
    }

    pub fn t_end(&self) -> f64 {
        self.t_start + self.duration
    }

    pub fn initial_state(&self) -> PvgState {
        self.samples.first().map_or_else(undefined_state, |sample| sample.1)
    }

    pub fn final_state(&self) -> PvgState {
        self.samples.last().map_or_else(undefined_state, |sample| sample.1)
    }

    /// Interpolated state at the provided time since the start of the arc, clamped to the arc.
    pub fn state_at(&self, tau: f64) -> PvgState {
        let n = self.samples.len();
        if n < 2 || self.duration <= 0.0 {
            return self.initial_state();
        }
        let tau = tau.clamp(0.0, self.duration);
        let spacing = self.duration / ((n - 1) as f64);
        let k = ((tau / spacing).floor() as usize).min(n - 2);
        let (t0, y0, f0) = &self.samples[k];
        let (t1, y1, f1) = &self.samples[k + 1];
        hermite_interp(*t0, y0, f0, *t1, y1, f1, tau)
    }
}

/// A converged ascent trajectory, immutable once built.
///
/// All of the queries take the mission time in seconds, where the solution starts at its `epoch`. Use an
/// [`AnchoredSolution`] to evaluate it from a different start time.
#[derive(Clone, Debug)]
pub struct Solution {
    /// Mission time of the state this solution was computed from (s)
    pub epoch: f64,
    pub scales: Scales,
    pub arcs: Vec<SolutionArc>,
    /// Target, in physical units
    pub target: TargetConstraint,
    /// Norm of the normalized residuals at convergence
    pub residual_norm: f64,
    /// Number of residual evaluations of the solve
    pub evaluations: usize,
}

impl Solution {
    /// Samples the arcs of a solved problem.
    pub(crate) fn from_unknowns(
        problem: &NormalizedProblem,
        x: &DVector<f64>,
        target: TargetConstraint,
        residual_norm: f64,
        evaluations: usize,
    ) -> Result<Self, OptimizerError> {
        let mut arcs = Vec::with_capacity(problem.num_arcs());
        let mut t_start = 0.0;
        for (idx, arc) in problem.arcs.iter().enumerate() {
            let duration = NormalizedProblem::arc_duration(x, idx);
            let samples = problem.sample_arc(
                idx,
                &NormalizedProblem::arc_state(x, idx),
                duration,
                problem.opts.samples_per_arc,
            )?;
            arcs.push(SolutionArc {
                kind: arc.kind,
                stage: arc.stage,
                t_start,
                duration,
                exhaust_velocity: if arc.is_coast() { 0.0 } else { arc.exhaust_velocity },
                samples,
            });
            t_start += duration;
        }
        Ok(Self {
            epoch: problem.epoch,
            scales: problem.scales,
            arcs,
            target,
            residual_norm,
            evaluations,
        })
    }

    /// Normalized time since the start of the solution
    fn tau(&self, t: f64) -> f64 {
        (t - self.epoch) / self.scales.time
    }

    /// Normalized duration of the whole solution
    fn duration(&self) -> f64 {
        self.arcs.last().map_or(0.0, |arc| arc.t_end())
    }

    /// Mission time of the end of the final burn (s)
    pub fn tf(&self) -> f64 {
        self.epoch + self.duration() * self.scales.time
    }

    /// Index of the arc flown at the provided time, clamped to the first and last arcs.
    pub fn arc_index(&self, t: f64) -> usize {
        let tau = self.tau(t);
        self.arcs
            .iter()
            .position(|arc| tau < arc.t_end())
            .unwrap_or(self.arcs.len().saturating_sub(1))
    }

    /// Normalized guidance state at the provided time, NaN if the solution has no arcs.
    pub fn state(&self, t: f64) -> PvgState {
        match self.arcs.get(self.arc_index(t)) {
            Some(arc) => arc.state_at(self.tau(t) - arc.t_start),
            None => undefined_state(),
        }
    }

    /// Position (m), velocity (m/s) and mass (kg) along the solution.
    pub fn vehicle_state(&self, t: f64) -> (Vector3<f64>, Vector3<f64>, f64) {
        let y = self.state(t);
        (
            position(&y) * self.scales.length,
            velocity(&y) * self.scales.velocity,
            mass(&y) * self.scales.mass,
        )
    }

    /// Commanded thrust direction (inertial unit vector), if the primer vector is defined.
    pub fn thrust_direction(&self, t: f64) -> Option<Vector3<f64>> {
        primer_direction(&self.state(t))
    }

    /// Commanded pitch and heading in degrees, or NaN if the primer vector vanishes.
    pub fn pitch_heading_deg(&self, t: f64) -> (f64, f64) {
        let y = self.state(t);
        match primer_direction(&y) {
            Some(dir) => pitch_heading_deg(&dir, &position(&y)),
            None => (f64::NAN, f64::NAN),
        }
    }

    pub fn pitch_deg(&self, t: f64) -> f64 {
        self.pitch_heading_deg(t).0
    }

    pub fn heading_deg(&self, t: f64) -> f64 {
        self.pitch_heading_deg(t).1
    }

    /// Time to go until the end of the final burn (s)
    pub fn tgo(&self, t: f64) -> f64 {
        (self.tf() - t).max(0.0)
    }

    /// Ideal velocity still to be gained by the remaining burns (m/s)
    pub fn vgo(&self, t: f64) -> f64 {
        let tau = self.tau(t);
        let current = self.arc_index(t);
        self.arcs
            .iter()
            .enumerate()
            .skip(current)
            .filter(|(_, arc)| !arc.is_coast())
            .map(|(idx, arc)| {
                let m_start = if idx == current {
                    mass(&arc.state_at(tau - arc.t_start))
                } else {
                    mass(&arc.initial_state())
                };
                let m_end = mass(&arc.final_state());
                if m_end > 0.0 && m_start > m_end {
                    arc.exhaust_velocity * self.scales.velocity * (m_start / m_end).ln()
                } else {
                    0.0
                }
            })
            .sum()
    }

    /// Whether the solution commands a coast at the provided time. It never does after the final burn.
    pub fn is_coasting(&self, t: f64) -> bool {
        t < self.tf()
            && self
                .arcs
                .get(self.arc_index(t))
                .is_some_and(|arc| arc.is_coast())
    }

    /// Commanded throttle: one during burns, zero during coasts and after the final burn.
    pub fn throttle(&self, t: f64) -> f64 {
        let coasting = self
            .arcs
            .get(self.arc_index(t))
            .map_or(true, |arc| arc.is_coast());
        if t >= self.tf() || coasting {
            0.0
        } else {
            1.0
        }
    }

    /// Position (m) and velocity (m/s) at the end of the final burn.
    pub fn terminal_state(&self) -> (Vector3<f64>, Vector3<f64>) {
        let (r, v, _) = self.vehicle_state(self.tf());
        (r, v)
    }

    /// Angular momentum (m²/s) and eccentricity vectors of the orbit reached at the end of the final burn.
    pub fn terminal_orbit(&self) -> (Vector3<f64>, Vector3<f64>) {
        let (r, v) = self.terminal_state();
        (
            angular_momentum(&r, &v),
            eccentricity_vector(&r, &v, self.scales.mu),
        )
    }

    /// Distance of the terminal orbit from the target, as measured by [`TargetConstraint::miss`].
    pub fn terminal_miss(&self) -> f64 {
        let (r, v) = self.terminal_state();
        self.target.miss(&r, &v, self.scales.mu)
    }
}

impl fmt::Display for Solution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PVG solution from t = {:.3} s with {} arcs, tf = {:.3} s, residual {:.3e}",
            self.epoch,
            self.arcs.len(),
            self.tf(),
            self.residual_norm
        )
    }
}

/// A shared solution with a mutable time anchor.
///
/// The anchor `t0` is the mission time at which the solution starts. It is the solution epoch unless it was
/// advanced, e.g. while waiting for liftoff. The solution itself is never mutated.
#[derive(Clone, Debug)]
pub struct AnchoredSolution {
    pub solution: Arc<Solution>,
    pub t0: f64,
}

impl AnchoredSolution {
    pub fn new(solution: Arc<Solution>) -> Self {
        let t0 = solution.epoch;
        Self { solution, t0 }
    }

    /// Moves the start of the solution to the provided mission time.
    pub fn set_anchor(&mut self, t0: f64) {
        self.t0 = t0;
    }

    /// Converts a mission time into the time frame of the solution.
    pub fn local_time(&self, t: f64) -> f64 {
        t - self.t0 + self.solution.epoch
    }

    pub fn tf(&self) -> f64 {
        self.solution.tf() - self.solution.epoch + self.t0
    }

    pub fn arc_index(&self, t: f64) -> usize {
        self.solution.arc_index(self.local_time(t))
    }

    pub fn state(&self, t: f64) -> PvgState {
        self.solution.state(self.local_time(t))
    }

    pub fn vehicle_state(&self, t: f64) -> (Vector3<f64>, Vector3<f64>, f64) {
        self.solution.vehicle_state(self.local_time(t))
    }

    pub fn thrust_direction(&self, t: f64) -> Option<Vector3<f64>> {
        self.solution.thrust_direction(self.local_time(t))
    }

    pub fn pitch_heading_deg(&self, t: f64) -> (f64, f64) {
        self.solution.pitch_heading_deg(self.local_time(t))
    }

    pub fn pitch_deg(&self, t: f64) -> f64 {
        self.solution.pitch_deg(self.local_time(t))
    }

    pub fn heading_deg(&self, t: f64) -> f64 {
        self.solution.heading_deg(self.local_time(t))
    }

    pub fn tgo(&self, t: f64) -> f64 {
        self.solution.tgo(self.local_time(t))
    }

    pub fn vgo(&self, t: f64) -> f64 {
        self.solution.vgo(self.local_time(t))
    }

    pub fn is_coasting(&self, t: f64) -> bool {
        self.solution.is_coasting(self.local_time(t))
    }

    pub fn throttle(&self, t: f64) -> f64 {
        self.solution.throttle(self.local_time(t))
    }
}

impl From<Solution> for AnchoredSolution {
    fn from(solution: Solution) -> Self {
        Self::new(Arc::new(solution))
    }
}

#[cfg(test)]
impl Solution {
    /// A forward shooting of a coast followed by a burn from a circular orbit of unit radius, which need not
    /// reach its target.
    pub(crate) fn coast_then_burn(epoch: f64, coast: f64, burn: f64, primer: Vector3<f64>) -> Self {
        use crate::dynamics::pvg_state;
        use crate::md::pvg::{AscentProblem, FlightArc, OptimizerOpts, STD_GRAVITY};

        let target = TargetConstraint::from_apsides(1.0, 1.2, 1.2, 0.0, 0.0, None, None).unwrap();
        let problem = AscentProblem::builder()
            .mu(1.0)
            .t(epoch)
            .r(Vector3::new(1.0, 0.0, 0.0))
            .v(Vector3::new(0.0, 1.0, 0.0))
            .mass(1.0)
            .arcs(vec![
                FlightArc::coast(coast),
                FlightArc::burn(0.5, 1.0 / STD_GRAVITY, burn),
            ])
            .target(target)
            .build();
        let prob = NormalizedProblem::new(&problem, &OptimizerOpts::default());
        let mut x = DVector::zeros(prob.num_unknowns());
        let y0 = pvg_state(
            &prob.r0,
            &prob.v0,
            &Vector3::zeros(),
            &primer,
            1.0,
        );
        NormalizedProblem::set_arc(&mut x, 0, &y0, coast);
        let y1 = prob.propagate_arc(0, &y0, coast).unwrap();
        NormalizedProblem::set_arc(&mut x, 1, &y1, burn);
        Solution::from_unknowns(&prob, &x, problem.target, 1.0, 1).unwrap()
    }
}
