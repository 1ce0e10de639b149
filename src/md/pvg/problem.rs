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

use super::{
    ArcKind, ArcPropagationSnafu, ConicCoastSnafu, FlightArc, OptimizerError, OptimizerOpts, Scales,
    TargetConstraint,
};
use crate::dynamics::{
    coast_hamiltonian, pos_costate, position, primer, pvg_state, velocity, Dynamics,
    PrimerDynamics, PvgState, PVG_STATE_DIM,
};
use crate::linalg::{DMatrix, DVector, Vector3};
use crate::propagators::{ConicPropagator, PropOpts, PropagationError, Propagator, RSSState};
use snafu::prelude::*;
use typed_builder::TypedBuilder;

/// Number of unknowns per arc: the initial guidance state and the duration.
pub(crate) const ARC_UNKNOWNS: usize = PVG_STATE_DIM + 1;

/// An ascent guidance problem, in physical units (SI).
#[derive(Clone, Debug, PartialEq, TypedBuilder)]
pub struct AscentProblem {
    /// Gravitational parameter of the central body (m³/s²)
    pub mu: f64,
    /// Mission time of the current state (s)
    pub t: f64,
    /// Current inertial position (m)
    pub r: Vector3<f64>,
    /// Current inertial velocity (m/s)
    pub v: Vector3<f64>,
    /// Current vehicle mass (kg)
    pub mass: f64,
    /// Flight plan, in chronological order
    pub arcs: Vec<FlightArc>,
    /// Target of the ascent, in physical units
    pub target: TargetConstraint,
}

impl AscentProblem {
    /// Checks that this problem can be solved at all.
    pub fn validate(&self) -> Result<(), OptimizerError> {
        let fail = |msg: String| Err(OptimizerError::DegenerateInput { msg });
        if !(self.mu > 0.0 && self.mu.is_finite()) {
            return fail(format!("gravitational parameter must be positive, got {}", self.mu));
        }
        let rmag = self.r.norm();
        if !(rmag > 0.0 && rmag.is_finite()) || !self.v.iter().all(|x| x.is_finite()) {
            return fail(format!("invalid initial state r = {}, v = {}", self.r, self.v));
        }
        if !(self.mass > 0.0 && self.mass.is_finite()) {
            return fail(format!("vehicle mass must be positive, got {}", self.mass));
        }
        match self.arcs.last() {
            None => return fail("no arc in the flight plan".to_string()),
            Some(arc) if arc.is_coast() => {
                return fail("the flight plan must end with a burn".to_string())
            }
            _ => {}
        }
        if self.target.angular_momentum().norm() <= 0.0 {
            return fail("target angular momentum is zero".to_string());
        }

        let mut mass = self.mass;
        for (i, arc) in self.arcs.iter().enumerate() {
            if !(arc.duration >= 0.0 && arc.duration.is_finite()) {
                return fail(format!("arc {i} has an invalid duration {}", arc.duration));
            }
            if let Some(start_mass) = arc.start_mass {
                mass = start_mass;
            }
            if !(mass > 0.0) {
                return fail(format!("arc {i} starts with a mass of {mass}"));
            }
            if arc.kind == ArcKind::Burn {
                if !(arc.thrust > 0.0 && arc.isp > 0.0) {
                    return fail(format!(
                        "burn arc {i} has no propulsion (thrust {} N, Isp {} s)",
                        arc.thrust, arc.isp
                    ));
                }
                mass -= arc.mass_flow() * arc.duration;
                if !(mass > 0.0) {
                    return fail(format!("burn arc {i} consumes more than the vehicle mass"));
                }
            }
        }
        Ok(())
    }

    /// Normalization of this problem, based on the current radius and mass.
    pub fn scales(&self) -> Scales {
        Scales::new(self.mu, self.r.norm(), self.mass)
    }

    /// Total duration of the flight plan in seconds
    pub fn duration(&self) -> f64 {
        self.arcs.iter().map(|arc| arc.duration).sum()
    }
}

/// A flight arc in normalized units.
#[derive(Copy, Clone, Debug, PartialEq)]
pub(crate) struct NormalizedArc {
    pub kind: ArcKind,
    pub thrust: f64,
    pub exhaust_velocity: f64,
    pub duration: f64,
    pub start_mass: Option<f64>,
    pub stage: Option<usize>,
}

impl NormalizedArc {
    pub fn dynamics(&self) -> PrimerDynamics {
        match self.kind {
            ArcKind::Burn => PrimerDynamics::burn(self.thrust, self.exhaust_velocity),
            ArcKind::Coast => PrimerDynamics::coast(),
        }
    }

    pub fn is_coast(&self) -> bool {
        self.kind == ArcKind::Coast
    }
}

/// The multi arc boundary value problem, in normalized units where `mu = 1`.
///
/// The unknowns are, for each arc, its initial guidance state followed by its duration. The residuals are:
/// + the mismatch of the initial position, velocity and mass of the first arc with the current state;
/// + the normalization of the initial costates;
/// + the six terminal conditions of the target;
/// + the continuity of the state and costates at each boundary, where the mass may instead be reset on staging;
/// + for each arc but the last, its fixed burn duration, or the switching condition if it is a coast.
#[derive(Clone, Debug)]
pub(crate) struct NormalizedProblem {
    pub scales: Scales,
    /// Mission time of the initial state (s)
    pub epoch: f64,
    pub r0: Vector3<f64>,
    pub v0: Vector3<f64>,
    pub m0: f64,
    pub arcs: Vec<NormalizedArc>,
    pub target: TargetConstraint,
    pub opts: OptimizerOpts,
}

impl NormalizedProblem {
    pub fn new(problem: &AscentProblem, opts: &OptimizerOpts) -> Self {
        let scales = problem.scales();
        let arcs = problem
            .arcs
            .iter()
            .map(|arc| NormalizedArc {
                kind: arc.kind,
                thrust: scales.thrust(arc.thrust),
                exhaust_velocity: arc.exhaust_velocity() / scales.velocity,
                duration: arc.duration / scales.time,
                start_mass: arc.start_mass.map(|m| m / scales.mass),
                stage: arc.stage,
            })
            .collect();

        Self {
            scales,
            epoch: problem.t,
            r0: problem.r / scales.length,
            v0: problem.v / scales.velocity,
            m0: problem.mass / scales.mass,
            arcs,
            target: problem.target.normalized(&scales),
            opts: *opts,
        }
    }

    pub fn num_arcs(&self) -> usize {
        self.arcs.len()
    }

    pub fn num_unknowns(&self) -> usize {
        ARC_UNKNOWNS * self.arcs.len()
    }

    /// Initial guidance state of the provided arc in the unknown vector
    pub fn arc_state(x: &DVector<f64>, arc: usize) -> PvgState {
        PvgState::from_iterator(x.rows(ARC_UNKNOWNS * arc, PVG_STATE_DIM).iter().copied())
    }

    /// Duration of the provided arc in the unknown vector
    pub fn arc_duration(x: &DVector<f64>, arc: usize) -> f64 {
        x[ARC_UNKNOWNS * arc + PVG_STATE_DIM]
    }

    pub fn set_arc(x: &mut DVector<f64>, arc: usize, y: &PvgState, duration: f64) {
        x.rows_mut(ARC_UNKNOWNS * arc, PVG_STATE_DIM).copy_from(y);
        x[ARC_UNKNOWNS * arc + PVG_STATE_DIM] = duration;
    }

    /// Mass at the start of the provided arc given the final mass of the previous arc.
    pub fn start_mass(&self, arc: usize, previous_final: f64) -> f64 {
        self.arcs[arc].start_mass.unwrap_or(previous_final)
    }

    fn integrator(&self, arc: usize) -> Propagator<PrimerDynamics, RSSState, PVG_STATE_DIM> {
        let opts = PropOpts::with_adaptive_step(
            1e-12,
            self.opts.max_step,
            self.opts.integration_tolerance,
            RSSState,
        );
        Propagator::dp45(self.arcs[arc].dynamics(), opts)
    }

    /// Propagates the initial state of an arc for the provided (possibly negative) duration.
    pub fn propagate_arc(
        &self,
        arc: usize,
        y0: &PvgState,
        duration: f64,
    ) -> Result<PvgState, OptimizerError> {
        if self.arcs[arc].is_coast() && self.opts.conic_coasts {
            return self.conic_coast(arc, y0, duration);
        }
        self.integrator(arc)
            .with(0.0, *y0)
            .until(duration)
            .context(ArcPropagationSnafu { arc })
    }

    fn conic_coast(&self, arc: usize, y0: &PvgState, tau: f64) -> Result<PvgState, OptimizerError> {
        let (state, stm) = ConicPropagator::new(1.0)
            .propagate_with_stm(&position(y0), &velocity(y0), tau)
            .context(ConicCoastSnafu { arc })?;
        let (pr, pv) = stm.map_costates(&pos_costate(y0), &primer(y0));
        Ok(pvg_state(&state.r, &state.v, &pr, &pv, y0[12]))
    }

    /// Samples an arc at evenly spaced instants, returning the time since the start of the arc, the state and its
    /// derivative at each sample.
    pub fn sample_arc(
        &self,
        arc: usize,
        y0: &PvgState,
        duration: f64,
        samples: usize,
    ) -> Result<Vec<(f64, PvgState, PvgState)>, OptimizerError> {
        let samples = samples.max(2);
        let times: Vec<f64> = (0..samples)
            .map(|k| duration * (k as f64) / ((samples - 1) as f64))
            .collect();

        let states: Vec<(f64, PvgState)> = if self.arcs[arc].is_coast() && self.opts.conic_coasts {
            times
                .iter()
                .map(|tau| Ok((*tau, self.conic_coast(arc, y0, *tau)?)))
                .collect::<Result<_, OptimizerError>>()?
        } else {
            self.integrator(arc)
                .with(0.0, *y0)
                .through(&times)
                .context(ArcPropagationSnafu { arc })?
        };

        let dynamics = self.arcs[arc].dynamics();
        states
            .into_iter()
            .map(|(tau, y)| {
                let dy = dynamics
                    .eom(tau, &y)
                    .map_err(|source| OptimizerError::ArcPropagation {
                        arc,
                        source: PropagationError::Dynamics { source },
                    })?;
                Ok((tau, y, dy))
            })
            .collect()
    }

    /// Final state of every arc for the provided unknowns.
    pub fn propagate_all(&self, x: &DVector<f64>) -> Result<Vec<PvgState>, OptimizerError> {
        (0..self.num_arcs())
            .map(|arc| {
                self.propagate_arc(arc, &Self::arc_state(x, arc), Self::arc_duration(x, arc))
            })
            .collect()
    }

    /// Assembles the residuals from the unknowns and the final state of each arc.
    pub fn residuals(&self, x: &DVector<f64>, finals: &[PvgState]) -> DVector<f64> {
        let n = self.num_arcs();
        let mut res = Vec::with_capacity(self.num_unknowns());

        let y0 = Self::arc_state(x, 0);
        res.extend((position(&y0) - self.r0).iter());
        res.extend((velocity(&y0) - self.v0).iter());
        res.push(y0[12] - self.m0);
        res.push((pos_costate(&y0).norm_squared() + primer(&y0).norm_squared()).sqrt() - 1.0);

        res.extend(self.target.residuals(&finals[n - 1]));

        for arc in 0..n - 1 {
            let yf = &finals[arc];
            let next = Self::arc_state(x, arc + 1);
            res.extend((0..PVG_STATE_DIM - 1).map(|k| next[k] - yf[k]));
            res.push(next[12] - self.start_mass(arc + 1, yf[12]));
        }

        for arc in 0..n - 1 {
            res.push(match self.arcs[arc].kind {
                ArcKind::Burn => Self::arc_duration(x, arc) - self.arcs[arc].duration,
                ArcKind::Coast => coast_hamiltonian(&Self::arc_state(x, arc)),
            });
        }

        DVector::from_vec(res)
    }

    /// Central finite difference Jacobian of the residuals.
    ///
    /// An unknown only changes the propagation of its own arc, so the other arcs are not propagated again.
    pub fn jacobian(
        &self,
        x: &DVector<f64>,
        finals: &[PvgState],
    ) -> Result<DMatrix<f64>, OptimizerError> {
        let n = self.num_unknowns();
        let mut jac = DMatrix::zeros(n, n);
        let mut perturbed = finals.to_vec();
        for j in 0..n {
            let arc = j / ARC_UNKNOWNS;
            let h = self.opts.fd_step * x[j].abs().max(1.0);

            let mut x_plus = x.clone();
            x_plus[j] += h;
            perturbed[arc] = self.propagate_arc(
                arc,
                &Self::arc_state(&x_plus, arc),
                Self::arc_duration(&x_plus, arc),
            )?;
            let res_plus = self.residuals(&x_plus, &perturbed);

            let mut x_minus = x.clone();
            x_minus[j] -= h;
            perturbed[arc] = self.propagate_arc(
                arc,
                &Self::arc_state(&x_minus, arc),
                Self::arc_duration(&x_minus, arc),
            )?;
            let res_minus = self.residuals(&x_minus, &perturbed);

            perturbed[arc] = finals[arc];
            jac.set_column(j, &((res_plus - res_minus) / (2.0 * h)));
        }
        Ok(jac)
    }
}
