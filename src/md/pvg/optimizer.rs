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

extern crate levenberg_marquardt;

use super::guess::{cold_start, warm_start};
use super::problem::NormalizedProblem;
use super::{AnchoredSolution, AscentProblem, OptimizerError, OptimizerOpts, Solution};
use crate::dynamics::PvgState;
use crate::linalg::{storage::Owned, DMatrix, DVector, Dyn};
use levenberg_marquardt::{LeastSquaresProblem, LevenbergMarquardt};
use std::time::Instant;

/// Residual value returned for every row when the arcs cannot be propagated, which rejects the trial step.
const PROPAGATION_FAILURE_RESIDUAL: f64 = 1e6;

/// Relative tolerance on the duration of the final burn with respect to the stage burn time.
const BURN_TIME_TOLERANCE: f64 = 1e-6;

/// The shooting problem as seen by the Levenberg Marquardt solver.
struct ShootingProblem<'a> {
    problem: &'a NormalizedProblem,
    x: DVector<f64>,
    finals: Option<Vec<PvgState>>,
}

impl<'a> ShootingProblem<'a> {
    fn new(problem: &'a NormalizedProblem, x0: DVector<f64>) -> Self {
        let mut me = Self {
            problem,
            x: x0.clone(),
            finals: None,
        };
        me.set_params(&x0);
        me
    }
}

impl LeastSquaresProblem<f64, Dyn, Dyn> for ShootingProblem<'_> {
    type ResidualStorage = Owned<f64, Dyn>;
    type JacobianStorage = Owned<f64, Dyn, Dyn>;
    type ParameterStorage = Owned<f64, Dyn>;

    fn set_params(&mut self, x: &DVector<f64>) {
        self.x.copy_from(x);
        self.finals = match self.problem.propagate_all(&self.x) {
            Ok(finals) => Some(finals),
            Err(e) => {
                debug!("trial step rejected: {e}");
                None
            }
        };
    }

    fn params(&self) -> DVector<f64> {
        self.x.clone()
    }

    fn residuals(&self) -> Option<DVector<f64>> {
        Some(match &self.finals {
            Some(finals) => self.problem.residuals(&self.x, finals),
            None => DVector::from_element(self.x.len(), PROPAGATION_FAILURE_RESIDUAL),
        })
    }

    fn jacobian(&self) -> Option<DMatrix<f64>> {
        let finals = self.finals.as_ref()?;
        match self.problem.jacobian(&self.x, finals) {
            Ok(jac) => Some(jac),
            Err(e) => {
                warn!("could not compute the Jacobian: {e}");
                None
            }
        }
    }
}

/// Solver of the optimal ascent problem with the primer vector formulation.
///
/// Each arc is shot from its own initial state, and the whole set of boundary conditions is driven to zero with a
/// Levenberg Marquardt least squares solver.
#[derive(Copy, Clone, Debug, Default)]
pub struct Optimizer {
    pub opts: OptimizerOpts,
}

impl Optimizer {
    pub fn new(opts: OptimizerOpts) -> Self {
        Self { opts }
    }

    /// Solves the provided problem, starting from the previous solution when there is one.
    ///
    /// If the previous solution cannot be used, e.g. because it has already ended, a cold start is used instead.
    pub fn solve(
        &self,
        problem: &AscentProblem,
        previous: Option<&AnchoredSolution>,
    ) -> Result<Solution, OptimizerError> {
        problem.validate()?;
        let normalized = NormalizedProblem::new(problem, &self.opts);
        let start = Instant::now();

        let x0 = match previous {
            Some(prev) => match warm_start(&normalized, prev) {
                Ok(x0) => x0,
                Err(e) => {
                    info!("cannot warm start ({e}), using a cold start");
                    cold_start(&normalized)?
                }
            },
            None => cold_start(&normalized)?,
        };

        let lm = LevenbergMarquardt::new()
            .with_patience(self.opts.patience)
            .with_ftol(self.opts.ftol)
            .with_xtol(self.opts.xtol)
            .with_gtol(self.opts.gtol);
        let (shooting, report) = lm.minimize(ShootingProblem::new(&normalized, x0));

        let residual_norm = match (&shooting.finals, shooting.residuals()) {
            (Some(_), Some(res)) => res.norm(),
            _ => f64::INFINITY,
        };
        if !(residual_norm <= self.opts.convergence_tol) {
            error!(
                "PVG failed to converge: residual norm {residual_norm:.3e} after {} evaluations ({:?})",
                report.number_of_evaluations, report.termination
            );
            return Err(OptimizerError::ConvergenceFailure {
                residual: residual_norm,
                evaluations: report.number_of_evaluations,
                reason: format!("{:?}", report.termination),
            });
        }
        if !report.termination.was_successful() {
            debug!(
                "residuals below tolerance although the solver stopped with {:?}",
                report.termination
            );
        }

        let x = shooting.x;
        self.check_durations(&normalized, &x, residual_norm, report.number_of_evaluations)?;

        let solution = Solution::from_unknowns(
            &normalized,
            &x,
            problem.target,
            residual_norm,
            report.number_of_evaluations,
        )?;
        info!(
            "PVG converged in {} evaluations ({} ms): residual {:.3e}, tgo {:.2} s",
            report.number_of_evaluations,
            start.elapsed().as_millis(),
            residual_norm,
            solution.tgo(problem.t)
        );
        Ok(solution)
    }

    /// Rejects solutions which fly arcs backward in time or burn longer than the final stage can.
    fn check_durations(
        &self,
        problem: &NormalizedProblem,
        x: &DVector<f64>,
        residual: f64,
        evaluations: usize,
    ) -> Result<(), OptimizerError> {
        let last = problem.num_arcs() - 1;
        for arc in 0..=last {
            let duration = NormalizedProblem::arc_duration(x, arc);
            let reason = if duration < 0.0 {
                format!("arc {arc} has a negative duration {duration:.3e}")
            } else if arc == last
                && duration > problem.arcs[last].duration * (1.0 + BURN_TIME_TOLERANCE)
            {
                format!(
                    "final burn of {:.3} s exceeds the burn time of its stage ({:.3} s)",
                    duration * problem.scales.time,
                    problem.arcs[last].duration * problem.scales.time
                )
            } else {
                continue;
            };
            error!("PVG solution rejected: {reason}");
            return Err(OptimizerError::ConvergenceFailure {
                residual,
                evaluations,
                reason,
            });
        }
        Ok(())
    }
}
