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

use super::{AdapterConfig, PvgStatus, SolutionSlot, SolveRequest, SolverWorker};
use crate::linalg::Vector3;
use crate::md::pvg::{
    AnchoredSolution, AscentProblem, FlightArc, Optimizer, OptimizerError, OptimizerOpts,
    TargetConstraint,
};
use serde_derive::{Deserialize, Serialize};
use snafu::prelude::*;
use std::sync::Arc;

/// Propulsion summary of a vehicle stage, as provided by the staging simulation. The first stage is the
/// active one, and its start mass is the current mass of the vehicle.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StageInfo {
    /// Mass at ignition of the stage (kg)
    pub start_mass: f64,
    /// Vacuum thrust (N)
    pub thrust: f64,
    /// Vacuum specific impulse (s)
    pub isp: f64,
    /// Remaining burn time (s)
    pub burn_time: f64,
    /// Remaining velocity change (m/s)
    pub delta_v: f64,
}

/// Target orbit as set by the user. Radii are from the center of the body.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TargetSpec {
    pub periapsis_radius: f64,
    pub apoapsis_radius: f64,
    pub inclination_deg: f64,
    /// Longitude of the ascending node, chosen from the launch site when unset
    #[serde(default)]
    pub lan_deg: Option<f64>,
    /// Argument of periapsis, free when unset
    #[serde(default)]
    pub argp_deg: Option<f64>,
    /// Insertion radius of an elliptical orbit with a free argument of periapsis, the periapsis when unset
    #[serde(default)]
    pub attach_radius: Option<f64>,
}

/// What an adapter update did.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AdapterOutcome {
    /// A new solution was installed
    Installed,
    /// A solve was handed to the worker
    Submitted,
    /// The last attempt was too recent, or a solve is still in flight
    RateLimited,
    /// The active stage has too little velocity change left
    LowDeltaV,
    /// The guidance is in its terminal phase or finished, and solutions are frozen
    Terminal,
    /// The guidance was disabled during the solve, which was discarded
    Stale,
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum AdapterError {
    #[snafu(display("cannot build the guidance problem: {msg}"))]
    DegenerateInput { msg: String },
    #[snafu(display("guidance solve failed: {source}"))]
    Optimizer { source: OptimizerError },
}

/// Builds the guidance problems from the vehicle data, and hands their solutions to the controller.
#[derive(Debug)]
pub struct Adapter {
    pub config: AdapterConfig,
    optimizer: Optimizer,
    slot: Arc<SolutionSlot>,
    last_attempt: Option<f64>,
}

impl Adapter {
    pub fn new(config: AdapterConfig, opts: OptimizerOpts, slot: Arc<SolutionSlot>) -> Self {
        Self {
            config,
            optimizer: Optimizer::new(opts),
            slot,
            last_attempt: None,
        }
    }

    pub fn optimizer(&self) -> &Optimizer {
        &self.optimizer
    }

    /// Builds the target constraint. Without a set longitude of the ascending node, the orbital plane is the
    /// one which passes over the current position on its ascending side.
    pub fn target_constraint(
        &self,
        r: &Vector3<f64>,
        target: &TargetSpec,
    ) -> Result<TargetConstraint, AdapterError> {
        let inc = target.inclination_deg.to_radians();
        let lan = match target.lan_deg {
            Some(lan_deg) => lan_deg.to_radians(),
            None => ascending_pass_lan(r, inc),
        };
        TargetConstraint::from_apsides(
            self.config.mu,
            target.periapsis_radius,
            target.apoapsis_radius,
            inc,
            lan,
            target.argp_deg.map(f64::to_radians),
            target.attach_radius,
        )
        .context(OptimizerSnafu)
    }

    /// Builds the flight plan: one burn per stage, with an optional coast before the final burn.
    pub fn flight_plan(&self, stages: &[StageInfo]) -> Result<Vec<FlightArc>, AdapterError> {
        ensure!(
            !stages.is_empty(),
            DegenerateInputSnafu {
                msg: "no stage left"
            }
        );
        let mut arcs = Vec::with_capacity(stages.len() + 1);
        for (idx, stage) in stages.iter().enumerate() {
            ensure!(
                stage.thrust > 0.0 && stage.isp > 0.0 && stage.burn_time > 0.0 && stage.start_mass > 0.0,
                DegenerateInputSnafu {
                    msg: format!("stage {idx} has no velocity change: {stage:?}")
                }
            );
            if idx == stages.len() - 1 {
                if let Some(coast) = self.config.coast_before_final_s {
                    arcs.push(FlightArc::coast(coast).with_stage(idx));
                }
            }
            let mut arc = FlightArc::burn(stage.thrust, stage.isp, stage.burn_time).with_stage(idx);
            if idx > 0 {
                arc = arc.with_start_mass(stage.start_mass);
            }
            arcs.push(arc);
        }
        Ok(arcs)
    }

    /// Builds the full guidance problem from the current state.
    pub fn build_problem(
        &self,
        t: f64,
        r: &Vector3<f64>,
        v: &Vector3<f64>,
        stages: &[StageInfo],
        target: &TargetSpec,
    ) -> Result<AscentProblem, AdapterError> {
        let arcs = self.flight_plan(stages)?;
        Ok(AscentProblem::builder()
            .mu(self.config.mu)
            .t(t)
            .r(*r)
            .v(*v)
            .mass(stages[0].start_mass)
            .arcs(arcs)
            .target(self.target_constraint(r, target)?)
            .build())
    }

    /// Returns why a solve should not be attempted now, if it should not.
    pub fn skip_reason(
        &self,
        t: f64,
        stages: &[StageInfo],
        status: PvgStatus,
    ) -> Option<AdapterOutcome> {
        if status.is_terminal() || status == PvgStatus::Finished {
            return Some(AdapterOutcome::Terminal);
        }
        if let Some(last) = self.last_attempt {
            if t - last < self.config.min_interval_s {
                return Some(AdapterOutcome::RateLimited);
            }
        }
        match stages.first() {
            Some(stage) if stage.delta_v >= self.config.dv_margin_m_s => None,
            _ => Some(AdapterOutcome::LowDeltaV),
        }
    }

    /// Builds the solve request of an attempt, which starts the rate limit interval.
    #[allow(clippy::too_many_arguments)]
    pub fn prepare(
        &mut self,
        t: f64,
        r: &Vector3<f64>,
        v: &Vector3<f64>,
        stages: &[StageInfo],
        target: &TargetSpec,
        previous: Option<&AnchoredSolution>,
    ) -> Result<SolveRequest, AdapterError> {
        self.last_attempt = Some(t);
        Ok(SolveRequest {
            ticket: self.slot.ticket(),
            problem: self.build_problem(t, r, v, stages, target)?,
            previous: previous.cloned(),
        })
    }

    /// Solves in the calling thread and installs the solution on success. On failure the previous solution stays
    /// in place.
    #[allow(clippy::too_many_arguments)]
    pub fn update(
        &mut self,
        t: f64,
        r: &Vector3<f64>,
        v: &Vector3<f64>,
        stages: &[StageInfo],
        target: &TargetSpec,
        status: PvgStatus,
        previous: Option<&AnchoredSolution>,
    ) -> Result<AdapterOutcome, AdapterError> {
        if let Some(outcome) = self.skip_reason(t, stages, status) {
            debug!("PVG update skipped at t = {t:.3} s: {outcome:?}");
            return Ok(outcome);
        }
        let request = self.prepare(t, r, v, stages, target, previous)?;
        match self
            .optimizer
            .solve(&request.problem, request.previous.as_ref())
        {
            Ok(solution) => {
                if self.slot.install(request.ticket, solution) {
                    Ok(AdapterOutcome::Installed)
                } else {
                    warn!("PVG solution discarded: guidance was disabled during the solve");
                    Ok(AdapterOutcome::Stale)
                }
            }
            Err(source) => {
                error!("PVG keeps its previous solution: {source}");
                Err(AdapterError::Optimizer { source })
            }
        }
    }

    /// Hands the solve to the worker instead of solving in the calling thread.
    #[allow(clippy::too_many_arguments)]
    pub fn dispatch(
        &mut self,
        worker: &SolverWorker,
        t: f64,
        r: &Vector3<f64>,
        v: &Vector3<f64>,
        stages: &[StageInfo],
        target: &TargetSpec,
        status: PvgStatus,
        previous: Option<&AnchoredSolution>,
    ) -> Result<AdapterOutcome, AdapterError> {
        if let Some(outcome) = self.skip_reason(t, stages, status) {
            debug!("PVG update skipped at t = {t:.3} s: {outcome:?}");
            return Ok(outcome);
        }
        if worker.is_busy() {
            return Ok(AdapterOutcome::RateLimited);
        }
        let request = self.prepare(t, r, v, stages, target, previous)?;
        if worker.submit(request) {
            Ok(AdapterOutcome::Submitted)
        } else {
            Ok(AdapterOutcome::RateLimited)
        }
    }
}

/// Longitude of the ascending node of the plane of inclination `inc_rad` which passes over the provided position
/// while going north. When the latitude exceeds the inclination, the closest plane is used.
pub(crate) fn ascending_pass_lan(r: &Vector3<f64>, inc_rad: f64) -> f64 {
    let rmag = r.norm();
    let lat = (r[2] / rmag).clamp(-1.0, 1.0).asin();
    let lon = r[1].atan2(r[0]);
    let sin_inc = inc_rad.sin();
    if sin_inc.abs() < 1e-12 {
        return 0.0;
    }
    let arg_lat = (lat.sin() / sin_inc).clamp(-1.0, 1.0).asin();
    (lon - (inc_rad.cos() * arg_lat.sin()).atan2(arg_lat.cos())).rem_euclid(std::f64::consts::TAU)
}
