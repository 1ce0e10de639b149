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

use super::error_ctrl::ErrorCtrl;
use super::{
    DynamicsSnafu, Event, EventAction, EventLocationSnafu, EventOccurrence, IntegrationDetails,
    InvalidInputSnafu, PropagationError, Propagator,
};
use crate::dynamics::Dynamics;
use crate::linalg::SVector;
use crate::tools::brent_root;
use crate::utils::hermite_interp;
use snafu::prelude::*;

/// Maximum number of iterations of the event time search.
const EVENT_MAX_ITER: usize = 100;

/// A Propagator instance, which stores the current time and state, and the adapted step size.
#[derive(Debug)]
pub struct PropInstance<'a, D, E, const N: usize>
where
    D: Dynamics<N>,
    E: ErrorCtrl,
{
    /// The current time of this propagator instance
    pub t: f64,
    /// The state of this propagator instance
    pub state: SVector<f64, N>,
    /// The propagator setup (kind, stages, etc.)
    pub prop: &'a Propagator<D, E, N>,
    /// Stores the details of the previous integration step
    pub details: IntegrationDetails,
    /// Total number of step attempts since this instance was created
    pub iterations: usize,
    pub(crate) step_size: f64, // Magnitude of the adapted step for the _next_ call
    // Allows us to do pre-allocation of the ki vectors
    pub(crate) k: Vec<SVector<f64, N>>,
    // Derivative at the current state, reused by FSAL integrators
    pub(crate) deriv: Option<SVector<f64, N>>,
}

/// The outcome of an integration through checkpoints, possibly interrupted by an event.
#[derive(Clone, Debug)]
pub struct Integration<const N: usize> {
    /// Time and state at each checkpoint reached, in order
    pub checkpoints: Vec<(f64, SVector<f64, N>)>,
    /// Events located during the integration, in chronological order
    pub events: Vec<EventOccurrence<N>>,
    /// Index of the event which stopped the integration, if any
    pub stopped_on: Option<usize>,
    /// Final time
    pub t: f64,
    /// Final state
    pub state: SVector<f64, N>,
    /// Number of accepted steps
    pub steps: usize,
}

/// An accepted step: the step used, the new state, and the derivatives at both ends of the step.
struct StepOutcome<const N: usize> {
    step: f64,
    state: SVector<f64, N>,
    deriv_start: SVector<f64, N>,
    deriv_end: SVector<f64, N>,
}

impl<'a, D, E, const N: usize> PropInstance<'a, D, E, N>
where
    D: Dynamics<N>,
    E: ErrorCtrl,
{
    /// Allows setting the step size of the propagator
    pub fn set_step(&mut self, step_size: f64) {
        self.step_size = step_size.abs();
    }

    /// Propagates until the provided time and returns the state at that time.
    pub fn until(&mut self, t_end: f64) -> Result<SVector<f64, N>, PropagationError> {
        Ok(self.integrate(&[t_end], &[])?.state)
    }

    /// Propagates for the provided duration (which may be negative) and returns the final state.
    pub fn for_duration(&mut self, duration: f64) -> Result<SVector<f64, N>, PropagationError> {
        let t_end = self.t + duration;
        self.until(t_end)
    }

    /// Propagates through all of the checkpoints, and returns the state at each of them.
    pub fn through(
        &mut self,
        checkpoints: &[f64],
    ) -> Result<Vec<(f64, SVector<f64, N>)>, PropagationError> {
        Ok(self.integrate(checkpoints, &[])?.checkpoints)
    }

    /// Propagates until `t_end` or until the first event whose action is to stop.
    pub fn until_event(
        &mut self,
        t_end: f64,
        events: &[Event<'_, N>],
    ) -> Result<Integration<N>, PropagationError> {
        self.integrate(&[t_end], events)
    }

    /// Integrates through the ordered checkpoints, landing exactly on each of them, while monitoring the events.
    ///
    /// Checkpoints must be ordered in the direction of integration, which is given by the last checkpoint.
    /// When several events cross zero in the same step, the earliest one is located first and the step is
    /// retaken from there, so that later crossings are found in the following steps.
    pub fn integrate(
        &mut self,
        checkpoints: &[f64],
        events: &[Event<'_, N>],
    ) -> Result<Integration<N>, PropagationError> {
        let t_end = match checkpoints.last() {
            Some(t_end) => *t_end,
            None => {
                return InvalidInputSnafu {
                    msg: "no checkpoint to integrate to",
                }
                .fail()
            }
        };
        ensure!(
            checkpoints.iter().all(|t| t.is_finite()),
            InvalidInputSnafu {
                msg: "checkpoints must be finite"
            }
        );
        ensure!(
            self.state.iter().all(|x| x.is_finite()),
            super::NonFiniteStateSnafu { t: self.t }
        );

        let dir = if t_end >= self.t { 1.0 } else { -1.0 };
        let mut prev = self.t;
        for &cp in checkpoints {
            ensure!(
                (cp - prev) * dir >= 0.0,
                InvalidInputSnafu {
                    msg: format!("checkpoint {cp} is out of order (previous is {prev})")
                }
            );
            prev = cp;
        }

        let mut out = Integration {
            checkpoints: Vec::with_capacity(checkpoints.len()),
            events: Vec::new(),
            stopped_on: None,
            t: self.t,
            state: self.state,
            steps: 0,
        };

        let mut g_prev: Vec<f64> = events.iter().map(|e| e.eval(self.t, &self.state)).collect();
        let mut cp_idx = 0;

        loop {
            while cp_idx < checkpoints.len() && (checkpoints[cp_idx] - self.t) * dir <= 0.0 {
                out.checkpoints.push((checkpoints[cp_idx], self.state));
                cp_idx += 1;
            }
            if cp_idx == checkpoints.len() {
                break;
            }

            let target = checkpoints[cp_idx];
            let remaining = target - self.t;
            // Shrink the step to land exactly on the checkpoint, even if below the minimum step
            let landing = self.step_size >= remaining.abs();
            let step = if landing {
                remaining
            } else {
                dir * self.step_size
            };

            let t_prev = self.t;
            let y_prev = self.state;
            let outcome = self.derive(step)?;
            let t_next = if landing && outcome.step == step {
                target
            } else {
                t_prev + outcome.step
            };
            out.steps += 1;

            if !events.is_empty() {
                let g_next: Vec<f64> = events.iter().map(|e| e.eval(t_next, &outcome.state)).collect();

                let mut earliest: Option<(usize, f64)> = None;
                for (i, event) in events.iter().enumerate() {
                    if !event.triggered(g_prev[i], g_next[i]) {
                        continue;
                    }
                    if g_next[i] == 0.0 {
                        // Crossing exactly at the end of the step
                        if earliest.map_or(true, |(_, t_e)| (t_next - t_e) * dir < 0.0) {
                            earliest = Some((i, t_next));
                        }
                        continue;
                    }
                    let interp = |t: f64| {
                        hermite_interp(
                            t_prev,
                            &y_prev,
                            &outcome.deriv_start,
                            t_next,
                            &outcome.state,
                            &outcome.deriv_end,
                            t,
                        )
                    };
                    let precision = self
                        .prop
                        .opts
                        .event_precision
                        .max(4.0 * f64::EPSILON * t_next.abs());
                    let root = brent_root(
                        |t| event.eval(t, &interp(t)),
                        t_prev,
                        t_next,
                        precision,
                        EVENT_MAX_ITER,
                        event.after_crossing_sign(g_prev[i]),
                    )
                    .context(EventLocationSnafu {
                        event: event.name.clone(),
                    })?;

                    if earliest.map_or(true, |(_, t_e)| (root.x - t_e) * dir < 0.0) {
                        earliest = Some((i, root.x));
                    }
                }

                if let Some((idx, t_event)) = earliest {
                    // Retake the step from its start to land exactly on the event
                    let (state_event, deriv_event) = if t_event == t_next {
                        (outcome.state, outcome.deriv_end)
                    } else if t_event == t_prev {
                        (y_prev, outcome.deriv_start)
                    } else {
                        self.exact_step(t_event - t_prev)?
                    };
                    let sign = events[idx].after_crossing_sign(g_prev[idx]);
                    self.t = t_event;
                    self.state = state_event;
                    self.deriv = Some(deriv_event);

                    g_prev = events.iter().map(|e| e.eval(self.t, &self.state)).collect();
                    // The located crossing must not be detected again from the restart point
                    if g_prev[idx] != 0.0 && (g_prev[idx] > 0.0) != (sign > 0) {
                        g_prev[idx] = 0.0;
                    }

                    debug!("event `{}` located at t = {}", events[idx].name, self.t);
                    out.events.push(EventOccurrence {
                        index: idx,
                        name: events[idx].name.clone(),
                        t: self.t,
                        state: self.state,
                    });

                    if events[idx].action == EventAction::Stop {
                        out.stopped_on = Some(idx);
                        break;
                    }
                    continue;
                }
                g_prev = g_next;
            }

            self.t = t_next;
            self.state = outcome.state;
            self.deriv = Some(outcome.deriv_end);
        }

        out.t = self.t;
        out.state = self.state;
        Ok(out)
    }

    /// Take a single adaptive step in the direction of `step` and return the time step actually used.
    pub fn single_step(&mut self, forward: bool) -> Result<f64, PropagationError> {
        let step = if forward {
            self.step_size
        } else {
            -self.step_size
        };
        let outcome = self.derive(step)?;
        self.t += outcome.step;
        self.state = outcome.state;
        self.deriv = Some(outcome.deriv_end);
        Ok(outcome.step)
    }

    /// Derivative at the current state, computed once per state.
    fn current_derivative(&mut self) -> Result<SVector<f64, N>, PropagationError> {
        match self.deriv {
            Some(deriv) => Ok(deriv),
            None => {
                let deriv = self
                    .prop
                    .dynamics
                    .eom(self.t, &self.state)
                    .context(DynamicsSnafu)?;
                self.deriv = Some(deriv);
                Ok(deriv)
            }
        }
    }

    /// Computes one Runge Kutta step of the provided size from the current state, returning the propagated state and
    /// the error estimate. The stages are stored in `self.k`.
    fn rk_step(
        &mut self,
        step_size: f64,
        k0: &SVector<f64, N>,
    ) -> Result<(SVector<f64, N>, SVector<f64, N>), PropagationError> {
        let stages = self.prop.stages;
        self.k[0] = *k0;
        let mut a_idx: usize = 0;
        for i in 0..(stages - 1) {
            // Let's compute the c_i by summing the relevant items from the list of coefficients.
            // \sum_{j=1}^{i-1} a_ij  ∀ i ∈ [2, s]
            let mut ci: f64 = 0.0;
            // The wi stores the a_{s1} * k_1 + a_{s2} * k_2 + ... + a_{s, s-1} * k_{s-1} +
            let mut wi = SVector::<f64, N>::zeros();
            for kj in &self.k[0..i + 1] {
                let a_ij = self.prop.a_coeffs[a_idx];
                ci += a_ij;
                wi += a_ij * kj;
                a_idx += 1;
            }

            let ki = self
                .prop
                .dynamics
                .eom(self.t + ci * step_size, &(self.state + step_size * wi))
                .context(DynamicsSnafu)?;
            self.k[i + 1] = ki;
        }
        // Compute the next state and the error
        let mut next_state = self.state;
        // State error estimation from https://en.wikipedia.org/wiki/Runge%E2%80%93Kutta_methods#Adaptive_Runge%E2%80%93Kutta_methods
        let mut error_est = SVector::<f64, N>::zeros();
        for (i, ki) in self.k.iter().enumerate() {
            let b_i = self.prop.b_coeffs[i];
            let b_i_star = self.prop.b_coeffs[i + stages];
            error_est += step_size * (b_i - b_i_star) * ki;
            next_state += step_size * b_i * ki;
        }
        Ok((next_state, error_est))
    }

    /// Derivative at the end of the step that was just computed.
    fn end_derivative(
        &self,
        t_end: f64,
        next_state: &SVector<f64, N>,
    ) -> Result<SVector<f64, N>, PropagationError> {
        if self.prop.fsal {
            Ok(self.k[self.prop.stages - 1])
        } else {
            self.prop
                .dynamics
                .eom(t_end, next_state)
                .context(DynamicsSnafu)
        }
    }

    /// Takes a step of exactly the provided size, without error control.
    fn exact_step(
        &mut self,
        step_size: f64,
    ) -> Result<(SVector<f64, N>, SVector<f64, N>), PropagationError> {
        let k0 = self.current_derivative()?;
        let (next_state, _) = self.rk_step(step_size, &k0)?;
        ensure!(
            next_state.iter().all(|x| x.is_finite()),
            super::NonFiniteStateSnafu { t: self.t }
        );
        let deriv = self.end_derivative(self.t + step_size, &next_state)?;
        Ok((next_state, deriv))
    }

    /// This method integrates the dynamics from the current state, adapting the step size until the error is within
    /// tolerance. It does not update the current state: it returns the step used and the candidate state.
    ///
    /// The step control follows `s = clamp(0.84 (tol/err)^(1/order), 0.1, 4)`.
    /// To get the integration details, check `self.latest_details`.
    fn derive(&mut self, step: f64) -> Result<StepOutcome<N>, PropagationError> {
        let opts = self.prop.opts;
        let k0 = self.current_derivative()?;
        // Reset the number of attempts used (we don't reset the error because it's set before it's read)
        self.details.attempts = 1;
        let shortened = step.abs() < self.step_size;
        let mut step_size = step;
        loop {
            self.iterations += 1;
            ensure!(
                self.iterations <= opts.max_iter,
                super::IterationLimitExceededSnafu {
                    iterations: opts.max_iter,
                    t: self.t
                }
            );

            let (next_state, error_est) = self.rk_step(step_size, &k0)?;
            let error = if next_state.iter().all(|x| x.is_finite()) {
                E::estimate(&error_est, &next_state, &self.state)
            } else {
                f64::INFINITY
            };
            let factor = if error > 0.0 {
                (0.84 * (opts.tolerance / error).powf(1.0 / f64::from(self.prop.order)))
                    .clamp(0.1, 4.0)
            } else {
                4.0
            };
            let abs_step = step_size.abs();

            if error <= opts.tolerance
                || abs_step <= opts.min_step
                || self.details.attempts >= opts.attempts
            {
                ensure!(error.is_finite(), super::NonFiniteStateSnafu { t: self.t });
                if error > opts.tolerance {
                    warn!(
                        "accepting step of {abs_step:e} at t = {} with error {error:e} above tolerance {:e} ({} attempts)",
                        self.t, opts.tolerance, self.details.attempts
                    );
                }
                self.details.step = step_size;
                self.details.error = error;

                let proposed = (abs_step * factor).clamp(opts.min_step, opts.max_step);
                // A step shortened to reach a checkpoint does not reduce the adapted step
                self.step_size = if shortened && self.details.attempts == 1 {
                    self.step_size.max(proposed)
                } else {
                    proposed
                };

                let deriv_end = self.end_derivative(self.t + step_size, &next_state)?;
                return Ok(StepOutcome {
                    step: step_size,
                    state: next_state,
                    deriv_start: k0,
                    deriv_end,
                });
            } else {
                // Error is too high and we aren't using the smallest step, and we haven't hit the max number of attempts.
                // So let's adapt the step size.
                self.details.attempts += 1;
                step_size = step_size.signum() * (abs_step * factor).max(opts.min_step);
                // Note that we don't set self.step_size, that will be updated right before we return
            }
        }
    }

    /// Copy the details of the latest integration step.
    pub fn latest_details(&self) -> IntegrationDetails {
        self.details
    }
}
