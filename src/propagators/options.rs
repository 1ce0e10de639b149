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

use std::fmt;

use super::{ErrorCtrl, RSSState};
use typed_builder::TypedBuilder;

/// PropOpts stores the integrator options, including the minimum and maximum step sizes, and the
/// max error size.
///
/// All durations are in the time unit of the dynamics being integrated (seconds for physical dynamics, or the
/// normalized time unit of the guidance problem).
#[derive(Clone, Copy, Debug, TypedBuilder)]
#[builder(doc)]
pub struct PropOpts<E: ErrorCtrl> {
    #[builder(default = 1e-2)]
    pub init_step: f64,
    #[builder(default = 1e-12)]
    pub min_step: f64,
    #[builder(default = 10.0)]
    pub max_step: f64,
    #[builder(default = 1e-10)]
    pub tolerance: f64,
    /// Maximum number of step size reductions within a single step
    #[builder(default = 50)]
    pub attempts: u8,
    /// Maximum number of step attempts (accepted or rejected) over a whole integration
    #[builder(default = 100_000)]
    pub max_iter: usize,
    /// Precision of the event time, in the same unit as the steps
    #[builder(default = 1e-12)]
    pub event_precision: f64,
    pub error_ctrl: E,
}

impl<E: ErrorCtrl> PropOpts<E> {
    /// `with_adaptive_step` initializes an `PropOpts` such that the integrator is used with an
    ///  adaptive step size. The number of attempts is currently fixed to 50 (as in GMAT).
    pub fn with_adaptive_step(min_step: f64, max_step: f64, tolerance: f64, error_ctrl: E) -> Self {
        PropOpts {
            init_step: max_step,
            min_step,
            max_step,
            tolerance,
            attempts: 50,
            max_iter: 100_000,
            event_precision: 1e-12,
            error_ctrl,
        }
    }

    /// Returns a string with the information about these options
    pub fn info(&self) -> String {
        format!("{self}")
    }

    /// Set the maximum step size and sets the initial step to that value if currently greater
    pub fn set_max_step(&mut self, max_step: f64) {
        if self.init_step > max_step {
            self.init_step = max_step;
        }
        self.max_step = max_step;
    }

    /// Set the minimum step size and sets the initial step to that value if currently smaller
    pub fn set_min_step(&mut self, min_step: f64) {
        if self.init_step < min_step {
            self.init_step = min_step;
        }
        self.min_step = min_step;
    }
}

impl<E: ErrorCtrl> fmt::Display for PropOpts<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "min_step: {:e}, max_step: {:e}, tol: {:e}, attempts: {}, max_iter: {}",
            self.min_step, self.max_step, self.tolerance, self.attempts, self.max_iter,
        )
    }
}

impl PropOpts<RSSState> {
    /// Returns the default options with a specific tolerance.
    #[allow(clippy::field_reassign_with_default)]
    pub fn with_tolerance(tolerance: f64) -> Self {
        let mut opts = Self::default();
        opts.tolerance = tolerance;
        opts
    }

    /// Creates a propagator with the provided max step, and sets the initial step to that value as well.
    #[allow(clippy::field_reassign_with_default)]
    pub fn with_max_step(max_step: f64) -> Self {
        let mut opts = Self::default();
        opts.set_max_step(max_step);
        opts
    }
}

impl Default for PropOpts<RSSState> {
    fn default() -> PropOpts<RSSState> {
        PropOpts::builder().error_ctrl(RSSState).build()
    }
}

#[test]
fn test_options() {
    use super::error_ctrl::RSSStep;

    let opts = PropOpts::with_adaptive_step(1e-2, 10.0, 1e-12, RSSStep {});
    assert!((opts.min_step - 1e-2).abs() < f64::EPSILON);
    assert!((opts.max_step - 10.0).abs() < f64::EPSILON);
    assert!((opts.init_step - 10.0).abs() < f64::EPSILON);
    assert!((opts.tolerance - 1e-12).abs() < f64::EPSILON);

    let opts: PropOpts<RSSState> = Default::default();
    assert!((opts.init_step - 1e-2).abs() < f64::EPSILON);
    assert!((opts.min_step - 1e-12).abs() < f64::EPSILON);
    assert!((opts.max_step - 10.0).abs() < f64::EPSILON);
    assert!((opts.tolerance - 1e-10).abs() < f64::EPSILON);
    assert_eq!(opts.attempts, 50);
    assert_eq!(opts.max_iter, 100_000);

    let opts = PropOpts::with_max_step(1e-3);
    assert!((opts.init_step - 1e-3).abs() < f64::EPSILON);
    assert!((opts.max_step - 1e-3).abs() < f64::EPSILON);

    let opts = PropOpts::builder()
        .tolerance(1e-8)
        .max_iter(10)
        .error_ctrl(RSSState)
        .build();
    assert_eq!(opts.max_iter, 10);
    assert!(opts.info().contains("max_iter: 10"));
}
