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

use crate::linalg::SVector;
use std::fmt;

/// Direction of the zero crossing that triggers an event.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum EventDirection {
    /// From negative to positive
    Rising,
    /// From positive to negative
    Falling,
    #[default]
    Any,
}

/// What the integrator does once an event is located.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum EventAction {
    /// Stop the integration at the event
    #[default]
    Stop,
    /// Record the event and continue integrating
    Continue,
}

type EventFn<'a, const N: usize> = dyn Fn(f64, &SVector<f64, N>) -> f64 + Send + Sync + 'a;

/// A scalar event function `g(t, y)` whose zero crossings are located by the integrator.
pub struct Event<'a, const N: usize> {
    pub name: String,
    pub direction: EventDirection,
    pub action: EventAction,
    func: Box<EventFn<'a, N>>,
}

impl<'a, const N: usize> Event<'a, N> {
    /// Creates an event triggering on any crossing and stopping the integration.
    pub fn new<F>(name: &str, func: F) -> Self
    where
        F: Fn(f64, &SVector<f64, N>) -> f64 + Send + Sync + 'a,
    {
        Self {
            name: name.to_string(),
            direction: EventDirection::Any,
            action: EventAction::Stop,
            func: Box::new(func),
        }
    }

    pub fn with_direction(mut self, direction: EventDirection) -> Self {
        self.direction = direction;
        self
    }

    pub fn with_action(mut self, action: EventAction) -> Self {
        self.action = action;
        self
    }

    /// Evaluates the event function
    pub fn eval(&self, t: f64, state: &SVector<f64, N>) -> f64 {
        (self.func)(t, state)
    }

    /// Returns whether the event function crossed zero between two consecutive evaluations, in the direction
    /// of this event. A previous value of exactly zero is not a new crossing: this is the state right after
    /// an event was located.
    pub fn triggered(&self, g_old: f64, g_new: f64) -> bool {
        if g_old == 0.0 || g_old * g_new > 0.0 || g_old.is_nan() || g_new.is_nan() {
            return false;
        }
        match self.direction {
            EventDirection::Rising => g_old < 0.0,
            EventDirection::Falling => g_old > 0.0,
            EventDirection::Any => true,
        }
    }

    /// Sign of the event function right after a crossing which started at `g_old`.
    pub(crate) fn after_crossing_sign(&self, g_old: f64) -> i8 {
        if g_old > 0.0 {
            -1
        } else {
            1
        }
    }
}

impl<const N: usize> fmt::Debug for Event<'_, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("name", &self.name)
            .field("direction", &self.direction)
            .field("action", &self.action)
            .finish()
    }
}

impl<const N: usize> fmt::Display for Event<'_, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:?})", self.name, self.direction)
    }
}

/// An event located during an integration.
#[derive(Clone, Debug)]
pub struct EventOccurrence<const N: usize> {
    /// Index of the event in the list provided to the integrator
    pub index: usize,
    pub name: String,
    pub t: f64,
    pub state: SVector<f64, N>,
}
