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

use crate::md::pvg::Solution;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

/// Permission to install the outcome of a solve, taken before the solve starts.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Ticket(u64);

/// The latest converged solution, shared between the solver and the control loop.
///
/// Installation swaps the shared pointer, so readers only ever see complete solutions. Disabling the guidance
/// invalidates every outstanding ticket, so a solve which was in flight at that time is never installed.
#[derive(Debug, Default)]
pub struct SolutionSlot {
    current: RwLock<Option<Arc<Solution>>>,
    generation: AtomicU64,
}

impl SolutionSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ticket(&self) -> Ticket {
        Ticket(self.generation.load(Ordering::Acquire))
    }

    /// Installs the solution unless the guidance was disabled since the ticket was taken. Returns whether the
    /// solution was installed.
    pub fn install(&self, ticket: Ticket, solution: Solution) -> bool {
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        // Checked under the lock so that it cannot interleave with `disable`
        if self.generation.load(Ordering::Acquire) != ticket.0 {
            return false;
        }
        *current = Some(Arc::new(solution));
        true
    }

    /// The latest installed solution, if any
    pub fn current(&self) -> Option<Arc<Solution>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Drops the current solution and invalidates all of the outstanding tickets.
    pub fn disable(&self) {
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        self.generation.fetch_add(1, Ordering::AcqRel);
        *current = None;
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }
}
