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

use super::{SolutionSlot, Ticket};
use crate::md::pvg::{AnchoredSolution, AscentProblem, Optimizer};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// A guidance problem to solve, with the ticket allowing its solution to be installed.
#[derive(Clone, Debug)]
pub struct SolveRequest {
    pub ticket: Ticket,
    pub problem: AscentProblem,
    pub previous: Option<AnchoredSolution>,
}

/// A single background thread running the optimizer, so that solves never block the control loop.
///
/// At most one request is in flight: submissions are refused while the worker is busy.
#[derive(Debug)]
pub struct SolverWorker {
    sender: Option<Sender<SolveRequest>>,
    handle: Option<JoinHandle<()>>,
    busy: Arc<AtomicBool>,
}

impl SolverWorker {
    /// Starts the worker thread, which installs its successful solutions in the provided slot.
    pub fn spawn(optimizer: Optimizer, slot: Arc<SolutionSlot>) -> io::Result<Self> {
        let (sender, receiver) = channel::<SolveRequest>();
        let busy = Arc::new(AtomicBool::new(false));
        let worker_busy = busy.clone();
        let handle = thread::Builder::new()
            .name("pvg-solver".to_string())
            .spawn(move || {
                for request in receiver {
                    match optimizer.solve(&request.problem, request.previous.as_ref()) {
                        Ok(solution) => {
                            if !slot.install(request.ticket, solution) {
                                warn!("PVG solution discarded: guidance was disabled during the solve");
                            }
                        }
                        Err(e) => error!("PVG keeps its previous solution: {e}"),
                    }
                    worker_busy.store(false, Ordering::Release);
                }
                debug!("PVG solver thread stopped");
            })?;

        Ok(Self {
            sender: Some(sender),
            handle: Some(handle),
            busy,
        })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Hands a request to the worker. Returns false if a solve is already in flight or the worker has stopped.
    pub fn submit(&self, request: SolveRequest) -> bool {
        if self.busy.swap(true, Ordering::AcqRel) {
            return false;
        }
        match &self.sender {
            Some(sender) if sender.send(request).is_ok() => true,
            _ => {
                self.busy.store(false, Ordering::Release);
                false
            }
        }
    }
}

impl Drop for SolverWorker {
    fn drop(&mut self) {
        // Closing the channel ends the worker loop once the solve in flight completes
        self.sender.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("PVG solver thread panicked");
            }
        }
    }
}
