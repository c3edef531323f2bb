//! Off-thread solving and the single-retry policy for adapter faults.

use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use log::warn;

use crate::backend::Solver;
use crate::error::SolveError;
use crate::problem::LpProblem;
use crate::solution::SolveOutcome;

type SolveResult = Result<SolveOutcome, SolveError>;

/// One-shot handle to a solve running on a dedicated worker thread.
#[derive(Debug)]
pub struct SolveHandle {
    problem: String,
    receiver: mpsc::Receiver<SolveResult>,
}

/// Move `problem` to a new worker thread and solve it there.
pub fn spawn_solve(problem: LpProblem, solver: Box<dyn Solver>) -> Result<SolveHandle, SolveError> {
    let (sender, receiver) = mpsc::channel();
    let name = problem.name.clone();

    thread::Builder::new()
        .name(format!("solve-{}", name))
        .spawn(move || {
            let result = solver.solve(&problem);
            // The handle may have given up waiting already.
            let _ = sender.send(result);
        })
        .map_err(|e| SolveError::Unavailable(format!("cannot start solver worker: {}", e)))?;

    Ok(SolveHandle {
        problem: name,
        receiver,
    })
}

impl SolveHandle {
    /// Block until the worker finishes.
    pub fn wait(self) -> SolveResult {
        self.receiver.recv().map_err(|_| SolveError::WorkerLost)?
    }

    /// Block for at most `limit`. The worker is abandoned, not killed, when the limit passes.
    pub fn wait_timeout(self, limit: Duration) -> SolveResult {
        match self.receiver.recv_timeout(limit) {
            Ok(result) => result,
            Err(mpsc::RecvTimeoutError::Timeout) => {
                warn!(
                    "{} still running after {:.1}s, abandoning worker",
                    self.problem,
                    limit.as_secs_f64()
                );
                Err(SolveError::TimeLimit(limit.as_secs_f64()))
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(SolveError::WorkerLost),
        }
    }
}

/// Solve with `primary`; on an adapter fault retry exactly once with `fallback`.
///
/// Infeasible and unbounded outcomes are answers about the model and are never retried.
pub fn solve_with_retry(
    problem: &LpProblem,
    primary: &dyn Solver,
    fallback: &dyn Solver,
) -> SolveResult {
    match primary.solve(problem) {
        Ok(outcome) => Ok(outcome),
        Err(fault) => {
            warn!(
                "{} failed on {}: {}; retrying with {}",
                problem.name,
                primary.name(),
                fault,
                fallback.name()
            );
            fallback.solve(problem)
        }
    }
}

/// Pairs a primary solver with a fallback used once when the primary faults.
pub struct WithFallback {
    primary: Box<dyn Solver>,
    fallback: Box<dyn Solver>,
}

impl WithFallback {
    pub fn new(primary: Box<dyn Solver>, fallback: Box<dyn Solver>) -> Self {
        Self { primary, fallback }
    }
}

impl Solver for WithFallback {
    fn solve(&self, problem: &LpProblem) -> SolveResult {
        solve_with_retry(problem, self.primary.as_ref(), self.fallback.as_ref())
    }

    fn name(&self) -> &str {
        self.primary.name()
    }
}
