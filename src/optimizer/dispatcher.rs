use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::{diagnose, strategy_for, DispatchPlan, DispatchProblem, DispatchStrategy, HeuristicDispatcher, Relaxation};
use crate::config::SolverConfig;
use crate::domain::OptimizationStatus;
use crate::error::OptimizationError;

const POLL_INTERVAL: Duration = Duration::from_millis(25);

#[derive(Debug, Clone)]
pub struct DispatchOutcome {
    pub plan: DispatchPlan,
    pub relaxed: bool,
    /// Strategy that produced `plan`; names the fallback when the configured one timed out.
    pub strategy: String,
    pub solver_time_seconds: f64,
}

/// Runs a strategy on a worker thread under a time limit, with one relaxation retry.
///
/// On timeout or cancel the worker's token is cancelled, so it skips the
/// relaxed retry. A solve already inside the LP backend cannot be interrupted:
/// the detached thread runs that one solve to completion and its result is dropped.
pub struct Dispatcher {
    strategy: Arc<dyn DispatchStrategy>,
    time_limit: Duration,
    relaxation: Relaxation,
}

impl Dispatcher {
    pub fn new(strategy: Arc<dyn DispatchStrategy>, solver: &SolverConfig) -> Self {
        Self {
            strategy,
            time_limit: Duration::from_secs_f64(solver.time_limit_seconds.max(0.0)),
            relaxation: Relaxation::Shortfall {
                max_fraction: solver.max_shortfall_fraction,
                penalty_per_mwh: solver.shortfall_penalty_per_mwh,
            },
        }
    }

    pub fn from_config(solver: &SolverConfig) -> Self {
        Self::new(strategy_for(solver.strategy), solver)
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    pub fn dispatch(
        &self,
        problem: Arc<DispatchProblem>,
        cancel: &CancellationToken,
    ) -> Result<DispatchOutcome, OptimizationError> {
        let started = Instant::now();
        let deadline = started + self.time_limit;
        let strategy_name = self.strategy.name();

        let (tx, rx) = mpsc::channel();
        let strategy = Arc::clone(&self.strategy);
        let worker_problem = Arc::clone(&problem);
        let relaxation = self.relaxation;
        let solve_token = cancel.child_token();
        let worker_token = solve_token.clone();
        thread::Builder::new()
            .name("dispatch-solver".to_string())
            .spawn(move || {
                let result = solve_with_retry(strategy.as_ref(), &worker_problem, relaxation, &worker_token);
                let _ = tx.send(result);
            })
            .map_err(|e| OptimizationError::Solver(format!("failed to start solver thread: {e}")))?;

        loop {
            if cancel.is_cancelled() {
                warn!(strategy = strategy_name, "Optimization cancelled");
                return Err(OptimizationError::Cancelled);
            }

            let now = Instant::now();
            if now >= deadline {
                solve_token.cancel();
                return self.incumbent(&problem, started, cancel);
            }

            match rx.recv_timeout((deadline - now).min(POLL_INTERVAL)) {
                Ok(result) => {
                    let (plan, relaxed) = result?;
                    let solver_time_seconds = started.elapsed().as_secs_f64();
                    info!(
                        strategy = strategy_name,
                        status = %plan.status,
                        relaxed,
                        solver_time_seconds,
                        "Dispatch solved"
                    );
                    return Ok(DispatchOutcome {
                        plan,
                        relaxed,
                        strategy: strategy_name.to_string(),
                        solver_time_seconds,
                    });
                }
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(OptimizationError::Solver(
                        "solver thread exited without a result".to_string(),
                    ))
                }
            }
        }
    }

    /// Best plan available once the time limit has passed.
    fn incumbent(
        &self,
        problem: &DispatchProblem,
        started: Instant,
        cancel: &CancellationToken,
    ) -> Result<DispatchOutcome, OptimizationError> {
        let after_seconds = started.elapsed().as_secs_f64();
        let fallback = HeuristicDispatcher;
        if self.strategy.name() == fallback.name() {
            return Err(OptimizationError::TimedOut { after_seconds });
        }

        warn!(
            strategy = self.strategy.name(),
            after_seconds,
            "Solver time limit reached, using heuristic incumbent"
        );
        let (mut plan, relaxed) = solve_with_retry(&fallback, problem, self.relaxation, cancel)?;
        plan.status = OptimizationStatus::Feasible;
        Ok(DispatchOutcome {
            plan,
            relaxed,
            strategy: format!("{} ({} timed out)", fallback.name(), self.strategy.name()),
            solver_time_seconds: started.elapsed().as_secs_f64(),
        })
    }
}

/// Strict solve, then a single retry with bounded cooling shortfall.
///
/// A cancelled `cancel` token skips the retry.
pub fn solve_with_retry(
    strategy: &dyn DispatchStrategy,
    problem: &DispatchProblem,
    relaxation: Relaxation,
    cancel: &CancellationToken,
) -> Result<(DispatchPlan, bool), OptimizationError> {
    match strategy.solve(problem) {
        Ok(plan) => Ok((plan, false)),
        Err(OptimizationError::Infeasible { .. }) if cancel.is_cancelled() => Err(OptimizationError::Cancelled),
        Err(OptimizationError::Infeasible { hour, constraint }) => {
            warn!(
                strategy = strategy.name(),
                hour,
                constraint,
                "Problem infeasible, retrying with cooling shortfall allowed"
            );
            let relaxed = problem.with_relaxation(relaxation);
            match strategy.solve(&relaxed) {
                Ok(mut plan) => {
                    plan.status = OptimizationStatus::Feasible;
                    Ok((plan, true))
                }
                Err(OptimizationError::Infeasible { .. }) => Err(diagnose(&relaxed)),
                Err(e) => Err(e),
            }
        }
        Err(e) => Err(e),
    }
}
