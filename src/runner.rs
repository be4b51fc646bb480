//! Run orchestration: scenario, dispatch, baseline, summary.
//!
//! `run_optimization` is the blocking entry point. Every run threads its own
//! configuration and scenario through the call; nothing is shared between runs.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, info_span};
use uuid::Uuid;

use crate::baseline::BaselineEvaluator;
use crate::config::Config;
use crate::domain::RunSummary;
use crate::error::DispatchError;
use crate::optimizer::{extract_hours, DispatchLimits, DispatchProblem, Dispatcher};
use crate::physics::CoolingModel;
use crate::scenario::{FeedSet, ScenarioBuilder};
use crate::summary::{RunSummarizer, SolveDiagnostics};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRequest {
    pub run_name: String,
    pub config: Config,
}

impl RunRequest {
    pub fn new(run_name: impl Into<String>, config: Config) -> Self {
        Self { run_name: run_name.into(), config }
    }
}

/// Runs one optimization to completion on the calling thread.
///
/// Configuration and scenario problems are returned as `Err`. Solver failures
/// still produce a summary, with an infeasible or error status and no hourly results.
pub fn run_optimization(
    request: &RunRequest,
    feeds: &FeedSet,
    cancel: &CancellationToken,
) -> Result<RunSummary, DispatchError> {
    let config = &request.config;
    config.validate()?;

    let run_id = Uuid::new_v4();
    let run_timestamp = Utc::now();
    let span = info_span!("optimization_run", %run_id, run_name = %request.run_name);
    let _enter = span.enter();

    let scenario = ScenarioBuilder::from_config(config).build(feeds)?;
    info!(hours = scenario.hours(), "Scenario ready");

    let model = CoolingModel::new(config.cooling.clone());
    let problem = Arc::new(DispatchProblem::new(
        &scenario.slots,
        model,
        DispatchLimits::from_config(config),
    ));
    let dispatcher = Dispatcher::from_config(&config.solver);
    let summarizer = RunSummarizer::new(config, run_id, run_timestamp, request.run_name.clone());

    let started = Instant::now();
    let dispatched = dispatcher.dispatch(Arc::clone(&problem), cancel).and_then(|outcome| {
        let hours = extract_hours(&problem, &outcome.plan)?;
        Ok((outcome, hours))
    });

    let summary = match dispatched {
        Ok((outcome, hours)) => {
            let baseline = BaselineEvaluator::new(config).evaluate(&scenario.slots);
            let diagnostics = SolveDiagnostics {
                strategy: outcome.strategy,
                solver_time_seconds: outcome.solver_time_seconds,
                relaxed: outcome.relaxed,
            };
            summarizer.finalize(&scenario, hours, &baseline, diagnostics, outcome.plan.status)
        }
        Err(e) => {
            error!(error = %e, status = %e.status(), "Optimization failed");
            let diagnostics = SolveDiagnostics {
                strategy: dispatcher.strategy_name().to_string(),
                solver_time_seconds: started.elapsed().as_secs_f64(),
                relaxed: false,
            };
            summarizer.failed(&scenario, &e, diagnostics)
        }
    };

    info!(
        status = %summary.optimization_status,
        total_cost = summary.total_cost,
        cost_savings = summary.cost_savings,
        solver_time_seconds = summary.solver_time_seconds,
        "Run complete"
    );
    Ok(summary)
}

/// Offloads a run to the blocking pool so async callers stay responsive.
pub fn spawn_optimization(
    request: RunRequest,
    feeds: FeedSet,
    cancel: CancellationToken,
) -> JoinHandle<Result<RunSummary, DispatchError>> {
    tokio::task::spawn_blocking(move || run_optimization(&request, &feeds, &cancel))
}

/// Awaits a spawned run, folding a panicked worker into `DispatchError`.
pub async fn join_optimization(
    handle: JoinHandle<Result<RunSummary, DispatchError>>,
) -> Result<RunSummary, DispatchError> {
    handle
        .await
        .map_err(|e| DispatchError::Worker(e.to_string()))?
}
