//! Heuristic dispatch: greedy batch placement, per-hour mode lookup, then a
//! storage schedule by dynamic programming. Fast and deterministic, but not
//! provably optimal, so its plans are always reported as `feasible`.

use tracing::debug;

use crate::domain::OptimizationStatus;
use crate::error::OptimizationError;
use crate::optimizer::{
    cheapest_mode, place_batch, schedule_storage, DispatchPlan, DispatchProblem, DispatchStrategy,
    HourPlan,
};

#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicDispatcher;

impl DispatchStrategy for HeuristicDispatcher {
    fn name(&self) -> &'static str {
        "heuristic"
    }

    fn solve(&self, problem: &DispatchProblem) -> Result<DispatchPlan, OptimizationError> {
        let batch = place_batch(problem)?;

        let mut choices = Vec::with_capacity(problem.hours());
        let mut grid_mw = Vec::with_capacity(problem.hours());
        for (h, input) in problem.hours.iter().enumerate() {
            let demand = problem.demand_mw(h, batch[h]);
            let choice = cheapest_mode(problem, h, demand).ok_or(OptimizationError::Infeasible {
                hour: Some(h),
                constraint: "cooling_sufficiency",
            })?;
            let cooling_electricity =
                choice.delivered_mw * input.modes.get(choice.mode).electricity_mw_per_mwh_cooled;
            grid_mw.push(input.slot.base_load_mw + batch[h] + cooling_electricity);
            choices.push(choice);
        }

        let prices: Vec<f64> = problem
            .hours
            .iter()
            .map(|h| h.slot.electricity_price_per_mwh)
            .collect();
        let storage = schedule_storage(&problem.limits, &prices, &grid_mw);

        let hours = choices
            .iter()
            .zip(&storage)
            .zip(&batch)
            .map(|((choice, storage), batch)| HourPlan {
                batch_load_mw: *batch,
                mode: choice.mode,
                cooling_delivered_mw: choice.delivered_mw,
                shortfall_mw: choice.shortfall_mw,
                charge_mw: storage.charge_mw,
                discharge_mw: storage.discharge_mw,
            })
            .collect();

        debug!(hours = problem.hours(), "Heuristic plan built");
        Ok(DispatchPlan { hours, status: OptimizationStatus::Feasible })
    }
}
