//! Greedy building blocks for the heuristic strategy.
//!
//! Batch work goes into the hours where one more MW is cheapest, and each hour
//! runs the cheapest cooling mode that can carry its demand.

use itertools::Itertools;
use ordered_float::OrderedFloat;

use super::{batch_headroom_mw, DispatchProblem};
use crate::domain::CoolingMode;
use crate::error::OptimizationError;

/// Marginal cost of one extra MW of batch load in hour `h` over one step.
fn marginal_batch_cost(problem: &DispatchProblem, h: usize) -> f64 {
    let slot = &problem.hours[h].slot;
    let cheapest_cooling = problem
        .feasible_modes(h)
        .map(|(_, eff)| eff.cost_per_mwh_cooled(slot.electricity_price_per_mwh, slot.water_price_per_kgal))
        .fold(f64::INFINITY, f64::min);
    let cooling = if cheapest_cooling.is_finite() { cheapest_cooling } else { 0.0 };
    problem.limits.step_hours
        * (slot.electricity_price_per_mwh + problem.hours[h].cooling_fraction * cooling)
}

/// Batch load per hour meeting the horizon's required work.
pub fn place_batch(problem: &DispatchProblem) -> Result<Vec<f64>, OptimizationError> {
    let limits = &problem.limits;
    let headroom = (0..problem.hours())
        .map(|h| {
            batch_headroom_mw(problem, h).ok_or(OptimizationError::Infeasible {
                hour: Some(h),
                constraint: "cooling_sufficiency",
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut batch = vec![0.0; problem.hours()];
    let mut remaining_mwh = limits.required_batch_mwh;
    let order = (0..problem.hours())
        .sorted_by_key(|&h| (OrderedFloat(marginal_batch_cost(problem, h)), h));

    for h in order {
        if remaining_mwh <= limits.epsilon {
            break;
        }
        let load = headroom[h].min(remaining_mwh / limits.step_hours);
        batch[h] = load;
        remaining_mwh -= load * limits.step_hours;
    }

    if remaining_mwh > limits.epsilon {
        return Err(OptimizationError::Infeasible {
            hour: None,
            constraint: "shiftable_load_conservation",
        });
    }
    Ok(batch)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModeChoice {
    pub mode: CoolingMode,
    pub delivered_mw: f64,
    pub shortfall_mw: f64,
}

/// Cheapest feasible mode able to carry `demand_mw` in hour `h`.
///
/// Under a relaxation, falls back to the largest mode and reports the
/// uncovered remainder as shortfall.
pub fn cheapest_mode(problem: &DispatchProblem, h: usize, demand_mw: f64) -> Option<ModeChoice> {
    let eps = problem.limits.epsilon;
    if demand_mw <= eps {
        return Some(ModeChoice { mode: CoolingMode::Free, delivered_mw: 0.0, shortfall_mw: 0.0 });
    }

    let slot = &problem.hours[h].slot;
    let covering = problem
        .feasible_modes(h)
        .filter(|(mode, _)| *mode != CoolingMode::Free && problem.capacity_mw(h, *mode) + eps >= demand_mw)
        .min_by_key(|(_, eff)| {
            OrderedFloat(eff.cost_per_mwh_cooled(slot.electricity_price_per_mwh, slot.water_price_per_kgal))
        });
    if let Some((mode, _)) = covering {
        return Some(ModeChoice { mode, delivered_mw: demand_mw, shortfall_mw: 0.0 });
    }

    let relaxation = problem.relaxation;
    if !relaxation.is_relaxed() {
        return None;
    }
    let (mode, capacity) = problem
        .feasible_modes(h)
        .filter(|(mode, _)| *mode != CoolingMode::Free)
        .map(|(mode, _)| (mode, problem.capacity_mw(h, mode)))
        .max_by_key(|(_, capacity)| OrderedFloat(*capacity))?;
    let shortfall_mw = demand_mw - capacity;
    (shortfall_mw <= relaxation.max_fraction() * demand_mw + eps).then_some(ModeChoice {
        mode,
        delivered_mw: capacity,
        shortfall_mw,
    })
}
