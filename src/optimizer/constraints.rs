use serde::{Deserialize, Serialize};

use super::DispatchProblem;
use crate::config::Config;
use crate::error::OptimizationError;

/// Operational limits shared by every dispatch strategy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchLimits {
    pub step_hours: f64,
    pub storage_capacity_mwh: f64,
    pub initial_level_mwh: f64,
    pub max_charge_mw: f64,
    pub max_discharge_mw: f64,
    pub max_shiftable_mw: f64,
    pub required_batch_mwh: f64,
    pub epsilon: f64,
}

impl DispatchLimits {
    pub fn from_config(config: &Config) -> Self {
        Self {
            step_hours: config.horizon.step_hours,
            storage_capacity_mwh: config.storage.capacity_mwh,
            initial_level_mwh: config.storage.initial_level_mwh,
            max_charge_mw: config.storage.max_charge_mw,
            max_discharge_mw: config.storage.max_discharge_mw,
            max_shiftable_mw: config.workload.max_shiftable_mw,
            required_batch_mwh: config.workload.required_batch_mwh,
            epsilon: config.solver.epsilon,
        }
    }
}

/// Largest batch load hour `h` can host while its cooling demand stays coverable.
///
/// `None` when even the base load alone cannot be cooled.
pub fn batch_headroom_mw(problem: &DispatchProblem, h: usize) -> Option<f64> {
    let limits = &problem.limits;
    let input = &problem.hours[h];
    let fraction = input.cooling_fraction;
    let coverage = problem.relaxation.coverage();
    if fraction <= 0.0 || coverage <= 0.0 {
        return Some(limits.max_shiftable_mw);
    }

    let coolable_load = problem.max_capacity_mw(h) / (fraction * coverage);
    let headroom = coolable_load - input.slot.base_load_mw;
    if headroom < -limits.epsilon {
        None
    } else {
        Some(headroom.clamp(0.0, limits.max_shiftable_mw))
    }
}

/// Names the first constraint that makes the problem unsolvable.
pub fn diagnose(problem: &DispatchProblem) -> OptimizationError {
    let mut deliverable_mwh = 0.0;
    for h in 0..problem.hours() {
        match batch_headroom_mw(problem, h) {
            Some(headroom) => deliverable_mwh += headroom * problem.limits.step_hours,
            None => {
                return OptimizationError::Infeasible {
                    hour: Some(h),
                    constraint: "cooling_sufficiency",
                }
            }
        }
    }

    let constraint = if deliverable_mwh + problem.limits.epsilon < problem.limits.required_batch_mwh {
        "shiftable_load_conservation"
    } else {
        "cooling_sufficiency"
    };
    OptimizationError::Infeasible { hour: None, constraint }
}
