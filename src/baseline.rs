//! Baseline Evaluator
//!
//! Prices the horizon under the fixed reference policy: chillers only, a
//! constant batch load and no storage. Uses the same hourly cost accounting as
//! the optimizer output so savings compare like with like.

use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::cost::{evaluate_hour, HourCost, HourUsage};
use crate::domain::{CoolingMode, HourSlot};
use crate::physics::CoolingModel;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineResult {
    pub batch_load_mw: f64,
    pub hours: Vec<HourCost>,
    pub total_cost: f64,
    pub electricity_cost: f64,
    pub water_cost: f64,
    pub water_usage_gallons: f64,
    pub grid_energy_mwh: f64,
}

pub struct BaselineEvaluator<'a> {
    config: &'a Config,
    model: CoolingModel,
}

impl<'a> BaselineEvaluator<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self { config, model: CoolingModel::new(config.cooling.clone()) }
    }

    /// Configured constant batch load, or the required work spread evenly.
    pub fn batch_load_mw(&self) -> f64 {
        self.config.baseline.batch_load_mw.unwrap_or_else(|| {
            let horizon_hours = self.config.horizon.hours as f64 * self.config.horizon.step_hours;
            if horizon_hours > 0.0 {
                self.config.workload.required_batch_mwh / horizon_hours
            } else {
                0.0
            }
        })
    }

    pub fn evaluate(&self, slots: &[HourSlot]) -> BaselineResult {
        let dt = self.config.horizon.step_hours;
        let eps = self.config.solver.epsilon;
        let batch_load_mw = self.batch_load_mw();

        let hours: Vec<HourCost> = slots
            .iter()
            .map(|slot| {
                let total_load_mw = slot.base_load_mw + batch_load_mw;
                let demand = self.model.cooling_requirement(slot.temperature_f, total_load_mw);
                let efficiency = self.model.mode_efficiency(CoolingMode::Electric, slot.relative_humidity_pct);
                evaluate_hour(
                    slot,
                    &efficiency,
                    HourUsage {
                        total_load_mw,
                        cooling_delivered_mw: demand,
                        charge_mw: 0.0,
                        discharge_mw: 0.0,
                    },
                    dt,
                    eps,
                )
            })
            .collect();

        BaselineResult {
            batch_load_mw,
            total_cost: hours.iter().map(HourCost::total).sum(),
            electricity_cost: hours.iter().map(|h| h.electricity_cost).sum(),
            water_cost: hours.iter().map(|h| h.water_cost).sum(),
            water_usage_gallons: hours.iter().map(|h| h.water_usage_gallons).sum(),
            grid_energy_mwh: hours.iter().map(|h| h.grid_energy_mwh(dt)).sum(),
            hours,
        }
    }
}
