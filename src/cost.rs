//! Hourly cost accounting shared by the optimizer output and the baseline policy.

use serde::{Deserialize, Serialize};

use crate::domain::HourSlot;
use crate::physics::ModeEfficiency;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HourCost {
    pub chiller_electricity_mw: f64,
    pub grid_draw_mw: f64,
    pub water_usage_gallons: f64,
    pub electricity_cost: f64,
    pub water_cost: f64,
}

impl HourCost {
    pub fn total(&self) -> f64 {
        self.electricity_cost + self.water_cost
    }

    pub fn grid_energy_mwh(&self, step_hours: f64) -> f64 {
        self.grid_draw_mw * step_hours
    }
}

/// Inputs to price one hour of operation.
#[derive(Debug, Clone, Copy)]
pub struct HourUsage {
    pub total_load_mw: f64,
    pub cooling_delivered_mw: f64,
    pub charge_mw: f64,
    pub discharge_mw: f64,
}

/// Electricity is priced on net grid draw (IT load + cooling electricity + storage
/// charge - storage discharge); water on gallons consumed by the chosen mode.
///
/// Draws are in MW and prices in $/MWh, so electricity cost is `price * MW * hours`
/// with no further scaling. Objectives written against kW draws divide this term
/// by 1000; that factor does not apply here. Water is priced per thousand gallons,
/// hence its `/ 1000.0`.
pub fn evaluate_hour(
    slot: &HourSlot,
    efficiency: &ModeEfficiency,
    usage: HourUsage,
    step_hours: f64,
    epsilon: f64,
) -> HourCost {
    let chiller_electricity_mw =
        zero_below(usage.cooling_delivered_mw * efficiency.electricity_mw_per_mwh_cooled, epsilon);
    let grid_draw_mw = zero_below(
        usage.total_load_mw + chiller_electricity_mw + usage.charge_mw - usage.discharge_mw,
        epsilon,
    )
    .max(0.0);
    let water_usage_gallons = zero_below(
        usage.cooling_delivered_mw * efficiency.water_gallons_per_mwh_cooled * step_hours,
        epsilon,
    );

    HourCost {
        chiller_electricity_mw,
        grid_draw_mw,
        water_usage_gallons,
        electricity_cost: slot.electricity_price_per_mwh * grid_draw_mw * step_hours,
        water_cost: slot.water_price_per_kgal * water_usage_gallons / 1000.0,
    }
}

/// Snaps values within `epsilon` of zero to exactly zero.
pub fn zero_below(value: f64, epsilon: f64) -> f64 {
    if value.abs() < epsilon {
        0.0
    } else {
        value
    }
}
