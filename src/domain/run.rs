use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{CoolingMode, HourlyResult, OptimizationStatus};

/// Final record of one optimization invocation. Never mutated once the summarizer returns it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub run_timestamp: DateTime<Utc>,
    pub run_name: String,
    pub configuration: serde_json::Value,
    pub hours: Vec<HourlyResult>,

    pub total_cost: Option<f64>,
    pub electricity_cost: Option<f64>,
    pub water_cost: Option<f64>,
    pub baseline_cost: Option<f64>,
    pub cost_savings: Option<f64>,
    pub cost_savings_percent: Option<f64>,

    pub total_water_usage_gallons: Option<f64>,
    pub baseline_water_usage_gallons: Option<f64>,
    pub baseline_electricity_cost: Option<f64>,
    pub water_saved_gallons: Option<f64>,
    pub carbon_avoided_tons: Option<f64>,
    pub peak_demand_mw: Option<f64>,
    pub average_load_mw: Option<f64>,

    pub max_temperature_f: Option<f64>,
    pub min_temperature_f: Option<f64>,
    pub avg_temperature_f: Option<f64>,

    pub solver_strategy: String,
    pub solver_time_seconds: f64,
    pub relaxed: bool,
    pub optimization_status: OptimizationStatus,
    pub message: Option<String>,
}

/// Persisted row, one per hour of a successful run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlyRecord {
    pub run_id: Uuid,
    pub run_timestamp: DateTime<Utc>,
    pub hour: usize,
    pub batch_load_mw: f64,
    pub total_load_mw: f64,
    pub cooling_mode: CoolingMode,
    pub chiller_stages: u32,
    pub water_cooling_active: bool,
    pub storage_level_mwh: f64,
    pub storage_charge_mw: f64,
    pub storage_discharge_mw: f64,
    pub hourly_cost: f64,
    pub electricity_cost: f64,
    pub water_cost: f64,
    pub water_usage_gallons: f64,
    pub temperature_f: f64,
    pub electricity_price: f64,
}

/// Persisted row, one per run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRecord {
    pub run_id: Uuid,
    pub run_timestamp: DateTime<Utc>,
    pub run_name: String,
    pub total_cost: Option<f64>,
    pub electricity_cost: Option<f64>,
    pub water_cost: Option<f64>,
    pub baseline_cost: Option<f64>,
    pub cost_savings: Option<f64>,
    pub cost_savings_percent: Option<f64>,
    pub total_water_usage_gallons: Option<f64>,
    pub peak_demand_mw: Option<f64>,
    pub average_load_mw: Option<f64>,
    pub water_saved_gallons: Option<f64>,
    pub carbon_avoided_tons: Option<f64>,
    pub configuration: serde_json::Value,
    pub max_temperature_f: Option<f64>,
    pub min_temperature_f: Option<f64>,
    pub avg_temperature_f: Option<f64>,
    pub solver_time_seconds: f64,
    pub optimization_status: OptimizationStatus,
}

impl RunSummary {
    pub fn hourly_records(&self) -> Vec<HourlyRecord> {
        self.hours
            .iter()
            .map(|h| HourlyRecord {
                run_id: self.run_id,
                run_timestamp: self.run_timestamp,
                hour: h.slot.hour_index,
                batch_load_mw: h.batch_load_mw,
                total_load_mw: h.total_load_mw,
                cooling_mode: h.decision.mode,
                chiller_stages: h.decision.chiller_stages,
                water_cooling_active: h.decision.water_active,
                storage_level_mwh: h.storage.level_mwh,
                storage_charge_mw: h.storage.charge_mw,
                storage_discharge_mw: h.storage.discharge_mw,
                hourly_cost: h.hourly_cost,
                electricity_cost: h.electricity_cost,
                water_cost: h.water_cost,
                water_usage_gallons: h.water_usage_gallons,
                temperature_f: h.slot.temperature_f,
                electricity_price: h.slot.electricity_price_per_mwh,
            })
            .collect()
    }

    pub fn summary_record(&self) -> SummaryRecord {
        SummaryRecord {
            run_id: self.run_id,
            run_timestamp: self.run_timestamp,
            run_name: self.run_name.clone(),
            total_cost: self.total_cost,
            electricity_cost: self.electricity_cost,
            water_cost: self.water_cost,
            baseline_cost: self.baseline_cost,
            cost_savings: self.cost_savings,
            cost_savings_percent: self.cost_savings_percent,
            total_water_usage_gallons: self.total_water_usage_gallons,
            peak_demand_mw: self.peak_demand_mw,
            average_load_mw: self.average_load_mw,
            water_saved_gallons: self.water_saved_gallons,
            carbon_avoided_tons: self.carbon_avoided_tons,
            configuration: self.configuration.clone(),
            max_temperature_f: self.max_temperature_f,
            min_temperature_f: self.min_temperature_f,
            avg_temperature_f: self.avg_temperature_f,
            solver_time_seconds: self.solver_time_seconds,
            optimization_status: self.optimization_status,
        }
    }
}
