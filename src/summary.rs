//! Run Summarizer
//!
//! The only place ratios and deltas are derived from hourly results, so
//! divide-by-zero handling lives here and nowhere else.

use chrono::{DateTime, Utc};
use serde_json::json;
use uuid::Uuid;

use crate::baseline::BaselineResult;
use crate::config::Config;
use crate::domain::{HourSlot, HourlyResult, OptimizationStatus, RunSummary};
use crate::error::OptimizationError;
use crate::scenario::Scenario;

/// Solver-side facts recorded with every run.
#[derive(Debug, Clone)]
pub struct SolveDiagnostics {
    pub strategy: String,
    pub solver_time_seconds: f64,
    pub relaxed: bool,
}

pub struct RunSummarizer<'a> {
    config: &'a Config,
    run_id: Uuid,
    run_timestamp: DateTime<Utc>,
    run_name: String,
}

impl<'a> RunSummarizer<'a> {
    pub fn new(config: &'a Config, run_id: Uuid, run_timestamp: DateTime<Utc>, run_name: impl Into<String>) -> Self {
        Self { config, run_id, run_timestamp, run_name: run_name.into() }
    }

    fn configuration(&self, scenario: &Scenario) -> serde_json::Value {
        json!({
            "config": serde_json::to_value(self.config).unwrap_or_default(),
            "interpolated": serde_json::to_value(&scenario.interpolated).unwrap_or_default(),
        })
    }

    fn empty(&self, scenario: &Scenario, diagnostics: SolveDiagnostics, status: OptimizationStatus) -> RunSummary {
        let (max_t, min_t, avg_t) = temperature_stats(&scenario.slots);
        RunSummary {
            run_id: self.run_id,
            run_timestamp: self.run_timestamp,
            run_name: self.run_name.clone(),
            configuration: self.configuration(scenario),
            hours: Vec::new(),
            total_cost: None,
            electricity_cost: None,
            water_cost: None,
            baseline_cost: None,
            cost_savings: None,
            cost_savings_percent: None,
            total_water_usage_gallons: None,
            baseline_water_usage_gallons: None,
            baseline_electricity_cost: None,
            water_saved_gallons: None,
            carbon_avoided_tons: None,
            peak_demand_mw: None,
            average_load_mw: None,
            max_temperature_f: max_t,
            min_temperature_f: min_t,
            avg_temperature_f: avg_t,
            solver_strategy: diagnostics.strategy,
            solver_time_seconds: diagnostics.solver_time_seconds,
            relaxed: diagnostics.relaxed,
            optimization_status: status,
            message: None,
        }
    }

    pub fn finalize(
        &self,
        scenario: &Scenario,
        hours: Vec<HourlyResult>,
        baseline: &BaselineResult,
        diagnostics: SolveDiagnostics,
        status: OptimizationStatus,
    ) -> RunSummary {
        let dt = self.config.horizon.step_hours;
        let total_cost: f64 = hours.iter().map(|h| h.hourly_cost).sum();
        let electricity_cost: f64 = hours.iter().map(|h| h.electricity_cost).sum();
        let water_cost: f64 = hours.iter().map(|h| h.water_cost).sum();
        let water_usage: f64 = hours.iter().map(|h| h.water_usage_gallons).sum();
        let grid_energy_mwh: f64 = hours.iter().map(|h| h.grid_draw_mw * dt).sum();

        let cost_savings = baseline.total_cost - total_cost;
        let cost_savings_percent = savings_percent(cost_savings, baseline.total_cost);
        let carbon_avoided_tons = (baseline.grid_energy_mwh - grid_energy_mwh)
            * self.config.environment.grid_emission_tons_per_mwh;

        let peak_demand_mw = hours.iter().map(|h| h.grid_draw_mw).reduce(f64::max);
        let average_load_mw = mean(hours.iter().map(|h| h.total_load_mw));

        let mut summary = self.empty(scenario, diagnostics, status);
        summary.total_cost = Some(total_cost);
        summary.electricity_cost = Some(electricity_cost);
        summary.water_cost = Some(water_cost);
        summary.baseline_cost = Some(baseline.total_cost);
        summary.cost_savings = Some(cost_savings);
        summary.cost_savings_percent = Some(cost_savings_percent);
        summary.total_water_usage_gallons = Some(water_usage);
        summary.baseline_water_usage_gallons = Some(baseline.water_usage_gallons);
        summary.baseline_electricity_cost = Some(baseline.electricity_cost);
        summary.water_saved_gallons = Some(baseline.water_usage_gallons - water_usage);
        summary.carbon_avoided_tons = Some(carbon_avoided_tons);
        summary.peak_demand_mw = peak_demand_mw;
        summary.average_load_mw = average_load_mw;
        summary.hours = hours;
        summary
    }

    /// Summary for a run whose optimization failed: no hourly results and no costs.
    pub fn failed(&self, scenario: &Scenario, error: &OptimizationError, diagnostics: SolveDiagnostics) -> RunSummary {
        let mut summary = self.empty(scenario, diagnostics, error.status());
        summary.message = Some(error.to_string());
        summary
    }
}

/// Savings as a percentage of the baseline; zero when the baseline costs nothing.
pub fn savings_percent(cost_savings: f64, baseline_cost: f64) -> f64 {
    if baseline_cost == 0.0 {
        0.0
    } else {
        cost_savings / baseline_cost * 100.0
    }
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    (n > 0).then(|| sum / n as f64)
}

fn temperature_stats(slots: &[HourSlot]) -> (Option<f64>, Option<f64>, Option<f64>) {
    let temps = || slots.iter().map(|s| s.temperature_f);
    (temps().reduce(f64::max), temps().reduce(f64::min), mean(temps()))
}
