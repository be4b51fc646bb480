//! Turns a strategy's raw plan into normalized hourly results.
//!
//! Solver output is noisy: values within epsilon of zero are snapped to zero,
//! simultaneous charge and discharge are netted, and chiller stages are
//! recomputed as the smallest integer count that covers the chiller load.

use crate::cost::{evaluate_hour, zero_below, HourUsage};
use crate::domain::{CoolingMode, CoolingModeDecision, HourlyResult, StorageState};
use crate::error::OptimizationError;

use super::{DispatchPlan, DispatchProblem};

pub fn extract_hours(problem: &DispatchProblem, plan: &DispatchPlan) -> Result<Vec<HourlyResult>, OptimizationError> {
    if plan.hours.len() != problem.hours() {
        return Err(OptimizationError::Solver(format!(
            "plan covers {} hours, horizon has {}",
            plan.hours.len(),
            problem.hours()
        )));
    }

    let limits = &problem.limits;
    let eps = limits.epsilon;
    let dt = limits.step_hours;
    let mut level = limits.initial_level_mwh;
    let mut results = Vec::with_capacity(problem.hours());

    for (h, (input, raw)) in problem.hours.iter().zip(&plan.hours).enumerate() {
        let slot = &input.slot;
        let batch_load_mw = zero_below(raw.batch_load_mw, eps).clamp(0.0, limits.max_shiftable_mw);
        let total_load_mw = slot.base_load_mw + batch_load_mw;
        let cooling_demand_mw = problem.model.cooling_requirement(slot.temperature_f, total_load_mw);

        let (decision, delivered) = if cooling_demand_mw <= eps {
            (CoolingModeDecision::free(), 0.0)
        } else {
            if raw.mode == CoolingMode::Free {
                return Err(OptimizationError::Infeasible {
                    hour: Some(h),
                    constraint: "cooling_sufficiency",
                });
            }
            let delivered = zero_below(raw.cooling_delivered_mw, eps).clamp(0.0, cooling_demand_mw);
            let chiller_mw = problem.model.chiller_share(raw.mode, delivered);
            let stages = problem.model.stages_for(chiller_mw, eps).ok_or_else(|| {
                OptimizationError::Solver(format!(
                    "hour {h}: {chiller_mw:.3} MW of chiller load exceeds installed stages"
                ))
            })?;
            (CoolingModeDecision::new(raw.mode, stages), delivered)
        };
        let cooling_shortfall_mw = zero_below(cooling_demand_mw - delivered, eps).max(0.0);

        let net_mw = zero_below(raw.charge_mw - raw.discharge_mw, eps);
        let charge_mw = net_mw.max(0.0);
        let discharge_mw = (-net_mw).max(0.0);
        level = zero_below(level + net_mw * dt, eps).clamp(0.0, limits.storage_capacity_mwh);

        let efficiency = input.modes.get(decision.mode);
        let cost = evaluate_hour(
            slot,
            &efficiency,
            HourUsage { total_load_mw, cooling_delivered_mw: delivered, charge_mw, discharge_mw },
            dt,
            eps,
        );

        results.push(HourlyResult {
            slot: slot.clone(),
            decision,
            storage: StorageState { level_mwh: level, charge_mw, discharge_mw },
            batch_load_mw,
            total_load_mw,
            cooling_demand_mw,
            cooling_shortfall_mw,
            chiller_electricity_mw: cost.chiller_electricity_mw,
            grid_draw_mw: cost.grid_draw_mw,
            electricity_cost: cost.electricity_cost,
            water_cost: cost.water_cost,
            water_usage_gallons: cost.water_usage_gallons,
            hourly_cost: cost.total(),
        });
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::domain::OptimizationStatus;
    use crate::optimizer::{DispatchLimits, HourPlan};
    use crate::physics::CoolingModel;
    use crate::test_support::slots;

    fn problem(cfg: &Config, temps: &[f64], humidity: f64) -> DispatchProblem {
        let prices = vec![50.0; temps.len()];
        DispatchProblem::new(
            &slots(temps, humidity, &prices, 80.0),
            CoolingModel::new(cfg.cooling.clone()),
            DispatchLimits::from_config(cfg),
        )
    }

    fn plan(hours: Vec<HourPlan>) -> DispatchPlan {
        DispatchPlan { hours, status: OptimizationStatus::Optimal }
    }

    fn hour(mode: CoolingMode, batch: f64, cooling: f64, charge: f64, discharge: f64) -> HourPlan {
        HourPlan {
            batch_load_mw: batch,
            mode,
            cooling_delivered_mw: cooling,
            shortfall_mw: 0.0,
            charge_mw: charge,
            discharge_mw: discharge,
        }
    }

    #[test]
    fn test_stage_count_is_integer_cover() {
        let cfg = Config::default();
        // 95F: 0.4 * 90 = 36 MW of cooling, all on chillers -> 4 stages of 10 MW.
        let results = extract_hours(
            &problem(&cfg, &[95.0], 80.0),
            &plan(vec![hour(CoolingMode::Electric, 10.0, 36.0, 0.0, 0.0)]),
        )
        .unwrap();
        let r = &results[0];
        assert_eq!(r.decision.chiller_stages, 4);
        assert!(!r.decision.water_active);
        assert_eq!(r.total_load_mw, 90.0);
        assert!((r.chiller_electricity_mw - 9.0).abs() < 1e-9);
        assert!((r.electricity_cost - 50.0 * 99.0).abs() < 1e-6);
        assert_eq!(r.hourly_cost, r.electricity_cost + r.water_cost);
    }

    #[test]
    fn test_noise_is_snapped_and_flows_netted() {
        let cfg = Config::default();
        let results = extract_hours(
            &problem(&cfg, &[80.0, 80.0], 20.0),
            &plan(vec![
                hour(CoolingMode::Electric, 1e-9, 1e-9, 6.0, 1.0),
                hour(CoolingMode::Free, 0.0, 0.0, 0.0, 5.0),
            ]),
        )
        .unwrap();
        assert_eq!(results[0].batch_load_mw, 0.0);
        assert_eq!(results[0].decision, CoolingModeDecision::free());
        assert!((results[0].storage.charge_mw - 5.0).abs() < 1e-9);
        assert_eq!(results[0].storage.discharge_mw, 0.0);
        assert!((results[0].storage.level_mwh - 5.0).abs() < 1e-9);
        assert_eq!(results[1].storage.level_mwh, 0.0);
    }

    #[test]
    fn test_hybrid_stages_cover_chiller_share() {
        let cfg = Config::default();
        // 0.4 * 80 = 32 MW; hybrid puts half on the chillers -> 2 stages.
        let results = extract_hours(
            &problem(&cfg, &[95.0], 20.0),
            &plan(vec![hour(CoolingMode::Hybrid, 0.0, 32.0, 0.0, 0.0)]),
        )
        .unwrap();
        assert_eq!(results[0].decision.chiller_stages, 2);
        assert!(results[0].decision.water_active);
        assert!(results[0].water_usage_gallons > 0.0);
    }

    #[test]
    fn test_shortfall_is_reported() {
        let cfg = Config::default();
        let results = extract_hours(
            &problem(&cfg, &[95.0], 80.0),
            &plan(vec![hour(CoolingMode::Electric, 0.0, 30.0, 0.0, 0.0)]),
        )
        .unwrap();
        assert!((results[0].cooling_shortfall_mw - 2.0).abs() < 1e-9);
        assert_eq!(results[0].decision.chiller_stages, 3);
    }

    #[test]
    fn test_length_mismatch_is_an_error() {
        let cfg = Config::default();
        let err = extract_hours(&problem(&cfg, &[95.0, 95.0], 80.0), &plan(vec![])).unwrap_err();
        assert!(matches!(err, OptimizationError::Solver(_)));
    }
}
