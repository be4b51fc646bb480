//! End-to-end runs through scenario building, dispatch, baseline and summary.

mod common;

use std::sync::Arc;

use common::*;
use cooling_dispatch::config::StrategyKind;
use cooling_dispatch::domain::{CoolingMode, OptimizationStatus};
use cooling_dispatch::error::{DispatchError, ScenarioError};
use cooling_dispatch::repo::{JsonFileSink, MemorySink, RunSink};
use cooling_dispatch::scenario::{FeedSet, SeasonalWaterTariff, TimeOfUseTariff, UnavailableFeed};
use cooling_dispatch::{run_optimization, RunRequest};
use rstest::rstest;
use tokio_util::sync::CancellationToken;

#[test]
fn test_dry_heat_runs_on_water() {
    let cfg = config(24, 240.0, StrategyKind::Heuristic);
    let feeds = fixed_feeds(&cfg, 90.0, 20.0, &[35.0; 24]);
    let summary = run(cfg, &feeds);

    assert_eq!(summary.optimization_status, OptimizationStatus::Feasible);
    assert_eq!(summary.hours.len(), 24);
    for hour in &summary.hours {
        assert_eq!(hour.decision.mode, CoolingMode::Evaporative);
        assert!(hour.decision.water_active);
        assert_eq!(hour.decision.chiller_stages, 0);
    }
    assert!(summary.total_water_usage_gallons.unwrap() > 0.0);
    assert!(summary.cost_savings.unwrap() > 0.0);
}

#[test]
fn test_humid_heat_runs_on_chillers() {
    let cfg = config(24, 240.0, StrategyKind::Heuristic);
    let feeds = fixed_feeds(&cfg, 95.0, 80.0, &[35.0; 24]);
    let summary = run(cfg, &feeds);

    assert!(summary.optimization_status.is_success());
    for hour in &summary.hours {
        assert_eq!(hour.decision.mode, CoolingMode::Electric);
        assert!(!hour.decision.water_active);
        assert!(hour.decision.chiller_stages >= 1);
        assert_eq!(hour.water_usage_gallons, 0.0);
    }
    assert_eq!(summary.total_water_usage_gallons, Some(0.0));
}

#[test]
fn test_cool_hours_need_no_cooling() {
    let cfg = config(6, 30.0, StrategyKind::Heuristic);
    let feeds = fixed_feeds(&cfg, 70.0, 40.0, &[35.0; 6]);
    let summary = run(cfg, &feeds);

    for hour in &summary.hours {
        assert_eq!(hour.decision.mode, CoolingMode::Free);
        assert_eq!(hour.cooling_demand_mw, 0.0);
        assert_eq!(hour.chiller_electricity_mw, 0.0);
    }
}

#[test]
fn test_batch_moves_out_of_the_price_spike() {
    let cfg = config(3, 30.0, StrategyKind::Heuristic);
    let feeds = fixed_feeds(&cfg, 90.0, 20.0, &[10.0, 100.0, 10.0]);
    let summary = run(cfg, &feeds);

    assert!(summary.optimization_status.is_success());
    assert!(summary.hours[1].batch_load_mw < EPS);
    let delivered: f64 = summary.hours.iter().map(|h| h.batch_load_mw).sum();
    assert!((delivered - 30.0).abs() < 1e-4);
    assert!(summary.total_cost.unwrap() < summary.baseline_cost.unwrap());
    assert!(summary.cost_savings_percent.unwrap() > 0.0);
}

#[test]
fn test_storage_alone_beats_baseline_on_price_spike() {
    let cfg = config(3, 0.0, StrategyKind::Heuristic);
    let feeds = fixed_feeds(&cfg, 80.0, 50.0, &[10.0, 100.0, 10.0]);
    let summary = run(cfg, &feeds);

    assert!(summary.optimization_status.is_success());
    assert!(summary.hours.iter().all(|h| h.batch_load_mw < EPS));
    assert!(summary.hours[0].storage.charge_mw > 9.0);
    assert!(summary.hours[1].storage.discharge_mw > 9.0);
    assert!(summary.total_cost.unwrap() < summary.baseline_cost.unwrap());
}

#[test]
fn test_slow_storage_still_cycles() {
    let mut cfg = config(3, 0.0, StrategyKind::Heuristic);
    cfg.storage.capacity_mwh = 100.0;
    cfg.storage.max_charge_mw = 2.0;
    cfg.storage.max_discharge_mw = 2.0;
    let feeds = fixed_feeds(&cfg, 80.0, 50.0, &[10.0, 100.0, 10.0]);
    let summary = run(cfg, &feeds);

    assert!((summary.hours[0].storage.charge_mw - 2.0).abs() < 1e-6);
    assert!((summary.hours[1].storage.discharge_mw - 2.0).abs() < 1e-6);
    assert!(summary.total_cost.unwrap() < summary.baseline_cost.unwrap());
}

#[test]
fn test_uncoolable_hour_is_infeasible() {
    let mut cfg = config(4, 0.0, StrategyKind::Heuristic);
    cfg.cooling.chiller_stage_capacity_mw = vec![5.0, 5.0];
    let feeds = fixed_feeds(&cfg, 110.0, 90.0, &[35.0; 4]);
    let summary = run(cfg, &feeds);

    assert_eq!(summary.optimization_status, OptimizationStatus::Infeasible);
    assert!(summary.hours.is_empty());
    assert_eq!(summary.total_cost, None);
    assert_eq!(summary.baseline_cost, None);
    assert!(summary.message.unwrap().contains("cooling_sufficiency"));
    assert_eq!(summary.max_temperature_f, Some(110.0));
}

#[test]
fn test_small_shortfall_is_relaxed() {
    let mut cfg = config(4, 0.0, StrategyKind::Heuristic);
    cfg.site.base_load_mw = 84.0;
    let feeds = fixed_feeds(&cfg, 105.0, 90.0, &[35.0; 4]);
    let summary = run(cfg, &feeds);

    assert_eq!(summary.optimization_status, OptimizationStatus::Feasible);
    assert!(summary.relaxed);
    for hour in &summary.hours {
        assert_eq!(hour.decision.mode, CoolingMode::Electric);
        assert_eq!(hour.decision.chiller_stages, 4);
        assert!((hour.cooling_shortfall_mw - 2.0).abs() < 1e-6);
    }
}

#[test]
fn test_runs_are_reproducible() {
    let cfg = config(24, 120.0, StrategyKind::Heuristic);
    let prices: Vec<f64> = (0..24).map(|h| 20.0 + 5.0 * (h % 7) as f64).collect();
    let feeds = fixed_feeds(&cfg, 93.0, 35.0, &prices);

    let first = run(cfg.clone(), &feeds);
    let second = run(cfg, &feeds);
    assert_ne!(first.run_id, second.run_id);
    assert_eq!(first.total_cost, second.total_cost);
    for (a, b) in first.hours.iter().zip(&second.hours) {
        assert_eq!(a.decision, b.decision);
        assert_eq!(a.storage, b.storage);
        assert_eq!(a.batch_load_mw, b.batch_load_mw);
    }
}

#[test]
fn test_cancelled_run_reports_error() {
    let cfg = config(24, 240.0, StrategyKind::Heuristic);
    let feeds = fixed_feeds(&cfg, 90.0, 20.0, &[35.0; 24]);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let summary = run_optimization(&RunRequest::new("cancelled", cfg), &feeds, &cancel).unwrap();
    assert_eq!(summary.optimization_status, OptimizationStatus::Error);
    assert!(summary.hours.is_empty());
    assert_eq!(summary.total_cost, None);
}

#[rstest]
#[case::split_above_one(|c: &mut cooling_dispatch::Config| c.cooling.hybrid_split = 1.5)]
#[case::overfull_storage(|c: &mut cooling_dispatch::Config| c.storage.initial_level_mwh = 50.0)]
#[case::undeliverable_work(|c: &mut cooling_dispatch::Config| c.workload.required_batch_mwh = 1_000.0)]
#[case::zero_time_limit(|c: &mut cooling_dispatch::Config| c.solver.time_limit_seconds = 0.0)]
fn test_invalid_config_is_rejected(#[case] mutate: fn(&mut cooling_dispatch::Config)) {
    let mut cfg = config(24, 240.0, StrategyKind::Heuristic);
    mutate(&mut cfg);
    let feeds = fixed_feeds(&cfg, 90.0, 20.0, &[35.0; 24]);

    let result = run_optimization(&RunRequest::new("invalid", cfg), &feeds, &CancellationToken::new());
    assert!(matches!(result, Err(DispatchError::Configuration(_))));
}

#[test]
fn test_missing_feed_uses_fallbacks() {
    let cfg = config(6, 30.0, StrategyKind::Heuristic);
    let feeds = FeedSet::new(
        Arc::new(UnavailableFeed),
        Arc::new(TimeOfUseTariff::from(&cfg.tariff)),
        Arc::new(SeasonalWaterTariff::from(&cfg.tariff)),
    );
    let summary = run(cfg, &feeds);

    assert!(summary.optimization_status.is_success());
    assert_eq!(summary.avg_temperature_f, Some(85.0));
    assert!(!summary.configuration["interpolated"]["temperature"]["defaulted"]
        .as_array()
        .unwrap()
        .is_empty());
}

#[test]
fn test_missing_feed_without_fallbacks_fails() {
    let mut cfg = config(6, 30.0, StrategyKind::Heuristic);
    cfg.fallbacks = None;
    let feeds = FeedSet::new(
        Arc::new(UnavailableFeed),
        Arc::new(TimeOfUseTariff::from(&cfg.tariff)),
        Arc::new(SeasonalWaterTariff::from(&cfg.tariff)),
    );

    let result = run_optimization(&RunRequest::new("no-weather", cfg), &feeds, &CancellationToken::new());
    assert!(matches!(
        result,
        Err(DispatchError::Scenario(ScenarioError::FeedUnavailable { feed: "weather", .. }))
    ));
}

#[test]
fn test_hourly_inputs_flow_into_results() {
    let cfg = config(4, 20.0, StrategyKind::Heuristic);
    let feeds = series_feeds(&cfg, &[80.0, 88.0, 96.0, 100.0], &[20.0, 30.0, 60.0, 70.0], &[30.0; 4]);
    let summary = run(cfg, &feeds);

    assert_eq!(summary.max_temperature_f, Some(100.0));
    assert_eq!(summary.min_temperature_f, Some(80.0));
    assert_eq!(summary.hours[0].decision.mode, CoolingMode::Free);
    assert_eq!(summary.hours[3].decision.mode, CoolingMode::Electric);
}

#[tokio::test]
async fn test_sinks_never_overwrite() {
    let cfg = config(6, 30.0, StrategyKind::Heuristic);
    let feeds = fixed_feeds(&cfg, 92.0, 25.0, &[35.0; 6]);
    let summary = run(cfg, &feeds);

    let dir = tempfile::tempdir().unwrap();
    let json = JsonFileSink::new(dir.path());
    json.persist(&summary).await.unwrap();
    assert!(json.persist(&summary).await.is_err());

    let memory = MemorySink::new();
    memory.persist(&summary).await.unwrap();
    assert!(memory.persist(&summary).await.is_err());
    assert_eq!(memory.get(summary.run_id).unwrap().hourly, summary.hourly_records());
}

#[cfg(feature = "optimization")]
mod milp {
    use super::*;

    #[test]
    fn test_milp_dry_heat_prefers_water() {
        let mut cfg = config(6, 60.0, StrategyKind::Milp);
        cfg.storage.capacity_mwh = 0.0;
        let feeds = fixed_feeds(&cfg, 90.0, 20.0, &[35.0; 6]);
        let summary = run(cfg, &feeds);

        assert!(summary.optimization_status.is_success());
        assert_eq!(summary.solver_strategy, "milp");
        assert!(summary.hours.iter().all(|h| h.decision.water_active));
    }

    #[test]
    fn test_milp_beats_baseline_on_price_spike() {
        let cfg = config(3, 30.0, StrategyKind::Milp);
        let feeds = fixed_feeds(&cfg, 90.0, 20.0, &[10.0, 100.0, 10.0]);
        let summary = run(cfg, &feeds);

        assert!(summary.optimization_status.is_success());
        assert!(summary.total_cost.unwrap() < summary.baseline_cost.unwrap());
    }

    #[test]
    fn test_milp_builtin_day_solves_to_optimality() {
        let cfg = config(24, 240.0, StrategyKind::Milp);
        let time_limit = cfg.solver.time_limit_seconds;
        let feeds = FeedSet::builtin(&cfg);
        let summary = run(cfg, &feeds);

        assert_eq!(summary.optimization_status, OptimizationStatus::Optimal);
        assert_eq!(summary.solver_strategy, "milp");
        assert!(summary.solver_time_seconds < time_limit / 2.0);
        let delivered: f64 = summary.hours.iter().map(|h| h.batch_load_mw).sum();
        assert!(delivered >= 240.0 - 1e-4);
        assert!(summary.total_cost.unwrap() <= summary.baseline_cost.unwrap() + 1e-6);
    }

    #[test]
    fn test_milp_runs_are_reproducible() {
        let cfg = config(24, 240.0, StrategyKind::Milp);
        let feeds = FeedSet::builtin(&cfg);

        let first = run(cfg.clone(), &feeds);
        let second = run(cfg, &feeds);
        assert_eq!(first.optimization_status, OptimizationStatus::Optimal);
        assert_eq!(first.total_cost, second.total_cost);
        for (a, b) in first.hours.iter().zip(&second.hours) {
            assert_eq!(a.decision, b.decision);
            assert_eq!(a.storage, b.storage);
            assert_eq!(a.batch_load_mw, b.batch_load_mw);
        }
    }

    #[test]
    fn test_milp_storage_alone_beats_baseline() {
        let cfg = config(3, 0.0, StrategyKind::Milp);
        let feeds = fixed_feeds(&cfg, 80.0, 50.0, &[10.0, 100.0, 10.0]);
        let summary = run(cfg, &feeds);

        assert_eq!(summary.optimization_status, OptimizationStatus::Optimal);
        assert!(summary.hours.iter().all(|h| h.batch_load_mw < EPS));
        assert!(summary.hours[1].storage.discharge_mw > 9.0);
        assert!(summary.total_cost.unwrap() < summary.baseline_cost.unwrap());
    }

    #[test]
    fn test_milp_reports_infeasible() {
        let mut cfg = config(3, 0.0, StrategyKind::Milp);
        cfg.cooling.chiller_stage_capacity_mw = vec![5.0, 5.0];
        let feeds = fixed_feeds(&cfg, 110.0, 90.0, &[35.0; 3]);
        let summary = run(cfg, &feeds);

        assert_eq!(summary.optimization_status, OptimizationStatus::Infeasible);
        assert!(summary.hours.is_empty());
    }
}
