//! Property checks over randomized weather and prices.

mod common;

use common::*;
use cooling_dispatch::config::{Config, StrategyKind};
use cooling_dispatch::domain::{CoolingMode, OptimizationStatus};
use cooling_dispatch::physics::CoolingModel;
use cooling_dispatch::summary::savings_percent;
use proptest::prelude::*;

const HOURS: usize = 6;

fn hourly(range: std::ops::Range<f64>) -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(range, HOURS)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn heuristic_plans_respect_operating_limits(
        temperatures in hourly(60.0..100.0),
        humidity in hourly(0.0..100.0),
        prices in hourly(5.0..200.0),
    ) {
        let cfg = config(HOURS, 30.0, StrategyKind::Heuristic);
        let limits = cfg.clone();
        let feeds = series_feeds(&cfg, &temperatures, &humidity, &prices);
        let summary = run(cfg, &feeds);

        prop_assert_eq!(summary.optimization_status, OptimizationStatus::Feasible);
        prop_assert_eq!(summary.hours.len(), HOURS);

        let mut level = limits.storage.initial_level_mwh;
        let mut delivered = 0.0;
        for hour in &summary.hours {
            prop_assert!((hour.total_load_mw - hour.slot.base_load_mw - hour.batch_load_mw).abs() < EPS);
            prop_assert!(hour.batch_load_mw >= 0.0 && hour.batch_load_mw <= limits.workload.max_shiftable_mw + EPS);
            prop_assert_eq!(hour.decision.mode == CoolingMode::Free, hour.cooling_demand_mw == 0.0);
            prop_assert!(hour.storage.charge_mw == 0.0 || hour.storage.discharge_mw == 0.0);
            prop_assert!(hour.storage.charge_mw <= limits.storage.max_charge_mw + EPS);
            prop_assert!(hour.storage.discharge_mw <= limits.storage.max_discharge_mw + EPS);

            level += hour.storage.net_charge_mw() * limits.horizon.step_hours;
            prop_assert!((hour.storage.level_mwh - level).abs() < 1e-4);
            prop_assert!(hour.storage.level_mwh >= -EPS);
            prop_assert!(hour.storage.level_mwh <= limits.storage.capacity_mwh + EPS);
            prop_assert!(hour.grid_draw_mw >= 0.0);
            prop_assert!((hour.hourly_cost - hour.electricity_cost - hour.water_cost).abs() < 1e-6);

            delivered += hour.batch_load_mw * limits.horizon.step_hours;
        }
        prop_assert!(delivered + 1e-4 >= limits.workload.required_batch_mwh);
    }

    #[test]
    fn heuristic_never_costs_more_than_baseline_on_chillers(
        temperatures in hourly(60.0..95.0),
        humidity in hourly(50.0..100.0),
        prices in hourly(5.0..200.0),
    ) {
        let cfg = config(HOURS, 30.0, StrategyKind::Heuristic);
        let feeds = series_feeds(&cfg, &temperatures, &humidity, &prices);
        let summary = run(cfg, &feeds);

        let total = summary.total_cost.unwrap();
        let baseline = summary.baseline_cost.unwrap();
        prop_assert!(total <= baseline + 1e-6 * (1.0 + baseline), "total {} > baseline {}", total, baseline);
    }

    #[test]
    fn savings_percent_is_relative_to_baseline(savings in -1e6..1e6f64, baseline in 1.0..1e7f64) {
        prop_assert_eq!(savings_percent(savings, 0.0), 0.0);
        prop_assert!((savings_percent(savings, baseline) - savings / baseline * 100.0).abs() < 1e-9);
    }

    #[test]
    fn cooling_fraction_grows_with_temperature(a in 40.0..130.0f64, b in 40.0..130.0f64) {
        let model = CoolingModel::new(Config::default().cooling);
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(model.cooling_fraction(lo) <= model.cooling_fraction(hi));
        prop_assert!(model.cooling_requirement(hi, 100.0) >= 0.0);
    }

    #[test]
    fn humidity_only_makes_evaporation_worse(a in 0.0..100.0f64, b in 0.0..100.0f64) {
        let model = CoolingModel::new(Config::default().cooling);
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(model.evaporative_capacity_mw(lo) >= model.evaporative_capacity_mw(hi));

        let dry = model.mode_efficiency(CoolingMode::Evaporative, lo);
        let wet = model.mode_efficiency(CoolingMode::Evaporative, hi);
        if wet.feasible {
            prop_assert!(dry.feasible);
            prop_assert!(dry.water_gallons_per_mwh_cooled <= wet.water_gallons_per_mwh_cooled);
        }
        let electric = model.mode_efficiency(CoolingMode::Electric, hi);
        prop_assert!(electric.feasible);
        prop_assert_eq!(electric.water_gallons_per_mwh_cooled, 0.0);
    }
}

#[cfg(feature = "optimization")]
proptest! {
    #![proptest_config(ProptestConfig::with_cases(8))]

    #[test]
    fn optimal_plans_never_cost_more_than_baseline(
        temperatures in prop::collection::vec(80.0..95.0f64, 3),
        humidity in prop::collection::vec(0.0..100.0f64, 3),
        prices in prop::collection::vec(5.0..200.0f64, 3),
    ) {
        let cfg = config(3, 15.0, StrategyKind::Milp);
        let feeds = series_feeds(&cfg, &temperatures, &humidity, &prices);
        let summary = run(cfg, &feeds);

        prop_assert!(summary.optimization_status.is_success());
        if summary.optimization_status == OptimizationStatus::Optimal {
            let total = summary.total_cost.unwrap();
            let baseline = summary.baseline_cost.unwrap();
            prop_assert!(total <= baseline + 1e-4 * (1.0 + baseline), "total {} > baseline {}", total, baseline);
        }
    }
}
