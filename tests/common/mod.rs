#![allow(dead_code)]
use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use cooling_dispatch::config::{Config, StrategyKind};
use cooling_dispatch::domain::{PriceTier, RunSummary};
use cooling_dispatch::scenario::{
    FeedSet, FixedWeather, HourlySeries, SeasonalWaterTariff, WeatherObservation,
};
use cooling_dispatch::{run_optimization, RunRequest};
use tokio_util::sync::CancellationToken;

pub const EPS: f64 = 1e-6;

pub fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 7, 15, 0, 0, 0).unwrap()
}

/// Default configuration pinned to a fixed start and the given horizon.
pub fn config(hours: usize, required_batch_mwh: f64, strategy: StrategyKind) -> Config {
    let mut cfg = Config::default();
    cfg.horizon.hours = hours;
    cfg.horizon.start = Some(start());
    cfg.workload.required_batch_mwh = required_batch_mwh;
    cfg.solver.strategy = strategy;
    cfg.solver.time_limit_seconds = 20.0;
    cfg
}

/// Constant weather with the given hourly electricity prices.
pub fn fixed_feeds(cfg: &Config, temperature_f: f64, humidity_pct: f64, prices: &[f64]) -> FeedSet {
    FeedSet::new(
        Arc::new(FixedWeather { temperature_f, relative_humidity_pct: humidity_pct }),
        Arc::new(HourlySeries::electricity_from(start(), prices, PriceTier::OffPeak)),
        Arc::new(SeasonalWaterTariff::from(&cfg.tariff)),
    )
}

/// Hour-by-hour weather and electricity prices.
pub fn series_feeds(cfg: &Config, temperatures: &[f64], humidity: &[f64], prices: &[f64]) -> FeedSet {
    let mut series = HourlySeries::electricity_from(start(), prices, PriceTier::OffPeak);
    series.weather = temperatures
        .iter()
        .zip(humidity)
        .enumerate()
        .map(|(h, (t, rh))| WeatherObservation {
            timestamp: start() + Duration::hours(h as i64),
            temperature_f: Some(*t),
            relative_humidity_pct: Some(*rh),
        })
        .collect();
    let series = Arc::new(series);
    FeedSet::new(series.clone(), series, Arc::new(SeasonalWaterTariff::from(&cfg.tariff)))
}

pub fn run(cfg: Config, feeds: &FeedSet) -> RunSummary {
    run_optimization(&RunRequest::new("integration", cfg), feeds, &CancellationToken::new())
        .expect("run should produce a summary")
}
