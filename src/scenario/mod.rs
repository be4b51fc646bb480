//! Scenario Builder
//!
//! Assembles the per-hour input frame for a horizon from the weather and price
//! feeds. Gaps are filled by holding the last known value; leading gaps fall
//! back to the configured physical defaults.

pub mod feeds;

pub use feeds::*;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::{Config, FallbackDefaults, HorizonConfig, SiteConfig};
use crate::domain::{HourSlot, PriceTier};
use crate::error::ScenarioError;

/// The external collaborators a run reads from.
#[derive(Clone)]
pub struct FeedSet {
    pub weather: Arc<dyn WeatherFeed>,
    pub electricity: Arc<dyn ElectricityPriceFeed>,
    pub water: Arc<dyn WaterPriceFeed>,
}

impl FeedSet {
    pub fn new(
        weather: Arc<dyn WeatherFeed>,
        electricity: Arc<dyn ElectricityPriceFeed>,
        water: Arc<dyn WaterPriceFeed>,
    ) -> Self {
        Self { weather, electricity, water }
    }

    /// Desert-summer weather with the configured time-of-use and water tariffs.
    pub fn builtin(config: &Config) -> Self {
        Self {
            weather: Arc::new(DiurnalWeather::default()),
            electricity: Arc::new(TimeOfUseTariff::from(&config.tariff)),
            water: Arc::new(SeasonalWaterTariff::from(&config.tariff)),
        }
    }
}

/// Hours whose value did not come from the feed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GapReport {
    pub held: Vec<usize>,
    pub defaulted: Vec<usize>,
}

impl GapReport {
    pub fn is_empty(&self) -> bool {
        self.held.is_empty() && self.defaulted.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InterpolationFlags {
    pub temperature: GapReport,
    pub humidity: GapReport,
    pub electricity_price: GapReport,
    pub water_price: GapReport,
}

impl InterpolationFlags {
    pub fn is_empty(&self) -> bool {
        self.temperature.is_empty()
            && self.humidity.is_empty()
            && self.electricity_price.is_empty()
            && self.water_price.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub slots: Vec<HourSlot>,
    pub interpolated: InterpolationFlags,
}

impl Scenario {
    pub fn hours(&self) -> usize {
        self.slots.len()
    }
}

pub struct ScenarioBuilder {
    horizon: HorizonConfig,
    site: SiteConfig,
    fallbacks: Option<FallbackDefaults>,
}

impl ScenarioBuilder {
    pub fn new(horizon: HorizonConfig, site: SiteConfig, fallbacks: Option<FallbackDefaults>) -> Self {
        Self { horizon, site, fallbacks }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.horizon.clone(),
            config.site.clone(),
            config.fallbacks.clone(),
        )
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.horizon.start.unwrap_or_else(|| {
            Utc::now()
                .date_naive()
                .and_hms_opt(0, 0, 0)
                .map(|t| t.and_utc())
                .unwrap_or_else(Utc::now)
        })
    }

    fn step(&self) -> Duration {
        Duration::milliseconds((self.horizon.step_hours * 3_600_000.0).round() as i64)
    }

    fn slot_timestamp(&self, start: DateTime<Utc>, hour: usize) -> DateTime<Utc> {
        start + self.step() * hour as i32
    }

    fn slot_index(&self, start: DateTime<Utc>, ts: DateTime<Utc>) -> Option<usize> {
        let step_ms = self.step().num_milliseconds();
        let offset_ms = (ts - start).num_milliseconds();
        if step_ms <= 0 || offset_ms < 0 {
            return None;
        }
        let idx = (offset_ms / step_ms) as usize;
        (idx < self.horizon.hours).then_some(idx)
    }

    fn base_load(&self, hour: usize) -> f64 {
        let profile = &self.site.base_load_profile_mw;
        if profile.is_empty() {
            self.site.base_load_mw
        } else {
            profile[hour % profile.len()]
        }
    }

    pub fn build(&self, feeds: &FeedSet) -> Result<Scenario, ScenarioError> {
        let hours = self.horizon.hours;
        if hours == 0 {
            return Err(ScenarioError::EmptyHorizon);
        }
        let start = self.start();
        let end = self.slot_timestamp(start, hours);
        let timestamps: Vec<_> = (0..hours).map(|h| self.slot_timestamp(start, h)).collect();

        // Weather
        let observations = self.fetch("weather", feeds.weather.get_hourly(&self.site.station, start, end))?;
        let mut temperature = SlotMeans::new(hours);
        let mut humidity = SlotMeans::new(hours);
        for obs in &observations {
            let Some(idx) = self.slot_index(start, obs.timestamp) else { continue };
            if let Some(t) = obs.temperature_f {
                check(idx, "temperature_f", t, t.is_finite())?;
                temperature.add(idx, t);
            }
            if let Some(rh) = obs.relative_humidity_pct {
                check(idx, "relative_humidity_pct", rh, (0.0..=100.0).contains(&rh))?;
                humidity.add(idx, rh);
            }
        }
        let defaults = self.fallbacks.as_ref();
        let (temperature, temperature_gaps) =
            hold_last("weather", temperature.means(), defaults.map(|d| d.temperature_f))?;
        let (humidity, humidity_gaps) =
            hold_last("weather", humidity.means(), defaults.map(|d| d.humidity_pct))?;

        // Electricity
        let points = self.fetch("electricity_price", feeds.electricity.get_electricity(start, end))?;
        let mut prices = SlotMeans::new(hours);
        let mut tiers: Vec<Option<PriceTier>> = vec![None; hours];
        for point in &points {
            let Some(idx) = self.slot_index(start, point.timestamp) else { continue };
            let p = point.price_per_mwh;
            check(idx, "electricity_price_per_mwh", p, p.is_finite() && p >= 0.0)?;
            prices.add(idx, p);
            tiers[idx].get_or_insert(point.tier);
        }
        let priced: Vec<Option<(f64, PriceTier)>> = prices
            .means()
            .into_iter()
            .zip(tiers)
            .map(|(p, t)| p.map(|p| (p, t.unwrap_or(PriceTier::OffPeak))))
            .collect();
        let (electricity, electricity_gaps) = hold_last(
            "electricity_price",
            priced,
            defaults.map(|d| (d.electricity_price_per_mwh, PriceTier::OffPeak)),
        )?;

        // Water, keyed by calendar day
        let first_day = start.date_naive();
        let last_day = timestamps.last().map(|t| t.date_naive()).unwrap_or(first_day);
        let daily = self.fetch("water_price", feeds.water.get_water(first_day, last_day))?;
        let mut by_day: BTreeMap<NaiveDate, (f64, u32)> = BTreeMap::new();
        for point in &daily {
            let p = point.price_per_kgal;
            if !(p.is_finite() && p >= 0.0) {
                let hour = timestamps.iter().position(|t| t.date_naive() == point.date).unwrap_or(0);
                return Err(ScenarioError::InvalidValue { hour, field: "water_price_per_kgal", value: p });
            }
            let entry = by_day.entry(point.date).or_insert((0.0, 0));
            entry.0 += p;
            entry.1 += 1;
        }
        let water_by_slot: Vec<Option<f64>> = timestamps
            .iter()
            .map(|t| by_day.get(&t.date_naive()).map(|(sum, n)| sum / *n as f64))
            .collect();
        let (water, water_gaps) =
            hold_last("water_price", water_by_slot, defaults.map(|d| d.water_price_per_kgal))?;

        let interpolated = InterpolationFlags {
            temperature: temperature_gaps,
            humidity: humidity_gaps,
            electricity_price: electricity_gaps,
            water_price: water_gaps,
        };
        log_gaps(&interpolated);

        let slots = (0..hours)
            .map(|h| HourSlot {
                hour_index: h,
                timestamp: timestamps[h],
                temperature_f: temperature[h],
                relative_humidity_pct: humidity[h],
                electricity_price_per_mwh: electricity[h].0,
                price_tier: electricity[h].1,
                water_price_per_kgal: water[h],
                base_load_mw: self.base_load(h),
            })
            .collect();

        debug!(hours, %start, "Scenario built");
        Ok(Scenario { slots, interpolated })
    }

    /// A feed that errors is treated as empty when defaults exist.
    fn fetch<T>(&self, feed: &'static str, result: anyhow::Result<Vec<T>>) -> Result<Vec<T>, ScenarioError> {
        match result {
            Ok(values) => Ok(values),
            Err(e) if self.fallbacks.is_some() => {
                warn!(feed, error = %e, "Feed unavailable, using fallback defaults");
                Ok(Vec::new())
            }
            Err(e) => Err(ScenarioError::FeedUnavailable { feed, reason: format!("{e:#}") }),
        }
    }
}

struct SlotMeans {
    sums: Vec<(f64, u32)>,
}

impl SlotMeans {
    fn new(hours: usize) -> Self {
        Self { sums: vec![(0.0, 0); hours] }
    }

    fn add(&mut self, idx: usize, value: f64) {
        let s = &mut self.sums[idx];
        s.0 += value;
        s.1 += 1;
    }

    fn means(&self) -> Vec<Option<f64>> {
        self.sums
            .iter()
            .map(|(sum, n)| (*n > 0).then(|| sum / *n as f64))
            .collect()
    }
}

fn check(hour: usize, field: &'static str, value: f64, ok: bool) -> Result<(), ScenarioError> {
    if ok {
        Ok(())
    } else {
        Err(ScenarioError::InvalidValue { hour, field, value })
    }
}

fn hold_last<T: Copy>(
    feed: &'static str,
    values: Vec<Option<T>>,
    default: Option<T>,
) -> Result<(Vec<T>, GapReport), ScenarioError> {
    let mut report = GapReport::default();
    let mut last = None;
    let mut filled = Vec::with_capacity(values.len());

    for (hour, value) in values.into_iter().enumerate() {
        let v = match (value, last, default) {
            (Some(v), _, _) => v,
            (None, Some(prev), _) => {
                report.held.push(hour);
                prev
            }
            (None, None, Some(d)) => {
                report.defaulted.push(hour);
                d
            }
            (None, None, None) => {
                return Err(ScenarioError::FeedUnavailable {
                    feed,
                    reason: format!("no value at or before hour {hour}"),
                })
            }
        };
        last = Some(v);
        filled.push(v);
    }
    Ok((filled, report))
}

fn log_gaps(flags: &InterpolationFlags) {
    for (series, gaps) in [
        ("temperature", &flags.temperature),
        ("humidity", &flags.humidity),
        ("electricity_price", &flags.electricity_price),
        ("water_price", &flags.water_price),
    ] {
        if !gaps.is_empty() {
            warn!(
                series,
                held = gaps.held.len(),
                defaulted = gaps.defaulted.len(),
                "Filled gaps in feed data"
            );
        }
    }
}
