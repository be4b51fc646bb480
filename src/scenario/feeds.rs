//! External data feeds consumed by the Scenario Builder.
//!
//! The traits are the narrow interface to the weather and price collaborators.
//! The concrete feeds here are deterministic generators and in-memory series;
//! networked adapters live outside this crate.

use anyhow::Result;
use chrono::{DateTime, Datelike, Duration, NaiveDate, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use crate::config::TariffConfig;
use crate::domain::PriceTier;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeatherObservation {
    pub timestamp: DateTime<Utc>,
    pub temperature_f: Option<f64>,
    pub relative_humidity_pct: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ElectricityPricePoint {
    pub timestamp: DateTime<Utc>,
    pub price_per_mwh: f64,
    pub tier: PriceTier,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WaterPricePoint {
    pub date: NaiveDate,
    pub price_per_kgal: f64,
}

pub trait WeatherFeed: Send + Sync {
    fn get_hourly(
        &self,
        station: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<WeatherObservation>>;
}

pub trait ElectricityPriceFeed: Send + Sync {
    fn get_electricity(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<ElectricityPricePoint>>;
}

pub trait WaterPriceFeed: Send + Sync {
    fn get_water(&self, first_day: NaiveDate, last_day: NaiveDate) -> Result<Vec<WaterPricePoint>>;
}

fn hours_between(start: DateTime<Utc>, end: DateTime<Utc>) -> impl Iterator<Item = DateTime<Utc>> {
    let n = (end - start).num_hours().max(0);
    (0..n).map(move |h| start + Duration::hours(h))
}

/// Constant weather, every hour.
#[derive(Debug, Clone, Copy)]
pub struct FixedWeather {
    pub temperature_f: f64,
    pub relative_humidity_pct: f64,
}

impl WeatherFeed for FixedWeather {
    fn get_hourly(&self, _station: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<WeatherObservation>> {
        Ok(hours_between(start, end)
            .map(|timestamp| WeatherObservation {
                timestamp,
                temperature_f: Some(self.temperature_f),
                relative_humidity_pct: Some(self.relative_humidity_pct),
            })
            .collect())
    }
}

/// Desert summer day: sinusoid with its minimum at 05:00 and maximum at 17:00.
#[derive(Debug, Clone, Copy)]
pub struct DiurnalWeather {
    pub mean_f: f64,
    pub amplitude_f: f64,
    pub min_f: f64,
    pub max_f: f64,
    pub relative_humidity_pct: f64,
}

impl Default for DiurnalWeather {
    fn default() -> Self {
        Self {
            mean_f: 95.0,
            amplitude_f: 15.0,
            min_f: 75.0,
            max_f: 115.0,
            relative_humidity_pct: 20.0,
        }
    }
}

impl DiurnalWeather {
    pub fn temperature_at(&self, hour: u32) -> f64 {
        let phase = (hour as f64 - 5.0) * PI / 12.0;
        (self.mean_f + self.amplitude_f * (phase - PI / 2.0).sin()).clamp(self.min_f, self.max_f)
    }
}

impl WeatherFeed for DiurnalWeather {
    fn get_hourly(&self, _station: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<WeatherObservation>> {
        Ok(hours_between(start, end)
            .map(|timestamp| WeatherObservation {
                timestamp,
                temperature_f: Some(self.temperature_at(timestamp.hour())),
                relative_humidity_pct: Some(self.relative_humidity_pct),
            })
            .collect())
    }
}

/// Three-band time-of-use tariff: peak window, super off-peak overnight (22:00-06:00), off-peak otherwise.
#[derive(Debug, Clone)]
pub struct TimeOfUseTariff {
    pub peak_start_hour: u32,
    pub peak_end_hour: u32,
    pub peak_rate: f64,
    pub off_peak_rate: f64,
    pub super_off_peak_rate: f64,
}

impl From<&TariffConfig> for TimeOfUseTariff {
    fn from(cfg: &TariffConfig) -> Self {
        Self {
            peak_start_hour: cfg.peak_start_hour,
            peak_end_hour: cfg.peak_end_hour,
            peak_rate: cfg.peak_rate,
            off_peak_rate: cfg.off_peak_rate,
            super_off_peak_rate: cfg.super_off_peak_rate,
        }
    }
}

impl TimeOfUseTariff {
    pub fn tier_at(&self, hour: u32) -> PriceTier {
        if (self.peak_start_hour..self.peak_end_hour).contains(&hour) {
            PriceTier::Peak
        } else if hour >= 22 || hour < 6 {
            PriceTier::SuperOffPeak
        } else {
            PriceTier::OffPeak
        }
    }

    pub fn rate(&self, tier: PriceTier) -> f64 {
        match tier {
            PriceTier::Peak => self.peak_rate,
            PriceTier::OffPeak => self.off_peak_rate,
            PriceTier::SuperOffPeak => self.super_off_peak_rate,
        }
    }
}

impl ElectricityPriceFeed for TimeOfUseTariff {
    fn get_electricity(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<ElectricityPricePoint>> {
        Ok(hours_between(start, end)
            .map(|timestamp| {
                let tier = self.tier_at(timestamp.hour());
                ElectricityPricePoint { timestamp, price_per_mwh: self.rate(tier), tier }
            })
            .collect())
    }
}

/// Municipal water tariff with summer surcharges and daily usage tiers.
#[derive(Debug, Clone)]
pub struct SeasonalWaterTariff {
    pub base_per_kgal: f64,
    pub expected_daily_gallons: f64,
}

impl From<&TariffConfig> for SeasonalWaterTariff {
    fn from(cfg: &TariffConfig) -> Self {
        Self {
            base_per_kgal: cfg.water_base_per_kgal,
            expected_daily_gallons: cfg.expected_daily_water_gallons,
        }
    }
}

impl SeasonalWaterTariff {
    pub fn seasonal_multiplier(month: u32) -> f64 {
        match month {
            6..=8 => 1.25,
            5 | 9 => 1.15,
            _ => 1.0,
        }
    }

    pub fn tier_multiplier(daily_gallons: f64) -> f64 {
        if daily_gallons < 100_000.0 {
            1.0
        } else if daily_gallons < 500_000.0 {
            1.2
        } else {
            1.5
        }
    }

    pub fn price_on(&self, date: NaiveDate) -> f64 {
        self.base_per_kgal
            * Self::seasonal_multiplier(date.month())
            * Self::tier_multiplier(self.expected_daily_gallons)
    }
}

impl WaterPriceFeed for SeasonalWaterTariff {
    fn get_water(&self, first_day: NaiveDate, last_day: NaiveDate) -> Result<Vec<WaterPricePoint>> {
        Ok(first_day
            .iter_days()
            .take_while(|d| *d <= last_day)
            .map(|date| WaterPricePoint { date, price_per_kgal: self.price_on(date) })
            .collect())
    }
}

/// Replays recorded hourly weather and electricity prices.
#[derive(Debug, Clone, Default)]
pub struct HourlySeries {
    pub weather: Vec<WeatherObservation>,
    pub electricity: Vec<ElectricityPricePoint>,
}

impl HourlySeries {
    /// Hourly electricity prices starting at `start`, all tagged with `tier`.
    pub fn electricity_from(start: DateTime<Utc>, prices: &[f64], tier: PriceTier) -> Self {
        Self {
            weather: Vec::new(),
            electricity: prices
                .iter()
                .enumerate()
                .map(|(h, p)| ElectricityPricePoint {
                    timestamp: start + Duration::hours(h as i64),
                    price_per_mwh: *p,
                    tier,
                })
                .collect(),
        }
    }
}

impl WeatherFeed for HourlySeries {
    fn get_hourly(&self, _station: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<WeatherObservation>> {
        Ok(self
            .weather
            .iter()
            .filter(|o| o.timestamp >= start && o.timestamp < end)
            .copied()
            .collect())
    }
}

impl ElectricityPriceFeed for HourlySeries {
    fn get_electricity(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<ElectricityPricePoint>> {
        Ok(self
            .electricity
            .iter()
            .filter(|p| p.timestamp >= start && p.timestamp < end)
            .copied()
            .collect())
    }
}

/// Replays recorded daily water prices.
#[derive(Debug, Clone, Default)]
pub struct DailyWaterSeries {
    pub prices: Vec<WaterPricePoint>,
}

impl WaterPriceFeed for DailyWaterSeries {
    fn get_water(&self, first_day: NaiveDate, last_day: NaiveDate) -> Result<Vec<WaterPricePoint>> {
        Ok(self
            .prices
            .iter()
            .filter(|p| p.date >= first_day && p.date <= last_day)
            .copied()
            .collect())
    }
}

/// A feed that is down. Exercises the fallback path.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableFeed;

impl WeatherFeed for UnavailableFeed {
    fn get_hourly(&self, station: &str, _start: DateTime<Utc>, _end: DateTime<Utc>) -> Result<Vec<WeatherObservation>> {
        anyhow::bail!("no weather data for station {station}")
    }
}

impl ElectricityPriceFeed for UnavailableFeed {
    fn get_electricity(&self, _start: DateTime<Utc>, _end: DateTime<Utc>) -> Result<Vec<ElectricityPricePoint>> {
        anyhow::bail!("electricity price service unavailable")
    }
}

impl WaterPriceFeed for UnavailableFeed {
    fn get_water(&self, _first_day: NaiveDate, _last_day: NaiveDate) -> Result<Vec<WaterPricePoint>> {
        anyhow::bail!("water price service unavailable")
    }
}
