use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Electricity tariff band an hour falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum PriceTier {
    Peak,
    OffPeak,
    SuperOffPeak,
}

/// One hour of scenario input. Immutable once the Scenario Builder has produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourSlot {
    pub hour_index: usize,
    pub timestamp: DateTime<Utc>,
    pub temperature_f: f64,
    pub relative_humidity_pct: f64,
    pub electricity_price_per_mwh: f64,
    pub price_tier: PriceTier,
    pub water_price_per_kgal: f64,
    pub base_load_mw: f64,
}

/// Cooling operating mode. Evaporative cooling is reported as `water` in persisted records.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter, EnumString,
)]
pub enum CoolingMode {
    #[serde(rename = "free")]
    #[strum(to_string = "free")]
    Free,
    #[serde(rename = "water")]
    #[strum(to_string = "water", serialize = "evaporative")]
    Evaporative,
    #[serde(rename = "electric")]
    #[strum(to_string = "electric")]
    Electric,
    #[serde(rename = "hybrid")]
    #[strum(to_string = "hybrid")]
    Hybrid,
}

impl CoolingMode {
    pub fn uses_water(&self) -> bool {
        matches!(self, CoolingMode::Evaporative | CoolingMode::Hybrid)
    }

    pub fn uses_chillers(&self) -> bool {
        matches!(self, CoolingMode::Electric | CoolingMode::Hybrid)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoolingModeDecision {
    pub mode: CoolingMode,
    pub chiller_stages: u32,
    pub water_active: bool,
}

impl CoolingModeDecision {
    /// Stages are dropped for modes without chillers; `water_active` follows the mode.
    pub fn new(mode: CoolingMode, chiller_stages: u32) -> Self {
        Self {
            mode,
            chiller_stages: if mode.uses_chillers() { chiller_stages } else { 0 },
            water_active: mode.uses_water(),
        }
    }

    pub fn free() -> Self {
        Self::new(CoolingMode::Free, 0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StorageState {
    pub level_mwh: f64,
    pub charge_mw: f64,
    pub discharge_mw: f64,
}

impl StorageState {
    pub fn idle(level_mwh: f64) -> Self {
        Self { level_mwh, charge_mw: 0.0, discharge_mw: 0.0 }
    }

    pub fn net_charge_mw(&self) -> f64 {
        self.charge_mw - self.discharge_mw
    }
}

/// Dispatch outcome for a single hour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlyResult {
    pub slot: HourSlot,
    pub decision: CoolingModeDecision,
    pub storage: StorageState,
    pub batch_load_mw: f64,
    pub total_load_mw: f64,
    pub cooling_demand_mw: f64,
    pub cooling_shortfall_mw: f64,
    pub chiller_electricity_mw: f64,
    pub grid_draw_mw: f64,
    pub electricity_cost: f64,
    pub water_cost: f64,
    pub water_usage_gallons: f64,
    pub hourly_cost: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum OptimizationStatus {
    Optimal,
    Feasible,
    Infeasible,
    Error,
}

impl OptimizationStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, OptimizationStatus::Optimal | OptimizationStatus::Feasible)
    }
}
