use chrono::{DateTime, Utc};
use figment::{providers::{Env, Format, Toml}, Figment};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::ConfigurationError;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct Config {
    #[validate(nested)]
    pub horizon: HorizonConfig,
    #[validate(nested)]
    pub site: SiteConfig,
    #[validate(nested)]
    pub storage: StorageConfig,
    #[validate(nested)]
    pub workload: WorkloadConfig,
    #[validate(nested)]
    pub cooling: CoolingConfig,
    #[validate(nested)]
    pub solver: SolverConfig,
    #[serde(default)]
    #[validate(nested)]
    pub baseline: BaselineConfig,
    #[serde(default)]
    #[validate(nested)]
    pub fallbacks: Option<FallbackDefaults>,
    #[serde(default)]
    #[validate(nested)]
    pub environment: EnvironmentConfig,
    #[serde(default)]
    #[validate(nested)]
    pub tariff: TariffConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct HorizonConfig {
    #[validate(range(min = 1, max = 8784))]
    pub hours: usize,
    #[validate(range(min = 0.01, max = 24.0))]
    pub step_hours: f64,
    #[serde(default)]
    pub start: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SiteConfig {
    #[validate(length(min = 1))]
    pub station: String,
    #[validate(range(min = 0.0))]
    pub base_load_mw: f64,
    #[serde(default)]
    pub base_load_profile_mw: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct StorageConfig {
    #[validate(range(min = 0.0))]
    pub capacity_mwh: f64,
    #[validate(range(min = 0.0))]
    pub initial_level_mwh: f64,
    #[validate(range(min = 0.0))]
    pub max_charge_mw: f64,
    #[validate(range(min = 0.0))]
    pub max_discharge_mw: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct WorkloadConfig {
    #[validate(range(min = 0.0))]
    pub max_shiftable_mw: f64,
    #[validate(range(min = 0.0))]
    pub required_batch_mwh: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CoolingConfig {
    pub free_cooling_threshold_f: f64,
    #[validate(range(min = 0.0))]
    pub base_cooling_fraction: f64,
    #[validate(range(min = 0.0))]
    pub cooling_fraction_per_degree_f: f64,
    pub humidity_infeasibility_pct: f64,
    pub hybrid_split: f64,
    #[validate(range(min = 0.0))]
    pub evaporative_capacity_mw: f64,
    #[validate(range(min = 0.0))]
    pub evaporative_water_gal_per_mwh: f64,
    #[validate(range(min = 0.0))]
    pub evaporative_electricity_mw_per_mwh: f64,
    #[validate(range(min = 0.0))]
    pub chiller_electricity_mw_per_mwh: f64,
    /// Incremental capacity added by each chiller stage, in stage order.
    #[validate(length(min = 1))]
    pub chiller_stage_capacity_mw: Vec<f64>,
}

impl CoolingConfig {
    pub fn max_stages(&self) -> u32 {
        self.chiller_stage_capacity_mw.len() as u32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    Milp,
    Heuristic,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SolverConfig {
    pub strategy: StrategyKind,
    #[validate(range(exclusive_min = 0.0))]
    pub time_limit_seconds: f64,
    #[validate(range(min = 0.0, max = 1.0))]
    pub epsilon: f64,
    #[validate(range(min = 0.0))]
    pub shortfall_penalty_per_mwh: f64,
    #[validate(range(min = 0.0, max = 1.0))]
    pub max_shortfall_fraction: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct BaselineConfig {
    /// Constant batch load run every hour; defaults to the required work spread evenly.
    #[validate(range(min = 0.0))]
    pub batch_load_mw: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct FallbackDefaults {
    pub temperature_f: f64,
    #[validate(range(min = 0.0, max = 100.0))]
    pub humidity_pct: f64,
    #[validate(range(min = 0.0))]
    pub electricity_price_per_mwh: f64,
    #[validate(range(min = 0.0))]
    pub water_price_per_kgal: f64,
}

impl Default for FallbackDefaults {
    fn default() -> Self {
        Self {
            temperature_f: 85.0,
            humidity_pct: 30.0,
            electricity_price_per_mwh: 35.0,
            water_price_per_kgal: 3.24,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct EnvironmentConfig {
    #[validate(range(min = 0.0))]
    pub grid_emission_tons_per_mwh: f64,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self { grid_emission_tons_per_mwh: 0.4 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct TariffConfig {
    #[validate(range(max = 23))]
    pub peak_start_hour: u32,
    #[validate(range(max = 24))]
    pub peak_end_hour: u32,
    #[validate(range(min = 0.0))]
    pub peak_rate: f64,
    #[validate(range(min = 0.0))]
    pub off_peak_rate: f64,
    #[validate(range(min = 0.0))]
    pub super_off_peak_rate: f64,
    #[validate(range(min = 0.0))]
    pub water_base_per_kgal: f64,
    #[validate(range(min = 0.0))]
    pub expected_daily_water_gallons: f64,
}

impl Default for TariffConfig {
    fn default() -> Self {
        Self {
            peak_start_hour: 15,
            peak_end_hour: 20,
            peak_rate: 150.0,
            off_peak_rate: 35.0,
            super_off_peak_rate: 25.0,
            water_base_per_kgal: 3.24,
            expected_daily_water_gallons: 0.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig { pub dir: String }

impl Default for OutputConfig {
    fn default() -> Self {
        Self { dir: "runs".to_string() }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            horizon: HorizonConfig { hours: 24, step_hours: 1.0, start: None },
            site: SiteConfig {
                station: "PHX".to_string(),
                base_load_mw: 80.0,
                base_load_profile_mw: Vec::new(),
            },
            storage: StorageConfig {
                capacity_mwh: 20.0,
                initial_level_mwh: 0.0,
                max_charge_mw: 10.0,
                max_discharge_mw: 10.0,
            },
            workload: WorkloadConfig { max_shiftable_mw: 20.0, required_batch_mwh: 240.0 },
            cooling: CoolingConfig {
                free_cooling_threshold_f: 85.0,
                base_cooling_fraction: 0.30,
                cooling_fraction_per_degree_f: 0.01,
                humidity_infeasibility_pct: 50.0,
                hybrid_split: 0.5,
                evaporative_capacity_mw: 60.0,
                evaporative_water_gal_per_mwh: 450.0,
                evaporative_electricity_mw_per_mwh: 0.05,
                chiller_electricity_mw_per_mwh: 0.25,
                chiller_stage_capacity_mw: vec![10.0, 10.0, 10.0, 10.0],
            },
            solver: SolverConfig {
                strategy: StrategyKind::Milp,
                time_limit_seconds: 30.0,
                epsilon: 1e-6,
                shortfall_penalty_per_mwh: 10_000.0,
                max_shortfall_fraction: 0.1,
            },
            baseline: BaselineConfig::default(),
            fallbacks: Some(FallbackDefaults::default()),
            environment: EnvironmentConfig::default(),
            tariff: TariffConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, ConfigurationError> {
        let figment = Figment::new()
            .merge(Toml::file("config/default.toml"))
            .merge(Env::prefixed("COOLING__").split("__"));
        Ok(figment.extract()?)
    }

    pub fn from_toml_str(toml: &str) -> Result<Self, ConfigurationError> {
        Ok(Figment::new().merge(Toml::string(toml)).extract()?)
    }

    /// Field rules first, then checks that span several fields.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        Validate::validate(self)?;

        let storage = &self.storage;
        if storage.initial_level_mwh > storage.capacity_mwh {
            return Err(out_of_range(
                "storage.initial_level_mwh",
                format!(
                    "{} exceeds capacity {}",
                    storage.initial_level_mwh, storage.capacity_mwh
                ),
            ));
        }

        let cooling = &self.cooling;
        if !(0.0..=1.0).contains(&cooling.hybrid_split) {
            return Err(out_of_range(
                "cooling.hybrid_split",
                format!("{} is outside [0, 1]", cooling.hybrid_split),
            ));
        }
        if !(cooling.humidity_infeasibility_pct > 0.0 && cooling.humidity_infeasibility_pct <= 100.0) {
            return Err(out_of_range(
                "cooling.humidity_infeasibility_pct",
                format!("{} is outside (0, 100]", cooling.humidity_infeasibility_pct),
            ));
        }
        if let Some(stage) = cooling
            .chiller_stage_capacity_mw
            .iter()
            .position(|c| !c.is_finite() || *c <= 0.0)
        {
            return Err(out_of_range(
                "cooling.chiller_stage_capacity_mw",
                format!("stage {} must have a positive capacity", stage + 1),
            ));
        }
        if self.site.base_load_profile_mw.iter().any(|l| !l.is_finite() || *l < 0.0) {
            return Err(out_of_range(
                "site.base_load_profile_mw",
                "entries must be finite and non-negative".to_string(),
            ));
        }

        let deliverable =
            self.workload.max_shiftable_mw * self.horizon.hours as f64 * self.horizon.step_hours;
        if self.workload.required_batch_mwh > deliverable + self.solver.epsilon {
            return Err(out_of_range(
                "workload.required_batch_mwh",
                format!(
                    "{} exceeds the {deliverable} MWh deliverable over the horizon",
                    self.workload.required_batch_mwh
                ),
            ));
        }

        if self.tariff.peak_start_hour > self.tariff.peak_end_hour {
            return Err(out_of_range(
                "tariff.peak_start_hour",
                "peak window must not wrap midnight".to_string(),
            ));
        }

        Ok(())
    }
}

fn out_of_range(field: &'static str, reason: String) -> ConfigurationError {
    ConfigurationError::OutOfRange { field, reason }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_default_config_is_valid() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn test_negative_capacity_rejected() {
        let mut cfg = Config::default();
        cfg.storage.capacity_mwh = -1.0;
        assert!(matches!(cfg.validate(), Err(ConfigurationError::Validation(_))));
    }

    #[rstest]
    #[case::negative_price(|f: &mut FallbackDefaults| f.electricity_price_per_mwh = -5.0)]
    #[case::negative_water(|f: &mut FallbackDefaults| f.water_price_per_kgal = -0.1)]
    #[case::humidity_over_100(|f: &mut FallbackDefaults| f.humidity_pct = 150.0)]
    fn test_bad_fallbacks_rejected(#[case] mutate: fn(&mut FallbackDefaults)) {
        let mut cfg = Config::default();
        let mut fallbacks = FallbackDefaults::default();
        mutate(&mut fallbacks);
        cfg.fallbacks = Some(fallbacks);
        assert!(matches!(cfg.validate(), Err(ConfigurationError::Validation(_))));
    }

    #[test]
    fn test_initial_level_above_capacity_rejected() {
        let mut cfg = Config::default();
        cfg.storage.initial_level_mwh = cfg.storage.capacity_mwh + 1.0;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigurationError::OutOfRange { field: "storage.initial_level_mwh", .. })
        ));
    }

    #[test]
    fn test_unreachable_batch_work_rejected() {
        let mut cfg = Config::default();
        cfg.workload.required_batch_mwh = 10_000.0;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigurationError::OutOfRange { field: "workload.required_batch_mwh", .. })
        ));
    }

    #[test]
    fn test_zero_stage_capacity_rejected() {
        let mut cfg = Config::default();
        cfg.cooling.chiller_stage_capacity_mw = vec![10.0, 0.0];
        assert!(matches!(
            cfg.validate(),
            Err(ConfigurationError::OutOfRange { field: "cooling.chiller_stage_capacity_mw", .. })
        ));
    }

    #[test]
    fn test_from_toml_str() {
        let cfg = Config::from_toml_str(
            r#"
            [horizon]
            hours = 6
            step_hours = 1.0

            [site]
            station = "PHX"
            base_load_mw = 50.0

            [storage]
            capacity_mwh = 5.0
            initial_level_mwh = 1.0
            max_charge_mw = 2.0
            max_discharge_mw = 2.0

            [workload]
            max_shiftable_mw = 5.0
            required_batch_mwh = 10.0

            [cooling]
            free_cooling_threshold_f = 85.0
            base_cooling_fraction = 0.3
            cooling_fraction_per_degree_f = 0.01
            humidity_infeasibility_pct = 50.0
            hybrid_split = 0.5
            evaporative_capacity_mw = 40.0
            evaporative_water_gal_per_mwh = 450.0
            evaporative_electricity_mw_per_mwh = 0.05
            chiller_electricity_mw_per_mwh = 0.25
            chiller_stage_capacity_mw = [15.0, 10.0]

            [solver]
            strategy = "heuristic"
            time_limit_seconds = 5.0
            epsilon = 1e-6
            shortfall_penalty_per_mwh = 1000.0
            max_shortfall_fraction = 0.05
            "#,
        )
        .unwrap();

        assert_eq!(cfg.horizon.hours, 6);
        assert_eq!(cfg.solver.strategy, StrategyKind::Heuristic);
        assert_eq!(cfg.cooling.max_stages(), 2);
        assert!(cfg.fallbacks.is_none());
        assert_eq!(cfg.tariff.peak_start_hour, 15);
        cfg.validate().unwrap();
    }
}
