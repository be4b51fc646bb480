//! Cooling physics
//!
//! Stateless mapping from ambient conditions and IT load to cooling demand, and
//! from humidity to the per-mode resource rates the optimizer prices. Everything
//! here is deterministic; the optimizer calls it once per hour and mode.

use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;

use crate::config::CoolingConfig;
use crate::domain::CoolingMode;

/// Per-unit resource use of a cooling mode at a given humidity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModeEfficiency {
    pub feasible: bool,
    pub water_gallons_per_mwh_cooled: f64,
    pub electricity_mw_per_mwh_cooled: f64,
}

impl ModeEfficiency {
    const INFEASIBLE: Self = Self {
        feasible: false,
        water_gallons_per_mwh_cooled: 0.0,
        electricity_mw_per_mwh_cooled: 0.0,
    };

    /// Cost of delivering one MWh of cooling at the given prices.
    pub fn cost_per_mwh_cooled(&self, electricity_price_per_mwh: f64, water_price_per_kgal: f64) -> f64 {
        electricity_price_per_mwh * self.electricity_mw_per_mwh_cooled
            + water_price_per_kgal * self.water_gallons_per_mwh_cooled / 1000.0
    }
}

/// Efficiency of every mode for one hour. Built once per hour as a pure lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModeTable {
    entries: Vec<(CoolingMode, ModeEfficiency)>,
}

impl ModeTable {
    pub fn get(&self, mode: CoolingMode) -> ModeEfficiency {
        self.entries
            .iter()
            .find(|(m, _)| *m == mode)
            .map(|(_, e)| *e)
            .unwrap_or(ModeEfficiency::INFEASIBLE)
    }

    pub fn iter(&self) -> impl Iterator<Item = &(CoolingMode, ModeEfficiency)> {
        self.entries.iter()
    }
}

#[derive(Debug, Clone)]
pub struct CoolingModel {
    config: CoolingConfig,
}

impl CoolingModel {
    pub fn new(config: CoolingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CoolingConfig {
        &self.config
    }

    /// MW of cooling required per MW of IT load. Zero at or below the free-cooling threshold.
    pub fn cooling_fraction(&self, temperature_f: f64) -> f64 {
        let excess = temperature_f - self.config.free_cooling_threshold_f;
        if excess <= 0.0 {
            return 0.0;
        }
        self.config.base_cooling_fraction + self.config.cooling_fraction_per_degree_f * excess
    }

    pub fn cooling_requirement(&self, temperature_f: f64, total_load_mw: f64) -> f64 {
        self.cooling_fraction(temperature_f) * total_load_mw.max(0.0)
    }

    /// Position of `humidity_pct` between bone-dry (0.0) and the evaporative cutoff (1.0).
    fn humidity_penalty(&self, humidity_pct: f64) -> Option<f64> {
        let threshold = self.config.humidity_infeasibility_pct;
        let humidity = humidity_pct.clamp(0.0, 100.0);
        (humidity < threshold).then(|| humidity / threshold)
    }

    pub fn mode_efficiency(&self, mode: CoolingMode, humidity_pct: f64) -> ModeEfficiency {
        let c = &self.config;
        let electric = ModeEfficiency {
            feasible: true,
            water_gallons_per_mwh_cooled: 0.0,
            electricity_mw_per_mwh_cooled: c.chiller_electricity_mw_per_mwh,
        };

        match mode {
            CoolingMode::Free => ModeEfficiency {
                feasible: true,
                water_gallons_per_mwh_cooled: 0.0,
                electricity_mw_per_mwh_cooled: 0.0,
            },
            CoolingMode::Electric => electric,
            CoolingMode::Evaporative => match self.humidity_penalty(humidity_pct) {
                Some(penalty) => ModeEfficiency {
                    feasible: true,
                    water_gallons_per_mwh_cooled: c.evaporative_water_gal_per_mwh * (1.0 + penalty),
                    electricity_mw_per_mwh_cooled: c.evaporative_electricity_mw_per_mwh
                        * (1.0 + penalty),
                },
                None => ModeEfficiency::INFEASIBLE,
            },
            CoolingMode::Hybrid => {
                let evaporative = self.mode_efficiency(CoolingMode::Evaporative, humidity_pct);
                if !evaporative.feasible {
                    return ModeEfficiency::INFEASIBLE;
                }
                let split = c.hybrid_split;
                ModeEfficiency {
                    feasible: true,
                    water_gallons_per_mwh_cooled: split * evaporative.water_gallons_per_mwh_cooled,
                    electricity_mw_per_mwh_cooled: split
                        * evaporative.electricity_mw_per_mwh_cooled
                        + (1.0 - split) * electric.electricity_mw_per_mwh_cooled,
                }
            }
        }
    }

    pub fn mode_table(&self, humidity_pct: f64) -> ModeTable {
        ModeTable {
            entries: CoolingMode::iter()
                .map(|mode| (mode, self.mode_efficiency(mode, humidity_pct)))
                .collect(),
        }
    }

    /// Evaporative tower capacity, derated linearly toward zero at the humidity cutoff.
    pub fn evaporative_capacity_mw(&self, humidity_pct: f64) -> f64 {
        match self.humidity_penalty(humidity_pct) {
            Some(penalty) => self.config.evaporative_capacity_mw * (1.0 - penalty),
            None => 0.0,
        }
    }

    pub fn chiller_capacity_mw(&self, stages: u32) -> f64 {
        self.config
            .chiller_stage_capacity_mw
            .iter()
            .take(stages as usize)
            .sum()
    }

    pub fn max_chiller_capacity_mw(&self) -> f64 {
        self.chiller_capacity_mw(self.config.max_stages())
    }

    /// Smallest stage count whose cumulative capacity covers `cooling_mw`.
    pub fn stages_for(&self, cooling_mw: f64, epsilon: f64) -> Option<u32> {
        if cooling_mw <= epsilon {
            return Some(0);
        }
        let mut capacity = 0.0;
        for (i, stage) in self.config.chiller_stage_capacity_mw.iter().enumerate() {
            capacity += stage;
            if capacity + epsilon >= cooling_mw {
                return Some(i as u32 + 1);
            }
        }
        None
    }

    /// Largest cooling a mode can deliver in an hour with the given humidity.
    pub fn mode_capacity_mw(&self, mode: CoolingMode, humidity_pct: f64) -> f64 {
        let split = self.config.hybrid_split;
        match mode {
            CoolingMode::Free => 0.0,
            CoolingMode::Electric => self.max_chiller_capacity_mw(),
            CoolingMode::Evaporative => self.evaporative_capacity_mw(humidity_pct),
            CoolingMode::Hybrid => {
                if !self.mode_efficiency(mode, humidity_pct).feasible {
                    return 0.0;
                }
                let evaporative = self.evaporative_capacity_mw(humidity_pct);
                let chillers = self.max_chiller_capacity_mw();
                let by_tower = if split > 0.0 { evaporative / split } else { f64::INFINITY };
                let by_chillers = if split < 1.0 { chillers / (1.0 - split) } else { f64::INFINITY };
                by_tower.min(by_chillers)
            }
        }
    }

    /// Share of hybrid-mode cooling carried by the chillers.
    pub fn chiller_share(&self, mode: CoolingMode, cooling_mw: f64) -> f64 {
        match mode {
            CoolingMode::Electric => cooling_mw,
            CoolingMode::Hybrid => (1.0 - self.config.hybrid_split) * cooling_mw,
            CoolingMode::Free | CoolingMode::Evaporative => 0.0,
        }
    }
}
