use serde::{Deserialize, Serialize};

use super::DispatchLimits;
use crate::domain::{CoolingMode, HourSlot, OptimizationStatus};
use crate::error::OptimizationError;
use crate::physics::{CoolingModel, ModeEfficiency, ModeTable};

/// Physics evaluated once per hour before any strategy runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HourInput {
    pub slot: HourSlot,
    pub cooling_fraction: f64,
    pub modes: ModeTable,
}

/// How much cooling demand may go unmet, and at what price.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Relaxation {
    Strict,
    Shortfall { max_fraction: f64, penalty_per_mwh: f64 },
}

impl Relaxation {
    /// Share of each hour's cooling demand that must actually be delivered.
    pub fn coverage(&self) -> f64 {
        1.0 - self.max_fraction()
    }

    pub fn max_fraction(&self) -> f64 {
        match self {
            Relaxation::Strict => 0.0,
            Relaxation::Shortfall { max_fraction, .. } => max_fraction.clamp(0.0, 1.0),
        }
    }

    pub fn penalty_per_mwh(&self) -> f64 {
        match self {
            Relaxation::Strict => 0.0,
            Relaxation::Shortfall { penalty_per_mwh, .. } => *penalty_per_mwh,
        }
    }

    pub fn is_relaxed(&self) -> bool {
        matches!(self, Relaxation::Shortfall { .. })
    }
}

/// A full-horizon dispatch problem. Owned so it can move onto a solver thread.
#[derive(Debug, Clone)]
pub struct DispatchProblem {
    pub hours: Vec<HourInput>,
    pub model: CoolingModel,
    pub limits: DispatchLimits,
    pub relaxation: Relaxation,
}

impl DispatchProblem {
    pub fn new(slots: &[HourSlot], model: CoolingModel, limits: DispatchLimits) -> Self {
        let hours = slots
            .iter()
            .map(|slot| HourInput {
                cooling_fraction: model.cooling_fraction(slot.temperature_f),
                modes: model.mode_table(slot.relative_humidity_pct),
                slot: slot.clone(),
            })
            .collect();
        Self { hours, model, limits, relaxation: Relaxation::Strict }
    }

    pub fn with_relaxation(&self, relaxation: Relaxation) -> Self {
        Self { relaxation, ..self.clone() }
    }

    pub fn hours(&self) -> usize {
        self.hours.len()
    }

    pub fn demand_mw(&self, h: usize, batch_load_mw: f64) -> f64 {
        let input = &self.hours[h];
        self.model
            .cooling_requirement(input.slot.temperature_f, input.slot.base_load_mw + batch_load_mw)
    }

    /// Feasible modes for hour `h`, in declaration order. FREE only when the hour needs no cooling.
    pub fn feasible_modes(&self, h: usize) -> impl Iterator<Item = (CoolingMode, ModeEfficiency)> + '_ {
        let needs_cooling = self.hours[h].cooling_fraction > 0.0;
        self.hours[h]
            .modes
            .iter()
            .filter(move |(mode, eff)| eff.feasible && !(needs_cooling && *mode == CoolingMode::Free))
            .copied()
    }

    pub fn capacity_mw(&self, h: usize, mode: CoolingMode) -> f64 {
        if !self.hours[h].modes.get(mode).feasible {
            return 0.0;
        }
        self.model.mode_capacity_mw(mode, self.hours[h].slot.relative_humidity_pct)
    }

    pub fn max_capacity_mw(&self, h: usize) -> f64 {
        self.feasible_modes(h)
            .map(|(mode, _)| self.capacity_mw(h, mode))
            .fold(0.0, f64::max)
    }
}

/// One hour of a strategy's raw answer, before normalization.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HourPlan {
    pub batch_load_mw: f64,
    pub mode: CoolingMode,
    pub cooling_delivered_mw: f64,
    pub shortfall_mw: f64,
    pub charge_mw: f64,
    pub discharge_mw: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchPlan {
    pub hours: Vec<HourPlan>,
    pub status: OptimizationStatus,
}

/// A method that turns a dispatch problem into an hour-by-hour plan.
///
/// Implementations return `Infeasible` when no plan satisfies every
/// constraint; the dispatcher owns retries and time limits.
pub trait DispatchStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn solve(&self, problem: &DispatchProblem) -> Result<DispatchPlan, OptimizationError>;
}
