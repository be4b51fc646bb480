//! MILP (Mixed-Integer Linear Programming) dispatcher
//!
//! Solves the whole horizon in one model so storage and batch placement see
//! future prices. Per hour the formulation carries:
//! - continuous batch load bounded by the hour's cooling headroom
//! - continuous storage flows and level; flows are lossless, so opposing
//!   flows in one hour cancel and are netted on extraction
//! - cooling delivered per candidate mode, with one-hot binaries only when
//!   more than one mode survives pruning
//!
//! Chiller stages are not modeled: they carry no cost, and the stage count is
//! recovered from the chiller load after the solve.
//!
//! Under a relaxation each hour also gets a bounded, penalized cooling shortfall.

#[cfg(feature = "optimization")]
use good_lp::{
    constraint, default_solver, variable, Constraint, Expression, ProblemVariables, ResolutionError,
    Solution, SolverModel, Variable,
};
use tracing::debug;

use crate::domain::OptimizationStatus;
use crate::error::OptimizationError;
use crate::optimizer::{DispatchPlan, DispatchProblem, DispatchStrategy, HourPlan};
#[cfg(feature = "optimization")]
use crate::domain::CoolingMode;
#[cfg(feature = "optimization")]
use crate::optimizer::batch_headroom_mw;
#[cfg(feature = "optimization")]
use crate::physics::ModeEfficiency;

#[derive(Debug, Clone, Copy, Default)]
pub struct MilpDispatcher;

/// A cooling mode worth offering the solver in one hour.
#[cfg(feature = "optimization")]
#[derive(Debug, Clone, Copy)]
struct Candidate {
    mode: CoolingMode,
    efficiency: ModeEfficiency,
    capacity_mw: f64,
    cost_per_mwh: f64,
}

/// Modes that can matter in hour `h` given batch load in `[0, headroom_mw]`.
///
/// Drops modes that cannot reach the smallest demand they must cover and modes
/// beaten on both capacity and cost by another mode. When the cheapest survivor
/// covers the largest possible demand in full it is the only one returned. An
/// empty result means the hour needs no cooling.
#[cfg(feature = "optimization")]
fn candidate_modes(problem: &DispatchProblem, h: usize, headroom_mw: f64) -> Result<Vec<Candidate>, OptimizationError> {
    let eps = problem.limits.epsilon;
    let coverage = problem.relaxation.coverage();
    let min_demand = problem.demand_mw(h, 0.0) * coverage;
    let max_demand = problem.demand_mw(h, headroom_mw);
    if problem.hours[h].cooling_fraction <= 0.0 || max_demand <= eps {
        return Ok(Vec::new());
    }

    let slot = &problem.hours[h].slot;
    let usable: Vec<Candidate> = problem
        .feasible_modes(h)
        .filter(|(mode, _)| *mode != CoolingMode::Free)
        .map(|(mode, efficiency)| Candidate {
            mode,
            efficiency,
            capacity_mw: problem.capacity_mw(h, mode),
            cost_per_mwh: efficiency
                .cost_per_mwh_cooled(slot.electricity_price_per_mwh, slot.water_price_per_kgal),
        })
        .filter(|c| c.capacity_mw + eps >= min_demand)
        .collect();

    let dominated = |i: usize, c: &Candidate| {
        usable.iter().enumerate().any(|(j, other)| {
            j != i
                && other.capacity_mw >= c.capacity_mw
                && other.cost_per_mwh <= c.cost_per_mwh
                && (other.capacity_mw > c.capacity_mw || other.cost_per_mwh < c.cost_per_mwh || j < i)
        })
    };
    let mut candidates: Vec<Candidate> = usable
        .iter()
        .enumerate()
        .filter(|(i, c)| !dominated(*i, *c))
        .map(|(_, c)| *c)
        .collect();
    candidates.sort_by(|a, b| a.cost_per_mwh.total_cmp(&b.cost_per_mwh));

    match candidates.first() {
        None => Err(OptimizationError::Infeasible {
            hour: Some(h),
            constraint: "cooling_sufficiency",
        }),
        Some(cheapest) if cheapest.capacity_mw + eps >= max_demand => Ok(vec![*cheapest]),
        Some(_) => Ok(candidates),
    }
}

#[cfg(feature = "optimization")]
struct HourVars {
    batch: Variable,
    modes: Vec<(CoolingMode, Option<Variable>, Variable)>,
    shortfall: Option<Variable>,
    charge: Variable,
    discharge: Variable,
}

impl MilpDispatcher {
    #[cfg(feature = "optimization")]
    fn solve_milp(&self, problem: &DispatchProblem) -> Result<Vec<HourPlan>, OptimizationError> {
        let limits = &problem.limits;
        let dt = limits.step_hours;
        let relaxation = problem.relaxation;

        let mut vars = ProblemVariables::new();
        let mut constraints: Vec<Constraint> = Vec::with_capacity(problem.hours() * 8);
        let mut objective = Expression::default();
        let mut batch_energy = Expression::default();
        let mut previous_level: Option<Variable> = None;
        let mut hours = Vec::with_capacity(problem.hours());
        let mut binaries = 0usize;

        for (h, input) in problem.hours.iter().enumerate() {
            let slot = &input.slot;
            let fraction = input.cooling_fraction;
            let base = slot.base_load_mw;

            let headroom = batch_headroom_mw(problem, h).ok_or(OptimizationError::Infeasible {
                hour: Some(h),
                constraint: "cooling_sufficiency",
            })?;
            let candidates = candidate_modes(problem, h, headroom)?;

            let batch = vars.add(variable().min(0.0).max(headroom));
            let charge = vars.add(variable().min(0.0).max(limits.max_charge_mw));
            let discharge = vars.add(variable().min(0.0).max(limits.max_discharge_mw));
            let level = vars.add(variable().min(0.0).max(limits.storage_capacity_mwh));

            let mut delivered = Expression::default();
            let mut cooling_electricity = Expression::default();
            let mut water_gallons = Expression::default();
            let mut one_hot = Expression::default();
            let mut modes = Vec::with_capacity(candidates.len());

            for candidate in &candidates {
                let q = vars.add(variable().min(0.0).max(candidate.capacity_mw));
                let selected = if candidates.len() > 1 {
                    let y = vars.add(variable().binary());
                    constraints.push(constraint!(q <= candidate.capacity_mw * y));
                    one_hot += y;
                    binaries += 1;
                    Some(y)
                } else {
                    None
                };
                delivered += q;
                cooling_electricity += q * candidate.efficiency.electricity_mw_per_mwh_cooled;
                water_gallons += q * candidate.efficiency.water_gallons_per_mwh_cooled;
                modes.push((candidate.mode, selected, q));
            }
            if candidates.len() > 1 {
                constraints.push(constraint!(one_hot == 1.0));
            }

            // Cooling sufficiency
            let shortfall = if relaxation.is_relaxed() && !candidates.is_empty() {
                let s = vars.add(variable().min(0.0));
                let max_fraction = relaxation.max_fraction();
                constraints.push(constraint!(
                    s <= batch * (fraction * max_fraction) + base * fraction * max_fraction
                ));
                objective += s * (relaxation.penalty_per_mwh() * dt);
                delivered += s;
                Some(s)
            } else {
                None
            };
            if !candidates.is_empty() {
                constraints.push(constraint!(delivered == batch * fraction + base * fraction));
            }

            // Storage balance
            let flow = charge * dt - discharge * dt;
            constraints.push(match previous_level {
                Some(prev) => constraint!(level == flow + prev),
                None => constraint!(level == flow + limits.initial_level_mwh),
            });
            previous_level = Some(level);

            // No export
            let grid = cooling_electricity + batch + charge - discharge + base;
            constraints.push(constraint!(grid.clone() >= 0.0));

            objective += grid * (slot.electricity_price_per_mwh * dt);
            objective += water_gallons * (slot.water_price_per_kgal / 1000.0 * dt);
            batch_energy += batch * dt;

            hours.push(HourVars { batch, modes, shortfall, charge, discharge });
        }

        // Shiftable load conservation
        constraints.push(constraint!(batch_energy >= limits.required_batch_mwh));
        debug!(hours = problem.hours(), binaries, constraints = constraints.len(), "MILP model built");

        let mut model = vars.minimise(objective).using(default_solver);
        for c in constraints {
            model = model.with(c);
        }

        let solution = model.solve().map_err(|e| match e {
            ResolutionError::Infeasible => OptimizationError::Infeasible {
                hour: None,
                constraint: "cooling_sufficiency",
            },
            other => OptimizationError::Solver(other.to_string()),
        })?;

        Ok(hours
            .iter()
            .map(|vars| {
                let chosen = match vars.modes.as_slice() {
                    [] => None,
                    [only] => Some(only),
                    several => several.iter().max_by(|a, b| {
                        let value = |y: Option<Variable>| y.map(|y| solution.value(y)).unwrap_or(0.0);
                        value(a.1).total_cmp(&value(b.1))
                    }),
                };
                let (mode, cooling) = chosen
                    .map(|(mode, _, q)| (*mode, solution.value(*q)))
                    .unwrap_or((CoolingMode::Free, 0.0));
                let net = solution.value(vars.charge) - solution.value(vars.discharge);
                HourPlan {
                    batch_load_mw: solution.value(vars.batch),
                    mode,
                    cooling_delivered_mw: cooling,
                    shortfall_mw: vars.shortfall.map(|s| solution.value(s)).unwrap_or(0.0),
                    charge_mw: net.max(0.0),
                    discharge_mw: (-net).max(0.0),
                }
            })
            .collect())
    }

    #[cfg(not(feature = "optimization"))]
    fn solve_milp(&self, _problem: &DispatchProblem) -> Result<Vec<HourPlan>, OptimizationError> {
        Err(OptimizationError::Solver(
            "MILP dispatch requires the 'optimization' feature to be enabled".to_string(),
        ))
    }
}

impl DispatchStrategy for MilpDispatcher {
    fn name(&self) -> &'static str {
        "milp"
    }

    fn solve(&self, problem: &DispatchProblem) -> Result<DispatchPlan, OptimizationError> {
        if problem.hours() > 168 {
            tracing::warn!(
                hours = problem.hours(),
                "Large MILP horizon; the solve may hit its time limit"
            );
        }

        let hours = self.solve_milp(problem)?;
        debug!(hours = hours.len(), relaxed = problem.relaxation.is_relaxed(), "MILP solved");
        Ok(DispatchPlan { hours, status: OptimizationStatus::Optimal })
    }
}
