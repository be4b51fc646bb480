//! Dispatch strategies
//!
//! - Heuristic: greedy batch placement, mode lookup, storage by dynamic programming
//! - MILP: mixed-integer linear programming over the whole horizon (exact solution)

pub mod heuristic;
pub mod milp;

pub use heuristic::*;
pub use milp::*;

use std::sync::Arc;

use super::DispatchStrategy;
use crate::config::StrategyKind;

pub fn strategy_for(kind: StrategyKind) -> Arc<dyn DispatchStrategy> {
    match kind {
        StrategyKind::Milp => Arc::new(MilpDispatcher),
        StrategyKind::Heuristic => Arc::new(HeuristicDispatcher),
    }
}
