use super::DispatchLimits;
use crate::domain::StorageState;

/// Coarsest storage grid resolution: capacity is split into at least this many steps.
const LEVEL_STEPS: usize = 40;

/// Grid step in MWh: no wider than one hour at the slower of the two rates.
fn level_step(limits: &DispatchLimits, capacity: f64) -> f64 {
    let dt = limits.step_hours;
    [capacity / LEVEL_STEPS as f64, limits.max_charge_mw * dt, limits.max_discharge_mw * dt]
        .into_iter()
        .filter(|step| *step > limits.epsilon)
        .fold(capacity, f64::min)
}

/// Discrete storage levels, anchored so the initial level is one of them.
/// Returns the levels, the index of the initial one, and the grid step.
fn storage_levels(limits: &DispatchLimits) -> (Vec<f64>, usize, f64) {
    let capacity = limits.storage_capacity_mwh.max(0.0);
    let initial = limits.initial_level_mwh.clamp(0.0, capacity);
    if capacity <= limits.epsilon {
        return (vec![initial], 0, capacity);
    }

    let step = level_step(limits, capacity);
    let below = (initial / step + 1e-9).floor() as usize;
    let above = ((capacity - initial) / step + 1e-9).floor() as usize;
    let levels = (0..=below + above)
        .map(|i| (initial + (i as f64 - below as f64) * step).clamp(0.0, capacity))
        .collect();
    (levels, below, step)
}

/// Cheapest storage schedule over the horizon by dynamic programming on discrete levels.
///
/// `grid_mw[t]` is the draw before storage in hour `t`; discharge may not exceed it.
pub fn schedule_storage(limits: &DispatchLimits, prices: &[f64], grid_mw: &[f64]) -> Vec<StorageState> {
    let n = prices.len();
    let (levels, start, step) = storage_levels(limits);
    let states = levels.len();
    let dt = limits.step_hours;
    let eps = limits.epsilon;
    // Grid levels one hour of charge or discharge can cross.
    let (up, down) = if step > eps {
        (
            (limits.max_charge_mw * dt / step + 1e-9).floor() as usize,
            (limits.max_discharge_mw * dt / step + 1e-9).floor() as usize,
        )
    } else {
        (0, 0)
    };

    let mut dp = vec![vec![f64::INFINITY; states]; n + 1];
    let mut prev = vec![vec![None; states]; n + 1];
    dp[0][start] = 0.0;

    for t in 0..n {
        for to in 0..states {
            // idle first so ties keep the storage still
            let window = to.saturating_sub(up)..(to + down + 1).min(states);
            for from in std::iter::once(to).chain(window.filter(|s| *s != to)) {
                let cur = dp[t][from];
                if !cur.is_finite() {
                    continue;
                }
                let delta_mwh = levels[to] - levels[from];
                let rate = delta_mwh / dt;
                let allowed = if rate >= 0.0 {
                    rate <= limits.max_charge_mw + eps
                } else {
                    -rate <= limits.max_discharge_mw + eps && -rate <= grid_mw[t] + eps
                };
                if !allowed {
                    continue;
                }
                let cost = cur + prices[t] * delta_mwh;
                if cost < dp[t + 1][to] - 1e-12 {
                    dp[t + 1][to] = cost;
                    prev[t + 1][to] = Some(from);
                }
            }
        }
    }

    let mut best = (0..states)
        .filter(|s| dp[n][*s].is_finite())
        .min_by(|a, b| dp[n][*a].total_cmp(&dp[n][*b]))
        .unwrap_or(start);

    let mut schedule = Vec::with_capacity(n);
    for t in (1..=n).rev() {
        // Holding the level is always allowed, so every reachable state has a predecessor.
        let from = prev[t][best].unwrap_or(best);
        let rate = (levels[best] - levels[from]) / dt;
        schedule.push(StorageState {
            level_mwh: levels[best],
            charge_mw: rate.max(0.0),
            discharge_mw: (-rate).max(0.0),
        });
        best = from;
    }
    schedule.reverse();
    schedule
}
