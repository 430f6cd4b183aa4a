//! # Gradual Revert Scheduler
//!
//! Once paths recover, load walks back to the optimal distribution in
//! N discrete linear-interpolation steps spread over the transition
//! window, each step renormalised to a 100 % sum. The caller applies
//! each step at its timestamp; applying a step that matches the
//! current distribution is a no-op.

use std::collections::BTreeMap;

use quanta::Instant;
use tracing::debug;

use trellis_common::models::PathStatus;

use crate::config::ControllerConfig;
use crate::rebalance::renormalise;
use crate::registry::PathRegistry;

/// Ignore distribution differences at or below this (percentage points).
const REVERT_DIFF_THRESHOLD: f64 = 1.0;

/// One scheduled step of a gradual revert.
#[derive(Debug, Clone)]
pub struct RevertStep {
    /// 1-based step index.
    pub index: usize,
    /// When the step should be applied.
    pub at: Instant,
    pub distribution: BTreeMap<u64, f64>,
}

/// A full transition: `steps.len()` == configured step count, evenly
/// spaced across the transition duration.
#[derive(Debug, Clone)]
pub struct RevertSchedule {
    pub steps: Vec<RevertStep>,
}

impl RevertSchedule {
    pub fn final_distribution(&self) -> Option<&BTreeMap<u64, f64>> {
        self.steps.last().map(|s| &s.distribution)
    }
}

/// Plan a gradual revert toward the optimal distribution (or a uniform
/// split when every path is degraded — flat hedging beats chasing an
/// optimum that assumed healthy paths).
///
/// Returns `None` when the registry is empty or the current
/// distribution is already within one percentage point of the target
/// on every path. Recovery transitions are the caller's job; run them
/// first so newly recovered paths count.
pub fn plan(
    registry: &PathRegistry,
    config: &ControllerConfig,
    now: Instant,
) -> Option<RevertSchedule> {
    if registry.is_empty() {
        return None;
    }

    let current = registry.loads();
    let target: BTreeMap<u64, f64> = if registry.all_degraded() {
        let even = 100.0 / registry.len() as f64;
        current.keys().map(|&id| (id, even)).collect()
    } else {
        // A revert needs somewhere to put the load: at least one path
        // not stuck degraded.
        let movable = registry
            .iter()
            .any(|p| matches!(p.status, PathStatus::Healthy | PathStatus::Recovering));
        if !movable {
            return None;
        }
        current
            .keys()
            .map(|&id| (id, registry.optimal().get(&id).copied().unwrap_or(0.0)))
            .collect()
    };

    let max_diff = current
        .iter()
        .map(|(id, &load)| (load - target[id]).abs())
        .fold(0.0, f64::max);
    if max_diff <= REVERT_DIFF_THRESHOLD {
        return None;
    }

    let n = config.transition_steps.max(1);
    let mut steps = Vec::with_capacity(n);
    for i in 1..=n {
        let fraction = i as f64 / n as f64;
        let mut distribution: BTreeMap<u64, f64> = current
            .iter()
            .map(|(&id, &load)| (id, load + (target[&id] - load) * fraction))
            .collect();
        renormalise(&mut distribution);
        steps.push(RevertStep {
            index: i,
            at: now + config.transition_duration.mul_f64(fraction),
            distribution,
        });
    }

    debug!(
        steps = steps.len(),
        window_s = config.transition_duration.as_secs_f64(),
        max_diff,
        "gradual revert scheduled"
    );
    Some(RevertSchedule { steps })
}

/// Apply one step's distribution. Returns true when any load actually
/// changed — re-applying an identical distribution is a no-op.
pub fn apply_step(registry: &mut PathRegistry, step: &RevertStep) -> bool {
    let mut changed = false;
    for (&id, &load) in &step.distribution {
        let differs = registry
            .get(id)
            .is_some_and(|p| (p.load_pct - load).abs() > 1e-9);
        if differs {
            registry.set_load(id, load);
            changed = true;
        }
    }
    changed
}
