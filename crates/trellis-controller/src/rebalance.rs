//! # Rebalancer
//!
//! When per-path telemetry shows degradation, traffic is redistributed:
//! degraded paths are pinned to a residual share, surviving paths keep
//! their relative proportions scaled up to fill the rest, and the
//! graph engine is asked for node-disjoint alternatives that avoid the
//! bottleneck nodes common to the degraded set.

use std::collections::{BTreeMap, HashSet};

use quanta::Instant;
use tracing::{debug, warn};

use trellis_common::GatewayError;
use trellis_fabric::{is_valid_path, k_disjoint_paths, path_score, Topology};

use crate::config::ControllerConfig;
use crate::registry::{PathMetrics, PathRegistry};

/// Post-normalisation budget: Σ load must land within this of 100.
pub const LOAD_SUM_TOLERANCE: f64 = 0.01;

/// What a rebalance pass decided.
#[derive(Debug, Clone)]
pub struct RebalancePlan {
    /// Paths that transitioned to degraded during this scan.
    pub newly_degraded: Vec<u64>,
    /// Every currently degraded path.
    pub degraded: Vec<u64>,
    /// Bottleneck nodes shared across the degraded set, most-common first.
    pub bottlenecks: Vec<u64>,
    /// Valid node-disjoint alternatives avoiding the bottlenecks,
    /// best-scoring first. Empty when the search came up dry.
    pub alternatives: Vec<Vec<u64>>,
    /// The distribution applied to the registry.
    pub distribution: BTreeMap<u64, f64>,
}

/// Nodes appearing in at least `max(2, ⌈|D|/2⌉)` of the degraded
/// paths' unique intermediate sets, sorted by occurrence count
/// descending (ties by node id). Endpoints never qualify. With a
/// single degraded path the threshold stays 2, so no bottleneck is
/// inferable — the caller falls through to plain redistribution.
pub fn find_common_nodes(degraded: &[&PathMetrics]) -> Vec<u64> {
    let mut counts: BTreeMap<u64, usize> = BTreeMap::new();
    for path in degraded {
        let unique: HashSet<u64> = path.intermediates().iter().copied().collect();
        for node in unique {
            *counts.entry(node).or_default() += 1;
        }
    }

    let threshold = 2usize.max((degraded.len() as f64 * 0.5).ceil() as usize);
    let mut hits: Vec<(u64, usize)> = counts
        .into_iter()
        .filter(|&(_, count)| count >= threshold)
        .collect();
    hits.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    hits.into_iter().map(|(node, _)| node).collect()
}

/// Scale a distribution so it sums to 100 within [`LOAD_SUM_TOLERANCE`].
pub fn renormalise(distribution: &mut BTreeMap<u64, f64>) {
    let sum: f64 = distribution.values().sum();
    if sum <= f64::EPSILON {
        return;
    }
    if (sum - 100.0).abs() > LOAD_SUM_TOLERANCE {
        let factor = 100.0 / sum;
        for value in distribution.values_mut() {
            *value *= factor;
        }
    }
}

/// Rebuild the load split: each degraded path is pinned to
/// `residual_pct`; the others keep their relative share of the prior
/// healthy mass, scaled to fill the remainder. When every path is
/// degraded the split is uniform — the last-resort hedge.
pub fn rebuild_distribution(
    current: &BTreeMap<u64, f64>,
    degraded: &HashSet<u64>,
    residual_pct: f64,
) -> BTreeMap<u64, f64> {
    let mut next = BTreeMap::new();
    if current.is_empty() {
        return next;
    }

    let survivors: Vec<u64> = current
        .keys()
        .copied()
        .filter(|id| !degraded.contains(id))
        .collect();

    if survivors.is_empty() {
        let even = 100.0 / current.len() as f64;
        for &id in current.keys() {
            next.insert(id, even);
        }
        renormalise(&mut next);
        return next;
    }

    let degraded_count = current.len() - survivors.len();
    let healthy_total = 100.0 - residual_pct * degraded_count as f64;
    let healthy_mass: f64 = survivors.iter().map(|id| current[id]).sum();

    for (&id, &load) in current {
        if degraded.contains(&id) {
            next.insert(id, residual_pct);
        } else if healthy_mass > f64::EPSILON {
            next.insert(id, load / healthy_mass * healthy_total);
        } else {
            next.insert(id, healthy_total / survivors.len() as f64);
        }
    }

    renormalise(&mut next);
    next
}

/// Scan the registry for fresh degradation and, if any path
/// transitioned, compute and apply the failover distribution.
///
/// Returns `None` when nothing newly degraded — an already-degraded
/// set keeps its pinned distribution without re-planning.
pub fn evaluate(
    registry: &mut PathRegistry,
    topology: &Topology,
    config: &ControllerConfig,
    now: Instant,
) -> Option<RebalancePlan> {
    let t = config.thresholds.ewma_max_ms;
    let s = config.thresholds.slope_min_ms_per_s;

    let drifting: Vec<u64> = registry
        .iter()
        .filter(|p| p.window.ewma().is_some_and(|e| e > t) && p.window.slope() >= s)
        .map(|p| p.id)
        .collect();

    let mut newly_degraded = Vec::new();
    for id in drifting {
        if registry.mark_degraded(id, now) {
            newly_degraded.push(id);
        }
    }
    if newly_degraded.is_empty() {
        return None;
    }

    let degraded_ids = registry.degraded_ids();
    let degraded_set: HashSet<u64> = degraded_ids.iter().copied().collect();
    let degraded_paths: Vec<&PathMetrics> = registry
        .iter()
        .filter(|p| degraded_set.contains(&p.id))
        .collect();

    let bottlenecks = find_common_nodes(&degraded_paths);

    // Alternatives share the degraded set's endpoints; the search
    // avoids the bottlenecks as intermediates.
    let alternatives = match degraded_paths
        .first()
        .and_then(|p| p.src().zip(p.dst()))
    {
        Some((src, dst)) => {
            let exclude: HashSet<u64> = bottlenecks.iter().copied().collect();
            let mut found: Vec<Vec<u64>> =
                k_disjoint_paths(topology, src, dst, config.k_alternatives, &exclude)
                    .into_iter()
                    .filter(|p| is_valid_path(topology, p))
                    .collect();
            found.sort_by(|a, b| {
                path_score(topology, b).total_cmp(&path_score(topology, a))
            });
            found
        }
        None => Vec::new(),
    };

    if alternatives.is_empty() {
        let error = GatewayError::RebalanceInfeasible("no valid alternative path".into());
        warn!(
            degraded = ?degraded_ids,
            %error,
            "redistributing over registered paths only"
        );
    }

    let distribution =
        rebuild_distribution(&registry.loads(), &degraded_set, config.residual_load_pct);
    for (&id, &load) in &distribution {
        registry.set_load(id, load);
    }

    debug!(
        newly = ?newly_degraded,
        bottlenecks = ?bottlenecks,
        alternatives = alternatives.len(),
        "rebalance applied"
    );

    Some(RebalancePlan {
        newly_degraded,
        degraded: degraded_ids,
        bottlenecks,
        alternatives,
        distribution,
    })
}
