//! Path metrics and composite scoring.
//!
//! Score = `1000/latency + 10·capacity + 100/hops + 100·(1 − avg util)`.
//! The constants are part of the routing contract; consumers rely on
//! relative ordering, not absolute values.

use trellis_common::models::Tier;

use crate::topology::Topology;

/// Sum of current link delay along the path, in milliseconds.
/// A hop with no link contributes infinity, which sinks the path in
/// any score-ordered ranking.
pub fn path_latency_ms(topology: &Topology, path: &[u64]) -> f64 {
    path.windows(2)
        .map(|hop| {
            topology
                .link_between(hop[0], hop[1])
                .map(|l| l.delay_ms)
                .unwrap_or(f64::INFINITY)
        })
        .sum()
}

/// Bottleneck capacity: minimum of `bandwidth × (1 − utilisation)`
/// across the path's links, in Mbps. Zero for paths without links.
pub fn path_capacity_mbps(topology: &Topology, path: &[u64]) -> f64 {
    if path.len() < 2 {
        return 0.0;
    }
    path.windows(2)
        .map(|hop| {
            topology
                .link_between(hop[0], hop[1])
                .map(|l| l.bandwidth_mbps * (1.0 - l.utilisation))
                .unwrap_or(0.0)
        })
        .fold(f64::INFINITY, f64::min)
}

/// Composite path score; higher is better.
pub fn path_score(topology: &Topology, path: &[u64]) -> f64 {
    let hops = path.len().saturating_sub(1);
    if hops == 0 {
        return 0.0;
    }

    let latency = path_latency_ms(topology, path);
    if !latency.is_finite() {
        return 0.0;
    }

    let capacity = path_capacity_mbps(topology, path);
    let avg_utilisation = path
        .windows(2)
        .map(|hop| {
            topology
                .link_between(hop[0], hop[1])
                .map(|l| l.utilisation)
                .unwrap_or(1.0)
        })
        .sum::<f64>()
        / hops as f64;

    1000.0 / latency.max(1e-6)
        + 10.0 * capacity
        + 100.0 / hops as f64
        + 100.0 * (1.0 - avg_utilisation)
}

/// A path is valid iff its node tiers are non-decreasing under
/// edge < core < cloud, the first node is edge-tier, and the last is
/// cloud-tier. Unknown nodes invalidate the path.
pub fn is_valid_path(topology: &Topology, path: &[u64]) -> bool {
    let Some(&first) = path.first() else {
        return false;
    };
    let Some(&last) = path.last() else {
        return false;
    };

    let tier_of = |id: u64| topology.node(id).map(|n| n.tier);
    if tier_of(first) != Some(Tier::Edge) || tier_of(last) != Some(Tier::Cloud) {
        return false;
    }

    path.windows(2).all(|hop| {
        match (tier_of(hop[0]), tier_of(hop[1])) {
            (Some(a), Some(b)) => a.order() <= b.order(),
            _ => false,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::Topology;

    fn scored_topology() -> Topology {
        Topology::from_json(
            r#"{
            "nodes": [
                { "id": 1,  "tier": "edge" },
                { "id": 10, "tier": "core" },
                { "id": 11, "tier": "core" },
                { "id": 20, "tier": "cloud" }
            ],
            "links": [
                { "u": 1,  "v": 10, "bw_mbps": 100, "delay_ms": 5 },
                { "u": 1,  "v": 11, "bw_mbps": 50,  "delay_ms": 40 },
                { "u": 10, "v": 20, "bw_mbps": 100, "delay_ms": 5 },
                { "u": 11, "v": 20, "bw_mbps": 50,  "delay_ms": 40 },
                { "u": 1,  "v": 20, "bw_mbps": 10,  "delay_ms": 200 }
            ]
        }"#,
        )
        .unwrap()
    }

    // ─── Latency & capacity ─────────────────────────────────────────────

    #[test]
    fn latency_sums_current_delay() {
        let topo = scored_topology();
        assert!((path_latency_ms(&topo, &[1, 10, 20]) - 10.0).abs() < 1e-12);
    }

    #[test]
    fn latency_tracks_injected_faults() {
        let mut topo = scored_topology();
        topo.inject_node_latency_fault(10, 25.0).unwrap();
        assert!((path_latency_ms(&topo, &[1, 10, 20]) - 60.0).abs() < 1e-12);
    }

    #[test]
    fn capacity_is_the_bottleneck_link() {
        let mut topo = scored_topology();
        topo.set_link_utilisation(10, 20, 0.5).unwrap();
        // 100 * (1 - 0.5) = 50 on the second hop, 100 on the first.
        assert!((path_capacity_mbps(&topo, &[1, 10, 20]) - 50.0).abs() < 1e-12);
    }

    #[test]
    fn capacity_of_single_node_path_is_zero() {
        let topo = scored_topology();
        assert_eq!(path_capacity_mbps(&topo, &[1]), 0.0);
    }

    // ─── Scoring ────────────────────────────────────────────────────────

    #[test]
    fn faster_wider_path_scores_higher() {
        let topo = scored_topology();
        let fast = path_score(&topo, &[1, 10, 20]);
        let slow = path_score(&topo, &[1, 11, 20]);
        assert!(fast > slow, "fast={fast}, slow={slow}");
    }

    #[test]
    fn utilisation_lowers_the_score() {
        let mut topo = scored_topology();
        let before = path_score(&topo, &[1, 10, 20]);
        topo.set_link_utilisation(1, 10, 0.9).unwrap();
        topo.set_link_utilisation(10, 20, 0.9).unwrap();
        let after = path_score(&topo, &[1, 10, 20]);
        assert!(after < before, "before={before}, after={after}");
    }

    #[test]
    fn score_of_broken_path_is_zero() {
        let topo = scored_topology();
        assert_eq!(path_score(&topo, &[1, 99, 20]), 0.0);
        assert_eq!(path_score(&topo, &[1]), 0.0);
    }

    // ─── Tier validity ──────────────────────────────────────────────────

    #[test]
    fn valid_path_requires_edge_to_cloud() {
        let topo = scored_topology();
        assert!(is_valid_path(&topo, &[1, 10, 20]));
        assert!(is_valid_path(&topo, &[1, 20]));
        // Starts in core.
        assert!(!is_valid_path(&topo, &[10, 20]));
        // Ends in core.
        assert!(!is_valid_path(&topo, &[1, 10]));
    }

    #[test]
    fn tier_order_must_be_non_decreasing() {
        let topo = Topology::from_json(
            r#"{
            "nodes": [
                { "id": 1, "tier": "edge" },
                { "id": 2, "tier": "core" },
                { "id": 3, "tier": "edge" },
                { "id": 4, "tier": "cloud" }
            ],
            "links": [
                { "u": 1, "v": 2, "bw_mbps": 100, "delay_ms": 5 },
                { "u": 2, "v": 3, "bw_mbps": 100, "delay_ms": 5 },
                { "u": 3, "v": 4, "bw_mbps": 100, "delay_ms": 5 }
            ]
        }"#,
        )
        .unwrap();
        // Dips back to edge tier mid-path.
        assert!(!is_valid_path(&topo, &[1, 2, 3, 4]));
    }

    #[test]
    fn empty_and_unknown_paths_are_invalid() {
        let topo = scored_topology();
        assert!(!is_valid_path(&topo, &[]));
        assert!(!is_valid_path(&topo, &[1, 404, 20]));
    }
}
