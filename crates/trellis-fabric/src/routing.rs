//! Path queries over the topology.
//!
//! Dijkstra over current link delay, plus a k node-disjoint variant
//! that repeatedly re-runs Dijkstra with a growing exclusion set. The
//! disjoint search trades optimality for robustness compared to Yen's
//! algorithm: after the first path, later paths may be longer than a
//! true k-shortest solution, but every returned pair is guaranteed
//! intermediate-node disjoint.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};

use crate::topology::Topology;

/// Heap entry ordered so the smallest cost pops first.
#[derive(Debug, Clone, Copy)]
struct Visit {
    cost: f64,
    node: u64,
}

impl PartialEq for Visit {
    fn eq(&self, other: &Self) -> bool {
        self.cost == other.cost && self.node == other.node
    }
}

impl Eq for Visit {}

impl Ord for Visit {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed: BinaryHeap is a max-heap, we want the cheapest visit.
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| other.node.cmp(&self.node))
    }
}

impl PartialOrd for Visit {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Single-source shortest path from `src` to `dst` over current link
/// delay. The exclusion set applies to intermediate hops only — `src`
/// and `dst` are traversed even when listed.
pub fn shortest_path(
    topology: &Topology,
    src: u64,
    dst: u64,
    exclude: &HashSet<u64>,
) -> Option<Vec<u64>> {
    if !topology.contains(src) || !topology.contains(dst) {
        return None;
    }
    if src == dst {
        return Some(vec![src]);
    }

    let mut dist: HashMap<u64, f64> = HashMap::new();
    let mut prev: HashMap<u64, u64> = HashMap::new();
    let mut heap = BinaryHeap::new();

    dist.insert(src, 0.0);
    heap.push(Visit {
        cost: 0.0,
        node: src,
    });

    while let Some(Visit { cost, node }) = heap.pop() {
        if node == dst {
            break;
        }
        if cost > *dist.get(&node).unwrap_or(&f64::INFINITY) {
            continue; // Stale heap entry.
        }

        for &(neighbour, link_idx) in topology.neighbours(node) {
            if neighbour != dst && exclude.contains(&neighbour) {
                continue;
            }
            let next_cost = cost + topology.links()[link_idx].delay_ms;
            if next_cost < *dist.get(&neighbour).unwrap_or(&f64::INFINITY) {
                dist.insert(neighbour, next_cost);
                prev.insert(neighbour, node);
                heap.push(Visit {
                    cost: next_cost,
                    node: neighbour,
                });
            }
        }
    }

    if !dist.contains_key(&dst) {
        return None;
    }

    let mut path = vec![dst];
    let mut cursor = dst;
    while let Some(&parent) = prev.get(&cursor) {
        path.push(parent);
        cursor = parent;
    }
    path.reverse();
    (path.first() == Some(&src)).then_some(path)
}

/// Up to `k` paths from `src` to `dst` whose intermediate nodes are
/// pairwise disjoint (`src` and `dst` may be shared). Each iteration
/// excludes the intermediates of everything found so far; the search
/// stops early once no further path exists.
pub fn k_disjoint_paths(
    topology: &Topology,
    src: u64,
    dst: u64,
    k: usize,
    exclude: &HashSet<u64>,
) -> Vec<Vec<u64>> {
    let mut paths = Vec::new();
    let mut excluded = exclude.clone();

    for _ in 0..k {
        let Some(path) = shortest_path(topology, src, dst, &excluded) else {
            break;
        };
        for &node in path.iter().filter(|&&n| n != src && n != dst) {
            excluded.insert(node);
        }
        paths.push(path);
    }

    paths
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::Topology;

    /// Two edge nodes, three parallel cores, two cloud nodes.
    fn parallel_core_topology() -> Topology {
        Topology::from_json(
            r#"{
            "nodes": [
                { "id": 1,  "tier": "edge" },
                { "id": 2,  "tier": "edge" },
                { "id": 10, "tier": "core" },
                { "id": 11, "tier": "core" },
                { "id": 12, "tier": "core" },
                { "id": 20, "tier": "cloud" },
                { "id": 21, "tier": "cloud" }
            ],
            "links": [
                { "u": 1, "v": 10, "bw_mbps": 100, "delay_ms": 5 },
                { "u": 1, "v": 11, "bw_mbps": 100, "delay_ms": 7 },
                { "u": 1, "v": 12, "bw_mbps": 100, "delay_ms": 9 },
                { "u": 2, "v": 10, "bw_mbps": 100, "delay_ms": 6 },
                { "u": 10, "v": 20, "bw_mbps": 100, "delay_ms": 4 },
                { "u": 11, "v": 20, "bw_mbps": 100, "delay_ms": 4 },
                { "u": 12, "v": 20, "bw_mbps": 100, "delay_ms": 4 },
                { "u": 10, "v": 21, "bw_mbps": 100, "delay_ms": 8 }
            ]
        }"#,
        )
        .unwrap()
    }

    // ─── Shortest path ──────────────────────────────────────────────────

    #[test]
    fn picks_minimum_delay_route() {
        let topo = parallel_core_topology();
        let path = shortest_path(&topo, 1, 20, &HashSet::new()).unwrap();
        assert_eq!(path, vec![1, 10, 20]);
    }

    #[test]
    fn honours_exclusions_for_intermediates() {
        let topo = parallel_core_topology();
        let exclude: HashSet<u64> = [10].into_iter().collect();
        let path = shortest_path(&topo, 1, 20, &exclude).unwrap();
        assert_eq!(path, vec![1, 11, 20]);
    }

    #[test]
    fn never_excludes_endpoints() {
        let topo = parallel_core_topology();
        let exclude: HashSet<u64> = [1, 20].into_iter().collect();
        let path = shortest_path(&topo, 1, 20, &exclude).unwrap();
        assert_eq!(path.first(), Some(&1));
        assert_eq!(path.last(), Some(&20));
    }

    #[test]
    fn returns_none_when_cut_off() {
        let topo = parallel_core_topology();
        let exclude: HashSet<u64> = [10, 11, 12].into_iter().collect();
        assert!(shortest_path(&topo, 1, 20, &exclude).is_none());
    }

    #[test]
    fn unknown_endpoint_yields_none() {
        let topo = parallel_core_topology();
        assert!(shortest_path(&topo, 1, 404, &HashSet::new()).is_none());
    }

    #[test]
    fn respects_injected_delay() {
        let mut topo = parallel_core_topology();
        // Make node 10 expensive; the route should move to core 11.
        topo.inject_node_latency_fault(10, 100.0).unwrap();
        let path = shortest_path(&topo, 1, 20, &HashSet::new()).unwrap();
        assert_eq!(path, vec![1, 11, 20]);
    }

    // ─── K-disjoint ─────────────────────────────────────────────────────

    #[test]
    fn disjoint_paths_share_no_intermediates() {
        let topo = parallel_core_topology();
        let paths = k_disjoint_paths(&topo, 1, 20, 3, &HashSet::new());
        assert_eq!(paths.len(), 3);

        let mut seen = HashSet::new();
        for path in &paths {
            for &node in path.iter().filter(|&&n| n != 1 && n != 20) {
                assert!(seen.insert(node), "node {node} appears in two paths");
            }
        }
    }

    #[test]
    fn disjoint_search_stops_when_exhausted() {
        let topo = parallel_core_topology();
        let paths = k_disjoint_paths(&topo, 1, 20, 10, &HashSet::new());
        // Only three parallel cores exist.
        assert_eq!(paths.len(), 3);
    }

    #[test]
    fn disjoint_search_carries_initial_exclusions() {
        let topo = parallel_core_topology();
        let exclude: HashSet<u64> = [10].into_iter().collect();
        let paths = k_disjoint_paths(&topo, 1, 20, 3, &exclude);
        assert!(!paths.is_empty());
        for path in &paths {
            assert!(!path.contains(&10), "excluded node 10 in {path:?}");
        }
    }

    #[test]
    fn first_disjoint_path_is_the_shortest() {
        let topo = parallel_core_topology();
        let paths = k_disjoint_paths(&topo, 1, 20, 3, &HashSet::new());
        assert_eq!(paths[0], vec![1, 10, 20]);
    }
}
