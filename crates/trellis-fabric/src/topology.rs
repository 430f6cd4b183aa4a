//! Topology store.
//!
//! Loads the JSON topology descriptor, materialises bidirectional
//! adjacency over a shared link arena (both directions of a link index
//! the same record, so delay and utilisation updates are observed
//! symmetrically), and exposes the fault knobs used by the latency
//! injection endpoints.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::Path;

use serde::Deserialize;
use tracing::{debug, info};

use trellis_common::models::Tier;
use trellis_common::GatewayError;

// ── Descriptor (wire form) ──────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct TopologyDescriptor {
    nodes: Vec<NodeDescriptor>,
    links: Vec<LinkDescriptor>,
}

#[derive(Debug, Deserialize)]
struct NodeDescriptor {
    id: u64,
    tier: Tier,
    #[serde(default)]
    quality: String,
    #[serde(default)]
    physical_map: String,
    #[serde(default)]
    cpu_ev_sec: Option<f64>,
    #[serde(default)]
    buffer_size: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct LinkDescriptor {
    u: u64,
    v: u64,
    bw_mbps: f64,
    delay_ms: f64,
    #[serde(default)]
    jitter_ms: f64,
    #[serde(default)]
    loss_rate: f64,
}

// ── In-memory graph ─────────────────────────────────────────────────

/// A fabric node. Loaded once from the descriptor, never destroyed;
/// only `utilisation` is mutated afterwards.
#[derive(Debug, Clone)]
pub struct Node {
    pub id: u64,
    pub tier: Tier,
    pub quality: String,
    /// Coarse-grained external tier name (downstream URL key).
    pub physical_map: String,
    pub cpu_ev_sec: Option<f64>,
    pub buffer_size: Option<u64>,
    /// Current utilisation [0, 1].
    pub utilisation: f64,
}

/// An undirected link. Invariant: `delay_ms >= base_delay_ms`;
/// removing a fault restores `delay_ms` to `base_delay_ms` exactly.
#[derive(Debug, Clone)]
pub struct Link {
    pub a: u64,
    pub b: u64,
    pub bandwidth_mbps: f64,
    /// Current one-way delay, including any injected fault.
    pub delay_ms: f64,
    /// Snapshot taken at load time; the restore target for fault removal.
    pub base_delay_ms: f64,
    pub jitter_ms: f64,
    pub loss_rate: f64,
    /// Current utilisation [0, 1].
    pub utilisation: f64,
}

impl Link {
    pub fn touches(&self, node: u64) -> bool {
        self.a == node || self.b == node
    }

    /// The endpoint opposite `node`.
    pub fn other(&self, node: u64) -> u64 {
        if self.a == node {
            self.b
        } else {
            self.a
        }
    }
}

/// The overlay graph. Read-only after load except for utilisation
/// fields and the latency fault knobs.
#[derive(Debug, Clone)]
pub struct Topology {
    nodes: HashMap<u64, Node>,
    links: Vec<Link>,
    /// node id → (neighbour id, index into `links`), both directions.
    adjacency: HashMap<u64, Vec<(u64, usize)>>,
}

impl Topology {
    /// Parse and validate a JSON topology descriptor.
    pub fn from_json(text: &str) -> Result<Self, GatewayError> {
        let descriptor: TopologyDescriptor = serde_json::from_str(text)
            .map_err(|e| GatewayError::TopologyLoad(format!("descriptor parse error: {e}")))?;
        Self::build(descriptor)
    }

    /// Load a topology descriptor from disk. Failure is fatal to startup.
    pub fn from_file(path: &Path) -> Result<Self, GatewayError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            GatewayError::TopologyLoad(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json(&text)
    }

    fn build(descriptor: TopologyDescriptor) -> Result<Self, GatewayError> {
        if descriptor.nodes.is_empty() {
            return Err(GatewayError::TopologyLoad("no nodes in descriptor".into()));
        }

        let mut nodes = HashMap::with_capacity(descriptor.nodes.len());
        for n in descriptor.nodes {
            let node = Node {
                id: n.id,
                tier: n.tier,
                quality: n.quality,
                physical_map: n.physical_map,
                cpu_ev_sec: n.cpu_ev_sec,
                buffer_size: n.buffer_size,
                utilisation: 0.0,
            };
            if nodes.insert(n.id, node).is_some() {
                return Err(GatewayError::TopologyLoad(format!(
                    "duplicate node id {}",
                    n.id
                )));
            }
        }

        let mut links = Vec::with_capacity(descriptor.links.len());
        let mut adjacency: HashMap<u64, Vec<(u64, usize)>> = HashMap::new();
        for l in descriptor.links {
            for endpoint in [l.u, l.v] {
                if !nodes.contains_key(&endpoint) {
                    return Err(GatewayError::TopologyLoad(format!(
                        "link {}-{} references unknown node {endpoint}",
                        l.u, l.v
                    )));
                }
            }
            let idx = links.len();
            links.push(Link {
                a: l.u,
                b: l.v,
                bandwidth_mbps: l.bw_mbps,
                delay_ms: l.delay_ms,
                base_delay_ms: l.delay_ms,
                jitter_ms: l.jitter_ms,
                loss_rate: l.loss_rate.clamp(0.0, 1.0),
                utilisation: 0.0,
            });
            adjacency.entry(l.u).or_default().push((l.v, idx));
            adjacency.entry(l.v).or_default().push((l.u, idx));
        }

        let topology = Topology {
            nodes,
            links,
            adjacency,
        };

        if !topology.has_edge_to_cloud_route() {
            return Err(GatewayError::TopologyLoad(
                "no route from any edge node to any cloud node".into(),
            ));
        }

        info!(
            nodes = topology.nodes.len(),
            links = topology.links.len(),
            "topology loaded"
        );
        Ok(topology)
    }

    /// Multi-source BFS from every edge node; the graph is viable iff
    /// some cloud node is reachable.
    fn has_edge_to_cloud_route(&self) -> bool {
        let mut queue: VecDeque<u64> = self
            .nodes
            .values()
            .filter(|n| n.tier == Tier::Edge)
            .map(|n| n.id)
            .collect();
        let mut seen: HashSet<u64> = queue.iter().copied().collect();

        while let Some(id) = queue.pop_front() {
            if self.nodes[&id].tier == Tier::Cloud {
                return true;
            }
            for &(neighbour, _) in self.neighbours(id) {
                if seen.insert(neighbour) {
                    queue.push_back(neighbour);
                }
            }
        }
        false
    }

    // ── Lookups ─────────────────────────────────────────────────

    pub fn node(&self, id: u64) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn contains(&self, id: u64) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    /// Node ids in the given tier, sorted for deterministic iteration.
    pub fn nodes_in_tier(&self, tier: Tier) -> Vec<u64> {
        let mut ids: Vec<u64> = self
            .nodes
            .values()
            .filter(|n| n.tier == tier)
            .map(|n| n.id)
            .collect();
        ids.sort_unstable();
        ids
    }

    pub fn neighbours(&self, id: u64) -> &[(u64, usize)] {
        self.adjacency.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn link_between(&self, a: u64, b: u64) -> Option<&Link> {
        self.neighbours(a)
            .iter()
            .find(|&&(neighbour, _)| neighbour == b)
            .map(|&(_, idx)| &self.links[idx])
    }

    // ── Point updates ───────────────────────────────────────────

    pub fn set_node_utilisation(&mut self, id: u64, utilisation: f64) -> Result<(), GatewayError> {
        let node = self
            .nodes
            .get_mut(&id)
            .ok_or(GatewayError::UnknownNode(id))?;
        node.utilisation = utilisation.clamp(0.0, 1.0);
        Ok(())
    }

    pub fn set_link_utilisation(
        &mut self,
        a: u64,
        b: u64,
        utilisation: f64,
    ) -> Result<(), GatewayError> {
        let idx = self
            .neighbours(a)
            .iter()
            .find(|&&(neighbour, _)| neighbour == b)
            .map(|&(_, idx)| idx)
            .ok_or(GatewayError::UnknownNode(b))?;
        self.links[idx].utilisation = utilisation.clamp(0.0, 1.0);
        Ok(())
    }

    // ── Fault knobs ─────────────────────────────────────────────

    /// Add `delta_ms` to the current delay of every link incident to
    /// `node`. Returns the number of links affected.
    pub fn inject_node_latency_fault(
        &mut self,
        node: u64,
        delta_ms: f64,
    ) -> Result<usize, GatewayError> {
        if !self.contains(node) {
            return Err(GatewayError::UnknownNode(node));
        }
        let mut affected = 0;
        for link in self.links.iter_mut().filter(|l| l.touches(node)) {
            link.delay_ms += delta_ms;
            affected += 1;
        }
        debug!(node_id = %node, delta_ms, affected, "latency fault injected");
        Ok(affected)
    }

    /// Restore every link incident to `node` to its base delay.
    /// Returns the number of links affected.
    pub fn remove_node_latency_fault(&mut self, node: u64) -> Result<usize, GatewayError> {
        if !self.contains(node) {
            return Err(GatewayError::UnknownNode(node));
        }
        let mut affected = 0;
        for link in self.links.iter_mut().filter(|l| l.touches(node)) {
            link.delay_ms = link.base_delay_ms;
            affected += 1;
        }
        debug!(node_id = %node, affected, "latency fault removed");
        Ok(affected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn three_tier_json() -> &'static str {
        r#"{
            "nodes": [
                { "id": 1, "tier": "edge",  "quality": "high", "physical_map": "n1", "cpu_ev_sec": 100 },
                { "id": 9, "tier": "core",  "quality": "high", "physical_map": "n2" },
                { "id": 19, "tier": "cloud", "quality": "high", "physical_map": "n3" }
            ],
            "links": [
                { "u": 1, "v": 9,  "bw_mbps": 100, "delay_ms": 5, "jitter_ms": 1, "loss_rate": 0.001 },
                { "u": 9, "v": 19, "bw_mbps": 200, "delay_ms": 8, "jitter_ms": 2, "loss_rate": 0.002 }
            ]
        }"#
    }

    // ─── Loading ────────────────────────────────────────────────────────

    #[test]
    fn loads_descriptor_and_builds_adjacency() {
        let topo = Topology::from_json(three_tier_json()).unwrap();
        assert_eq!(topo.node_count(), 3);
        assert_eq!(topo.link_count(), 2);
        assert_eq!(topo.neighbours(9).len(), 2);
        assert_eq!(topo.node(1).unwrap().tier, Tier::Edge);
        assert!((topo.node(1).unwrap().utilisation - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn rejects_link_to_unknown_node() {
        let raw = r#"{
            "nodes": [
                { "id": 1, "tier": "edge" },
                { "id": 2, "tier": "cloud" }
            ],
            "links": [
                { "u": 1, "v": 2, "bw_mbps": 100, "delay_ms": 5 },
                { "u": 1, "v": 99, "bw_mbps": 100, "delay_ms": 5 }
            ]
        }"#;
        assert!(matches!(
            Topology::from_json(raw),
            Err(GatewayError::TopologyLoad(_))
        ));
    }

    #[test]
    fn rejects_disconnected_tiers() {
        let raw = r#"{
            "nodes": [
                { "id": 1, "tier": "edge" },
                { "id": 2, "tier": "core" },
                { "id": 3, "tier": "cloud" }
            ],
            "links": [
                { "u": 1, "v": 2, "bw_mbps": 100, "delay_ms": 5 }
            ]
        }"#;
        assert!(matches!(
            Topology::from_json(raw),
            Err(GatewayError::TopologyLoad(_))
        ));
    }

    #[test]
    fn rejects_duplicate_node_ids() {
        let raw = r#"{
            "nodes": [
                { "id": 1, "tier": "edge" },
                { "id": 1, "tier": "cloud" }
            ],
            "links": [
                { "u": 1, "v": 1, "bw_mbps": 100, "delay_ms": 5 }
            ]
        }"#;
        assert!(Topology::from_json(raw).is_err());
    }

    // ─── Shared link records ────────────────────────────────────────────

    #[test]
    fn link_updates_are_observed_from_both_directions() {
        let mut topo = Topology::from_json(three_tier_json()).unwrap();
        topo.set_link_utilisation(9, 1, 0.4).unwrap();
        assert!((topo.link_between(1, 9).unwrap().utilisation - 0.4).abs() < 1e-12);
        assert!((topo.link_between(9, 1).unwrap().utilisation - 0.4).abs() < 1e-12);
    }

    // ─── Fault knobs ────────────────────────────────────────────────────

    #[test]
    fn inject_then_remove_restores_exact_delay() {
        let mut topo = Topology::from_json(three_tier_json()).unwrap();
        let before: Vec<f64> = topo.links().iter().map(|l| l.delay_ms).collect();

        let affected = topo.inject_node_latency_fault(9, 50.0).unwrap();
        assert_eq!(affected, 2);
        assert!((topo.link_between(1, 9).unwrap().delay_ms - 55.0).abs() < 1e-12);
        assert!((topo.link_between(9, 19).unwrap().delay_ms - 58.0).abs() < 1e-12);

        topo.remove_node_latency_fault(9).unwrap();
        let after: Vec<f64> = topo.links().iter().map(|l| l.delay_ms).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn double_injection_stacks_but_remove_restores_base() {
        let mut topo = Topology::from_json(three_tier_json()).unwrap();
        topo.inject_node_latency_fault(9, 20.0).unwrap();
        topo.inject_node_latency_fault(9, 30.0).unwrap();
        assert!((topo.link_between(1, 9).unwrap().delay_ms - 55.0).abs() < 1e-12);

        topo.remove_node_latency_fault(9).unwrap();
        assert!((topo.link_between(1, 9).unwrap().delay_ms - 5.0).abs() < 1e-12);
    }

    #[test]
    fn fault_on_unknown_node_is_an_error() {
        let mut topo = Topology::from_json(three_tier_json()).unwrap();
        assert!(matches!(
            topo.inject_node_latency_fault(404, 10.0),
            Err(GatewayError::UnknownNode(404))
        ));
    }

    // ─── Tier queries ───────────────────────────────────────────────────

    #[test]
    fn nodes_in_tier_is_sorted() {
        let raw = r#"{
            "nodes": [
                { "id": 5, "tier": "edge" },
                { "id": 2, "tier": "edge" },
                { "id": 9, "tier": "cloud" }
            ],
            "links": [
                { "u": 2, "v": 9, "bw_mbps": 100, "delay_ms": 5 },
                { "u": 5, "v": 9, "bw_mbps": 100, "delay_ms": 5 }
            ]
        }"#;
        let topo = Topology::from_json(raw).unwrap();
        assert_eq!(topo.nodes_in_tier(Tier::Edge), vec![2, 5]);
    }
}
