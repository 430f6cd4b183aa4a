//! # Trellis Fabric — Topology Store & Graph Engine
//!
//! Owns the overlay graph the gateway routes across: nodes in three
//! tiers (edge → core → cloud), undirected links with delay/bandwidth/
//! loss attributes, and the queries the failover controller needs —
//! shortest path, k node-disjoint paths, path scoring, and tier-order
//! validation. Latency fault knobs mutate link delay in place so the
//! same graph serves both live routing and failure drills.

pub mod routing;
pub mod score;
pub mod topology;

pub use routing::{k_disjoint_paths, shortest_path};
pub use score::{is_valid_path, path_capacity_mbps, path_latency_ms, path_score};
pub use topology::{Link, Node, Topology};
