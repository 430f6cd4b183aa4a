//! Core data models for the Trellis gateway.
//!
//! These types are shared between the fabric (topology), the controller
//! (telemetry and failover logic), and the gateway (HTTP surface).

use serde::{Deserialize, Serialize};

// ── Tier ────────────────────────────────────────────────────────────

/// Overlay tier of a node. Traffic flows edge → core → cloud; a valid
/// path's tiers are non-decreasing under this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Edge,
    Core,
    Cloud,
}

impl Tier {
    /// Position in the tier order (edge < core < cloud).
    pub fn order(self) -> u8 {
        match self {
            Tier::Edge => 0,
            Tier::Core => 1,
            Tier::Cloud => 2,
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Tier::Edge => write!(f, "edge"),
            Tier::Core => write!(f, "core"),
            Tier::Cloud => write!(f, "cloud"),
        }
    }
}

impl std::str::FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "edge" => Ok(Tier::Edge),
            "core" => Ok(Tier::Core),
            "cloud" => Ok(Tier::Cloud),
            other => Err(format!("unknown tier: {other}")),
        }
    }
}

// ── Modes ───────────────────────────────────────────────────────────

/// How batches traverse the fabric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingMode {
    /// Three-node linear (or bypass) path with per-link delay/loss simulation.
    Physical,
    /// Weighted sampling over the registered overlay paths.
    Virtual,
}

/// Failover execution strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailoverMode {
    Reactive,
    Warm,
    /// Standby capacity must spin up: a simulated 400–700 ms delay is
    /// charged against MTTR before the failover completes.
    Cold,
    Predictive,
}

/// Which end of the fabric the gateway prefers as the first hop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrimaryTier {
    Edge,
    Cloud,
}

// ── Path health ─────────────────────────────────────────────────────

/// Health state of a registered path.
///
/// Transitions: `Healthy → Degraded` on sustained latency drift,
/// `Degraded → Recovering` after the recovery hold expires,
/// `Recovering → Healthy` after the stability window. A recovering
/// path that drifts again drops straight back to `Degraded`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathStatus {
    Healthy,
    Degraded,
    Recovering,
}

impl std::fmt::Display for PathStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathStatus::Healthy => write!(f, "healthy"),
            PathStatus::Degraded => write!(f, "degraded"),
            PathStatus::Recovering => write!(f, "recovering"),
        }
    }
}

// ── Node health ─────────────────────────────────────────────────────

/// Resource pressure report for a fabric node, fed by the health poller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeHealth {
    /// CPU utilisation [0, 1].
    pub cpu: f64,
    /// Buffer fill fraction [0, 1].
    pub buffer_pct: f64,
}
