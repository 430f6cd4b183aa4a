//! # Path Registry & Health State Machine
//!
//! Tracks every registered overlay path: its latency window, its load
//! share, and a three-state health machine.
//!
//! ```text
//!                     ewma>T ∧ slope≥S
//!   healthy ──────────────────────────────────▶ degraded
//!       ▲                                          │
//!       │      ewma<0.8·T ∧ slope≤0.5 ∧ degraded-held > HOLD_RECOVERY
//!       │                                          ▼
//!       │                                      recovering
//!       │   ewma<0.6·T ∧ recovering-held > STABILITY   │
//!       └──────────────────────────────────────────────┘
//! ```
//!
//! A recovering path that drifts again drops straight back to degraded;
//! no other shortcut exists.

use std::collections::BTreeMap;
use std::time::Duration;

use quanta::Instant;
use tracing::info;

use trellis_common::models::PathStatus;

use crate::config::{ControllerConfig, Thresholds};
use crate::stats::LatencyWindow;

// Recovery gates relative to the EWMA ceiling T.
const RECOVERY_EWMA_FACTOR: f64 = 0.8;
const STABILITY_EWMA_FACTOR: f64 = 0.6;
/// Absolute slope ceiling (ms per batch position) for entering recovery.
const RECOVERY_SLOPE_MAX: f64 = 0.5;

/// Per-path state. Holds node ids only; the topology store owns the
/// nodes and links themselves.
#[derive(Debug, Clone)]
pub struct PathMetrics {
    pub id: u64,
    pub node_ids: Vec<u64>,
    pub window: LatencyWindow,
    /// Share of ingress load, [0, 100].
    pub load_pct: f64,
    pub status: PathStatus,
    pub last_failure: Option<Instant>,
    pub last_recovery: Option<Instant>,
}

impl PathMetrics {
    /// Intermediate nodes — everything but the endpoints.
    pub fn intermediates(&self) -> &[u64] {
        if self.node_ids.len() <= 2 {
            &[]
        } else {
            &self.node_ids[1..self.node_ids.len() - 1]
        }
    }

    pub fn src(&self) -> Option<u64> {
        self.node_ids.first().copied()
    }

    pub fn dst(&self) -> Option<u64> {
        self.node_ids.last().copied()
    }

    /// Human-readable form, e.g. `"1 -> 9 -> 19"`.
    pub fn label(&self) -> String {
        self.node_ids
            .iter()
            .map(u64::to_string)
            .collect::<Vec<_>>()
            .join(" -> ")
    }
}

/// A recovery transition observed by [`PathRegistry::apply_recovery_transitions`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub path_id: u64,
    pub from: PathStatus,
    pub to: PathStatus,
}

/// Registry of all registered paths plus the optimal distribution
/// recorded at registration time (the gradual-revert target).
#[derive(Debug)]
pub struct PathRegistry {
    paths: BTreeMap<u64, PathMetrics>,
    optimal: BTreeMap<u64, f64>,
    window: usize,
    alpha: f64,
    hold_recovery: Duration,
    stability: Duration,
}

impl PathRegistry {
    pub fn new(config: &ControllerConfig) -> Self {
        PathRegistry {
            paths: BTreeMap::new(),
            optimal: BTreeMap::new(),
            window: config.window,
            alpha: config.alpha,
            hold_recovery: config.hold_recovery,
            stability: config.stability,
        }
    }

    /// Register a path as healthy with the given initial load, which is
    /// also recorded as its optimal-distribution entry. Re-registering
    /// an id overwrites the previous entry cleanly (fresh window, fresh
    /// timers).
    pub fn register(&mut self, id: u64, node_ids: Vec<u64>, initial_load_pct: f64) {
        let metrics = PathMetrics {
            id,
            node_ids,
            window: LatencyWindow::new(self.window, self.alpha),
            load_pct: initial_load_pct,
            status: PathStatus::Healthy,
            last_failure: None,
            last_recovery: None,
        };
        info!(path_id = %id, path = %metrics.label(), load_pct = initial_load_pct, "path registered");
        self.paths.insert(id, metrics);
        self.optimal.insert(id, initial_load_pct);
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn get(&self, id: u64) -> Option<&PathMetrics> {
        self.paths.get(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PathMetrics> {
        self.paths.values()
    }

    /// Record a latency sample into the path's ring. Returns false for
    /// unknown ids.
    pub fn record_latency(&mut self, id: u64, ts_ms: i64, latency_ms: f64) -> bool {
        match self.paths.get_mut(&id) {
            Some(path) => {
                path.window.record(ts_ms, latency_ms);
                true
            }
            None => false,
        }
    }

    /// Transition a path to degraded (from healthy or recovering) and
    /// stamp its failure time. Returns true if a transition happened.
    pub fn mark_degraded(&mut self, id: u64, now: Instant) -> bool {
        let Some(path) = self.paths.get_mut(&id) else {
            return false;
        };
        if path.status == PathStatus::Degraded {
            return false;
        }
        let from = path.status;
        path.status = PathStatus::Degraded;
        path.last_failure = Some(now);
        info!(path_id = %id, %from, "path degraded");
        true
    }

    /// Walk the recovery half of the state machine: degraded paths that
    /// have cooled down and served their hold become recovering;
    /// recovering paths that stayed calm through the stability window
    /// become healthy.
    pub fn apply_recovery_transitions(
        &mut self,
        now: Instant,
        thresholds: &Thresholds,
    ) -> Vec<Transition> {
        let t = thresholds.ewma_max_ms;
        let mut transitions = Vec::new();

        for path in self.paths.values_mut() {
            let Some(ewma) = path.window.ewma() else {
                continue;
            };
            match path.status {
                PathStatus::Degraded => {
                    let held = path
                        .last_failure
                        .map(|at| now.saturating_duration_since(at) > self.hold_recovery)
                        .unwrap_or(false);
                    if ewma < RECOVERY_EWMA_FACTOR * t
                        && path.window.slope() <= RECOVERY_SLOPE_MAX
                        && held
                    {
                        path.status = PathStatus::Recovering;
                        path.last_recovery = Some(now);
                        transitions.push(Transition {
                            path_id: path.id,
                            from: PathStatus::Degraded,
                            to: PathStatus::Recovering,
                        });
                        info!(path_id = %path.id, "path recovering");
                    }
                }
                PathStatus::Recovering => {
                    let held = path
                        .last_recovery
                        .map(|at| now.saturating_duration_since(at) > self.stability)
                        .unwrap_or(false);
                    if ewma < STABILITY_EWMA_FACTOR * t && held {
                        path.status = PathStatus::Healthy;
                        transitions.push(Transition {
                            path_id: path.id,
                            from: PathStatus::Recovering,
                            to: PathStatus::Healthy,
                        });
                        info!(path_id = %path.id, "path healthy");
                    }
                }
                PathStatus::Healthy => {}
            }
        }

        transitions
    }

    pub fn set_load(&mut self, id: u64, load_pct: f64) {
        if let Some(path) = self.paths.get_mut(&id) {
            path.load_pct = load_pct;
        }
    }

    /// Current distribution snapshot.
    pub fn loads(&self) -> BTreeMap<u64, f64> {
        self.paths.iter().map(|(&id, p)| (id, p.load_pct)).collect()
    }

    /// The load split recorded at registration; target of gradual revert.
    pub fn optimal(&self) -> &BTreeMap<u64, f64> {
        &self.optimal
    }

    pub fn total_load(&self) -> f64 {
        self.paths.values().map(|p| p.load_pct).sum()
    }

    pub fn degraded_ids(&self) -> Vec<u64> {
        self.paths
            .values()
            .filter(|p| p.status == PathStatus::Degraded)
            .map(|p| p.id)
            .collect()
    }

    pub fn all_degraded(&self) -> bool {
        !self.paths.is_empty()
            && self
                .paths
                .values()
                .all(|p| p.status == PathStatus::Degraded)
    }
}
