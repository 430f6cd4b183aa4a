//! # Controller — Single-Writer Core
//!
//! Owns every piece of mutable control state: the topology, the path
//! registry, the aggregate latency window, the trigger evaluator, the
//! node-health map, and the telemetry sink. Callers serialise access
//! (the gateway wraps it in one mutex) and keep I/O outside the lock:
//! a cold failover returns a [`PendingFailover`] carrying the spin-up
//! delay, the caller sleeps, then calls
//! [`Controller::complete_failover`] to close the incident.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::Utc;
use quanta::Instant;
use rand::rngs::SmallRng;
use rand::{RngExt as _, SeedableRng};
use tracing::{info, warn};

use trellis_common::incident::{FailoverReason, Incident, IncidentDetails, IncidentSeverity};
use trellis_common::models::{FailoverMode, NodeHealth, RoutingMode, Tier};
use trellis_common::protocol::{
    ControllerStateView, Event, IngressResponse, LatencyRecord, NodeHealthView, PathView,
    ThresholdView,
};
use trellis_common::GatewayError;
use trellis_fabric::{is_valid_path, k_disjoint_paths, path_latency_ms, path_score, Topology};

use crate::config::ControllerConfig;
use crate::dispatch;
use crate::rebalance;
use crate::registry::{PathRegistry, Transition};
use crate::revert::{self, RevertSchedule, RevertStep};
use crate::stats::LatencyWindow;
use crate::telemetry::TelemetrySink;
use crate::trigger::TriggerEvaluator;

const COLD_SPIN_UP_MIN_MS: f64 = 400.0;
const COLD_SPIN_UP_MAX_MS: f64 = 700.0;
/// Aggregate EWMA past this multiple of the ceiling marks a failover
/// incident as high severity.
const HIGH_SEVERITY_EWMA_FACTOR: f64 = 1.5;

/// A failover decided under the lock but not yet closed out. The
/// caller sleeps `spin_up` (cold mode) before completing; MTTR runs
/// from the first impacted batch to the completion call.
#[derive(Debug, Clone)]
pub struct PendingFailover {
    pub reason: FailoverReason,
    pub severity: IncidentSeverity,
    pub degraded_paths: Vec<u64>,
    pub bottleneck_nodes: Vec<u64>,
    pub distribution: Vec<(u64, f64)>,
    pub spin_up: Option<Duration>,
    pub impacted_at: Option<Instant>,
}

/// Result of dispatching one ingress batch.
#[derive(Debug)]
pub struct BatchOutcome {
    pub response: IngressResponse,
    /// Present when this batch triggered a failover; the caller must
    /// finish it via [`Controller::complete_failover`].
    pub pending_failover: Option<PendingFailover>,
    /// Physical-mode only: `physical_map` of the first-hop node the
    /// surviving events should be forwarded to.
    pub forward_to: Option<String>,
}

pub struct Controller {
    topology: Topology,
    registry: PathRegistry,
    aggregate: LatencyWindow,
    trigger: TriggerEvaluator,
    node_health: BTreeMap<u64, NodeHealth>,
    sink: Box<dyn TelemetrySink>,
    config: ControllerConfig,
    rng: SmallRng,
    failover_in_progress: bool,
    impacted_batch_at: Option<Instant>,
    /// Latest node-disjoint alternatives computed by the rebalancer.
    alternatives: Vec<Vec<u64>>,
    active_path: Option<Vec<u64>>,
    backup_path: Option<Vec<u64>>,
}

impl Controller {
    pub fn new(topology: Topology, config: ControllerConfig, sink: Box<dyn TelemetrySink>) -> Self {
        Controller {
            aggregate: LatencyWindow::new(config.window, config.alpha),
            trigger: TriggerEvaluator::new(config.thresholds),
            registry: PathRegistry::new(&config),
            topology,
            node_health: BTreeMap::new(),
            sink,
            config,
            rng: SmallRng::seed_from_u64(0x7E11),
            failover_in_progress: false,
            impacted_batch_at: None,
            alternatives: Vec::new(),
            active_path: None,
            backup_path: None,
        }
    }

    // ── Registration ────────────────────────────────────────────

    pub fn register_path(&mut self, id: u64, node_ids: Vec<u64>, load_pct: f64) {
        self.registry.register(id, node_ids, load_pct);
    }

    /// Discover up to `k` node-disjoint edge→cloud paths and register
    /// them with an even load split. Returns how many were registered.
    pub fn register_default_paths(&mut self, k: usize) -> Result<usize, GatewayError> {
        let (src, dst) = self
            .pick_endpoints()
            .ok_or(GatewayError::NoPathAvailable { src: 0, dst: 0 })?;

        let paths: Vec<Vec<u64>> =
            k_disjoint_paths(&self.topology, src, dst, k, &Default::default())
                .into_iter()
                .filter(|p| is_valid_path(&self.topology, p))
                .collect();
        if paths.is_empty() {
            return Err(GatewayError::NoPathAvailable { src, dst });
        }

        let share = 100.0 / paths.len() as f64;
        let count = paths.len();
        for (id, nodes) in paths.into_iter().enumerate() {
            self.registry.register(id as u64, nodes, share);
        }
        Ok(count)
    }

    /// Endpoints are drawn at random per call from the edge and cloud
    /// tiers, matching the observed per-batch endpoint churn of the
    /// virtual routing mode.
    fn pick_endpoints(&mut self) -> Option<(u64, u64)> {
        let edges = self.topology.nodes_in_tier(Tier::Edge);
        let clouds = self.topology.nodes_in_tier(Tier::Cloud);
        if edges.is_empty() || clouds.is_empty() {
            return None;
        }
        let src = edges[(self.rng.random::<f64>() * edges.len() as f64) as usize % edges.len()];
        let dst = clouds[(self.rng.random::<f64>() * clouds.len() as f64) as usize % clouds.len()];
        Some((src, dst))
    }

    // ── Ingress ─────────────────────────────────────────────────

    /// Dispatch a validated batch according to the configured routing
    /// mode. `ts_ms` is the batch arrival time in epoch milliseconds.
    pub fn ingest(
        &mut self,
        events: &[Event],
        now: Instant,
        ts_ms: i64,
    ) -> Result<BatchOutcome, GatewayError> {
        match self.config.routing_mode {
            RoutingMode::Virtual => self.ingest_virtual(events, now, ts_ms),
            RoutingMode::Physical => self.ingest_physical(events, now, ts_ms),
        }
    }

    /// Virtual routing: degradation scan, weighted path sample,
    /// estimated latency charged to the telemetry pipeline.
    pub fn ingest_virtual(
        &mut self,
        events: &[Event],
        now: Instant,
        ts_ms: i64,
    ) -> Result<BatchOutcome, GatewayError> {
        let pending_failover = self.run_rebalance(now);

        // Ranked, load-weighted candidate set: top-K registered paths
        // by composite score.
        let mut ranked: Vec<(u64, f64, f64)> = self
            .registry
            .iter()
            .map(|p| {
                (
                    p.id,
                    path_score(&self.topology, &p.node_ids),
                    p.load_pct,
                )
            })
            .collect();
        if ranked.is_empty() {
            let (src, dst) = self.pick_endpoints().unwrap_or((0, 0));
            return Err(GatewayError::NoPathAvailable { src, dst });
        }
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked.truncate(self.config.max_dispatch_paths);

        let candidates: Vec<(u64, f64)> = ranked.iter().map(|&(id, _, load)| (id, load)).collect();
        let draw = self.rng.random::<f64>() * 100.0;
        // Candidates are non-empty here, so the pick always lands.
        let index = dispatch::pick_weighted(&candidates, draw).unwrap_or(0);
        let path_id = candidates[index].0;

        let (node_ids, label) = match self.registry.get(path_id) {
            Some(path) => (path.node_ids.clone(), path.label()),
            None => {
                let (src, dst) = self.pick_endpoints().unwrap_or((0, 0));
                return Err(GatewayError::NoPathAvailable { src, dst });
            }
        };
        let latency_ms = path_latency_ms(&self.topology, &node_ids);

        self.observe_path_latency(path_id, ts_ms, latency_ms);
        self.note_deadline_misses(events, latency_ms, Some(path_id));

        Ok(BatchOutcome {
            response: IngressResponse {
                accepted: events.len(),
                dropped: 0,
                end_to_end_latency_ms: latency_ms,
                path: label,
                path_id: Some(path_id),
            },
            pending_failover,
            forward_to: None,
        })
    }

    /// Physical routing: trigger evaluation with active↔backup swap,
    /// then a hop-by-hop traversal of the active path.
    pub fn ingest_physical(
        &mut self,
        events: &[Event],
        now: Instant,
        ts_ms: i64,
    ) -> Result<BatchOutcome, GatewayError> {
        self.ensure_physical_paths()?;

        let reason = self.trigger.evaluate(
            self.aggregate.ewma(),
            self.aggregate.slope(),
            &self.node_health,
            now,
        );
        // The first batch seen while the drift hold is running is the
        // impacted batch; MTTR is measured from it.
        if self.trigger.trigger_started().is_some() && self.impacted_batch_at.is_none() {
            self.impacted_batch_at = Some(now);
        }

        let pending_failover = reason.map(|reason| {
            std::mem::swap(&mut self.active_path, &mut self.backup_path);
            let active = self.active_path.as_deref().unwrap_or(&[]);
            info!(reason = ?reason, path = ?active, "physical failover: backup promoted");
            self.finish_rebalance_accounting(reason, Vec::new(), Vec::new(), Vec::new(), now)
        });

        let Some(active) = self.active_path.clone() else {
            let (src, dst) = self.pick_endpoints().unwrap_or((0, 0));
            return Err(GatewayError::NoPathAvailable { src, dst });
        };
        let bytes = dispatch::estimate_batch_bytes(events);
        let outcome =
            dispatch::traverse_physical(&self.topology, &active, events.len(), bytes, &mut self.rng);

        self.aggregate.record(ts_ms, outcome.delay_ms);
        self.sink.record_latency(LatencyRecord {
            ts: Utc::now(),
            latency_ms: outcome.delay_ms,
            path_id: None,
        });
        self.note_deadline_misses(events, outcome.delay_ms, None);

        let forward_to = (outcome.accepted > 0)
            .then(|| {
                active
                    .first()
                    .and_then(|&id| self.topology.node(id))
                    .map(|n| n.physical_map.clone())
            })
            .flatten();

        let label = active
            .iter()
            .map(u64::to_string)
            .collect::<Vec<_>>()
            .join(" -> ");
        Ok(BatchOutcome {
            response: IngressResponse {
                accepted: outcome.accepted,
                dropped: outcome.dropped,
                end_to_end_latency_ms: outcome.delay_ms,
                path: label,
                path_id: None,
            },
            pending_failover,
            forward_to,
        })
    }

    fn ensure_physical_paths(&mut self) -> Result<(), GatewayError> {
        if self.active_path.is_some() {
            return Ok(());
        }
        let (src, dst) = self
            .pick_endpoints()
            .ok_or(GatewayError::NoPathAvailable { src: 0, dst: 0 })?;
        let mut paths = k_disjoint_paths(&self.topology, src, dst, 2, &Default::default());
        if paths.is_empty() {
            return Err(GatewayError::NoPathAvailable { src, dst });
        }
        self.active_path = Some(paths.remove(0));
        self.backup_path = paths.pop().or_else(|| self.active_path.clone());
        Ok(())
    }

    // ── Rebalance & failover ────────────────────────────────────

    /// Run the degradation scan; when paths newly degrade, apply the
    /// failover distribution and return the pending incident.
    pub fn run_rebalance(&mut self, now: Instant) -> Option<PendingFailover> {
        let plan = rebalance::evaluate(&mut self.registry, &self.topology, &self.config, now)?;
        self.alternatives = plan.alternatives;
        Some(self.finish_rebalance_accounting(
            FailoverReason::LatencyDrift,
            plan.degraded,
            plan.bottlenecks,
            plan.distribution.into_iter().collect(),
            now,
        ))
    }

    /// Shared §-failover bookkeeping: severity from the pre-reset
    /// aggregate EWMA, telemetry/debounce restart, cold spin-up draw.
    fn finish_rebalance_accounting(
        &mut self,
        reason: FailoverReason,
        degraded_paths: Vec<u64>,
        bottleneck_nodes: Vec<u64>,
        distribution: Vec<(u64, f64)>,
        now: Instant,
    ) -> PendingFailover {
        let severity = if self.aggregate.ewma().is_some_and(|e| {
            e > HIGH_SEVERITY_EWMA_FACTOR * self.config.thresholds.ewma_max_ms
        }) {
            IncidentSeverity::High
        } else {
            IncidentSeverity::Medium
        };

        self.failover_in_progress = true;
        let impacted_at = self.impacted_batch_at.take().or(Some(now));

        // Restart the debounce against the new path set.
        self.aggregate.reset();
        self.trigger.reset();

        let spin_up = (self.config.failover_mode == FailoverMode::Cold).then(|| {
            let ms = COLD_SPIN_UP_MIN_MS
                + self.rng.random::<f64>() * (COLD_SPIN_UP_MAX_MS - COLD_SPIN_UP_MIN_MS);
            Duration::from_millis(ms as u64)
        });

        PendingFailover {
            reason,
            severity,
            degraded_paths,
            bottleneck_nodes,
            distribution,
            spin_up,
            impacted_at,
        }
    }

    /// Close out a failover: compute MTTR against the completion time
    /// and emit the incident. The caller slept through any spin-up
    /// delay before calling this.
    pub fn complete_failover(&mut self, pending: PendingFailover, completed_at: Instant) -> Incident {
        let mttr_ms = pending
            .impacted_at
            .map(|at| completed_at.saturating_duration_since(at).as_secs_f64() * 1000.0);

        let incident = Incident::new(
            pending.severity,
            IncidentDetails::Failover {
                reason: pending.reason,
                degraded_paths: pending.degraded_paths,
                bottleneck_nodes: pending.bottleneck_nodes,
                distribution: pending.distribution,
                spin_up_delay_ms: pending.spin_up.map(|d| d.as_secs_f64() * 1000.0),
                mttr_ms,
            },
        );
        info!(incident_id = %incident.id, severity = ?incident.severity, mttr_ms, "failover complete");
        self.sink.record_incident(incident.clone());
        incident
    }

    // ── Recovery & revert ───────────────────────────────────────

    /// Periodic recovery pass: walk the FSM, then plan a gradual
    /// revert if the distribution is off target.
    pub fn revert_tick(&mut self, now: Instant) -> (Vec<Transition>, Option<RevertSchedule>) {
        let transitions = self
            .registry
            .apply_recovery_transitions(now, &self.config.thresholds);

        if self.failover_in_progress && self.registry.degraded_ids().is_empty() {
            self.failover_in_progress = false;
        }

        let schedule = revert::plan(&self.registry, &self.config, now);
        (transitions, schedule)
    }

    /// Apply one revert step, re-normalising if the invariant drifted.
    pub fn apply_revert_step(&mut self, step: &RevertStep) -> bool {
        let changed = revert::apply_step(&mut self.registry, step);

        let total = self.registry.total_load();
        if (total - 100.0).abs() > rebalance::LOAD_SUM_TOLERANCE {
            warn!(total, "load sum drifted after revert step; re-normalising");
            let mut loads = self.registry.loads();
            rebalance::renormalise(&mut loads);
            for (id, load) in loads {
                self.registry.set_load(id, load);
            }
        }
        changed
    }

    // ── Telemetry & health ──────────────────────────────────────

    /// Record an aggregate-only latency sample (e.g. a forwarding
    /// timeout surfacing as a spike).
    pub fn observe_latency(&mut self, ts_ms: i64, latency_ms: f64) {
        self.aggregate.record(ts_ms, latency_ms);
        self.sink.record_latency(LatencyRecord {
            ts: Utc::now(),
            latency_ms,
            path_id: None,
        });
    }

    /// Record a latency sample against a path and the aggregate window.
    pub fn observe_path_latency(&mut self, path_id: u64, ts_ms: i64, latency_ms: f64) {
        self.aggregate.record(ts_ms, latency_ms);
        self.registry.record_latency(path_id, ts_ms, latency_ms);
        self.sink.record_latency(LatencyRecord {
            ts: Utc::now(),
            latency_ms,
            path_id: Some(path_id),
        });
    }

    fn note_deadline_misses(&mut self, events: &[Event], latency_ms: f64, path_id: Option<u64>) {
        let missed = events
            .iter()
            .filter(|e| (e.deadline_ms as f64) < latency_ms)
            .count();
        if missed == 0 {
            return;
        }
        let tightest = events.iter().map(|e| e.deadline_ms).min().unwrap_or(0);
        self.sink.record_incident(Incident::new(
            IncidentSeverity::Medium,
            IncidentDetails::DeadlineMiss {
                path_id,
                latency_ms,
                deadline_ms: tightest,
                missed_events: missed,
            },
        ));
    }

    pub fn set_node_health(&mut self, node_id: u64, health: NodeHealth) {
        self.node_health.insert(node_id, health);
        // Utilisation feeds path scoring.
        let _ = self.topology.set_node_utilisation(node_id, health.cpu);
    }

    pub fn record_incident(&mut self, incident: Incident) {
        self.sink.record_incident(incident);
    }

    // ── Fault knobs ─────────────────────────────────────────────

    pub fn inject_virtual_node_fault(
        &mut self,
        node_id: u64,
        latency_ms: f64,
    ) -> Result<usize, GatewayError> {
        self.topology.inject_node_latency_fault(node_id, latency_ms)
    }

    pub fn remove_virtual_node_fault(&mut self, node_id: u64) -> Result<usize, GatewayError> {
        self.topology.remove_node_latency_fault(node_id)
    }

    // ── Views & accessors ───────────────────────────────────────

    pub fn state_view(&self) -> ControllerStateView {
        let thresholds = &self.config.thresholds;
        ControllerStateView {
            ewma: self.aggregate.ewma(),
            slope: self.aggregate.slope(),
            window_size: self.config.window,
            thresholds: ThresholdView {
                ewma_max_ms: thresholds.ewma_max_ms,
                slope_min_ms_per_s: thresholds.slope_min_ms_per_s,
                hold_sec: thresholds.hold.as_secs_f64(),
                cpu_max: thresholds.cpu_max,
                buf_max_pct: thresholds.buf_max_pct,
            },
            node_health: self
                .node_health
                .iter()
                .map(|(&node_id, &health)| NodeHealthView { node_id, health })
                .collect(),
            paths: self
                .registry
                .iter()
                .map(|p| PathView {
                    id: p.id,
                    node_ids: p.node_ids.clone(),
                    ewma: p.window.ewma(),
                    slope: p.window.slope(),
                    load_percentage: p.load_pct,
                    status: p.status,
                })
                .collect(),
            active_path: self.active_path.clone(),
            backup_path: self.backup_path.clone(),
            mode: self.config.failover_mode,
        }
    }

    pub fn incidents(&self, limit: usize) -> Vec<Incident> {
        self.sink.recent_incidents(limit)
    }

    pub fn registry(&self) -> &PathRegistry {
        &self.registry
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn alternatives(&self) -> &[Vec<u64>] {
        &self.alternatives
    }

    pub fn failover_in_progress(&self) -> bool {
        self.failover_in_progress
    }

    pub fn failover_mode(&self) -> FailoverMode {
        self.config.failover_mode
    }

    pub fn set_failover_mode(&mut self, mode: FailoverMode) {
        info!(mode = ?mode, "failover mode updated");
        self.config.failover_mode = mode;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::MemorySink;
    use trellis_common::protocol::EventMetrics;

    fn fan_topology() -> Topology {
        Topology::from_json(
            r#"{
            "nodes": [
                { "id": 1,  "tier": "edge",  "physical_map": "edge-a" },
                { "id": 9,  "tier": "core",  "physical_map": "core-a" },
                { "id": 10, "tier": "core",  "physical_map": "core-b" },
                { "id": 11, "tier": "core",  "physical_map": "core-c" },
                { "id": 19, "tier": "cloud", "physical_map": "cloud-a" }
            ],
            "links": [
                { "u": 1,  "v": 9,  "bw_mbps": 100, "delay_ms": 20 },
                { "u": 1,  "v": 10, "bw_mbps": 100, "delay_ms": 25 },
                { "u": 1,  "v": 11, "bw_mbps": 100, "delay_ms": 30 },
                { "u": 9,  "v": 19, "bw_mbps": 100, "delay_ms": 20 },
                { "u": 10, "v": 19, "bw_mbps": 100, "delay_ms": 25 },
                { "u": 11, "v": 19, "bw_mbps": 100, "delay_ms": 30 }
            ]
        }"#,
        )
        .unwrap()
    }

    fn controller(config: ControllerConfig) -> Controller {
        Controller::new(fan_topology(), config, Box::new(MemorySink::default()))
    }

    fn batch(n: usize) -> Vec<Event> {
        (0..n)
            .map(|i| Event {
                id: format!("e-{i}"),
                device_id: "press-07".into(),
                ts: 1_700_000_000_000 + i as i64,
                metrics: EventMetrics {
                    temperature: 70.0,
                    pressure: 3.0,
                    vibration: 0.01,
                    motor_current: 12.0,
                },
                deadline_ms: 10_000,
            })
            .collect()
    }

    #[test]
    fn default_paths_split_load_evenly() {
        let mut ctl = controller(ControllerConfig::default());
        let count = ctl.register_default_paths(3).unwrap();
        assert_eq!(count, 3);
        assert!((ctl.registry().total_load() - 100.0).abs() < 1e-9);
    }

    #[test]
    fn virtual_ingest_accepts_and_records_latency() {
        let mut ctl = controller(ControllerConfig::default());
        ctl.register_default_paths(3).unwrap();

        let events = batch(10);
        let outcome = ctl.ingest_virtual(&events, Instant::now(), 1).unwrap();
        assert_eq!(outcome.response.accepted, 10);
        assert_eq!(outcome.response.dropped, 0);
        // All fabric paths cost 40–60 ms end to end.
        assert!(outcome.response.end_to_end_latency_ms >= 40.0);
        assert!(outcome.response.end_to_end_latency_ms <= 60.0);
        assert!(outcome.pending_failover.is_none());
        assert!(ctl.state_view().ewma.is_some());
    }

    #[test]
    fn virtual_ingest_without_paths_is_no_path_error() {
        let mut ctl = controller(ControllerConfig::default());
        let events = batch(1);
        assert!(matches!(
            ctl.ingest_virtual(&events, Instant::now(), 1),
            Err(GatewayError::NoPathAvailable { .. })
        ));
    }

    #[test]
    fn drifting_path_produces_pending_failover_and_incident() {
        let mut ctl = controller(ControllerConfig::default());
        ctl.register_path(0, vec![1, 9, 19], 50.0);
        ctl.register_path(1, vec![1, 10, 19], 30.0);
        ctl.register_path(2, vec![1, 11, 19], 20.0);

        let t0 = Instant::now();
        for i in 0..10 {
            ctl.observe_path_latency(0, i, 80.0 + 15.0 * i as f64);
            ctl.observe_path_latency(1, i, 50.0);
            ctl.observe_path_latency(2, i, 50.0);
        }

        let pending = ctl.run_rebalance(t0).expect("path 0 drifted");
        assert_eq!(pending.degraded_paths, vec![0]);
        assert_eq!(pending.reason, FailoverReason::LatencyDrift);
        assert!(pending.spin_up.is_none(), "predictive mode has no spin-up");

        let incident = ctl.complete_failover(pending, t0 + Duration::from_millis(50));
        assert!(matches!(incident.details, IncidentDetails::Failover { .. }));
        assert_eq!(ctl.incidents(10).len(), 1);
        assert!(ctl.failover_in_progress());

        // Aggregate telemetry restarted.
        assert_eq!(ctl.state_view().ewma, None);
    }

    #[test]
    fn cold_mode_charges_spin_up_within_bounds() {
        let mut ctl = controller(ControllerConfig {
            failover_mode: FailoverMode::Cold,
            ..ControllerConfig::default()
        });
        ctl.register_path(0, vec![1, 9, 19], 60.0);
        ctl.register_path(1, vec![1, 10, 19], 40.0);

        let t0 = Instant::now();
        for i in 0..10 {
            ctl.observe_path_latency(0, i, 80.0 + 15.0 * i as f64);
            ctl.observe_path_latency(1, i, 50.0);
        }

        let pending = ctl.run_rebalance(t0).expect("path 0 drifted");
        let spin_up = pending.spin_up.expect("cold mode must spin up");
        let spin_up_ms = spin_up.as_secs_f64() * 1000.0;
        assert!((400.0..=700.0).contains(&spin_up_ms), "spin_up={spin_up_ms}");

        // Completion after the sleep: MTTR covers the spin-up.
        let incident = ctl.complete_failover(pending, t0 + spin_up);
        if let IncidentDetails::Failover {
            spin_up_delay_ms: Some(delay),
            mttr_ms: Some(mttr),
            ..
        } = incident.details
        {
            assert!(mttr >= delay - 1.0, "mttr={mttr}, spin_up={delay}");
        } else {
            panic!("expected failover details with spin-up and mttr");
        }
    }

    #[test]
    fn physical_ingest_forwards_to_first_hop() {
        let mut ctl = controller(ControllerConfig {
            routing_mode: RoutingMode::Physical,
            ..ControllerConfig::default()
        });

        let events = batch(5);
        let outcome = ctl.ingest(&events, Instant::now(), 1).unwrap();
        assert_eq!(outcome.response.accepted, 5);
        assert_eq!(outcome.forward_to.as_deref(), Some("edge-a"));
        assert!(ctl.state_view().active_path.is_some());
        assert!(ctl.state_view().backup_path.is_some());
    }

    #[test]
    fn deadline_miss_emits_incident() {
        let mut ctl = controller(ControllerConfig::default());
        ctl.register_path(0, vec![1, 9, 19], 100.0);

        let mut events = batch(3);
        for event in &mut events {
            event.deadline_ms = 10; // Far below the 40 ms path latency.
        }
        ctl.ingest_virtual(&events, Instant::now(), 1).unwrap();

        let incidents = ctl.incidents(10);
        assert_eq!(incidents.len(), 1);
        assert!(matches!(
            incidents[0].details,
            IncidentDetails::DeadlineMiss {
                missed_events: 3,
                ..
            }
        ));
    }

    #[test]
    fn fault_knobs_round_trip_through_the_controller() {
        let mut ctl = controller(ControllerConfig::default());
        let before = ctl.topology().link_between(1, 9).unwrap().delay_ms;

        ctl.inject_virtual_node_fault(9, 75.0).unwrap();
        assert!(ctl.topology().link_between(1, 9).unwrap().delay_ms > before);

        ctl.remove_virtual_node_fault(9).unwrap();
        let after = ctl.topology().link_between(1, 9).unwrap().delay_ms;
        assert!((after - before).abs() < 1e-12);
    }
}
