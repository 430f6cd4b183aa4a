//! Wire payloads for the gateway HTTP surface.
//!
//! Field names follow the external contract (camelCase on the wire);
//! everything else in the workspace stays snake_case.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{FailoverMode, NodeHealth, PathStatus};

// ── Ingress ─────────────────────────────────────────────────────────

/// Sensor readings carried by every event.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventMetrics {
    pub temperature: f64,
    pub pressure: f64,
    pub vibration: f64,
    pub motor_current: f64,
}

/// A single time-stamped event inside an ingress batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: String,
    pub device_id: String,
    /// Milliseconds since the Unix epoch.
    pub ts: i64,
    pub metrics: EventMetrics,
    /// Per-event delivery deadline in milliseconds.
    pub deadline_ms: u64,
}

impl Event {
    /// Basic structural validation; malformed events reject the batch.
    pub fn validate(&self) -> Result<(), String> {
        if self.id.is_empty() {
            return Err("event id must not be empty".into());
        }
        if self.device_id.is_empty() {
            return Err(format!("event {}: deviceId must not be empty", self.id));
        }
        if self.ts <= 0 {
            return Err(format!("event {}: ts must be positive", self.id));
        }
        if self.deadline_ms == 0 {
            return Err(format!("event {}: deadlineMs must be positive", self.id));
        }
        Ok(())
    }
}

/// Response to an ingress batch. A batch that loses every event still
/// succeeds (`accepted = 0`) — total loss is an outcome, not an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngressResponse {
    pub accepted: usize,
    pub dropped: usize,
    pub end_to_end_latency_ms: f64,
    /// Human-readable path description, e.g. `"1 -> 9 -> 19"`.
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path_id: Option<u64>,
}

// ── Controller state view ───────────────────────────────────────────

/// Per-path view inside [`ControllerStateView`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathView {
    pub id: u64,
    pub node_ids: Vec<u64>,
    pub ewma: Option<f64>,
    pub slope: f64,
    pub load_percentage: f64,
    pub status: PathStatus,
}

/// Threshold set echoed by the state endpoint.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThresholdView {
    pub ewma_max_ms: f64,
    pub slope_min_ms_per_s: f64,
    pub hold_sec: f64,
    pub cpu_max: f64,
    pub buf_max_pct: f64,
}

/// Snapshot returned by `GET /api/controller/state`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControllerStateView {
    pub ewma: Option<f64>,
    pub slope: f64,
    pub window_size: usize,
    pub thresholds: ThresholdView,
    pub node_health: Vec<NodeHealthView>,
    pub paths: Vec<PathView>,
    pub active_path: Option<Vec<u64>>,
    pub backup_path: Option<Vec<u64>>,
    pub mode: FailoverMode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeHealthView {
    pub node_id: u64,
    #[serde(flatten)]
    pub health: NodeHealth,
}

// ── Config & fault injection ────────────────────────────────────────

/// Runtime-mutable gateway settings (`POST /api/controller/config`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary: Option<crate::models::PrimaryTier>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<FailoverMode>,
}

/// Payload for the virtual-node fault endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeFaultRequest {
    pub virtual_node_id: u64,
    /// Additional latency applied to every link incident to the node.
    /// Ignored by the remove endpoint.
    #[serde(default)]
    pub latency_ms: f64,
}

/// Health report shape expected from downstream tier nodes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeHealthReport {
    pub cpu: f64,
    pub buffer_pct: f64,
}

/// A latency observation kept in the telemetry ring.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LatencyRecord {
    pub ts: DateTime<Utc>,
    pub latency_ms: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path_id: Option<u64>,
}
