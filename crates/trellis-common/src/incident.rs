//! Incident records.
//!
//! The controller keeps a bounded in-memory ring of incidents; each is a
//! typed record rather than a free-form blob so consumers can match on
//! the kind without inspecting string fields.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What triggered the incident.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentKind {
    DeadlineMiss,
    Failover,
    NodeDown,
    NodeRecover,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentSeverity {
    Medium,
    High,
}

/// Why a failover fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailoverReason {
    LatencyDrift,
    ResourcePressure,
}

/// Kind-specific incident payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IncidentDetails {
    DeadlineMiss {
        path_id: Option<u64>,
        latency_ms: f64,
        deadline_ms: u64,
        missed_events: usize,
    },
    Failover {
        reason: FailoverReason,
        degraded_paths: Vec<u64>,
        bottleneck_nodes: Vec<u64>,
        /// `(path id, load percentage)` pairs after redistribution.
        distribution: Vec<(u64, f64)>,
        /// Simulated standby spin-up charge (cold mode only).
        #[serde(skip_serializing_if = "Option::is_none")]
        spin_up_delay_ms: Option<f64>,
        /// First-impacted-batch to failover-completion, when known.
        #[serde(skip_serializing_if = "Option::is_none")]
        mttr_ms: Option<f64>,
    },
    NodeDown {
        node_id: u64,
    },
    NodeRecover {
        node_id: u64,
    },
}

impl IncidentDetails {
    pub fn kind(&self) -> IncidentKind {
        match self {
            IncidentDetails::DeadlineMiss { .. } => IncidentKind::DeadlineMiss,
            IncidentDetails::Failover { .. } => IncidentKind::Failover,
            IncidentDetails::NodeDown { .. } => IncidentKind::NodeDown,
            IncidentDetails::NodeRecover { .. } => IncidentKind::NodeRecover,
        }
    }
}

/// A single incident in the telemetry ring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Incident {
    /// UUIDv7, time-ordered.
    pub id: String,
    pub severity: IncidentSeverity,
    pub ts: DateTime<Utc>,
    #[serde(flatten)]
    pub details: IncidentDetails,
}

impl Incident {
    /// Create an incident stamped with a fresh UUIDv7 and the current time.
    pub fn new(severity: IncidentSeverity, details: IncidentDetails) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            severity,
            ts: Utc::now(),
            details,
        }
    }

    pub fn kind(&self) -> IncidentKind {
        self.details.kind()
    }
}
