//! # Telemetry Sink
//!
//! The controller records latency observations and incidents through
//! this trait rather than into module-scope rings, so tests can inject
//! their own sink and assert on exactly what was emitted.

use std::collections::VecDeque;

use trellis_common::incident::Incident;
use trellis_common::protocol::LatencyRecord;

/// Destination for controller telemetry. Implementations are expected
/// to be cheap; the controller calls these under its state lock.
pub trait TelemetrySink: Send {
    fn record_latency(&mut self, record: LatencyRecord);
    fn record_incident(&mut self, incident: Incident);
    /// Most recent incidents, newest last, capped at `limit`.
    fn recent_incidents(&self, limit: usize) -> Vec<Incident>;
    /// Most recent latency records, newest last, capped at `limit`.
    fn recent_latencies(&self, limit: usize) -> Vec<LatencyRecord>;
}

/// Bounded in-memory rings; the only persistence this system has.
#[derive(Debug)]
pub struct MemorySink {
    latencies: VecDeque<LatencyRecord>,
    incidents: VecDeque<Incident>,
    capacity: usize,
}

impl MemorySink {
    pub fn new(capacity: usize) -> Self {
        MemorySink {
            latencies: VecDeque::with_capacity(capacity.min(1024)),
            incidents: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }
}

impl Default for MemorySink {
    fn default() -> Self {
        MemorySink::new(512)
    }
}

impl TelemetrySink for MemorySink {
    fn record_latency(&mut self, record: LatencyRecord) {
        if self.latencies.len() == self.capacity {
            self.latencies.pop_front();
        }
        self.latencies.push_back(record);
    }

    fn record_incident(&mut self, incident: Incident) {
        if self.incidents.len() == self.capacity {
            self.incidents.pop_front();
        }
        self.incidents.push_back(incident);
    }

    fn recent_incidents(&self, limit: usize) -> Vec<Incident> {
        let skip = self.incidents.len().saturating_sub(limit);
        self.incidents.iter().skip(skip).cloned().collect()
    }

    fn recent_latencies(&self, limit: usize) -> Vec<LatencyRecord> {
        let skip = self.latencies.len().saturating_sub(limit);
        self.latencies.iter().skip(skip).cloned().collect()
    }
}
