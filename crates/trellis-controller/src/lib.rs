//! # Trellis Controller — Predictive Resilience Failover
//!
//! The control loop that fronts the overlay fabric: per-path latency
//! telemetry (EWMA + regression slope over a bounded ring), a
//! three-state path health machine, a debounced predictive trigger,
//! bottleneck-aware rebalancing onto node-disjoint alternatives, and a
//! gradual revert scheduler that walks load back to the optimal
//! distribution once paths recover.
//!
//! All mutable state lives in a single-writer [`controller::Controller`];
//! callers serialise access (one mutex in the gateway) and perform I/O —
//! forwarding, health polls, spin-up sleeps — outside the lock.

pub mod config;
pub mod controller;
pub mod dispatch;
pub mod rebalance;
pub mod registry;
pub mod revert;
pub mod stats;
pub mod telemetry;
pub mod trigger;

pub use config::{ControllerConfig, Thresholds};
pub use controller::{BatchOutcome, Controller, PendingFailover};
pub use telemetry::{MemorySink, TelemetrySink};
