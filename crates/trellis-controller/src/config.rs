//! Controller tuning.
//!
//! Defaults match the production calibration; everything is
//! overridable from the gateway configuration file.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use trellis_common::models::{FailoverMode, RoutingMode};

/// Trigger thresholds, calibrated against per-batch latency samples.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Thresholds {
    /// Aggregate/per-path EWMA ceiling in milliseconds.
    pub ewma_max_ms: f64,
    /// Minimum regression slope (ms per batch position, reported as
    /// ms/s under the one-batch-per-second assumption).
    pub slope_min_ms_per_s: f64,
    /// How long the latency-drift predicate must hold continuously
    /// before the trigger fires.
    pub hold: Duration,
    /// CPU utilisation ceiling for the resource-pressure trigger.
    pub cpu_max: f64,
    /// Buffer fill ceiling for the resource-pressure trigger.
    pub buf_max_pct: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Thresholds {
            ewma_max_ms: 100.0,
            slope_min_ms_per_s: 5.0,
            hold: Duration::from_secs(3),
            cpu_max: 0.85,
            buf_max_pct: 0.8,
        }
    }
}

/// Full controller configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// EWMA smoothing factor, (0, 1].
    pub alpha: f64,
    /// Latency ring size W (samples and slope both honour this bound).
    pub window: usize,
    pub thresholds: Thresholds,
    /// Minimum time a path stays degraded before it may start recovering.
    pub hold_recovery: Duration,
    /// Minimum time a path stays recovering before it is healthy again.
    pub stability: Duration,
    /// Wall-clock span of a gradual revert.
    pub transition_duration: Duration,
    /// Number of discrete revert steps.
    pub transition_steps: usize,
    /// Load pinned on each degraded path during failover.
    pub residual_load_pct: f64,
    /// How many ranked paths the dispatcher samples across.
    pub max_dispatch_paths: usize,
    /// How many node-disjoint alternatives the rebalancer requests.
    pub k_alternatives: usize,
    pub routing_mode: RoutingMode,
    pub failover_mode: FailoverMode,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        ControllerConfig {
            alpha: 0.3,
            window: 10,
            thresholds: Thresholds::default(),
            hold_recovery: Duration::from_secs(20),
            stability: Duration::from_secs(15),
            transition_duration: Duration::from_secs(7),
            transition_steps: 5,
            residual_load_pct: 5.0,
            max_dispatch_paths: 3,
            k_alternatives: 3,
            routing_mode: RoutingMode::Virtual,
            failover_mode: FailoverMode::Predictive,
        }
    }
}
