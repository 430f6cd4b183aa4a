//! Gateway configuration: a TOML file plus environment overrides.
//!
//! Controller tuning is static at startup; `primary` and the failover
//! `mode` stay runtime-mutable through the config endpoint.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use trellis_common::models::{FailoverMode, PrimaryTier, RoutingMode};
use trellis_controller::{ControllerConfig, Thresholds};

/// Controller tuning in file-friendly units (seconds as integers).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerTuning {
    pub alpha: f64,
    pub window: usize,
    pub ewma_max_ms: f64,
    pub slope_min_ms_per_s: f64,
    pub hold_sec: u64,
    pub cpu_max: f64,
    pub buf_max_pct: f64,
    pub hold_recovery_sec: u64,
    pub stability_sec: u64,
    pub transition_duration_sec: u64,
    pub transition_steps: usize,
}

impl Default for ControllerTuning {
    fn default() -> Self {
        ControllerTuning {
            alpha: 0.3,
            window: 10,
            ewma_max_ms: 100.0,
            slope_min_ms_per_s: 5.0,
            hold_sec: 3,
            cpu_max: 0.85,
            buf_max_pct: 0.8,
            hold_recovery_sec: 20,
            stability_sec: 15,
            transition_duration_sec: 7,
            transition_steps: 5,
        }
    }
}

impl ControllerTuning {
    pub fn to_controller_config(
        &self,
        routing_mode: RoutingMode,
        failover_mode: FailoverMode,
    ) -> ControllerConfig {
        ControllerConfig {
            alpha: self.alpha,
            window: self.window,
            thresholds: Thresholds {
                ewma_max_ms: self.ewma_max_ms,
                slope_min_ms_per_s: self.slope_min_ms_per_s,
                hold: Duration::from_secs(self.hold_sec),
                cpu_max: self.cpu_max,
                buf_max_pct: self.buf_max_pct,
            },
            hold_recovery: Duration::from_secs(self.hold_recovery_sec),
            stability: Duration::from_secs(self.stability_sec),
            transition_duration: Duration::from_secs(self.transition_duration_sec),
            transition_steps: self.transition_steps,
            routing_mode,
            failover_mode,
            ..ControllerConfig::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub listen_addr: String,
    pub topology_path: PathBuf,
    pub routing_mode: RoutingMode,
    pub failover_mode: FailoverMode,
    pub primary: PrimaryTier,
    /// How many node-disjoint paths to register at startup.
    pub default_paths: usize,
    pub ingress_timeout_ms: u64,
    pub health_timeout_ms: u64,
    pub health_poll_interval_ms: u64,
    pub revert_poll_interval_ms: u64,
    /// `physical_map` tier name → downstream base URL.
    pub downstreams: BTreeMap<String, String>,
    pub controller: ControllerTuning,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        GatewayConfig {
            listen_addr: "0.0.0.0:8080".into(),
            topology_path: PathBuf::from("topology.json"),
            routing_mode: RoutingMode::Virtual,
            failover_mode: FailoverMode::Predictive,
            primary: PrimaryTier::Edge,
            default_paths: 3,
            ingress_timeout_ms: 5_000,
            health_timeout_ms: 2_000,
            health_poll_interval_ms: 2_000,
            revert_poll_interval_ms: 1_000,
            downstreams: BTreeMap::new(),
            controller: ControllerTuning::default(),
        }
    }
}

impl GatewayConfig {
    /// Load from a TOML file (or defaults when absent), then apply
    /// `TRELLIS_*` environment overrides.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("cannot read config {}", path.display()))?;
                toml::from_str(&text)
                    .with_context(|| format!("invalid config {}", path.display()))?
            }
            None => GatewayConfig::default(),
        };
        config.apply_env();
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(addr) = std::env::var("TRELLIS_LISTEN_ADDR") {
            self.listen_addr = addr;
        }
        if let Ok(path) = std::env::var("TRELLIS_TOPOLOGY") {
            self.topology_path = PathBuf::from(path);
        }
        if let Ok(mode) = std::env::var("TRELLIS_MODE") {
            match mode.as_str() {
                "reactive" => self.failover_mode = FailoverMode::Reactive,
                "warm" => self.failover_mode = FailoverMode::Warm,
                "cold" => self.failover_mode = FailoverMode::Cold,
                "predictive" => self.failover_mode = FailoverMode::Predictive,
                other => tracing::warn!(mode = other, "unknown TRELLIS_MODE, keeping configured"),
            }
        }
        if let Ok(routing) = std::env::var("TRELLIS_ROUTING") {
            match routing.as_str() {
                "physical" => self.routing_mode = RoutingMode::Physical,
                "virtual" => self.routing_mode = RoutingMode::Virtual,
                other => {
                    tracing::warn!(routing = other, "unknown TRELLIS_ROUTING, keeping configured")
                }
            }
        }
        if let Ok(primary) = std::env::var("TRELLIS_PRIMARY") {
            match primary.as_str() {
                "edge" => self.primary = PrimaryTier::Edge,
                "cloud" => self.primary = PrimaryTier::Cloud,
                other => {
                    tracing::warn!(primary = other, "unknown TRELLIS_PRIMARY, keeping configured")
                }
            }
        }
    }

    pub fn controller_config(&self) -> ControllerConfig {
        self.controller
            .to_controller_config(self.routing_mode, self.failover_mode)
    }

    pub fn ingress_timeout(&self) -> Duration {
        Duration::from_millis(self.ingress_timeout_ms)
    }

    pub fn health_timeout(&self) -> Duration {
        Duration::from_millis(self.health_timeout_ms)
    }
}
