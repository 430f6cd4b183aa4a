//! Shared types for the Trellis gateway.
//!
//! This crate contains:
//! - **Data models** — tiers, routing/failover modes, path status, node health
//! - **Wire payloads** — ingress event batches, responses, state views, fault requests
//! - **Incidents** — typed incident records kept in the telemetry ring
//! - **Error kinds** — the gateway-wide error enum

pub mod error;
pub mod incident;
pub mod models;
pub mod protocol;

pub use error::GatewayError;
