//! Gateway-wide error kinds.
//!
//! Propagation rules: `TopologyLoad` is fatal at startup;
//! `ForwardingTimeout` is swallowed at the handler layer into a latency
//! spike; `RebalanceInfeasible` logs and keeps the current distribution;
//! validation errors are answered immediately.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("topology load failed: {0}")]
    TopologyLoad(String),

    #[error("no path available from {src} to {dst}")]
    NoPathAvailable { src: u64, dst: u64 },

    #[error("forwarding to {target} timed out after {timeout_ms} ms")]
    ForwardingTimeout { target: String, timeout_ms: u64 },

    #[error("rebalance infeasible: {0}")]
    RebalanceInfeasible(String),

    #[error("unknown node {0}")]
    UnknownNode(u64),
}

impl GatewayError {
    /// Whether the gateway must refuse to start on this error.
    pub fn is_fatal(&self) -> bool {
        matches!(self, GatewayError::TopologyLoad(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_topology_load_is_fatal() {
        assert!(GatewayError::TopologyLoad("bad descriptor".into()).is_fatal());
        assert!(!GatewayError::UnknownNode(9).is_fatal());
        assert!(!GatewayError::ForwardingTimeout {
            target: "http://edge-a/ingest".into(),
            timeout_ms: 5_000,
        }
        .is_fatal());
    }

    #[test]
    fn messages_carry_context() {
        let err = GatewayError::NoPathAvailable { src: 1, dst: 19 };
        assert_eq!(err.to_string(), "no path available from 1 to 19");
    }
}
