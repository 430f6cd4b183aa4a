//! Background worker tasks.
//!
//! Two loops share the controller with the ingress handlers:
//! - the **health poller** fetches per-node CPU/buffer reports from
//!   the mapped downstreams every couple of seconds and feeds the
//!   resource-pressure trigger, emitting node-down/node-recover
//!   incidents on reachability flips;
//! - the **revert stepper** periodically walks the recovery FSM and,
//!   when a gradual revert is scheduled, applies each step at its
//!   timestamp.
//!
//! Both loops take the lock only to read or apply a decision; every
//! HTTP call and sleep happens outside it.

use std::collections::HashSet;
use std::time::Duration;

use quanta::Instant;
use tracing::{debug, warn};

use trellis_common::incident::{Incident, IncidentDetails, IncidentSeverity};
use trellis_common::models::NodeHealth;
use trellis_common::protocol::NodeHealthReport;

use crate::state::AppState;

/// Spawn the health poller and the revert stepper.
pub fn spawn(state: AppState) {
    tokio::spawn(health_poll_loop(state.clone()));
    tokio::spawn(revert_loop(state));
}

async fn health_poll_loop(state: AppState) {
    let interval = Duration::from_millis(state.config().health_poll_interval_ms.max(100));
    let timeout = state.config().health_timeout();
    let mut unreachable: HashSet<u64> = HashSet::new();

    loop {
        tokio::time::sleep(interval).await;

        // Snapshot targets under the lock, poll outside it.
        let targets: Vec<(u64, String)> = {
            let controller = state.controller().lock().await;
            controller
                .topology()
                .nodes()
                .filter_map(|node| {
                    state
                        .config()
                        .downstreams
                        .get(&node.physical_map)
                        .map(|base| (node.id, format!("{}/health", base.trim_end_matches('/'))))
                })
                .collect()
        };

        for (node_id, url) in targets {
            let report = state
                .http()
                .get(&url)
                .timeout(timeout)
                .send()
                .await
                .and_then(|r| r.error_for_status());

            match report {
                Ok(response) => match response.json::<NodeHealthReport>().await {
                    Ok(health) => {
                        let mut controller = state.controller().lock().await;
                        controller.set_node_health(
                            node_id,
                            NodeHealth {
                                cpu: health.cpu,
                                buffer_pct: health.buffer_pct,
                            },
                        );
                        if unreachable.remove(&node_id) {
                            controller.record_incident(Incident::new(
                                IncidentSeverity::Medium,
                                IncidentDetails::NodeRecover { node_id },
                            ));
                        }
                    }
                    Err(error) => warn!(node_id, %error, "health report parse failed"),
                },
                Err(error) => {
                    debug!(node_id, %error, "health poll failed");
                    if unreachable.insert(node_id) {
                        let mut controller = state.controller().lock().await;
                        controller.record_incident(Incident::new(
                            IncidentSeverity::Medium,
                            IncidentDetails::NodeDown { node_id },
                        ));
                    }
                }
            }
        }
    }
}

async fn revert_loop(state: AppState) {
    let interval = Duration::from_millis(state.config().revert_poll_interval_ms.max(100));

    loop {
        tokio::time::sleep(interval).await;

        let schedule = {
            let mut controller = state.controller().lock().await;
            let (transitions, schedule) = controller.revert_tick(Instant::now());
            for transition in &transitions {
                debug!(
                    path_id = transition.path_id,
                    from = %transition.from,
                    to = %transition.to,
                    "path health transition"
                );
            }
            schedule
        };

        let Some(schedule) = schedule else {
            continue;
        };

        for step in &schedule.steps {
            let wait = step.at.saturating_duration_since(Instant::now());
            if !wait.is_zero() {
                tokio::time::sleep(wait).await;
            }
            let mut controller = state.controller().lock().await;
            controller.apply_revert_step(step);
            debug!(step = step.index, "revert step applied");
        }
    }
}
