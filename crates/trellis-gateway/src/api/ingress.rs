//! Batch ingress endpoint.
//!
//! POST /api/ingress — accept an event batch, dispatch it through the
//! controller, and answer with the accept/drop accounting.
//!
//! The failover decision is computed under the controller lock; the
//! cold-mode spin-up sleep and any downstream forwarding happen after
//! the lock is released. A forwarding timeout is not an error — it is
//! swallowed into an elevated latency sample and the predictive
//! trigger takes it from there.

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use chrono::Utc;
use quanta::Instant;
use tracing::warn;

use trellis_common::models::RoutingMode;
use trellis_common::protocol::{Event, IngressResponse};
use trellis_common::GatewayError;

use crate::api::ApiError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/", post(ingest_batch))
}

async fn ingest_batch(
    State(state): State<AppState>,
    Json(events): Json<Vec<Event>>,
) -> Result<Json<IngressResponse>, ApiError> {
    if events.is_empty() {
        return Err(ApiError::bad_request("batch must contain at least one event"));
    }
    for event in &events {
        event.validate().map_err(ApiError::bad_request)?;
    }

    let now = Instant::now();
    let ts_ms = Utc::now().timestamp_millis();

    // Decision under the lock.
    let outcome = {
        let mut controller = state.controller().lock().await;
        controller.ingest(&events, now, ts_ms)?
    };

    // Cold-mode spin-up runs outside the lock, then the incident closes.
    if let Some(pending) = outcome.pending_failover {
        if let Some(delay) = pending.spin_up {
            tokio::time::sleep(delay).await;
        }
        let mut controller = state.controller().lock().await;
        controller.complete_failover(pending, Instant::now());
    }

    // Physical mode: forward the surviving events to the first hop.
    // Failure here is not an ingress error; it surfaces as telemetry.
    if let Some(target) = &outcome.forward_to {
        if let Err(error) = forward_batch(&state, target, &events).await {
            warn!(%error, "recording forwarding failure as a latency spike");
            let timeout_ms = state.config().ingress_timeout_ms as f64;
            let mut controller = state.controller().lock().await;
            controller.observe_latency(Utc::now().timestamp_millis(), timeout_ms);
        }
    }

    // Virtual mode: the batch experiences its simulated path latency.
    if state.config().routing_mode == RoutingMode::Virtual {
        let delay = outcome.response.end_to_end_latency_ms.max(0.0) / 1000.0;
        tokio::time::sleep(std::time::Duration::from_secs_f64(delay)).await;
    }

    Ok(Json(outcome.response))
}

/// Fire the batch at the downstream node mapped to `target`.
async fn forward_batch(
    state: &AppState,
    target: &str,
    events: &[Event],
) -> Result<(), GatewayError> {
    let Some(base_url) = state.config().downstreams.get(target) else {
        return Ok(()); // No downstream mapped; simulation-only deployment.
    };
    let url = format!("{}/ingest", base_url.trim_end_matches('/'));
    let timeout = state.config().ingress_timeout();

    state
        .http()
        .post(&url)
        .timeout(timeout)
        .json(events)
        .send()
        .await
        .map_err(|_| GatewayError::ForwardingTimeout {
            target: url,
            timeout_ms: state.config().ingress_timeout_ms,
        })?;
    Ok(())
}
