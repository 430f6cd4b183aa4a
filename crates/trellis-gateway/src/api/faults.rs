//! Virtual-node latency fault endpoints.
//!
//! POST /api/faults/inject — add latency to every link of a node
//! POST /api/faults/remove — restore the node's links to base delay

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::Serialize;
use tracing::info;

use trellis_common::protocol::NodeFaultRequest;

use crate::api::ApiError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/inject", post(inject_fault))
        .route("/remove", post(remove_fault))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FaultResponse {
    virtual_node_id: u64,
    affected_links: usize,
}

async fn inject_fault(
    State(state): State<AppState>,
    Json(request): Json<NodeFaultRequest>,
) -> Result<Json<FaultResponse>, ApiError> {
    if request.latency_ms < 0.0 {
        return Err(ApiError::bad_request("latencyMs must be non-negative"));
    }

    let affected = {
        let mut controller = state.controller().lock().await;
        controller.inject_virtual_node_fault(request.virtual_node_id, request.latency_ms)?
    };

    info!(
        node_id = request.virtual_node_id,
        latency_ms = request.latency_ms,
        affected,
        "virtual node fault injected"
    );
    Ok(Json(FaultResponse {
        virtual_node_id: request.virtual_node_id,
        affected_links: affected,
    }))
}

async fn remove_fault(
    State(state): State<AppState>,
    Json(request): Json<NodeFaultRequest>,
) -> Result<Json<FaultResponse>, ApiError> {
    let affected = {
        let mut controller = state.controller().lock().await;
        controller.remove_virtual_node_fault(request.virtual_node_id)?
    };

    info!(
        node_id = request.virtual_node_id,
        affected, "virtual node fault removed"
    );
    Ok(Json(FaultResponse {
        virtual_node_id: request.virtual_node_id,
        affected_links: affected,
    }))
}
