//! Controller state and configuration endpoints.
//!
//! GET  /api/controller/state     — telemetry + per-path snapshot
//! POST /api/controller/config    — runtime-mutable primary/mode
//! GET  /api/controller/incidents — recent incident ring

use axum::extract::{Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use trellis_common::incident::Incident;
use trellis_common::models::{FailoverMode, PrimaryTier};
use trellis_common::protocol::{ConfigUpdate, ControllerStateView};

use crate::api::ApiError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/state", get(read_state))
        .route("/config", post(update_config))
        .route("/incidents", get(read_incidents))
}

async fn read_state(State(state): State<AppState>) -> Json<ControllerStateView> {
    let controller = state.controller().lock().await;
    Json(controller.state_view())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ConfigResponse {
    primary: PrimaryTier,
    mode: FailoverMode,
}

async fn update_config(
    State(state): State<AppState>,
    Json(update): Json<ConfigUpdate>,
) -> Result<Json<ConfigResponse>, ApiError> {
    if let Some(primary) = update.primary {
        state.set_primary(primary).await;
    }
    let mode = {
        let mut controller = state.controller().lock().await;
        if let Some(mode) = update.mode {
            controller.set_failover_mode(mode);
        }
        controller.failover_mode()
    };

    Ok(Json(ConfigResponse {
        primary: state.primary().await,
        mode,
    }))
}

#[derive(Debug, Deserialize)]
struct IncidentQuery {
    #[serde(default = "default_limit")]
    limit: usize,
}

fn default_limit() -> usize {
    50
}

async fn read_incidents(
    State(state): State<AppState>,
    Query(query): Query<IncidentQuery>,
) -> Json<Vec<Incident>> {
    let controller = state.controller().lock().await;
    Json(controller.incidents(query.limit))
}
