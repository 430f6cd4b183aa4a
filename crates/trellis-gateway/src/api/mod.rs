//! REST API route tree.

pub mod controller;
pub mod faults;
pub mod ingress;

use axum::http::StatusCode;
use axum::{Json, Router};

use trellis_common::GatewayError;

use crate::state::AppState;

/// Build the `/api` router.
pub fn router() -> Router<AppState> {
    Router::new()
        .nest("/ingress", ingress::router())
        .nest("/controller", controller::router())
        .nest("/faults", faults::router())
}

/// Structured error response: status + `{ "error": message }` body.
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: msg.into(),
        }
    }
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: msg.into(),
        }
    }
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::SERVICE_UNAVAILABLE,
            message: msg.into(),
        }
    }
    pub fn internal(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: msg.into(),
        }
    }
}

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        match &err {
            GatewayError::InvalidPayload(_) => ApiError::bad_request(err.to_string()),
            GatewayError::UnknownNode(_) => ApiError::not_found(err.to_string()),
            GatewayError::NoPathAvailable { .. } => ApiError::unavailable(err.to_string()),
            GatewayError::TopologyLoad(_)
            | GatewayError::ForwardingTimeout { .. }
            | GatewayError::RebalanceInfeasible(_) => ApiError::internal(err.to_string()),
        }
    }
}

impl axum::response::IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let body = serde_json::json!({ "error": self.message });
        (self.status, Json(body)).into_response()
    }
}
