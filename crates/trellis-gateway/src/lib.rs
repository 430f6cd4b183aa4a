//! Trellis gateway library surface.
//!
//! The binary in `main.rs` wires these pieces together; tests build
//! the same router against an in-memory controller.

pub mod api;
pub mod config;
pub mod state;
pub mod workers;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the full application router.
pub fn app(state: AppState) -> Router {
    Router::new()
        .nest("/api", api::router())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
