//! HTTP router construction.

use std::sync::Arc;

use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::warn;

use crate::state::AppState;
use crate::{api, live};

/// Build the complete application router with all routes and middleware.
pub fn build_router(state: Arc<AppState>, cors: CorsLayer) -> Router {
    Router::new()
        .route("/health", get(api::health))
        .route("/api/leads", get(api::list_leads))
        .route("/api/stats", get(api::stats))
        .route("/api/config", get(api::config_summary))
        .route("/api/poller", get(api::poller_status))
        .route("/api/poller/trigger", post(api::trigger_poll))
        .route("/ws", get(live::ws_upgrade))
        .layer(cors)
        .with_state(state)
}

/// CORS policy for `CORS_ORIGIN`: `*`, or a comma-separated origin list.
pub fn cors_layer(origin: &str) -> CorsLayer {
    let origin = origin.trim();
    if origin == "*" {
        return CorsLayer::permissive();
    }

    let mut origins = Vec::new();
    for entry in origin.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        match HeaderValue::from_str(entry) {
            Ok(value) => origins.push(value),
            Err(_) => warn!(origin = entry, "ignoring invalid CORS origin"),
        }
    }
    if origins.is_empty() {
        warn!("no valid CORS origins configured, cross-origin requests disabled");
    }

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any)
}
