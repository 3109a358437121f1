//! Scheduler status and manual trigger.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use leadsync_poller::{CycleOutcome, PollerStatus};
use serde::Serialize;
use tracing::info;

use crate::state::AppState;

#[derive(Serialize)]
pub struct PollerStatusResponse {
    pub success: bool,
    pub data: PollerStatus,
}

pub async fn poller_status(State(state): State<Arc<AppState>>) -> Json<PollerStatusResponse> {
    Json(PollerStatusResponse {
        success: true,
        data: state.scheduler.status(),
    })
}

#[derive(Serialize)]
pub struct TriggerResponse {
    pub success: bool,
    pub outcome: CycleOutcome,
}

/// Run one cycle and answer when it finishes.
///
/// `409` when a cycle was already in flight, `500` when the cycle failed.
pub async fn trigger_poll(State(state): State<Arc<AppState>>) -> (StatusCode, Json<TriggerResponse>) {
    info!("manual poll requested");
    let outcome = state.scheduler.trigger().await;
    let status = match &outcome {
        CycleOutcome::Skipped => StatusCode::CONFLICT,
        CycleOutcome::Failed { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::OK,
    };
    (
        status,
        Json(TriggerResponse {
            success: status == StatusCode::OK,
            outcome,
        }),
    )
}
