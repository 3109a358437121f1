//! Liveness and ledger statistics.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use chrono::{DateTime, Utc};
use leadsync_core::DayKey;
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub poller_running: bool,
    pub uptime_secs: i64,
    pub timestamp: DateTime<Utc>,
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let now = Utc::now();
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        poller_running: state.scheduler.is_running(),
        uptime_secs: (now - state.started_at).num_seconds(),
        timestamp: now,
    })
}

/// Ledger summary, shared by `/api/stats` and the live feed's first frame.
#[derive(Debug, Serialize)]
pub struct LeadStats {
    pub total_leads: usize,
    pub latest_update: Option<DateTime<Utc>>,
    pub current_date: DayKey,
}

pub fn lead_stats(state: &AppState) -> LeadStats {
    let stats = state.ledger.stats();
    LeadStats {
        total_leads: stats.total_records,
        latest_update: stats.latest_observed_at,
        current_date: stats.current_day_key.unwrap_or_else(|| state.current_day()),
    }
}

#[derive(Serialize)]
pub struct ConfigResponse {
    pub success: bool,
    pub data: serde_json::Value,
}

pub async fn config_summary(State(state): State<Arc<AppState>>) -> Json<ConfigResponse> {
    Json(ConfigResponse {
        success: true,
        data: state.settings.clone(),
    })
}

#[derive(Serialize)]
pub struct StatsResponse {
    pub success: bool,
    pub data: LeadStats,
}

pub async fn stats(State(state): State<Arc<AppState>>) -> Json<StatsResponse> {
    Json(StatsResponse {
        success: true,
        data: lead_stats(&state),
    })
}
