//! Paginated listing of the current day's leads.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use leadsync_core::{DayKey, Record};
use serde::{Deserialize, Serialize};

use crate::state::AppState;

pub const DEFAULT_PAGE_SIZE: usize = 50;
pub const MAX_PAGE_SIZE: usize = 1000;

/// Raw query parameters. Non-numeric or zero values fall back to the defaults.
#[derive(Debug, Default, Deserialize)]
pub struct LeadsQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
}

fn positive_or(raw: Option<&str>, default: usize) -> usize {
    raw.and_then(|s| s.trim().parse::<usize>().ok())
        .filter(|n| *n > 0)
        .unwrap_or(default)
}

#[derive(Serialize)]
pub struct LeadsResponse {
    pub success: bool,
    pub count: usize,
    pub total: usize,
    pub page: usize,
    pub total_pages: usize,
    pub date: DayKey,
    pub data: Vec<Record>,
}

pub async fn list_leads(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LeadsQuery>,
) -> Json<LeadsResponse> {
    let page = positive_or(query.page.as_deref(), 1);
    let limit = positive_or(query.limit.as_deref(), DEFAULT_PAGE_SIZE).min(MAX_PAGE_SIZE);
    let offset = (page - 1).saturating_mul(limit);

    let result = state.ledger.list_records(offset, limit);
    let date = result.day_key.unwrap_or_else(|| state.current_day());

    Json(LeadsResponse {
        success: true,
        count: result.records.len(),
        total: result.total,
        page,
        total_pages: result.total.div_ceil(limit),
        date,
        data: result.records,
    })
}
