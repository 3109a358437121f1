use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Utc};
use leadsync_core::DayKey;
use leadsync_notify::BroadcastSink;
use leadsync_poller::{IngestionScheduler, MemoryLedger};

/// Shared handles behind every route.
pub struct AppState {
    pub ledger: Arc<MemoryLedger>,
    pub scheduler: IngestionScheduler,
    /// Live feed for WebSocket clients; the scheduler publishes into the same channel.
    pub broadcast: BroadcastSink,
    pub offset: FixedOffset,
    /// Redacted configuration, served by `/api/config`.
    pub settings: serde_json::Value,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    /// The ledger's day, or today's local day before the first rollover check.
    pub fn current_day(&self) -> DayKey {
        self.ledger
            .current()
            .day_key
            .unwrap_or_else(|| DayKey::for_instant(Utc::now(), &self.offset))
    }
}
