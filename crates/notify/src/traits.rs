//! Sink trait, event payloads, and shared error types.

use chrono::{DateTime, Utc};
use leadsync_core::{DayKey, Provenance, Record};
use serde::Serialize;

/// Errors that can occur during event delivery.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("SMTP delivery failed: {0}")]
    Smtp(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Event serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Delta published after a cycle installed new records.
#[derive(Debug, Clone, Serialize)]
pub struct NewRecords {
    pub count: usize,
    pub records: Vec<Record>,
    pub provenance: Provenance,
    pub day_key: DayKey,
    /// Rows cut off by the ledger capacity ceiling.
    pub dropped: usize,
}

/// Notice that the ledger was emptied at local midnight.
#[derive(Debug, Clone, Serialize)]
pub struct LedgerCleared {
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub previous_day_key: Option<DayKey>,
    pub new_day_key: DayKey,
}

/// Everything the ingestion core publishes.
///
/// Serializes as `{"type": "<name>", "data": {...}}`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "kebab-case")]
pub enum LedgerEvent {
    NewRecords(NewRecords),
    LedgerCleared(LedgerCleared),
}

impl LedgerEvent {
    pub fn new_records(records: Vec<Record>, provenance: Provenance, day_key: DayKey, dropped: usize) -> Self {
        Self::NewRecords(NewRecords {
            count: records.len(),
            records,
            provenance,
            day_key,
            dropped,
        })
    }

    pub fn ledger_cleared(previous_day_key: Option<DayKey>, new_day_key: DayKey, timestamp: DateTime<Utc>) -> Self {
        Self::LedgerCleared(LedgerCleared {
            message: format!("New day started ({new_day_key}). Lead list cleared."),
            timestamp,
            previous_day_key,
            new_day_key,
        })
    }

    /// Wire name, matching the serialized `type` tag.
    pub fn name(&self) -> &'static str {
        match self {
            Self::NewRecords(_) => "new-records",
            Self::LedgerCleared(_) => "ledger-cleared",
        }
    }

    pub fn to_json(&self) -> Result<String, NotifyError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Short human-readable subject and body, for channels that cannot carry the records.
    pub fn summary(&self) -> (String, String) {
        match self {
            Self::NewRecords(e) => (
                format!("[leadsync] {} new leads for {}", e.count, e.day_key),
                format!(
                    "Loaded {} leads from \"{}\" ({}), received {}.{}",
                    e.count,
                    e.provenance.subject,
                    e.provenance.file_name,
                    e.provenance.message_date.to_rfc3339(),
                    if e.dropped > 0 {
                        format!(" {} rows exceeded the ledger capacity and were dropped.", e.dropped)
                    } else {
                        String::new()
                    }
                ),
            ),
            Self::LedgerCleared(e) => (format!("[leadsync] ledger cleared for {}", e.new_day_key), e.message.clone()),
        }
    }
}

/// Trait for event delivery channel implementations.
#[async_trait::async_trait]
pub trait EventSink: Send + Sync {
    /// Deliver one event. Callers treat delivery as fire-and-forget.
    async fn publish(&self, event: &LedgerEvent) -> Result<(), NotifyError>;

    /// Human-readable name for this channel (e.g., "webhook", "email").
    fn channel_name(&self) -> &str;
}
