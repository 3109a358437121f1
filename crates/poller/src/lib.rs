//! Polling-and-ingestion core.
//!
//! This crate provides:
//! - `MemoryLedger`, the bounded current-day record store read by the query layer
//! - `IngestionScheduler`, which polls the mailbox on a cadence, normalizes the
//!   newest qualifying report, replaces the ledger, and publishes the delta
//! - Cadence parsing (fixed intervals and cron wall-clock slots)

pub mod error;
pub mod ledger;
pub mod scheduler;

pub use error::{CadenceError, CycleError, LedgerError};
pub use ledger::{DaySnapshot, LedgerStats, MemoryLedger, RecordPage, ReplaceOutcome};
pub use scheduler::{
    CycleOutcome, IngestionScheduler, PollCadence, PollerMetrics, PollerState, PollerStatus,
    SchedulerSettings,
};
