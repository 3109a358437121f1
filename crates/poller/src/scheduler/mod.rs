//! Ingestion scheduling.
//!
//! [`IngestionScheduler`] runs polling cycles on a [`PollCadence`], at most one
//! at a time. Each cycle selects the newest qualifying report message,
//! normalizes its attachments, replaces the ledger, and publishes the delta.
//! A separate timer clears the ledger at local midnight.

mod cadence;
mod cycle;
mod runner;
mod state;

#[cfg(test)]
mod tests;

pub use self::cadence::{next_local_midnight, parse_duration, PollCadence};
pub use self::runner::{IngestionScheduler, SchedulerSettings};
pub use self::state::{CycleOutcome, PollerMetrics, PollerState, PollerStatus};
