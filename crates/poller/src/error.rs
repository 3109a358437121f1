use std::time::Duration;

use leadsync_core::DayKey;
use leadsync_mailbox::MailboxError;
use thiserror::Error;

/// Why a polling cycle ended without completing.
#[derive(Error, Debug)]
pub enum CycleError {
    #[error("Mailbox error: {0}")]
    Mailbox(#[from] MailboxError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cycle timed out after {0:?}")]
    Timeout(Duration),

    #[error("Cycle panicked: {0}")]
    Panicked(String),

    #[error("Blocking task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Invalid `POLL_CADENCE` value.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CadenceError {
    #[error("Poll cadence is empty")]
    Empty,

    #[error("Poll interval must be greater than zero")]
    ZeroInterval,

    #[error("Invalid poll cadence '{input}': {reason}")]
    Invalid { input: String, reason: String },
}

/// A ledger write that was refused.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Batch for {batch} refused, ledger already holds {current}")]
    StaleDay { batch: DayKey, current: DayKey },
}
