//! Scheduler state machine, cycle outcomes, and operational metrics.

use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Where the scheduler is in its poll loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "next_run", rename_all = "snake_case")]
pub enum PollerState {
    /// Stopped, or running with no next time armed yet.
    Idle,
    /// A cycle is in flight.
    Polling,
    Scheduled(DateTime<Utc>),
}

/// What one trigger of the scheduler did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CycleOutcome {
    /// No message matched today's date text.
    NoCandidates,
    /// The selected message's attachments held no data rows. Ledger emptied.
    NoRows { subject: String },
    Ingested {
        subject: String,
        candidates: usize,
        accepted: usize,
        dropped: usize,
    },
    /// Local midnight passed while the cycle ran; its batch was discarded.
    DayChanged { subject: String },
    /// Another cycle was already in flight.
    Skipped,
    Failed { error: String },
}

impl CycleOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PollerMetrics {
    pub cycles_run: u64,
    pub cycles_skipped: u64,
    pub cycles_failed: u64,
    pub last_started_at: Option<DateTime<Utc>>,
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub last_outcome: Option<CycleOutcome>,
}

impl PollerMetrics {
    pub fn record(&mut self, outcome: &CycleOutcome, finished_at: DateTime<Utc>) {
        match outcome {
            CycleOutcome::Skipped => {
                self.cycles_skipped += 1;
                return;
            }
            CycleOutcome::Failed { error } => {
                self.cycles_failed += 1;
                self.last_error = Some(error.clone());
            }
            _ => self.last_success_at = Some(finished_at),
        }
        self.cycles_run += 1;
        self.last_outcome = Some(outcome.clone());
    }
}

/// Snapshot served by the status endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct PollerStatus {
    pub running: bool,
    #[serde(flatten)]
    pub state: PollerState,
    pub cadence: String,
    pub metrics: PollerMetrics,
}

/// Holds the at-most-one-cycle flag for as long as it lives.
pub(crate) struct PollingGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> PollingGuard<'a> {
    /// `None` when a cycle is already in flight.
    pub(crate) fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for PollingGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_is_exclusive_and_released_on_drop() {
        let flag = AtomicBool::new(false);
        let guard = PollingGuard::acquire(&flag).unwrap();
        assert!(PollingGuard::acquire(&flag).is_none());
        drop(guard);
        assert!(PollingGuard::acquire(&flag).is_some());
    }

    #[test]
    fn guard_released_when_holder_panics() {
        let flag = AtomicBool::new(false);
        let result = std::panic::catch_unwind(|| {
            let _guard = PollingGuard::acquire(&flag).unwrap();
            panic!("cycle blew up");
        });
        assert!(result.is_err());
        assert!(!flag.load(Ordering::Acquire));
    }

    #[test]
    fn metrics_count_each_kind() {
        let mut metrics = PollerMetrics::default();
        let now = Utc::now();
        metrics.record(&CycleOutcome::NoCandidates, now);
        metrics.record(&CycleOutcome::Skipped, now);
        metrics.record(
            &CycleOutcome::Failed {
                error: "boom".into(),
            },
            now,
        );

        assert_eq!(metrics.cycles_run, 2);
        assert_eq!(metrics.cycles_skipped, 1);
        assert_eq!(metrics.cycles_failed, 1);
        assert_eq!(metrics.last_error.as_deref(), Some("boom"));
        assert_eq!(metrics.last_success_at, Some(now));
        assert!(metrics.last_outcome.as_ref().unwrap().is_failure());
    }

    #[test]
    fn state_serializes_with_next_run() {
        let json = serde_json::to_value(PollerState::Idle).unwrap();
        assert_eq!(json["state"], "idle");

        let at = Utc::now();
        let json = serde_json::to_value(PollerState::Scheduled(at)).unwrap();
        assert_eq!(json["state"], "scheduled");
        assert!(json["next_run"].is_string());
    }
}
