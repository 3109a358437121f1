//! Bounded in-memory store for the current day's records.
//!
//! The ledger holds exactly one day's records at a time. Every successful
//! ingestion cycle replaces the set wholesale, and local midnight clears it.
//! Readers take a cheap `Arc` clone of the current snapshot, so a reader
//! always sees either the old set or the new one, never a mix.

use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use leadsync_core::{DayKey, Record};
use serde::Serialize;
use tracing::{info, warn};

use crate::error::LedgerError;

/// One immutable view of the ledger.
#[derive(Debug, Clone, Default)]
pub struct DaySnapshot {
    pub day_key: Option<DayKey>,
    pub records: Vec<Record>,
    /// When this snapshot was installed.
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReplaceOutcome {
    pub accepted: usize,
    pub dropped: usize,
}

/// A page of the current day's records.
#[derive(Debug, Clone, Serialize)]
pub struct RecordPage {
    pub records: Vec<Record>,
    /// Total records in the ledger, not just this page.
    pub total: usize,
    pub day_key: Option<DayKey>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LedgerStats {
    pub total_records: usize,
    pub latest_observed_at: Option<DateTime<Utc>>,
    pub current_day_key: Option<DayKey>,
}

/// The only owner of the current record set.
#[derive(Debug)]
pub struct MemoryLedger {
    capacity: usize,
    current: RwLock<Arc<DaySnapshot>>,
}

impl MemoryLedger {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            current: RwLock::new(Arc::new(DaySnapshot::default())),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Discard the previous set and install `records` for `day_key`.
    ///
    /// Keeps the first `capacity` records in input order. Overflow is not an
    /// error; the dropped count is returned and logged. A batch for a day
    /// earlier than the stored one is refused and the ledger left as is.
    pub fn replace_day(
        &self,
        day_key: DayKey,
        mut records: Vec<Record>,
    ) -> Result<ReplaceOutcome, LedgerError> {
        let mut guard = self.current.write().unwrap_or_else(|e| e.into_inner());
        if let Some(current) = guard.day_key.filter(|current| day_key < *current) {
            warn!(
                batch_day = %day_key,
                %current,
                discarded = records.len(),
                "batch for a past day refused"
            );
            return Err(LedgerError::StaleDay {
                batch: day_key,
                current,
            });
        }

        let received = records.len();
        let dropped = received.saturating_sub(self.capacity);
        if dropped > 0 {
            records.truncate(self.capacity);
            warn!(
                %day_key,
                received,
                capacity = self.capacity,
                dropped,
                "ledger capacity reached, extra records dropped"
            );
        }
        let accepted = records.len();

        *guard = Arc::new(DaySnapshot {
            day_key: Some(day_key),
            records,
            updated_at: Some(Utc::now()),
        });
        drop(guard);

        info!(%day_key, accepted, dropped, "ledger replaced");
        Ok(ReplaceOutcome { accepted, dropped })
    }

    /// The live snapshot. Cheap; never blocks on a writer for long.
    pub fn current(&self) -> Arc<DaySnapshot> {
        self.current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Clear the ledger when `now_day_key` differs from the stored day.
    ///
    /// Returns `true` when records were cleared. An unset day is simply
    /// adopted without counting as a rollover.
    pub fn rollover_if_needed(&self, now_day_key: DayKey) -> bool {
        let mut guard = self.current.write().unwrap_or_else(|e| e.into_inner());
        let stored = guard.day_key;
        match stored {
            Some(day) if day == now_day_key => false,
            None => {
                let adopted = DaySnapshot {
                    day_key: Some(now_day_key),
                    records: guard.records.clone(),
                    updated_at: guard.updated_at,
                };
                *guard = Arc::new(adopted);
                false
            }
            Some(previous) => {
                let cleared = guard.records.len();
                *guard = Arc::new(DaySnapshot {
                    day_key: Some(now_day_key),
                    records: Vec::new(),
                    updated_at: Some(Utc::now()),
                });
                info!(%previous, new_day = %now_day_key, cleared, "day rollover, ledger cleared");
                true
            }
        }
    }

    /// Records `offset..offset + limit` of the current set.
    pub fn list_records(&self, offset: usize, limit: usize) -> RecordPage {
        let snapshot = self.current();
        let records = snapshot
            .records
            .iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect();
        RecordPage {
            records,
            total: snapshot.records.len(),
            day_key: snapshot.day_key,
        }
    }

    pub fn stats(&self) -> LedgerStats {
        let snapshot = self.current();
        LedgerStats {
            total_records: snapshot.records.len(),
            latest_observed_at: snapshot.records.iter().map(|r| r.observed_at).max(),
            current_day_key: snapshot.day_key,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use leadsync_core::{Fields, Provenance};

    fn day(s: &str) -> DayKey {
        s.parse().unwrap()
    }

    fn records(n: usize, day_key: DayKey) -> Vec<Record> {
        let provenance = Provenance {
            subject: "Leads".into(),
            file_name: "leads.xlsx".into(),
            message_date: Utc::now(),
        };
        (0..n)
            .map(|i| {
                let mut fields = Fields::new();
                fields.insert("Row".into(), i.to_string());
                Record::new(fields, &provenance, Utc::now(), day_key)
            })
            .collect()
    }

    #[test]
    fn replace_truncates_keeping_first_records() {
        let ledger = MemoryLedger::new(2);
        let d = day("2025-10-19");
        let outcome = ledger.replace_day(d, records(5, d)).unwrap();

        assert_eq!(outcome, ReplaceOutcome { accepted: 2, dropped: 3 });
        let snapshot = ledger.current();
        assert_eq!(snapshot.records.len(), 2);
        assert_eq!(snapshot.records[0].fields["Row"], "0");
        assert_eq!(snapshot.records[1].fields["Row"], "1");
    }

    #[test]
    fn accepted_plus_dropped_equals_input() {
        let d = day("2025-10-19");
        for capacity in [0, 1, 3, 10] {
            let ledger = MemoryLedger::new(capacity);
            for n in [0, 1, 3, 7] {
                let outcome = ledger.replace_day(d, records(n, d)).unwrap();
                assert_eq!(outcome.accepted + outcome.dropped, n);
                assert!(ledger.current().records.len() <= capacity);
            }
        }
    }

    #[test]
    fn replace_is_not_a_merge() {
        let ledger = MemoryLedger::new(100);
        let d = day("2025-10-19");
        ledger.replace_day(d, records(4, d)).unwrap();
        ledger.replace_day(d, records(1, d)).unwrap();
        assert_eq!(ledger.current().records.len(), 1);
    }

    #[test]
    fn old_snapshot_survives_replacement() {
        let ledger = MemoryLedger::new(100);
        let d = day("2025-10-19");
        ledger.replace_day(d, records(3, d)).unwrap();
        let before = ledger.current();
        ledger.replace_day(d, records(1, d)).unwrap();

        assert_eq!(before.records.len(), 3);
        assert_eq!(ledger.current().records.len(), 1);
    }

    #[test]
    fn rollover_clears_on_new_day() {
        let ledger = MemoryLedger::new(100);
        let d1 = day("2025-10-19");
        ledger.replace_day(d1, records(3, d1)).unwrap();

        assert!(!ledger.rollover_if_needed(d1));
        assert_eq!(ledger.current().records.len(), 3);

        let d2 = day("2025-10-20");
        assert!(ledger.rollover_if_needed(d2));
        let snapshot = ledger.current();
        assert!(snapshot.records.is_empty());
        assert_eq!(snapshot.day_key, Some(d2));
        assert!(!ledger.rollover_if_needed(d2));
    }

    #[test]
    fn rollover_on_empty_ledger_adopts_day() {
        let ledger = MemoryLedger::new(10);
        assert!(!ledger.rollover_if_needed(day("2025-10-19")));
        assert_eq!(ledger.stats().current_day_key, Some(day("2025-10-19")));
    }

    #[test]
    fn list_records_pages_through_current_set() {
        let ledger = MemoryLedger::new(100);
        let d = day("2025-10-19");
        ledger.replace_day(d, records(5, d)).unwrap();

        let page = ledger.list_records(2, 2);
        assert_eq!(page.total, 5);
        assert_eq!(page.day_key, Some(d));
        let rows: Vec<&str> = page.records.iter().map(|r| r.fields["Row"].as_str()).collect();
        assert_eq!(rows, vec!["2", "3"]);

        assert!(ledger.list_records(10, 5).records.is_empty());
    }

    #[test]
    fn stats_reflect_current_set() {
        let ledger = MemoryLedger::new(100);
        let empty = ledger.stats();
        assert_eq!(empty.total_records, 0);
        assert!(empty.latest_observed_at.is_none());

        let d = day("2025-10-19");
        let batch = records(2, d);
        let latest = batch.iter().map(|r| r.observed_at).max();
        ledger.replace_day(d, batch).unwrap();

        let stats = ledger.stats();
        assert_eq!(stats.total_records, 2);
        assert_eq!(stats.latest_observed_at, latest);
        assert_eq!(stats.current_day_key, Some(d));
    }

    #[test]
    fn batch_for_a_past_day_is_refused() {
        let ledger = MemoryLedger::new(100);
        let d1 = day("2025-10-19");
        let d2 = day("2025-10-20");
        ledger.replace_day(d1, records(3, d1)).unwrap();
        assert!(ledger.rollover_if_needed(d2));

        let err = ledger.replace_day(d1, records(2, d1)).unwrap_err();
        assert_eq!(err, LedgerError::StaleDay { batch: d1, current: d2 });
        let snapshot = ledger.current();
        assert_eq!(snapshot.day_key, Some(d2));
        assert!(snapshot.records.is_empty());

        ledger.replace_day(d2, records(1, d2)).unwrap();
        assert_eq!(ledger.current().records.len(), 1);
    }
}
