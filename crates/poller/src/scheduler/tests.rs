//! Scheduler tests against an in-memory mailbox.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, FixedOffset, TimeZone, Utc};
use leadsync_core::config::MailboxConfig;
use leadsync_mailbox::memory::{compose_message, MemoryMailbox};
use leadsync_mailbox::MailboxClient;
use leadsync_notify::{EventSink, LedgerEvent, NotifyError};

use super::*;
use crate::ledger::MemoryLedger;

#[derive(Default)]
struct RecordingSink {
    events: Mutex<Vec<LedgerEvent>>,
    panic_on_publish: bool,
}

impl RecordingSink {
    fn names(&self) -> Vec<&'static str> {
        self.events.lock().unwrap().iter().map(|e| e.name()).collect()
    }
}

#[async_trait::async_trait]
impl EventSink for RecordingSink {
    async fn publish(&self, event: &LedgerEvent) -> Result<(), NotifyError> {
        if self.panic_on_publish {
            panic!("sink exploded");
        }
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }

    fn channel_name(&self) -> &str {
        "recording"
    }
}

fn mailbox_config() -> MailboxConfig {
    MailboxConfig {
        host: "imap.example.com".into(),
        port: 993,
        tls: true,
        username: "inbox@example.com".into(),
        password: "secret".into(),
        folder: "INBOX".into(),
        sender: "reports@example.com".into(),
        subject_pattern: None,
        lookback_days: 30,
        max_message_bytes: 1024 * 1024,
    }
}

fn build(
    mailbox: &MemoryMailbox,
    scratch: &Path,
    sink: Arc<dyn EventSink>,
    timeout: Duration,
) -> IngestionScheduler {
    let settings = SchedulerSettings {
        cadence: "1h".parse().unwrap(),
        run_on_start: false,
        cycle_timeout: timeout,
        offset: FixedOffset::east_opt(330 * 60).unwrap(),
        lookback: chrono::Duration::days(30),
        scratch_dir: scratch.to_path_buf(),
    };
    let client = MailboxClient::new(mailbox_config(), scratch, Arc::new(mailbox.clone()));
    IngestionScheduler::new(settings, client, Arc::new(MemoryLedger::new(100)), sink)
}

/// 11:30 local (+05:30) on 19 October 2025.
fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 10, 19, 6, 0, 0).unwrap()
}

fn push_csv(mailbox: &MemoryMailbox, subject: &str, hour: u32, name: &str, body: &str) -> u32 {
    mailbox.push_raw(compose_message(
        "reports@example.com",
        subject,
        Utc.with_ymd_and_hms(2025, 10, 19, hour, 0, 0).unwrap(),
        &[(name, body.as_bytes())],
    ))
}

fn scratch_is_empty(dir: &Path) -> bool {
    std::fs::read_dir(dir).map(|d| d.count() == 0).unwrap_or(true)
}

#[tokio::test]
async fn no_candidates_leaves_ledger_alone() {
    let mailbox = MemoryMailbox::new();
    let dir = tempfile::tempdir().unwrap();
    let sink = Arc::new(RecordingSink::default());
    let scheduler = build(&mailbox, dir.path(), sink.clone(), Duration::from_secs(5));

    let outcome = scheduler.trigger_at(now()).await;

    assert_eq!(outcome, CycleOutcome::NoCandidates);
    assert_eq!(scheduler.ledger().stats().total_records, 0);
    assert!(sink.names().is_empty());
    assert_eq!(mailbox.logout_count(), 1);
    assert_eq!(scheduler.state(), PollerState::Idle);
}

#[tokio::test]
async fn newest_message_wins_and_scratch_is_cleaned() {
    let mailbox = MemoryMailbox::new();
    push_csv(&mailbox, "Leads 19-October-2025", 2, "early.csv", "Name\nOld\n");
    push_csv(&mailbox, "Leads 19-October-2025 (rerun)", 5, "late.csv", "Name\nNew A\nNew B\n");
    push_csv(&mailbox, "Leads 19-October-2025", 3, "middle.csv", "Name\nMid\n");

    let dir = tempfile::tempdir().unwrap();
    let sink = Arc::new(RecordingSink::default());
    let scheduler = build(&mailbox, dir.path(), sink.clone(), Duration::from_secs(5));

    let outcome = scheduler.trigger_at(now()).await;
    assert_eq!(
        outcome,
        CycleOutcome::Ingested {
            subject: "Leads 19-October-2025 (rerun)".into(),
            candidates: 3,
            accepted: 2,
            dropped: 0,
        }
    );

    let snapshot = scheduler.ledger().current();
    let names: Vec<&str> = snapshot.records.iter().map(|r| r.fields["Name"].as_str()).collect();
    assert_eq!(names, vec!["New A", "New B"]);
    assert!(snapshot.records.iter().all(|r| r.source_file_name == "late.csv"));
    assert_eq!(snapshot.day_key.unwrap().to_string(), "2025-10-19");

    assert_eq!(sink.names(), vec!["new-records"]);
    assert!(scratch_is_empty(dir.path()));
}

#[tokio::test]
async fn header_only_attachment_empties_ledger() {
    let mailbox = MemoryMailbox::new();
    let dir = tempfile::tempdir().unwrap();
    let sink = Arc::new(RecordingSink::default());
    let scheduler = build(&mailbox, dir.path(), sink.clone(), Duration::from_secs(5));

    push_csv(&mailbox, "Leads 19-October-2025", 2, "first.csv", "Name\nAsha\n");
    scheduler.trigger_at(now()).await;
    assert_eq!(scheduler.ledger().stats().total_records, 1);

    push_csv(&mailbox, "Leads 19-October-2025", 4, "empty.csv", "Name,Phone\n");
    let outcome = scheduler.trigger_at(now()).await;

    assert!(matches!(outcome, CycleOutcome::NoRows { .. }), "got {outcome:?}");
    let snapshot = scheduler.ledger().current();
    assert!(snapshot.records.is_empty());
    assert_eq!(snapshot.day_key.unwrap().to_string(), "2025-10-19");
    assert_eq!(sink.names(), vec!["new-records", "new-records"]);
    assert!(scratch_is_empty(dir.path()));
}

#[tokio::test]
async fn batch_finishing_after_midnight_is_discarded() {
    let mailbox = MemoryMailbox::new();
    push_csv(&mailbox, "Leads 19-October-2025", 2, "leads.csv", "Name\nAsha\nRavi\n");
    mailbox.set_fetch_delay(Duration::from_millis(300));
    let dir = tempfile::tempdir().unwrap();
    let sink = Arc::new(RecordingSink::default());
    let scheduler = build(&mailbox, dir.path(), sink.clone(), Duration::from_secs(5));

    // 23:59 local, one minute before midnight at +05:30.
    let before_midnight = Utc.with_ymd_and_hms(2025, 10, 19, 18, 29, 0).unwrap();
    let midnight = Utc.with_ymd_and_hms(2025, 10, 19, 18, 30, 0).unwrap();

    let cycle = {
        let scheduler = scheduler.clone();
        tokio::spawn(async move { scheduler.trigger_at(before_midnight).await })
    };
    for _ in 0..100 {
        if scheduler.state() == PollerState::Polling {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(scheduler.state(), PollerState::Polling);
    assert!(scheduler.rollover_at(midnight).await);

    let outcome = cycle.await.unwrap();
    assert!(matches!(outcome, CycleOutcome::DayChanged { .. }), "got {outcome:?}");

    let snapshot = scheduler.ledger().current();
    assert!(snapshot.records.is_empty());
    assert_eq!(snapshot.day_key.unwrap().to_string(), "2025-10-20");
    assert_eq!(sink.names(), vec!["ledger-cleared"]);
    assert!(scratch_is_empty(dir.path()));
}

#[tokio::test]
async fn connection_failure_is_contained() {
    let mailbox = MemoryMailbox::new();
    mailbox.set_fail_connect(true);
    let dir = tempfile::tempdir().unwrap();
    let scheduler = build(
        &mailbox,
        dir.path(),
        Arc::new(RecordingSink::default()),
        Duration::from_secs(5),
    );

    let outcome = scheduler.trigger_at(now()).await;
    match outcome {
        CycleOutcome::Failed { error } => assert!(error.contains("connection refused"), "{error}"),
        other => panic!("expected failure, got {other:?}"),
    }

    let metrics = scheduler.metrics();
    assert_eq!(metrics.cycles_failed, 1);
    assert!(metrics.last_error.is_some());

    mailbox.set_fail_connect(false);
    assert_eq!(scheduler.trigger_at(now()).await, CycleOutcome::NoCandidates);
}

#[tokio::test]
async fn hung_cycle_times_out_and_releases_guard() {
    let mailbox = MemoryMailbox::new();
    push_csv(&mailbox, "Leads 19-October-2025", 2, "leads.csv", "Name\nAsha\n");
    mailbox.set_fetch_delay(Duration::from_secs(5));

    let dir = tempfile::tempdir().unwrap();
    let scheduler = build(
        &mailbox,
        dir.path(),
        Arc::new(RecordingSink::default()),
        Duration::from_millis(100),
    );

    let outcome = scheduler.trigger_at(now()).await;
    match outcome {
        CycleOutcome::Failed { error } => assert!(error.contains("timed out"), "{error}"),
        other => panic!("expected timeout, got {other:?}"),
    }
    // Abandoned, not logged out.
    assert_eq!(mailbox.logout_count(), 0);
    assert_eq!(scheduler.state(), PollerState::Idle);
    assert_eq!(scheduler.ledger().stats().total_records, 0);
}

#[tokio::test]
async fn panicking_cycle_is_reported_as_failure() {
    let mailbox = MemoryMailbox::new();
    push_csv(&mailbox, "Leads 19-October-2025", 2, "leads.csv", "Name\nAsha\n");

    let dir = tempfile::tempdir().unwrap();
    let sink = Arc::new(RecordingSink {
        events: Mutex::new(Vec::new()),
        panic_on_publish: true,
    });
    let scheduler = build(&mailbox, dir.path(), sink, Duration::from_secs(5));

    let outcome = scheduler.trigger_at(now()).await;
    match outcome {
        CycleOutcome::Failed { error } => assert!(error.contains("sink exploded"), "{error}"),
        other => panic!("expected panic failure, got {other:?}"),
    }
    assert_eq!(scheduler.state(), PollerState::Idle);
}

#[tokio::test]
async fn rollover_announces_only_real_day_changes() {
    let mailbox = MemoryMailbox::new();
    push_csv(&mailbox, "Leads 19-October-2025", 2, "leads.csv", "Name\nAsha\n");
    let dir = tempfile::tempdir().unwrap();
    let sink = Arc::new(RecordingSink::default());
    let scheduler = build(&mailbox, dir.path(), sink.clone(), Duration::from_secs(5));

    scheduler.trigger_at(now()).await;
    assert!(!scheduler.rollover_at(now()).await);

    // 18:30 UTC is local midnight at +05:30.
    let next_day = Utc.with_ymd_and_hms(2025, 10, 19, 18, 30, 0).unwrap();
    assert!(scheduler.rollover_at(next_day).await);
    assert!(!scheduler.rollover_at(next_day).await);

    let stats = scheduler.ledger().stats();
    assert_eq!(stats.total_records, 0);
    assert_eq!(stats.current_day_key.unwrap().to_string(), "2025-10-20");
    assert_eq!(sink.names(), vec!["new-records", "ledger-cleared"]);
}

#[tokio::test]
async fn start_and_stop_drive_the_state_machine() {
    let mailbox = MemoryMailbox::new();
    let dir = tempfile::tempdir().unwrap();
    let scheduler = build(
        &mailbox,
        dir.path(),
        Arc::new(RecordingSink::default()),
        Duration::from_secs(5),
    );

    assert_eq!(scheduler.state(), PollerState::Idle);
    assert!(scheduler.start());
    assert!(!scheduler.start());

    let mut scheduled = false;
    for _ in 0..50 {
        if matches!(scheduler.state(), PollerState::Scheduled(_)) {
            scheduled = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(scheduled, "poll loop should arm the next run");

    scheduler.stop();
    assert_eq!(scheduler.state(), PollerState::Idle);
    assert!(!scheduler.is_running());

    assert!(scheduler.start());
    scheduler.stop();
    assert_eq!(scheduler.metrics().cycles_run, 0);
}

#[tokio::test]
async fn status_reports_cadence_and_metrics() {
    let mailbox = MemoryMailbox::new();
    let dir = tempfile::tempdir().unwrap();
    let scheduler = build(
        &mailbox,
        dir.path(),
        Arc::new(RecordingSink::default()),
        Duration::from_secs(5),
    );
    scheduler.trigger_at(now()).await;

    let json = serde_json::to_value(scheduler.status()).unwrap();
    assert_eq!(json["running"], false);
    assert_eq!(json["state"], "idle");
    assert_eq!(json["cadence"], "every 3600s");
    assert_eq!(json["metrics"]["cycles_run"], 1);
    assert_eq!(json["metrics"]["last_outcome"]["kind"], "no_candidates");
}
