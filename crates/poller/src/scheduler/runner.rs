//! [`IngestionScheduler`]: owns the poll loop and the midnight rollover timer.

use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, FixedOffset, Utc};
use futures::FutureExt;
use leadsync_core::config::Config;
use leadsync_core::{CoreError, DayKey};
use leadsync_ingest::sweep_scratch_dir;
use leadsync_mailbox::{MailConnector, MailboxClient};
use leadsync_notify::EventSink;
use tokio::sync::watch;
use tracing::{error, info, warn};

use super::cadence::{next_local_midnight, PollCadence};
use super::cycle::{rollover_and_announce, run_cycle, CycleContext};
use super::state::{CycleOutcome, PollerMetrics, PollerState, PollerStatus, PollingGuard};
use crate::error::CycleError;
use crate::ledger::MemoryLedger;

/// Timing and placement settings for the scheduler.
#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    pub cadence: PollCadence,
    pub run_on_start: bool,
    pub cycle_timeout: Duration,
    pub offset: FixedOffset,
    pub lookback: chrono::Duration,
    pub scratch_dir: PathBuf,
}

impl SchedulerSettings {
    pub fn from_config(config: &Config) -> Result<Self, CoreError> {
        let cadence: PollCadence = config
            .poller
            .cadence
            .parse()
            .map_err(|e| CoreError::Config(format!("POLL_CADENCE: {e}")))?;
        let offset = config.poller.local_offset().ok_or_else(|| {
            CoreError::Config(format!(
                "LOCAL_UTC_OFFSET_MINUTES out of range: {}",
                config.poller.utc_offset_minutes
            ))
        })?;

        Ok(Self {
            cadence,
            run_on_start: config.poller.run_on_start,
            cycle_timeout: config.poller.cycle_timeout(),
            offset,
            lookback: config.mailbox.lookback(),
            scratch_dir: config.storage.scratch_dir.clone(),
        })
    }
}

struct Inner {
    ctx: CycleContext,
    cadence: PollCadence,
    run_on_start: bool,
    cycle_timeout: Duration,
    polling: AtomicBool,
    running: Mutex<bool>,
    next_run: Mutex<Option<DateTime<Utc>>>,
    metrics: Mutex<PollerMetrics>,
    /// Bumped by every start and stop; loops exit when it moves.
    generation: watch::Sender<u64>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Drives polling cycles on a cadence, never more than one at a time.
///
/// Cheap to clone; clones share one state machine.
#[derive(Clone)]
pub struct IngestionScheduler {
    inner: Arc<Inner>,
}

impl IngestionScheduler {
    pub fn new(
        settings: SchedulerSettings,
        mailbox: MailboxClient,
        ledger: Arc<MemoryLedger>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        let (generation, _) = watch::channel(0u64);
        Self {
            inner: Arc::new(Inner {
                ctx: CycleContext {
                    mailbox: tokio::sync::Mutex::new(mailbox),
                    ledger,
                    sink,
                    lookback: settings.lookback,
                    offset: settings.offset,
                    scratch_dir: settings.scratch_dir,
                },
                cadence: settings.cadence,
                run_on_start: settings.run_on_start,
                cycle_timeout: settings.cycle_timeout,
                polling: AtomicBool::new(false),
                running: Mutex::new(false),
                next_run: Mutex::new(None),
                metrics: Mutex::new(PollerMetrics::default()),
                generation,
            }),
        }
    }

    /// Wire a scheduler from process configuration.
    pub fn from_config(
        config: &Config,
        connector: Arc<dyn MailConnector>,
        ledger: Arc<MemoryLedger>,
        sink: Arc<dyn EventSink>,
    ) -> Result<Self, CoreError> {
        let settings = SchedulerSettings::from_config(config)?;
        let mailbox = MailboxClient::new(
            config.mailbox.clone(),
            settings.scratch_dir.clone(),
            connector,
        );
        Ok(Self::new(settings, mailbox, ledger, sink))
    }

    pub fn ledger(&self) -> &Arc<MemoryLedger> {
        &self.inner.ctx.ledger
    }

    pub fn is_running(&self) -> bool {
        *lock(&self.inner.running)
    }

    pub fn state(&self) -> PollerState {
        if self.inner.polling.load(std::sync::atomic::Ordering::Acquire) {
            return PollerState::Polling;
        }
        match (*lock(&self.inner.running), *lock(&self.inner.next_run)) {
            (true, Some(next)) => PollerState::Scheduled(next),
            _ => PollerState::Idle,
        }
    }

    pub fn metrics(&self) -> PollerMetrics {
        lock(&self.inner.metrics).clone()
    }

    pub fn status(&self) -> PollerStatus {
        PollerStatus {
            running: self.is_running(),
            state: self.state(),
            cadence: self.inner.cadence.to_string(),
            metrics: self.metrics(),
        }
    }

    /// Arm the poll loop and the midnight timer. Must be called inside a tokio runtime.
    ///
    /// Returns `false` when already running.
    pub fn start(&self) -> bool {
        {
            let mut running = lock(&self.inner.running);
            if *running {
                return false;
            }
            *running = true;
        }

        let today = DayKey::for_instant(Utc::now(), &self.inner.ctx.offset);
        self.inner.ctx.ledger.rollover_if_needed(today);

        self.inner.generation.send_modify(|g| *g += 1);
        let stop_rx = self.inner.generation.subscribe();

        info!(
            cadence = %self.inner.cadence,
            run_on_start = self.inner.run_on_start,
            timeout_secs = self.inner.cycle_timeout.as_secs(),
            "ingestion scheduler started"
        );

        tokio::spawn(self.clone().poll_loop(stop_rx.clone()));
        tokio::spawn(self.clone().midnight_loop(stop_rx));
        true
    }

    /// Cancel the pending timers. An in-flight cycle is left to finish.
    pub fn stop(&self) {
        {
            let mut running = lock(&self.inner.running);
            if !*running {
                return;
            }
            *running = false;
        }
        self.inner.generation.send_modify(|g| *g += 1);
        *lock(&self.inner.next_run) = None;
        info!("ingestion scheduler stopped");
    }

    /// Run one cycle now, unless one is already in flight.
    pub async fn trigger(&self) -> CycleOutcome {
        self.trigger_at(Utc::now()).await
    }

    /// Run one cycle as if the clock read `now`.
    pub async fn trigger_at(&self, now: DateTime<Utc>) -> CycleOutcome {
        let Some(_guard) = PollingGuard::acquire(&self.inner.polling) else {
            info!("cycle already in flight, trigger dropped");
            lock(&self.inner.metrics).record(&CycleOutcome::Skipped, Utc::now());
            return CycleOutcome::Skipped;
        };

        lock(&self.inner.metrics).last_started_at = Some(Utc::now());
        let outcome = self.run_bounded(now).await;
        lock(&self.inner.metrics).record(&outcome, Utc::now());
        outcome
    }

    /// Run a cycle under the timeout and panic boundary, then sweep scratch.
    async fn run_bounded(&self, now: DateTime<Utc>) -> CycleOutcome {
        let ctx = &self.inner.ctx;
        let timeout = self.inner.cycle_timeout;
        let cycle = AssertUnwindSafe(run_cycle(ctx, now)).catch_unwind();

        let result = match tokio::time::timeout(timeout, cycle).await {
            Ok(Ok(result)) => result,
            Ok(Err(payload)) => {
                ctx.mailbox.lock().await.abandon();
                Err(CycleError::Panicked(panic_message(payload)))
            }
            Err(_) => {
                ctx.mailbox.lock().await.abandon();
                Err(CycleError::Timeout(timeout))
            }
        };

        let scratch = ctx.scratch_dir.clone();
        match tokio::task::spawn_blocking(move || sweep_scratch_dir(&scratch)).await {
            Ok(0) => {}
            Ok(removed) => info!(removed, "scratch directory swept"),
            Err(e) => warn!(error = %e, "scratch sweep task failed"),
        }

        match result {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(error = %e, "polling cycle failed");
                CycleOutcome::Failed {
                    error: e.to_string(),
                }
            }
        }
    }

    /// Clear the ledger if the local day changed. Returns `true` when it did.
    pub async fn rollover_at(&self, now: DateTime<Utc>) -> bool {
        rollover_and_announce(&self.inner.ctx, now).await
    }

    fn set_next_run(&self, next: Option<DateTime<Utc>>) {
        *lock(&self.inner.next_run) = next;
    }

    async fn poll_loop(self, mut stop_rx: watch::Receiver<u64>) {
        if self.inner.run_on_start {
            self.trigger().await;
        }

        loop {
            if stop_rx.has_changed().unwrap_or(true) {
                break;
            }

            let now = Utc::now();
            let Some(next) = self.inner.cadence.next_after(now, &self.inner.ctx.offset) else {
                warn!(cadence = %self.inner.cadence, "cadence has no upcoming run, poll loop exiting");
                break;
            };
            self.set_next_run(Some(next));
            let wait = (next - now).to_std().unwrap_or(Duration::ZERO);

            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = stop_rx.changed() => break,
            }

            self.set_next_run(None);
            let outcome = self.trigger().await;
            if outcome == CycleOutcome::Skipped {
                warn!("scheduled cycle skipped, previous cycle still running");
            }
        }

        info!("poll loop exited");
    }

    async fn midnight_loop(self, mut stop_rx: watch::Receiver<u64>) {
        let offset = self.inner.ctx.offset;
        loop {
            let now = Utc::now();
            let midnight = next_local_midnight(now, &offset);
            let wait = (midnight - now).to_std().unwrap_or(Duration::ZERO);

            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = stop_rx.changed() => break,
            }

            self.rollover_at(Utc::now()).await;
        }
    }
}
