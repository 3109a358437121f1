//! One polling cycle: fetch, select, normalize, replace, publish.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Utc};
use futures::StreamExt;
use leadsync_core::{DayKey, MailMessage, Record};
use leadsync_ingest::{normalize_all, remove_file_quietly};
use leadsync_mailbox::MailboxClient;
use leadsync_notify::{EventSink, LedgerEvent};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::state::CycleOutcome;
use crate::error::CycleError;
use crate::ledger::MemoryLedger;

/// Everything a cycle touches. Shared by the poll loop and manual triggers.
pub(crate) struct CycleContext {
    pub mailbox: Mutex<MailboxClient>,
    pub ledger: Arc<MemoryLedger>,
    pub sink: Arc<dyn EventSink>,
    pub lookback: chrono::Duration,
    pub offset: FixedOffset,
    pub scratch_dir: PathBuf,
}

/// Delete a message's saved attachments.
fn discard(message: &MailMessage) {
    for path in &message.attachment_paths {
        remove_file_quietly(path);
    }
}

/// Clear the ledger if `now` is on a new local day, and announce it.
pub(crate) async fn rollover_and_announce(ctx: &CycleContext, now: DateTime<Utc>) -> bool {
    let day_key = DayKey::for_instant(now, &ctx.offset);
    let previous = ctx.ledger.current().day_key;
    if !ctx.ledger.rollover_if_needed(day_key) {
        return false;
    }
    let event = LedgerEvent::ledger_cleared(previous, day_key, Utc::now());
    if let Err(e) = ctx.sink.publish(&event).await {
        warn!(error = %e, "failed to publish ledger-cleared event");
    }
    true
}

/// Consume the candidate stream, keeping only the newest message.
///
/// Returns the selected message and how many qualified. The session is
/// closed before returning, whatever the result.
async fn select_newest(
    client: &mut MailboxClient,
    target_date_text: &str,
    lookback: chrono::Duration,
    now: DateTime<Utc>,
) -> Result<(Option<MailMessage>, usize), CycleError> {
    let scan = async {
        let mut candidates = client
            .fetch_candidates_at(target_date_text, lookback, now)
            .await?;

        let mut selected: Option<MailMessage> = None;
        let mut count = 0usize;
        while let Some(message) = candidates.next().await {
            count += 1;
            match &selected {
                Some(best) if best.timestamp >= message.timestamp => {
                    debug!(subject = %message.subject, "older candidate discarded");
                    discard(&message);
                }
                _ => {
                    if let Some(previous) = selected.replace(message) {
                        debug!(subject = %previous.subject, "superseded candidate discarded");
                        discard(&previous);
                    }
                }
            }
        }
        Ok::<_, CycleError>((selected, count))
    }
    .await;

    client.disconnect().await;
    scan
}

pub(crate) async fn run_cycle(ctx: &CycleContext, now: DateTime<Utc>) -> Result<CycleOutcome, CycleError> {
    rollover_and_announce(ctx, now).await;

    let day_key = DayKey::for_instant(now, &ctx.offset);
    let target = day_key.subject_text();
    info!(%day_key, target_date = %target, "polling cycle started");

    let (selected, candidates) = {
        let mut client = ctx.mailbox.lock().await;
        select_newest(&mut client, &target, ctx.lookback, now).await?
    };

    let Some(message) = selected else {
        info!(target_date = %target, "no qualifying messages");
        return Ok(CycleOutcome::NoCandidates);
    };

    info!(
        subject = %message.subject,
        received = %message.timestamp,
        candidates,
        files = %message.file_label(),
        "processing newest qualifying message"
    );

    let paths = message.attachment_paths.clone();
    let rows = tokio::task::spawn_blocking(move || normalize_all(&paths)).await;
    discard(&message);
    let rows = rows?;

    let provenance = message.provenance();
    let observed_at = Utc::now();
    let records: Vec<Record> = rows
        .into_iter()
        .map(|fields| Record::new(fields, &provenance, observed_at, day_key))
        .collect();
    let no_rows = records.is_empty();
    if no_rows {
        warn!(subject = %message.subject, "attachments contained no data rows, ledger emptied");
    }

    let replaced = match ctx.ledger.replace_day(day_key, records) {
        Ok(replaced) => replaced,
        Err(e) => {
            warn!(subject = %message.subject, error = %e, "local day changed mid-cycle, batch discarded");
            return Ok(CycleOutcome::DayChanged {
                subject: message.subject,
            });
        }
    };

    let installed = ctx.ledger.current().records.clone();
    let event = LedgerEvent::new_records(installed, provenance, day_key, replaced.dropped);
    if let Err(e) = ctx.sink.publish(&event).await {
        warn!(error = %e, "failed to publish new-records event");
    }

    if no_rows {
        return Ok(CycleOutcome::NoRows {
            subject: message.subject,
        });
    }

    info!(
        subject = %message.subject,
        accepted = replaced.accepted,
        dropped = replaced.dropped,
        "polling cycle complete"
    );

    Ok(CycleOutcome::Ingested {
        subject: message.subject,
        candidates,
        accepted: replaced.accepted,
        dropped: replaced.dropped,
    })
}
