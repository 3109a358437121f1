//! Process wiring: event sinks, ledger, scheduler, shared state.

use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use leadsync_core::Config;
use leadsync_mailbox::ImapConnector;
use leadsync_notify::{BroadcastSink, Dispatcher, EventSink};
use leadsync_poller::{IngestionScheduler, MemoryLedger};
use tracing::info;

use crate::state::AppState;

/// Fan-out sink: the live broadcast first, then the configured outbound channels.
pub fn build_dispatcher(config: &Config, broadcast: Option<&BroadcastSink>) -> anyhow::Result<Dispatcher> {
    let outbound = Dispatcher::from_config(&config.notify).context("invalid notification settings")?;

    let mut dispatcher = Dispatcher::empty();
    if let Some(broadcast) = broadcast {
        dispatcher.push(Box::new(broadcast.clone()));
    }
    dispatcher.push(Box::new(outbound));

    info!(channels = ?dispatcher.channel_names(), "event channels ready");
    Ok(dispatcher)
}

pub fn build_scheduler(config: &Config, sink: Arc<dyn EventSink>) -> anyhow::Result<IngestionScheduler> {
    let ledger = Arc::new(MemoryLedger::new(config.ledger.capacity));
    IngestionScheduler::from_config(config, Arc::new(ImapConnector::new()), ledger, sink)
        .context("invalid poller settings")
}

/// Build the shared state for `serve`.
pub fn build_state(config: &Config) -> anyhow::Result<Arc<AppState>> {
    let offset = config
        .poller
        .local_offset()
        .context("LOCAL_UTC_OFFSET_MINUTES out of range")?;

    let broadcast = BroadcastSink::new(config.ledger.broadcast_capacity);
    let sink: Arc<dyn EventSink> = Arc::new(build_dispatcher(config, Some(&broadcast))?);
    let scheduler = build_scheduler(config, sink)?;

    Ok(Arc::new(AppState {
        ledger: scheduler.ledger().clone(),
        scheduler,
        broadcast,
        offset,
        settings: config.redacted_summary(),
        started_at: Utc::now(),
    }))
}
