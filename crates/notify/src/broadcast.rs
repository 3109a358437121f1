//! In-process fan-out to live subscribers (WebSocket clients).

use tokio::sync::broadcast;

use crate::traits::{EventSink, LedgerEvent, NotifyError};

/// Publishes every event as a JSON string on a tokio broadcast channel.
///
/// Slow subscribers lag and lose old frames; the publisher never blocks.
#[derive(Debug, Clone)]
pub struct BroadcastSink {
    tx: broadcast::Sender<String>,
}

impl BroadcastSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.tx.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[async_trait::async_trait]
impl EventSink for BroadcastSink {
    async fn publish(&self, event: &LedgerEvent) -> Result<(), NotifyError> {
        let frame = event.to_json()?;
        match self.tx.send(frame) {
            Ok(receivers) => tracing::debug!(event = event.name(), receivers, "event broadcast"),
            Err(_) => tracing::debug!(event = event.name(), "no live subscribers"),
        }
        Ok(())
    }

    fn channel_name(&self) -> &str {
        "broadcast"
    }
}
