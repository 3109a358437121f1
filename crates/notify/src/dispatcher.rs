//! Fan-out of one event to every registered channel.

use std::time::{Duration, Instant};

use futures::future::join_all;
use leadsync_core::config::NotifyConfig;

use crate::email::EmailNotifier;
use crate::traits::{EventSink, LedgerEvent, NotifyError};
use crate::webhook::WebhookNotifier;

/// How one channel fared with one event.
#[derive(Debug)]
pub struct Delivery {
    pub channel: String,
    pub elapsed: Duration,
    pub error: Option<String>,
}

impl Delivery {
    pub fn delivered(&self) -> bool {
        self.error.is_none()
    }
}

/// Publishes to all channels concurrently. A failing or slow channel
/// never holds back the others, and failures stop here.
#[derive(Default)]
pub struct Dispatcher {
    channels: Vec<Box<dyn EventSink>>,
}

impl Dispatcher {
    pub fn new(channels: Vec<Box<dyn EventSink>>) -> Self {
        Self { channels }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Outbound channels named by `config`: webhook, then email.
    pub fn from_config(config: &NotifyConfig) -> Result<Self, NotifyError> {
        let mut dispatcher = Self::empty();
        if let Some(webhook) = WebhookNotifier::from_config(config)? {
            dispatcher.push(Box::new(webhook));
        }
        if config.email_configured() {
            dispatcher.push(Box::new(EmailNotifier::from_config(config)?));
        }
        Ok(dispatcher)
    }

    pub fn push(&mut self, channel: Box<dyn EventSink>) {
        self.channels.push(channel);
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn channel_names(&self) -> Vec<String> {
        self.channels.iter().map(|c| c.channel_name().to_owned()).collect()
    }

    /// Deliver `event` everywhere; results come back in registration order.
    pub async fn dispatch(&self, event: &LedgerEvent) -> Vec<Delivery> {
        let deliveries = join_all(self.channels.iter().map(|channel| async move {
            let started = Instant::now();
            let result = channel.publish(event).await;
            Delivery {
                channel: channel.channel_name().to_owned(),
                elapsed: started.elapsed(),
                error: result.err().map(|e| e.to_string()),
            }
        }))
        .await;

        for delivery in &deliveries {
            match &delivery.error {
                None => tracing::debug!(
                    event = event.name(),
                    channel = %delivery.channel,
                    elapsed_ms = delivery.elapsed.as_millis() as u64,
                    "event delivered"
                ),
                Some(error) => tracing::warn!(
                    event = event.name(),
                    channel = %delivery.channel,
                    %error,
                    "event delivery failed"
                ),
            }
        }
        deliveries
    }
}

#[async_trait::async_trait]
impl EventSink for Dispatcher {
    /// Never fails; per-channel errors are logged by [`Dispatcher::dispatch`].
    async fn publish(&self, event: &LedgerEvent) -> Result<(), NotifyError> {
        self.dispatch(event).await;
        Ok(())
    }

    fn channel_name(&self) -> &str {
        "dispatcher"
    }
}
