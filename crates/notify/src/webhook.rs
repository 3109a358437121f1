//! HTTP webhook sink.
//!
//! Each event is POSTed as its JSON frame, the same `{"type", "data"}`
//! envelope live clients receive.

use std::time::Duration;

use leadsync_core::config::NotifyConfig;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};

use crate::traits::{EventSink, LedgerEvent, NotifyError};

/// Header naming the event, so receivers can route without parsing the body.
pub const EVENT_HEADER: &str = "x-leadsync-event";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug)]
pub struct WebhookNotifier {
    url: reqwest::Url,
    client: reqwest::Client,
}

impl WebhookNotifier {
    /// `url` may reference environment variables as `${NAME}`; they are expanded here.
    pub fn new(url: &str, bearer_token: Option<&str>) -> Result<Self, NotifyError> {
        let expanded = expand_env(url)?;
        let url = reqwest::Url::parse(&expanded)
            .map_err(|e| NotifyError::Config(format!("webhook URL {expanded}: {e}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(NotifyError::Config(format!(
                "webhook URL must use http or https, got {}",
                url.scheme()
            )));
        }

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(token) = bearer_token {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", token.trim()))
                .map_err(|_| NotifyError::Config("webhook token is not a valid header value".into()))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self { url, client })
    }

    pub fn from_config(config: &NotifyConfig) -> Result<Option<Self>, NotifyError> {
        config
            .webhook_url
            .as_deref()
            .map(|url| Self::new(url, config.webhook_token.as_deref()))
            .transpose()
    }

    pub fn url(&self) -> &str {
        self.url.as_str()
    }
}

#[async_trait::async_trait]
impl EventSink for WebhookNotifier {
    async fn publish(&self, event: &LedgerEvent) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(self.url.clone())
            .header(EVENT_HEADER, event.name())
            .body(event.to_json()?)
            .send()
            .await?;

        if let Err(e) = response.error_for_status_ref() {
            tracing::warn!(url = %self.url, status = %response.status(), "webhook rejected event");
            return Err(e.into());
        }

        tracing::debug!(url = %self.url, event = event.name(), "webhook delivered");
        Ok(())
    }

    fn channel_name(&self) -> &str {
        "webhook"
    }
}

/// Replace each `${NAME}` with the variable's value. Unset or unterminated
/// references are configuration errors.
fn expand_env(template: &str) -> Result<String, NotifyError> {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if c != '$' || !matches!(chars.peek(), Some((_, '{'))) {
            out.push(c);
            continue;
        }
        let open = i + 2;
        let close = template[open..]
            .find('}')
            .map(|n| open + n)
            .ok_or_else(|| NotifyError::Config(format!("unterminated ${{…}} in {template}")))?;
        let name = &template[open..close];
        let value = std::env::var(name)
            .map_err(|_| NotifyError::Config(format!("{name} referenced by webhook URL is not set")))?;
        out.push_str(&value);
        while matches!(chars.peek(), Some((j, _)) if *j <= close) {
            chars.next();
        }
    }

    Ok(out)
}
