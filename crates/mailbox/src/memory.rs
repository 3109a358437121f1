//! In-memory mailbox for tests.
//!
//! Enabled for this crate's own tests and, through the `test-util` feature,
//! for downstream crates that need a scripted mail server.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use chrono::{DateTime, Utc};
use leadsync_core::config::MailboxConfig;

use crate::error::MailboxError;
use crate::session::{MailConnector, MailSession, MessageSize, SearchCriteria};

#[derive(Default)]
struct MemoryState {
    messages: Vec<(u32, Vec<u8>)>,
    next_uid: u32,
    fail_connect: bool,
    fetch_delay: Option<Duration>,
    connects: usize,
    logouts: usize,
    fetched: Vec<u32>,
    last_criteria: Option<SearchCriteria>,
}

/// A scripted mail server. Clones share the same state.
#[derive(Clone, Default)]
pub struct MemoryMailbox {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryMailbox {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Store a raw message source; returns its UID.
    pub fn push_raw(&self, raw: Vec<u8>) -> u32 {
        let mut state = self.lock();
        state.next_uid += 1;
        let uid = state.next_uid;
        state.messages.push((uid, raw));
        uid
    }

    pub fn set_fail_connect(&self, fail: bool) {
        self.lock().fail_connect = fail;
    }

    /// Delay every `fetch_source` call, to hold a cycle in flight.
    pub fn set_fetch_delay(&self, delay: Duration) {
        self.lock().fetch_delay = Some(delay);
    }

    pub fn connect_count(&self) -> usize {
        self.lock().connects
    }

    pub fn logout_count(&self) -> usize {
        self.lock().logouts
    }

    pub fn fetched_uids(&self) -> Vec<u32> {
        self.lock().fetched.clone()
    }

    pub fn last_criteria(&self) -> Option<SearchCriteria> {
        self.lock().last_criteria.clone()
    }
}

#[async_trait]
impl MailConnector for MemoryMailbox {
    async fn connect(&self, _config: &MailboxConfig) -> Result<Box<dyn MailSession>, MailboxError> {
        let mut state = self.lock();
        if state.fail_connect {
            return Err(MailboxError::Connection("connection refused".into()));
        }
        state.connects += 1;
        Ok(Box::new(MemorySession {
            mailbox: self.clone(),
        }))
    }
}

struct MemorySession {
    mailbox: MemoryMailbox,
}

#[async_trait]
impl MailSession for MemorySession {
    async fn open_mailbox(&mut self, _folder: &str) -> Result<(), MailboxError> {
        Ok(())
    }

    async fn search(&mut self, criteria: &SearchCriteria) -> Result<Vec<u32>, MailboxError> {
        let mut state = self.mailbox.lock();
        state.last_criteria = Some(criteria.clone());
        Ok(state.messages.iter().map(|(uid, _)| *uid).collect())
    }

    async fn message_sizes(&mut self, uids: &[u32]) -> Result<Vec<MessageSize>, MailboxError> {
        let state = self.mailbox.lock();
        Ok(state
            .messages
            .iter()
            .filter(|(uid, _)| uids.contains(uid))
            .map(|(uid, raw)| MessageSize {
                uid: *uid,
                bytes: raw.len() as u32,
            })
            .collect())
    }

    async fn fetch_source(&mut self, uid: u32) -> Result<Vec<u8>, MailboxError> {
        let delay = self.mailbox.lock().fetch_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let mut state = self.mailbox.lock();
        state.fetched.push(uid);
        state
            .messages
            .iter()
            .find(|(id, _)| *id == uid)
            .map(|(_, raw)| raw.clone())
            .ok_or_else(|| MailboxError::Protocol(format!("no message with UID {uid}")))
    }

    async fn logout(&mut self) -> Result<(), MailboxError> {
        self.mailbox.lock().logouts += 1;
        Ok(())
    }
}

/// Build a `multipart/mixed` message with base64-encoded attachments.
pub fn compose_message(
    from: &str,
    subject: &str,
    date: DateTime<Utc>,
    attachments: &[(&str, &[u8])],
) -> Vec<u8> {
    let boundary = "leadsync-boundary";
    let mut out = String::new();
    out.push_str(&format!("From: {from}\r\n"));
    out.push_str("To: inbox@example.com\r\n");
    out.push_str(&format!("Subject: {subject}\r\n"));
    out.push_str(&format!("Date: {}\r\n", date.to_rfc2822()));
    out.push_str("MIME-Version: 1.0\r\n");
    out.push_str(&format!(
        "Content-Type: multipart/mixed; boundary=\"{boundary}\"\r\n\r\n"
    ));
    out.push_str(&format!(
        "--{boundary}\r\nContent-Type: text/plain\r\n\r\nReport attached.\r\n"
    ));
    for (name, content) in attachments {
        let encoded = base64::engine::general_purpose::STANDARD.encode(content);
        out.push_str(&format!("--{boundary}\r\n"));
        out.push_str(&format!(
            "Content-Type: application/octet-stream; name=\"{name}\"\r\n"
        ));
        out.push_str(&format!(
            "Content-Disposition: attachment; filename=\"{name}\"\r\n"
        ));
        out.push_str("Content-Transfer-Encoding: base64\r\n\r\n");
        for chunk in encoded.as_bytes().chunks(76) {
            out.push_str(&String::from_utf8_lossy(chunk));
            out.push_str("\r\n");
        }
    }
    out.push_str(&format!("--{boundary}--\r\n"));
    out.into_bytes()
}
