//! Mailbox client: filters messages and saves their tabular attachments.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::stream::{self, BoxStream};
use leadsync_core::config::MailboxConfig;
use leadsync_core::tabular::is_tabular;
use leadsync_core::MailMessage;
use tracing::{debug, info, warn};

use crate::attachments::{discard_saved, save_attachment};
use crate::error::MailboxError;
use crate::mime::{parse_message, ParsedMessage};
use crate::session::{MailConnector, MailSession, SearchCriteria};

/// Owns at most one live session and hands out candidate messages.
pub struct MailboxClient {
    config: MailboxConfig,
    scratch_dir: PathBuf,
    connector: Arc<dyn MailConnector>,
    session: Option<Box<dyn MailSession>>,
}

impl MailboxClient {
    pub fn new(
        config: MailboxConfig,
        scratch_dir: impl Into<PathBuf>,
        connector: Arc<dyn MailConnector>,
    ) -> Self {
        Self {
            config,
            scratch_dir: scratch_dir.into(),
            connector,
            session: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    pub fn scratch_dir(&self) -> &std::path::Path {
        &self.scratch_dir
    }

    /// Open an authenticated session. No-op while one is already open.
    pub async fn connect(&mut self) -> Result<(), MailboxError> {
        if self.session.is_some() {
            return Ok(());
        }
        let session = self.connector.connect(&self.config).await?;
        self.session = Some(session);
        Ok(())
    }

    /// Log out and drop the session. Logout failures are only logged.
    pub async fn disconnect(&mut self) {
        if let Some(mut session) = self.session.take() {
            match session.logout().await {
                Ok(()) => debug!("mailbox session closed"),
                Err(e) => warn!(error = %e, "mailbox logout failed"),
            }
        }
    }

    /// Drop the session without talking to the server.
    ///
    /// Used after a cycle timed out mid-command, when the connection state is unknown.
    pub fn abandon(&mut self) {
        if self.session.take().is_some() {
            warn!("mailbox session abandoned without logout");
        }
    }

    /// Lazily yield qualifying messages, in server order.
    ///
    /// The server search is bounded by sender and `since_window`. Each yielded
    /// message already has its tabular attachments written to the scratch
    /// directory. Messages that fail to fetch or parse are logged and skipped.
    pub async fn fetch_candidates(
        &mut self,
        target_date_text: &str,
        since_window: chrono::Duration,
    ) -> Result<BoxStream<'_, MailMessage>, MailboxError> {
        self.fetch_candidates_at(target_date_text, since_window, Utc::now())
            .await
    }

    pub async fn fetch_candidates_at(
        &mut self,
        target_date_text: &str,
        since_window: chrono::Duration,
        now: DateTime<Utc>,
    ) -> Result<BoxStream<'_, MailMessage>, MailboxError> {
        self.connect().await?;
        tokio::fs::create_dir_all(&self.scratch_dir).await?;

        let criteria = SearchCriteria {
            sender: self.config.sender.clone(),
            since: (now - since_window).date_naive(),
        };
        let filter = CandidateFilter {
            sender: self.config.sender.trim().to_lowercase(),
            subject_pattern: self
                .config
                .subject_pattern
                .clone()
                .filter(|p| !p.trim().is_empty()),
            target_date_text: target_date_text.to_string(),
        };
        let max_bytes = self.config.max_message_bytes;
        let scratch_dir = self.scratch_dir.clone();

        let session = self
            .session
            .as_mut()
            .ok_or_else(|| MailboxError::Connection("no open session".into()))?;

        session.open_mailbox(&self.config.folder).await?;
        let uids = session.search(&criteria).await?;
        let sizes: HashMap<u32, u32> = session
            .message_sizes(&uids)
            .await?
            .into_iter()
            .map(|s| (s.uid, s.bytes))
            .collect();

        let mut oversized = 0usize;
        let pending: Vec<u32> = uids
            .into_iter()
            .filter(|uid| match sizes.get(uid) {
                Some(&bytes) if u64::from(bytes) > max_bytes => {
                    warn!(uid, bytes, limit = max_bytes, "message exceeds size ceiling, skipping");
                    oversized += 1;
                    false
                }
                _ => true,
            })
            .collect();

        info!(
            target_date = %filter.target_date_text,
            since = %criteria.since,
            to_fetch = pending.len(),
            oversized,
            "mailbox search complete"
        );

        let scan = CandidateScan {
            session,
            pending: pending.into_iter(),
            filter,
            scratch_dir,
            stats: ScanStats {
                oversized,
                ..ScanStats::default()
            },
        };

        Ok(Box::pin(stream::unfold(scan, |mut scan| async move {
            let next = scan.next_candidate().await;
            next.map(|message| (message, scan))
        })))
    }
}

#[derive(Debug)]
struct CandidateFilter {
    /// Lowercased; empty disables the check.
    sender: String,
    subject_pattern: Option<String>,
    target_date_text: String,
}

impl CandidateFilter {
    /// `None` when the message qualifies, otherwise the reason it does not.
    fn rejection(&self, parsed: &ParsedMessage) -> Option<&'static str> {
        if !self.sender.is_empty() && !parsed.from.to_lowercase().contains(&self.sender) {
            return Some("sender mismatch");
        }
        if let Some(pattern) = &self.subject_pattern {
            if !parsed.subject.contains(pattern.as_str()) {
                return Some("subject pattern mismatch");
            }
        }
        if !parsed.subject.contains(&self.target_date_text) {
            return Some("subject date mismatch");
        }
        None
    }
}

#[derive(Debug, Default)]
struct ScanStats {
    scanned: usize,
    oversized: usize,
    rejected: usize,
    without_attachments: usize,
    failed: usize,
    yielded: usize,
}

struct CandidateScan<'a> {
    session: &'a mut Box<dyn MailSession>,
    pending: std::vec::IntoIter<u32>,
    filter: CandidateFilter,
    scratch_dir: PathBuf,
    stats: ScanStats,
}

impl CandidateScan<'_> {
    async fn next_candidate(&mut self) -> Option<MailMessage> {
        while let Some(uid) = self.pending.next() {
            self.stats.scanned += 1;

            let raw = match self.session.fetch_source(uid).await {
                Ok(raw) => raw,
                Err(e) => {
                    warn!(uid, error = %e, "failed to fetch message, skipping");
                    self.stats.failed += 1;
                    continue;
                }
            };
            let parsed = match parse_message(&raw) {
                Ok(parsed) => parsed,
                Err(e) => {
                    warn!(uid, error = %e, "failed to parse message, skipping");
                    self.stats.failed += 1;
                    continue;
                }
            };
            drop(raw);

            if let Some(reason) = self.filter.rejection(&parsed) {
                debug!(uid, subject = %parsed.subject, reason, "message does not qualify");
                self.stats.rejected += 1;
                continue;
            }

            match self.save_tabular(parsed).await {
                Ok(Some(message)) => {
                    info!(
                        uid,
                        subject = %message.subject,
                        attachments = message.attachment_paths.len(),
                        "qualifying message found"
                    );
                    self.stats.yielded += 1;
                    return Some(message);
                }
                Ok(None) => {
                    debug!(uid, "message has no tabular attachments, skipping");
                    self.stats.without_attachments += 1;
                }
                Err(e) => {
                    warn!(uid, error = %e, "failed to save attachments, skipping");
                    self.stats.failed += 1;
                }
            }
        }

        let s = &self.stats;
        info!(
            scanned = s.scanned,
            yielded = s.yielded,
            oversized = s.oversized,
            rejected = s.rejected,
            without_attachments = s.without_attachments,
            failed = s.failed,
            "mailbox scan finished"
        );
        None
    }

    /// Save every tabular attachment. On a write failure the files already
    /// written for this message are removed again.
    async fn save_tabular(&mut self, parsed: ParsedMessage) -> Result<Option<MailMessage>, MailboxError> {
        let mut paths = Vec::new();
        let mut names = Vec::new();

        for attachment in parsed.attachments.iter().filter(|a| is_tabular(&a.file_name)) {
            match save_attachment(&self.scratch_dir, &attachment.file_name, &attachment.content).await {
                Ok(path) => {
                    paths.push(path);
                    names.push(attachment.file_name.clone());
                }
                Err(e) => {
                    discard_saved(&paths).await;
                    return Err(e.into());
                }
            }
        }

        if paths.is_empty() {
            return Ok(None);
        }

        Ok(Some(MailMessage {
            subject: parsed.subject,
            timestamp: parsed.date.unwrap_or_default(),
            sender: parsed.from,
            attachment_paths: paths,
            attachment_names: names,
        }))
    }
}
