//! Protocol seam between [`MailboxClient`](crate::MailboxClient) and the mail server.

use async_trait::async_trait;
use chrono::NaiveDate;
use leadsync_core::config::MailboxConfig;

use crate::error::MailboxError;

/// Server-side search filter. Evaluated by the server to bound transfer cost.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchCriteria {
    pub sender: String,
    /// Only messages received on or after this date.
    pub since: NaiveDate,
}

impl SearchCriteria {
    /// Render as an IMAP `SEARCH` query, e.g. `FROM "a@b.com" SINCE 18-Sep-2025`.
    pub fn to_imap_query(&self) -> String {
        let sender: String = self
            .sender
            .chars()
            .filter(|c| *c != '"' && *c != '\\' && !c.is_control())
            .collect();
        format!("FROM \"{}\" SINCE {}", sender, self.since.format("%d-%b-%Y"))
    }
}

/// Size of a message as reported by the server, before its body is fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageSize {
    pub uid: u32,
    pub bytes: u32,
}

/// An authenticated session with one mail server.
#[async_trait]
pub trait MailSession: Send {
    async fn open_mailbox(&mut self, folder: &str) -> Result<(), MailboxError>;

    /// UIDs matching `criteria`, ascending.
    async fn search(&mut self, criteria: &SearchCriteria) -> Result<Vec<u32>, MailboxError>;

    async fn message_sizes(&mut self, uids: &[u32]) -> Result<Vec<MessageSize>, MailboxError>;

    /// Full RFC 5322 source of one message. Does not mark it as read.
    async fn fetch_source(&mut self, uid: u32) -> Result<Vec<u8>, MailboxError>;

    async fn logout(&mut self) -> Result<(), MailboxError>;
}

/// Opens [`MailSession`]s. One connector is shared for the life of the process.
#[async_trait]
pub trait MailConnector: Send + Sync {
    async fn connect(&self, config: &MailboxConfig) -> Result<Box<dyn MailSession>, MailboxError>;
}
