//! Mailbox access for report ingestion.
//!
//! This crate provides:
//! - `MailConnector` / `MailSession` traits over the mail protocol
//! - An IMAP implementation built on `async-imap` (TLS via `tokio-rustls`)
//! - MIME parsing of fetched sources with `mail-parser`
//! - `MailboxClient`, which filters messages and saves tabular attachments

pub mod attachments;
pub mod client;
pub mod error;
pub mod imap;
pub mod mime;
pub mod session;

#[cfg(any(test, feature = "test-util"))]
pub mod memory;

pub use client::MailboxClient;
pub use error::MailboxError;
pub use imap::ImapConnector;
pub use session::{MailConnector, MailSession, MessageSize, SearchCriteria};
