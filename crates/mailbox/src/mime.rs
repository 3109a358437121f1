//! MIME parsing of raw message sources.

use chrono::{DateTime, Utc};
use mail_parser::{MessageParser, MimeHeaders};

use crate::error::MailboxError;

#[derive(Debug, Clone)]
pub struct ParsedAttachment {
    pub file_name: String,
    pub content: Vec<u8>,
}

/// The parts of a message the ingestion pipeline looks at.
#[derive(Debug, Clone)]
pub struct ParsedMessage {
    pub subject: String,
    pub date: Option<DateTime<Utc>>,
    /// Address of the first `From` mailbox, empty when absent.
    pub from: String,
    pub attachments: Vec<ParsedAttachment>,
}

pub fn parse_message(raw: &[u8]) -> Result<ParsedMessage, MailboxError> {
    let message = MessageParser::default()
        .parse(raw)
        .ok_or_else(|| MailboxError::Parse("source is not a MIME message".into()))?;

    let subject = message.subject().unwrap_or_default().trim().to_string();
    let date = message
        .date()
        .and_then(|d| DateTime::<Utc>::from_timestamp(d.to_timestamp(), 0));
    let from = message
        .from()
        .and_then(|addresses| addresses.first())
        .and_then(|addr| addr.address())
        .unwrap_or_default()
        .to_string();

    let attachments = message
        .attachments()
        .filter_map(|part| {
            let file_name = part.attachment_name()?.to_string();
            Some(ParsedAttachment {
                file_name,
                content: part.contents().to_vec(),
            })
        })
        .collect();

    Ok(ParsedMessage {
        subject,
        date,
        from,
        attachments,
    })
}
