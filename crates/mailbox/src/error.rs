use thiserror::Error;

/// Errors raised while talking to the mail server or reading its messages.
#[derive(Error, Debug)]
pub enum MailboxError {
    #[error("Mailbox connection failed: {0}")]
    Connection(String),

    #[error("Mailbox protocol error: {0}")]
    Protocol(String),

    #[error("Message parse error: {0}")]
    Parse(String),

    #[error("Attachment I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<async_imap::error::Error> for MailboxError {
    fn from(e: async_imap::error::Error) -> Self {
        MailboxError::Protocol(e.to_string())
    }
}
