//! SMTP email sink via `lettre`.
//!
//! Mails a short plain-text digest of each event. The records themselves
//! stay on the live feed.

use leadsync_core::config::NotifyConfig;
use lettre::message::header::{ContentType, To};
use lettre::message::{Mailbox, Mailboxes};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::traits::{EventSink, LedgerEvent, NotifyError};

const SUBMISSION_PORT: u16 = 587;
const IMPLICIT_TLS_PORT: u16 = 465;

pub struct EmailNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    sender: Mailbox,
    recipients: Mailboxes,
}

impl std::fmt::Debug for EmailNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailNotifier")
            .field("sender", &self.sender.to_string())
            .field("recipients", &self.recipients.iter().count())
            .finish()
    }
}

impl EmailNotifier {
    /// Build from the `NOTIFY_SMTP_*` / `NOTIFY_EMAIL_*` settings.
    ///
    /// Port 465 means implicit TLS; any other port (default 587) negotiates STARTTLS.
    pub fn from_config(config: &NotifyConfig) -> Result<Self, NotifyError> {
        let host = config
            .smtp_host
            .as_deref()
            .ok_or_else(|| NotifyError::Config("NOTIFY_SMTP_HOST is not set".into()))?;
        let sender_text = config
            .email_from
            .as_deref()
            .ok_or_else(|| NotifyError::Config("NOTIFY_EMAIL_FROM is not set".into()))?;

        let sender: Mailbox = sender_text
            .parse()
            .map_err(|e| NotifyError::Config(format!("sender {sender_text}: {e}")))?;

        let mut recipients = Mailboxes::new();
        for address in &config.email_to {
            let mailbox: Mailbox = address
                .parse()
                .map_err(|e| NotifyError::Config(format!("recipient {address}: {e}")))?;
            recipients.push(mailbox);
        }
        if recipients.iter().next().is_none() {
            return Err(NotifyError::Config("NOTIFY_EMAIL_TO has no recipients".into()));
        }

        let port = config.smtp_port.unwrap_or(SUBMISSION_PORT);
        let relay = if port == IMPLICIT_TLS_PORT {
            AsyncSmtpTransport::<Tokio1Executor>::relay(host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
        };
        let mut builder = relay
            .map_err(|e| NotifyError::Config(format!("smtp relay {host}: {e}")))?
            .port(port);

        if let (Some(user), Some(pass)) = (&config.smtp_username, &config.smtp_password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            sender,
            recipients,
        })
    }

    fn compose(&self, event: &LedgerEvent) -> Result<Message, NotifyError> {
        let (subject, body) = event.summary();
        Message::builder()
            .from(self.sender.clone())
            .mailbox(To::from(self.recipients.clone()))
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body)
            .map_err(|e| NotifyError::Smtp(e.to_string()))
    }
}

#[async_trait::async_trait]
impl EventSink for EmailNotifier {
    async fn publish(&self, event: &LedgerEvent) -> Result<(), NotifyError> {
        let message = self.compose(event)?;
        self.transport
            .send(message)
            .await
            .map_err(|e| NotifyError::Smtp(e.to_string()))?;

        tracing::info!(event = event.name(), "event digest emailed");
        Ok(())
    }

    fn channel_name(&self) -> &str {
        "email"
    }
}
