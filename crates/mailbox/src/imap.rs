//! IMAP implementation of the session traits.

use std::fmt;
use std::sync::Arc;

use async_imap::Session;
use async_trait::async_trait;
use futures::{pin_mut, StreamExt};
use leadsync_core::config::MailboxConfig;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::rustls::{ClientConfig, RootCertStore};
use tokio_rustls::TlsConnector;
use tracing::{debug, info};

use crate::error::MailboxError;
use crate::session::{MailConnector, MailSession, MessageSize, SearchCriteria};

/// Transport under the IMAP session: TLS or plain TCP.
trait ImapStream: AsyncRead + AsyncWrite + Unpin + Send + fmt::Debug {}

impl<T> ImapStream for T where T: AsyncRead + AsyncWrite + Unpin + Send + fmt::Debug {}

type BoxedStream = Box<dyn ImapStream>;

/// Connects to an IMAP server with the credentials from [`MailboxConfig`].
#[derive(Debug, Default, Clone, Copy)]
pub struct ImapConnector;

impl ImapConnector {
    pub fn new() -> Self {
        Self
    }
}

fn tls_connector() -> Result<TlsConnector, MailboxError> {
    let mut roots = RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    let provider = Arc::new(tokio_rustls::rustls::crypto::ring::default_provider());
    let config = ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| MailboxError::Connection(format!("TLS setup failed: {e}")))?
        .with_root_certificates(roots)
        .with_no_client_auth();

    Ok(TlsConnector::from(Arc::new(config)))
}

#[async_trait]
impl MailConnector for ImapConnector {
    async fn connect(&self, config: &MailboxConfig) -> Result<Box<dyn MailSession>, MailboxError> {
        let tcp = TcpStream::connect((config.host.as_str(), config.port))
            .await
            .map_err(|e| {
                MailboxError::Connection(format!("{}:{}: {e}", config.host, config.port))
            })?;

        let stream: BoxedStream = if config.tls {
            let server_name = ServerName::try_from(config.host.clone())
                .map_err(|e| MailboxError::Connection(format!("invalid host name: {e}")))?;
            let tls = tls_connector()?
                .connect(server_name, tcp)
                .await
                .map_err(|e| MailboxError::Connection(format!("TLS handshake failed: {e}")))?;
            Box::new(tls)
        } else {
            Box::new(tcp)
        };

        let mut client = async_imap::Client::new(stream);
        // Server greeting precedes any command.
        let _ = client.read_response().await;

        let session = client
            .login(&config.username, &config.password)
            .await
            .map_err(|(e, _)| MailboxError::Connection(format!("login rejected: {e}")))?;

        info!(host = %config.host, port = config.port, tls = config.tls, "IMAP session opened");
        Ok(Box::new(ImapSession { session }))
    }
}

/// A logged-in IMAP session.
pub struct ImapSession {
    session: Session<BoxedStream>,
}

fn uid_set(uids: &[u32]) -> String {
    uids.iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

#[async_trait]
impl MailSession for ImapSession {
    async fn open_mailbox(&mut self, folder: &str) -> Result<(), MailboxError> {
        let mailbox = self.session.select(folder).await?;
        debug!(folder, exists = mailbox.exists, "mailbox selected");
        Ok(())
    }

    async fn search(&mut self, criteria: &SearchCriteria) -> Result<Vec<u32>, MailboxError> {
        let query = criteria.to_imap_query();
        let found = self.session.uid_search(&query).await?;
        let mut uids: Vec<u32> = found.into_iter().collect();
        uids.sort_unstable();
        debug!(%query, matches = uids.len(), "IMAP search complete");
        Ok(uids)
    }

    async fn message_sizes(&mut self, uids: &[u32]) -> Result<Vec<MessageSize>, MailboxError> {
        if uids.is_empty() {
            return Ok(Vec::new());
        }
        let fetches = self
            .session
            .uid_fetch(uid_set(uids), "(UID RFC822.SIZE)")
            .await?;
        pin_mut!(fetches);

        let mut sizes = Vec::with_capacity(uids.len());
        while let Some(fetch) = fetches.next().await {
            let fetch = fetch?;
            if let (Some(uid), Some(bytes)) = (fetch.uid, fetch.size) {
                sizes.push(MessageSize { uid, bytes });
            }
        }
        Ok(sizes)
    }

    async fn fetch_source(&mut self, uid: u32) -> Result<Vec<u8>, MailboxError> {
        let fetches = self
            .session
            .uid_fetch(uid.to_string(), "BODY.PEEK[]")
            .await?;
        pin_mut!(fetches);

        let mut source = None;
        while let Some(fetch) = fetches.next().await {
            let fetch = fetch?;
            if source.is_none() {
                source = fetch.body().map(<[u8]>::to_vec);
            }
        }
        source.ok_or_else(|| MailboxError::Protocol(format!("no body returned for UID {uid}")))
    }

    async fn logout(&mut self) -> Result<(), MailboxError> {
        self.session.logout().await?;
        Ok(())
    }
}
