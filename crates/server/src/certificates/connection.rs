//! The single mail connection a batch sends through.
//!
//! A batch owns one [`DispatchConnection`] for its whole lifetime. It wraps a
//! [`MailConnection`] and applies the cooldown policy: after every
//! `cooldown_every` processed items, if work remains, the connection is
//! closed, the batch pauses, and the connection is opened again.

use async_trait::async_trait;
use lettre::transport::smtp::PoolConfig;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::time::Duration;

use crate::config::{CertificateConfig, SmtpConfig};
use crate::entity::email_configuration;
use crate::error::TransportError;

/// Open / send-one / close capability over some mail transport.
#[async_trait]
pub trait MailConnection: Send {
    async fn open(&mut self) -> Result<(), TransportError>;

    async fn send(&mut self, message: Message) -> Result<(), TransportError>;

    /// Release the connection. Must be safe to call when `open` failed or
    /// was never called.
    async fn close(&mut self);
}

/// SMTP connection over STARTTLS with a pool of exactly one connection, so
/// every message of a batch reuses the same session.
pub struct SmtpConnection {
    host: String,
    port: u16,
    credentials: Credentials,
    timeout: Duration,
    transport: Option<AsyncSmtpTransport<Tokio1Executor>>,
}

impl SmtpConnection {
    /// Host and port come from the email configuration row, credentials and
    /// timeout from the application config.
    pub fn new(settings: &email_configuration::Model, smtp: &SmtpConfig) -> Self {
        let port = u16::try_from(settings.smtp_port).unwrap_or(smtp.port);
        Self {
            host: settings.smtp_host.clone(),
            port,
            credentials: Credentials::new(smtp.username.clone(), smtp.password.clone()),
            timeout: smtp.timeout(),
            transport: None,
        }
    }
}

#[async_trait]
impl MailConnection for SmtpConnection {
    #[tracing::instrument(skip(self), fields(host = %self.host, port = self.port))]
    async fn open(&mut self) -> Result<(), TransportError> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.host)
            .map_err(|e| TransportError::Open(e.to_string()))?
            .port(self.port)
            .credentials(self.credentials.clone())
            .timeout(Some(self.timeout))
            .pool_config(PoolConfig::new().max_size(1))
            .build();

        match transport.test_connection().await {
            Ok(true) => {
                self.transport = Some(transport);
                Ok(())
            }
            Ok(false) => Err(TransportError::Open(format!(
                "{}:{} did not accept the connection",
                self.host, self.port
            ))),
            Err(e) => Err(TransportError::Open(e.to_string())),
        }
    }

    async fn send(&mut self, message: Message) -> Result<(), TransportError> {
        let transport = self.transport.as_ref().ok_or(TransportError::NotOpen)?;
        transport
            .send(message)
            .await
            .map(|_| ())
            .map_err(|e| TransportError::Send(e.to_string()))
    }

    async fn close(&mut self) {
        if self.transport.take().is_some() {
            tracing::debug!(
                name = "certificates.connection.closed",
                target = concat!(env!("CARGO_PKG_NAME"), "::", module_path!()),
                host = %self.host,
                message = "Closed SMTP connection"
            );
        }
    }
}

/// How often a batch pauses to stay under the provider's rate limit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CooldownPolicy {
    pub every: usize,
    pub pause: Duration,
}

impl Default for CooldownPolicy {
    fn default() -> Self {
        Self {
            every: 80,
            pause: Duration::from_secs(100),
        }
    }
}

impl CooldownPolicy {
    pub fn from_config(certificates: &CertificateConfig) -> Self {
        Self {
            every: certificates.cooldown_every,
            pause: certificates.cooldown_pause(),
        }
    }

    /// A cooldown is due once every `every` processed items, never when
    /// nothing is left to send.
    pub fn is_due(&self, processed: usize, remaining: usize) -> bool {
        self.every > 0 && processed > 0 && processed % self.every == 0 && remaining > 0
    }
}

/// A batch's connection together with its cooldown bookkeeping.
pub struct DispatchConnection<C> {
    connection: C,
    policy: CooldownPolicy,
    processed: usize,
    cooldowns: usize,
}

impl<C: MailConnection> DispatchConnection<C> {
    pub fn new(connection: C, policy: CooldownPolicy) -> Self {
        Self {
            connection,
            policy,
            processed: 0,
            cooldowns: 0,
        }
    }

    pub async fn open(&mut self) -> Result<(), TransportError> {
        self.connection.open().await
    }

    pub async fn send(&mut self, message: Message) -> Result<(), TransportError> {
        self.connection.send(message).await
    }

    /// Count one processed item and run a cooldown if it is due.
    ///
    /// Fails only when the connection cannot be reopened after the pause.
    pub async fn item_done(&mut self, remaining: usize) -> Result<(), TransportError> {
        self.processed += 1;
        if !self.policy.is_due(self.processed, remaining) {
            return Ok(());
        }

        self.cooldowns += 1;
        tracing::info!(
            name = "certificates.connection.cooldown",
            target = concat!(env!("CARGO_PKG_NAME"), "::", module_path!()),
            processed = self.processed,
            remaining = remaining,
            pause_secs = self.policy.pause.as_secs(),
            message = "Pausing batch to respect provider rate limits"
        );
        self.connection.close().await;
        tokio::time::sleep(self.policy.pause).await;
        self.connection.open().await
    }

    pub async fn close(&mut self) {
        self.connection.close().await;
    }

    pub fn processed(&self) -> usize {
        self.processed
    }

    pub fn cooldowns(&self) -> usize {
        self.cooldowns
    }
}
