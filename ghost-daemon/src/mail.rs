//! Outgoing notification mail over implicit-TLS SMTP.

use std::time::Duration;

use async_trait::async_trait;
use ghost_core::SmtpSettings;
use lettre::message::{header::ContentType, Mailbox, Message};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Tokio1Executor};

use crate::error::DaemonError;

const SEND_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, smtp: &SmtpSettings, email: &OutgoingEmail) -> Result<(), DaemonError>;
}

/// Sends through the configured server, authenticating as the SMTP user.
#[derive(Debug, Clone, Copy, Default)]
pub struct SmtpMailer;

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, smtp: &SmtpSettings, email: &OutgoingEmail) -> Result<(), DaemonError> {
        let message = build_message(smtp, email)?;
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&smtp.server)
            .map_err(|e| DaemonError::Mail(e.to_string()))?
            .port(smtp.port)
            .credentials(Credentials::new(smtp.user.clone(), smtp.password.clone()))
            .timeout(Some(SEND_TIMEOUT))
            .build();
        transport
            .send(message)
            .await
            .map_err(|e| DaemonError::Mail(e.to_string()))?;
        tracing::info!(to = %email.to, server = %smtp.server, "email sent");
        Ok(())
    }
}

/// Plain-text message from the SMTP user to `email.to`.
pub(crate) fn build_message(
    smtp: &SmtpSettings,
    email: &OutgoingEmail,
) -> Result<Message, DaemonError> {
    let from: Mailbox = smtp
        .user
        .parse()
        .map_err(|e| DaemonError::Mail(format!("invalid sender '{}': {e}", smtp.user)))?;
    let to: Mailbox = email
        .to
        .parse()
        .map_err(|e| DaemonError::Mail(format!("invalid recipient '{}': {e}", email.to)))?;
    Message::builder()
        .from(from)
        .to(to)
        .subject(email.subject.clone())
        .header(ContentType::TEXT_PLAIN)
        .body(email.body.clone())
        .map_err(|e| DaemonError::Mail(e.to_string()))
}
