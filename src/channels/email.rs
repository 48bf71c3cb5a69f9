//! Outbound email through an authenticated SMTP relay (STARTTLS) via lettre.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use secrecy::{ExposeSecret, SecretString};

use crate::dispatch::{MailRelay, OutgoingMail};
use crate::error::ChannelError;

// ── Configuration ───────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: SecretString,
}

// ── Mailer ──────────────────────────────────────────────────────────

pub struct SmtpMailer {
    config: SmtpConfig,
}

impl SmtpMailer {
    pub fn new(config: SmtpConfig) -> Self {
        Self { config }
    }

    fn transport(&self) -> Result<SmtpTransport, ChannelError> {
        let creds = Credentials::new(
            self.config.username.clone(),
            self.config.password.expose_secret().to_string(),
        );

        Ok(SmtpTransport::starttls_relay(&self.config.host)
            .map_err(|e| send_failed(format!("SMTP relay error: {e}")))?
            .port(self.config.port)
            .credentials(creds)
            .build())
    }

    /// Connect to the relay without sending anything.
    pub async fn test_connection(&self) -> Result<(), ChannelError> {
        let transport = self.transport()?;
        let connected = tokio::task::spawn_blocking(move || transport.test_connection())
            .await
            .map_err(|e| send_failed(format!("SMTP task failed: {e}")))?
            .map_err(|e| ChannelError::StartupFailed {
                name: "email".into(),
                reason: e.to_string(),
            })?;

        if connected {
            Ok(())
        } else {
            Err(ChannelError::HealthCheckFailed {
                name: "email".into(),
            })
        }
    }
}

#[async_trait]
impl MailRelay for SmtpMailer {
    async fn send(&self, mail: OutgoingMail) -> Result<(), ChannelError> {
        let message = build_message(&mail)?;
        let transport = self.transport()?;

        // lettre's SMTP transport is blocking; keep it off the async workers.
        tokio::task::spawn_blocking(move || transport.send(&message))
            .await
            .map_err(|e| send_failed(format!("SMTP task failed: {e}")))?
            .map_err(|e| send_failed(format!("SMTP send failed: {e}")))?;

        tracing::info!(
            to = %mail.to,
            attachments = mail.attachments.len(),
            "Email sent"
        );
        Ok(())
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

/// Build the MIME message: a plain-text part followed by one part per
/// attachment.
pub fn build_message(mail: &OutgoingMail) -> Result<Message, ChannelError> {
    let from: Mailbox = mail
        .from
        .parse()
        .map_err(|e| send_failed(format!("Invalid from address: {e}")))?;
    let to: Mailbox = mail
        .to
        .parse()
        .map_err(|e| send_failed(format!("Invalid to address: {e}")))?;

    let mut body = MultiPart::mixed().singlepart(SinglePart::plain(mail.body.clone()));
    for attachment in &mail.attachments {
        let content_type = ContentType::parse(&attachment.content_type)
            .map_err(|e| send_failed(format!("Invalid content type: {e}")))?;
        body = body.singlepart(
            Attachment::new(attachment.file_name.clone())
                .body(attachment.content.clone(), content_type),
        );
    }

    Message::builder()
        .from(from)
        .to(to)
        .subject(&mail.subject)
        .multipart(body)
        .map_err(|e| send_failed(format!("Failed to build email: {e}")))
}

fn send_failed(reason: String) -> ChannelError {
    ChannelError::SendFailed {
        name: "email".into(),
        reason,
    }
}
