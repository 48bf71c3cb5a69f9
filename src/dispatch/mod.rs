//! Dual-channel delivery of a completed appeal.
//!
//! Both channels are attempted for every appeal. A failure on one side is
//! logged and reported in [`DispatchReport`] but never stops the other, and
//! never changes what the submitter is told.

pub mod render;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::error::{ChannelError, DeliveryError};
use crate::intake::model::{Appeal, AttachmentRef};
use crate::intake::reply::TextStyle;

use render::AttachmentBatch;

// ── Collaborator seams ──────────────────────────────────────────────

/// Where operator notifications go.
#[async_trait]
pub trait OperatorSink: Send + Sync {
    async fn send_text(&self, chat_id: i64, text: &str, style: TextStyle)
    -> Result<(), ChannelError>;

    async fn send_attachment(
        &self,
        chat_id: i64,
        attachment: &AttachmentRef,
        caption: &str,
    ) -> Result<(), ChannelError>;

    /// Send several attachments of one kind as a single grouped message.
    async fn send_attachment_group(
        &self,
        chat_id: i64,
        attachments: &[AttachmentRef],
        caption: &str,
    ) -> Result<(), ChannelError>;
}

/// Resolves an attachment reference to its bytes.
#[async_trait]
pub trait AttachmentStore: Send + Sync {
    async fn fetch(&self, file_id: &str) -> Result<Vec<u8>, ChannelError>;
}

/// Authenticated mail submission.
#[async_trait]
pub trait MailRelay: Send + Sync {
    async fn send(&self, mail: OutgoingMail) -> Result<(), ChannelError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailAttachment {
    pub file_name: String,
    pub content_type: String,
    pub content: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
    pub attachments: Vec<MailAttachment>,
}

/// Fixed, process-wide delivery destinations.
#[derive(Debug, Clone)]
pub struct DispatchTargets {
    pub operator_chat_id: i64,
    pub mail_from: String,
    pub mail_to: String,
}

// ── Dispatcher ──────────────────────────────────────────────────────

/// Outcome of one dispatch, per channel.
#[derive(Debug)]
pub struct DispatchReport {
    pub operator: Result<(), DeliveryError>,
    pub email: Result<(), DeliveryError>,
    /// Attachments left out of the email because their content could not be
    /// fetched.
    pub skipped_attachments: Vec<String>,
}

impl DispatchReport {
    pub fn is_complete(&self) -> bool {
        self.operator.is_ok() && self.email.is_ok() && self.skipped_attachments.is_empty()
    }
}

pub struct Dispatcher {
    operator: Arc<dyn OperatorSink>,
    store: Arc<dyn AttachmentStore>,
    mail: Arc<dyn MailRelay>,
    targets: DispatchTargets,
    style: TextStyle,
}

impl Dispatcher {
    pub fn new(
        operator: Arc<dyn OperatorSink>,
        store: Arc<dyn AttachmentStore>,
        mail: Arc<dyn MailRelay>,
        targets: DispatchTargets,
        style: TextStyle,
    ) -> Self {
        Self {
            operator,
            store,
            mail,
            targets,
            style,
        }
    }

    /// Deliver an appeal through both channels. Never fails as a whole.
    pub async fn dispatch(&self, appeal: &Appeal) -> DispatchReport {
        let (operator, email) = tokio::join!(
            self.notify_operator(appeal),
            self.notify_by_email(appeal)
        );

        let (email, skipped_attachments) = match email {
            Ok(skipped) => (Ok(()), skipped),
            Err(e) => (Err(e), Vec::new()),
        };

        if let Err(e) = &operator {
            warn!(appeal_id = %appeal.id, error = %e, "Operator notification failed");
        }
        if let Err(e) = &email {
            warn!(appeal_id = %appeal.id, error = %e, "Email delivery failed");
        }

        let report = DispatchReport {
            operator,
            email,
            skipped_attachments,
        };
        if report.is_complete() {
            info!(
                appeal_id = %appeal.id,
                category = %appeal.category,
                attachments = appeal.attachments.len(),
                "Appeal delivered"
            );
        } else {
            warn!(
                appeal_id = %appeal.id,
                operator_ok = report.operator.is_ok(),
                email_ok = report.email.is_ok(),
                skipped = report.skipped_attachments.len(),
                "Appeal delivered partially"
            );
        }
        report
    }

    /// Send the structured notification, then the attachments.
    pub async fn notify_operator(&self, appeal: &Appeal) -> Result<(), DeliveryError> {
        let chat_id = self.targets.operator_chat_id;
        let text = render::operator_message(appeal, self.style);
        self.operator
            .send_text(chat_id, &text, self.style)
            .await
            .map_err(DeliveryError::Operator)?;

        for batch in render::operator_batches(appeal) {
            let sent = match batch {
                AttachmentBatch::Single {
                    attachment,
                    caption,
                } => {
                    self.operator
                        .send_attachment(chat_id, attachment, &caption)
                        .await
                }
                AttachmentBatch::Group {
                    attachments,
                    caption,
                } => {
                    let group: Vec<AttachmentRef> = attachments.into_iter().cloned().collect();
                    self.operator
                        .send_attachment_group(chat_id, &group, &caption)
                        .await
                }
            };
            sent.map_err(DeliveryError::Operator)?;
        }
        Ok(())
    }

    /// Send the email. Attachments whose content cannot be fetched are
    /// skipped; their names are returned.
    pub async fn notify_by_email(&self, appeal: &Appeal) -> Result<Vec<String>, DeliveryError> {
        let mut attachments = Vec::with_capacity(appeal.attachments.len());
        let mut skipped = Vec::new();

        for attachment in &appeal.attachments {
            match self.store.fetch(&attachment.file_id).await {
                Ok(content) => attachments.push(MailAttachment {
                    file_name: attachment.file_name.clone(),
                    content_type: render::content_type_for(&attachment.file_name).to_string(),
                    content,
                }),
                Err(source) => {
                    let e = DeliveryError::AttachmentFetch {
                        file_name: attachment.file_name.clone(),
                        source,
                    };
                    warn!(appeal_id = %appeal.id, error = %e, "Skipping email attachment");
                    skipped.push(attachment.file_name.clone());
                }
            }
        }

        let mail = OutgoingMail {
            from: self.targets.mail_from.clone(),
            to: self.targets.mail_to.clone(),
            subject: render::email_subject(appeal),
            body: render::email_body(appeal),
            attachments,
        };
        self.mail.send(mail).await.map_err(DeliveryError::Email)?;
        Ok(skipped)
    }
}
