//! Appeal record and attachment types.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::validate::is_allowed_attachment_extension;

/// Maximum number of image attachments accepted per conversation.
pub const MAX_IMAGES: usize = 10;

/// Size ceiling for any single attachment (10 MiB).
pub const MAX_ATTACHMENT_BYTES: u64 = 10 * 1024 * 1024;

/// The fixed set of appeal topics, in keyboard order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Premises,
    Equipment,
    Studies,
    Teachers,
    StudentRights,
    Conflicts,
    Catering,
    Corruption,
}

impl Category {
    pub const ALL: [Category; 8] = [
        Self::Premises,
        Self::Equipment,
        Self::Studies,
        Self::Teachers,
        Self::StudentRights,
        Self::Conflicts,
        Self::Catering,
        Self::Corruption,
    ];

    /// Look up a category by its keyboard position.
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn index(&self) -> usize {
        Self::ALL
            .iter()
            .position(|c| c == self)
            .unwrap_or_default()
    }

    /// Human-readable label shown on buttons, in summaries and in deliveries.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Premises => "Sanitary condition of the premises",
            Self::Equipment => "Equipment and facilities",
            Self::Studies => "Organization of the learning process",
            Self::Teachers => "Interaction with teachers",
            Self::StudentRights => "Violation of students' rights",
            Self::Conflicts => "Conflicts with other students",
            Self::Catering => "Catering",
            Self::Corruption => "Reports of corruption",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttachmentKind {
    Image,
    Document,
}

/// An attachment as announced by the inbound transport, before the
/// size/format/count rules are applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingAttachment {
    pub kind: AttachmentKind,
    /// Reference id in the attachment content store.
    pub file_id: String,
    /// Original file name; images usually arrive without one.
    pub file_name: Option<String>,
    pub size: u64,
}

/// An accepted attachment. Metadata only, content stays in the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentRef {
    pub kind: AttachmentKind,
    pub file_id: String,
    pub file_name: String,
    pub size: u64,
}

/// Why an incoming attachment was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentRejection {
    TooLarge,
    UnsupportedFormat,
    LimitReached,
}

impl std::fmt::Display for AttachmentRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::TooLarge => "too_large",
            Self::UnsupportedFormat => "unsupported_format",
            Self::LimitReached => "limit_reached",
        };
        write!(f, "{s}")
    }
}

/// Attachments collected while the dialogue is in the upload stage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttachmentBuffer {
    items: Vec<AttachmentRef>,
}

impl AttachmentBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply the intake rules to an incoming attachment and keep it if it
    /// conforms.
    pub fn offer(
        &mut self,
        incoming: IncomingAttachment,
    ) -> Result<&AttachmentRef, AttachmentRejection> {
        if incoming.size > MAX_ATTACHMENT_BYTES {
            return Err(AttachmentRejection::TooLarge);
        }

        let file_name = match incoming.kind {
            AttachmentKind::Image => {
                let images = self.image_count();
                if images >= MAX_IMAGES {
                    return Err(AttachmentRejection::LimitReached);
                }
                incoming
                    .file_name
                    .unwrap_or_else(|| format!("photo_{}.jpg", images + 1))
            }
            AttachmentKind::Document => match incoming.file_name {
                Some(name) if is_allowed_attachment_extension(&name) => name,
                _ => return Err(AttachmentRejection::UnsupportedFormat),
            },
        };

        self.items.push(AttachmentRef {
            kind: incoming.kind,
            file_id: incoming.file_id,
            file_name,
            size: incoming.size,
        });
        Ok(&self.items[self.items.len() - 1])
    }

    pub fn image_count(&self) -> usize {
        self.items
            .iter()
            .filter(|a| a.kind == AttachmentKind::Image)
            .count()
    }

    pub fn document_count(&self) -> usize {
        self.items.len() - self.image_count()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[AttachmentRef] {
        &self.items
    }

    pub fn into_items(self) -> Vec<AttachmentRef> {
        self.items
    }
}

/// A completed appeal. Built only when every required field has passed
/// validation; immutable afterwards.
#[derive(Debug, Clone, Serialize)]
pub struct Appeal {
    pub id: Uuid,
    pub category: Category,
    pub topic: String,
    pub body: String,
    pub submitter_name: String,
    pub contact_method: String,
    pub attachments: Vec<AttachmentRef>,
    pub created_at: DateTime<Local>,
}

impl Appeal {
    pub fn new(
        category: Category,
        topic: impl Into<String>,
        body: impl Into<String>,
        submitter_name: impl Into<String>,
        contact_method: impl Into<String>,
        attachments: Vec<AttachmentRef>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            category,
            topic: topic.into(),
            body: body.into(),
            submitter_name: submitter_name.into(),
            contact_method: contact_method.into(),
            attachments,
            created_at: Local::now(),
        }
    }

    pub fn images(&self) -> impl Iterator<Item = &AttachmentRef> {
        self.attachments
            .iter()
            .filter(|a| a.kind == AttachmentKind::Image)
    }

    pub fn documents(&self) -> impl Iterator<Item = &AttachmentRef> {
        self.attachments
            .iter()
            .filter(|a| a.kind == AttachmentKind::Document)
    }

    /// Creation time as shown in deliveries.
    pub fn created_at_display(&self) -> String {
        self.created_at.format("%d.%m.%Y %H:%M").to_string()
    }
}
