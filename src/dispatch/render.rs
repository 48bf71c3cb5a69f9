//! Delivery payloads for a completed appeal.

use crate::intake::model::{Appeal, AttachmentKind, AttachmentRef};
use crate::intake::reply::TextStyle;

/// Telegram accepts at most this many items in one media group.
pub const MAX_GROUP_SIZE: usize = 10;

const EMAIL_FOOTER: &str = "Sent automatically by the student appeal bot.";

// ── Operator channel ────────────────────────────────────────────────

/// Structured notification for the operator chat.
pub fn operator_message(appeal: &Appeal, style: TextStyle) -> String {
    format!(
        "📨 {}\n\n\
         🏢 {} {}\n\
         📝 {} {}\n\
         📅 {} {}\n\
         👤 {} {}\n\
         📞 {} {}\n\n\
         💬 {}\n{}",
        style.bold("NEW APPEAL"),
        style.bold("Category:"),
        appeal.category.label(),
        style.bold("Topic:"),
        style.user(&appeal.topic),
        style.bold("Date:"),
        appeal.created_at_display(),
        style.bold("Name:"),
        style.user(&appeal.submitter_name),
        style.bold("Contact:"),
        style.user(&appeal.contact_method),
        style.bold("Text:"),
        style.user(&appeal.body),
    )
}

/// One outbound attachment send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachmentBatch<'a> {
    Single {
        attachment: &'a AttachmentRef,
        caption: String,
    },
    Group {
        attachments: Vec<&'a AttachmentRef>,
        caption: String,
    },
}

/// Plan the attachment sends that follow the operator text.
///
/// Images and documents are batched separately since a media group cannot
/// mix them. Each kind goes out in groups of up to [`MAX_GROUP_SIZE`]; a lone
/// item is sent on its own.
pub fn operator_batches(appeal: &Appeal) -> Vec<AttachmentBatch<'_>> {
    let mut batches = Vec::new();
    for kind in [AttachmentKind::Image, AttachmentKind::Document] {
        let items: Vec<&AttachmentRef> = appeal
            .attachments
            .iter()
            .filter(|a| a.kind == kind)
            .collect();
        for chunk in items.chunks(MAX_GROUP_SIZE) {
            // A media group needs at least two items.
            let batch = match chunk {
                [single] => AttachmentBatch::Single {
                    attachment: single,
                    caption: format!("📎 Attachment to appeal: {}", appeal.topic),
                },
                _ => AttachmentBatch::Group {
                    attachments: chunk.to_vec(),
                    caption: format!("📎 Attachments to appeal: {}", appeal.topic),
                },
            };
            batches.push(batch);
        }
    }
    batches
}

// ── Email ───────────────────────────────────────────────────────────

pub fn email_subject(appeal: &Appeal) -> String {
    format!("[{}] {}", appeal.category.label(), appeal.topic)
}

pub fn email_body(appeal: &Appeal) -> String {
    format!(
        "NEW APPEAL\n\n\
         Category: {}\n\
         Topic: {}\n\
         Date: {}\n\
         Name: {}\n\
         Contact: {}\n\n\
         Text:\n{}\n\n\
         ---\n{}",
        appeal.category.label(),
        appeal.topic,
        appeal.created_at_display(),
        appeal.submitter_name,
        appeal.contact_method,
        appeal.body,
        EMAIL_FOOTER,
    )
}

/// MIME type for an attachment, chosen by file extension.
pub fn content_type_for(file_name: &str) -> &'static str {
    let lower = file_name.to_lowercase();
    if lower.ends_with(".jpg") || lower.ends_with(".jpeg") {
        "image/jpeg"
    } else if lower.ends_with(".png") {
        "image/png"
    } else if lower.ends_with(".pdf") {
        "application/pdf"
    } else {
        "application/octet-stream"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intake::model::Category;

    fn attachment(kind: AttachmentKind, n: usize) -> AttachmentRef {
        let file_name = match kind {
            AttachmentKind::Image => format!("photo_{n}.jpg"),
            AttachmentKind::Document => format!("doc_{n}.pdf"),
        };
        AttachmentRef {
            kind,
            file_id: format!("file-{n}"),
            file_name,
            size: 1024,
        }
    }

    fn appeal(attachments: Vec<AttachmentRef>) -> Appeal {
        Appeal::new(
            Category::Premises,
            "Leaking <roof>",
            "Water drips from the ceiling in room 12 & the hallway.",
            "Ivan Ivanov",
            "@ivan",
            attachments,
        )
    }

    #[test]
    fn operator_message_escapes_in_rich_style() {
        let a = appeal(Vec::new());
        let rich = operator_message(&a, TextStyle::Rich);
        assert!(rich.contains("<b>Topic:</b> Leaking &lt;roof&gt;"));
        assert!(rich.contains("room 12 &amp; the hallway"));
        assert!(rich.contains(&a.created_at_display()));

        let plain = operator_message(&a, TextStyle::Plain);
        assert!(plain.contains("Topic: Leaking <roof>"));
        assert!(!plain.contains("<b>"));
    }

    #[test]
    fn no_attachments_no_batches() {
        assert!(operator_batches(&appeal(Vec::new())).is_empty());
    }

    #[test]
    fn single_attachment_sent_individually() {
        let a = appeal(vec![attachment(AttachmentKind::Document, 1)]);
        let batches = operator_batches(&a);
        assert_eq!(batches.len(), 1);
        match &batches[0] {
            AttachmentBatch::Single { attachment, caption } => {
                assert_eq!(attachment.file_name, "doc_1.pdf");
                assert_eq!(caption, "📎 Attachment to appeal: Leaking <roof>");
            }
            other => panic!("unexpected batch {other:?}"),
        }
    }

    #[test]
    fn batches_split_by_kind_images_first() {
        let a = appeal(vec![
            attachment(AttachmentKind::Document, 1),
            attachment(AttachmentKind::Image, 2),
            attachment(AttachmentKind::Image, 3),
        ]);
        let batches = operator_batches(&a);
        assert_eq!(batches.len(), 2);
        match &batches[0] {
            AttachmentBatch::Group { attachments, caption } => {
                assert_eq!(attachments.len(), 2);
                assert!(attachments.iter().all(|a| a.kind == AttachmentKind::Image));
                assert!(caption.starts_with("📎 Attachments to appeal"));
            }
            other => panic!("unexpected batch {other:?}"),
        }
        assert!(matches!(batches[1], AttachmentBatch::Single { .. }));
    }

    #[test]
    fn large_groups_are_chunked() {
        let docs = (1..=12)
            .map(|n| attachment(AttachmentKind::Document, n))
            .collect();
        let twelve = appeal(docs);
        let batches = operator_batches(&twelve);
        let sizes: Vec<usize> = batches
            .iter()
            .map(|b| match b {
                AttachmentBatch::Group { attachments, .. } => attachments.len(),
                AttachmentBatch::Single { .. } => 1,
            })
            .collect();
        assert_eq!(sizes, vec![10, 2]);

        let docs = (1..=11)
            .map(|n| attachment(AttachmentKind::Document, n))
            .collect();
        let eleven = appeal(docs);
        let batches = operator_batches(&eleven);
        assert_eq!(batches.len(), 2);
        assert!(matches!(batches[1], AttachmentBatch::Single { .. }));
    }

    #[test]
    fn email_subject_and_body() {
        let a = appeal(Vec::new());
        assert_eq!(
            email_subject(&a),
            "[Sanitary condition of the premises] Leaking <roof>"
        );

        let body = email_body(&a);
        assert!(body.contains("Category: Sanitary condition of the premises"));
        assert!(body.contains("Name: Ivan Ivanov"));
        assert!(body.contains("Contact: @ivan"));
        assert!(body.ends_with(EMAIL_FOOTER));
    }

    #[test]
    fn content_types() {
        assert_eq!(content_type_for("photo_1.jpg"), "image/jpeg");
        assert_eq!(content_type_for("SCAN.JPEG"), "image/jpeg");
        assert_eq!(content_type_for("plan.png"), "image/png");
        assert_eq!(content_type_for("Report.PDF"), "application/pdf");
        assert_eq!(content_type_for("notes.txt"), "application/octet-stream");
    }
}
