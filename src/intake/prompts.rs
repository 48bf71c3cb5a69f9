//! User-facing texts for every dialogue stage.
//!
//! Fixed labels are formatted through [`TextStyle`]; anything the user typed
//! goes through `TextStyle::user` so rich output stays well-formed.

use super::model::{AttachmentBuffer, Category};
use super::reply::TextStyle;
use super::validate::{
    format_size, ValidationError, BODY_MAX_CHARS, BODY_MIN_CHARS, CONTACT_MIN_CHARS,
    TOPIC_MAX_CHARS, TOPIC_MIN_CHARS,
};

pub fn agreement(style: TextStyle) -> String {
    format!(
        "🎓 {}\n\n\
         Here you can send an appeal about the condition of the premises, the work of \
         teachers and any other issue that comes up during your studies.\n\n\
         ⚖️ {}\n\
         {}\n\n\
         Press \"Accept\" to continue.",
        style.bold("Dear students!"),
        style.bold("Consent to personal data processing:"),
        style.underline(
            "By continuing to use this bot you consent to the processing of your personal data."
        ),
    )
}

pub fn agreement_accepted(_style: TextStyle) -> String {
    "✅ Agreement accepted!\n\nChoose an action:".to_string()
}

pub fn choose_category(style: TextStyle) -> String {
    format!("📋 {}", style.bold("Choose what your appeal is about:"))
}

pub fn category_selected(style: TextStyle, category: Category) -> String {
    format!("✅ Selected: {}", style.bold(category.label()))
}

pub fn ask_topic(style: TextStyle) -> String {
    format!(
        "📝 {} (a short headline):",
        style.bold("Enter the topic of your appeal")
    )
}

pub fn topic_accepted(style: TextStyle, topic: &str) -> String {
    format!("✅ Topic: {}", style.bold_user(topic))
}

pub fn ask_body(style: TextStyle) -> String {
    format!("📄 {}", style.bold("Describe your appeal in detail:"))
}

pub fn upload_instructions(style: TextStyle) -> String {
    format!(
        "📎 {} (photos, documents)\n\n\
         • Allowed formats: JPG, JPEG, PNG, PDF\n\
         • Maximum size: 10 MB\n\
         • You can attach several files\n\n\
         If you have no files, press \"Skip\".",
        style.bold("Attach files"),
    )
}

pub fn upload_skipped(_style: TextStyle) -> String {
    "⏭️ File upload skipped.".to_string()
}

/// Report shown when the user finishes uploading.
pub fn upload_report(style: TextStyle, buffer: &AttachmentBuffer) -> String {
    if buffer.is_empty() {
        return "📎 No files uploaded.".to_string();
    }

    let mut report = format!(
        "📎 {}\n\n✅ Uploaded: {} photo(s) and {} document(s)\n\n",
        style.bold("Upload report:"),
        buffer.image_count(),
        buffer.document_count(),
    );
    for (i, file) in buffer.items().iter().enumerate() {
        report.push_str(&format!(
            "{}. {} ({})\n",
            i + 1,
            style.user(&file.file_name),
            format_size(file.size)
        ));
    }
    report
}

pub fn ask_name(style: TextStyle) -> String {
    format!("👤 {}", style.bold("Enter your full name:"))
}

pub fn name_accepted(style: TextStyle, name: &str) -> String {
    format!("✅ Name: {}", style.bold_user(name))
}

pub fn ask_contact(style: TextStyle) -> String {
    format!(
        "📞 {}\n\n\
         For example:\n\
         • Telegram username (to answer through this bot)\n\
         • Email: example@mail.com\n\
         • Phone: +7 (xxx) xxx-xx-xx\n\
         • Any other way",
        style.bold("How should we get back to you?"),
    )
}

/// Everything collected so far, shown before the user confirms.
pub struct SummaryFields<'a> {
    pub category: Category,
    pub topic: &'a str,
    pub body: &'a str,
    pub submitter_name: &'a str,
    pub contact_method: &'a str,
    pub attachment_count: usize,
}

pub fn summary(style: TextStyle, fields: &SummaryFields<'_>) -> String {
    format!(
        "📋 {}\n\n\
         🏢 {} {}\n\
         📝 {} {}\n\
         👤 {} {}\n\
         📞 {} {}\n\
         📎 {} {}\n\n\
         💬 {}\n{}",
        style.bold("PLEASE REVIEW YOUR APPEAL BEFORE SENDING"),
        style.bold("Category:"),
        fields.category.label(),
        style.bold("Topic:"),
        style.user(fields.topic),
        style.bold("Name:"),
        style.user(fields.submitter_name),
        style.bold("Contact:"),
        style.user(fields.contact_method),
        style.bold("Files:"),
        fields.attachment_count,
        style.bold("Text:"),
        style.user(fields.body),
    )
}

/// Final message after `send`. Identical whatever the delivery outcome.
pub fn dispatched(style: TextStyle) -> String {
    format!(
        "✅ {}\n\n⏰ {}\n\nUse /start to submit another appeal.",
        style.bold("Your appeal has been forwarded to the college administration!"),
        style.bold("You will be contacted as soon as possible."),
    )
}

pub fn cancelled(_style: TextStyle) -> String {
    "❌ Appeal cancelled.\n\nUse /start to begin again.".to_string()
}

pub fn not_understood(_style: TextStyle) -> String {
    "❓ Not understood.\n\nUse the buttons above, or /start to begin again.".to_string()
}

pub fn help(style: TextStyle) -> String {
    format!(
        "ℹ️ {}\n\n\
         /start: begin a new appeal (discards the current one)\n\
         /help: show this message",
        style.bold("Appeal bot"),
    )
}

/// Re-prompt text for a rejected field.
pub fn validation_message(error: &ValidationError) -> String {
    match error {
        ValidationError::TooShort { field: "topic", .. } => {
            format!("❌ The topic cannot be shorter than {TOPIC_MIN_CHARS} characters:")
        }
        ValidationError::TooLong { field: "topic", .. } => {
            format!("❌ The topic is too long. Enter up to {TOPIC_MAX_CHARS} characters:")
        }
        ValidationError::TooShort { field: "body", .. } => {
            format!("❌ The text is too short. Enter at least {BODY_MIN_CHARS} characters:")
        }
        ValidationError::TooLong { field: "body", .. } => {
            format!("❌ The text is too long. Enter up to {BODY_MAX_CHARS} characters:")
        }
        ValidationError::MissingSeparator { .. } => {
            "❌ Enter your first name and last name (and patronymic, if any):".to_string()
        }
        ValidationError::TooShort { field: "contact", .. } => {
            format!("❌ Specify a contact method (at least {CONTACT_MIN_CHARS} characters):")
        }
        other => format!("❌ {other}"),
    }
}
