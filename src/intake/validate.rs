//! Field validators for appeal input.
//!
//! Pure functions, no side effects. Lengths are counted in characters, not
//! bytes, so Cyrillic and other multi-byte input is measured the way the user
//! sees it.

/// Topic length bounds (inclusive).
pub const TOPIC_MIN_CHARS: usize = 5;
pub const TOPIC_MAX_CHARS: usize = 100;

/// Body length bounds (inclusive).
pub const BODY_MIN_CHARS: usize = 20;
pub const BODY_MAX_CHARS: usize = 4000;

/// Minimum contact method length after trimming.
pub const CONTACT_MIN_CHARS: usize = 3;

/// Attachment extensions accepted for documents.
pub const ALLOWED_EXTENSIONS: [&str; 4] = [".jpg", ".jpeg", ".png", ".pdf"];

/// A user-correctable input error. The dialogue re-prompts in place.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{field} is too short: {actual} < {min} characters")]
    TooShort {
        field: &'static str,
        min: usize,
        actual: usize,
    },

    #[error("{field} is too long: {actual} > {max} characters")]
    TooLong {
        field: &'static str,
        max: usize,
        actual: usize,
    },

    #[error("{field} must contain at least two words")]
    MissingSeparator { field: &'static str },
}

fn check_length(
    field: &'static str,
    s: &str,
    min: usize,
    max: Option<usize>,
) -> Result<(), ValidationError> {
    let actual = s.chars().count();
    if actual < min {
        return Err(ValidationError::TooShort { field, min, actual });
    }
    if let Some(max) = max
        && actual > max
    {
        return Err(ValidationError::TooLong { field, max, actual });
    }
    Ok(())
}

pub fn validate_topic(s: &str) -> Result<(), ValidationError> {
    check_length("topic", s, TOPIC_MIN_CHARS, Some(TOPIC_MAX_CHARS))
}

pub fn validate_body(s: &str) -> Result<(), ValidationError> {
    check_length("body", s, BODY_MIN_CHARS, Some(BODY_MAX_CHARS))
}

/// First + last name heuristic: the trimmed input must contain whitespace
/// somewhere in its interior.
pub fn validate_name(s: &str) -> Result<(), ValidationError> {
    if s.trim().contains(char::is_whitespace) {
        Ok(())
    } else {
        Err(ValidationError::MissingSeparator { field: "name" })
    }
}

pub fn validate_contact(s: &str) -> Result<(), ValidationError> {
    check_length("contact", s.trim(), CONTACT_MIN_CHARS, None)
}

/// Case-insensitive suffix match against [`ALLOWED_EXTENSIONS`].
pub fn is_allowed_attachment_extension(filename: &str) -> bool {
    let lower = filename.to_lowercase();
    ALLOWED_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

/// Render a byte count with binary units and one decimal place.
pub fn format_size(bytes: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = 1024 * 1024;

    if bytes < KIB {
        format!("{bytes} B")
    } else if bytes < MIB {
        format!("{:.1} KB", bytes as f64 / KIB as f64)
    } else {
        format!("{:.1} MB", bytes as f64 / MIB as f64)
    }
}
