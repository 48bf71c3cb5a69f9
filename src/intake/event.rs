//! Inbound events consumed by the dialogue, and the button/command codec.

use super::model::IncomingAttachment;

/// A discrete user action delivered by a button press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Accept,
    NewAppeal,
    SelectCategory(usize),
    Next,
    Skip,
    Finish,
    Send,
    Cancel,
}

impl Trigger {
    /// Decode a button's callback payload. Unknown payloads yield `None`.
    pub fn parse(data: &str) -> Option<Self> {
        match data.trim() {
            "accept_agreement" => Some(Self::Accept),
            "new_appeal" => Some(Self::NewAppeal),
            "next_step" => Some(Self::Next),
            "skip_upload" => Some(Self::Skip),
            "finish_upload" => Some(Self::Finish),
            "send_appeal" => Some(Self::Send),
            "cancel_appeal" => Some(Self::Cancel),
            other => other
                .strip_prefix("category_")
                .and_then(|i| i.parse().ok())
                .map(Self::SelectCategory),
        }
    }

    /// Encode as a button's callback payload.
    pub fn callback_data(&self) -> String {
        match self {
            Self::Accept => "accept_agreement".into(),
            Self::NewAppeal => "new_appeal".into(),
            Self::SelectCategory(i) => format!("category_{i}"),
            Self::Next => "next_step".into(),
            Self::Skip => "skip_upload".into(),
            Self::Finish => "finish_upload".into(),
            Self::Send => "send_appeal".into(),
            Self::Cancel => "cancel_appeal".into(),
        }
    }
}

/// A recognized slash command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// `/start` or `/restart`: discard the session and show the agreement.
    Restart,
    Help,
}

impl Command {
    /// Parse a slash command. Bot-name suffixes (`/start@my_bot`) and
    /// trailing arguments are ignored.
    pub fn parse(text: &str) -> Option<Self> {
        let word = text.split_whitespace().next()?;
        let name = word.strip_prefix('/')?;
        let name = name.split('@').next().unwrap_or(name).to_lowercase();
        match name.as_str() {
            "start" | "restart" => Some(Self::Restart),
            "help" => Some(Self::Help),
            _ => None,
        }
    }
}

/// One inbound event, stripped of transport details.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    Text(String),
    Attachment(IncomingAttachment),
    Button(Trigger),
    /// A button press whose payload did not decode.
    UnknownButton(String),
    Command(Command),
    /// A message kind the dialogue never collects (stickers, voice, ...).
    Unsupported,
}

impl InboundEvent {
    /// Classify a text message: recognized commands become `Command`,
    /// everything else (including unknown slash words) stays free text.
    pub fn from_text(text: &str) -> Self {
        match Command::parse(text) {
            Some(command) => Self::Command(command),
            None => Self::Text(text.to_string()),
        }
    }

    pub fn from_callback(data: &str) -> Self {
        match Trigger::parse(data) {
            Some(trigger) => Self::Button(trigger),
            None => Self::UnknownButton(data.to_string()),
        }
    }

    /// Short label for logging. Never includes user content.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Attachment(_) => "attachment",
            Self::Button(_) => "button",
            Self::UnknownButton(_) => "unknown_button",
            Self::Command(_) => "command",
            Self::Unsupported => "unsupported",
        }
    }
}
