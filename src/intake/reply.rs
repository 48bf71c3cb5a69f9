//! Outbound presentation: reply text plus a constant button layout.
//!
//! The dialogue only names a `Layout`; turning it into a transport keyboard
//! is the channel's job.

use serde::{Deserialize, Serialize};

use super::event::Trigger;
use super::model::Category;

/// Body text formatting requested from the transport.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextStyle {
    /// HTML subset understood by Telegram (`<b>`, `<i>`, `<u>`).
    #[default]
    Rich,
    Plain,
}

impl TextStyle {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "rich" | "html" => Some(Self::Rich),
            "plain" | "text" => Some(Self::Plain),
            _ => None,
        }
    }

    /// Emphasize a fixed label.
    pub fn bold(&self, s: &str) -> String {
        match self {
            Self::Rich => format!("<b>{s}</b>"),
            Self::Plain => s.to_string(),
        }
    }

    pub fn underline(&self, s: &str) -> String {
        match self {
            Self::Rich => format!("<u>{s}</u>"),
            Self::Plain => s.to_string(),
        }
    }

    /// Embed user-provided content safely.
    pub fn user(&self, s: &str) -> String {
        match self {
            Self::Rich => escape_html(s),
            Self::Plain => s.to_string(),
        }
    }

    /// Emphasize user-provided content.
    pub fn bold_user(&self, s: &str) -> String {
        self.bold(&self.user(s))
    }
}

/// Escape the characters Telegram's HTML parse mode treats as markup.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
    out
}

/// The fixed set of button layouts the dialogue can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    None,
    Agreement,
    MainMenu,
    CategoryList,
    NextStep,
    UploadControls,
    ConfirmCancel,
}

/// One button: visible label plus the trigger it fires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub label: String,
    pub trigger: Trigger,
}

impl Button {
    fn new(label: impl Into<String>, trigger: Trigger) -> Self {
        Self {
            label: label.into(),
            trigger,
        }
    }
}

impl Layout {
    /// Rows of buttons, one button per row.
    pub fn rows(&self) -> Vec<Vec<Button>> {
        let single = |label: &str, trigger| vec![vec![Button::new(label, trigger)]];
        match self {
            Self::None => Vec::new(),
            Self::Agreement => single("✅ Accept", Trigger::Accept),
            Self::MainMenu => single("📝 Write an appeal", Trigger::NewAppeal),
            Self::CategoryList => Category::ALL
                .iter()
                .enumerate()
                .map(|(i, c)| {
                    vec![Button::new(
                        format!("{}. {}", i + 1, c.label()),
                        Trigger::SelectCategory(i),
                    )]
                })
                .collect(),
            Self::NextStep => single("➡️ Next", Trigger::Next),
            Self::UploadControls => vec![
                vec![Button::new("⏭️ Skip", Trigger::Skip)],
                vec![Button::new("✅ Finish upload", Trigger::Finish)],
            ],
            Self::ConfirmCancel => vec![
                vec![Button::new("📤 Send appeal", Trigger::Send)],
                vec![Button::new("❌ Cancel", Trigger::Cancel)],
            ],
        }
    }
}

/// One message to show the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub layout: Layout,
    pub style: TextStyle,
}

impl Reply {
    pub fn new(text: impl Into<String>, layout: Layout, style: TextStyle) -> Self {
        Self {
            text: text.into(),
            layout,
            style,
        }
    }
}
