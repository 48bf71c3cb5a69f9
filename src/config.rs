//! Configuration types.
//!
//! Everything comes from the environment. Missing or unparsable required
//! values are fatal at startup.

use std::path::PathBuf;
use std::time::Duration;

use lettre::message::Mailbox;
use secrecy::SecretString;

use crate::channels::email::SmtpConfig;
use crate::dispatch::DispatchTargets;
use crate::error::ConfigError;
use crate::intake::reply::TextStyle;

/// Service configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bot_token: SecretString,
    /// Chat that receives operator notifications.
    pub operator_chat_id: i64,
    pub smtp: SmtpConfig,
    pub mail_from: String,
    /// Mailbox that receives appeals.
    pub corporate_email: String,
    pub text_style: TextStyle,
    pub log_dir: PathBuf,
    /// Sessions idle this long are discarded. `None` disables expiry.
    pub session_idle_timeout: Option<Duration>,
}

impl AppConfig {
    /// Build config from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| -> Result<String, ConfigError> {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
        };

        let bot_token = SecretString::from(required("BOT_TOKEN")?);
        let operator_chat_id = parse("OPERATOR_ID", &required("OPERATOR_ID")?)?;

        let smtp = SmtpConfig {
            host: required("SMTP_SERVER")?,
            port: parse("SMTP_PORT", &required("SMTP_PORT")?)?,
            username: required("SMTP_USER")?,
            password: SecretString::from(required("SMTP_PASSWORD")?),
        };
        let corporate_email = required("CORPORATE_EMAIL")?;
        let mail_from = lookup("SMTP_FROM")
            .filter(|v| !v.trim().is_empty())
            .map(|v| v.trim().to_string())
            .unwrap_or_else(|| smtp.username.clone());
        // Both ends of the email leg must be deliverable addresses.
        parse::<Mailbox>("CORPORATE_EMAIL", &corporate_email)?;
        let sender_key = if lookup("SMTP_FROM").is_some_and(|v| !v.trim().is_empty()) {
            "SMTP_FROM"
        } else {
            "SMTP_USER"
        };
        parse::<Mailbox>(sender_key, &mail_from)?;

        let text_style = match lookup("APPEAL_DESK_TEXT_STYLE") {
            Some(raw) => TextStyle::parse(&raw).ok_or_else(|| ConfigError::InvalidValue {
                key: "APPEAL_DESK_TEXT_STYLE".into(),
                message: format!("expected 'rich' or 'plain', got '{raw}'"),
            })?,
            None => TextStyle::default(),
        };

        let log_dir = lookup("APPEAL_DESK_LOG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./logs"));

        let idle_minutes: u64 = match lookup("APPEAL_DESK_SESSION_IDLE_MINUTES") {
            Some(raw) => parse("APPEAL_DESK_SESSION_IDLE_MINUTES", &raw)?,
            None => 60,
        };
        let session_idle_timeout =
            (idle_minutes > 0).then(|| Duration::from_secs(idle_minutes * 60));

        Ok(Self {
            bot_token,
            operator_chat_id,
            smtp,
            mail_from,
            corporate_email,
            text_style,
            log_dir,
            session_idle_timeout,
        })
    }

    pub fn dispatch_targets(&self) -> DispatchTargets {
        DispatchTargets {
            operator_chat_id: self.operator_chat_id,
            mail_from: self.mail_from.clone(),
            mail_to: self.corporate_email.clone(),
        }
    }
}

fn parse<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        key: key.to_string(),
        message: e.to_string(),
    })
}
