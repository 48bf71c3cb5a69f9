//! Error types for Appeal Desk.

/// Configuration-related errors. Any of these at startup is fatal.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Transport-level errors from the messaging and mail channels.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Channel {name} failed to start: {reason}")]
    StartupFailed { name: String, reason: String },

    #[error("Failed to send on channel {name}: {reason}")]
    SendFailed { name: String, reason: String },

    #[error("Channel {name} rejected {method} ({status}): {description}")]
    Rejected {
        name: String,
        method: String,
        status: u16,
        description: String,
    },

    #[error("Invalid message format: {0}")]
    InvalidMessage(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Channel health check failed: {name}")]
    HealthCheckFailed { name: String },
}

impl From<reqwest::Error> for ChannelError {
    fn from(e: reqwest::Error) -> Self {
        Self::Http(e.to_string())
    }
}

/// Outbound delivery failures. Logged, never surfaced to the end user.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("Operator notification failed: {0}")]
    Operator(#[source] ChannelError),

    #[error("Email delivery failed: {0}")]
    Email(#[source] ChannelError),

    #[error("Failed to fetch attachment {file_name}: {source}")]
    AttachmentFetch {
        file_name: String,
        #[source]
        source: ChannelError,
    },
}
