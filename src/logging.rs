//! Tracing setup: compact stderr output plus a daily-rotated log file.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use crate::error::ConfigError;

const FILE_PREFIX: &str = "appeal-desk";
const MAX_LOG_FILES: usize = 5;

/// Daily-rotating appender in `log_dir`, keeping the newest few files.
pub fn file_appender(log_dir: &Path) -> Result<RollingFileAppender, ConfigError> {
    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(FILE_PREFIX)
        .filename_suffix("log")
        .max_log_files(MAX_LOG_FILES)
        .build(log_dir)
        .map_err(|e| ConfigError::InvalidValue {
            key: "APPEAL_DESK_LOG_DIR".into(),
            message: format!("{}: {e}", log_dir.display()),
        })
}

/// Install the global subscriber. Keep the returned guard alive for the
/// life of the process or buffered file output is lost.
pub fn init(log_dir: &Path) -> Result<WorkerGuard, ConfigError> {
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender(log_dir)?);

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().with_target(false))
        .with(
            fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false)
                .with_target(false),
        )
        .init();

    Ok(guard)
}
