use std::sync::Arc;

use appeal_desk::channels::email::SmtpMailer;
use appeal_desk::channels::router::{ConversationRouter, DEFAULT_WORKER_IDLE};
use appeal_desk::channels::telegram::TelegramChannel;
use appeal_desk::channels::Channel;
use appeal_desk::config::AppConfig;
use appeal_desk::dispatch::Dispatcher;
use appeal_desk::intake::session::{self, SessionStore};
use appeal_desk::intake::IntakeEngine;
use appeal_desk::logging;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    let config = AppConfig::from_env().unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        std::process::exit(1);
    });

    let _log_guard = logging::init(&config.log_dir).unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        std::process::exit(1);
    });

    eprintln!("📨 Appeal Desk v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Operator chat: {}", config.operator_chat_id);
    eprintln!("   Mail: {} → {}", config.mail_from, config.corporate_email);
    eprintln!("   SMTP: {}:{}", config.smtp.host, config.smtp.port);
    eprintln!("   Logs: {}", config.log_dir.display());
    match config.session_idle_timeout {
        Some(idle) => eprintln!("   Session expiry: {} min", idle.as_secs() / 60),
        None => eprintln!("   Session expiry: disabled"),
    }

    // ── Channels ──────────────────────────────────────────────────────────
    let telegram = Arc::new(TelegramChannel::new(config.bot_token.clone()));
    telegram.health_check().await?;

    let mailer = Arc::new(SmtpMailer::new(config.smtp.clone()));
    if let Err(e) = mailer.test_connection().await {
        tracing::warn!(error = %e, "SMTP relay not reachable at startup");
    }

    // ── Intake ────────────────────────────────────────────────────────────
    let dispatcher = Arc::new(Dispatcher::new(
        telegram.clone(),
        telegram.clone(),
        mailer,
        config.dispatch_targets(),
        config.text_style,
    ));

    let sessions = SessionStore::new();
    let expiry_handle = config
        .session_idle_timeout
        .map(|idle| session::spawn_expiry_task(Arc::clone(&sessions), idle));

    let engine = Arc::new(IntakeEngine::new(
        Arc::clone(&sessions),
        dispatcher,
        config.text_style,
    ));
    let router = ConversationRouter::new(engine, telegram.clone(), DEFAULT_WORKER_IDLE);

    // ── Main loop ─────────────────────────────────────────────────────────
    let updates = telegram.start().await?;
    tracing::info!("Appeal Desk ready and listening");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Ctrl+C received, shutting down...");
        }
        _ = router.run(updates) => {
            tracing::info!("All channel streams ended, shutting down...");
        }
    }

    if let Some(handle) = expiry_handle {
        handle.abort();
    }
    telegram.shutdown().await?;

    Ok(())
}
