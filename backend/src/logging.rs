use std::path::Path;

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    filter::Targets, fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer,
};

/// Events logged under this target also land in the daily reply log file.
pub const REPLY_LOG_TARGET: &str = "reply_log";

fn env_filter() -> EnvFilter {
    // Default to info-level logs; override via RUST_LOG if needed.
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Console-only logging for short-lived commands.
pub fn init_console_logging() {
    tracing_subscriber::fmt().with_env_filter(env_filter()).init();
}

/// Console logging plus `reply.log.<date>` files under `log_dir` carrying
/// only [`REPLY_LOG_TARGET`] events. Keep the guard alive for the lifetime of
/// the process or buffered lines are lost.
pub fn init_daemon_logging(log_dir: &Path) -> Result<WorkerGuard> {
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("failed to create log dir {}", log_dir.display()))?;
    let (writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::daily(log_dir, "reply.log"));

    let console = fmt::layer().with_filter(env_filter());
    let reply_file = fmt::layer()
        .with_ansi(false)
        .with_target(false)
        .with_writer(writer)
        .with_filter(Targets::new().with_target(REPLY_LOG_TARGET, tracing::Level::INFO));

    tracing_subscriber::registry()
        .with(console)
        .with(reply_file)
        .try_init()
        .context("failed to install tracing subscriber")?;
    Ok(guard)
}
