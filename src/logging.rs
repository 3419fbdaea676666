//! Logging configuration for the indexer.
//!
//! Logs go to a daily-rolling file when a log directory is given. Otherwise
//! journald is used on Linux when reachable, falling back to stderr.

use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Environment variable holding the log filter (e.g. `debug`, `photoindex=trace`).
pub const LOG_ENV: &str = "PHOTOINDEX_LOG";

/// Initialize the logging system. Call once at startup.
pub fn init(log_dir: Option<PathBuf>) -> Result<()> {
    let env_filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));

    if let Some(log_dir) = log_dir {
        std::fs::create_dir_all(&log_dir)
            .with_context(|| format!("Failed to create log directory {:?}", log_dir))?;

        let file_appender = tracing_appender::rolling::daily(&log_dir, "photoindex.log");
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        // The writer flushes on drop, so the guard lives for the whole process.
        static GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
            std::sync::OnceLock::new();
        let _ = GUARD.set(guard);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
            .try_init()
            .context("Failed to set tracing subscriber")?;

        tracing::info!("Logging initialized with file backend at {:?}", log_dir);
        return Ok(());
    }

    #[cfg(target_os = "linux")]
    {
        if let Ok(journald_layer) = tracing_journald::layer() {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(journald_layer)
                .try_init()
                .context("Failed to set tracing subscriber")?;

            tracing::info!("Logging initialized with journald backend");
            return Ok(());
        }
    }

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .try_init()
        .context("Failed to set tracing subscriber")?;

    Ok(())
}
