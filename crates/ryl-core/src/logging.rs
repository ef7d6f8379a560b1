//! File-backed tracing setup.
//!
//! All diagnostics go to a daily-rolling file under `${RYL_HOME}/logs`;
//! nothing is ever written to stdout or stderr, which the interactive
//! front-end owns. Filtering comes from the `RYL_LOG` env var and
//! defaults to `info`.

use std::path::Path;

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Initializes the global subscriber. The returned guard must be held for
/// the life of the process or buffered log lines are lost on exit.
pub fn init(logs_dir: &Path) -> Result<WorkerGuard> {
    std::fs::create_dir_all(logs_dir)
        .with_context(|| format!("failed to create log directory {}", logs_dir.display()))?;
    let appender = tracing_appender::rolling::daily(logs_dir, "ryl.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let filter = EnvFilter::try_from_env("RYL_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true)
        .init();
    Ok(guard)
}
