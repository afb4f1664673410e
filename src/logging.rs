use anyhow::{Context, Result};
use camino::Utf8Path;
use std::fs;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Prefix for rotated log files.
pub const LOG_PREFIX: &str = "iosapplist";

/// Build the level filter. `RUST_LOG` wins over the debug flag when set.
pub fn env_filter(debug_mode: bool) -> EnvFilter {
    let default_level = if debug_mode { "debug" } else { "warn" };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Setup logging to stderr, optionally also to a daily rotating file.
///
/// stdout is reserved for command output, so console logs go to stderr.
///
/// # Arguments
/// * `log_dir` - Directory for log files, or `None` for stderr only
/// * `debug_mode` - If true, use debug level; otherwise only warnings
///
/// # Returns
/// A guard that must be held for the duration of the program to keep file
/// logging active (`None` when no file layer was installed)
pub fn setup_logging(
    log_dir: Option<&Utf8Path>,
    debug_mode: bool,
) -> Result<Option<WorkerGuard>> {
    let (file_layer, guard) = match log_dir {
        Some(log_dir) => {
            // Create log directory if it doesn't exist
            if !log_dir.exists() {
                fs::create_dir_all(log_dir)
                    .with_context(|| format!("Failed to create log directory: {}", log_dir))?;
            }

            let file_appender = rolling::daily(log_dir, LOG_PREFIX);
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false) // No ANSI codes in log files
                .with_target(true)
                .with_file(true)
                .with_line_number(true);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter(debug_mode))
        .with(file_layer)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .try_init()
        .context("Failed to install log subscriber")?;

    tracing::debug!(
        "Logging initialized: dir={:?}, debug={}",
        log_dir.map(Utf8Path::as_str),
        debug_mode
    );

    Ok(guard)
}
