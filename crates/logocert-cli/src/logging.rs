//! Log to stderr and to `logocert.log` in the output directory

use anyhow::{Context, Result};
use std::io;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

pub const LOG_FILE_NAME: &str = "logocert.log";

/// Flushes buffered log lines when dropped; hold it until exit
pub struct LoggerGuard {
    _file_guard: WorkerGuard,
}

fn default_directives(verbose: bool) -> &'static str {
    if verbose {
        "info,logocert=debug,logocert_core=debug,logocert_browser=debug,logocert_cloudprint=debug,\
         logocert_gdocs=debug,logocert_privet=debug,logocert_suites=debug"
    } else {
        "info"
    }
}

/// Install the global subscriber
///
/// `RUST_LOG` overrides the built-in directives when set.
pub fn init(log_dir: &Path, verbose: bool) -> Result<LoggerGuard> {
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("Failed to create log directory {}", log_dir.display()))?;

    let file_appender = rolling::never(log_dir, LOG_FILE_NAME);
    let (file_non_blocking, file_guard) = tracing_appender::non_blocking(file_appender);
    let file_layer = fmt::layer().with_writer(file_non_blocking).with_ansi(false);

    let stderr_layer = fmt::layer().with_writer(io::stderr).with_target(false);

    let env_filter = match std::env::var("RUST_LOG") {
        Ok(directives) if !directives.is_empty() => {
            EnvFilter::try_new(directives).context("Invalid RUST_LOG directives")?
        }
        _ => EnvFilter::try_new(default_directives(verbose))
            .context("Invalid built-in filtering directives (this is a bug)")?,
    };

    tracing_subscriber::registry()
        .with(file_layer)
        .with(stderr_layer)
        .with(env_filter)
        .try_init()
        .context("Failed to install the log subscriber")?;

    Ok(LoggerGuard {
        _file_guard: file_guard,
    })
}
