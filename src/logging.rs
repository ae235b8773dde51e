//! Tracing setup for Jotter.
//!
//! `RUST_LOG` takes precedence. Otherwise the configured level applies to
//! this crate and to the HTTP trace layer, and everything else logs at `warn`.

use std::fs::{self, File};
use std::path::Path;
use std::sync::Arc;

use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;
use crate::{JotterError, Result};

/// Normalize a configured level name. Unknown names fall back to `info`.
fn normalize_level(level: &str) -> &'static str {
    match level.trim().to_lowercase().as_str() {
        "trace" => "trace",
        "debug" => "debug",
        "warn" | "warning" => "warn",
        "error" => "error",
        _ => "info",
    }
}

fn default_directives(level: &str) -> String {
    let level = normalize_level(level);
    format!("warn,jotter={level},tower_http={level}")
}

fn build_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives(level)))
}

/// Initialize logging to stdout and, when `config.file` is set, a log file.
///
/// Fails if the log file cannot be created or a subscriber is already set.
pub fn init(config: &LoggingConfig) -> Result<()> {
    let filter = build_filter(&config.level);
    let console = tracing_subscriber::fmt::layer().with_target(true);

    if config.file.trim().is_empty() {
        return tracing_subscriber::registry()
            .with(console)
            .with(filter)
            .try_init()
            .map_err(|e| JotterError::Config(format!("logging already initialized: {e}")));
    }

    if let Some(parent) = Path::new(&config.file).parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let log_file = Arc::new(File::create(&config.file)?);

    tracing_subscriber::registry()
        .with(
            console
                .with_writer(std::io::stdout.and(log_file))
                .with_ansi(false),
        )
        .with(filter)
        .try_init()
        .map_err(|e| JotterError::Config(format!("logging already initialized: {e}")))
}

/// Console-only logging, used when [`init`] fails.
pub fn init_console_only(level: &str) {
    // A subscriber may already be installed; keep it.
    let _ = tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .with(build_filter(level))
        .try_init();
}
