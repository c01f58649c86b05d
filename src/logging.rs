//! Logging setup for the relay, bot and client binaries.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;
use crate::Result;

/// Crates whose chatter is capped at `warn` unless `RUST_LOG` says otherwise.
const QUIET_CRATES: &[&str] = &["hyper", "hyper_util", "reqwest", "rustls"];

/// Parse log level string to tracing Level.
fn parse_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" | "warning" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

fn build_filter(level: &str) -> EnvFilter {
    let mut filter = EnvFilter::from_default_env().add_directive(parse_level(level).into());
    for name in QUIET_CRATES {
        if let Ok(directive) = format!("{name}=warn").parse() {
            filter = filter.add_directive(directive);
        }
    }
    filter
}

/// Log file path for one process.
///
/// Each bot writes its own file: `logs/chatrelay.log` with component
/// `bot-Claude` becomes `logs/chatrelay-bot-Claude.log`.
pub fn log_path(file: &str, component: Option<&str>) -> PathBuf {
    let path = Path::new(file);
    let Some(component) = component else {
        return path.to_path_buf();
    };

    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{stem}-{component}.{}", ext.to_string_lossy()),
        None => format!("{stem}-{component}"),
    };
    path.with_file_name(name)
}

/// Initialize logging to stdout and the configured log file.
pub fn init(config: &LoggingConfig, component: Option<&str>) -> Result<()> {
    let path = log_path(&config.file, component);
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }

    let log_file = Arc::new(File::create(&path)?);
    let writer = std::io::stdout.and(log_file);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true),
        )
        .with(build_filter(&config.level))
        .init();

    Ok(())
}

/// Initialize console-only logging.
pub fn init_console_only(level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stdout)
                .with_ansi(true)
                .with_target(true),
        )
        .with(build_filter(level))
        .init();
}
