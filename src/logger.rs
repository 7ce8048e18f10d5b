//! Logging initialisation via tracing-subscriber.
//!
//! The TUI owns the terminal, so interactive runs log to a file in the data
//! directory; plain subcommands log to stderr.

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;

use crate::error::ConfigError;

pub enum LogTarget<'a> {
    Stderr,
    File(&'a Path),
}

/// Build the filter: `RUST_LOG` wins, `level` is the fallback.
fn filter(level: &str) -> Result<EnvFilter, ConfigError> {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .map_err(|e| ConfigError::Logger(format!("invalid log level '{level}': {e}")))
}

/// Install the global subscriber. Call once at startup.
pub fn init(level: &str, target: LogTarget<'_>) -> Result<(), ConfigError> {
    let filter = filter(level)?;
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    let result = match target {
        LogTarget::Stderr => builder.with_writer(std::io::stderr).try_init(),
        LogTarget::File(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| ConfigError::Logger(format!("failed to open {}: {e}", path.display())))?;
            builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
        }
    };

    result.map_err(|e| ConfigError::Logger(format!("failed to set subscriber: {e}")))
}
