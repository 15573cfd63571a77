//! Logging setup using `tracing` and `tracing-subscriber`.
//!
//! The updater never owns the process-wide logger outright: [`init`] uses
//! `try_init`, so when the host application has already installed a
//! subscriber the existing one is kept and the call is a no-op. Failures
//! here are never fatal; at worst the updater runs unlogged.

use std::io;
use std::path::PathBuf;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::Level;
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, MakeWriter},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Compact single-line format.
    #[default]
    Compact,
    /// JSON format for machine parsing.
    Json,
}

/// Configuration for logging behavior.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level filter: "error", "warn", "info", "debug" or "trace".
    pub level: String,
    /// Output format.
    pub format: LogFormat,
    /// Optional log file. Logs go to stderr when unset or unopenable.
    pub file: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
            file: None,
        }
    }
}

impl LogConfig {
    fn level(&self) -> Level {
        self.level.parse().unwrap_or(Level::INFO)
    }
}

/// Install the global tracing subscriber described by `config`.
///
/// Never panics and never returns an error: a subscriber that is already
/// installed wins, and an unopenable log file falls back to stderr.
pub fn init(config: &LogConfig) {
    let file = config.file.as_ref().map(|path| {
        std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
    });

    match file {
        Some(Ok(file)) => init_with_writer(config, Mutex::new(file)),
        Some(Err(err)) => {
            init_with_writer(config, io::stderr as fn() -> io::Stderr);
            tracing::warn!(error = %err, "could not open log file, logging to stderr");
        }
        None => init_with_writer(config, io::stderr as fn() -> io::Stderr),
    }
}

/// Install the subscriber with a custom writer (useful for testing).
pub fn init_with_writer<W>(config: &LogConfig, writer: W)
where
    W: for<'writer> MakeWriter<'writer> + Send + Sync + 'static,
{
    let filter = build_env_filter(config.level());

    let installed = match config.format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(writer))
            .try_init(),
        LogFormat::Compact => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact().with_writer(writer))
            .try_init(),
    };

    if installed.is_err() {
        tracing::debug!("tracing subscriber already installed, keeping the existing one");
    }
}

/// Build an `EnvFilter` from the given level, respecting `RUST_LOG`.
fn build_env_filter(level: Level) -> EnvFilter {
    let level = level.as_str().to_lowercase();
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,parchment_updater={level}")))
}
