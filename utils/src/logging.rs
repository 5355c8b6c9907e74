//! Structured logging initialisation via `tracing`.
//!
//! Two output formats are supported:
//! - [`LogFormat::Human`]: readable lines for an operator watching a run.
//! - [`LogFormat::Json`]: newline-delimited JSON for log aggregation.
//!
//! Every line can additionally be appended to a daily log file
//! (`<dir>/logs-YYYY-MM-DD.txt`) so a run leaves an audit trail of each
//! submission and its hash. The filter level can be overridden at runtime
//! via `RUST_LOG`.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Mutex;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::time::utc_date_stamp;

/// Selects the output format for structured logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Human,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "human" => Ok(Self::Human),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format {other:?} (expected human or json)")),
        }
    }
}

/// Path of today's log file inside `dir`.
pub fn daily_log_path(dir: &Path) -> PathBuf {
    dir.join(format!("logs-{}.txt", utc_date_stamp()))
}

fn open_log_file(dir: &Path) -> io::Result<File> {
    fs::create_dir_all(dir)?;
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(daily_log_path(dir))
}

/// Initialise the global tracing subscriber.
///
/// When `log_dir` is set, today's log file is created (or appended to) and
/// receives the same events as stdout, without ANSI colours.
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
pub fn init_logging(format: LogFormat, level: &str, log_dir: Option<&Path>) -> io::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let file = log_dir.map(open_log_file).transpose()?.map(Mutex::new);

    match format {
        LogFormat::Human => {
            let file_layer = file.map(|f| {
                fmt::layer()
                    .with_ansi(false)
                    .with_target(false)
                    .with_writer(f)
            });
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_target(false))
                .with(file_layer)
                .init();
        }
        LogFormat::Json => {
            let file_layer = file.map(|f| fmt::layer().json().with_writer(f));
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_target(true))
                .with(file_layer)
                .init();
        }
    }

    Ok(())
}
