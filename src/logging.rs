//! Tracing setup: terse stderr output plus an append-only log file.

use std::path::{Path, PathBuf};

use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::DEFAULT_LOG_FILE;

/// How logging should be set up for this process.
#[derive(Debug, Clone)]
pub struct LogOptions {
    /// File every event is appended to.
    pub log_file: PathBuf,
    /// Log debug events to both outputs.
    pub verbose: bool,
}

impl Default for LogOptions {
    fn default() -> Self {
        Self {
            log_file: PathBuf::from(DEFAULT_LOG_FILE),
            verbose: false,
        }
    }
}

/// `RUST_LOG` if set, otherwise `default`.
fn env_filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

/// Split a log path into the appender's directory and file name.
fn split_log_path(path: &Path) -> anyhow::Result<(PathBuf, String)> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| anyhow::anyhow!("Invalid log file path: {}", path.display()))?
        .to_string();
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    Ok((dir, file_name))
}

/// Install the global subscriber.
pub fn init(options: &LogOptions) -> anyhow::Result<()> {
    let (console_default, file_default) = if options.verbose {
        ("mineralpedia=debug", "mineralpedia=debug")
    } else {
        ("mineralpedia=warn", "mineralpedia=info")
    };

    let (log_dir, file_name) = split_log_path(&options.log_file)?;
    std::fs::create_dir_all(&log_dir)?;

    // Never rotates: every run appends to the same file
    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(file_name)
        .build(&log_dir)?;

    let file_layer = fmt::layer()
        .with_writer(file_appender)
        .with_ansi(false)
        .with_target(false)
        .with_filter(env_filter(file_default));

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(env_filter(console_default));

    tracing_subscriber::registry()
        .with(file_layer)
        .with(console_layer)
        .try_init()?;

    Ok(())
}
