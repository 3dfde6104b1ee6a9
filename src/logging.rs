use std::fs;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::{LogRotation, LoggingConfig};
use crate::constants::DEFAULT_LOG_FILTER;
use crate::error::{PipelineError, Result};

/// The run's log file on disk.
///
/// Holds the writer guard of the file layer; `flush` drops it so the file is
/// complete before it is uploaded.
pub struct LogFile {
    directory: PathBuf,
    file_name: String,
    guard: Option<WorkerGuard>,
}

impl LogFile {
    /// A log file written by someone else (no writer guard)
    pub fn new<P: Into<PathBuf>, S: Into<String>>(directory: P, file_name: S) -> Self {
        Self {
            directory: directory.into(),
            file_name: file_name.into(),
            guard: None,
        }
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Flush buffered lines. Events logged afterwards only reach the console.
    pub fn flush(&mut self) {
        self.guard.take();
    }

    /// Newest file for this log; rotated files carry a date suffix
    pub fn current_path(&self) -> Option<PathBuf> {
        let entries = fs::read_dir(&self.directory).ok()?;
        entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_name().to_string_lossy().starts_with(&self.file_name))
            .filter_map(|entry| {
                let modified = entry.metadata().and_then(|m| m.modified()).ok()?;
                Some((modified, entry.path()))
            })
            .max_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)))
            .map(|(_, path)| path)
    }
}

/// Initializes the logging system with console output and a JSON log file
/// named `file_name` inside the configured directory.
pub fn init_logging(config: &LoggingConfig, file_name: &str) -> Result<LogFile> {
    fs::create_dir_all(&config.directory)?;

    let file_appender = build_appender(config, file_name, &config.directory)?;
    let (non_blocking_writer, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer()
        .json()
        .with_ansi(false)
        .with_writer(non_blocking_writer);
    let console_layer = fmt::layer().with_writer(std::io::stdout);

    let directive = config.filter.as_deref().unwrap_or(DEFAULT_LOG_FILTER);
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(directive))
        .map_err(|e| PipelineError::Config(format!("invalid log filter '{directive}': {e}")))?;

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .map_err(|e| PipelineError::Config(format!("logging already initialized: {e}")))?;

    Ok(LogFile {
        directory: config.directory.clone(),
        file_name: file_name.to_string(),
        guard: Some(guard),
    })
}

fn build_appender(config: &LoggingConfig, file_name: &str, directory: &Path) -> Result<RollingFileAppender> {
    let rotation = match config.rotation {
        LogRotation::Never => Rotation::NEVER,
        LogRotation::Daily => Rotation::DAILY,
        LogRotation::Hourly => Rotation::HOURLY,
    };
    let mut builder = RollingFileAppender::builder()
        .rotation(rotation)
        .filename_prefix(file_name);
    if let Some(max_files) = config.max_files {
        builder = builder.max_log_files(max_files);
    }
    builder
        .build(directory)
        .map_err(|e| PipelineError::Config(format!("cannot open log file in {}: {e}", directory.display())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_path_picks_matching_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("other.log"), "x").unwrap();
        fs::write(dir.path().join("coffee_logs.log"), "y").unwrap();

        let log = LogFile::new(dir.path(), "coffee_logs.log");
        assert_eq!(log.current_path(), Some(dir.path().join("coffee_logs.log")));
    }

    #[test]
    fn test_current_path_without_file() {
        let dir = tempfile::tempdir().unwrap();
        let log = LogFile::new(dir.path(), "missing.log");
        assert_eq!(log.current_path(), None);
        assert_eq!(LogFile::new("/nonexistent/dir", "a.log").current_path(), None);
    }

    #[test]
    fn test_appender_respects_rotation() {
        let dir = tempfile::tempdir().unwrap();
        let config = LoggingConfig {
            directory: dir.path().to_path_buf(),
            rotation: LogRotation::Never,
            max_files: None,
            filter: None,
        };
        let mut appender = build_appender(&config, "run.log", dir.path()).unwrap();
        std::io::Write::write_all(&mut appender, b"line\n").unwrap();
        assert!(dir.path().join("run.log").exists());
    }
}
