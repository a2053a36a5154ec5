//! provides logging helpers

use std::path::Path;

use anyhow::Context;
use anyhow::Result;
use tracing_appender::non_blocking::NonBlocking;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::RollingFileAppender;
use tracing_appender::rolling::Rotation;
use tracing_subscriber::fmt::layer;
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry;
use utils::logging::env_filter;
use utils::logging::get_fmt_layer;

/// Rotated log files kept next to the current one.
const MAX_LOG_FILES: usize = 3;

/// initiate the global tracing subscriber
///
/// Logs go to stderr and, when `log_file` is given, to a daily rolling file as well.
/// The returned guard flushes the file writer on drop and must outlive logging.
pub fn init(verbose: bool, log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let stderr_layer = get_fmt_layer().with_filter(env_filter(verbose));

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let (writer, guard) = rolling_writer(path)?;
            let file_layer = layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_filter(env_filter(verbose));
            (Some(file_layer), Some(guard))
        }
        None => (None, None),
    };

    registry()
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .context("failed to install the global tracing subscriber")?;
    Ok(guard)
}

fn rolling_writer(path: &Path) -> Result<(NonBlocking, WorkerGuard)> {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .with_context(|| format!("log file {} has no valid file name", path.display()))?;
    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(file_name)
        .max_log_files(MAX_LOG_FILES)
        .build(directory)
        .with_context(|| format!("failed to create rolling log file in {}", directory.display()))?;

    Ok(tracing_appender::non_blocking(appender))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rolling_writer_needs_a_file_name() {
        assert!(rolling_writer(Path::new("/")).is_err());
    }

    #[test]
    fn rolling_writer_creates_files_in_parent_directory() {
        let dir = tempfile::tempdir().expect("tempdir");

        let (_writer, guard) = rolling_writer(&dir.path().join("extension.log")).expect("writer");
        drop(guard);

        let created = std::fs::read_dir(dir.path())
            .expect("read dir")
            .filter_map(|entry| entry.ok())
            .any(|entry| entry.file_name().to_string_lossy().starts_with("extension.log"));
        assert!(created);
    }
}
