use std::env;
use std::fs;
use std::path::Path;

use tracing_appender::non_blocking::{self, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriterExt};

use crate::config::{Configuration, LogFormat, LogLevel};

const DEFAULT_LOG_FILE_NAME: &str = "aicli.log";

type InitError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Appends to `path` exactly; no rotation, since `LOG_FILE` names a file.
fn build_file_writer(path: &Path) -> std::io::Result<(non_blocking::NonBlocking, WorkerGuard)> {
    let dir = path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let file_name = path
        .file_name()
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| std::ffi::OsStr::new(DEFAULT_LOG_FILE_NAME));

    fs::create_dir_all(dir)?;
    if dir.join(file_name).is_dir() {
        return Err(std::io::Error::other("log file path is a directory"));
    }
    let appender = RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(file_name.to_string_lossy().into_owned())
        .build(dir)
        .map_err(std::io::Error::other)?;
    Ok(tracing_appender::non_blocking(appender))
}

/// `RUST_LOG` wins when set; otherwise the resolved level applies.
fn env_filter(level: LogLevel) -> EnvFilter {
    match env::var(EnvFilter::DEFAULT_ENV) {
        Ok(value) if !value.trim().is_empty() => {
            EnvFilter::try_new(value).unwrap_or_else(|_| EnvFilter::new(level.filter_directive()))
        }
        _ => EnvFilter::new(level.filter_directive()),
    }
}

fn stderr_writer() -> BoxMakeWriter {
    BoxMakeWriter::new(std::io::stderr)
}

fn init_with_writer(
    format: LogFormat,
    env_filter: EnvFilter,
    writer: BoxMakeWriter,
) -> Result<(), InitError> {
    match format {
        LogFormat::Pretty => tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(writer)
            .try_init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_writer(writer)
            .try_init(),
    }
}

fn init_file_output(
    format: LogFormat,
    level: LogLevel,
    file_path: &Path,
) -> Result<Option<WorkerGuard>, InitError> {
    match build_file_writer(file_path) {
        Ok((file_writer, guard)) => {
            let writer = BoxMakeWriter::new(std::io::stderr.and(file_writer));
            init_with_writer(format, env_filter(level), writer)?;
            Ok(Some(guard))
        }
        Err(err) => {
            eprintln!(
                "aicli: failed to open LOG_FILE '{}': {}; logging to stderr only",
                file_path.display(),
                err
            );
            init_with_writer(format, env_filter(level), stderr_writer())?;
            Ok(None)
        }
    }
}

/// Installs the global subscriber for this process. Safe to call twice; the
/// second call is a no-op.
///
/// Hold the returned guard until exit so buffered file output is flushed.
pub fn init(config: &Configuration) -> Option<WorkerGuard> {
    let level = config.effective_log_level();
    let format = config.logging.format;

    let init_result = match &config.logging.file {
        Some(path) => init_file_output(format, level, path),
        None => init_with_writer(format, env_filter(level), stderr_writer()).map(|()| None),
    };

    init_result.ok().flatten()
}
