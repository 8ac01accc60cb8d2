use std::fs::OpenOptions;
use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::JsonFields;
use tracing_subscriber::prelude::*;

/// Installs the global JSON subscriber writing to `path`.
///
/// Stdout carries protocol frames, so logs only ever go to the file. The
/// returned guard flushes the background writer when dropped and must live
/// as long as the process.
pub fn init(path: &Path) -> anyhow::Result<WorkerGuard> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).inspect_err(|e| {
            eprintln!("Failed to create log directory {:?}: {}", parent, e);
        })?;
    }

    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .inspect_err(|e| {
            eprintln!("Failed to open log file {:?}: {}", path, e);
        })?;

    let (writer, guard) = tracing_appender::non_blocking(log_file);

    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(writer)
        .fmt_fields(JsonFields::default());

    // Use RUST_LOG if set, otherwise default to INFO
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .try_init()?;

    Ok(guard)
}
