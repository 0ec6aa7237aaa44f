use std::path::Path;

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into())
}

/// Console logging, plus a plain-text copy in `log_file` when given.
///
/// Keep the returned guard alive for the whole run; dropping it flushes the file writer.
pub fn init(log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let console = fmt::layer().with_target(false).with_filter(env_filter());

    let Some(path) = log_file else {
        tracing_subscriber::registry().with(console).try_init()?;
        return Ok(None);
    };

    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).with_context(|| format!("Failed to create log dir {:?}", dir))?;
    let name = path
        .file_name()
        .with_context(|| format!("Log path {:?} has no file name", path))?;

    let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(dir, name));
    let file = fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_filter(env_filter());

    tracing_subscriber::registry().with(console).with(file).try_init()?;
    Ok(Some(guard))
}
