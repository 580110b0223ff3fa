use std::fs::{self, File};
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Registry};

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Process-wide console logging for everything outside a file type run.
pub fn init_console() {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr)
        .finish()
        .try_init()
        .ok();
}

/// Console plus JSON file logging for one file type. The file lives at
/// `log_file`; its folders are created.
pub fn file_type_subscriber(
    log_file: &Path,
    json_console: bool,
) -> Result<impl tracing::Subscriber + Send + Sync> {
    if let Some(parent) = log_file.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create log folder {}", parent.display()))?;
    }
    let file = File::create(log_file)
        .with_context(|| format!("failed to create log file {}", log_file.display()))?;

    Ok(Registry::default()
        .with(env_filter())
        .with(json_console.then(|| fmt::layer().json().with_writer(std::io::stderr)))
        .with((!json_console).then(|| fmt::layer().with_writer(std::io::stderr)))
        .with(
            fmt::layer()
                .json()
                .with_ansi(false)
                .with_writer(Mutex::new(file)),
        ))
}
