use std::fs::{self, File};
use std::io;
use std::path::Path;
use std::sync::OnceLock;

use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

use crate::config::LoggingConfig;
use crate::Result;

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Maps a configured level name to a tracing level. `WARNING` and
/// `CRITICAL` are accepted as aliases for `WARN` and `ERROR`.
pub fn parse_level(level: &str) -> Option<Level> {
    match level.trim().to_uppercase().as_str() {
        "TRACE" => Some(Level::TRACE),
        "DEBUG" => Some(Level::DEBUG),
        "INFO" => Some(Level::INFO),
        "WARN" | "WARNING" => Some(Level::WARN),
        "ERROR" | "CRITICAL" => Some(Level::ERROR),
        _ => None,
    }
}

fn open_log_file(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::OpenOptions::new().create(true).append(true).open(path)
}

/// Installs the global subscriber: stderr output, plus a plain-text file
/// when `file_path` is set. A log file that cannot be opened is reported
/// and logging continues on stderr only. Calling it again after a
/// subscriber exists is a no-op.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let mut file_error = None;
    let file = config.file_path.as_deref().and_then(|path| match open_log_file(path) {
        Ok(file) => Some(file),
        Err(e) => {
            file_error = Some(format!("Cannot open log file {}: {}", path.display(), e));
            None
        }
    });

    if tracing::dispatcher::has_been_set() {
        if let Some(issue) = file_error {
            tracing::warn!("{}, logging to stderr only", issue);
        }
        return Ok(());
    }

    let level = parse_level(&config.level);
    let filter = LevelFilter::from_level(level.unwrap_or(Level::INFO));

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(filter);

    let file_layer = file.map(|file| {
        let (writer, guard) = tracing_appender::non_blocking(file);
        let _ = LOG_GUARD.set(guard);
        tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(writer)
            .with_filter(filter)
    });

    // Another thread may have won the race since the check above.
    let _ = tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .try_init();

    if level.is_none() {
        tracing::warn!("Unknown log level '{}', falling back to INFO", config.level);
    }
    if let Some(issue) = file_error {
        tracing::warn!("{}, logging to stderr only", issue);
    }
    tracing::info!("Logging configured successfully");
    Ok(())
}
