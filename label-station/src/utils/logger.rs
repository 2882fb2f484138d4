//! Logging Infrastructure
//!
//! Plain `tracing_subscriber::fmt` output, to stdout or to a daily-rolling
//! file when a log directory is configured and exists.

use std::path::Path;

/// Log file prefix inside the log directory
pub const LOG_FILE_PREFIX: &str = "label-station";

/// Initialize the logger (info level, stdout)
pub fn init_logger() {
    init_logger_with_file(None, None);
}

/// Initialize the logger with optional file output
///
/// Safe to call more than once; later calls are ignored.
pub fn init_logger_with_file(log_level: Option<&str>, log_dir: Option<&Path>) {
    let level = log_level.unwrap_or("info");

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level.parse().unwrap_or(tracing::Level::INFO))
        .with_file(false)
        .with_line_number(false)
        .with_thread_ids(false)
        .with_target(false);

    if let Some(dir) = log_dir
        && dir.is_dir()
    {
        let file_appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
        let _ = subscriber
            .with_ansi(false)
            .with_writer(file_appender)
            .try_init();
        return;
    }

    let _ = subscriber.try_init();
}
