//! Forwarding of the crate's `log` records to a host-provided logger.

use std::sync::{Arc, OnceLock};

/// Trait representing a logger that can log messages at various levels.
///
/// Implement it on the host side (an app shell, a script runtime, a test
/// harness) to receive the bridge's log records.
///
/// # Examples
///
/// ```rust
/// use websql_core::logger::{LogLevel, Logger};
///
/// struct StderrLogger;
///
/// impl Logger for StderrLogger {
///     fn log(&self, level: LogLevel, message: String) {
///         eprintln!("[{level:?}] {message}");
///     }
/// }
/// ```
pub trait Logger: Sync + Send {
    /// Logs a message at the specified log level.
    ///
    /// # Arguments
    ///
    /// * `level` - The severity level of the log message.
    /// * `message` - The log message to be recorded.
    fn log(&self, level: LogLevel, message: String);
}

/// Enumeration of possible log levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Designates very low priority, often extremely detailed messages.
    Trace,
    /// Designates lower priority debugging information.
    Debug,
    /// Designates informational messages that highlight the progress of the application.
    Info,
    /// Designates potentially harmful situations.
    Warn,
    /// Designates error events that might still allow the application to continue running.
    Error,
}

/// Forwards `log` records to the host-provided [`Logger`].
struct HostLogger;

impl log::Log for HostLogger {
    fn enabled(&self, _metadata: &log::Metadata) -> bool {
        true
    }

    fn log(&self, record: &log::Record) {
        if !should_forward(record.level(), record.module_path()) {
            return;
        }

        if let Some(logger) = LOGGER_INSTANCE.get() {
            logger.log(log_level(record.level()), format!("{}", record.args()));
        } else {
            eprintln!("Logger not set: {}", record.args());
        }
    }

    fn flush(&self) {}
}

/// Debug and trace records are only forwarded when they come from this
/// crate's own modules; other levels always are.
fn should_forward(level: log::Level, module_path: Option<&str>) -> bool {
    let is_debug_or_trace = matches!(level, log::Level::Debug | log::Level::Trace);
    let is_from_bridge = module_path.is_some_and(|path| path.starts_with("websql"));
    !is_debug_or_trace || is_from_bridge
}

const fn log_level(level: log::Level) -> LogLevel {
    match level {
        log::Level::Error => LogLevel::Error,
        log::Level::Warn => LogLevel::Warn,
        log::Level::Info => LogLevel::Info,
        log::Level::Debug => LogLevel::Debug,
        log::Level::Trace => LogLevel::Trace,
    }
}

static LOGGER_INSTANCE: OnceLock<Arc<dyn Logger>> = OnceLock::new();

/// Sets the global logger.
///
/// Call once, before opening any database. Later calls are ignored apart
/// from a message on stderr.
pub fn set_logger(logger: Arc<dyn Logger>) {
    if LOGGER_INSTANCE.set(logger).is_err() {
        eprintln!("Logger already set");
        return;
    }

    if let Err(e) = init_logger() {
        eprintln!("Failed to set logger: {e}");
    }
}

/// Installs [`HostLogger`] as the `log` backend.
///
/// # Errors
///
/// Returns a `log::SetLoggerError` if another backend is already installed.
fn init_logger() -> Result<(), log::SetLoggerError> {
    static LOGGER: HostLogger = HostLogger;
    log::set_logger(&LOGGER)?;
    log::set_max_level(log::LevelFilter::Trace);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_foreign_debug_records_are_dropped() {
        assert!(!should_forward(log::Level::Debug, Some("tokio::runtime")));
        assert!(!should_forward(log::Level::Trace, None));
    }

    #[test]
    fn test_own_debug_records_are_forwarded() {
        assert!(should_forward(log::Level::Debug, Some("websql_core::native")));
        assert!(should_forward(log::Level::Trace, Some("websql_db::connection")));
    }

    #[test]
    fn test_warnings_are_always_forwarded() {
        assert!(should_forward(log::Level::Warn, Some("rusqlite")));
        assert!(should_forward(log::Level::Error, None));
        assert_eq!(log_level(log::Level::Info), LogLevel::Info);
    }
}
