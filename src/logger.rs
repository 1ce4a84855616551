//! stderr logger for the `log` facade

use std::fmt;
use std::io::Write;

use conquer_once::spin::OnceCell;
use log::{LevelFilter, Log, Metadata, Record};

use crate::config::LogConfig;

static LOGGER: OnceCell<StderrLogger> = OnceCell::uninit();

/// Writes `[LEVEL] target: message` lines to stderr
pub struct StderrLogger {
    level: LevelFilter,
}

impl StderrLogger {
    pub const fn new(level: LevelFilter) -> Self {
        StderrLogger { level }
    }
}

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = format_line(record.level(), record.target(), record.args());
        // Nowhere left to report a failed stderr write
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

fn format_line(level: log::Level, target: &str, args: &fmt::Arguments<'_>) -> String {
    format!("[{:>5}] {}: {}\n", level, target, args)
}

/// Install the logger once. Later calls, or a logger set by someone else,
/// leave the existing one in place.
pub fn init(config: LogConfig) {
    let logger = LOGGER.get_or_init(|| StderrLogger::new(config.level));
    if log::set_logger(logger).is_ok() {
        log::set_max_level(config.level);
    }
}

/// Install the logger with the level from `SIGTRAP_LOG`
pub fn init_from_env() {
    init(LogConfig::from_env());
}

#[cfg(test)]
mod tests {
    use super::*;
    use log::Level;

    #[test]
    fn test_line_format() {
        assert_eq!(
            format_line(Level::Info, "sigtrap::exit", &format_args!("exit {}", 0)),
            "[ INFO] sigtrap::exit: exit 0\n"
        );
        assert_eq!(
            format_line(Level::Error, "t", &format_args!("boom")),
            "[ERROR] t: boom\n"
        );
    }

    #[test]
    fn test_level_filter() {
        let logger = StderrLogger::new(LevelFilter::Warn);
        let warn = Metadata::builder().level(Level::Warn).build();
        let debug = Metadata::builder().level(Level::Debug).build();
        assert!(logger.enabled(&warn));
        assert!(!logger.enabled(&debug));
    }
}
