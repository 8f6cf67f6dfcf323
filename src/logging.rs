/*!
 * Stderr logger for the `log` facade.
 *
 * Library code only uses the `log` macros; binaries embedding the relay call
 * [`init`] once to get coloured, timestamped output.
 */

use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError};
use std::io::Write;

use crate::app_config::LogLevel;

/// Logger writing one coloured line per record to stderr
pub struct StderrLogger {
    level: LevelFilter,
}

impl StderrLogger {
    pub fn new(level: LevelFilter) -> Self {
        StderrLogger { level }
    }

    // ANSI colour and tag per level
    fn style_for_level(level: Level) -> (&'static str, &'static str) {
        match level {
            Level::Error => ("\x1B[1;31m", "ERROR"),
            Level::Warn => ("\x1B[1;33m", "WARN "),
            Level::Info => ("\x1B[1;32m", "INFO "),
            Level::Debug => ("\x1B[1;36m", "DEBUG"),
            Level::Trace => ("\x1B[1;35m", "TRACE"),
        }
    }

    /// Render a record without colour codes
    pub fn format_plain(record: &Record) -> String {
        let (_, tag) = Self::style_for_level(record.level());
        format!("{} {} {}", tag, record.target(), record.args())
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

        let now = chrono::Local::now().format("%H:%M:%S.%3f");
        let (colour, _) = Self::style_for_level(record.level());
        let mut stderr = std::io::stderr();
        let _ = writeln!(stderr, "{}{} {}\x1B[0m", colour, now, Self::format_plain(record));
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

/// Install the stderr logger as the global logger
pub fn init(level: LogLevel) -> Result<(), SetLoggerError> {
    let filter: LevelFilter = level.into();
    log::set_boxed_logger(Box::new(StderrLogger::new(filter)))?;
    log::set_max_level(filter);
    Ok(())
}

/// Change the level of an already installed logger
pub fn set_level(level: LogLevel) {
    log::set_max_level(level.into());
}
