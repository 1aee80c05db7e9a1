//! Logging for the Flare renderer
//!
//! A single process-wide sink receives every entry produced by the
//! `engine_*` macros. The sink is swappable at runtime through
//! `Engine::set_logger` / `Engine::reset_logger`.

use chrono::{DateTime, Local};
use colored::*;
use std::time::SystemTime;

/// Logger trait for custom sinks (files, in-game consoles, test capture)
///
/// # Example
///
/// ```no_run
/// use flare_render::flare::log::{Logger, LogEntry};
///
/// struct StderrLogger;
///
/// impl Logger for StderrLogger {
///     fn log(&self, entry: &LogEntry) {
///         eprintln!("{}", entry.plain_line());
///     }
/// }
/// ```
pub trait Logger: Send + Sync {
    /// Receive one entry
    fn log(&self, entry: &LogEntry);
}

/// One log record
#[derive(Debug, Clone)]
pub struct LogEntry {
    /// Severity level
    pub severity: LogSeverity,

    /// Creation time
    pub timestamp: SystemTime,

    /// Source module, e.g. "flare::surface" or "flare::vulkan::buffer"
    pub source: String,

    /// Message text
    pub message: String,

    /// Source file (only set by `engine_error!` and `engine_fatal!`)
    pub file: Option<&'static str>,

    /// Source line (only set by `engine_error!` and `engine_fatal!`)
    pub line: Option<u32>,
}

impl LogEntry {
    /// Uncolored single-line rendering: `[time] [SEV] [source] message (file:line)`
    pub fn plain_line(&self) -> String {
        let datetime: DateTime<Local> = self.timestamp.into();
        let mut line = format!(
            "[{}] [{}] [{}] {}",
            datetime.format("%Y-%m-%d %H:%M:%S%.3f"),
            self.severity.label(),
            self.source,
            self.message
        );
        if let (Some(file), Some(at)) = (self.file, self.line) {
            line.push_str(&format!(" ({}:{})", file, at));
        }
        line
    }
}

/// Log severity levels, ordered from most to least verbose
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogSeverity {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogSeverity {
    /// Fixed-width label used in rendered lines
    pub fn label(&self) -> &'static str {
        match self {
            LogSeverity::Trace => "TRACE",
            LogSeverity::Debug => "DEBUG",
            LogSeverity::Info => "INFO ",
            LogSeverity::Warn => "WARN ",
            LogSeverity::Error => "ERROR",
        }
    }
}

/// Colored console logger
///
/// Trace/Debug/Info go to stdout, Warn/Error to stderr. Entries below
/// `min_severity` are dropped.
pub struct DefaultLogger {
    pub min_severity: LogSeverity,
}

impl Default for DefaultLogger {
    fn default() -> Self {
        Self {
            min_severity: if cfg!(debug_assertions) {
                LogSeverity::Debug
            } else {
                LogSeverity::Info
            },
        }
    }
}

impl Logger for DefaultLogger {
    fn log(&self, entry: &LogEntry) {
        if entry.severity < self.min_severity {
            return;
        }

        let datetime: DateTime<Local> = entry.timestamp.into();
        let timestamp = datetime.format("%Y-%m-%d %H:%M:%S%.3f").to_string();

        let severity = match entry.severity {
            LogSeverity::Trace => entry.severity.label().bright_black(),
            LogSeverity::Debug => entry.severity.label().cyan(),
            LogSeverity::Info => entry.severity.label().green(),
            LogSeverity::Warn => entry.severity.label().yellow(),
            LogSeverity::Error => entry.severity.label().red().bold(),
        };
        let source = entry.source.bright_blue();

        let location = match (entry.file, entry.line) {
            (Some(file), Some(line)) => format!(" ({}:{})", file, line),
            _ => String::new(),
        };

        if entry.severity >= LogSeverity::Warn {
            eprintln!("[{}] [{}] [{}] {}{}", timestamp, severity, source, entry.message, location);
        } else {
            println!("[{}] [{}] [{}] {}{}", timestamp, severity, source, entry.message, location);
        }
    }
}

// ===== LOGGING MACROS =====

/// Log a TRACE message
#[macro_export]
macro_rules! engine_trace {
    ($source:expr, $($arg:tt)*) => {
        $crate::flare::Engine::log(
            $crate::flare::log::LogSeverity::Trace,
            $source,
            format!($($arg)*)
        )
    };
}

/// Log a DEBUG message
///
/// ```no_run
/// # use flare_render::engine_debug;
/// engine_debug!("flare::renderer", "Drained {} commands", 12);
/// ```
#[macro_export]
macro_rules! engine_debug {
    ($source:expr, $($arg:tt)*) => {
        $crate::flare::Engine::log(
            $crate::flare::log::LogSeverity::Debug,
            $source,
            format!($($arg)*)
        )
    };
}

/// Log an INFO message
#[macro_export]
macro_rules! engine_info {
    ($source:expr, $($arg:tt)*) => {
        $crate::flare::Engine::log(
            $crate::flare::log::LogSeverity::Info,
            $source,
            format!($($arg)*)
        )
    };
}

/// Log a WARN message
#[macro_export]
macro_rules! engine_warn {
    ($source:expr, $($arg:tt)*) => {
        $crate::flare::Engine::log(
            $crate::flare::log::LogSeverity::Warn,
            $source,
            format!($($arg)*)
        )
    };
}

/// Log an ERROR message with file:line information
#[macro_export]
macro_rules! engine_error {
    ($source:expr, $($arg:tt)*) => {
        $crate::flare::Engine::log_detailed(
            $crate::flare::log::LogSeverity::Error,
            $source,
            format!($($arg)*),
            file!(),
            line!()
        )
    };
}

#[cfg(test)]
#[path = "log_tests.rs"]
mod tests;
