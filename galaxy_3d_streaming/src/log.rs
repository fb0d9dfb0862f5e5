//! Internal logging system for the Galaxy3D streaming core
//!
//! This module provides:
//! - Customizable logger via Logger trait
//! - Severity levels (Trace, Debug, Info, Warn, Error)
//! - Colored console output by default
//! - File and line information for detailed ERROR logs
//! - `LogLatch` to report sustained pressure once instead of every frame

use colored::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::SystemTime;
use chrono::{DateTime, Local};

/// Logger trait for custom logging implementations
///
/// Implement this trait to route engine messages elsewhere (file, game console, tests).
///
/// # Example
///
/// ```no_run
/// use galaxy_3d_streaming::galaxy3d::log::{Logger, LogEntry};
///
/// struct ConsoleOverlay;
///
/// impl Logger for ConsoleOverlay {
///     fn log(&self, entry: &LogEntry) {
///         // Forward to the in-game console...
///     }
/// }
/// ```
pub trait Logger: Send + Sync {
    /// Log an entry
    fn log(&self, entry: &LogEntry);
}

/// Log entry containing all information about a log message
#[derive(Debug, Clone)]
pub struct LogEntry {
    /// Severity level (Trace, Debug, Info, Warn, Error)
    pub severity: LogSeverity,

    /// Timestamp when the log was created
    pub timestamp: SystemTime,

    /// Source component (e.g., "galaxy3d::AssetCache", "galaxy3d::TransferArena")
    pub source: String,

    /// Log message
    pub message: String,

    /// Source file (only for detailed ERROR logs)
    pub file: Option<&'static str>,

    /// Source line (only for detailed ERROR logs)
    pub line: Option<u32>,
}

/// Log severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogSeverity {
    /// Very verbose debug information (slot scans, state transitions)
    Trace,

    /// Development/debugging information
    Debug,

    /// Important informational messages (pack loaded, arena grown)
    Info,

    /// Warning messages (capacity pressure, unknown chunks)
    Warn,

    /// Error messages (failed loads, with file:line details)
    Error,
}

impl LogSeverity {
    /// Fixed-width tag used by the console logger
    pub fn label(&self) -> &'static str {
        match self {
            LogSeverity::Trace => "TRACE",
            LogSeverity::Debug => "DEBUG",
            LogSeverity::Info => "INFO ",
            LogSeverity::Warn => "WARN ",
            LogSeverity::Error => "ERROR",
        }
    }

    fn colored_label(&self) -> ColoredString {
        let label = self.label();
        match self {
            LogSeverity::Trace => label.bright_black(),
            LogSeverity::Debug => label.cyan(),
            LogSeverity::Info => label.green(),
            LogSeverity::Warn => label.yellow(),
            LogSeverity::Error => label.red().bold(),
        }
    }
}

/// Console logger with colored severity tags
///
/// `[timestamp] [SEVERITY] [source] message`, followed by ` (file:line)` when
/// the entry carries a location. Warnings and errors go to stderr so they
/// survive a host that pipes stdout away.
pub struct DefaultLogger;

impl DefaultLogger {
    /// Render an entry without colors
    pub fn format_plain(entry: &LogEntry) -> String {
        Self::format_with(entry, entry.severity.label().normal(), entry.source.normal())
    }

    fn format_with(entry: &LogEntry, severity: ColoredString, source: ColoredString) -> String {
        let datetime: DateTime<Local> = entry.timestamp.into();
        let mut line = format!(
            "[{}] [{}] [{}] {}",
            datetime.format("%Y-%m-%d %H:%M:%S%.3f"),
            severity,
            source,
            entry.message
        );
        if let (Some(file), Some(number)) = (entry.file, entry.line) {
            line.push_str(&format!(" ({}:{})", file, number));
        }
        line
    }
}

impl Logger for DefaultLogger {
    fn log(&self, entry: &LogEntry) {
        let line = Self::format_with(entry, entry.severity.colored_label(), entry.source.bright_blue());
        if entry.severity >= LogSeverity::Warn {
            eprintln!("{}", line);
        } else {
            println!("{}", line);
        }
    }
}

// ===== LOG LATCH =====

/// One-shot latch for rate-limited warnings.
///
/// `trip()` returns true only for the first call after construction or `reset()`.
/// Managers trip it when they hit a capacity limit and reset it on the next
/// successful allocation, so a sustained shortage logs a single line.
#[derive(Debug, Default)]
pub struct LogLatch {
    tripped: AtomicBool,
}

impl LogLatch {
    pub const fn new() -> Self {
        Self { tripped: AtomicBool::new(false) }
    }

    /// Trip the latch. Returns true if it was open.
    pub fn trip(&self) -> bool {
        !self.tripped.swap(true, Ordering::Relaxed)
    }

    /// Re-arm the latch
    pub fn reset(&self) {
        self.tripped.store(false, Ordering::Relaxed);
    }

    pub fn is_tripped(&self) -> bool {
        self.tripped.load(Ordering::Relaxed)
    }
}

// ===== LOGGING MACROS =====

#[doc(hidden)]
#[macro_export]
macro_rules! __engine_log {
    ($severity:ident, $source:expr, $($arg:tt)*) => {
        $crate::galaxy3d::Engine::log(
            $crate::galaxy3d::log::LogSeverity::$severity,
            $source,
            format!($($arg)*)
        )
    };
}

/// Log a TRACE message (per-slot and per-transition detail, filtered by default)
///
/// ```ignore
/// engine_trace!("galaxy3d::SlabAllocator", "Evicted slot {}", slot);
/// ```
#[macro_export]
macro_rules! engine_trace {
    ($source:expr, $($arg:tt)*) => { $crate::__engine_log!(Trace, $source, $($arg)*) };
}

#[macro_export]
macro_rules! engine_debug {
    ($source:expr, $($arg:tt)*) => { $crate::__engine_log!(Debug, $source, $($arg)*) };
}

/// Log an INFO message (packs loaded, managers created)
#[macro_export]
macro_rules! engine_info {
    ($source:expr, $($arg:tt)*) => { $crate::__engine_log!(Info, $source, $($arg)*) };
}

/// Log a WARN message (capacity pressure, skipped chunks)
#[macro_export]
macro_rules! engine_warn {
    ($source:expr, $($arg:tt)*) => { $crate::__engine_log!(Warn, $source, $($arg)*) };
}

/// Log an ERROR message with file:line information
#[macro_export]
macro_rules! engine_error {
    ($source:expr, $($arg:tt)*) => {
        $crate::galaxy3d::Engine::log_detailed(
            $crate::galaxy3d::log::LogSeverity::Error,
            $source,
            format!($($arg)*),
            file!(),
            line!()
        )
    };
}

/// Log an ERROR message and build a `BackendError` carrying the same text
///
/// # Example
///
/// ```ignore
/// let buffer = device.create_buffer(desc)
///     .map_err(|e| engine_err!("galaxy3d::Mesh", "Vertex buffer creation failed: {}", e))?;
/// ```
#[macro_export]
macro_rules! engine_err {
    ($source:expr, $($arg:tt)*) => {{
        let message = format!($($arg)*);
        $crate::galaxy3d::Engine::log_detailed(
            $crate::galaxy3d::log::LogSeverity::Error,
            $source,
            message.clone(),
            file!(),
            line!()
        );
        $crate::galaxy3d::Error::BackendError(message)
    }};
}

/// Log an ERROR message and return early with a `BackendError`
#[macro_export]
macro_rules! engine_bail {
    ($source:expr, $($arg:tt)*) => {
        return Err($crate::engine_err!($source, $($arg)*))
    };
}

#[cfg(test)]
#[path = "log_tests.rs"]
mod tests;
