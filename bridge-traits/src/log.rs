//! Host log forwarding.
//!
//! Hosts that cannot read the process's stderr (a browser page, a mobile
//! app) register a [`LoggerSink`] and receive every filtered tracing event as
//! a [`LogEntry`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::io::Write;

use crate::error::Result;

/// Severity of a forwarded entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "TRACE",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One event recorded by the decoder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub level: LogLevel,
    pub timestamp: DateTime<Utc>,
    /// Emitting module, or `decode_engine` for engine messages.
    pub target: String,
    pub message: String,
    /// Structured fields, ordered by name.
    pub fields: BTreeMap<String, String>,
    /// Innermost span the event was recorded in, e.g. `open` or `seek_to`.
    pub span: Option<String>,
}

impl LogEntry {
    pub fn new(level: LogLevel, target: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level,
            timestamp: Utc::now(),
            target: target.into(),
            message: message.into(),
            fields: BTreeMap::new(),
            span: None,
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn with_span(mut self, span: impl Into<String>) -> Self {
        self.span = Some(span.into());
        self
    }
}

impl fmt::Display for LogEntry {
    /// `2024-01-01 12:00:00.000 WARN core_decode::store{seek_to}: message offset=4096`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S%.3f"),
            self.level,
            self.target
        )?;
        if let Some(span) = &self.span {
            write!(f, "{{{}}}", span)?;
        }
        write!(f, ": {}", self.message)?;
        for (key, value) in &self.fields {
            write!(f, " {}={}", key, value)?;
        }
        Ok(())
    }
}

/// Receives log entries on the thread that emitted them.
///
/// Implementations should hand the entry off quickly (post it to a UI
/// thread, append to a buffer) and must not call back into the decoder.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::log::{LogEntry, LogLevel, LoggerSink};
///
/// struct PageConsole;
///
/// impl LoggerSink for PageConsole {
///     fn log(&self, entry: LogEntry) -> bridge_traits::error::Result<()> {
///         post_to_page(entry.to_string());
///         Ok(())
///     }
/// }
/// ```
pub trait LoggerSink: Send + Sync {
    fn log(&self, entry: LogEntry) -> Result<()>;

    fn flush(&self) -> Result<()> {
        Ok(())
    }

    /// Entries below this level are dropped before they are built.
    fn min_level(&self) -> LogLevel {
        LogLevel::Info
    }
}

/// Writes entries to stderr, one line each.
#[derive(Debug, Clone)]
pub struct StderrLogger {
    pub min_level: LogLevel,
}

impl Default for StderrLogger {
    fn default() -> Self {
        Self {
            min_level: LogLevel::Info,
        }
    }
}

impl LoggerSink for StderrLogger {
    fn log(&self, entry: LogEntry) -> Result<()> {
        if entry.level < self.min_level {
            return Ok(());
        }
        writeln!(std::io::stderr().lock(), "{}", entry)?;
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        std::io::stderr().flush()?;
        Ok(())
    }

    fn min_level(&self) -> LogLevel {
        self.min_level
    }
}
