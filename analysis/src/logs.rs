//! Pipeline progress log.
//!
//! Entries are printed to stderr and broadcast to any subscriber, so a
//! caller embedding the pipeline (or a test) can observe what each stage
//! reported: row counts, dropped locations, unmatched boundaries.

use once_cell::sync::Lazy;
use serde::Serialize;
use tokio::sync::broadcast;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Success,
    Warning,
}

/// One progress line from a pipeline stage
#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
    /// Nesting under the previous entry, e.g. one dropped code per line
    pub indent: u8,
}

impl LogEntry {
    fn new(level: LogLevel, message: impl Into<String>, indent: u8) -> Self {
        Self { level, message: message.into(), indent }
    }
}

/// Process-wide broadcaster used by every stage
pub static LOG_BROADCASTER: Lazy<LogBroadcaster> = Lazy::new(LogBroadcaster::new);

pub struct LogBroadcaster {
    sender: broadcast::Sender<LogEntry>,
}

impl LogBroadcaster {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(1024);
        Self { sender }
    }

    /// Print an entry to stderr and send it to all subscribers
    pub fn log(&self, entry: LogEntry) {
        let marker = match entry.level {
            LogLevel::Info => "   ",
            LogLevel::Success => "   ✓",
            LogLevel::Warning => "   ⚠️",
        };
        eprintln!("{}{} {}", "   ".repeat(entry.indent as usize), marker, entry.message);

        // No receivers is fine
        let _ = self.sender.send(entry);
    }

    /// Only entries logged after this call are delivered
    pub fn subscribe(&self) -> broadcast::Receiver<LogEntry> {
        self.sender.subscribe()
    }
}

impl Default for LogBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything currently buffered in a receiver.
pub fn drain(receiver: &mut broadcast::Receiver<LogEntry>) -> Vec<LogEntry> {
    let mut entries = Vec::new();
    loop {
        match receiver.try_recv() {
            Ok(entry) => entries.push(entry),
            Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
            Err(_) => break,
        }
    }
    entries
}

pub fn log_info(msg: impl Into<String>) {
    LOG_BROADCASTER.log(LogEntry::new(LogLevel::Info, msg, 0));
}

pub fn log_success(msg: impl Into<String>) {
    LOG_BROADCASTER.log(LogEntry::new(LogLevel::Success, msg, 0));
}

pub fn log_warning(msg: impl Into<String>) {
    LOG_BROADCASTER.log(LogEntry::new(LogLevel::Warning, msg, 0));
}

pub fn log_info_indent(msg: impl Into<String>, indent: u8) {
    LOG_BROADCASTER.log(LogEntry::new(LogLevel::Info, msg, indent));
}

pub fn log_warning_indent(msg: impl Into<String>, indent: u8) {
    LOG_BROADCASTER.log(LogEntry::new(LogLevel::Warning, msg, indent));
}
