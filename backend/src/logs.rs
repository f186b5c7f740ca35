//! Run log broadcasting.
//!
//! Every pipeline stage reports through the `log_*` functions below. Entries
//! are echoed to stderr, keeping stdout for command output, and broadcast to
//! subscribers, which the CLI uses to persist the run log as JSON lines.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Capacity of the broadcast buffer. A subscriber that falls further behind
/// loses the oldest entries.
const LOG_CAPACITY: usize = 4096;

/// Width of one nesting step on the console.
const INDENT: &str = "   ";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

impl LogLevel {
    fn marker(self) -> &'static str {
        match self {
            LogLevel::Info => "",
            LogLevel::Success => "✓ ",
            LogLevel::Warning => "⚠️ ",
            LogLevel::Error => "❌ ",
        }
    }
}

/// One line of the run log.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
    /// Nesting depth under the previous top-level entry
    #[serde(default)]
    pub indent: u8,
}

impl LogEntry {
    pub fn new(level: LogLevel, message: impl Into<String>, indent: u8) -> Self {
        Self { level, message: message.into(), indent }
    }

    /// Console rendering, one indent step deeper than the CLI's own lines.
    pub fn render(&self) -> String {
        format!(
            "{}{}{}",
            INDENT.repeat(self.indent as usize + 1),
            self.level.marker(),
            self.message
        )
    }
}

pub static LOG_BROADCASTER: Lazy<LogBroadcaster> = Lazy::new(LogBroadcaster::new);

pub struct LogBroadcaster {
    sender: broadcast::Sender<LogEntry>,
}

impl LogBroadcaster {
    fn new() -> Self {
        let (sender, _) = broadcast::channel(LOG_CAPACITY);
        Self { sender }
    }

    /// Echo an entry to stderr and hand it to every subscriber.
    pub fn log(&self, entry: LogEntry) {
        eprintln!("{}", entry.render());
        // Nobody listening is the common case
        let _ = self.sender.send(entry);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LogEntry> {
        self.sender.subscribe()
    }
}

/// Subscribe to the global broadcaster. Only entries logged afterwards are seen.
pub fn subscribe() -> broadcast::Receiver<LogEntry> {
    LOG_BROADCASTER.subscribe()
}

/// Collect everything currently buffered for `rx`.
///
/// Returns the entries and how many were lost to lag.
pub fn drain(rx: &mut broadcast::Receiver<LogEntry>) -> (Vec<LogEntry>, u64) {
    let mut entries = Vec::new();
    let mut lost = 0;
    loop {
        match rx.try_recv() {
            Ok(entry) => entries.push(entry),
            Err(broadcast::error::TryRecvError::Lagged(n)) => lost += n,
            Err(_) => break,
        }
    }
    (entries, lost)
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

pub fn log_error(msg: impl Into<String>) {
    LOG_BROADCASTER.log(LogEntry::new(LogLevel::Error, msg, 0));
}

/// Summary detail lines.
pub fn log_info_indent(msg: impl Into<String>, indent: u8) {
    LOG_BROADCASTER.log(LogEntry::new(LogLevel::Info, msg, indent));
}

pub fn log_warning_indent(msg: impl Into<String>, indent: u8) {
    LOG_BROADCASTER.log(LogEntry::new(LogLevel::Warning, msg, indent));
}
