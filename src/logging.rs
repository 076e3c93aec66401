//! Structured logging module for Tytronis
//!
//! Writes logs to <data dir>/logs/ with categories:
//! - MEMORY: Profile changes (name, style, projects, theme)
//! - HISTORY: Conversation history persistence
//! - DISPATCH: Turn state transitions and network exchanges
//! - SESSION: Session lifecycle (start, restore, reset)
//! - ERROR: Errors, including absorbed persistence failures

use chrono::{Local, Utc};
use once_cell::sync::Lazy;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Log categories for structured logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogCategory {
    Memory,
    History,
    Dispatch,
    Session,
    Error,
}

impl LogCategory {
    fn as_str(&self) -> &'static str {
        match self {
            LogCategory::Memory => "MEMORY",
            LogCategory::History => "HISTORY",
            LogCategory::Dispatch => "DISPATCH",
            LogCategory::Session => "SESSION",
            LogCategory::Error => "ERROR",
        }
    }
}

#[derive(Debug, Default)]
struct LogSink {
    dir: Option<PathBuf>,
    echo: bool,
}

/// Global sink; `None` directory means file logging is off
static LOG_SINK: Lazy<Mutex<LogSink>> = Lazy::new(|| Mutex::new(LogSink::default()));

/// Log directory under the data directory
pub fn log_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("logs")
}

fn log_file_path(dir: &Path) -> PathBuf {
    let today = Local::now().format("%Y-%m-%d").to_string();
    dir.join(format!("tytronis-{}.log", today))
}

/// Initialize the logging system - creates log directory if needed
pub fn init_logging(data_dir: &Path, echo: bool) -> Result<(), Box<dyn std::error::Error>> {
    let dir = log_dir(data_dir);

    if !dir.exists() {
        fs::create_dir_all(&dir)?;
    }

    if let Ok(mut sink) = LOG_SINK.lock() {
        sink.dir = Some(dir);
        sink.echo = echo;
    }

    log(LogCategory::Session, None, "Tytronis logging initialized");

    Ok(())
}

/// Format one log line. The session id is shortened to 8 characters.
fn format_line(category: LogCategory, session_id: Option<&str>, message: &str) -> String {
    let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    let session_context = session_id
        .map(|id| format!("session={} | ", &id[..8.min(id.len())]))
        .unwrap_or_default();

    format!(
        "[{}] [{}] {}{}\n",
        timestamp,
        category.as_str(),
        session_context,
        message
    )
}

/// Log a message with category and optional session context
pub fn log(category: LogCategory, session_id: Option<&str>, message: &str) {
    let line = format_line(category, session_id, message);

    let (dir, echo) = match LOG_SINK.lock() {
        Ok(sink) => (sink.dir.clone(), sink.echo),
        Err(_) => return,
    };

    // stdout belongs to the chat surface
    if echo {
        eprint!("{}", line);
    }

    if let Some(dir) = dir {
        if let Ok(mut file) = OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_file_path(&dir))
        {
            let _ = file.write_all(line.as_bytes());
        }
    }
}

/// Log a memory profile event (name learned, style changed, project logged)
pub fn log_memory(session_id: Option<&str>, message: &str) {
    log(LogCategory::Memory, session_id, message);
}

/// Log a history persistence event
pub fn log_history(session_id: Option<&str>, message: &str) {
    log(LogCategory::History, session_id, message);
}

/// Log a dispatcher event (state transition, request, reply)
pub fn log_dispatch(session_id: Option<&str>, message: &str) {
    log(LogCategory::Dispatch, session_id, message);
}

/// Log a session lifecycle event
pub fn log_session(session_id: Option<&str>, message: &str) {
    log(LogCategory::Session, session_id, message);
}

/// Log an error
pub fn log_error(session_id: Option<&str>, message: &str) {
    log(LogCategory::Error, session_id, message);
}

/// Clean up old log files (keep last 7 days)
pub fn cleanup_old_logs(data_dir: &Path) -> Result<usize, Box<dyn std::error::Error>> {
    let dir = log_dir(data_dir);
    let mut deleted = 0;

    if !dir.exists() {
        return Ok(0);
    }

    let cutoff = Utc::now() - chrono::Duration::days(7);

    for entry in fs::read_dir(&dir)? {
        let entry = entry?;
        let path = entry.path();

        if let Ok(metadata) = entry.metadata() {
            if let Ok(modified) = metadata.modified() {
                let modified_time: chrono::DateTime<Utc> = modified.into();
                if modified_time < cutoff && fs::remove_file(&path).is_ok() {
                    deleted += 1;
                }
            }
        }
    }

    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_line_shortens_session_id() {
        let line = format_line(
            LogCategory::Dispatch,
            Some("0123456789abcdef"),
            "state Idle -> MemoryUpdated",
        );

        assert!(line.contains("[DISPATCH] session=01234567 | state Idle -> MemoryUpdated"));
        assert!(line.ends_with('\n'));
    }

    #[test]
    fn test_format_line_without_session() {
        let line = format_line(LogCategory::Error, None, "boom");
        assert!(line.contains("[ERROR] boom"));
        assert!(!line.contains("session="));
    }

    #[test]
    fn test_cleanup_missing_dir_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let deleted = cleanup_old_logs(&dir.path().join("nowhere")).unwrap();
        assert_eq!(deleted, 0);
    }
}
