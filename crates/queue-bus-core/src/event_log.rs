//! Append-only structured event sink.
//!
//! Operations report informational and error events here; a logging failure
//! must never fail the originating operation, so implementations swallow
//! their own errors (reporting them through `tracing` only).

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::warn;

#[cfg(test)]
#[path = "event_log_tests.rs"]
mod tests;

/// Severity attached to logged events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventLevel {
    Information,
    Warning,
    Error,
}

impl fmt::Display for EventLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Information => "INFORMATION",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
        };
        write!(f, "{}", name)
    }
}

/// Append-only event sink consumed by the engine and the connection context
#[async_trait]
pub trait EventLog: Send + Sync {
    /// Record one event; fire-and-forget from the caller's perspective
    async fn log(
        &self,
        level: EventLevel,
        component: &str,
        method: &str,
        message: &str,
        detail: Option<&str>,
        token: &CancellationToken,
    );
}

// ============================================================================
// File Event Log
// ============================================================================

/// Configuration for the file-backed event log
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EventLogConfig {
    /// Directory holding the daily log files; a temp-dir fallback applies
    pub directory: Option<PathBuf>,
    /// Append the detail section (error debug output) to written lines
    pub include_detail: bool,
}

impl EventLogConfig {
    /// Directory events are written to, falling back under the temp dir
    pub fn resolve_directory(&self) -> PathBuf {
        match &self.directory {
            Some(directory) if !directory.as_os_str().is_empty() => directory.clone(),
            _ => std::env::temp_dir().join("queue-bus-logs"),
        }
    }
}

/// Event log appending one line per event to a daily file
///
/// Writes are serialized by a mutex so concurrent operations never interleave
/// partial lines. The target file is `<dir>/<yyyymmdd>queue-bus.log`.
pub struct FileEventLog {
    config: EventLogConfig,
    write_guard: Mutex<()>,
}

impl FileEventLog {
    pub fn new(config: EventLogConfig) -> Self {
        Self {
            config,
            write_guard: Mutex::new(()),
        }
    }

    fn file_path(&self, directory: &Path) -> PathBuf {
        let day = Utc::now().format("%Y%m%d");
        directory.join(format!("{}queue-bus.log", day))
    }

    fn format_line(
        &self,
        level: EventLevel,
        component: &str,
        method: &str,
        message: &str,
        detail: Option<&str>,
    ) -> String {
        let component = if component.trim().is_empty() {
            "unknown-component"
        } else {
            component.trim()
        };
        let method = if method.trim().is_empty() {
            "unknown-method"
        } else {
            method.trim()
        };

        let mut line = format!(
            "{} {} {}::{} {}",
            Utc::now().to_rfc3339(),
            level,
            component,
            method,
            message
        );

        if self.config.include_detail {
            if let Some(detail) = detail {
                if !detail.trim().is_empty() {
                    line.push_str(" | detail: ");
                    line.push_str(detail.trim());
                }
            }
        }

        line.push('\n');
        line
    }

    async fn append(&self, line: &str) -> std::io::Result<()> {
        let directory = self.config.resolve_directory();
        tokio::fs::create_dir_all(&directory).await?;

        let path = self.file_path(&directory);
        let _serialized = self.write_guard.lock().await;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await
    }
}

#[async_trait]
impl EventLog for FileEventLog {
    async fn log(
        &self,
        level: EventLevel,
        component: &str,
        method: &str,
        message: &str,
        detail: Option<&str>,
        token: &CancellationToken,
    ) {
        if message.trim().is_empty() || token.is_cancelled() {
            return;
        }

        let line = self.format_line(level, component, method, message, detail);
        if let Err(error) = self.append(&line).await {
            warn!(error = %error, "could not append to the event log file");
        }
    }
}

// ============================================================================
// Noop Event Log
// ============================================================================

/// Event log that discards everything; useful for wiring tests
#[derive(Debug, Default)]
pub struct NoopEventLog;

#[async_trait]
impl EventLog for NoopEventLog {
    async fn log(
        &self,
        _level: EventLevel,
        _component: &str,
        _method: &str,
        _message: &str,
        _detail: Option<&str>,
        _token: &CancellationToken,
    ) {
    }
}
