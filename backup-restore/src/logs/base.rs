use std::fmt;
use std::future::Future;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::BrResult;

/// Name of the channel the admin dashboard subscribes to.
pub const LOGS_CHANNEL: &str = "/admin/backups/logs";

/// Severity of a log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Info => f.write_str("INFO"),
            LogLevel::Warn => f.write_str("WARN"),
            LogLevel::Error => f.write_str("ERROR"),
        }
    }
}

/// Single line published on the log channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Strictly increasing id assigned by the channel.
    pub id: u64,
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S"),
            self.level,
            self.message
        )?;

        if let Some(error) = &self.error {
            write!(f, " ({error})")?;
        }

        Ok(())
    }
}

/// Append-only channel supporting replay from a cursor.
///
/// Ids start at `1`; a cursor of `0` replays the whole retained backlog.
pub trait LogChannel {
    /// Appends an entry and returns its id.
    fn publish(
        &self,
        level: LogLevel,
        message: &str,
        error: Option<&str>,
    ) -> impl Future<Output = BrResult<u64>> + Send;

    /// Returns the id of the last published entry, `0` when empty.
    fn last_id(&self) -> impl Future<Output = BrResult<u64>> + Send;

    /// Returns every retained entry with an id greater than `cursor`, oldest first.
    fn since(&self, cursor: u64) -> impl Future<Output = BrResult<Vec<LogEntry>>> + Send;
}
