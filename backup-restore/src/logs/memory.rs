use std::collections::VecDeque;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;

use crate::error::BrResult;
use crate::logs::base::{LogChannel, LogEntry, LogLevel};

/// Entries retained by default.
const DEFAULT_BACKLOG_SIZE: usize = 1000;

#[derive(Debug)]
struct Inner {
    last_id: u64,
    backlog: VecDeque<LogEntry>,
    backlog_size: usize,
}

/// In-process [`LogChannel`] keeping a bounded backlog.
#[derive(Debug, Clone)]
pub struct MemoryLogChannel {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryLogChannel {
    pub fn new() -> Self {
        Self::with_backlog_size(DEFAULT_BACKLOG_SIZE)
    }

    pub fn with_backlog_size(backlog_size: usize) -> Self {
        let inner = Inner {
            last_id: 0,
            backlog: VecDeque::new(),
            backlog_size: backlog_size.max(1),
        };

        Self {
            inner: Arc::new(Mutex::new(inner)),
        }
    }

    /// Returns every retained entry.
    pub async fn entries(&self) -> Vec<LogEntry> {
        self.inner.lock().await.backlog.iter().cloned().collect()
    }

    /// Returns the messages of every retained entry.
    pub async fn messages(&self) -> Vec<String> {
        self.inner
            .lock()
            .await
            .backlog
            .iter()
            .map(|entry| entry.message.clone())
            .collect()
    }
}

impl Default for MemoryLogChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl LogChannel for MemoryLogChannel {
    async fn publish(&self, level: LogLevel, message: &str, error: Option<&str>) -> BrResult<u64> {
        let mut inner = self.inner.lock().await;

        inner.last_id += 1;
        let entry = LogEntry {
            id: inner.last_id,
            timestamp: Utc::now(),
            level,
            message: message.to_owned(),
            error: error.map(str::to_owned),
        };
        inner.backlog.push_back(entry);
        while inner.backlog.len() > inner.backlog_size {
            inner.backlog.pop_front();
        }

        Ok(inner.last_id)
    }

    async fn last_id(&self) -> BrResult<u64> {
        Ok(self.inner.lock().await.last_id)
    }

    async fn since(&self, cursor: u64) -> BrResult<Vec<LogEntry>> {
        let inner = self.inner.lock().await;

        Ok(inner
            .backlog
            .iter()
            .filter(|entry| entry.id > cursor)
            .cloned()
            .collect())
    }
}
