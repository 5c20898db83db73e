use chrono::Utc;
use fred::prelude::{KeysInterface, ListInterface};

use crate::error::BrResult;
use crate::logs::base::{LOGS_CHANNEL, LogChannel, LogEntry, LogLevel};
use crate::redis::RedisClient;
use crate::types::TenantId;

/// Entries retained in the Redis backlog.
const BACKLOG_SIZE: i64 = 1000;

/// [`LogChannel`] stored in Redis, one channel per tenant.
///
/// Ids come from an `INCR` counter and entries are kept as JSON in a capped list, both
/// under the tenant's orchestration namespace so that tenant key flushes keep them.
#[derive(Clone)]
pub struct RedisLogChannel {
    client: RedisClient,
    id_key: String,
    backlog_key: String,
}

impl RedisLogChannel {
    pub fn new(client: RedisClient, tenant: &TenantId) -> Self {
        let channel_key = format!("{tenant}:backup_restore:channel:{LOGS_CHANNEL}");

        Self {
            client,
            id_key: format!("{channel_key}:last_id"),
            backlog_key: format!("{channel_key}:backlog"),
        }
    }
}

impl LogChannel for RedisLogChannel {
    async fn publish(&self, level: LogLevel, message: &str, error: Option<&str>) -> BrResult<u64> {
        let pool = self.client.pool();

        let id: u64 = pool.incr(&self.id_key).await?;
        let entry = LogEntry {
            id,
            timestamp: Utc::now(),
            level,
            message: message.to_owned(),
            error: error.map(str::to_owned),
        };

        pool.rpush::<i64, _, _>(&self.backlog_key, serde_json::to_string(&entry)?)
            .await?;
        pool.ltrim::<(), _>(&self.backlog_key, -BACKLOG_SIZE, -1)
            .await?;

        Ok(id)
    }

    async fn last_id(&self) -> BrResult<u64> {
        let id: Option<u64> = self.client.pool().get(&self.id_key).await?;

        Ok(id.unwrap_or(0))
    }

    async fn since(&self, cursor: u64) -> BrResult<Vec<LogEntry>> {
        let raw: Vec<String> = self.client.pool().lrange(&self.backlog_key, 0, -1).await?;

        let mut entries = Vec::with_capacity(raw.len());
        for value in raw {
            let entry: LogEntry = serde_json::from_str(&value)?;
            if entry.id > cursor {
                entries.push(entry);
            }
        }

        // Concurrent publishers may push out of id order.
        entries.sort_by_key(|entry| entry.id);

        Ok(entries)
    }
}
