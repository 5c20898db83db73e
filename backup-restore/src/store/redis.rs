use fred::prelude::KeysInterface;
use fred::types::SetOptions;

use crate::error::BrResult;
use crate::redis::{RedisClient, escape_glob};
use crate::store::base::CoordinationStore;

/// [`CoordinationStore`] backed by a shared Redis server.
#[derive(Clone)]
pub struct RedisStore {
    client: RedisClient,
}

impl RedisStore {
    pub fn new(client: RedisClient) -> Self {
        Self { client }
    }
}

impl CoordinationStore for RedisStore {
    async fn get(&self, key: &str) -> BrResult<Option<String>> {
        let value: Option<String> = self.client.pool().get(key).await?;

        Ok(value)
    }

    async fn set(&self, key: &str, value: &str) -> BrResult<()> {
        self.client
            .pool()
            .set::<(), _, _>(key, value, None, None, false)
            .await?;

        Ok(())
    }

    async fn set_if_absent(&self, key: &str, value: &str) -> BrResult<bool> {
        // `SET NX` replies `OK` when written and nil otherwise.
        let reply: Option<String> = self
            .client
            .pool()
            .set(key, value, None, Some(SetOptions::NX), false)
            .await?;

        Ok(reply.is_some())
    }

    async fn delete(&self, key: &str) -> BrResult<bool> {
        let deleted: i64 = self.client.pool().del(key).await?;

        Ok(deleted > 0)
    }

    async fn keys(&self, prefix: &str) -> BrResult<Vec<String>> {
        let pattern = format!("{}*", escape_glob(prefix));

        self.client.scan_keys(&pattern).await
    }
}
