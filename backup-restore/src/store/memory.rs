use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::error::BrResult;
use crate::store::base::CoordinationStore;

/// In-process [`CoordinationStore`].
///
/// Clones share the same data, so several coordinators built from clones of one store
/// behave like separate processes sharing a server.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<BTreeMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of every key and value.
    pub async fn snapshot(&self) -> BTreeMap<String, String> {
        self.inner.lock().await.clone()
    }
}

impl CoordinationStore for MemoryStore {
    async fn get(&self, key: &str) -> BrResult<Option<String>> {
        let inner = self.inner.lock().await;

        Ok(inner.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> BrResult<()> {
        let mut inner = self.inner.lock().await;
        inner.insert(key.to_owned(), value.to_owned());

        Ok(())
    }

    async fn set_if_absent(&self, key: &str, value: &str) -> BrResult<bool> {
        let mut inner = self.inner.lock().await;
        if inner.contains_key(key) {
            return Ok(false);
        }

        inner.insert(key.to_owned(), value.to_owned());

        Ok(true)
    }

    async fn delete(&self, key: &str) -> BrResult<bool> {
        let mut inner = self.inner.lock().await;

        Ok(inner.remove(key).is_some())
    }

    async fn keys(&self, prefix: &str) -> BrResult<Vec<String>> {
        let inner = self.inner.lock().await;

        Ok(inner
            .range(prefix.to_owned()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.clone())
            .collect())
    }
}
