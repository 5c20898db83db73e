use std::sync::Arc;

use crate::bail;
use crate::error::{BrResult, ErrorKind};
use crate::store::base::CoordinationStore;

/// What a faulty call does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultType {
    Error,
    Panic,
}

/// Faults injected per store method.
///
/// With `key_suffix` set, only calls on keys ending with it are affected.
#[derive(Debug, Clone, Default)]
pub struct FaultConfig {
    pub get: Option<FaultType>,
    pub set: Option<FaultType>,
    pub set_if_absent: Option<FaultType>,
    pub delete: Option<FaultType>,
    pub keys: Option<FaultType>,
    pub key_suffix: Option<String>,
}

/// [`CoordinationStore`] wrapper that fails chosen calls.
#[derive(Debug, Clone)]
pub struct FaultInjectingStore<S> {
    inner: S,
    config: Arc<FaultConfig>,
}

impl<S> FaultInjectingStore<S> {
    pub fn wrap(inner: S, config: FaultConfig) -> Self {
        Self {
            inner,
            config: Arc::new(config),
        }
    }

    pub fn get_inner(&self) -> &S {
        &self.inner
    }

    fn trigger(&self, fault: Option<FaultType>, method: &str, key: &str) -> BrResult<()> {
        let Some(fault) = fault else {
            return Ok(());
        };

        if let Some(suffix) = &self.config.key_suffix
            && !key.ends_with(suffix.as_str())
        {
            return Ok(());
        }

        match fault {
            FaultType::Error => bail!(
                ErrorKind::CoordinationStoreFailed,
                "Injected store failure",
                format!("{method} `{key}`")
            ),
            FaultType::Panic => panic!("injected store panic in {method} `{key}`"),
        }
    }
}

impl<S> CoordinationStore for FaultInjectingStore<S>
where
    S: CoordinationStore + Sync,
{
    async fn get(&self, key: &str) -> BrResult<Option<String>> {
        self.trigger(self.config.get, "get", key)?;
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> BrResult<()> {
        self.trigger(self.config.set, "set", key)?;
        self.inner.set(key, value).await
    }

    async fn set_if_absent(&self, key: &str, value: &str) -> BrResult<bool> {
        self.trigger(self.config.set_if_absent, "set_if_absent", key)?;
        self.inner.set_if_absent(key, value).await
    }

    async fn delete(&self, key: &str) -> BrResult<bool> {
        self.trigger(self.config.delete, "delete", key)?;
        self.inner.delete(key).await
    }

    async fn keys(&self, prefix: &str) -> BrResult<Vec<String>> {
        self.trigger(self.config.keys, "keys", prefix)?;
        self.inner.keys(prefix).await
    }
}
