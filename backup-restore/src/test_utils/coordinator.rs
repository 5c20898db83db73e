use config::Environment;
use config::shared::DrainConfig;

use crate::coordinator::{CoordinatorSettings, OperationCoordinator};
use crate::jobs::memory::MemoryJobRegistry;
use crate::logs::memory::MemoryLogChannel;
use crate::schema::memory::MemorySchemaCatalog;
use crate::store::base::CoordinationStore;
use crate::store::memory::MemoryStore;
use crate::types::TenantId;

/// Role owning the application objects in [`MemorySchemaCatalog`]s built here.
pub const TEST_OWNER: &str = "app_owner";

pub type MemoryCoordinator<S = MemoryStore> =
    OperationCoordinator<S, MemoryLogChannel, MemoryJobRegistry, MemorySchemaCatalog>;

/// In-memory backends shared by every coordinator built from them.
///
/// Coordinators built from one instance behave like processes sharing the same servers.
#[derive(Debug, Clone)]
pub struct MemoryBackends<S = MemoryStore> {
    pub store: S,
    pub channel: MemoryLogChannel,
    pub registry: MemoryJobRegistry,
    pub catalog: MemorySchemaCatalog,
}

impl MemoryBackends<MemoryStore> {
    pub fn new() -> Self {
        Self::with_store(MemoryStore::new())
    }
}

impl Default for MemoryBackends<MemoryStore> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> MemoryBackends<S>
where
    S: CoordinationStore + Clone,
{
    pub fn with_store(store: S) -> Self {
        Self {
            store,
            channel: MemoryLogChannel::new(),
            registry: MemoryJobRegistry::new(),
            catalog: MemorySchemaCatalog::new(TEST_OWNER),
        }
    }

    /// Builds a coordinator for `tenant` in production with restores disallowed.
    pub fn coordinator(&self, tenant: &str) -> MemoryCoordinator<S> {
        self.coordinator_with(tenant, test_settings())
    }

    pub fn coordinator_with(
        &self,
        tenant: &str,
        settings: CoordinatorSettings,
    ) -> MemoryCoordinator<S> {
        OperationCoordinator::new(
            TenantId::new(tenant).expect("test tenant id must not be blank"),
            self.store.clone(),
            self.channel.clone(),
            self.registry.clone(),
            self.catalog.clone(),
            settings,
        )
    }
}

pub fn test_settings() -> CoordinatorSettings {
    CoordinatorSettings {
        drain: DrainConfig::default(),
        allow_restore: false,
        environment: Environment::Prod,
    }
}
