use tracing::{debug, info};

use crate::bail;
use crate::error::{BrResult, ErrorKind};
use crate::store::base::CoordinationStore;
use crate::types::{Operation, TenantId};

/// Namespace, inside the tenant's key space, of every key owned by the orchestration.
const NAMESPACE: &str = "backup_restore";

/// Key holding the serialized [`Operation`] while an operation runs.
pub const OPERATION_RUNNING_KEY: &str = "operation.running";

/// Key present while a cancellation is pending.
pub const SHUTDOWN_REQUESTED_KEY: &str = "operation.shutdown_requested";

/// Key holding the reason background processing is paused.
pub const PAUSE_REASON_KEY: &str = "pause.reason";

/// Key present while the application is read-only.
pub const READONLY_KEY: &str = "readonly";

/// Key holding the log channel id captured when the last operation started.
pub const LOGS_CURSOR_KEY: &str = "logs.cursor";

/// Value written for boolean flags.
const FLAG_VALUE: &str = "1";

/// Tenant-scoped view over a [`CoordinationStore`].
///
/// Every flag used by the orchestration is a field of this client. Keys have the form
/// `{tenant}:backup_restore:{name}`; all other keys under `{tenant}:` belong to the
/// application.
#[derive(Debug, Clone)]
pub struct TenantCoordination<S> {
    store: S,
    tenant: TenantId,
}

impl<S> TenantCoordination<S>
where
    S: CoordinationStore,
{
    pub fn new(store: S, tenant: TenantId) -> Self {
        Self { store, tenant }
    }

    pub fn tenant(&self) -> &TenantId {
        &self.tenant
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Full store key for an orchestration key `name`.
    pub fn key(&self, name: &str) -> String {
        format!("{}{name}", self.namespace_prefix())
    }

    /// Prefix of every key belonging to the tenant.
    pub fn tenant_prefix(&self) -> String {
        format!("{}:", self.tenant)
    }

    fn namespace_prefix(&self) -> String {
        format!("{}:{NAMESPACE}:", self.tenant)
    }

    /// Claims the running flag with `operation` as value.
    ///
    /// Returns `false` without side effects when another operation holds it.
    pub async fn claim_running(&self, operation: &Operation) -> BrResult<bool> {
        let value = serde_json::to_string(operation)?;

        self.store
            .set_if_absent(&self.key(OPERATION_RUNNING_KEY), &value)
            .await
    }

    /// Clears the running flag, returning whether it was set.
    pub async fn release_running(&self) -> BrResult<bool> {
        self.store.delete(&self.key(OPERATION_RUNNING_KEY)).await
    }

    pub async fn is_running(&self) -> BrResult<bool> {
        Ok(self
            .store
            .get(&self.key(OPERATION_RUNNING_KEY))
            .await?
            .is_some())
    }

    /// Returns the operation holding the running flag.
    ///
    /// Presence of the flag alone means "running", so a value that is not a valid record
    /// is reported as [`ErrorKind::InvalidState`] rather than ignored.
    pub async fn running_operation(&self) -> BrResult<Option<Operation>> {
        let Some(value) = self.store.get(&self.key(OPERATION_RUNNING_KEY)).await? else {
            return Ok(None);
        };

        match serde_json::from_str(&value) {
            Ok(operation) => Ok(Some(operation)),
            Err(err) => bail!(
                ErrorKind::InvalidState,
                "Running flag does not hold an operation record",
                format!("value `{value}`: {err}")
            ),
        }
    }

    pub async fn request_shutdown(&self) -> BrResult<()> {
        self.store
            .set(&self.key(SHUTDOWN_REQUESTED_KEY), FLAG_VALUE)
            .await
    }

    pub async fn clear_shutdown(&self) -> BrResult<bool> {
        self.store.delete(&self.key(SHUTDOWN_REQUESTED_KEY)).await
    }

    pub async fn is_shutdown_requested(&self) -> BrResult<bool> {
        Ok(self
            .store
            .get(&self.key(SHUTDOWN_REQUESTED_KEY))
            .await?
            .is_some())
    }

    pub async fn pause(&self, reason: &str) -> BrResult<()> {
        self.store.set(&self.key(PAUSE_REASON_KEY), reason).await
    }

    pub async fn unpause(&self) -> BrResult<()> {
        self.store.delete(&self.key(PAUSE_REASON_KEY)).await?;

        Ok(())
    }

    pub async fn pause_reason(&self) -> BrResult<Option<String>> {
        self.store.get(&self.key(PAUSE_REASON_KEY)).await
    }

    pub async fn is_paused(&self) -> BrResult<bool> {
        Ok(self.pause_reason().await?.is_some())
    }

    pub async fn enable_readonly(&self) -> BrResult<()> {
        self.store.set(&self.key(READONLY_KEY), FLAG_VALUE).await
    }

    pub async fn disable_readonly(&self) -> BrResult<()> {
        self.store.delete(&self.key(READONLY_KEY)).await?;

        Ok(())
    }

    pub async fn is_readonly(&self) -> BrResult<bool> {
        Ok(self.store.get(&self.key(READONLY_KEY)).await?.is_some())
    }

    pub async fn save_logs_cursor(&self, cursor: u64) -> BrResult<()> {
        self.store
            .set(&self.key(LOGS_CURSOR_KEY), &cursor.to_string())
            .await
    }

    /// Returns the saved log cursor, `0` when none was saved.
    pub async fn logs_cursor(&self) -> BrResult<u64> {
        let Some(value) = self.store.get(&self.key(LOGS_CURSOR_KEY)).await? else {
            return Ok(0);
        };

        match value.parse() {
            Ok(cursor) => Ok(cursor),
            Err(err) => bail!(
                ErrorKind::InvalidState,
                "Saved log cursor is not a number",
                format!("value `{value}`: {err}")
            ),
        }
    }

    /// Deletes every key of the tenant except the orchestration's own keys.
    ///
    /// Returns the number of deleted keys.
    pub async fn flush_tenant_keys(&self) -> BrResult<u64> {
        let namespace_prefix = self.namespace_prefix();
        let keys = self.store.keys(&self.tenant_prefix()).await?;

        let mut deleted = 0;
        for key in keys {
            if key.starts_with(&namespace_prefix) {
                continue;
            }

            if self.store.delete(&key).await? {
                debug!(%key, "deleted tenant key");
                deleted += 1;
            }
        }

        info!(tenant_id = %self.tenant, deleted, "flushed tenant keys");

        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::store::memory::MemoryStore;
    use crate::types::OperationKind;

    fn coordination(store: &MemoryStore, tenant: &str) -> TenantCoordination<MemoryStore> {
        TenantCoordination::new(store.clone(), TenantId::new(tenant).unwrap())
    }

    fn operation(tenant: &str) -> Operation {
        Operation {
            kind: OperationKind::Backup,
            tenant: TenantId::new(tenant).unwrap(),
            started_at: Utc::now(),
            logs_cursor: 3,
        }
    }

    #[tokio::test]
    async fn running_flag_is_tenant_scoped() {
        let store = MemoryStore::new();
        let default = coordination(&store, "default");
        let second = coordination(&store, "second");

        assert!(default.claim_running(&operation("default")).await.unwrap());
        assert!(!default.claim_running(&operation("default")).await.unwrap());
        assert!(second.claim_running(&operation("second")).await.unwrap());

        let running = default.running_operation().await.unwrap().unwrap();
        assert_eq!(running.tenant.as_str(), "default");
        assert_eq!(running.logs_cursor, 3);
        assert!(
            store
                .snapshot()
                .await
                .contains_key("default:backup_restore:operation.running")
        );
    }

    #[tokio::test]
    async fn flush_keeps_orchestration_keys() {
        let store = MemoryStore::new();
        let default = coordination(&store, "default");

        default.claim_running(&operation("default")).await.unwrap();
        default.request_shutdown().await.unwrap();
        default.pause("restore").await.unwrap();
        default.enable_readonly().await.unwrap();
        default.save_logs_cursor(17).await.unwrap();
        store.set("default:foo", "bar").await.unwrap();
        store.set("default:cache:posts", "[]").await.unwrap();
        store.set("second:foo", "bar").await.unwrap();

        assert_eq!(default.flush_tenant_keys().await.unwrap(), 2);

        assert!(default.is_running().await.unwrap());
        assert!(default.is_shutdown_requested().await.unwrap());
        assert_eq!(
            default.pause_reason().await.unwrap().as_deref(),
            Some("restore")
        );
        assert!(default.is_readonly().await.unwrap());
        assert_eq!(default.logs_cursor().await.unwrap(), 17);
        assert_eq!(store.get("default:foo").await.unwrap(), None);
        assert_eq!(
            store.get("second:foo").await.unwrap().as_deref(),
            Some("bar")
        );
    }

    #[tokio::test]
    async fn flush_never_reaches_other_tenants_sharing_a_prefix() {
        let store = MemoryStore::new();
        let short = coordination(&store, "a");
        let long = coordination(&store, "ab");

        long.claim_running(&operation("ab")).await.unwrap();
        long.pause("backup").await.unwrap();
        long.save_logs_cursor(4).await.unwrap();
        store.set("ab:foo", "bar").await.unwrap();
        store.set("a:foo", "bar").await.unwrap();

        assert!(TenantId::new("a:b").is_err());
        assert_eq!(short.flush_tenant_keys().await.unwrap(), 1);

        assert!(long.is_running().await.unwrap());
        assert!(long.is_paused().await.unwrap());
        assert_eq!(long.logs_cursor().await.unwrap(), 4);
        assert_eq!(store.get("ab:foo").await.unwrap().as_deref(), Some("bar"));
        assert_eq!(store.get("a:foo").await.unwrap(), None);
    }

    #[tokio::test]
    async fn missing_cursor_reads_as_zero() {
        let store = MemoryStore::new();
        let default = coordination(&store, "default");

        assert_eq!(default.logs_cursor().await.unwrap(), 0);

        store
            .set("default:backup_restore:logs.cursor", "abc")
            .await
            .unwrap();
        assert_eq!(
            default.logs_cursor().await.unwrap_err().kind(),
            ErrorKind::InvalidState
        );
    }
}
