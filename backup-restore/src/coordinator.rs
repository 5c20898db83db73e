//! Lifecycle of exclusive backup and restore operations.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;

use chrono::Utc;
use config::Environment;
use config::shared::{BackupRestoreConfig, DrainConfig};
use futures::FutureExt;
use tracing::{error, info, warn};

use crate::concurrency::cancellation::CancellationToken;
use crate::error::{BrError, BrResult, ErrorKind};
#[cfg(feature = "failpoints")]
use crate::failpoints::{OPERATION__AFTER_WORK, br_fail_point};
use crate::jobs::base::JobRegistry;
use crate::logs::base::{LogChannel, LogEntry};
use crate::logs::logger::OperationLogger;
use crate::mode::{MaintenanceGuard, SystemModeController};
use crate::schema::base::{BACKUP_SCHEMA, PUBLIC_SCHEMA, SchemaSwapper};
use crate::store::base::CoordinationStore;
use crate::store::tenant::TenantCoordination;
use crate::types::{Operation, OperationKind, OperationsStatus, TenantId};
use crate::workers::drain::WorkerDrainCoordinator;
use crate::workers::purge::QueuePurge;
use crate::bail;

/// Policy inputs of the coordinator.
#[derive(Debug, Clone)]
pub struct CoordinatorSettings {
    pub drain: DrainConfig,
    /// Whether restores are allowed in production.
    pub allow_restore: bool,
    pub environment: Environment,
}

impl CoordinatorSettings {
    pub fn from_config(config: &BackupRestoreConfig, environment: Environment) -> Self {
        Self {
            drain: config.drain.clone(),
            allow_restore: config.allow_restore,
            environment,
        }
    }
}

/// Proof that the caller owns the tenant's running flag.
///
/// Must be passed back to [`OperationCoordinator::finish`].
#[derive(Debug)]
#[must_use = "the running flag stays set until the handle is passed to `finish`"]
pub struct OperationHandle {
    operation: Operation,
}

impl OperationHandle {
    pub fn operation(&self) -> &Operation {
        &self.operation
    }

    pub fn kind(&self) -> OperationKind {
        self.operation.kind
    }
}

/// What the data transfer collaborator gets access to while an operation runs.
#[derive(Debug, Clone)]
pub struct OperationContext<S, L, W> {
    operation: Operation,
    token: CancellationToken<S>,
    logger: OperationLogger<L>,
    swapper: W,
}

impl<S, L, W> OperationContext<S, L, W>
where
    S: CoordinationStore,
    L: LogChannel,
    W: SchemaSwapper,
{
    pub fn operation(&self) -> &Operation {
        &self.operation
    }

    pub fn logger(&self) -> &OperationLogger<L> {
        &self.logger
    }

    pub fn swapper(&self) -> &W {
        &self.swapper
    }

    /// Fails with [`ErrorKind::OperationCancelled`] when cancellation was requested.
    ///
    /// Long transfers should call this between their steps.
    pub async fn checkpoint(&self) -> BrResult<()> {
        self.token.checkpoint().await
    }

    /// Moves the live objects into the backup schema, replacing the previous snapshot.
    pub async fn snapshot_public_schema(&self) -> BrResult<()> {
        self.logger
            .log("Moving tables to the backup schema...")
            .await;
        self.swapper.swap(PUBLIC_SCHEMA, BACKUP_SCHEMA).await
    }
}

/// Entry point for running and inspecting the operations of one tenant.
pub struct OperationCoordinator<S, L, J, W> {
    tenant: TenantId,
    coordination: TenantCoordination<S>,
    logger: OperationLogger<L>,
    modes: SystemModeController<S, L>,
    drain: WorkerDrainCoordinator<J, L>,
    purge: QueuePurge<J, L>,
    token: CancellationToken<S>,
    swapper: W,
    settings: CoordinatorSettings,
}

impl<S, L, J, W> OperationCoordinator<S, L, J, W>
where
    S: CoordinationStore + Clone,
    L: LogChannel + Clone,
    J: JobRegistry + Clone,
    W: SchemaSwapper + Clone,
{
    pub fn new(
        tenant: TenantId,
        store: S,
        channel: L,
        registry: J,
        swapper: W,
        settings: CoordinatorSettings,
    ) -> Self {
        let coordination = TenantCoordination::new(store, tenant.clone());
        let logger = OperationLogger::new(channel, tenant.clone());

        Self {
            modes: SystemModeController::new(coordination.clone(), logger.clone()),
            drain: WorkerDrainCoordinator::new(
                registry.clone(),
                tenant.clone(),
                settings.drain.clone(),
                logger.clone(),
            ),
            purge: QueuePurge::new(registry, tenant.clone(), logger.clone()),
            token: CancellationToken::new(coordination.clone()),
            tenant,
            coordination,
            logger,
            swapper,
            settings,
        }
    }

    pub fn tenant(&self) -> &TenantId {
        &self.tenant
    }

    pub fn coordination(&self) -> &TenantCoordination<S> {
        &self.coordination
    }

    pub fn logger(&self) -> &OperationLogger<L> {
        &self.logger
    }

    pub fn modes(&self) -> &SystemModeController<S, L> {
        &self.modes
    }

    pub fn token(&self) -> &CancellationToken<S> {
        &self.token
    }

    /// Claims the tenant's running flag.
    ///
    /// Fails with [`ErrorKind::OperationAlreadyRunning`] without side effects when
    /// another operation holds it. Once claimed, the flag is released again if the
    /// remaining start steps fail.
    pub async fn start(&self, kind: OperationKind) -> BrResult<OperationHandle> {
        let logs_cursor = self.logger.channel().last_id().await?;
        let operation = Operation {
            kind,
            tenant: self.tenant.clone(),
            started_at: Utc::now(),
            logs_cursor,
        };

        if !self.coordination.claim_running(&operation).await? {
            bail!(
                ErrorKind::OperationAlreadyRunning,
                "A backup or restore is already running",
                format!("tenant {}", self.tenant)
            );
        }

        if let Err(err) = self.reset_for(&operation).await {
            if let Err(release_err) = self.coordination.release_running().await {
                return Err(BrError::from(vec![err, release_err]));
            }

            return Err(err);
        }

        info!(tenant_id = %self.tenant, %kind, logs_cursor, "operation started");

        Ok(OperationHandle { operation })
    }

    async fn reset_for(&self, operation: &Operation) -> BrResult<()> {
        self.coordination.clear_shutdown().await?;
        self.coordination
            .save_logs_cursor(operation.logs_cursor)
            .await
    }

    /// Releases the running flag held by `handle`.
    ///
    /// The shutdown flag is left as is; the next [`Self::start`] clears it.
    pub async fn finish(&self, handle: OperationHandle) -> BrResult<()> {
        let kind = handle.kind();
        let released = self.coordination.release_running().await?;
        if !released {
            warn!(tenant_id = %self.tenant, %kind, "running flag was already cleared");
        }

        info!(tenant_id = %self.tenant, %kind, "operation finished");

        Ok(())
    }

    /// Asks the running operation to stop at its next checkpoint.
    pub async fn request_cancellation(&self) -> BrResult<()> {
        self.token.cancel().await?;
        info!(tenant_id = %self.tenant, "cancellation requested");

        Ok(())
    }

    pub async fn is_operation_running(&self) -> BrResult<bool> {
        self.coordination.is_running().await
    }

    /// Returns whether a snapshot to roll back to exists.
    pub async fn can_rollback(&self) -> BrResult<bool> {
        Ok(self.swapper.count_tables(BACKUP_SCHEMA).await? > 0)
    }

    /// Restores are always allowed outside of production.
    pub fn allow_restore(&self) -> bool {
        self.settings.allow_restore || self.settings.environment.is_non_production()
    }

    pub async fn status(&self) -> BrResult<OperationsStatus> {
        Ok(OperationsStatus {
            is_operation_running: self.is_operation_running().await?,
            can_rollback: self.can_rollback().await?,
            allow_restore: self.allow_restore(),
        })
    }

    /// Moves the snapshot back into the public schema.
    ///
    /// Returns `false` without touching the database when there is no snapshot.
    pub async fn rollback(&self) -> BrResult<bool> {
        if self.is_operation_running().await? {
            bail!(
                ErrorKind::OperationAlreadyRunning,
                "Cannot roll back while a backup or restore is running",
                format!("tenant {}", self.tenant)
            );
        }

        if !self.can_rollback().await? {
            info!(tenant_id = %self.tenant, "no backup tables, nothing to roll back");
            return Ok(false);
        }

        self.logger.log("Rolling back to the backup schema...").await;
        self.swapper.swap(BACKUP_SCHEMA, PUBLIC_SCHEMA).await?;
        self.logger.log("Rollback finished").await;

        Ok(true)
    }

    /// Replays the log entries published since the last operation started.
    pub async fn logs(&self) -> BrResult<Vec<LogEntry>> {
        let cursor = self.coordination.logs_cursor().await?;

        self.logger.channel().since(cursor).await
    }

    /// Force-clears the running and shutdown flags left by a crashed process.
    ///
    /// Returns whether a running flag was cleared.
    pub async fn clear_stale_operation(&self) -> BrResult<bool> {
        match self.coordination.running_operation().await {
            Ok(Some(operation)) => warn!(
                tenant_id = %self.tenant,
                kind = %operation.kind,
                started_at = %operation.started_at,
                "clearing stale operation"
            ),
            Ok(None) => {}
            Err(err) => warn!(tenant_id = %self.tenant, error = %err, "clearing unreadable running flag"),
        }

        let cleared = self.coordination.release_running().await?;
        self.coordination.clear_shutdown().await?;

        Ok(cleared)
    }

    /// Runs a complete operation around `work`.
    ///
    /// The system is put in maintenance and drained before `work` runs. Maintenance is
    /// exited and the running flag released on every path, including cancellation and a
    /// panic inside `work`; the first error is returned afterwards. When the returned
    /// future is dropped before completing, the same cleanup is spawned on the runtime.
    pub async fn run<F, Fut>(&self, kind: OperationKind, work: F) -> BrResult<()>
    where
        S: Send + Sync + 'static,
        L: Send + Sync + 'static,
        F: FnOnce(OperationContext<S, L, W>) -> Fut,
        Fut: Future<Output = BrResult<()>>,
    {
        let handle = self.start(kind).await?;
        let mut cleanup = AbandonedRunCleanup::new(
            kind,
            self.coordination.clone(),
            self.modes.clone(),
            self.logger.clone(),
        );
        self.logger.log(&format!("[STARTED] {kind}")).await;

        let guard = self.modes.capture_modes().await;
        cleanup.maintenance = Some(guard);
        self.modes.apply_maintenance(guard, kind.as_str()).await;
        let result = self.execute(&handle, work).await;

        match &result {
            Ok(()) => self.logger.log(&format!("[SUCCESS] {kind}")).await,
            Err(err) if err.kinds().contains(&ErrorKind::OperationCancelled) => {
                self.logger.warn(&format!("[CANCELLED] {kind}")).await
            }
            Err(err) => {
                self.logger
                    .log_error(&format!("[FAILED] {kind}"), err)
                    .await
            }
        }

        self.modes.exit_maintenance(guard).await;
        self.logger.log("Marking operation as finished...").await;
        let finished = self.finish(handle).await;
        cleanup.disarm();

        match (result, finished) {
            (Ok(()), finished) => finished,
            (Err(err), Ok(())) => Err(err),
            (Err(err), Err(finish_err)) => Err(BrError::from(vec![err, finish_err])),
        }
    }

    async fn execute<F, Fut>(&self, handle: &OperationHandle, work: F) -> BrResult<()>
    where
        F: FnOnce(OperationContext<S, L, W>) -> Fut,
        Fut: Future<Output = BrResult<()>>,
    {
        self.drain.wait_for_drain(&self.token).await?;
        self.token.checkpoint().await?;

        let context = OperationContext {
            operation: handle.operation().clone(),
            token: self.token.clone(),
            logger: self.logger.clone(),
            swapper: self.swapper.clone(),
        };

        match AssertUnwindSafe(async move { work(context).await })
            .catch_unwind()
            .await
        {
            Ok(result) => result?,
            Err(payload) => bail!(
                ErrorKind::OperationPanicked,
                "Operation panicked",
                detail = panic_message(payload.as_ref())
            ),
        }

        #[cfg(feature = "failpoints")]
        br_fail_point(OPERATION__AFTER_WORK)?;

        self.token.checkpoint().await?;

        if handle.kind() == OperationKind::Restore {
            self.purge.purge_current_tenant_queues().await?;

            self.logger.log("Flushing tenant keys...").await;
            let flushed = self.coordination.flush_tenant_keys().await?;
            self.logger
                .log(&format!("Removed {flushed} cached key(s) of this tenant"))
                .await;
        }

        Ok(())
    }
}

/// Releases a run's tenant when the run future is dropped before reaching its end.
///
/// Armed right after the running flag is claimed. Unless disarmed, dropping it spawns a
/// task that restores the captured modes and clears the running flag.
struct AbandonedRunCleanup<S, L>
where
    S: CoordinationStore + Clone + Send + Sync + 'static,
    L: LogChannel + Clone + Send + Sync + 'static,
{
    kind: OperationKind,
    coordination: TenantCoordination<S>,
    modes: SystemModeController<S, L>,
    logger: OperationLogger<L>,
    maintenance: Option<MaintenanceGuard>,
    armed: bool,
}

impl<S, L> AbandonedRunCleanup<S, L>
where
    S: CoordinationStore + Clone + Send + Sync + 'static,
    L: LogChannel + Clone + Send + Sync + 'static,
{
    fn new(
        kind: OperationKind,
        coordination: TenantCoordination<S>,
        modes: SystemModeController<S, L>,
        logger: OperationLogger<L>,
    ) -> Self {
        Self {
            kind,
            coordination,
            modes,
            logger,
            maintenance: None,
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl<S, L> Drop for AbandonedRunCleanup<S, L>
where
    S: CoordinationStore + Clone + Send + Sync + 'static,
    L: LogChannel + Clone + Send + Sync + 'static,
{
    fn drop(&mut self) {
        if !self.armed {
            return;
        }

        let tenant = self.coordination.tenant().clone();
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            error!(tenant_id = %tenant, kind = %self.kind, "run dropped outside of a runtime, running flag left set");
            return;
        };

        let kind = self.kind;
        let maintenance = self.maintenance.take();
        let coordination = self.coordination.clone();
        let modes = self.modes.clone();
        let logger = self.logger.clone();

        warn!(tenant_id = %tenant, %kind, "run dropped before completion, releasing the tenant");

        runtime.spawn(async move {
            logger.warn(&format!("[ABORTED] {kind}")).await;

            if let Some(guard) = maintenance {
                modes.exit_maintenance(guard).await;
            }

            match coordination.release_running().await {
                Ok(_) => info!(tenant_id = %tenant, %kind, "abandoned operation released"),
                Err(err) => {
                    error!(tenant_id = %tenant, %kind, error = %err, "could not release abandoned operation")
                }
            }
        });
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic payload is not a string".to_owned()
    }
}
