use config::shared::DrainConfig;
use tokio::time::sleep;
use tracing::debug;

use crate::bail;
use crate::concurrency::cancellation::CancellationToken;
use crate::error::{BrResult, ErrorKind};
use crate::jobs::base::JobRegistry;
use crate::logs::base::LogChannel;
use crate::logs::logger::OperationLogger;
use crate::store::base::CoordinationStore;
use crate::types::TenantId;

/// Waits for in-flight background jobs that may touch the tenant to finish.
///
/// Job metadata published by workers lags by a few seconds, so the coordinator always
/// sleeps one poll interval before the first check.
#[derive(Debug, Clone)]
pub struct WorkerDrainCoordinator<J, L> {
    registry: J,
    tenant: TenantId,
    config: DrainConfig,
    logger: OperationLogger<L>,
}

impl<J, L> WorkerDrainCoordinator<J, L>
where
    J: JobRegistry,
    L: LogChannel,
{
    pub fn new(
        registry: J,
        tenant: TenantId,
        config: DrainConfig,
        logger: OperationLogger<L>,
    ) -> Self {
        Self {
            registry,
            tenant,
            config,
            logger,
        }
    }

    /// Returns once no blocking job runs, checking at most `max_iterations` times.
    ///
    /// Fails with [`ErrorKind::WorkersStillRunning`] when jobs are still running after the
    /// last check, and with [`ErrorKind::OperationCancelled`] as soon as a cancellation is
    /// observed after a sleep.
    pub async fn wait_for_drain<S>(&self, token: &CancellationToken<S>) -> BrResult<()>
    where
        S: CoordinationStore,
    {
        let max_iterations = self.config.max_iterations();
        self.logger
            .log(&format!(
                "Waiting up to {} seconds for background jobs to finish running...",
                self.config.max_wait().as_secs()
            ))
            .await;

        let mut iterations = 1;
        loop {
            sleep(self.config.poll_interval()).await;
            token.checkpoint().await?;

            let blocking = self.blocking_jobs().await?;
            if blocking == 0 {
                debug!(tenant_id = %self.tenant, iterations, "background jobs drained");
                return Ok(());
            }

            iterations += 1;
            if iterations > max_iterations {
                bail!(
                    ErrorKind::WorkersStillRunning,
                    "Background jobs did not finish running in the allowed time",
                    format!(
                        "{blocking} job(s) still running after {} seconds",
                        self.config.max_wait().as_secs()
                    )
                );
            }

            self.logger
                .log(&format!(
                    "Waiting for background jobs to finish running... #{iterations}"
                ))
                .await;
        }
    }

    /// Counts executing jobs that may touch the tenant's data.
    pub async fn blocking_jobs(&self) -> BrResult<usize> {
        let jobs = self.registry.running_jobs().await?;

        Ok(jobs.iter().filter(|job| job.affects(&self.tenant)).count())
    }
}
