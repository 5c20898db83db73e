use tracing::debug;

use crate::error::BrResult;
use crate::jobs::base::{JobRegistry, JobSet};
use crate::logs::base::LogChannel;
use crate::logs::logger::OperationLogger;
use crate::types::TenantId;

/// Removes the tenant's pending work from the job system.
///
/// Only jobs explicitly tagged with the tenant are removed; untagged and all-tenants
/// jobs belong to the whole fleet.
#[derive(Debug, Clone)]
pub struct QueuePurge<J, L> {
    registry: J,
    tenant: TenantId,
    logger: OperationLogger<L>,
}

impl<J, L> QueuePurge<J, L>
where
    J: JobRegistry,
    L: LogChannel,
{
    pub fn new(registry: J, tenant: TenantId, logger: OperationLogger<L>) -> Self {
        Self {
            registry,
            tenant,
            logger,
        }
    }

    /// Walks every queue plus the retry, scheduled and dead sets.
    ///
    /// Idempotent. Returns the number of removed jobs.
    pub async fn purge_current_tenant_queues(&self) -> BrResult<u64> {
        self.logger.log("Clearing background job queues...").await;

        let mut sets: Vec<JobSet> = self
            .registry
            .queue_names()
            .await?
            .into_iter()
            .map(JobSet::Queue)
            .collect();
        sets.extend([JobSet::Retry, JobSet::Scheduled, JobSet::Dead]);

        let mut removed = 0;
        for set in &sets {
            for job in self.registry.jobs(set).await? {
                if !job.belongs_to(&self.tenant) {
                    continue;
                }

                if self.registry.delete_job(set, &job).await? {
                    debug!(tenant_id = %self.tenant, %set, job_id = %job.id, "removed job");
                    removed += 1;
                }
            }
        }

        self.logger
            .log(&format!("Removed {removed} pending job(s) of this tenant"))
            .await;

        Ok(removed)
    }
}
