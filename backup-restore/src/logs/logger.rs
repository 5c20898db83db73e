use tracing::{error, info, warn};

use crate::error::BrError;
use crate::logs::base::{LogChannel, LogLevel};
use crate::types::TenantId;

/// Writes operator-facing messages to the process log and to the [`LogChannel`].
///
/// Channel failures are reported as warnings and never interrupt the operation.
#[derive(Debug, Clone)]
pub struct OperationLogger<L> {
    channel: L,
    tenant: TenantId,
}

impl<L> OperationLogger<L>
where
    L: LogChannel,
{
    pub fn new(channel: L, tenant: TenantId) -> Self {
        Self { channel, tenant }
    }

    pub fn channel(&self) -> &L {
        &self.channel
    }

    pub async fn log(&self, message: &str) {
        info!(tenant_id = %self.tenant, "{message}");
        self.publish(LogLevel::Info, message, None).await;
    }

    pub async fn warn(&self, message: &str) {
        warn!(tenant_id = %self.tenant, "{message}");
        self.publish(LogLevel::Warn, message, None).await;
    }

    /// Logs `message` together with the summary of `err`.
    pub async fn log_error(&self, message: &str, err: &BrError) {
        error!(tenant_id = %self.tenant, error = %err, "{message}");
        let summary = err.summary();
        self.publish(LogLevel::Error, message, Some(&summary)).await;
    }

    async fn publish(&self, level: LogLevel, message: &str, error: Option<&str>) {
        if let Err(err) = self.channel.publish(level, message, error).await {
            warn!(
                tenant_id = %self.tenant,
                error = %err,
                "failed to publish log entry"
            );
        }
    }
}
