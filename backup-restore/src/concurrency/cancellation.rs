use crate::bail;
use crate::error::{BrResult, ErrorKind};
use crate::store::base::CoordinationStore;
use crate::store::tenant::TenantCoordination;

/// Cooperative cancellation signal backed by the tenant's shutdown flag.
///
/// Any process may set the flag; the operation observes it at checkpoints. The flag is
/// not cleared by observing it, only by the start of the next operation.
#[derive(Debug, Clone)]
pub struct CancellationToken<S> {
    coordination: TenantCoordination<S>,
}

impl<S> CancellationToken<S>
where
    S: CoordinationStore,
{
    pub fn new(coordination: TenantCoordination<S>) -> Self {
        Self { coordination }
    }

    /// Sets the shutdown flag.
    pub async fn cancel(&self) -> BrResult<()> {
        self.coordination.request_shutdown().await
    }

    pub async fn is_cancelled(&self) -> BrResult<bool> {
        self.coordination.is_shutdown_requested().await
    }

    /// Fails with [`ErrorKind::OperationCancelled`] when cancellation was requested.
    pub async fn checkpoint(&self) -> BrResult<()> {
        if self.is_cancelled().await? {
            bail!(
                ErrorKind::OperationCancelled,
                "Operation was cancelled",
                format!("cancellation requested for tenant {}", self.coordination.tenant())
            );
        }

        Ok(())
    }
}
