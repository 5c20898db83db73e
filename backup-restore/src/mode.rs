//! Transitions of the system into and out of maintenance.
//!
//! Maintenance means read-only mode plus paused background processing. Entering captures
//! which of the two modes were already active so that leaving restores exactly the prior
//! state. Toggle failures are logged and never abort the operation.

use crate::br_error;
use crate::error::{BrError, BrResult, ErrorKind};
use crate::logs::base::LogChannel;
use crate::logs::logger::OperationLogger;
use crate::store::base::CoordinationStore;
use crate::store::tenant::TenantCoordination;

/// Modes that were already active when maintenance was entered.
///
/// Returned by [`SystemModeController::enter_maintenance`] and consumed by
/// [`SystemModeController::exit_maintenance`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "the guard must be passed to `exit_maintenance` to restore the prior modes"]
pub struct MaintenanceGuard {
    was_readonly: bool,
    was_paused: bool,
}

impl MaintenanceGuard {
    pub fn was_readonly(&self) -> bool {
        self.was_readonly
    }

    pub fn was_paused(&self) -> bool {
        self.was_paused
    }
}

#[derive(Debug, Clone)]
pub struct SystemModeController<S, L> {
    coordination: TenantCoordination<S>,
    logger: OperationLogger<L>,
}

impl<S, L> SystemModeController<S, L>
where
    S: CoordinationStore,
    L: LogChannel,
{
    pub fn new(coordination: TenantCoordination<S>, logger: OperationLogger<L>) -> Self {
        Self {
            coordination,
            logger,
        }
    }

    /// Turns on read-only mode and pauses background processing with `reason`.
    ///
    /// Modes already active are left untouched.
    pub async fn enter_maintenance(&self, reason: &str) -> MaintenanceGuard {
        let guard = self.capture_modes().await;
        self.apply_maintenance(guard, reason).await;

        guard
    }

    /// Records which maintenance modes are currently active without changing any.
    pub async fn capture_modes(&self) -> MaintenanceGuard {
        let was_readonly = self
            .current_mode(self.coordination.is_readonly().await, "readonly mode")
            .await;
        let was_paused = self
            .current_mode(self.coordination.is_paused().await, "background job pause")
            .await;

        MaintenanceGuard {
            was_readonly,
            was_paused,
        }
    }

    /// Turns on the modes that were inactive when `guard` was captured.
    pub async fn apply_maintenance(&self, guard: MaintenanceGuard, reason: &str) {
        if !guard.was_readonly {
            self.logger.log("Enabling readonly mode...").await;
            if let Err(err) = self.enable_readonly().await {
                self.logger
                    .log_error("Something went wrong while enabling readonly mode", &err)
                    .await;
            }
        }

        if !guard.was_paused {
            self.logger.log("Pausing background jobs...").await;
            if let Err(err) = self.pause(reason).await {
                self.logger
                    .log_error("Something went wrong while pausing background jobs", &err)
                    .await;
            }
        }
    }

    /// Turns off every mode that `enter_maintenance` turned on.
    pub async fn exit_maintenance(&self, guard: MaintenanceGuard) {
        if !guard.was_readonly {
            self.logger.log("Disabling readonly mode...").await;
            if let Err(err) = self.disable_readonly().await {
                self.logger
                    .log_error("Something went wrong while disabling readonly mode", &err)
                    .await;
            }
        }

        if !guard.was_paused {
            self.logger.log("Unpausing background jobs...").await;
            if let Err(err) = self.unpause().await {
                self.logger
                    .log_error("Something went wrong while unpausing background jobs", &err)
                    .await;
            }
        }
    }

    pub async fn enable_readonly(&self) -> BrResult<()> {
        self.coordination
            .enable_readonly()
            .await
            .map_err(|err| toggle_error("Could not enable readonly mode", err))
    }

    pub async fn disable_readonly(&self) -> BrResult<()> {
        self.coordination
            .disable_readonly()
            .await
            .map_err(|err| toggle_error("Could not disable readonly mode", err))
    }

    pub async fn pause(&self, reason: &str) -> BrResult<()> {
        self.coordination
            .pause(reason)
            .await
            .map_err(|err| toggle_error("Could not pause background jobs", err))
    }

    pub async fn unpause(&self) -> BrResult<()> {
        self.coordination
            .unpause()
            .await
            .map_err(|err| toggle_error("Could not unpause background jobs", err))
    }

    /// Unknown modes are treated as inactive so that the operation still enables them.
    async fn current_mode(&self, state: BrResult<bool>, mode: &str) -> bool {
        match state {
            Ok(active) => active,
            Err(err) => {
                let err = toggle_error("Could not read the current mode", err);
                self.logger
                    .log_error(&format!("Something went wrong while checking {mode}"), &err)
                    .await;
                false
            }
        }
    }
}

fn toggle_error(description: &'static str, err: BrError) -> BrError {
    br_error!(
        ErrorKind::ModeToggleFailed,
        description,
        detail = err.summary(),
        source: err
    )
}
