use fail::fail_point;

use crate::bail;
use crate::error::{BrResult, ErrorKind};

/// Hit after tables were moved and before views are moved.
pub const SCHEMA_SWAP__AFTER_TABLES: &str = "schema_swap.after_tables";

/// Hit after the collaborator's work finished and before post-processing starts.
pub const OPERATION__AFTER_WORK: &str = "operation.after_work";

/// Returns an error when the named failpoint is configured with `return`.
///
/// The optional parameter selects the error kind a collaborator would fail with, e.g.
/// `return(query_failed)`. Without one the error is [`ErrorKind::FailpointInjected`].
pub fn br_fail_point(name: &str) -> BrResult<()> {
    fail_point!(name, |parameter| {
        let error_kind = match parameter.as_deref() {
            Some("schema_swap_failed") => ErrorKind::SchemaSwapFailed,
            Some("query_failed") => ErrorKind::DatabaseQueryFailed,
            Some("store_failed") => ErrorKind::CoordinationStoreFailed,
            Some("job_registry_failed") => ErrorKind::JobRegistryFailed,
            _ => ErrorKind::FailpointInjected,
        };

        bail!(
            error_kind,
            "An error occurred in a fail point",
            format!("The failpoint '{name}' returned an error")
        );
    });

    Ok(())
}
