use std::future::Future;

use crate::bail;
use crate::error::{BrResult, ErrorKind};

/// Schema holding the live application objects.
pub const PUBLIC_SCHEMA: &str = "public";

/// Schema holding the snapshot taken before a restore.
pub const BACKUP_SCHEMA: &str = "backup";

/// Moves every table, view and enum type owned by the application role between schemas.
pub trait SchemaSwapper {
    /// Moves the application's objects from `source` to `destination`.
    ///
    /// Runs as a single transaction: `destination` is created when missing, same-named
    /// objects in `destination` are dropped with their dependents, then tables, views and
    /// enum types are moved in that order. On failure nothing is moved.
    fn swap(
        &self,
        source: &str,
        destination: &str,
    ) -> impl Future<Output = BrResult<()>> + Send;

    /// Returns the number of tables in `schema`.
    fn count_tables(&self, schema: &str) -> impl Future<Output = BrResult<u64>> + Send;
}

/// Checks that both schema names are plain identifiers and differ.
pub fn validate_swap(source: &str, destination: &str) -> BrResult<()> {
    validate_schema_name(source)?;
    validate_schema_name(destination)?;

    if source == destination {
        bail!(
            ErrorKind::InvalidIdentifier,
            "Source and destination schemas must differ",
            source
        );
    }

    Ok(())
}

pub fn validate_schema_name(name: &str) -> BrResult<()> {
    if !postgres::schema::is_plain_identifier(name) {
        bail!(
            ErrorKind::InvalidIdentifier,
            "Schema name is not a valid identifier",
            format!("`{name}`")
        );
    }

    Ok(())
}
