use serde::Deserialize;

use crate::Config;
use crate::shared::{CoordinationStoreConfig, DrainConfig, PgConnectionConfig, ValidationError};

/// Top-level configuration of a backup and restore deployment for a single tenant.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct BackupRestoreConfig {
    /// Identifier of the tenant the process acts for.
    pub tenant_id: String,
    /// Connection to the tenant's database.
    pub database: PgConnectionConfig,
    /// Role owning the application objects moved by schema swaps.
    ///
    /// Defaults to `database.username`.
    #[serde(default)]
    pub database_owner: Option<String>,
    /// Store shared with the worker processes.
    #[serde(default)]
    pub coordination: CoordinationStoreConfig,
    #[serde(default)]
    pub drain: DrainConfig,
    /// Whether restores are permitted in production.
    #[serde(default)]
    pub allow_restore: bool,
}

impl BackupRestoreConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.tenant_id.trim().is_empty() {
            return Err(ValidationError::EmptyTenantId);
        }

        if let Some(owner) = &self.database_owner
            && owner.trim().is_empty()
        {
            return Err(ValidationError::InvalidFieldValue {
                field: "database_owner".to_string(),
                constraint: "cannot be empty when set".to_string(),
            });
        }

        self.database.tls.validate()?;
        self.coordination.validate()?;
        self.drain.validate()?;

        Ok(())
    }

    /// Role whose objects are moved by schema swaps.
    pub fn owner(&self) -> &str {
        self.database_owner
            .as_deref()
            .unwrap_or(&self.database.username)
    }
}

impl Config for BackupRestoreConfig {
    const LIST_PARSE_KEYS: &'static [&'static str] = &[];
}
