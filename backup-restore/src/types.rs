//! Core domain types shared by every component.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::bail;
use crate::error::{BrError, BrResult, ErrorKind};

/// Characters a tenant id cannot contain.
///
/// Store keys are `{tenant}:...` and tenant keys are listed with a glob on that prefix,
/// so a separator or glob metacharacter would let one tenant's prefix cover another's.
const FORBIDDEN_TENANT_CHARS: [char; 6] = [':', '*', '?', '[', ']', '\\'];

/// Identifier of the tenant whose data an operation acts on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TenantId(String);

impl TenantId {
    /// Creates a tenant id, rejecting blank values and key separators.
    pub fn new(id: impl Into<String>) -> BrResult<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            bail!(ErrorKind::ConfigError, "Tenant id cannot be empty");
        }

        if let Some(c) = id.chars().find(|c| FORBIDDEN_TENANT_CHARS.contains(c)) {
            bail!(
                ErrorKind::ConfigError,
                "Tenant id contains a reserved character",
                format!("`{c}` in tenant id `{id}`")
            );
        }

        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for TenantId {
    type Error = BrError;

    fn try_from(id: String) -> Result<Self, Self::Error> {
        Self::new(id)
    }
}

impl From<TenantId> for String {
    fn from(id: TenantId) -> Self {
        id.0
    }
}

impl FromStr for TenantId {
    type Err = BrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Kind of exclusive operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Backup,
    Restore,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Backup => "backup",
            OperationKind::Restore => "restore",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Record stored under the running flag while an operation owns the tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    pub kind: OperationKind,
    pub tenant: TenantId,
    pub started_at: DateTime<Utc>,
    /// Id of the last log channel entry published before the operation started.
    pub logs_cursor: u64,
}

/// Snapshot reported to the admin surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationsStatus {
    pub is_operation_running: bool,
    pub can_rollback: bool,
    pub allow_restore: bool,
}
