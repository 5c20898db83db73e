use std::fmt;
use std::future::Future;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::BrResult;
use crate::types::TenantId;

/// Key of the first job argument naming the tenant a job works for.
pub const TENANT_TAG_KEY: &str = "current_tenant_id";

/// Key of the first job argument marking a job that works for every tenant.
pub const ALL_TENANTS_KEY: &str = "all_tenants";

/// Background job as stored by the job system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    #[serde(rename = "jid")]
    pub id: String,
    pub class: String,
    #[serde(default)]
    pub queue: Option<String>,
    #[serde(default)]
    pub args: Vec<Value>,
    /// Exact member the job was read from, when read from a registry storing members.
    #[serde(skip)]
    pub raw: Option<String>,
}

impl Job {
    /// Returns the tenant tag carried by the first argument.
    pub fn tenant_tag(&self) -> Option<&str> {
        self.args.first()?.get(TENANT_TAG_KEY)?.as_str()
    }

    /// Returns `true` when the first argument carries the all-tenants marker.
    pub fn is_for_all_tenants(&self) -> bool {
        self.args
            .first()
            .and_then(|args| args.get(ALL_TENANTS_KEY))
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Returns `true` when the job may touch `tenant`'s data.
    ///
    /// Untagged jobs and all-tenants jobs apply to every tenant.
    pub fn affects(&self, tenant: &TenantId) -> bool {
        if self.is_for_all_tenants() {
            return true;
        }

        match self.tenant_tag() {
            None => true,
            Some(tag) if tag.trim().is_empty() => true,
            Some(tag) => tag == tenant.as_str(),
        }
    }

    /// Returns `true` only for jobs explicitly tagged with `tenant`.
    pub fn belongs_to(&self, tenant: &TenantId) -> bool {
        self.tenant_tag() == Some(tenant.as_str())
    }
}

/// Place where pending jobs are kept.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum JobSet {
    /// Named queue of jobs waiting to run.
    Queue(String),
    /// Failed jobs waiting to be retried.
    Retry,
    /// Jobs scheduled to run later.
    Scheduled,
    /// Jobs that exhausted their retries.
    Dead,
}

impl fmt::Display for JobSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobSet::Queue(name) => write!(f, "queue `{name}`"),
            JobSet::Retry => f.write_str("retry set"),
            JobSet::Scheduled => f.write_str("scheduled set"),
            JobSet::Dead => f.write_str("dead set"),
        }
    }
}

/// Access to the background job system shared by every worker process.
pub trait JobRegistry {
    /// Returns the jobs currently executing on any worker process.
    fn running_jobs(&self) -> impl Future<Output = BrResult<Vec<Job>>> + Send;

    /// Returns the names of every known queue.
    fn queue_names(&self) -> impl Future<Output = BrResult<Vec<String>>> + Send;

    /// Returns the jobs held in `set`.
    fn jobs(&self, set: &JobSet) -> impl Future<Output = BrResult<Vec<Job>>> + Send;

    /// Removes `job` from `set`, returning whether it was present.
    fn delete_job(&self, set: &JobSet, job: &Job) -> impl Future<Output = BrResult<bool>> + Send;
}
