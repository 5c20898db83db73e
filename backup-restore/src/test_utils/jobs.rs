use serde_json::json;
use uuid::Uuid;

use crate::jobs::base::{ALL_TENANTS_KEY, Job, TENANT_TAG_KEY};

fn job(queue: &str, first_arg: serde_json::Value) -> Job {
    Job {
        id: Uuid::new_v4().simple().to_string(),
        class: "Jobs::ProcessPost".to_string(),
        queue: Some(queue.to_string()),
        args: vec![first_arg],
        raw: None,
    }
}

/// Job tagged with `tenant`.
pub fn tenant_job(queue: &str, tenant: &str) -> Job {
    job(queue, json!({ TENANT_TAG_KEY: tenant, "post_id": 1 }))
}

/// Job carrying the all-tenants marker.
pub fn all_tenants_job(queue: &str) -> Job {
    job(queue, json!({ ALL_TENANTS_KEY: true }))
}

/// Job with no tenant information.
pub fn untagged_job(queue: &str) -> Job {
    job(queue, json!({ "post_id": 1 }))
}
