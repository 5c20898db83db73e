//! Read and delete access to the background job system.

pub mod base;
pub mod memory;
pub mod redis;

pub use base::{ALL_TENANTS_KEY, Job, JobRegistry, JobSet, TENANT_TAG_KEY};
