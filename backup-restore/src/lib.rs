//! Orchestration core for exclusive, cancellable backup and restore operations.
//!
//! An operation owns its tenant for its whole lifetime: it claims a running flag in the
//! shared [`store`], moves the system into maintenance through [`mode`], waits for
//! in-flight background jobs in [`workers`], runs the caller's data transfer, and always
//! restores the prior system state before releasing the flag. The [`schema`] module
//! provides the atomic schema swap used to snapshot and roll back the dataset, and
//! [`logs`] carries the replayable operator log.
//!
//! [`coordinator::OperationCoordinator`] is the entry point tying these together.

mod macros;

pub mod concurrency;
pub mod coordinator;
pub mod error;
#[cfg(feature = "failpoints")]
pub mod failpoints;
pub mod jobs;
pub mod logs;
pub mod mode;
pub mod redis;
pub mod schema;
pub mod store;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod types;
pub mod workers;
