//! Helpers for testing operations without a live worker fleet.
//!
//! - [`coordinator`] builds an [`crate::coordinator::OperationCoordinator`] over the
//!   in-memory backends and keeps handles on each of them.
//! - [`fault_store`] wraps a store to make chosen calls fail or panic.
//! - [`jobs`] builds job records tagged the way workers tag them.
//! - [`database`] spawns a throwaway Postgres database.

pub mod coordinator;
pub mod database;
#[cfg(feature = "failpoints")]
pub mod failpoints;
pub mod fault_store;
pub mod jobs;
