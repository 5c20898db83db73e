//! Postgres helpers shared by the backup and restore crates.
//!
//! Holds catalog queries and DDL builders used to move application objects
//! between schemas, pool construction, and database lifecycle helpers for tests.

pub mod db;
pub mod schema;
#[cfg(feature = "test-utils")]
pub mod test_utils;
