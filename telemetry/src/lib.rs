//! Process-wide logging setup for the backup and restore binaries and tests.

pub mod tracing;
