//! Replayable operator log of backup and restore operations.

pub mod base;
pub mod logger;
pub mod memory;
pub mod redis;

pub use base::{LOGS_CHANNEL, LogChannel, LogEntry, LogLevel};
pub use logger::OperationLogger;
