//! Atomic moves of application objects between database schemas.

pub mod base;
pub mod memory;
pub mod postgres;

pub use base::{BACKUP_SCHEMA, PUBLIC_SCHEMA, SchemaSwapper};
