//! Shared key-value store holding cross-process coordination flags.

pub mod base;
pub mod memory;
pub mod redis;
pub mod tenant;

pub use base::CoordinationStore;
