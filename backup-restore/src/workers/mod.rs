//! Interaction with the background worker fleet around an operation.

pub mod drain;
pub mod purge;
