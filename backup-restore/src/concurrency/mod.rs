//! Cooperative cancellation shared between the coordinator and long-running steps.

pub mod cancellation;
