use std::future::Future;

use crate::error::BrResult;

/// Process-external key-value store shared by every worker process.
///
/// Implementations must make [`CoordinationStore::set_if_absent`] atomic: when several
/// processes race on the same key, exactly one of them observes `true`.
pub trait CoordinationStore {
    /// Returns the value stored under `key`.
    fn get(&self, key: &str) -> impl Future<Output = BrResult<Option<String>>> + Send;

    /// Stores `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &str) -> impl Future<Output = BrResult<()>> + Send;

    /// Stores `value` under `key` only when the key does not exist.
    ///
    /// Returns `true` when the value was written.
    fn set_if_absent(&self, key: &str, value: &str)
    -> impl Future<Output = BrResult<bool>> + Send;

    /// Deletes `key`, returning whether it existed.
    fn delete(&self, key: &str) -> impl Future<Output = BrResult<bool>> + Send;

    /// Returns every key starting with `prefix`.
    ///
    /// The result is a point-in-time listing and may miss keys written concurrently.
    fn keys(&self, prefix: &str) -> impl Future<Output = BrResult<Vec<String>>> + Send;
}
