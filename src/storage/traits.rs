//! Abstract key-value store contract.
//!
//! The context store never talks to a concrete backend; it goes through
//! [`KeyValueStore`]. Backends only need single-key atomicity. Per-id
//! read-modify-write serialization is layered on top by
//! [`ContextStore`](crate::state::ContextStore).

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur during storage operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    /// The backend cannot serve requests right now.
    #[error("Storage backend unavailable: {0}")]
    Unavailable(String),

    /// Backend error.
    #[error("Storage backend error: {0}")]
    BackendError(String),
}

/// Storage trait for TTL-capable key-value backends.
///
/// # Safety Considerations
/// - Every single-key call must be atomic
/// - Implementations should handle concurrent access safely
/// - An expired entry must behave exactly like an absent one
pub trait KeyValueStore<V>: Send + Sync {
    /// Get the value stored under `key`, if any.
    fn get(&self, key: &str) -> Result<Option<V>, StorageError>;

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// With `ttl`, the entry is evicted once `ttl` has elapsed from this call.
    /// Without it, any previous expiry is cleared.
    fn put(&self, key: &str, value: V, ttl: Option<Duration>) -> Result<(), StorageError>;

    /// Remove `key`. Removing an absent key is not an error.
    fn remove(&self, key: &str) -> Result<(), StorageError>;

    /// Snapshot of all live keys, in no particular order.
    fn keys(&self) -> Result<Vec<String>, StorageError>;
}
