//! In-memory storage backend.
//!
//! This module provides a thread-safe in-memory implementation of
//! [`KeyValueStore`] with per-entry expiry. It is intended for embedded
//! usage, tests, and as a reference implementation.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::storage::traits::{KeyValueStore, StorageError};
use crate::time::{add_duration, Clock, SystemClock};

fn lock_err(context: &'static str) -> StorageError {
    StorageError::BackendError(format!("poisoned lock: {context}"))
}

#[derive(Debug, Clone)]
struct Slot<V> {
    value: V,
    expires_at: Option<DateTime<Utc>>,
}

impl<V> Slot<V> {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map_or(true, |at| now < at)
    }
}

/// Thread-safe in-memory key-value store with TTL support.
///
/// Expired entries are invisible to `get` and `keys` as soon as their
/// deadline passes; the memory is reclaimed by [`InMemoryStore::purge_expired`]
/// (called by [`ExpirySweeper`](crate::storage::ExpirySweeper), or lazily on
/// the next write to the same key).
pub struct InMemoryStore<V> {
    slots: RwLock<HashMap<String, Slot<V>>>,
    clock: Arc<dyn Clock>,
}

impl<V> fmt::Debug for InMemoryStore<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryStore")
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

impl<V> Default for InMemoryStore<V> {
    fn default() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }
}

impl<V> InMemoryStore<V> {
    /// Create a new empty store using the system clock.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new empty store that reads time from `clock`.
    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            slots: RwLock::new(HashMap::new()),
            clock,
        }
    }

    /// Number of live entries.
    pub fn len(&self) -> Result<usize, StorageError> {
        let now = self.clock.now();
        let slots = self.slots.read().map_err(|_| lock_err("memory.len"))?;
        Ok(slots.values().filter(|s| s.is_live(now)).count())
    }

    /// Returns true if no live entry remains.
    pub fn is_empty(&self) -> Result<bool, StorageError> {
        Ok(self.len()? == 0)
    }

    /// Physically drop every expired entry, returning how many were removed.
    pub fn purge_expired(&self) -> Result<usize, StorageError> {
        let now = self.clock.now();
        let mut slots = self
            .slots
            .write()
            .map_err(|_| lock_err("memory.purge_expired"))?;
        let before = slots.len();
        slots.retain(|_, slot| slot.is_live(now));
        Ok(before - slots.len())
    }

    #[cfg(test)]
    pub(crate) fn slot_count(&self) -> usize {
        self.slots.read().map_or(0, |slots| slots.len())
    }
}

impl<V> KeyValueStore<V> for InMemoryStore<V>
where
    V: Clone + Send + Sync,
{
    fn get(&self, key: &str) -> Result<Option<V>, StorageError> {
        let now = self.clock.now();
        let slots = self.slots.read().map_err(|_| lock_err("memory.get"))?;
        Ok(slots
            .get(key)
            .filter(|slot| slot.is_live(now))
            .map(|slot| slot.value.clone()))
    }

    fn put(&self, key: &str, value: V, ttl: Option<Duration>) -> Result<(), StorageError> {
        let expires_at = match ttl {
            None => None,
            Some(ttl) => Some(add_duration(self.clock.now(), ttl).ok_or_else(|| {
                StorageError::BackendError(format!("ttl out of range: {ttl:?}"))
            })?),
        };

        let mut slots = self.slots.write().map_err(|_| lock_err("memory.put"))?;
        slots.insert(key.to_string(), Slot { value, expires_at });
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut slots = self.slots.write().map_err(|_| lock_err("memory.remove"))?;
        slots.remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        let now = self.clock.now();
        let slots = self.slots.read().map_err(|_| lock_err("memory.keys"))?;
        Ok(slots
            .iter()
            .filter(|(_, slot)| slot.is_live(now))
            .map(|(key, _)| key.clone())
            .collect())
    }
}
