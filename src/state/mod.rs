//! The context store and its mutation protocol.
//!
//! [`ContextStore`] owns the mapping from context id to [`Context`] on top of
//! an injected [`KeyValueStore`]. Every read-modify-write runs under a per-id
//! lock so concurrent writers to the same id never lose updates, while writers
//! to different ids proceed independently.
//!
//! Per-id serialization covers writers going through the same
//! `ContextStore`. Share one instance (it is `Send + Sync`) instead of
//! building several over the same backend.

mod list;
mod locks;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use regex::Regex;
use tracing::debug;

use crate::config::StateConfig;
use crate::context::Context;
use crate::error::{ConfigurationError, StateResult};
use crate::storage::{ExpirySweeper, InMemoryStore, KeyValueStore};
use crate::time::add_duration;

pub use list::{ListDeletion, ListOperation};

use locks::KeyLocks;

fn validate_id(id: &str) -> Result<(), ConfigurationError> {
    if id.is_empty() {
        return Err(ConfigurationError::EmptyContextId);
    }
    Ok(())
}

fn validate_ttl(ttl: Option<Duration>) -> Result<(), ConfigurationError> {
    match ttl {
        Some(ttl) if add_duration(Utc::now(), ttl).is_none() => Err(ConfigurationError::InvalidTtl {
            ttl,
            reason: "expiry is out of range".to_string(),
        }),
        _ => Ok(()),
    }
}

/// Compiles `pattern` so that it only accepts whole ids.
pub(crate) fn full_match_regex(pattern: &str) -> Result<Regex, ConfigurationError> {
    Regex::new(&format!("^(?:{pattern})$")).map_err(|e| ConfigurationError::InvalidRegex {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })
}

/// Sole writer of contexts.
pub struct ContextStore {
    store: Arc<dyn KeyValueStore<Context>>,
    locks: KeyLocks,
    default_ttl: Option<Duration>,
}

impl std::fmt::Debug for ContextStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextStore")
            .field("locks", &self.locks)
            .field("default_ttl", &self.default_ttl)
            .finish_non_exhaustive()
    }
}

impl ContextStore {
    /// Create a context store on top of `store`.
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore<Context>>) -> Self {
        Self {
            store,
            locks: KeyLocks::new(),
            default_ttl: None,
        }
    }

    /// Create a context store using the settings in `config`.
    #[must_use]
    pub fn with_config(store: Arc<dyn KeyValueStore<Context>>, config: &StateConfig) -> Self {
        Self {
            default_ttl: config.default_ttl(),
            ..Self::new(store)
        }
    }

    /// Create a context store over a fresh [`InMemoryStore`] configured by
    /// `config`, together with its expiry sweeper when `sweep_interval_ms`
    /// is set. Dropping the sweeper stops it.
    ///
    /// # Errors
    ///
    /// Returns `StorageUnavailable` if the sweeper thread cannot be spawned.
    pub fn in_memory(config: &StateConfig) -> StateResult<(Self, Option<ExpirySweeper>)> {
        let store = Arc::new(InMemoryStore::<Context>::new());
        let sweeper = ExpirySweeper::from_config(Arc::clone(&store), config)?;
        Ok((Self::with_config(store, config), sweeper))
    }

    /// Create or update the context `id`.
    ///
    /// `properties` are merged into the existing ones (added or overwritten,
    /// never removed) and `list_operation` inserts one row. A brand-new
    /// context starts with `update_count == 0`; every later call bumps it by
    /// one. The entry is re-stored with `ttl` (or the configured default),
    /// restarting its expiry countdown; with neither, it never expires.
    ///
    /// # Errors
    ///
    /// - `Configuration(EmptyContextId)` when `id` is empty, before anything
    ///   is read or written
    /// - `Configuration(InvalidTtl)` when the expiry cannot be represented
    /// - `StorageUnavailable` when the backend fails
    pub fn record_context<I>(
        &self,
        id: &str,
        properties: I,
        list_operation: Option<ListOperation>,
        ttl: Option<Duration>,
    ) -> StateResult<Context>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        validate_id(id)?;
        let ttl = ttl.or(self.default_ttl);
        validate_ttl(ttl)?;

        let _guard = self.locks.lock(id)?;
        let mut context = match self.store.get(id)? {
            Some(mut existing) => {
                existing.bump_update_count();
                existing
            }
            None => Context::new(id),
        };

        context.merge_properties(properties);
        if let Some(op) = list_operation {
            context.apply_list_operation(op);
        }
        context.set_expiry(ttl);

        self.store.put(id, context.clone(), ttl)?;
        debug!(
            context = %id,
            update_count = context.update_count(),
            list_size = context.list().len(),
            "context recorded"
        );
        Ok(context)
    }

    /// Remove the context `id`. Absent ids are a no-op.
    ///
    /// # Errors
    ///
    /// `Configuration(EmptyContextId)` for an empty id, `StorageUnavailable`
    /// when the backend fails.
    pub fn delete_context(&self, id: &str) -> StateResult<()> {
        validate_id(id)?;
        let _guard = self.locks.lock(id)?;
        self.store.remove(id)?;
        debug!(context = %id, "context deleted");
        Ok(())
    }

    /// Remove every listed context, skipping absent ones.
    ///
    /// All ids are validated before the first removal.
    ///
    /// # Errors
    ///
    /// See [`ContextStore::delete_context`].
    pub fn delete_contexts<I, S>(&self, ids: I) -> StateResult<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let ids: Vec<S> = ids.into_iter().collect();
        for id in &ids {
            validate_id(id.as_ref())?;
        }
        for id in &ids {
            self.delete_context(id.as_ref())?;
        }
        Ok(())
    }

    /// Remove every context whose whole id matches the regular expression
    /// `pattern`, returning how many ids were matched.
    ///
    /// Ids are enumerated once up front; contexts created after enumeration
    /// are left alone.
    ///
    /// # Errors
    ///
    /// `Configuration(InvalidRegex)` when `pattern` does not compile,
    /// `StorageUnavailable` when the backend fails.
    pub fn delete_contexts_matching(&self, pattern: &str) -> StateResult<usize> {
        let regex = full_match_regex(pattern)?;

        let mut deleted = 0;
        for id in self.store.keys()? {
            if !regex.is_match(&id) {
                continue;
            }
            let _guard = self.locks.lock(&id)?;
            self.store.remove(&id)?;
            deleted += 1;
        }
        debug!(pattern, deleted, "contexts deleted by pattern");
        Ok(deleted)
    }

    /// Remove one row from the list of context `id`.
    ///
    /// Returns whether a row was removed. When one is, `update_count` is
    /// bumped and the expiry countdown restarts with the context's TTL. An
    /// absent context, an out-of-range index or an unmatched `Where` is a
    /// no-op. The context itself survives even if its list becomes empty.
    ///
    /// # Errors
    ///
    /// `Configuration(EmptyContextId)` for an empty id, `StorageUnavailable`
    /// when the backend fails.
    pub fn delete_list_entry(&self, id: &str, deletion: &ListDeletion) -> StateResult<bool> {
        validate_id(id)?;

        let _guard = self.locks.lock(id)?;
        let Some(mut context) = self.store.get(id)? else {
            return Ok(false);
        };
        if !context.remove_row(deletion) {
            debug!(context = %id, ?deletion, "list entry does not exist");
            return Ok(false);
        }

        context.bump_update_count();
        let ttl = context.expiry();
        let update_count = context.update_count();
        self.store.put(id, context, ttl)?;
        debug!(context = %id, update_count, ?deletion, "list entry deleted");
        Ok(true)
    }

    /// Snapshot of context `id`, or `None` when it does not exist.
    ///
    /// The returned value is an independent copy; later writes never show
    /// through it.
    ///
    /// # Errors
    ///
    /// `Configuration(EmptyContextId)` for an empty id, `StorageUnavailable`
    /// when the backend fails.
    pub fn get_context(&self, id: &str) -> StateResult<Option<Context>> {
        validate_id(id)?;
        Ok(self.store.get(id)?)
    }

    /// Returns true if context `id` currently exists.
    ///
    /// # Errors
    ///
    /// See [`ContextStore::get_context`].
    pub fn has_context(&self, id: &str) -> StateResult<bool> {
        Ok(self.get_context(id)?.is_some())
    }

    /// Snapshot of every live context, keyed by id.
    ///
    /// # Errors
    ///
    /// `StorageUnavailable` when the backend fails.
    pub fn snapshot_all(&self) -> StateResult<BTreeMap<String, Context>> {
        let mut out = BTreeMap::new();
        for id in self.store.keys()? {
            // Skip ids removed or expired since enumeration.
            if let Some(context) = self.store.get(&id)? {
                out.insert(id, context);
            }
        }
        Ok(out)
    }
}
