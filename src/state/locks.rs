//! Per-key mutual exclusion.
//!
//! A slot exists only while some caller holds or waits for its key; the last
//! guard out removes it, so the table stays as small as the set of ids under
//! concurrent mutation. The table mutex is held only to find or drop a slot,
//! never while a key is held, so different keys never wait on each other.

use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex, PoisonError};

use crate::error::{StateError, StateResult};

#[derive(Debug, Default)]
struct KeySlot {
    held: Mutex<bool>,
    released: Condvar,
}

/// Table of per-key locks.
#[derive(Debug, Default)]
pub(crate) struct KeyLocks {
    slots: Mutex<HashMap<String, Arc<KeySlot>>>,
}

/// Exclusive hold on one key; released on drop.
#[derive(Debug)]
pub(crate) struct KeyGuard<'a> {
    locks: &'a KeyLocks,
    key: String,
    slot: Arc<KeySlot>,
}

impl KeyLocks {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Blocks until `key` is free, then holds it.
    pub(crate) fn lock(&self, key: &str) -> StateResult<KeyGuard<'_>> {
        let slot = {
            let mut slots = self
                .slots
                .lock()
                .map_err(|_| StateError::internal("key lock table poisoned"))?;
            Arc::clone(slots.entry(key.to_string()).or_default())
        };

        {
            let mut held = slot
                .held
                .lock()
                .map_err(|_| StateError::internal("key lock poisoned"))?;
            while *held {
                held = slot
                    .released
                    .wait(held)
                    .map_err(|_| StateError::internal("key lock poisoned"))?;
            }
            *held = true;
        }

        Ok(KeyGuard {
            locks: self,
            key: key.to_string(),
            slot,
        })
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.slots.lock().map_or(0, |slots| slots.len())
    }
}

impl Drop for KeyGuard<'_> {
    fn drop(&mut self) {
        *self
            .slot
            .held
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = false;
        self.slot.released.notify_one();

        let mut slots = self
            .locks
            .slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        // Slots are only cloned under the table lock: two references (table
        // and this guard) mean nobody else is waiting.
        if Arc::strong_count(&self.slot) == 2 {
            slots.remove(&self.key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn slots_are_dropped_after_release() {
        let locks = KeyLocks::new();
        {
            let _a = locks.lock("a").unwrap();
            let _b = locks.lock("b").unwrap();
            assert_eq!(locks.len(), 2);
        }
        assert_eq!(locks.len(), 0);
    }

    #[test]
    fn same_key_is_exclusive() {
        let locks = Arc::new(KeyLocks::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let max_inside = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let locks = Arc::clone(&locks);
                let inside = Arc::clone(&inside);
                let max_inside = Arc::clone(&max_inside);
                thread::spawn(move || {
                    for _ in 0..20 {
                        let _guard = locks.lock("shared").unwrap();
                        let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                        max_inside.fetch_max(now, Ordering::SeqCst);
                        thread::sleep(Duration::from_micros(50));
                        inside.fetch_sub(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
        assert_eq!(locks.len(), 0);
    }

    #[test]
    fn different_keys_do_not_block() {
        let locks = KeyLocks::new();
        let _a = locks.lock("a").unwrap();
        // Would deadlock if keys shared a lock.
        let _b = locks.lock("b").unwrap();
    }
}
