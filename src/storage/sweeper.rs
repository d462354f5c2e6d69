//! Background expiry sweeper.
//!
//! [`InMemoryStore`] hides expired entries immediately but only frees them
//! when purged. The sweeper owns a dedicated worker thread that purges on a
//! fixed interval. Dropping the sweeper closes its control channel, which
//! wakes and stops the worker.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use tracing::{debug, warn};

use crate::config::StateConfig;
use crate::storage::memory::InMemoryStore;
use crate::storage::traits::StorageError;

/// Periodically purges expired entries from an [`InMemoryStore`].
#[derive(Debug)]
pub struct ExpirySweeper {
    stop_tx: Option<Sender<()>>,
    join: Option<JoinHandle<()>>,
}

impl ExpirySweeper {
    /// Start sweeping `store` every `interval`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::BackendError` if the worker thread cannot be
    /// spawned.
    pub fn spawn<V>(store: Arc<InMemoryStore<V>>, interval: Duration) -> Result<Self, StorageError>
    where
        V: Send + Sync + 'static,
    {
        let interval = interval.max(Duration::from_millis(1));
        let (stop_tx, stop_rx) = bounded::<()>(1);

        let join = thread::Builder::new()
            .name("statekeeper-sweeper".to_string())
            .spawn(move || loop {
                match stop_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => match store.purge_expired() {
                        Ok(0) => {}
                        Ok(purged) => debug!(purged, "expired contexts purged"),
                        Err(e) => warn!(error = %e, "expiry sweep failed"),
                    },
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            })
            .map_err(|e| StorageError::BackendError(format!("failed to spawn sweeper: {e}")))?;

        Ok(Self {
            stop_tx: Some(stop_tx),
            join: Some(join),
        })
    }

    /// Start sweeping `store` at the interval configured in `config`.
    ///
    /// Returns `Ok(None)` when no sweep interval is configured.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::BackendError` if the worker thread cannot be
    /// spawned.
    pub fn from_config<V>(
        store: Arc<InMemoryStore<V>>,
        config: &StateConfig,
    ) -> Result<Option<Self>, StorageError>
    where
        V: Send + Sync + 'static,
    {
        config
            .sweep_interval()
            .map(|interval| Self::spawn(store, interval))
            .transpose()
    }

    /// Stop the worker and wait for it to exit.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        // Dropping the sender disconnects the channel and wakes the worker.
        drop(self.stop_tx.take());
        if let Some(handle) = self.join.take() {
            // A panicked worker has nothing left to clean up.
            let _ = handle.join();
        }
    }
}

impl Drop for ExpirySweeper {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::storage::traits::KeyValueStore;
    use crate::time::{Clock, ManualClock};

    #[test]
    fn sweeper_purges_expired_entries() {
        let clock = Arc::new(ManualClock::starting_now());
        let store = Arc::new(InMemoryStore::<String>::with_clock(
            Arc::clone(&clock) as Arc<dyn Clock>
        ));
        store
            .put("a", "1".to_string(), Some(Duration::from_secs(1)))
            .unwrap();
        clock.advance(Duration::from_secs(2));

        let sweeper = ExpirySweeper::spawn(Arc::clone(&store), Duration::from_millis(5)).unwrap();

        let mut purged = false;
        for _ in 0..400 {
            if store.slot_count() == 0 {
                purged = true;
                break;
            }
            thread::sleep(Duration::from_millis(5));
        }
        sweeper.stop();
        assert!(purged);
    }

    #[test]
    fn config_without_interval_spawns_nothing() {
        let store = Arc::new(InMemoryStore::<String>::new());
        let config = StateConfig {
            sweep_interval_ms: Some(0),
            ..StateConfig::default()
        };
        assert!(ExpirySweeper::from_config(Arc::clone(&store), &StateConfig::default())
            .unwrap()
            .is_none());
        assert!(ExpirySweeper::from_config(Arc::clone(&store), &config)
            .unwrap()
            .is_none());
        assert_eq!(Arc::strong_count(&store), 1);
    }

    #[test]
    fn configured_interval_purges() {
        let clock = Arc::new(ManualClock::starting_now());
        let store = Arc::new(InMemoryStore::<String>::with_clock(
            Arc::clone(&clock) as Arc<dyn Clock>
        ));
        store
            .put("a", "1".to_string(), Some(Duration::from_secs(1)))
            .unwrap();
        clock.advance(Duration::from_secs(2));

        let config = StateConfig {
            sweep_interval_ms: Some(5),
            ..StateConfig::default()
        };
        let sweeper = ExpirySweeper::from_config(Arc::clone(&store), &config)
            .unwrap()
            .unwrap();
        for _ in 0..400 {
            if store.slot_count() == 0 {
                break;
            }
            thread::sleep(Duration::from_millis(5));
        }
        sweeper.stop();
        assert_eq!(store.slot_count(), 0);
    }

    #[test]
    fn dropping_sweeper_stops_worker() {
        let store = Arc::new(InMemoryStore::<String>::new());
        let sweeper = ExpirySweeper::spawn(Arc::clone(&store), Duration::from_secs(3600)).unwrap();
        drop(sweeper);
        // The worker held the only other reference.
        assert_eq!(Arc::strong_count(&store), 1);
    }
}
