//! Key-value storage layer.
//!
//! [`KeyValueStore`] is the abstract interface the context store is built on;
//! [`InMemoryStore`] and [`ExpirySweeper`] are the bundled backend.

mod memory;
mod sweeper;
mod traits;

pub use memory::InMemoryStore;
pub use sweeper::ExpirySweeper;
pub use traits::{KeyValueStore, StorageError};
