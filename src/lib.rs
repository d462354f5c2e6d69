//! # statekeeper - Keyed Mutable State with Predicate Matching
//!
//! statekeeper maintains small, named units of mutable state ("contexts")
//! and evaluates declarative conditions against them. Triggers from outside
//! (HTTP requests, messages, test steps) record, delete or match contexts;
//! the transport itself is not part of this crate.
//!
//! ## Core Concepts
//!
//! - **Context**: string properties, an ordered list of rows and an update
//!   counter, optionally expiring after a TTL that restarts on every write
//! - **ContextStore**: the sole writer; every read-modify-write is atomic per
//!   context id
//! - **StateMatcher**: renders matcher parameters against the request and the
//!   current context, then ANDs the configured predicates
//! - **KeyValueStore / TemplateRenderer**: injected collaborators, with an
//!   in-memory store and a path-substitution renderer bundled
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use serde_json::json;
//! use statekeeper::{
//!     Context, ContextStore, InMemoryStore, PathTemplateRenderer, RecordStateHandler,
//!     StateMatcher,
//! };
//!
//! # fn main() -> Result<(), statekeeper::StateError> {
//! let contexts = Arc::new(ContextStore::new(Arc::new(InMemoryStore::<Context>::new())));
//! let renderer = Arc::new(PathTemplateRenderer);
//!
//! let record = RecordStateHandler::new(Arc::clone(&contexts), renderer.clone());
//! record.handle(
//!     &json!({"request": {"id": "42"}}),
//!     &json!({"context": "order-{{request.id}}", "state": {"status": "paid"}}),
//! )?;
//!
//! let matcher = StateMatcher::new(Arc::clone(&contexts), renderer);
//! let outcome = matcher.match_request(
//!     &json!({"id": "42"}),
//!     &json!({
//!         "hasContext": "order-{{request.id}}",
//!         "property": {"status": {"equalTo": "paid"}},
//!     }),
//! )?;
//! assert!(outcome.is_match());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Core types
pub mod context;
pub mod error;
pub mod pattern;
pub mod template;
pub mod time;

// Storage and mutation
pub mod state;
pub mod storage;

// Matching and event entrypoints
pub mod events;
pub mod matcher;

// Ambient
pub mod config;
pub mod logging;

// Re-export primary types at crate root for convenience
pub use config::StateConfig;
pub use context::{Context, Row};
pub use error::{ConfigurationError, StateError, StateResult};
pub use events::{DeleteOutcome, DeleteStateHandler, RecordStateHandler};
pub use logging::{init_logging, LoggingConfig};
pub use matcher::{MatchOutcome, MatcherParameters, PredicateSet, StateMatcher};
pub use pattern::{PatternMatcher, PatternParser, StringPattern, StringPatternParser};
pub use state::{ContextStore, ListDeletion, ListOperation};
pub use storage::{ExpirySweeper, InMemoryStore, KeyValueStore, StorageError};
pub use template::{PathTemplateRenderer, TemplateNode, TemplateRenderer};
pub use time::{Clock, ManualClock, SystemClock};
