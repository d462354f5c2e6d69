//! Error types for statekeeper.
//!
//! Errors are strongly typed using thiserror. Only two conditions are ever
//! surfaced to callers: malformed configuration and an unavailable store.
//! Absent contexts and out-of-range list positions are ordinary values
//! (`None`, `false`, no-op) and never appear here.

use thiserror::Error;

use crate::storage::StorageError;

/// Malformed or self-contradictory mutation/predicate configuration.
///
/// Raised before any state is touched, so a configuration error never leaves
/// a partial mutation behind.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("Context id cannot be empty")]
    EmptyContextId,

    #[error("Invalid list index '{value}': {reason}")]
    InvalidListIndex {
        value: String,
        reason: String,
    },

    #[error("Cannot create pattern matcher: {reason}")]
    InvalidPattern {
        reason: String,
    },

    #[error("Invalid regex '{pattern}': {reason}")]
    InvalidRegex {
        pattern: String,
        reason: String,
    },

    #[error("Invalid ttl {ttl:?}: {reason}")]
    InvalidTtl {
        ttl: std::time::Duration,
        reason: String,
    },

    #[error("Invalid parameters: {reason}")]
    InvalidParameters {
        reason: String,
    },

    #[error("Cannot render template '{template}': {reason}")]
    Template {
        template: String,
        reason: String,
    },

    #[error("Invalid configuration: {reason}")]
    InvalidConfig {
        reason: String,
    },
}

impl ConfigurationError {
    /// Creates an invalid-parameters error.
    #[must_use]
    pub fn parameters(reason: impl Into<String>) -> Self {
        Self::InvalidParameters {
            reason: reason.into(),
        }
    }
}

/// Top-level error type for statekeeper.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(#[from] StorageError),

    #[error("Internal error: {message}")]
    Internal {
        message: String,
    },
}

impl StateError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true if this is a configuration error.
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }

    /// Returns true if the underlying store failed.
    #[must_use]
    pub const fn is_storage(&self) -> bool {
        matches!(self, Self::StorageUnavailable(_))
    }

    /// Returns true if this is an internal error.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(self, Self::Internal { .. })
    }

    /// Returns true if retrying the same call might succeed.
    ///
    /// No retry happens inside this crate; the hint is for the caller.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Configuration(_) | Self::Internal { .. } => false,
            Self::StorageUnavailable(e) => matches!(e, StorageError::Unavailable(_)),
        }
    }
}

/// Result type alias for statekeeper operations.
pub type StateResult<T> = Result<T, StateError>;
