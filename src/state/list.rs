//! List insertion and deletion selectors.

use serde::{Deserialize, Serialize};

use crate::context::Row;
use crate::error::ConfigurationError;

/// Row insertion applied together with a property merge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ListOperation {
    /// Insert before the current first row.
    AddFirst(Row),
    /// Append after the current last row.
    AddLast(Row),
}

/// Selects the single row removed by
/// [`ContextStore::delete_list_entry`](crate::state::ContextStore::delete_list_entry).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ListDeletion {
    /// The first row.
    First,
    /// The last row.
    Last,
    /// The row at a 0-based position.
    Index(usize),
    /// The first row whose `property` equals `value`.
    Where {
        /// Field to compare.
        property: String,
        /// Required value.
        value: String,
    },
}

impl ListDeletion {
    /// Parses an index given as text, e.g. after template rendering.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError::InvalidListIndex` for anything that is not
    /// an unsigned decimal integer, including negative numbers.
    pub fn index_from_str(raw: &str) -> Result<Self, ConfigurationError> {
        raw.trim()
            .parse::<usize>()
            .map(Self::Index)
            .map_err(|e| ConfigurationError::InvalidListIndex {
                value: raw.to_string(),
                reason: e.to_string(),
            })
    }

    /// Position of the selected row in `rows`, if it exists.
    #[must_use]
    pub fn position(&self, rows: &[Row]) -> Option<usize> {
        match self {
            Self::First => (!rows.is_empty()).then_some(0),
            Self::Last => rows.len().checked_sub(1),
            Self::Index(index) => (*index < rows.len()).then_some(*index),
            Self::Where { property, value } => rows
                .iter()
                .position(|row| row.get(property).is_some_and(|v| v == value)),
        }
    }
}
