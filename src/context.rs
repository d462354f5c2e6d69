//! The context entity.
//!
//! A [`Context`] is a small named unit of mutable state: string properties,
//! an ordered list of rows and an update counter. Only
//! [`ContextStore`](crate::state::ContextStore) mutates contexts; everyone
//! else works on owned snapshots.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::state::{ListDeletion, ListOperation};

/// One list entry: field name to value.
pub type Row = BTreeMap<String, String>;

/// Named mutable state tracked by the context store.
///
/// Cloning a context is a deep copy, which is what makes snapshots safe to
/// read while the store keeps writing.
///
/// # Examples
///
/// ```
/// use statekeeper::Context;
///
/// let ctx = Context::new("order-42");
/// assert_eq!(ctx.id(), "order-42");
/// assert_eq!(ctx.update_count(), 0);
/// assert!(ctx.properties().is_empty());
/// assert!(ctx.list().is_empty());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Context {
    id: String,
    #[serde(default)]
    properties: BTreeMap<String, String>,
    #[serde(default)]
    list: Vec<Row>,
    #[serde(default)]
    update_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expiry: Option<Duration>,
}

impl Context {
    /// Creates an empty context with `update_count == 0`.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            properties: BTreeMap::new(),
            list: Vec::new(),
            update_count: 0,
            expiry: None,
        }
    }

    /// The context id. Never changes after creation.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// All properties.
    #[must_use]
    pub const fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }

    /// A single property value.
    #[must_use]
    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties.get(name).map(String::as_str)
    }

    /// The ordered rows.
    #[must_use]
    pub fn list(&self) -> &[Row] {
        &self.list
    }

    /// Number of successful mutations since creation.
    #[must_use]
    pub const fn update_count(&self) -> u64 {
        self.update_count
    }

    /// TTL applied on the most recent write, if any.
    #[must_use]
    pub const fn expiry(&self) -> Option<Duration> {
        self.expiry
    }

    /// Model exposed to templates as `context`.
    ///
    /// Counters are rendered as strings, like every other template value.
    #[must_use]
    pub fn template_model(&self) -> serde_json::Value {
        json!({
            "id": self.id,
            "properties": self.properties,
            "list": self.list,
            "listSize": self.list.len().to_string(),
            "updateCount": self.update_count.to_string(),
        })
    }

    pub(crate) fn merge_properties<I>(&mut self, updates: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        self.properties.extend(updates);
    }

    pub(crate) fn apply_list_operation(&mut self, op: ListOperation) {
        match op {
            ListOperation::AddFirst(row) => self.list.insert(0, row),
            ListOperation::AddLast(row) => self.list.push(row),
        }
    }

    /// Removes the row selected by `deletion`, returning whether one was found.
    pub(crate) fn remove_row(&mut self, deletion: &ListDeletion) -> bool {
        match deletion.position(&self.list) {
            Some(index) => {
                self.list.remove(index);
                true
            }
            None => false,
        }
    }

    pub(crate) fn bump_update_count(&mut self) {
        self.update_count = self.update_count.saturating_add(1);
    }

    pub(crate) fn set_expiry(&mut self, expiry: Option<Duration>) {
        self.expiry = expiry;
    }
}
