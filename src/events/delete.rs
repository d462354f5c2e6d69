//! Delete handler: remove contexts or single list rows.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::error::{ConfigurationError, StateResult};
use crate::state::{ContextStore, ListDeletion};
use crate::template::TemplateRenderer;

use super::{leaf_text, lenient_bool, parse};

/// Parameters of a delete event. Exactly one of `context`, `contexts` and
/// `contextsMatching` must be given; `list` only applies to `context`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteParameters {
    /// Single context id template.
    #[serde(default)]
    pub context: Option<String>,
    /// Context id templates.
    #[serde(default)]
    pub contexts: Option<Vec<String>>,
    /// Regex template matched against whole ids.
    #[serde(default)]
    pub contexts_matching: Option<String>,
    /// Row to delete instead of the whole context.
    #[serde(default)]
    pub list: Option<DeleteListParameters>,
}

/// Row selection. Exactly one selector must be given.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteListParameters {
    /// Delete the first row.
    #[serde(default, deserialize_with = "lenient_bool")]
    pub delete_first: bool,
    /// Delete the last row.
    #[serde(default, deserialize_with = "lenient_bool")]
    pub delete_last: bool,
    /// Template of a 0-based index.
    #[serde(default)]
    pub delete_index: Option<Value>,
    /// Delete the first row with a matching field.
    #[serde(default)]
    pub delete_where: Option<DeleteWhere>,
}

/// Field and value templates of a `deleteWhere` selector.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DeleteWhere {
    /// Field name template.
    pub property: String,
    /// Value template.
    pub value: String,
}

/// What a delete event did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// A single context was removed (or was already absent).
    Context,
    /// The listed contexts were removed; holds the number of ids given.
    Contexts(usize),
    /// Contexts removed by pattern; holds how many matched.
    Matching(usize),
    /// A row deletion ran; holds whether a row was removed.
    ListEntry(bool),
}

/// Applies delete events to a [`ContextStore`].
#[derive(Debug, Clone)]
pub struct DeleteStateHandler {
    contexts: Arc<ContextStore>,
    renderer: Arc<dyn TemplateRenderer>,
}

impl DeleteStateHandler {
    /// Creates a handler deleting from `contexts`.
    #[must_use]
    pub fn new(contexts: Arc<ContextStore>, renderer: Arc<dyn TemplateRenderer>) -> Self {
        Self { contexts, renderer }
    }

    /// Renders `parameters` against `model` and applies the deletion.
    ///
    /// # Errors
    ///
    /// - Configuration error for malformed or ambiguous parameters, an index
    ///   that is not an unsigned integer, an invalid regex, or a template
    ///   that cannot render
    /// - Storage error when the store fails
    pub fn handle(&self, model: &Value, parameters: &Value) -> StateResult<DeleteOutcome> {
        let params: DeleteParameters = parse(parameters)?;
        let renderer = self.renderer.as_ref();

        match (params.context, params.contexts, params.contexts_matching) {
            (Some(context), None, None) => {
                let id = renderer.render(model, &context)?;
                match params.list {
                    Some(list) => {
                        let deletion = self.list_deletion(model, &list)?;
                        let removed = self.contexts.delete_list_entry(&id, &deletion)?;
                        Ok(DeleteOutcome::ListEntry(removed))
                    }
                    None => {
                        self.contexts.delete_context(&id)?;
                        Ok(DeleteOutcome::Context)
                    }
                }
            }
            (None, Some(contexts), None) => {
                reject_list(params.list.as_ref(), "contexts")?;
                let ids = contexts
                    .iter()
                    .map(|c| renderer.render(model, c))
                    .collect::<StateResult<Vec<_>>>()?;
                self.contexts.delete_contexts(&ids)?;
                debug!(count = ids.len(), "delete event applied to listed contexts");
                Ok(DeleteOutcome::Contexts(ids.len()))
            }
            (None, None, Some(pattern)) => {
                reject_list(params.list.as_ref(), "contextsMatching")?;
                let pattern = renderer.render(model, &pattern)?;
                Ok(DeleteOutcome::Matching(
                    self.contexts.delete_contexts_matching(&pattern)?,
                ))
            }
            _ => Err(ConfigurationError::parameters(
                "Missing/invalid configuration for context deletion: exactly one of 'context', 'contexts' or 'contextsMatching' is required",
            )
            .into()),
        }
    }

    fn list_deletion(&self, model: &Value, list: &DeleteListParameters) -> StateResult<ListDeletion> {
        let renderer = self.renderer.as_ref();
        let selectors = usize::from(list.delete_first)
            + usize::from(list.delete_last)
            + usize::from(list.delete_index.is_some())
            + usize::from(list.delete_where.is_some());
        if selectors != 1 {
            return Err(ConfigurationError::parameters(
                "'list' must contain exactly one of 'deleteFirst', 'deleteLast', 'deleteIndex' or 'deleteWhere'",
            )
            .into());
        }

        if list.delete_first {
            return Ok(ListDeletion::First);
        }
        if list.delete_last {
            return Ok(ListDeletion::Last);
        }
        if let Some(index) = &list.delete_index {
            let rendered = renderer.render(model, &leaf_text("deleteIndex", index)?)?;
            return Ok(ListDeletion::index_from_str(&rendered)?);
        }
        match &list.delete_where {
            Some(DeleteWhere { property, value }) => Ok(ListDeletion::Where {
                property: renderer.render(model, property)?,
                value: renderer.render(model, value)?,
            }),
            None => Err(ConfigurationError::parameters("'list' has no selector").into()),
        }
    }
}

fn reject_list(list: Option<&DeleteListParameters>, key: &str) -> Result<(), ConfigurationError> {
    if list.is_some() {
        return Err(ConfigurationError::parameters(format!(
            "'list' can only be combined with 'context', not '{key}'"
        )));
    }
    Ok(())
}
