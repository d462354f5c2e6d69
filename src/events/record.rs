//! Record handler: create or update one context.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::context::{Context, Row};
use crate::error::{ConfigurationError, StateResult};
use crate::state::{ContextStore, ListOperation};
use crate::template::TemplateRenderer;

use super::{lenient_seconds, parse, render_values};

/// Parameters of a record event.
///
/// ```json
/// {
///   "context": "{{request.pathSegments.[1]}}",
///   "state": {"status": "{{response.status}}"},
///   "list": {"addLast": {"id": "{{request.query.id}}"}},
///   "ttlSeconds": 300
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordParameters {
    /// Context id template.
    pub context: String,
    /// Property templates to merge.
    #[serde(default)]
    pub state: BTreeMap<String, Value>,
    /// Row to insert.
    #[serde(default)]
    pub list: Option<RecordListParameters>,
    /// Expiry countdown restarted by this write.
    #[serde(default, deserialize_with = "lenient_seconds")]
    pub ttl_seconds: Option<u64>,
}

/// Row insertion. At most one side may be given.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordListParameters {
    /// Row templates inserted at the front.
    #[serde(default)]
    pub add_first: Option<BTreeMap<String, Value>>,
    /// Row templates appended at the end.
    #[serde(default)]
    pub add_last: Option<BTreeMap<String, Value>>,
}

/// Applies record events to a [`ContextStore`].
#[derive(Debug, Clone)]
pub struct RecordStateHandler {
    contexts: Arc<ContextStore>,
    renderer: Arc<dyn TemplateRenderer>,
}

impl RecordStateHandler {
    /// Creates a handler writing to `contexts`.
    #[must_use]
    pub fn new(contexts: Arc<ContextStore>, renderer: Arc<dyn TemplateRenderer>) -> Self {
        Self { contexts, renderer }
    }

    /// Renders `parameters` against `model` and records the result.
    ///
    /// # Errors
    ///
    /// - Configuration error for malformed parameters (including both
    ///   `addFirst` and `addLast`), a template that cannot render, or an id
    ///   that renders empty
    /// - Storage error when the store fails
    pub fn handle(&self, model: &Value, parameters: &Value) -> StateResult<Context> {
        let params: RecordParameters = parse(parameters)?;
        let renderer = self.renderer.as_ref();

        let id = renderer.render(model, &params.context)?;
        let properties = render_values(renderer, model, &params.state)?;

        let list_operation = match params.list {
            None => None,
            Some(RecordListParameters {
                add_first: Some(_),
                add_last: Some(_),
            }) => {
                return Err(ConfigurationError::parameters(
                    "'list' must contain either 'addFirst' or 'addLast', not both",
                )
                .into());
            }
            Some(RecordListParameters {
                add_first: Some(row),
                add_last: None,
            }) => Some(ListOperation::AddFirst(render_row(renderer, model, &row)?)),
            Some(RecordListParameters {
                add_first: None,
                add_last: Some(row),
            }) => Some(ListOperation::AddLast(render_row(renderer, model, &row)?)),
            Some(RecordListParameters {
                add_first: None,
                add_last: None,
            }) => None,
        };

        let ttl = params.ttl_seconds.map(Duration::from_secs);
        let context = self.contexts.record_context(&id, properties, list_operation, ttl)?;
        debug!(context = %id, update_count = context.update_count(), "record event applied");
        Ok(context)
    }
}

fn render_row(
    renderer: &dyn TemplateRenderer,
    model: &Value,
    templates: &BTreeMap<String, Value>,
) -> StateResult<Row> {
    Ok(render_values(renderer, model, templates)?.into_iter().collect())
}
