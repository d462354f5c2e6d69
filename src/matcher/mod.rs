//! Context matching.
//!
//! [`StateMatcher::match_request`] is the full pipeline: render the context
//! id, read a snapshot, render the whole parameter tree again with the
//! snapshot in the model, re-parse it and evaluate. [`StateMatcher::exists`]
//! and [`StateMatcher::evaluate`] expose the two halves separately.
//!
//! No context lock is held while templates render; evaluation only ever sees
//! an owned snapshot.

mod evaluator;
mod predicates;

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{debug, info};

use crate::context::Context;
use crate::error::StateResult;
use crate::pattern::{PatternParser, StringPatternParser};
use crate::state::ContextStore;
use crate::template::{render_json, TemplateRenderer};

pub use evaluator::{Comparison, ConditionKind, FieldPatterns, Predicate, PredicateSet};
pub use predicates::{ContextConditions, ListConditions, ListPosition, MatcherParameters, PatternConfig};

/// Outcome of matching a request against state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchOutcome {
    /// Conditions not satisfied.
    NoMatch,
    /// Conditions satisfied.
    Match,
}

impl MatchOutcome {
    /// Returns true for [`MatchOutcome::Match`].
    #[must_use]
    pub const fn is_match(self) -> bool {
        matches!(self, Self::Match)
    }

    const fn from_bool(matched: bool) -> Self {
        if matched {
            Self::Match
        } else {
            Self::NoMatch
        }
    }
}

/// Evaluates matcher parameters against the context store.
#[derive(Debug, Clone)]
pub struct StateMatcher {
    contexts: Arc<ContextStore>,
    renderer: Arc<dyn TemplateRenderer>,
    patterns: Arc<dyn PatternParser>,
}

impl StateMatcher {
    /// Creates a matcher reading from `contexts`, with
    /// [`StringPatternParser`] for pattern descriptors.
    #[must_use]
    pub fn new(contexts: Arc<ContextStore>, renderer: Arc<dyn TemplateRenderer>) -> Self {
        Self {
            contexts,
            renderer,
            patterns: Arc::new(StringPatternParser),
        }
    }

    /// Replaces the pattern parser.
    #[must_use]
    pub fn with_pattern_parser(mut self, patterns: Arc<dyn PatternParser>) -> Self {
        self.patterns = patterns;
        self
    }

    /// Returns true if context `id` currently exists.
    ///
    /// # Errors
    ///
    /// Configuration error for an empty id, storage error when the store
    /// fails.
    pub fn exists(&self, id: &str) -> StateResult<bool> {
        self.contexts.has_context(id)
    }

    /// Returns true if every predicate holds for `context`.
    #[must_use]
    pub fn evaluate(&self, predicates: &PredicateSet, context: &Context) -> bool {
        predicates.evaluate(context)
    }

    /// Matches `request` (exposed to templates as `request`) against state.
    ///
    /// With `hasNotContext`, matches when the rendered id does not exist.
    /// With `hasContext`, the context must exist and, when conditions are
    /// configured, all of them must hold; the configuration is rendered a
    /// second time with the context exposed as `context` before parsing.
    ///
    /// # Errors
    ///
    /// - Configuration error for malformed parameters, templates or
    ///   patterns, or when the id renders to an empty string
    /// - Storage error when the store fails
    pub fn match_request(&self, request: &Value, parameters: &Value) -> StateResult<MatchOutcome> {
        let mut model = json!({ "request": request });

        match MatcherParameters::from_json(parameters)? {
            MatcherParameters::HasNotContext(template) => {
                let id = self.renderer.render(&model, &template)?;
                if self.contexts.has_context(&id)? {
                    return Ok(MatchOutcome::NoMatch);
                }
                info!(context = %id, "hasNotContext matched");
                Ok(MatchOutcome::Match)
            }
            MatcherParameters::HasContext(template) => {
                let id = self.renderer.render(&model, &template)?;
                let Some(context) = self.contexts.get_context(&id)? else {
                    debug!(context = %id, "context does not exist");
                    return Ok(MatchOutcome::NoMatch);
                };

                model["context"] = context.template_model();
                let rendered = render_json(self.renderer.as_ref(), &model, parameters)?;
                let conditions = ContextConditions::from_json(&rendered)?;
                let predicates = PredicateSet::from_conditions_with(&conditions, self.patterns.as_ref())?;

                if predicates.is_empty() {
                    info!(context = %id, "hasContext matched");
                    return Ok(MatchOutcome::Match);
                }
                let matched = self.evaluate(&predicates, &context);
                debug!(context = %id, predicates = predicates.len(), matched, "context evaluated");
                Ok(MatchOutcome::from_bool(matched))
            }
        }
    }
}
