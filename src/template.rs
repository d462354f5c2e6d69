//! Template rendering.
//!
//! Matching and event handling treat rendering as an opaque capability,
//! [`TemplateRenderer`]. The crate ships [`PathTemplateRenderer`], which
//! substitutes `{{ dotted.path }}` placeholders from a JSON model, and
//! [`TemplateNode`], which applies a renderer to every key and leaf of a
//! configuration tree.

use std::collections::BTreeMap;
use std::fmt;

use serde_json::Value;

use crate::error::{ConfigurationError, StateResult};

/// Renders one template string against a model.
///
/// Implementations must be safe on untrusted text and must not mutate the
/// model.
pub trait TemplateRenderer: Send + Sync + fmt::Debug {
    /// Renders `template` using `model`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the template cannot be rendered.
    fn render(&self, model: &Value, template: &str) -> StateResult<String>;
}

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

/// Substitutes `{{ path }}` placeholders with values from the model.
///
/// A path is a dot-separated list of object keys and array indexes, where an
/// index is written `[n]` or plain `n`:
///
/// ```
/// use serde_json::json;
/// use statekeeper::{PathTemplateRenderer, TemplateRenderer};
///
/// let model = json!({"request": {"pathSegments": ["orders", "42"]}});
/// let out = PathTemplateRenderer
///     .render(&model, "order-{{ request.pathSegments.[1] }}")
///     .unwrap();
/// assert_eq!(out, "order-42");
/// ```
///
/// Strings are inserted raw, other scalars through their display form and
/// arrays or objects as compact JSON. A path that resolves to nothing (or to
/// `null`) renders as the empty string. An unterminated `{{` is kept as text.
#[derive(Debug, Clone, Copy, Default)]
pub struct PathTemplateRenderer;

impl TemplateRenderer for PathTemplateRenderer {
    fn render(&self, model: &Value, template: &str) -> StateResult<String> {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;

        while let Some(start) = rest.find(OPEN) {
            let Some(len) = rest[start + OPEN.len()..].find(CLOSE) else {
                break;
            };
            out.push_str(&rest[..start]);

            let expression = rest[start + OPEN.len()..start + OPEN.len() + len].trim();
            let path = parse_path(expression).map_err(|reason| ConfigurationError::Template {
                template: template.to_string(),
                reason,
            })?;
            if let Some(value) = lookup(model, &path) {
                push_value(&mut out, value);
            }

            rest = &rest[start + OPEN.len() + len + CLOSE.len()..];
        }

        out.push_str(rest);
        Ok(out)
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Segment<'a> {
    Key(&'a str),
    Index(usize),
}

fn parse_path(expression: &str) -> Result<Vec<Segment<'_>>, String> {
    if expression.is_empty() {
        return Err("empty expression".to_string());
    }
    if expression.contains(char::is_whitespace) {
        return Err(format!("unsupported expression '{expression}'"));
    }

    expression
        .split('.')
        .map(|segment| {
            if segment.is_empty() {
                return Err(format!("empty path segment in '{expression}'"));
            }
            match segment.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
                Some(index) => index
                    .parse()
                    .map(Segment::Index)
                    .map_err(|_| format!("invalid index '{segment}' in '{expression}'")),
                None => Ok(Segment::Key(segment)),
            }
        })
        .collect()
}

fn lookup<'a>(model: &'a Value, path: &[Segment<'_>]) -> Option<&'a Value> {
    path.iter().try_fold(model, |current, segment| match (current, segment) {
        (Value::Object(map), Segment::Key(key)) => map.get(*key),
        (Value::Array(items), Segment::Index(i)) => items.get(*i),
        (Value::Array(items), Segment::Key(key)) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

fn push_value(out: &mut String, value: &Value) {
    match value {
        Value::Null => {}
        Value::String(s) => out.push_str(s),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => out.push_str(&n.to_string()),
        Value::Array(_) | Value::Object(_) => out.push_str(&value.to_string()),
    }
}

/// A configuration tree whose keys and leaves can be rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateNode {
    /// A string value.
    Leaf(String),
    /// An ordered list.
    Sequence(Vec<TemplateNode>),
    /// A string-keyed map.
    Mapping(BTreeMap<String, TemplateNode>),
}

impl TemplateNode {
    /// Converts JSON into a tree. Numbers and booleans become string leaves;
    /// `null` yields `None` and is dropped from enclosing collections.
    #[must_use]
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::String(s) => Some(Self::Leaf(s.clone())),
            Value::Bool(b) => Some(Self::Leaf(b.to_string())),
            Value::Number(n) => Some(Self::Leaf(n.to_string())),
            Value::Array(items) => Some(Self::Sequence(
                items.iter().filter_map(Self::from_json).collect(),
            )),
            Value::Object(map) => Some(Self::Mapping(
                map.iter()
                    .filter_map(|(k, v)| Self::from_json(v).map(|node| (k.clone(), node)))
                    .collect(),
            )),
        }
    }

    /// Renders every leaf and every map key, at any depth.
    ///
    /// When two keys render to the same string the later one (in key order)
    /// wins.
    ///
    /// # Errors
    ///
    /// Propagates the first rendering error.
    pub fn render(&self, renderer: &dyn TemplateRenderer, model: &Value) -> StateResult<Self> {
        match self {
            Self::Leaf(template) => renderer.render(model, template).map(Self::Leaf),
            Self::Sequence(items) => items
                .iter()
                .map(|item| item.render(renderer, model))
                .collect::<StateResult<Vec<_>>>()
                .map(Self::Sequence),
            Self::Mapping(map) => {
                let mut rendered = BTreeMap::new();
                for (key, value) in map {
                    rendered.insert(renderer.render(model, key)?, value.render(renderer, model)?);
                }
                Ok(Self::Mapping(rendered))
            }
        }
    }

    /// Converts back into JSON with string leaves.
    #[must_use]
    pub fn into_json(self) -> Value {
        match self {
            Self::Leaf(s) => Value::String(s),
            Self::Sequence(items) => Value::Array(items.into_iter().map(Self::into_json).collect()),
            Self::Mapping(map) => Value::Object(
                map.into_iter()
                    .map(|(k, v)| (k, v.into_json()))
                    .collect(),
            ),
        }
    }
}

/// Renders a whole JSON configuration, keys included.
///
/// # Errors
///
/// Propagates the first rendering error.
pub fn render_json(renderer: &dyn TemplateRenderer, model: &Value, config: &Value) -> StateResult<Value> {
    match TemplateNode::from_json(config) {
        Some(tree) => Ok(tree.render(renderer, model)?.into_json()),
        None => Ok(Value::Null),
    }
}
