//! Parameter-driven mutation entrypoints.
//!
//! A handler receives a template model (typically the triggering request and
//! response) and a JSON parameter object. Templates are rendered first,
//! outside any context lock, then the resulting values go to the
//! [`ContextStore`](crate::state::ContextStore).

mod delete;
mod record;

use std::collections::BTreeMap;
use std::fmt;

use serde::{de, Deserialize, Deserializer};
use serde_json::Value;

use crate::error::{ConfigurationError, StateError, StateResult};
use crate::template::TemplateRenderer;

pub use delete::{DeleteListParameters, DeleteOutcome, DeleteParameters, DeleteStateHandler, DeleteWhere};
pub use record::{RecordListParameters, RecordParameters, RecordStateHandler};

/// Template text of a scalar parameter value.
fn leaf_text(name: &str, value: &Value) -> Result<String, ConfigurationError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(ConfigurationError::parameters(format!(
            "'{name}' must be a string, got {other}"
        ))),
    }
}

/// Renders every value of a string-keyed map. Keys are taken as written.
fn render_values(
    renderer: &dyn TemplateRenderer,
    model: &Value,
    values: &BTreeMap<String, Value>,
) -> StateResult<Vec<(String, String)>> {
    values
        .iter()
        .map(|(key, value)| {
            let template = leaf_text(key, value)?;
            Ok::<_, StateError>((key.clone(), renderer.render(model, &template)?))
        })
        .collect()
}

fn parse<'a, T: Deserialize<'a>>(parameters: &'a Value) -> Result<T, ConfigurationError> {
    T::deserialize(parameters).map_err(|e| ConfigurationError::parameters(e.to_string()))
}

/// Accepts `true`/`false` as booleans or as strings.
fn lenient_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    struct BoolVisitor;

    impl de::Visitor<'_> for BoolVisitor {
        type Value = bool;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a boolean or \"true\"/\"false\"")
        }

        fn visit_bool<E: de::Error>(self, v: bool) -> Result<Self::Value, E> {
            Ok(v)
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
            match v.trim() {
                s if s.eq_ignore_ascii_case("true") => Ok(true),
                s if s.eq_ignore_ascii_case("false") => Ok(false),
                _ => Err(E::custom(format!("invalid boolean '{v}'"))),
            }
        }

        fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(false)
        }
    }

    deserializer.deserialize_any(BoolVisitor)
}

/// Accepts a non-negative integer as a number or a string.
fn lenient_seconds<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    struct SecondsVisitor;

    impl de::Visitor<'_> for SecondsVisitor {
        type Value = Option<u64>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a non-negative number of seconds")
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
            Ok(Some(v))
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
            u64::try_from(v)
                .map(Some)
                .map_err(|_| E::custom(format!("negative ttl {v}")))
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
            v.trim()
                .parse()
                .map(Some)
                .map_err(|e| E::custom(format!("invalid ttl '{v}': {e}")))
        }

        fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }
    }

    deserializer.deserialize_any(SecondsVisitor)
}
