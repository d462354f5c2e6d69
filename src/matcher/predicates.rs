//! Matcher parameter shapes.
//!
//! Parameters are read twice. As written, only the context id template and
//! the `hasContext`/`hasNotContext` exclusivity are checked; typed fields
//! may still hold templates. [`ContextConditions`] is parsed from the tree
//! after every key and leaf has been rendered. Rendering turns numbers into
//! strings, so counts accept both forms.

use std::collections::BTreeMap;
use std::fmt;

use serde::{de, Deserialize, Deserializer};
use serde_json::Value;

use crate::error::ConfigurationError;

/// Field name to pattern descriptor.
pub type PatternConfig = BTreeMap<String, Value>;

/// The two parameter shapes a matcher accepts.
#[derive(Debug, Clone, PartialEq)]
pub enum MatcherParameters {
    /// Match when the context (an id template) exists and every condition
    /// of the rendered parameters holds.
    HasContext(String),
    /// Match when the context (an id template) does not exist.
    HasNotContext(String),
}

impl MatcherParameters {
    /// Parses matcher parameters.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError::InvalidParameters` unless `parameters`
    /// is an object holding exactly one of `hasContext` and `hasNotContext`,
    /// and that one is a string. Other fields are not inspected.
    pub fn from_json(parameters: &Value) -> Result<Self, ConfigurationError> {
        let Value::Object(fields) = parameters else {
            return Err(only_one());
        };

        match (fields.get("hasContext"), fields.get("hasNotContext")) {
            (Some(id), None) => id_template("hasContext", id).map(Self::HasContext),
            (None, Some(id)) => id_template("hasNotContext", id).map(Self::HasNotContext),
            _ => Err(only_one()),
        }
    }
}

fn id_template(name: &str, value: &Value) -> Result<String, ConfigurationError> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| ConfigurationError::parameters(format!("'{name}' must be a string, got {value}")))
}

fn only_one() -> ConfigurationError {
    ConfigurationError::parameters("Parameters should only contain 'hasContext' or 'hasNotContext'")
}

/// Conditions evaluated against an existing context.
///
/// Unknown keys are ignored.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextConditions {
    /// Context id template.
    pub has_context: String,
    /// Property that must exist.
    #[serde(default)]
    pub has_property: Option<String>,
    /// Property that must not exist.
    #[serde(default)]
    pub has_not_property: Option<String>,
    /// Property patterns.
    #[serde(default)]
    pub property: Option<PatternConfig>,
    /// Row patterns.
    #[serde(default)]
    pub list: Option<ListConditions>,
    /// `updateCount == n`
    #[serde(default, deserialize_with = "lenient_int")]
    pub update_count_equal_to: Option<i64>,
    /// `updateCount < n`
    #[serde(default, deserialize_with = "lenient_int")]
    pub update_count_less_than: Option<i64>,
    /// `updateCount > n`
    #[serde(default, deserialize_with = "lenient_int")]
    pub update_count_more_than: Option<i64>,
    /// `listSize == n`
    #[serde(default, deserialize_with = "lenient_int")]
    pub list_size_equal_to: Option<i64>,
    /// `listSize < n`
    #[serde(default, deserialize_with = "lenient_int")]
    pub list_size_less_than: Option<i64>,
    /// `listSize > n`
    #[serde(default, deserialize_with = "lenient_int")]
    pub list_size_more_than: Option<i64>,
}

impl ContextConditions {
    /// Parses `hasContext` parameters.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError::InvalidParameters` when a field has the
    /// wrong type or a list position is not recognised.
    pub fn from_json(parameters: &Value) -> Result<Self, ConfigurationError> {
        Self::deserialize(parameters).map_err(|e| ConfigurationError::parameters(e.to_string()))
    }
}

fn lenient_int<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    struct IntVisitor;

    impl de::Visitor<'_> for IntVisitor {
        type Value = Option<i64>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("an integer or a string holding one")
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
            Ok(Some(v))
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
            i64::try_from(v).map(Some).map_err(E::custom)
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
            v.trim()
                .parse()
                .map(Some)
                .map_err(|e| E::custom(format!("invalid integer '{v}': {e}")))
        }

        fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }
    }

    deserializer.deserialize_any(IntVisitor)
}

/// Which row a list condition reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ListPosition {
    /// The first row.
    First,
    /// The last row.
    Last,
    /// The row at a 0-based index.
    Index(usize),
}

impl ListPosition {
    /// Parses `first`, `last`, `-1` (same as `last`) or an unsigned index.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError::InvalidListIndex` for any other key.
    pub fn parse(key: &str) -> Result<Self, ConfigurationError> {
        match key {
            "first" => Ok(Self::First),
            "last" | "-1" => Ok(Self::Last),
            other => other
                .parse()
                .map(Self::Index)
                .map_err(|e| ConfigurationError::InvalidListIndex {
                    value: other.to_string(),
                    reason: e.to_string(),
                }),
        }
    }

    /// Index of the addressed row in a list of `len` rows.
    #[must_use]
    pub fn resolve(self, len: usize) -> Option<usize> {
        match self {
            Self::First => (len > 0).then_some(0),
            Self::Last => len.checked_sub(1),
            Self::Index(i) => (i < len).then_some(i),
        }
    }
}

impl fmt::Display for ListPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::First => f.write_str("first"),
            Self::Last => f.write_str("last"),
            Self::Index(i) => write!(f, "{i}"),
        }
    }
}

/// Row conditions, keyed by position.
///
/// When both `last` and `-1` are given, the one sorting later (`last`) wins.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(try_from = "BTreeMap<String, PatternConfig>")]
pub struct ListConditions {
    entries: BTreeMap<ListPosition, PatternConfig>,
}

impl ListConditions {
    /// Conditions in position order: first, last, then ascending indexes.
    pub fn iter(&self) -> impl Iterator<Item = (ListPosition, &PatternConfig)> {
        self.entries.iter().map(|(pos, config)| (*pos, config))
    }

    /// Returns true if no position is constrained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl TryFrom<BTreeMap<String, PatternConfig>> for ListConditions {
    type Error = ConfigurationError;

    fn try_from(raw: BTreeMap<String, PatternConfig>) -> Result<Self, Self::Error> {
        let mut entries = BTreeMap::new();
        for (key, config) in raw {
            entries.insert(ListPosition::parse(&key)?, config);
        }
        Ok(Self { entries })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn exactly_one_existence_key() {
        assert!(matches!(
            MatcherParameters::from_json(&json!({"hasNotContext": "a"})).unwrap(),
            MatcherParameters::HasNotContext(id) if id == "a"
        ));
        assert!(matches!(
            MatcherParameters::from_json(&json!({"hasContext": "a"})).unwrap(),
            MatcherParameters::HasContext(id) if id == "a"
        ));

        for bad in [
            json!({}),
            json!({"hasContext": "a", "hasNotContext": "b"}),
            json!({"hasNotContext": 3}),
            json!({"hasContext": {"id": "a"}}),
            json!(["hasContext"]),
        ] {
            let err = MatcherParameters::from_json(&bad).unwrap_err();
            assert!(matches!(err, ConfigurationError::InvalidParameters { .. }), "{bad}");
        }
    }

    #[test]
    fn typed_fields_are_not_read_before_rendering() {
        let params = json!({
            "hasContext": "a",
            "updateCountEqualTo": "{{request.n}}",
            "list": {"{{request.idx}}": {"k": {"equalTo": "x"}}},
        });
        assert!(matches!(
            MatcherParameters::from_json(&params).unwrap(),
            MatcherParameters::HasContext(id) if id == "a"
        ));
        assert!(ContextConditions::from_json(&params).is_err());
    }

    #[test]
    fn counts_accept_numbers_and_strings() {
        let conditions = ContextConditions::from_json(&json!({
            "hasContext": "a",
            "updateCountEqualTo": 3,
            "listSizeMoreThan": " 2 ",
            "unrelated": true,
        }))
        .unwrap();
        assert_eq!(conditions.update_count_equal_to, Some(3));
        assert_eq!(conditions.list_size_more_than, Some(2));
        assert_eq!(conditions.update_count_less_than, None);

        assert!(ContextConditions::from_json(&json!({
            "hasContext": "a",
            "updateCountEqualTo": "many",
        }))
        .is_err());
    }

    #[test]
    fn list_positions() {
        assert_eq!(ListPosition::parse("first").unwrap(), ListPosition::First);
        assert_eq!(ListPosition::parse("last").unwrap(), ListPosition::Last);
        assert_eq!(ListPosition::parse("-1").unwrap(), ListPosition::Last);
        assert_eq!(ListPosition::parse("4").unwrap(), ListPosition::Index(4));
        assert!(ListPosition::parse("-2").is_err());
        assert!(ListPosition::parse("second").is_err());

        assert_eq!(ListPosition::First.resolve(0), None);
        assert_eq!(ListPosition::Last.resolve(3), Some(2));
        assert_eq!(ListPosition::Index(3).resolve(3), None);
    }

    #[test]
    fn list_conditions_parse_positions() {
        let conditions = ContextConditions::from_json(&json!({
            "hasContext": "a",
            "list": {
                "-1": {"k": {"equalTo": "x"}},
                "0": {"k": {"equalTo": "y"}},
            },
        }))
        .unwrap();
        let list = conditions.list.unwrap();
        let positions: Vec<_> = list.iter().map(|(pos, _)| pos).collect();
        assert_eq!(positions, [ListPosition::Last, ListPosition::Index(0)]);

        let err = ContextConditions::from_json(&json!({
            "hasContext": "a",
            "list": {"middle": {}},
        }))
        .unwrap_err();
        assert!(err.to_string().contains("middle"));
    }
}
