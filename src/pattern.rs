//! String patterns used by `property` and `list` predicates.
//!
//! A pattern is described by a JSON object holding exactly one operator:
//!
//! ```json
//! { "equalTo": "paid", "caseInsensitive": "true" }
//! { "contains": "pa" }
//! { "matches": "[0-9]+" }
//! { "absent": true }
//! ```
//!
//! Descriptor values go through template rendering before parsing, so every
//! scalar may arrive as a string.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use regex::Regex;
use serde_json::{Map, Value};

use crate::error::ConfigurationError;
use crate::state::full_match_regex;

/// Anything that can test an optional string value.
///
/// `None` means the value is missing (for example, an absent property).
pub trait PatternMatcher: Send + Sync + fmt::Debug {
    /// Returns true if `actual` satisfies the pattern.
    fn matches(&self, actual: Option<&str>) -> bool;
}

/// Builds a [`PatternMatcher`] from a rendered JSON descriptor.
///
/// Predicates are built through a parser so callers can plug in their own
/// pattern language; [`StringPatternParser`] is the default.
pub trait PatternParser: Send + Sync + fmt::Debug {
    /// Parses one descriptor such as `{"equalTo": "paid"}`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for a malformed descriptor.
    fn parse(&self, descriptor: &Value) -> Result<Arc<dyn PatternMatcher>, ConfigurationError>;
}

/// Parses descriptors into [`StringPattern`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct StringPatternParser;

impl PatternParser for StringPatternParser {
    fn parse(&self, descriptor: &Value) -> Result<Arc<dyn PatternMatcher>, ConfigurationError> {
        Ok(Arc::new(StringPattern::from_config(descriptor)?))
    }
}

const REGEX_CACHE_MAX: usize = 1024;

static REGEX_CACHE: OnceLock<RwLock<HashMap<String, Regex>>> = OnceLock::new();

/// Whole-string regex, compiled once per process for a given pattern.
fn cached_regex(pattern: &str) -> Result<Regex, ConfigurationError> {
    let cache = REGEX_CACHE.get_or_init(|| RwLock::new(HashMap::new()));

    {
        let guard = cache.read().unwrap_or_else(PoisonError::into_inner);
        if let Some(re) = guard.get(pattern) {
            return Ok(re.clone());
        }
    }

    let compiled = full_match_regex(pattern)?;

    let mut guard = cache.write().unwrap_or_else(PoisonError::into_inner);
    if guard.len() >= REGEX_CACHE_MAX {
        guard.clear();
    }

    // Another thread may have inserted it while we compiled.
    guard
        .entry(pattern.to_string())
        .or_insert_with(|| compiled.clone());
    Ok(compiled)
}

const OPERATORS: [&str; 6] = [
    "equalTo",
    "contains",
    "doesNotContain",
    "matches",
    "doesNotMatch",
    "absent",
];

const CASE_INSENSITIVE: &str = "caseInsensitive";

/// A parsed string pattern.
#[derive(Debug, Clone)]
pub enum StringPattern {
    /// Exact equality.
    EqualTo {
        /// Value to compare with.
        expected: String,
        /// Compare ignoring case.
        case_insensitive: bool,
    },
    /// Substring present.
    Contains(String),
    /// Substring not present. Never matches a missing value.
    DoesNotContain(String),
    /// The whole value matches the regex.
    Matches(Regex),
    /// The whole value does not match the regex. Never matches a missing
    /// value.
    DoesNotMatch(Regex),
    /// `true`: the value must be missing; `false`: it must be present.
    Absent(bool),
}

impl StringPattern {
    /// Case-sensitive equality.
    #[must_use]
    pub fn equal_to(expected: impl Into<String>) -> Self {
        Self::EqualTo {
            expected: expected.into(),
            case_insensitive: false,
        }
    }

    /// Whole-string regex match.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError::InvalidRegex` when `pattern` does not
    /// compile.
    pub fn matching(pattern: &str) -> Result<Self, ConfigurationError> {
        cached_regex(pattern).map(Self::Matches)
    }

    /// Parses a JSON descriptor.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError::InvalidPattern` unless `descriptor` is an
    /// object with exactly one known operator (plus `caseInsensitive` next to
    /// `equalTo`), and `InvalidRegex` for a regex that does not compile.
    pub fn from_config(descriptor: &Value) -> Result<Self, ConfigurationError> {
        let Value::Object(fields) = descriptor else {
            return Err(invalid(format!("expected an object, got {descriptor}")));
        };

        let mut operators = fields.keys().filter(|k| OPERATORS.contains(&k.as_str()));
        let operator = match (operators.next(), operators.next()) {
            (Some(op), None) => op.as_str(),
            (None, _) => {
                return Err(invalid(format!("no known operator in {descriptor}")));
            }
            (Some(a), Some(b)) => {
                return Err(invalid(format!("more than one operator: '{a}' and '{b}'")));
            }
        };

        if let Some(unknown) = fields
            .keys()
            .find(|k| !OPERATORS.contains(&k.as_str()) && *k != CASE_INSENSITIVE)
        {
            return Err(invalid(format!("unknown key '{unknown}'")));
        }
        if operator != "equalTo" && fields.contains_key(CASE_INSENSITIVE) {
            return Err(invalid(format!(
                "'{CASE_INSENSITIVE}' only applies to 'equalTo', not '{operator}'"
            )));
        }

        let operand = &fields[operator];
        match operator {
            "equalTo" => Ok(Self::EqualTo {
                expected: text(operator, operand)?,
                case_insensitive: case_insensitive(fields)?,
            }),
            "contains" => Ok(Self::Contains(text(operator, operand)?)),
            "doesNotContain" => Ok(Self::DoesNotContain(text(operator, operand)?)),
            "matches" => Ok(Self::Matches(cached_regex(&text(operator, operand)?)?)),
            "doesNotMatch" => Ok(Self::DoesNotMatch(cached_regex(&text(operator, operand)?)?)),
            _ => Ok(Self::Absent(flag(operator, operand)?)),
        }
    }
}

fn invalid(reason: String) -> ConfigurationError {
    ConfigurationError::InvalidPattern { reason }
}

fn text(operator: &str, operand: &Value) -> Result<String, ConfigurationError> {
    match operand {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(invalid(format!("'{operator}' needs a string, got {other}"))),
    }
}

fn flag(name: &str, value: &Value) -> Result<bool, ConfigurationError> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::String(s) if s.eq_ignore_ascii_case("true") => Ok(true),
        Value::String(s) if s.eq_ignore_ascii_case("false") => Ok(false),
        other => Err(invalid(format!("'{name}' needs a boolean, got {other}"))),
    }
}

fn case_insensitive(fields: &Map<String, Value>) -> Result<bool, ConfigurationError> {
    fields
        .get(CASE_INSENSITIVE)
        .map_or(Ok(false), |v| flag(CASE_INSENSITIVE, v))
}

impl PatternMatcher for StringPattern {
    fn matches(&self, actual: Option<&str>) -> bool {
        match (self, actual) {
            (Self::Absent(expect_absent), actual) => *expect_absent == actual.is_none(),
            (_, None) => false,
            (
                Self::EqualTo {
                    expected,
                    case_insensitive,
                },
                Some(actual),
            ) => {
                if *case_insensitive {
                    expected.to_lowercase() == actual.to_lowercase()
                } else {
                    expected == actual
                }
            }
            (Self::Contains(needle), Some(actual)) => actual.contains(needle.as_str()),
            (Self::DoesNotContain(needle), Some(actual)) => !actual.contains(needle.as_str()),
            (Self::Matches(re), Some(actual)) => re.is_match(actual),
            (Self::DoesNotMatch(re), Some(actual)) => !re.is_match(actual),
        }
    }
}

impl PartialEq for StringPattern {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (
                Self::EqualTo {
                    expected: a,
                    case_insensitive: ca,
                },
                Self::EqualTo {
                    expected: b,
                    case_insensitive: cb,
                },
            ) => a == b && ca == cb,
            (Self::Contains(a), Self::Contains(b))
            | (Self::DoesNotContain(a), Self::DoesNotContain(b)) => a == b,
            (Self::Matches(a), Self::Matches(b)) | (Self::DoesNotMatch(a), Self::DoesNotMatch(b)) => {
                a.as_str() == b.as_str()
            }
            (Self::Absent(a), Self::Absent(b)) => a == b,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(v: Value) -> StringPattern {
        StringPattern::from_config(&v).unwrap()
    }

    #[test]
    fn equal_to_with_and_without_case() {
        let exact = parse(json!({"equalTo": "Paid"}));
        assert!(exact.matches(Some("Paid")));
        assert!(!exact.matches(Some("paid")));
        assert!(!exact.matches(None));

        let loose = parse(json!({"equalTo": "Paid", "caseInsensitive": "true"}));
        assert!(loose.matches(Some("PAID")));
    }

    #[test]
    fn numbers_are_compared_as_text() {
        let p = parse(json!({"equalTo": 5}));
        assert_eq!(p, StringPattern::equal_to("5"));
        assert!(p.matches(Some("5")));
    }

    #[test]
    fn regex_is_whole_string() {
        let p = parse(json!({"matches": "[0-9]+"}));
        assert!(p.matches(Some("123")));
        assert!(!p.matches(Some("a123")));
        assert!(!p.matches(None));

        let not = parse(json!({"doesNotMatch": "[0-9]+"}));
        assert!(not.matches(Some("a123")));
        assert!(!not.matches(Some("123")));
        assert!(!not.matches(None));
    }

    #[test]
    fn containment() {
        let p = parse(json!({"contains": "ell"}));
        assert!(p.matches(Some("hello")));
        assert!(!p.matches(None));

        let not = parse(json!({"doesNotContain": "ell"}));
        assert!(not.matches(Some("world")));
        assert!(!not.matches(Some("hello")));
        assert!(!not.matches(None));
    }

    #[test]
    fn absent_checks_presence() {
        let absent = parse(json!({"absent": true}));
        assert!(absent.matches(None));
        assert!(!absent.matches(Some("")));

        let present = parse(json!({"absent": "false"}));
        assert!(present.matches(Some("")));
        assert!(!present.matches(None));
    }

    #[test]
    fn malformed_descriptors_are_rejected() {
        for bad in [
            json!("paid"),
            json!({}),
            json!({"startsWith": "p"}),
            json!({"equalTo": "a", "contains": "b"}),
            json!({"contains": "a", "caseInsensitive": true}),
            json!({"equalTo": "a", "extra": 1}),
            json!({"absent": "maybe"}),
            json!({"equalTo": {"nested": true}}),
        ] {
            let err = StringPattern::from_config(&bad).unwrap_err();
            assert!(matches!(err, ConfigurationError::InvalidPattern { .. }), "{bad}");
        }

        let err = StringPattern::from_config(&json!({"matches": "("})).unwrap_err();
        assert!(matches!(err, ConfigurationError::InvalidRegex { .. }));
    }

    #[test]
    fn regex_cache_returns_equivalent_regex() {
        let a = cached_regex("ab+c").unwrap();
        let b = cached_regex("ab+c").unwrap();
        assert_eq!(a.as_str(), b.as_str());
        assert!(a.is_match("abbc"));
    }
}
