//! Predicate evaluation.
//!
//! [`ConditionKind::ALL`] is the fixed catalogue of conditions in evaluation
//! order. Each kind extracts its own configuration from
//! [`ContextConditions`]; absent ones are skipped.

use std::fmt;
use std::sync::Arc;

use tracing::info;

use crate::context::{Context, Row};
use crate::error::ConfigurationError;
use crate::pattern::{PatternMatcher, PatternParser, StringPatternParser};

use super::predicates::{ContextConditions, ListPosition, PatternConfig};

/// Integer comparison used by the count conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    /// `actual == expected`
    EqualTo,
    /// `actual < expected`
    LessThan,
    /// `actual > expected`
    MoreThan,
}

impl Comparison {
    /// Applies the comparison.
    #[must_use]
    pub fn holds(self, actual: u64, expected: i64) -> bool {
        let actual = i128::from(actual);
        let expected = i128::from(expected);
        match self {
            Self::EqualTo => actual == expected,
            Self::LessThan => actual < expected,
            Self::MoreThan => actual > expected,
        }
    }
}

/// Field patterns that must all match one property map or row.
#[derive(Debug, Clone)]
pub struct FieldPatterns(Vec<(String, Arc<dyn PatternMatcher>)>);

impl FieldPatterns {
    fn from_config(config: &PatternConfig, parser: &dyn PatternParser) -> Result<Self, ConfigurationError> {
        config
            .iter()
            .map(|(field, descriptor)| Ok::<_, ConfigurationError>((field.clone(), parser.parse(descriptor)?)))
            .collect::<Result<Vec<_>, ConfigurationError>>()
            .map(Self)
    }

    /// Number of field patterns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if there are no field patterns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn matches(&self, context: &Context, lookup: impl Fn(&str) -> Option<String>) -> bool {
        if self.0.is_empty() {
            info!(context = %context.id(), "No interpretable matcher was found, defaulting to 'exactMatch'");
            return true;
        }
        self.0
            .iter()
            .all(|(field, pattern)| pattern.matches(lookup(field.as_str()).as_deref()))
    }
}

/// One evaluable condition.
#[derive(Debug, Clone)]
pub enum Predicate {
    /// Every named property matches its pattern.
    Property(FieldPatterns),
    /// Every addressed row exists and matches its patterns.
    List(Vec<(ListPosition, FieldPatterns)>),
    /// The property exists.
    HasProperty(String),
    /// The property does not exist.
    HasNotProperty(String),
    /// Compares `updateCount`.
    UpdateCount(Comparison, i64),
    /// Compares the number of rows.
    ListSize(Comparison, i64),
}

impl Predicate {
    /// Evaluates against a context snapshot.
    #[must_use]
    pub fn evaluate(&self, context: &Context) -> bool {
        match self {
            Self::Property(patterns) => {
                patterns.matches(context, |name| context.property(name).map(str::to_string))
            }
            Self::List(rows) => rows.iter().all(|(position, patterns)| {
                match position.resolve(context.list().len()) {
                    Some(index) => {
                        let row: &Row = &context.list()[index];
                        patterns.matches(context, |field| row.get(field).cloned())
                    }
                    None => {
                        info!(context = %context.id(), %position, "List entry does not exist");
                        false
                    }
                }
            }),
            Self::HasProperty(name) => context.property(name).is_some(),
            Self::HasNotProperty(name) => context.property(name).is_none(),
            Self::UpdateCount(cmp, expected) => cmp.holds(context.update_count(), *expected),
            Self::ListSize(cmp, expected) => {
                cmp.holds(u64::try_from(context.list().len()).unwrap_or(u64::MAX), *expected)
            }
        }
    }
}

/// The condition catalogue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConditionKind {
    /// `property`
    Property,
    /// `list`
    List,
    /// `hasProperty`
    HasProperty,
    /// `hasNotProperty`
    HasNotProperty,
    /// `updateCountEqualTo`
    UpdateCountEqualTo,
    /// `updateCountLessThan`
    UpdateCountLessThan,
    /// `updateCountMoreThan`
    UpdateCountMoreThan,
    /// `listSizeEqualTo`
    ListSizeEqualTo,
    /// `listSizeLessThan`
    ListSizeLessThan,
    /// `listSizeMoreThan`
    ListSizeMoreThan,
}

impl ConditionKind {
    /// Every kind, in evaluation order.
    pub const ALL: [Self; 10] = [
        Self::Property,
        Self::List,
        Self::HasProperty,
        Self::HasNotProperty,
        Self::UpdateCountEqualTo,
        Self::UpdateCountLessThan,
        Self::UpdateCountMoreThan,
        Self::ListSizeEqualTo,
        Self::ListSizeLessThan,
        Self::ListSizeMoreThan,
    ];

    /// Parameter name of this condition.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Property => "property",
            Self::List => "list",
            Self::HasProperty => "hasProperty",
            Self::HasNotProperty => "hasNotProperty",
            Self::UpdateCountEqualTo => "updateCountEqualTo",
            Self::UpdateCountLessThan => "updateCountLessThan",
            Self::UpdateCountMoreThan => "updateCountMoreThan",
            Self::ListSizeEqualTo => "listSizeEqualTo",
            Self::ListSizeLessThan => "listSizeLessThan",
            Self::ListSizeMoreThan => "listSizeMoreThan",
        }
    }

    /// Builds this kind's predicate if `conditions` configures it, parsing
    /// pattern descriptors with `parser`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for a malformed pattern descriptor.
    pub fn extract(
        self,
        conditions: &ContextConditions,
        parser: &dyn PatternParser,
    ) -> Result<Option<Predicate>, ConfigurationError> {
        Ok(match self {
            Self::Property => match &conditions.property {
                Some(config) => Some(Predicate::Property(FieldPatterns::from_config(config, parser)?)),
                None => None,
            },
            Self::List => match &conditions.list {
                Some(list) => Some(Predicate::List(
                    list.iter()
                        .map(|(pos, config)| {
                            Ok::<_, ConfigurationError>((pos, FieldPatterns::from_config(config, parser)?))
                        })
                        .collect::<Result<Vec<_>, ConfigurationError>>()?,
                )),
                None => None,
            },
            Self::HasProperty => conditions.has_property.clone().map(Predicate::HasProperty),
            Self::HasNotProperty => conditions.has_not_property.clone().map(Predicate::HasNotProperty),
            Self::UpdateCountEqualTo => {
                count(conditions.update_count_equal_to, Predicate::UpdateCount, Comparison::EqualTo)
            }
            Self::UpdateCountLessThan => {
                count(conditions.update_count_less_than, Predicate::UpdateCount, Comparison::LessThan)
            }
            Self::UpdateCountMoreThan => {
                count(conditions.update_count_more_than, Predicate::UpdateCount, Comparison::MoreThan)
            }
            Self::ListSizeEqualTo => {
                count(conditions.list_size_equal_to, Predicate::ListSize, Comparison::EqualTo)
            }
            Self::ListSizeLessThan => {
                count(conditions.list_size_less_than, Predicate::ListSize, Comparison::LessThan)
            }
            Self::ListSizeMoreThan => {
                count(conditions.list_size_more_than, Predicate::ListSize, Comparison::MoreThan)
            }
        })
    }
}

fn count(value: Option<i64>, build: fn(Comparison, i64) -> Predicate, cmp: Comparison) -> Option<Predicate> {
    value.map(|n| build(cmp, n))
}

impl fmt::Display for ConditionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The configured predicates of one `hasContext` matcher, in evaluation
/// order.
#[derive(Debug, Clone, Default)]
pub struct PredicateSet {
    predicates: Vec<(ConditionKind, Predicate)>,
}

impl PredicateSet {
    /// Collects the configured predicates, using [`StringPatternParser`]
    /// for pattern descriptors.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for a malformed pattern descriptor.
    pub fn from_conditions(conditions: &ContextConditions) -> Result<Self, ConfigurationError> {
        Self::from_conditions_with(conditions, &StringPatternParser)
    }

    /// Collects the configured predicates, parsing pattern descriptors with
    /// `parser`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for a malformed pattern descriptor.
    pub fn from_conditions_with(
        conditions: &ContextConditions,
        parser: &dyn PatternParser,
    ) -> Result<Self, ConfigurationError> {
        let mut predicates = Vec::new();
        for kind in ConditionKind::ALL {
            if let Some(predicate) = kind.extract(conditions, parser)? {
                predicates.push((kind, predicate));
            }
        }
        Ok(Self { predicates })
    }

    /// Returns true if no condition is configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    /// Number of configured predicates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.predicates.len()
    }

    /// Configured kinds, in evaluation order.
    pub fn kinds(&self) -> impl Iterator<Item = ConditionKind> + '_ {
        self.predicates.iter().map(|(kind, _)| *kind)
    }

    /// Returns true if every predicate holds. An empty set holds.
    #[must_use]
    pub fn evaluate(&self, context: &Context) -> bool {
        self.predicates
            .iter()
            .all(|(_, predicate)| predicate.evaluate(context))
    }
}
