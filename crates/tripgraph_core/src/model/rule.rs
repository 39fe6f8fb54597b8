//! Rule domain model.
//!
//! # Responsibility
//! - Define the weighted, parameterized scoring definition stored in the
//!   rule layer.
//!
//! # Invariants
//! - `weight` stays inside [`MIN_RULE_WEIGHT`, `MAX_RULE_WEIGHT`].
//! - `code` is a pure `score(attrs, params) -> number` body; the sandbox
//!   enforces purity and termination at execution time, this model only
//!   validates shape.

use crate::model::value::{validate_attr_map, AttrMap, ValueValidationError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};

/// Lower bound for rule and override weights.
pub const MIN_RULE_WEIGHT: f64 = 0.1;
/// Upper bound for rule and override weights.
pub const MAX_RULE_WEIGHT: f64 = 10.0;

/// Scoring definition applied to elements of its declared types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    /// Opaque stable id, unique across rules.
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Default weight multiplied into every raw score of this rule.
    pub weight: f64,
    /// Element types this rule scores; the element universe selector.
    pub affected_element_types: BTreeSet<String>,
    /// Attribute keys the scoring body declares to read. Informational and
    /// used for validation hints; not enforced at execution.
    #[serde(default)]
    pub affected_element_keys: BTreeSet<String>,
    /// Named parameter defaults visible to the scoring body.
    #[serde(default)]
    pub parameters: AttrMap,
    /// Scoring-language body, compiled by the sandbox.
    pub code: String,
}

impl Rule {
    /// Validates rule shape before persistence.
    pub fn validate(&self) -> Result<(), RuleValidationError> {
        if self.id.trim().is_empty() {
            return Err(RuleValidationError::EmptyId);
        }
        if self.name.trim().is_empty() {
            return Err(RuleValidationError::EmptyName);
        }
        if self.code.trim().is_empty() {
            return Err(RuleValidationError::EmptyCode);
        }
        validate_weight(self.weight)?;
        if self.affected_element_types.is_empty() {
            return Err(RuleValidationError::NoAffectedTypes);
        }
        validate_attr_map(&self.parameters)?;
        Ok(())
    }
}

/// Checks one weight value against the allowed band.
pub fn validate_weight(weight: f64) -> Result<(), RuleValidationError> {
    if !weight.is_finite() || !(MIN_RULE_WEIGHT..=MAX_RULE_WEIGHT).contains(&weight) {
        return Err(RuleValidationError::WeightOutOfRange { weight });
    }
    Ok(())
}

/// Rule-level validation errors, reported at save time.
#[derive(Debug, Clone, PartialEq)]
pub enum RuleValidationError {
    EmptyId,
    EmptyName,
    EmptyCode,
    NoAffectedTypes,
    WeightOutOfRange { weight: f64 },
    /// A declared element type has no elements and is unknown to the store.
    UnknownElementType { element_type: String },
    Parameter(ValueValidationError),
}

impl Display for RuleValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyId => write!(f, "rule id must not be empty"),
            Self::EmptyName => write!(f, "rule name must not be empty"),
            Self::EmptyCode => write!(f, "rule code must not be empty"),
            Self::NoAffectedTypes => {
                write!(f, "rule must declare at least one affected element type")
            }
            Self::WeightOutOfRange { weight } => write!(
                f,
                "rule weight {weight} outside allowed range [{MIN_RULE_WEIGHT}, {MAX_RULE_WEIGHT}]"
            ),
            Self::UnknownElementType { element_type } => {
                write!(f, "rule references unknown element type `{element_type}`")
            }
            Self::Parameter(err) => write!(f, "invalid rule parameter: {err}"),
        }
    }
}

impl std::error::Error for RuleValidationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Parameter(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ValueValidationError> for RuleValidationError {
    fn from(value: ValueValidationError) -> Self {
        Self::Parameter(value)
    }
}

#[cfg(test)]
mod tests {
    use super::{validate_weight, Rule, RuleValidationError};
    use crate::model::value::AttrMap;
    use std::collections::BTreeSet;

    fn sample_rule(weight: f64) -> Rule {
        Rule {
            id: "rule_budget".to_string(),
            name: "budget lodging".to_string(),
            description: None,
            weight,
            affected_element_types: BTreeSet::from(["lodging".to_string()]),
            affected_element_keys: BTreeSet::from(["price".to_string()]),
            parameters: AttrMap::new(),
            code: "if attr(\"price\", 0) < 500 then 1 else 0".to_string(),
        }
    }

    #[test]
    fn accepts_weight_inside_band() {
        assert!(sample_rule(1.0).validate().is_ok());
        assert!(sample_rule(0.1).validate().is_ok());
        assert!(sample_rule(10.0).validate().is_ok());
    }

    #[test]
    fn rejects_weight_outside_band() {
        assert!(matches!(
            sample_rule(0.0).validate(),
            Err(RuleValidationError::WeightOutOfRange { .. })
        ));
        assert!(matches!(
            sample_rule(10.5).validate(),
            Err(RuleValidationError::WeightOutOfRange { .. })
        ));
        assert!(validate_weight(f64::NAN).is_err());
    }

    #[test]
    fn rejects_missing_affected_types() {
        let mut rule = sample_rule(1.0);
        rule.affected_element_types.clear();
        assert_eq!(rule.validate(), Err(RuleValidationError::NoAffectedTypes));
    }
}
