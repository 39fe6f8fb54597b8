//! Scheme domain model.
//!
//! # Responsibility
//! - Define the named rule selection (with per-rule overrides) that makes
//!   up the scheme layer.
//!
//! # Invariants
//! - Override weights obey the same band as rule weights.
//! - An absent override field means "use the rule's own value", resolved
//!   independently for weight and for each parameter key.

use crate::model::rule::{validate_weight, RuleValidationError};
use crate::model::value::{validate_attr_map, AttrMap, ValueValidationError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

/// Per-rule override entry inside a scheme.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleOverride {
    /// Replaces the rule's own weight when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    /// Overlaid onto the rule's parameter defaults, key by key.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: AttrMap,
}

impl RuleOverride {
    pub fn with_weight(weight: f64) -> Self {
        Self {
            weight: Some(weight),
            parameters: AttrMap::new(),
        }
    }
}

/// Named selection of rules representing one itinerary plan to be scored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scheme {
    /// Opaque stable id, unique across schemes.
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// rule_id -> override entry. May reference rules that no longer exist;
    /// such entries are skipped with a warning during evaluation.
    pub rule_weights: BTreeMap<String, RuleOverride>,
    /// Unix epoch milliseconds.
    pub created_at_ms: i64,
}

impl Scheme {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        description: Option<String>,
        rule_weights: BTreeMap<String, RuleOverride>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description,
            rule_weights,
            created_at_ms: crate::model::epoch_ms_now(),
        }
    }

    /// Validates scheme shape before persistence.
    pub fn validate(&self) -> Result<(), SchemeValidationError> {
        if self.id.trim().is_empty() {
            return Err(SchemeValidationError::EmptyId);
        }
        if self.name.trim().is_empty() {
            return Err(SchemeValidationError::EmptyName);
        }
        for (rule_id, entry) in &self.rule_weights {
            if rule_id.trim().is_empty() {
                return Err(SchemeValidationError::EmptyRuleId);
            }
            if let Some(weight) = entry.weight {
                validate_weight(weight).map_err(|source| {
                    SchemeValidationError::OverrideWeight {
                        rule_id: rule_id.clone(),
                        source,
                    }
                })?;
            }
            validate_attr_map(&entry.parameters).map_err(|source| {
                SchemeValidationError::OverrideParameter {
                    rule_id: rule_id.clone(),
                    source,
                }
            })?;
        }
        Ok(())
    }
}

/// Scheme-level validation errors, reported at save time.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemeValidationError {
    EmptyId,
    EmptyName,
    EmptyRuleId,
    OverrideWeight {
        rule_id: String,
        source: RuleValidationError,
    },
    OverrideParameter {
        rule_id: String,
        source: ValueValidationError,
    },
}

impl Display for SchemeValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyId => write!(f, "scheme id must not be empty"),
            Self::EmptyName => write!(f, "scheme name must not be empty"),
            Self::EmptyRuleId => write!(f, "scheme references an empty rule id"),
            Self::OverrideWeight { rule_id, source } => {
                write!(f, "override for rule `{rule_id}`: {source}")
            }
            Self::OverrideParameter { rule_id, source } => {
                write!(f, "override parameters for rule `{rule_id}`: {source}")
            }
        }
    }
}

impl std::error::Error for SchemeValidationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::OverrideWeight { source, .. } => Some(source),
            Self::OverrideParameter { source, .. } => Some(source),
            _ => None,
        }
    }
}
