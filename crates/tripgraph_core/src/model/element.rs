//! Element domain model.
//!
//! # Responsibility
//! - Define the typed attribute record that makes up the element layer.
//!
//! # Invariants
//! - `element_type` is immutable after creation; update paths never touch it.
//! - Elements never carry a score; scores are always derived per evaluation.

use crate::model::value::{validate_attr_map, AttrMap, AttrValue, Scalar, ValueValidationError};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Typed attribute record representing one itinerary component
/// (attraction, meal, lodging, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    /// Opaque stable id, unique across all element types.
    pub id: String,
    /// Element type name, e.g. `attraction`. Immutable after creation.
    #[serde(rename = "type")]
    pub element_type: String,
    /// Open-schema attribute map.
    pub attributes: AttrMap,
    /// Unix epoch milliseconds.
    pub created_at_ms: i64,
    /// Unix epoch milliseconds.
    pub updated_at_ms: i64,
}

impl Element {
    /// Creates an element with freshly stamped timestamps.
    pub fn new(
        id: impl Into<String>,
        element_type: impl Into<String>,
        attributes: AttrMap,
    ) -> Self {
        let now = crate::model::epoch_ms_now();
        Self {
            id: id.into(),
            element_type: element_type.into(),
            attributes,
            created_at_ms: now,
            updated_at_ms: now,
        }
    }

    /// Human-facing label: the `name` attribute when present, else the id.
    pub fn display_name(&self) -> &str {
        match self.attributes.get("name") {
            Some(AttrValue::Scalar(Scalar::Text(name))) if !name.is_empty() => name,
            _ => &self.id,
        }
    }

    /// Validates identity and attribute invariants before persistence.
    pub fn validate(&self) -> Result<(), ElementValidationError> {
        if self.id.trim().is_empty() {
            return Err(ElementValidationError::EmptyId);
        }
        if self.element_type.trim().is_empty() {
            return Err(ElementValidationError::EmptyType);
        }
        validate_attr_map(&self.attributes)?;
        Ok(())
    }
}

/// Element-level validation errors.
#[derive(Debug, Clone, PartialEq)]
pub enum ElementValidationError {
    EmptyId,
    EmptyType,
    Value(ValueValidationError),
}

impl Display for ElementValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyId => write!(f, "element id must not be empty"),
            Self::EmptyType => write!(f, "element type must not be empty"),
            Self::Value(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for ElementValidationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Value(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ValueValidationError> for ElementValidationError {
    fn from(value: ValueValidationError) -> Self {
        Self::Value(value)
    }
}
