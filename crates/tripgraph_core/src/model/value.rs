//! Open-schema attribute values.
//!
//! # Responsibility
//! - Define the tagged scalar/list value shape shared by element attributes
//!   and rule parameters.
//! - Keep JSON round-trips loss-free for the admin layer.
//!
//! # Invariants
//! - Numbers stored in attribute/parameter maps are finite.
//! - Maps are `BTreeMap`-backed so iteration order is deterministic.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

/// Deterministically ordered attribute/parameter map.
pub type AttrMap = BTreeMap<String, AttrValue>;

/// Single scalar value inside an attribute map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    /// Boolean flag, e.g. `closed_on_monday: true`.
    Flag(bool),
    /// Finite floating-point number.
    Number(f64),
    /// UTF-8 text.
    Text(String),
}

/// Attribute value: one scalar or a flat list of scalars.
///
/// Nested maps are intentionally unrepresentable; the original data model
/// only ever stores flat records per element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Scalar(Scalar),
    List(Vec<Scalar>),
}

impl Scalar {
    /// Returns the numeric view of this scalar, if it has one.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(value) => Some(*value),
            Self::Flag(_) | Self::Text(_) => None,
        }
    }
}

impl AttrValue {
    pub fn number(value: f64) -> Self {
        Self::Scalar(Scalar::Number(value))
    }

    pub fn text(value: impl Into<String>) -> Self {
        Self::Scalar(Scalar::Text(value.into()))
    }

    pub fn flag(value: bool) -> Self {
        Self::Scalar(Scalar::Flag(value))
    }

    pub fn list<I>(values: I) -> Self
    where
        I: IntoIterator<Item = Scalar>,
    {
        Self::List(values.into_iter().collect())
    }

    /// Returns the first non-finite number inside this value, if any.
    fn first_non_finite(&self) -> Option<f64> {
        let scan = |scalar: &Scalar| match scalar {
            Scalar::Number(value) if !value.is_finite() => Some(*value),
            _ => None,
        };
        match self {
            Self::Scalar(scalar) => scan(scalar),
            Self::List(values) => values.iter().find_map(scan),
        }
    }
}

impl Display for Scalar {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Flag(value) => write!(f, "{value}"),
            Self::Number(value) => write!(f, "{value}"),
            Self::Text(value) => write!(f, "{value}"),
        }
    }
}

/// Validation error for attribute/parameter maps.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueValidationError {
    /// A map key is empty or whitespace-only.
    EmptyKey,
    /// A numeric value is NaN or infinite.
    NonFiniteNumber { key: String },
}

impl Display for ValueValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyKey => write!(f, "attribute key must not be empty"),
            Self::NonFiniteNumber { key } => {
                write!(f, "attribute `{key}` holds a non-finite number")
            }
        }
    }
}

impl std::error::Error for ValueValidationError {}

/// Validates one attribute/parameter map at the store boundary.
///
/// Scoring depends on every persisted number being finite; rejecting NaN
/// and infinities here keeps the sandbox's numeric contract enforceable.
pub fn validate_attr_map(map: &AttrMap) -> Result<(), ValueValidationError> {
    for (key, value) in map {
        if key.trim().is_empty() {
            return Err(ValueValidationError::EmptyKey);
        }
        if value.first_non_finite().is_some() {
            return Err(ValueValidationError::NonFiniteNumber { key: key.clone() });
        }
    }
    Ok(())
}

/// Overlays `overrides` onto `defaults`, key by key, override wins.
///
/// Keys absent from both maps are simply not visible to scoring code.
pub fn overlay_attr_maps(defaults: &AttrMap, overrides: &AttrMap) -> AttrMap {
    let mut merged = defaults.clone();
    for (key, value) in overrides {
        merged.insert(key.clone(), value.clone());
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::{overlay_attr_maps, validate_attr_map, AttrMap, AttrValue, Scalar};

    #[test]
    fn untagged_json_round_trip() {
        let mut map = AttrMap::new();
        map.insert("price".to_string(), AttrValue::number(60.0));
        map.insert("name".to_string(), AttrValue::text("palace"));
        map.insert(
            "seasons".to_string(),
            AttrValue::list([Scalar::Text("spring".into()), Scalar::Text("autumn".into())]),
        );
        map.insert("closed_on_monday".to_string(), AttrValue::flag(true));

        let json = serde_json::to_string(&map).expect("serialize");
        let back: AttrMap = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, map);
    }

    #[test]
    fn rejects_non_finite_numbers() {
        let mut map = AttrMap::new();
        map.insert("rating".to_string(), AttrValue::number(f64::NAN));
        assert!(validate_attr_map(&map).is_err());
    }

    #[test]
    fn overlay_prefers_override_values_key_by_key() {
        let mut defaults = AttrMap::new();
        defaults.insert("limit".to_string(), AttrValue::number(500.0));
        defaults.insert("tag".to_string(), AttrValue::text("local"));

        let mut overrides = AttrMap::new();
        overrides.insert("limit".to_string(), AttrValue::number(300.0));
        overrides.insert("extra".to_string(), AttrValue::flag(true));

        let merged = overlay_attr_maps(&defaults, &overrides);
        assert_eq!(merged.get("limit"), Some(&AttrValue::number(300.0)));
        assert_eq!(merged.get("tag"), Some(&AttrValue::text("local")));
        assert_eq!(merged.get("extra"), Some(&AttrValue::flag(true)));
    }
}
