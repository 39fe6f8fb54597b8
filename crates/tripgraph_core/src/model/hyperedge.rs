//! Derived hyperedge and evaluation result shapes.
//!
//! # Responsibility
//! - Define the non-persisted aggregates recomputed from primary data:
//!   rule→elements, scheme→rules, and per-scheme evaluation results.
//!
//! # Invariants
//! - Element lists are sorted by score descending, element id ascending.
//! - `total_score` / `scheme_score` are exact sums of their member scores.

use crate::model::value::AttrMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

/// One matched element inside a [`RuleElementHyperedge`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredElementRef {
    pub element_id: String,
    pub element_name: String,
    pub element_type: String,
    /// Raw sandbox score multiplied by the effective rule weight.
    pub score: f64,
}

/// Derived relation connecting one rule to every element it matches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleElementHyperedge {
    /// Synthetic edge id, `rule_edge_{rule_id}`.
    pub id: String,
    pub rule_id: String,
    pub rule_name: String,
    pub elements_count: usize,
    pub elements: Vec<ScoredElementRef>,
    pub total_score: f64,
}

impl RuleElementHyperedge {
    /// Builds the edge from unsorted matches, applying the canonical sort
    /// and aggregate sum.
    pub fn from_matches(
        rule_id: impl Into<String>,
        rule_name: impl Into<String>,
        mut elements: Vec<ScoredElementRef>,
    ) -> Self {
        sort_by_score_then_id(&mut elements, |entry| (entry.score, &entry.element_id));
        let rule_id = rule_id.into();
        let total_score = elements.iter().map(|entry| entry.score).sum();
        Self {
            id: format!("rule_edge_{rule_id}"),
            rule_id,
            rule_name: rule_name.into(),
            elements_count: elements.len(),
            elements,
            total_score,
        }
    }
}

/// One resolved rule inside a [`SchemeRuleHyperedge`], carrying its
/// effective weight after override resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemeRuleRef {
    pub rule_id: String,
    pub rule_name: String,
    /// Effective weight: the scheme override when present, else the rule's own.
    pub weight: f64,
    #[serde(default)]
    pub description: Option<String>,
}

/// Derived relation connecting one scheme to the rules it actually uses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemeRuleHyperedge {
    pub scheme_id: String,
    pub scheme_name: String,
    pub rules_count: usize,
    /// Resolved rules only; dangling references are excluded.
    pub rules: Vec<SchemeRuleRef>,
}

/// One selected element inside a [`SchemeEvaluationResult`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectedElement {
    pub element_id: String,
    #[serde(rename = "type")]
    pub element_type: String,
    pub attributes: AttrMap,
    /// Sum of all values in `rule_scores`.
    pub score: f64,
    /// rule_id -> raw score times effective weight.
    pub rule_scores: BTreeMap<String, f64>,
}

/// Non-fatal problem recorded while evaluating a scheme or building edges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EvaluationWarning {
    /// The scheme references a rule id absent from the rule store.
    DanglingRule { rule_id: String },
    /// A rule's code failed to compile; the rule scored no elements.
    InvalidRuleCode { rule_id: String, reason: String },
    /// One (rule, element) pair failed during scoring and was excluded.
    ScoringFailure {
        rule_id: String,
        element_id: String,
        reason: String,
    },
}

impl Display for EvaluationWarning {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DanglingRule { rule_id } => {
                write!(f, "scheme references missing rule `{rule_id}`")
            }
            Self::InvalidRuleCode { rule_id, reason } => {
                write!(f, "rule `{rule_id}` code rejected: {reason}")
            }
            Self::ScoringFailure {
                rule_id,
                element_id,
                reason,
            } => write!(
                f,
                "rule `{rule_id}` failed on element `{element_id}`: {reason}"
            ),
        }
    }
}

/// Best-effort result of evaluating one scheme.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemeEvaluationResult {
    pub scheme_id: String,
    pub scheme_name: String,
    /// Sum of all selected element scores; not an average and not clipped.
    pub scheme_score: f64,
    pub selected_elements: Vec<SelectedElement>,
    /// Recorded per-pair failures and dangling references.
    pub warnings: Vec<EvaluationWarning>,
}

/// Sorts entries by score descending, breaking ties by id ascending.
///
/// Scores are finite by the sandbox's numeric contract, so the partial
/// comparison never observes NaN.
pub(crate) fn sort_by_score_then_id<T, F>(entries: &mut [T], key: F)
where
    F: Fn(&T) -> (f64, &String),
{
    entries.sort_by(|a, b| {
        let (score_a, id_a) = key(a);
        let (score_b, id_b) = key(b);
        score_b
            .partial_cmp(&score_a)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| id_a.cmp(id_b))
    });
}

#[cfg(test)]
mod tests {
    use super::{RuleElementHyperedge, ScoredElementRef};

    fn entry(id: &str, score: f64) -> ScoredElementRef {
        ScoredElementRef {
            element_id: id.to_string(),
            element_name: id.to_string(),
            element_type: "attraction".to_string(),
            score,
        }
    }

    #[test]
    fn from_matches_sorts_and_sums() {
        let edge = RuleElementHyperedge::from_matches(
            "rule_rating",
            "high rating",
            vec![entry("A2", 4.5), entry("A1", 4.8), entry("A3", 4.5)],
        );
        assert_eq!(edge.id, "rule_edge_rule_rating");
        assert_eq!(edge.elements_count, 3);
        let ids: Vec<&str> = edge
            .elements
            .iter()
            .map(|e| e.element_id.as_str())
            .collect();
        assert_eq!(ids, ["A1", "A2", "A3"]);
        assert!((edge.total_score - 13.8).abs() < 1e-9);
    }
}
