//! Scheme evaluation: override resolution, scoring fan-out, aggregation.

use crate::engine::{check_cancel, Engine, EngineError, EngineResult};
use crate::model::hyperedge::{
    sort_by_score_then_id, EvaluationWarning, SchemeEvaluationResult, SelectedElement,
};
use crate::model::value::overlay_attr_maps;
use crate::repo::element_repo::ElementRepository;
use crate::repo::rule_repo::RuleRepository;
use crate::repo::scheme_repo::SchemeRepository;
use std::collections::BTreeMap;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

impl<E, R, S> Engine<E, R, S>
where
    E: ElementRepository,
    R: RuleRepository,
    S: SchemeRepository,
{
    /// Evaluates one scheme: every selected rule scores its universe under
    /// the scheme's effective weight and parameters, and per-element scores
    /// are summed across rules.
    pub fn evaluate_scheme(&self, scheme_id: &str) -> EngineResult<Arc<SchemeEvaluationResult>> {
        self.evaluate_scheme_with_cancel(scheme_id, None)
    }

    pub fn evaluate_scheme_with_cancel(
        &self,
        scheme_id: &str,
        cancel: Option<&Arc<AtomicBool>>,
    ) -> EngineResult<Arc<SchemeEvaluationResult>> {
        if let Some(cached) = self.cache.get_scheme_eval(scheme_id) {
            return Ok(cached);
        }

        let scheme = self
            .schemes
            .get_scheme(scheme_id)?
            .ok_or_else(|| EngineError::NotFound {
                kind: "scheme",
                id: scheme_id.to_string(),
            })?;
        let rules_by_id = self.rules_by_id()?;

        let mut warnings = Vec::new();
        // element_id -> (element payload, rule_id -> weighted score)
        let mut per_element: BTreeMap<String, ElementAccumulator> = BTreeMap::new();

        for (rule_id, entry) in &scheme.rule_weights {
            check_cancel(cancel)?;
            let Some(rule) = rules_by_id.get(rule_id) else {
                warnings.push(EvaluationWarning::DanglingRule {
                    rule_id: rule_id.clone(),
                });
                continue;
            };

            // Weight and parameters fall back to the rule independently.
            let weight = entry.weight.unwrap_or(rule.weight);
            let params = overlay_attr_maps(&rule.parameters, &entry.parameters);

            let universe = self.affected_elements(rule)?;
            let (matches, rule_warnings) =
                self.score_universe(rule, weight, &params, &universe, cancel)?;
            warnings.extend(rule_warnings);

            for matched in matches {
                let accumulator = per_element
                    .entry(matched.element_id.clone())
                    .or_insert_with(|| {
                        let stored = universe
                            .iter()
                            .find(|element| element.id == matched.element_id);
                        ElementAccumulator {
                            element_type: matched.element_type.clone(),
                            attributes: stored
                                .map(|element| element.attributes.clone())
                                .unwrap_or_default(),
                            rule_scores: BTreeMap::new(),
                        }
                    });
                accumulator
                    .rule_scores
                    .insert(rule_id.clone(), matched.score);
            }
        }

        let mut selected_elements: Vec<SelectedElement> = per_element
            .into_iter()
            .map(|(element_id, acc)| SelectedElement {
                element_id,
                element_type: acc.element_type,
                attributes: acc.attributes,
                score: acc.rule_scores.values().sum(),
                rule_scores: acc.rule_scores,
            })
            .collect();
        sort_by_score_then_id(&mut selected_elements, |entry| {
            (entry.score, &entry.element_id)
        });

        let scheme_score = selected_elements.iter().map(|entry| entry.score).sum();
        for warning in &warnings {
            log::warn!(
                "event=scheme_eval_warning module=engine scheme={scheme_id} detail=\"{warning}\""
            );
        }
        log::info!(
            "event=scheme_evaluated module=engine scheme={scheme_id} selected={} warnings={}",
            selected_elements.len(),
            warnings.len()
        );

        let result = SchemeEvaluationResult {
            scheme_id: scheme.id,
            scheme_name: scheme.name,
            scheme_score,
            selected_elements,
            warnings,
        };
        Ok(self.cache.put_scheme_eval(scheme_id, result))
    }

    /// Evaluates every stored scheme, ordered by scheme id. Each result is
    /// cached individually.
    pub fn evaluate_all_schemes(&self) -> EngineResult<Vec<Arc<SchemeEvaluationResult>>> {
        self.evaluate_all_schemes_with_cancel(None)
    }

    pub fn evaluate_all_schemes_with_cancel(
        &self,
        cancel: Option<&Arc<AtomicBool>>,
    ) -> EngineResult<Vec<Arc<SchemeEvaluationResult>>> {
        let mut schemes = self.schemes.list_schemes()?;
        schemes.sort_by(|a, b| a.id.cmp(&b.id));
        schemes
            .iter()
            .map(|scheme| self.evaluate_scheme_with_cancel(&scheme.id, cancel))
            .collect()
    }
}

struct ElementAccumulator {
    element_type: String,
    attributes: crate::model::value::AttrMap,
    rule_scores: BTreeMap<String, f64>,
}
