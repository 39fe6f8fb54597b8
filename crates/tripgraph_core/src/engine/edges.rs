//! Hyperedge builders: rule→elements and scheme→rules.

use crate::engine::{check_cancel, Engine, EngineError, EngineResult};
use crate::model::hyperedge::{RuleElementHyperedge, SchemeRuleHyperedge, SchemeRuleRef};
use crate::model::rule::Rule;
use crate::model::scheme::Scheme;
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
    /// Builds the derived edge for one rule, scoring every element of the
    /// rule's declared types under the rule's own weight and parameters.
    ///
    /// The edge is returned even when no element matches; only the
    /// full-catalog listing omits empty edges.
    pub fn build_rule_element_hyperedge(
        &self,
        rule_id: &str,
    ) -> EngineResult<RuleElementHyperedge> {
        self.build_rule_element_hyperedge_with_cancel(rule_id, None)
    }

    pub fn build_rule_element_hyperedge_with_cancel(
        &self,
        rule_id: &str,
        cancel: Option<&Arc<AtomicBool>>,
    ) -> EngineResult<RuleElementHyperedge> {
        if let Some(cached) = self.cache.get_rule_edge(rule_id) {
            return Ok((*cached).clone());
        }

        let rule = self
            .rules
            .get_rule(rule_id)?
            .ok_or_else(|| EngineError::NotFound {
                kind: "rule",
                id: rule_id.to_string(),
            })?;
        let edge = self.score_one_rule(&rule, cancel)?;
        self.cache.put_rule_edge(rule_id, edge.clone());
        Ok(edge)
    }

    /// Builds edges for every stored rule, omitting edges with no matched
    /// elements. Ordered by rule id.
    pub fn build_all_rule_edges(&self) -> EngineResult<Arc<Vec<RuleElementHyperedge>>> {
        self.build_all_rule_edges_with_cancel(None)
    }

    pub fn build_all_rule_edges_with_cancel(
        &self,
        cancel: Option<&Arc<AtomicBool>>,
    ) -> EngineResult<Arc<Vec<RuleElementHyperedge>>> {
        if let Some(cached) = self.cache.get_edge_catalog() {
            return Ok(cached);
        }

        let mut rules = self.rules.list_rules()?;
        rules.sort_by(|a, b| a.id.cmp(&b.id));

        let mut edges = Vec::new();
        for rule in &rules {
            check_cancel(cancel)?;
            let edge = self.score_one_rule(rule, cancel)?;
            if edge.elements_count > 0 {
                edges.push(edge);
            }
        }

        log::info!(
            "event=rule_edges_built module=engine rules={} edges={}",
            rules.len(),
            edges.len()
        );
        Ok(self.cache.put_edge_catalog(edges))
    }

    fn score_one_rule(
        &self,
        rule: &Rule,
        cancel: Option<&Arc<AtomicBool>>,
    ) -> EngineResult<RuleElementHyperedge> {
        let universe = self.affected_elements(rule)?;
        let (matches, warnings) =
            self.score_universe(rule, rule.weight, &rule.parameters, &universe, cancel)?;
        for warning in &warnings {
            log::warn!("event=rule_edge_warning module=engine rule={} detail=\"{warning}\"", rule.id);
        }
        Ok(RuleElementHyperedge::from_matches(
            rule.id.clone(),
            rule.name.clone(),
            matches,
        ))
    }

    /// Derives the scheme→rules edge for one scheme. Dangling rule
    /// references are skipped.
    pub fn scheme_rule_hyperedge(&self, scheme_id: &str) -> EngineResult<SchemeRuleHyperedge> {
        let scheme = self
            .schemes
            .get_scheme(scheme_id)?
            .ok_or_else(|| EngineError::NotFound {
                kind: "scheme",
                id: scheme_id.to_string(),
            })?;
        let rules_by_id = self.rules_by_id()?;
        Ok(resolve_scheme_rules(&scheme, &rules_by_id))
    }

    /// Derives scheme→rules edges for every stored scheme, ordered by
    /// scheme id.
    pub fn scheme_rule_hyperedges(&self) -> EngineResult<Vec<SchemeRuleHyperedge>> {
        let mut schemes = self.schemes.list_schemes()?;
        schemes.sort_by(|a, b| a.id.cmp(&b.id));
        let rules_by_id = self.rules_by_id()?;
        Ok(schemes
            .iter()
            .map(|scheme| resolve_scheme_rules(scheme, &rules_by_id))
            .collect())
    }

    pub(crate) fn rules_by_id(&self) -> EngineResult<BTreeMap<String, Rule>> {
        Ok(self
            .rules
            .list_rules()?
            .into_iter()
            .map(|rule| (rule.id.clone(), rule))
            .collect())
    }
}

fn resolve_scheme_rules(scheme: &Scheme, rules_by_id: &BTreeMap<String, Rule>) -> SchemeRuleHyperedge {
    let rules: Vec<SchemeRuleRef> = scheme
        .rule_weights
        .iter()
        .filter_map(|(rule_id, entry)| {
            let rule = rules_by_id.get(rule_id)?;
            Some(SchemeRuleRef {
                rule_id: rule_id.clone(),
                rule_name: rule.name.clone(),
                weight: entry.weight.unwrap_or(rule.weight),
                description: rule.description.clone(),
            })
        })
        .collect();
    SchemeRuleHyperedge {
        scheme_id: scheme.id.clone(),
        scheme_name: scheme.name.clone(),
        rules_count: rules.len(),
        rules,
    }
}
