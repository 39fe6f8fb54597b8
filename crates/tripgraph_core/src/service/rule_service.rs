//! Rule use-case service.
//!
//! # Responsibility
//! - Provide rule create/update/delete/get/list APIs.
//! - Derive rule ids from names and reject bodies that fail to compile.
//!
//! # Invariants
//! - Affected element types must exist in the element store at save time.
//! - Every successful write invalidates the whole evaluation cache.

use crate::cache::EvalCache;
use crate::model::rule::{Rule, RuleValidationError};
use crate::model::value::AttrMap;
use crate::repo::element_repo::ElementRepository;
use crate::repo::rule_repo::RuleRepository;
use crate::repo::RepoResult;
use crate::sandbox::{SandboxLimits, ScriptScorer};
use crate::service::{slug_id, ServiceError};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Caller-supplied fields for a new rule; the id is derived from the name.
#[derive(Debug, Clone)]
pub struct NewRule {
    pub name: String,
    pub description: Option<String>,
    pub weight: f64,
    pub affected_element_types: BTreeSet<String>,
    pub affected_element_keys: BTreeSet<String>,
    pub parameters: AttrMap,
    pub code: String,
}

/// Rule service facade over the rule and element stores.
pub struct RuleService<E: ElementRepository, R: RuleRepository> {
    elements: E,
    rules: R,
    cache: Arc<EvalCache>,
}

impl<E: ElementRepository, R: RuleRepository> RuleService<E, R> {
    pub fn new(elements: E, rules: R, cache: Arc<EvalCache>) -> Self {
        Self {
            elements,
            rules,
            cache,
        }
    }

    /// Creates one rule. The id is the slug of the name, so two rules whose
    /// names slug identically collide with `DuplicateId`.
    pub fn create_rule(&self, spec: NewRule) -> Result<Rule, ServiceError> {
        let rule = Rule {
            id: slug_id(&spec.name),
            name: spec.name,
            description: spec.description,
            weight: spec.weight,
            affected_element_types: spec.affected_element_types,
            affected_element_keys: spec.affected_element_keys,
            parameters: spec.parameters,
            code: spec.code,
        };
        self.check_rule(&rule)?;
        self.rules.create_rule(&rule)?;
        self.cache.invalidate_all();
        log::info!(
            "event=rule_created module=service id={} weight={}",
            rule.id,
            rule.weight
        );
        Ok(rule)
    }

    /// Replaces one rule in full, keyed by its id.
    pub fn update_rule(&self, rule: Rule) -> Result<Rule, ServiceError> {
        self.check_rule(&rule)?;
        self.rules.update_rule(&rule)?;
        self.cache.invalidate_all();
        log::info!("event=rule_updated module=service id={}", rule.id);
        Ok(rule)
    }

    pub fn delete_rule(&self, id: &str) -> Result<(), ServiceError> {
        self.rules.delete_rule(id)?;
        self.cache.invalidate_all();
        log::info!("event=rule_deleted module=service id={id}");
        Ok(())
    }

    pub fn get_rule(&self, id: &str) -> RepoResult<Option<Rule>> {
        self.rules.get_rule(id)
    }

    pub fn list_rules(&self) -> RepoResult<Vec<Rule>> {
        self.rules.list_rules()
    }

    /// Save-time checks beyond shape validation: the scoring body must
    /// compile, and every declared element type must exist in the store.
    fn check_rule(&self, rule: &Rule) -> Result<(), ServiceError> {
        rule.validate().map_err(crate::repo::RepoError::from)?;
        ScriptScorer::compile(&rule.code, SandboxLimits::default())
            .map_err(|err| ServiceError::InvalidCode(err.to_string()))?;

        let known = self.elements.distinct_types()?;
        for element_type in &rule.affected_element_types {
            if !known.contains(element_type) {
                return Err(crate::repo::RepoError::Rule(
                    RuleValidationError::UnknownElementType {
                        element_type: element_type.clone(),
                    },
                )
                .into());
            }
        }
        Ok(())
    }
}
