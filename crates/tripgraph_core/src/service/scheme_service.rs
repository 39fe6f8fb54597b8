//! Scheme use-case service.
//!
//! # Responsibility
//! - Provide scheme create/update/delete/get/list APIs.
//! - Derive scheme ids from names.
//!
//! # Invariants
//! - A scheme may reference rule ids that do not (or no longer) exist;
//!   such references are logged at save time and warned about at
//!   evaluation time, never rejected.
//! - Every successful write invalidates the whole evaluation cache.

use crate::cache::EvalCache;
use crate::model::scheme::{RuleOverride, Scheme};
use crate::repo::rule_repo::RuleRepository;
use crate::repo::scheme_repo::SchemeRepository;
use crate::repo::RepoResult;
use crate::service::{slug_id, ServiceError};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Scheme service facade over the scheme and rule stores.
pub struct SchemeService<R: RuleRepository, S: SchemeRepository> {
    rules: R,
    schemes: S,
    cache: Arc<EvalCache>,
}

impl<R: RuleRepository, S: SchemeRepository> SchemeService<R, S> {
    pub fn new(rules: R, schemes: S, cache: Arc<EvalCache>) -> Self {
        Self {
            rules,
            schemes,
            cache,
        }
    }

    /// Creates one scheme. The id is the slug of the name.
    pub fn create_scheme(
        &self,
        name: impl Into<String>,
        description: Option<String>,
        rule_weights: BTreeMap<String, RuleOverride>,
    ) -> Result<Scheme, ServiceError> {
        let name = name.into();
        let scheme = Scheme::new(slug_id(&name), name, description, rule_weights);
        self.save_new(scheme)
    }

    /// Replaces one scheme in full, keyed by its id.
    pub fn update_scheme(&self, scheme: Scheme) -> Result<Scheme, ServiceError> {
        self.log_dangling_refs(&scheme)?;
        self.schemes.update_scheme(&scheme)?;
        self.cache.invalidate_all();
        log::info!("event=scheme_updated module=service id={}", scheme.id);
        Ok(scheme)
    }

    pub fn delete_scheme(&self, id: &str) -> Result<(), ServiceError> {
        self.schemes.delete_scheme(id)?;
        self.cache.invalidate_all();
        log::info!("event=scheme_deleted module=service id={id}");
        Ok(())
    }

    pub fn get_scheme(&self, id: &str) -> RepoResult<Option<Scheme>> {
        self.schemes.get_scheme(id)
    }

    pub fn list_schemes(&self) -> RepoResult<Vec<Scheme>> {
        self.schemes.list_schemes()
    }

    fn save_new(&self, scheme: Scheme) -> Result<Scheme, ServiceError> {
        self.log_dangling_refs(&scheme)?;
        self.schemes.create_scheme(&scheme)?;
        self.cache.invalidate_all();
        log::info!(
            "event=scheme_created module=service id={} rules={}",
            scheme.id,
            scheme.rule_weights.len()
        );
        Ok(scheme)
    }

    fn log_dangling_refs(&self, scheme: &Scheme) -> Result<(), ServiceError> {
        for rule_id in scheme.rule_weights.keys() {
            if self.rules.get_rule(rule_id)?.is_none() {
                log::warn!(
                    "event=scheme_dangling_rule module=service scheme={} rule={rule_id}",
                    scheme.id
                );
            }
        }
        Ok(())
    }
}
