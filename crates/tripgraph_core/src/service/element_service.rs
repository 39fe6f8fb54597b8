//! Element use-case service.
//!
//! # Responsibility
//! - Provide element create/update/delete/get/list APIs.
//! - Keep attribute updates merge-only; `element_type` never changes.
//!
//! # Invariants
//! - Every successful write invalidates the whole evaluation cache.

use crate::cache::EvalCache;
use crate::model::element::Element;
use crate::model::value::AttrMap;
use crate::repo::element_repo::ElementRepository;
use crate::repo::RepoResult;
use crate::service::ServiceError;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use uuid::Uuid;

/// Element service facade over a store implementation.
pub struct ElementService<R: ElementRepository> {
    repo: R,
    cache: Arc<EvalCache>,
}

impl<R: ElementRepository> ElementService<R> {
    pub fn new(repo: R, cache: Arc<EvalCache>) -> Self {
        Self { repo, cache }
    }

    /// Creates one element. A `None` id gets a fresh UUID.
    pub fn create_element(
        &self,
        id: Option<String>,
        element_type: impl Into<String>,
        attributes: AttrMap,
    ) -> Result<Element, ServiceError> {
        let id = id.unwrap_or_else(|| Uuid::new_v4().to_string());
        let element = Element::new(id, element_type, attributes);
        self.repo.create_element(&element)?;
        self.cache.invalidate_all();
        log::info!(
            "event=element_created module=service id={} type={}",
            element.id,
            element.element_type
        );
        Ok(element)
    }

    /// Merges `attributes` into the stored map, key by key. Absent keys keep
    /// their stored value; the element type is never touched.
    pub fn update_attributes(
        &self,
        id: &str,
        attributes: AttrMap,
    ) -> Result<Element, ServiceError> {
        let element = self.repo.update_attributes(id, &attributes)?;
        self.cache.invalidate_all();
        log::info!(
            "event=element_updated module=service id={id} keys={}",
            attributes.len()
        );
        Ok(element)
    }

    pub fn delete_element(&self, id: &str) -> Result<(), ServiceError> {
        self.repo.delete_element(id)?;
        self.cache.invalidate_all();
        log::info!("event=element_deleted module=service id={id}");
        Ok(())
    }

    pub fn get_element(&self, id: &str) -> RepoResult<Option<Element>> {
        self.repo.get_element(id)
    }

    /// Lists elements, optionally restricted to one type, ordered by id.
    pub fn list_elements(&self, element_type: Option<&str>) -> RepoResult<Vec<Element>> {
        self.repo.list_elements(element_type)
    }

    pub fn distinct_types(&self) -> RepoResult<BTreeSet<String>> {
        self.repo.distinct_types()
    }

    /// Lists every element grouped by type, the shape list views render.
    pub fn list_grouped(&self) -> RepoResult<BTreeMap<String, Vec<Element>>> {
        let mut grouped: BTreeMap<String, Vec<Element>> = BTreeMap::new();
        for element in self.repo.list_elements(None)? {
            grouped
                .entry(element.element_type.clone())
                .or_default()
                .push(element);
        }
        Ok(grouped)
    }
}
