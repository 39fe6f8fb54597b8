//! Core engine for itinerary scoring over a three-layer hypergraph:
//! elements (typed attribute records), rules (weighted scoring code), and
//! schemes (rule selections with overrides). Relations between layers are
//! never stored; they are derived by evaluating rules against elements.

pub mod cache;
pub mod db;
pub mod engine;
pub mod logging;
pub mod model;
pub mod repo;
pub mod sandbox;
pub mod script;
pub mod service;

pub use cache::EvalCache;
pub use db::{open_db, open_db_in_memory};
pub use engine::{Engine, EngineConfig, EngineError, EngineResult};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::element::Element;
pub use model::hyperedge::{
    RuleElementHyperedge, SchemeEvaluationResult, SchemeRuleHyperedge, SelectedElement,
};
pub use model::rule::Rule;
pub use model::scheme::{RuleOverride, Scheme};
pub use model::value::{AttrMap, AttrValue, Scalar};
pub use repo::element_repo::{ElementRepository, SqliteElementRepository};
pub use repo::rule_repo::{RuleRepository, SqliteRuleRepository};
pub use repo::scheme_repo::{SchemeRepository, SqliteSchemeRepository};
pub use repo::{RepoError, RepoResult};
pub use sandbox::{SandboxLimits, ScoreOutcome, Scorer, ScriptScorer};
pub use service::element_service::ElementService;
pub use service::rule_service::{NewRule, RuleService};
pub use service::scheme_service::SchemeService;
pub use service::ServiceError;

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
