//! Derivation engine over the element, rule, and scheme stores.
//!
//! # Responsibility
//! - Build rule-element and scheme-rule hyperedges from primary data.
//! - Evaluate schemes: resolve overrides, fan scoring out over a worker
//!   pool, and aggregate per-element totals.
//! - Serve repeated reads from the TTL cache.
//!
//! # Invariants
//! - The engine only reads the stores; every mutation goes through the
//!   service layer, which owns cache invalidation.
//! - One failing (rule, element) pair is recorded as a warning and never
//!   aborts the surrounding evaluation.
//! - Identical store contents produce identical results, including ordering.

mod edges;
mod scheme_eval;

use crate::cache::EvalCache;
use crate::model::element::Element;
use crate::model::hyperedge::{EvaluationWarning, ScoredElementRef};
use crate::model::rule::Rule;
use crate::model::value::AttrMap;
use crate::repo::element_repo::ElementRepository;
use crate::repo::rule_repo::RuleRepository;
use crate::repo::scheme_repo::SchemeRepository;
use crate::repo::RepoError;
use crate::sandbox::{SandboxLimits, ScoreOutcome, Scorer, ScriptScorer};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub type EngineResult<T> = Result<T, EngineError>;

/// Engine-level error. Store failures pass through; `NotFound` is kept
/// separate so callers can answer "no such entity" without string matching.
#[derive(Debug)]
pub enum EngineError {
    NotFound { kind: &'static str, id: String },
    Repo(RepoError),
    /// The cooperative cancel flag was raised mid-evaluation.
    Cancelled,
    /// The dedicated worker pool could not be created.
    Pool(rayon::ThreadPoolBuildError),
}

impl Display for EngineError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound { kind, id } => write!(f, "{kind} not found: {id}"),
            Self::Repo(err) => write!(f, "{err}"),
            Self::Cancelled => write!(f, "evaluation cancelled"),
            Self::Pool(err) => write!(f, "worker pool init failed: {err}"),
        }
    }
}

impl Error for EngineError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            Self::Pool(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for EngineError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound { kind, id } => Self::NotFound { kind, id },
            other => Self::Repo(other),
        }
    }
}

/// Tunables for one engine instance.
#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    /// Worker threads for scoring fan-out. `0` uses the rayon default.
    pub concurrency: usize,
    /// Per-invocation sandbox limits.
    pub sandbox: SandboxLimits,
    /// Lifetime of cached derived results.
    pub cache_ttl: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            concurrency: 0,
            sandbox: SandboxLimits::default(),
            cache_ttl: Duration::from_secs(60),
        }
    }
}

/// Derivation engine facade over the three store contracts.
pub struct Engine<E, R, S> {
    elements: E,
    rules: R,
    schemes: S,
    sandbox: SandboxLimits,
    pool: ThreadPool,
    cache: Arc<EvalCache>,
}

impl<E, R, S> Engine<E, R, S>
where
    E: ElementRepository,
    R: RuleRepository,
    S: SchemeRepository,
{
    /// Creates an engine with a dedicated worker pool and a fresh cache.
    pub fn new(elements: E, rules: R, schemes: S, config: EngineConfig) -> EngineResult<Self> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(config.concurrency)
            .build()
            .map_err(EngineError::Pool)?;
        Ok(Self {
            elements,
            rules,
            schemes,
            sandbox: config.sandbox,
            pool,
            cache: Arc::new(EvalCache::new(config.cache_ttl)),
        })
    }

    /// Shared cache handle, for the service layer's invalidation hook.
    pub fn cache(&self) -> Arc<EvalCache> {
        Arc::clone(&self.cache)
    }

    /// Loads the scoring universe for one rule: every element whose type the
    /// rule declares, ordered by type then id.
    fn affected_elements(&self, rule: &Rule) -> EngineResult<Vec<Element>> {
        let mut out = Vec::new();
        for element_type in &rule.affected_element_types {
            out.extend(self.elements.list_elements(Some(element_type))?);
        }
        Ok(out)
    }

    /// Scores `universe` against one compiled rule on the worker pool.
    ///
    /// Returns weighted matches in element order plus per-pair warnings.
    /// Match scores are `raw * weight`; failed pairs are excluded.
    fn score_universe(
        &self,
        rule: &Rule,
        weight: f64,
        params: &AttrMap,
        universe: &[Element],
        cancel: Option<&Arc<AtomicBool>>,
    ) -> EngineResult<(Vec<ScoredElementRef>, Vec<EvaluationWarning>)> {
        let scorer = match ScriptScorer::compile(&rule.code, self.sandbox) {
            Ok(scorer) => scorer,
            Err(err) => {
                return Ok((
                    Vec::new(),
                    vec![EvaluationWarning::InvalidRuleCode {
                        rule_id: rule.id.clone(),
                        reason: err.to_string(),
                    }],
                ))
            }
        };

        check_cancel(cancel)?;
        let outcomes: Vec<ScoreOutcome> = self.pool.install(|| {
            universe
                .par_iter()
                .map(|element| {
                    if is_cancelled(cancel) {
                        // Real outcome is discarded below once the flag is seen.
                        return ScoreOutcome::NotMatched;
                    }
                    scorer.score(&element.attributes, params)
                })
                .collect()
        });
        check_cancel(cancel)?;

        let mut matches = Vec::new();
        let mut warnings = Vec::new();
        for (element, outcome) in universe.iter().zip(outcomes) {
            match outcome {
                ScoreOutcome::Matched(raw) => matches.push(ScoredElementRef {
                    element_id: element.id.clone(),
                    element_name: element.display_name().to_string(),
                    element_type: element.element_type.clone(),
                    score: raw * weight,
                }),
                ScoreOutcome::NotMatched => {}
                ScoreOutcome::Failed(reason) => warnings.push(EvaluationWarning::ScoringFailure {
                    rule_id: rule.id.clone(),
                    element_id: element.id.clone(),
                    reason,
                }),
            }
        }
        Ok((matches, warnings))
    }
}

fn is_cancelled(cancel: Option<&Arc<AtomicBool>>) -> bool {
    cancel.is_some_and(|flag| flag.load(Ordering::Relaxed))
}

fn check_cancel(cancel: Option<&Arc<AtomicBool>>) -> EngineResult<()> {
    if is_cancelled(cancel) {
        Err(EngineError::Cancelled)
    } else {
        Ok(())
    }
}
