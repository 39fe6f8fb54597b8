//! TTL cache for derived evaluation results.
//!
//! # Responsibility
//! - Hold rule-element hyperedges and scheme evaluation results for a
//!   bounded time so repeated reads skip re-scoring.
//! - Drop every snapshot the moment any element, rule, or scheme is
//!   written, since one write can change an unbounded set of results.
//!
//! # Invariants
//! - Readers only ever see a full snapshot behind an `Arc`; entries are
//!   never mutated in place.
//! - An expired entry is treated as absent even before it is pruned.

use crate::model::hyperedge::{RuleElementHyperedge, SchemeEvaluationResult};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Map of immutable snapshots that expire after a fixed TTL.
#[derive(Debug)]
pub struct TtlCache<K, V> {
    ttl: Duration,
    entries: Mutex<BTreeMap<K, Entry<V>>>,
}

#[derive(Debug)]
struct Entry<V> {
    value: Arc<V>,
    expires_at: Instant,
}

impl<K: Ord + Clone, V> TtlCache<K, V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(BTreeMap::new()),
        }
    }

    /// Returns the live snapshot for `key`, pruning it if expired.
    pub fn get(&self, key: &K) -> Option<Arc<V>> {
        let mut entries = self.lock();
        match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Some(Arc::clone(&entry.value)),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Stores a snapshot and returns the shared handle to it.
    pub fn insert(&self, key: K, value: V) -> Arc<V> {
        let value = Arc::new(value);
        self.lock().insert(
            key,
            Entry {
                value: Arc::clone(&value),
                expires_at: Instant::now() + self.ttl,
            },
        );
        value
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<K, Entry<V>>> {
        // Snapshot maps hold no invariants across entries, so a panic while
        // holding the lock cannot leave them inconsistent.
        match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Shared cache for everything the engine derives.
///
/// Writes to any store invalidate the whole cache rather than tracking which
/// rules read which attributes. The full catalog lives in its own slot:
/// rule ids are opaque caller strings, so no id value may double as a
/// reserved catalog key.
#[derive(Debug)]
pub struct EvalCache {
    rule_edges: TtlCache<String, RuleElementHyperedge>,
    edge_catalog: TtlCache<(), Vec<RuleElementHyperedge>>,
    scheme_evals: TtlCache<String, SchemeEvaluationResult>,
}

impl EvalCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            rule_edges: TtlCache::new(ttl),
            edge_catalog: TtlCache::new(ttl),
            scheme_evals: TtlCache::new(ttl),
        }
    }

    pub fn get_rule_edge(&self, rule_id: &str) -> Option<Arc<RuleElementHyperedge>> {
        self.rule_edges.get(&rule_id.to_string())
    }

    pub fn put_rule_edge(&self, rule_id: &str, edge: RuleElementHyperedge) -> Arc<RuleElementHyperedge> {
        self.rule_edges.insert(rule_id.to_string(), edge)
    }

    pub fn get_edge_catalog(&self) -> Option<Arc<Vec<RuleElementHyperedge>>> {
        self.edge_catalog.get(&())
    }

    pub fn put_edge_catalog(
        &self,
        edges: Vec<RuleElementHyperedge>,
    ) -> Arc<Vec<RuleElementHyperedge>> {
        self.edge_catalog.insert((), edges)
    }

    pub fn get_scheme_eval(&self, scheme_id: &str) -> Option<Arc<SchemeEvaluationResult>> {
        self.scheme_evals.get(&scheme_id.to_string())
    }

    pub fn put_scheme_eval(
        &self,
        scheme_id: &str,
        result: SchemeEvaluationResult,
    ) -> Arc<SchemeEvaluationResult> {
        self.scheme_evals.insert(scheme_id.to_string(), result)
    }

    /// Drops every cached result. Called after any store write.
    pub fn invalidate_all(&self) {
        self.rule_edges.clear();
        self.edge_catalog.clear();
        self.scheme_evals.clear();
    }
}
