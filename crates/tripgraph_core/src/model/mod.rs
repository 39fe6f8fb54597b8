//! Three-layer hypergraph domain model.
//!
//! # Responsibility
//! - Define the primary entities (element, rule, scheme) and the derived
//!   aggregates (hyperedges, evaluation results) computed from them.
//!
//! # Invariants
//! - Primary entities are identified by opaque string ids.
//! - Derived shapes are never persisted; they are recomputed on demand.

pub mod element;
pub mod hyperedge;
pub mod rule;
pub mod scheme;
pub mod value;

use std::time::{SystemTime, UNIX_EPOCH};

/// Current wall clock as unix epoch milliseconds.
pub(crate) fn epoch_ms_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as i64)
        .unwrap_or(0)
}
