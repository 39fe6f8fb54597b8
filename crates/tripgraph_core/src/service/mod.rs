//! Admin-facing use-case services.
//!
//! # Responsibility
//! - Wrap the stores with the operations an admin surface calls: create,
//!   update, delete, get, list for elements, rules, and schemes.
//! - Invalidate the shared evaluation cache on every successful write.
//!
//! # Invariants
//! - Writes validate before touching SQL and invalidate the cache after.
//! - Ids derived from names are lowercase underscore-joined slugs; any
//!   script's letters and digits are preserved.

pub mod element_service;
pub mod rule_service;
pub mod scheme_service;

use crate::repo::RepoError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

static SLUG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\p{L}\p{N}]+").expect("valid slug regex"));

/// Derives a stable id slug from a human-facing name.
///
/// Lowercases, collapses every run of non-letter, non-digit characters to
/// one underscore, and trims leading/trailing underscores. Letters and
/// digits from any script survive, so CJK names keep their ids readable.
/// An all-symbol name gets a fresh UUID instead of an empty id.
pub(crate) fn slug_id(name: &str) -> String {
    let slug = SLUG_RE
        .replace_all(&name.to_lowercase(), "_")
        .trim_matches('_')
        .to_string();
    if slug.is_empty() {
        Uuid::new_v4().to_string()
    } else {
        slug
    }
}

/// Shared service error for the three admin facades.
#[derive(Debug)]
pub enum ServiceError {
    NotFound { kind: &'static str, id: String },
    /// A rule's scoring body was rejected at save time.
    InvalidCode(String),
    Repo(RepoError),
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound { kind, id } => write!(f, "{kind} not found: {id}"),
            Self::InvalidCode(reason) => write!(f, "invalid rule code: {reason}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for ServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound { kind, id } => Self::NotFound { kind, id },
            other => Self::Repo(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::slug_id;

    #[test]
    fn slugs_names_to_snake_case() {
        assert_eq!(slug_id("High Rating"), "high_rating");
        assert_eq!(slug_id("  Budget-Friendly! "), "budget_friendly");
        assert_eq!(slug_id("预算 Rule 2"), "预算_rule_2");
    }

    #[test]
    fn slugs_keep_cjk_names() {
        assert_eq!(slug_id("季节匹配"), "季节匹配");
        assert_eq!(slug_id("经济型住宿"), "经济型住宿");
    }

    #[test]
    fn all_symbol_name_falls_back_to_a_generated_id() {
        let id = slug_id("!!!");
        assert!(!id.is_empty());
        assert!(!id.contains('!'));
    }
}
