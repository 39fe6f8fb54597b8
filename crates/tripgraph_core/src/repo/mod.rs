//! Store contracts and SQLite implementations.
//!
//! # Responsibility
//! - Define read/write contracts for the element, rule, and scheme stores.
//! - Keep SQL and JSON-column details inside the persistence boundary.
//!
//! # Invariants
//! - Write paths validate the entity before SQL mutations.
//! - Read paths reject invalid persisted state instead of masking it.
//! - The evaluation engine only ever uses the read half of these contracts.

pub mod element_repo;
pub mod rule_repo;
pub mod scheme_repo;

use crate::db::DbError;
use crate::model::element::ElementValidationError;
use crate::model::rule::RuleValidationError;
use crate::model::scheme::SchemeValidationError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RepoResult<T> = Result<T, RepoError>;

/// Shared repository error for all three stores.
#[derive(Debug)]
pub enum RepoError {
    Element(ElementValidationError),
    Rule(RuleValidationError),
    Scheme(SchemeValidationError),
    Db(DbError),
    NotFound { kind: &'static str, id: String },
    /// A stored row is present but its JSON columns cannot be decoded.
    InvalidData(String),
    /// The id chosen for a new entity is already taken.
    DuplicateId { kind: &'static str, id: String },
}

impl RepoError {
    pub(crate) fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Element(err) => write!(f, "{err}"),
            Self::Rule(err) => write!(f, "{err}"),
            Self::Scheme(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound { kind, id } => write!(f, "{kind} not found: {id}"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
            Self::DuplicateId { kind, id } => write!(f, "{kind} id already exists: {id}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Element(err) => Some(err),
            Self::Rule(err) => Some(err),
            Self::Scheme(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ElementValidationError> for RepoError {
    fn from(value: ElementValidationError) -> Self {
        Self::Element(value)
    }
}

impl From<RuleValidationError> for RepoError {
    fn from(value: RuleValidationError) -> Self {
        Self::Rule(value)
    }
}

impl From<SchemeValidationError> for RepoError {
    fn from(value: SchemeValidationError) -> Self {
        Self::Scheme(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Decodes one JSON column, mapping failures to [`RepoError::InvalidData`].
pub(crate) fn decode_json_column<T: serde::de::DeserializeOwned>(
    table: &str,
    column: &str,
    raw: &str,
) -> RepoResult<T> {
    serde_json::from_str(raw)
        .map_err(|err| RepoError::InvalidData(format!("{table}.{column}: {err}")))
}

/// Encodes one JSON column. Encoding domain maps cannot fail in practice,
/// but the error is still surfaced rather than unwrapped.
pub(crate) fn encode_json_column<T: serde::Serialize>(
    table: &str,
    column: &str,
    value: &T,
) -> RepoResult<String> {
    serde_json::to_string(value)
        .map_err(|err| RepoError::InvalidData(format!("{table}.{column}: {err}")))
}
