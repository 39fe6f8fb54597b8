//! Scheme store contract and SQLite implementation.
//!
//! # Responsibility
//! - Provide CRUD over the `schemes` table.
//!
//! # Invariants
//! - Writes enforce `Scheme::validate()` before SQL mutations.
//! - Dangling rule references are legal persisted state; evaluation skips
//!   them with a recorded warning.

use crate::model::scheme::Scheme;
use crate::repo::{decode_json_column, encode_json_column, RepoError, RepoResult};
use rusqlite::{params, Connection, OptionalExtension, Row};

const SCHEME_SELECT_SQL: &str =
    "SELECT id, name, description, rule_weights, created_at FROM schemes";

/// Read/write contract for the scheme store.
pub trait SchemeRepository {
    fn create_scheme(&self, scheme: &Scheme) -> RepoResult<()>;
    fn update_scheme(&self, scheme: &Scheme) -> RepoResult<()>;
    fn delete_scheme(&self, id: &str) -> RepoResult<()>;
    fn get_scheme(&self, id: &str) -> RepoResult<Option<Scheme>>;
    fn list_schemes(&self) -> RepoResult<Vec<Scheme>>;
}

/// SQLite-backed scheme store.
pub struct SqliteSchemeRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteSchemeRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl SchemeRepository for SqliteSchemeRepository<'_> {
    fn create_scheme(&self, scheme: &Scheme) -> RepoResult<()> {
        scheme.validate()?;
        if self.get_scheme(&scheme.id)?.is_some() {
            return Err(RepoError::DuplicateId {
                kind: "scheme",
                id: scheme.id.clone(),
            });
        }

        self.conn.execute(
            "INSERT INTO schemes (id, name, description, rule_weights, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                scheme.id,
                scheme.name,
                scheme.description.as_deref(),
                encode_json_column("schemes", "rule_weights", &scheme.rule_weights)?,
                scheme.created_at_ms,
            ],
        )?;

        Ok(())
    }

    fn update_scheme(&self, scheme: &Scheme) -> RepoResult<()> {
        scheme.validate()?;

        let changed = self.conn.execute(
            "UPDATE schemes SET name = ?1, description = ?2, rule_weights = ?3 WHERE id = ?4;",
            params![
                scheme.name,
                scheme.description.as_deref(),
                encode_json_column("schemes", "rule_weights", &scheme.rule_weights)?,
                scheme.id,
            ],
        )?;

        if changed == 0 {
            return Err(RepoError::not_found("scheme", scheme.id.clone()));
        }
        Ok(())
    }

    fn delete_scheme(&self, id: &str) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM schemes WHERE id = ?1;", [id])?;
        if changed == 0 {
            return Err(RepoError::not_found("scheme", id));
        }
        Ok(())
    }

    fn get_scheme(&self, id: &str) -> RepoResult<Option<Scheme>> {
        let row = self
            .conn
            .query_row(
                &format!("{SCHEME_SELECT_SQL} WHERE id = ?1;"),
                [id],
                |row| Ok(parse_scheme_row(row)),
            )
            .optional()?;
        row.transpose()
    }

    fn list_schemes(&self) -> RepoResult<Vec<Scheme>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{SCHEME_SELECT_SQL} ORDER BY id ASC;"))?;
        let mut rows = stmt.query([])?;
        let mut schemes = Vec::new();
        while let Some(row) = rows.next()? {
            schemes.push(parse_scheme_row(row)?);
        }
        Ok(schemes)
    }
}

fn parse_scheme_row(row: &Row<'_>) -> RepoResult<Scheme> {
    let overrides_json: String = row.get("rule_weights")?;
    let scheme = Scheme {
        id: row.get("id")?,
        name: row.get("name")?,
        description: row.get("description")?,
        rule_weights: decode_json_column("schemes", "rule_weights", &overrides_json)?,
        created_at_ms: row.get("created_at")?,
    };
    scheme.validate()?;
    Ok(scheme)
}
