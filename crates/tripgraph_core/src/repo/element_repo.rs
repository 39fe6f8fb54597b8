//! Element store contract and SQLite implementation.
//!
//! # Responsibility
//! - Provide CRUD over the `elements` table.
//! - Keep the open attribute schema intact across the JSON column boundary.
//!
//! # Invariants
//! - `element_type` is never changed by update paths.
//! - Attribute updates merge key-by-key; absent keys keep their stored value.
//! - List order is `id ASC` for deterministic downstream evaluation.

use crate::model::element::Element;
use crate::model::epoch_ms_now;
use crate::model::value::{validate_attr_map, AttrMap};
use crate::repo::{decode_json_column, encode_json_column, RepoError, RepoResult};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::BTreeSet;

const ELEMENT_SELECT_SQL: &str =
    "SELECT id, element_type, attributes, created_at, updated_at FROM elements";

/// Read/write contract for the element store.
///
/// The engine consumes only the read half; mutation is reserved for the
/// admin-facing service layer.
pub trait ElementRepository {
    fn create_element(&self, element: &Element) -> RepoResult<()>;
    /// Merges `attributes` into the stored map, key by key.
    fn update_attributes(&self, id: &str, attributes: &AttrMap) -> RepoResult<Element>;
    fn delete_element(&self, id: &str) -> RepoResult<()>;
    fn get_element(&self, id: &str) -> RepoResult<Option<Element>>;
    /// Lists elements, optionally restricted to one type, ordered by id.
    fn list_elements(&self, element_type: Option<&str>) -> RepoResult<Vec<Element>>;
    /// Returns every element type currently present in the store.
    fn distinct_types(&self) -> RepoResult<BTreeSet<String>>;
}

/// SQLite-backed element store.
pub struct SqliteElementRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteElementRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl ElementRepository for SqliteElementRepository<'_> {
    fn create_element(&self, element: &Element) -> RepoResult<()> {
        element.validate()?;
        if self.get_element(&element.id)?.is_some() {
            return Err(RepoError::DuplicateId {
                kind: "element",
                id: element.id.clone(),
            });
        }

        self.conn.execute(
            "INSERT INTO elements (id, element_type, attributes, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                element.id,
                element.element_type,
                encode_json_column("elements", "attributes", &element.attributes)?,
                element.created_at_ms,
                element.updated_at_ms,
            ],
        )?;

        Ok(())
    }

    fn update_attributes(&self, id: &str, attributes: &AttrMap) -> RepoResult<Element> {
        validate_attr_map(attributes)
            .map_err(crate::model::element::ElementValidationError::from)?;

        let mut element = self
            .get_element(id)?
            .ok_or_else(|| RepoError::not_found("element", id))?;

        for (key, value) in attributes {
            element.attributes.insert(key.clone(), value.clone());
        }
        element.updated_at_ms = epoch_ms_now();

        self.conn.execute(
            "UPDATE elements SET attributes = ?1, updated_at = ?2 WHERE id = ?3;",
            params![
                encode_json_column("elements", "attributes", &element.attributes)?,
                element.updated_at_ms,
                id,
            ],
        )?;

        Ok(element)
    }

    fn delete_element(&self, id: &str) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM elements WHERE id = ?1;", [id])?;
        if changed == 0 {
            return Err(RepoError::not_found("element", id));
        }
        Ok(())
    }

    fn get_element(&self, id: &str) -> RepoResult<Option<Element>> {
        let row = self
            .conn
            .query_row(&format!("{ELEMENT_SELECT_SQL} WHERE id = ?1;"), [id], |row| {
                Ok(parse_element_row(row))
            })
            .optional()?;
        row.transpose()
    }

    fn list_elements(&self, element_type: Option<&str>) -> RepoResult<Vec<Element>> {
        let (sql, binds): (String, Vec<&str>) = match element_type {
            Some(kind) => (
                format!("{ELEMENT_SELECT_SQL} WHERE element_type = ?1 ORDER BY id ASC;"),
                vec![kind],
            ),
            None => (format!("{ELEMENT_SELECT_SQL} ORDER BY id ASC;"), vec![]),
        };

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(rusqlite::params_from_iter(binds))?;
        let mut elements = Vec::new();
        while let Some(row) = rows.next()? {
            elements.push(parse_element_row(row)?);
        }
        Ok(elements)
    }

    fn distinct_types(&self) -> RepoResult<BTreeSet<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT element_type FROM elements;")?;
        let mut rows = stmt.query([])?;
        let mut types = BTreeSet::new();
        while let Some(row) = rows.next()? {
            types.insert(row.get::<_, String>(0)?);
        }
        Ok(types)
    }
}

fn parse_element_row(row: &Row<'_>) -> RepoResult<Element> {
    let attributes_json: String = row.get("attributes")?;
    let element = Element {
        id: row.get("id")?,
        element_type: row.get("element_type")?,
        attributes: decode_json_column("elements", "attributes", &attributes_json)?,
        created_at_ms: row.get("created_at")?,
        updated_at_ms: row.get("updated_at")?,
    };
    element.validate()?;
    Ok(element)
}
