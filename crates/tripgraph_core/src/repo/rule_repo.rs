//! Rule store contract and SQLite implementation.
//!
//! # Responsibility
//! - Provide CRUD over the `rules` table.
//!
//! # Invariants
//! - Writes enforce `Rule::validate()` before SQL mutations.
//! - List order is `id ASC`.

use crate::model::epoch_ms_now;
use crate::model::rule::Rule;
use crate::repo::{decode_json_column, encode_json_column, RepoError, RepoResult};
use rusqlite::{params, Connection, OptionalExtension, Row};

const RULE_SELECT_SQL: &str = "SELECT
    id,
    name,
    description,
    weight,
    affected_element_types,
    affected_element_keys,
    parameters,
    code
FROM rules";

/// Read/write contract for the rule store.
pub trait RuleRepository {
    fn create_rule(&self, rule: &Rule) -> RepoResult<()>;
    fn update_rule(&self, rule: &Rule) -> RepoResult<()>;
    fn delete_rule(&self, id: &str) -> RepoResult<()>;
    fn get_rule(&self, id: &str) -> RepoResult<Option<Rule>>;
    fn list_rules(&self) -> RepoResult<Vec<Rule>>;
}

/// SQLite-backed rule store.
pub struct SqliteRuleRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteRuleRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl RuleRepository for SqliteRuleRepository<'_> {
    fn create_rule(&self, rule: &Rule) -> RepoResult<()> {
        rule.validate()?;
        if self.get_rule(&rule.id)?.is_some() {
            return Err(RepoError::DuplicateId {
                kind: "rule",
                id: rule.id.clone(),
            });
        }

        let now = epoch_ms_now();
        self.conn.execute(
            "INSERT INTO rules (
                id, name, description, weight,
                affected_element_types, affected_element_keys,
                parameters, code, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10);",
            params![
                rule.id,
                rule.name,
                rule.description.as_deref(),
                rule.weight,
                encode_json_column("rules", "affected_element_types", &rule.affected_element_types)?,
                encode_json_column("rules", "affected_element_keys", &rule.affected_element_keys)?,
                encode_json_column("rules", "parameters", &rule.parameters)?,
                rule.code,
                now,
                now,
            ],
        )?;

        Ok(())
    }

    fn update_rule(&self, rule: &Rule) -> RepoResult<()> {
        rule.validate()?;

        let changed = self.conn.execute(
            "UPDATE rules SET
                name = ?1,
                description = ?2,
                weight = ?3,
                affected_element_types = ?4,
                affected_element_keys = ?5,
                parameters = ?6,
                code = ?7,
                updated_at = ?8
             WHERE id = ?9;",
            params![
                rule.name,
                rule.description.as_deref(),
                rule.weight,
                encode_json_column("rules", "affected_element_types", &rule.affected_element_types)?,
                encode_json_column("rules", "affected_element_keys", &rule.affected_element_keys)?,
                encode_json_column("rules", "parameters", &rule.parameters)?,
                rule.code,
                epoch_ms_now(),
                rule.id,
            ],
        )?;

        if changed == 0 {
            return Err(RepoError::not_found("rule", rule.id.clone()));
        }
        Ok(())
    }

    fn delete_rule(&self, id: &str) -> RepoResult<()> {
        let changed = self.conn.execute("DELETE FROM rules WHERE id = ?1;", [id])?;
        if changed == 0 {
            return Err(RepoError::not_found("rule", id));
        }
        Ok(())
    }

    fn get_rule(&self, id: &str) -> RepoResult<Option<Rule>> {
        let row = self
            .conn
            .query_row(
                &format!("{RULE_SELECT_SQL} WHERE id = ?1;"),
                [id],
                |row| Ok(parse_rule_row(row)),
            )
            .optional()?;
        row.transpose()
    }

    fn list_rules(&self) -> RepoResult<Vec<Rule>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{RULE_SELECT_SQL} ORDER BY id ASC;"))?;
        let mut rows = stmt.query([])?;
        let mut rules = Vec::new();
        while let Some(row) = rows.next()? {
            rules.push(parse_rule_row(row)?);
        }
        Ok(rules)
    }
}

fn parse_rule_row(row: &Row<'_>) -> RepoResult<Rule> {
    let types_json: String = row.get("affected_element_types")?;
    let keys_json: String = row.get("affected_element_keys")?;
    let params_json: String = row.get("parameters")?;

    let rule = Rule {
        id: row.get("id")?,
        name: row.get("name")?,
        description: row.get("description")?,
        weight: row.get("weight")?,
        affected_element_types: decode_json_column(
            "rules",
            "affected_element_types",
            &types_json,
        )?,
        affected_element_keys: decode_json_column("rules", "affected_element_keys", &keys_json)?,
        parameters: decode_json_column("rules", "parameters", &params_json)?,
        code: row.get("code")?,
    };
    rule.validate()?;
    Ok(rule)
}
