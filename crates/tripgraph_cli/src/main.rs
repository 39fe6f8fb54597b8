//! Demo entry point.
//!
//! # Responsibility
//! - Seed an in-memory store with a small itinerary catalog, derive the
//!   hyperedges, and evaluate the demo schemes.
//! - Keep output deterministic for quick local sanity checks.

use std::collections::{BTreeMap, BTreeSet};
use std::process::ExitCode;

use tripgraph_core::model::value::Scalar;
use tripgraph_core::{
    open_db_in_memory, AttrMap, AttrValue, ElementService, Engine, EngineConfig, NewRule,
    RuleOverride, RuleService, SchemeService, SqliteElementRepository, SqliteRuleRepository,
    SqliteSchemeRepository,
};

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("tripgraph demo failed: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let conn = open_db_in_memory()?;
    let engine = Engine::new(
        SqliteElementRepository::new(&conn),
        SqliteRuleRepository::new(&conn),
        SqliteSchemeRepository::new(&conn),
        EngineConfig::default(),
    )?;
    let cache = engine.cache();

    let elements = ElementService::new(SqliteElementRepository::new(&conn), cache.clone());
    let rules = RuleService::new(
        SqliteElementRepository::new(&conn),
        SqliteRuleRepository::new(&conn),
        cache.clone(),
    );
    let schemes = SchemeService::new(
        SqliteRuleRepository::new(&conn),
        SqliteSchemeRepository::new(&conn),
        cache,
    );

    seed_elements(&elements)?;
    seed_rules(&rules)?;
    seed_schemes(&schemes)?;

    println!("== rule-element hyperedges ==");
    for edge in engine.build_all_rule_edges()?.iter() {
        println!(
            "{} rule={} elements={} total_score={:.2}",
            edge.id, edge.rule_name, edge.elements_count, edge.total_score
        );
        for entry in &edge.elements {
            println!("  {} {} score={:.2}", entry.element_id, entry.element_name, entry.score);
        }
    }

    println!("== scheme-rule hyperedges ==");
    for edge in engine.scheme_rule_hyperedges()? {
        let rule_ids: Vec<&str> = edge.rules.iter().map(|r| r.rule_id.as_str()).collect();
        println!(
            "{} rules={} [{}]",
            edge.scheme_id,
            edge.rules_count,
            rule_ids.join(", ")
        );
    }

    println!("== scheme evaluations ==");
    for result in engine.evaluate_all_schemes()? {
        println!(
            "{} \"{}\" score={:.2} selected={} warnings={}",
            result.scheme_id,
            result.scheme_name,
            result.scheme_score,
            result.selected_elements.len(),
            result.warnings.len()
        );
        for element in &result.selected_elements {
            println!(
                "  {} score={:.2} rules={}",
                element.element_id,
                element.score,
                serde_json::to_string(&element.rule_scores)?
            );
        }
    }

    Ok(())
}

fn attrs(entries: &[(&str, AttrValue)]) -> AttrMap {
    entries
        .iter()
        .map(|(key, value)| (key.to_string(), value.clone()))
        .collect()
}

fn seed_elements(
    service: &ElementService<SqliteElementRepository<'_>>,
) -> Result<(), Box<dyn std::error::Error>> {
    let catalog = [
        (
            "A1",
            "attraction",
            attrs(&[
                ("name", AttrValue::text("Summer Palace")),
                ("rating", AttrValue::number(4.7)),
                ("price", AttrValue::number(60.0)),
                (
                    "seasons",
                    AttrValue::list([Scalar::Text("spring".into()), Scalar::Text("autumn".into())]),
                ),
            ]),
        ),
        (
            "A2",
            "attraction",
            attrs(&[
                ("name", AttrValue::text("Palace Museum")),
                ("rating", AttrValue::number(4.8)),
                ("price", AttrValue::number(120.0)),
                ("closed_on_monday", AttrValue::flag(true)),
            ]),
        ),
        (
            "F1",
            "food",
            attrs(&[
                ("name", AttrValue::text("Noodle House")),
                ("rating", AttrValue::number(4.4)),
                ("price", AttrValue::number(45.0)),
            ]),
        ),
        (
            "L1",
            "lodging",
            attrs(&[
                ("name", AttrValue::text("Lakeside Hotel")),
                ("rating", AttrValue::number(4.2)),
                ("price", AttrValue::number(380.0)),
            ]),
        ),
        (
            "L2",
            "lodging",
            attrs(&[
                ("name", AttrValue::text("Old Town Hostel")),
                ("rating", AttrValue::number(4.0)),
                ("price", AttrValue::number(150.0)),
            ]),
        ),
    ];

    for (id, element_type, attributes) in catalog {
        service.create_element(Some(id.to_string()), element_type, attributes)?;
    }
    Ok(())
}

fn seed_rules(
    service: &RuleService<SqliteElementRepository<'_>, SqliteRuleRepository<'_>>,
) -> Result<(), Box<dyn std::error::Error>> {
    let types = |names: &[&str]| -> BTreeSet<String> {
        names.iter().map(|name| name.to_string()).collect()
    };
    let keys = |names: &[&str]| -> BTreeSet<String> {
        names.iter().map(|name| name.to_string()).collect()
    };

    let specs = [
        NewRule {
            name: "High Rating".to_string(),
            description: Some("Reward highly rated spots".to_string()),
            weight: 2.0,
            affected_element_types: types(&["attraction", "food"]),
            affected_element_keys: keys(&["rating"]),
            parameters: attrs(&[("floor", AttrValue::number(4.5))]),
            code: "let rating = attr(\"rating\", 0);\nif rating >= param(\"floor\") then rating else 0"
                .to_string(),
        },
        NewRule {
            name: "Budget Friendly".to_string(),
            description: Some("Prefer cheap tickets and rooms".to_string()),
            weight: 1.0,
            affected_element_types: types(&["attraction", "food", "lodging"]),
            affected_element_keys: keys(&["price"]),
            parameters: attrs(&[("limit", AttrValue::number(200.0))]),
            code: "if attr(\"price\", 0) < param(\"limit\") then 1 else 0".to_string(),
        },
        NewRule {
            name: "Autumn Season".to_string(),
            description: None,
            weight: 1.5,
            affected_element_types: types(&["attraction"]),
            affected_element_keys: keys(&["seasons"]),
            parameters: AttrMap::new(),
            code: "if \"autumn\" in attr(\"seasons\", \"\") then 1 else 0".to_string(),
        },
        NewRule {
            name: "Open Mondays".to_string(),
            description: Some("Penalize nothing; only score places open on Monday".to_string()),
            weight: 1.0,
            affected_element_types: types(&["attraction"]),
            affected_element_keys: keys(&["closed_on_monday"]),
            parameters: AttrMap::new(),
            code: "if attr(\"closed_on_monday\", false) then 0 else 1".to_string(),
        },
        NewRule {
            name: "Comfort Stay".to_string(),
            description: None,
            weight: 1.0,
            affected_element_types: types(&["lodging"]),
            affected_element_keys: keys(&["rating"]),
            parameters: AttrMap::new(),
            code: "attr(\"rating\", 0) - 3.5".to_string(),
        },
    ];

    for spec in specs {
        service.create_rule(spec)?;
    }
    Ok(())
}

fn seed_schemes(
    service: &SchemeService<SqliteRuleRepository<'_>, SqliteSchemeRepository<'_>>,
) -> Result<(), Box<dyn std::error::Error>> {
    service.create_scheme(
        "Quality First",
        Some("Ratings dominate".to_string()),
        BTreeMap::from([
            ("high_rating".to_string(), RuleOverride::with_weight(3.0)),
            ("autumn_season".to_string(), RuleOverride::default()),
            ("open_mondays".to_string(), RuleOverride::default()),
        ]),
    )?;

    let mut tight_budget = RuleOverride::with_weight(2.5);
    tight_budget
        .parameters
        .insert("limit".to_string(), AttrValue::number(100.0));
    service.create_scheme(
        "Shoestring Trip",
        Some("Cheaper is better".to_string()),
        BTreeMap::from([
            ("budget_friendly".to_string(), tight_budget),
            ("comfort_stay".to_string(), RuleOverride::default()),
        ]),
    )?;

    service.create_scheme(
        "Balanced Weekend",
        None,
        BTreeMap::from([
            ("high_rating".to_string(), RuleOverride::default()),
            ("budget_friendly".to_string(), RuleOverride::default()),
            ("comfort_stay".to_string(), RuleOverride::default()),
        ]),
    )?;

    Ok(())
}
