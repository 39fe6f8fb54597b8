use std::collections::{BTreeMap, BTreeSet};

use rusqlite::Connection;
use tripgraph_core::db::open_db_in_memory;
use tripgraph_core::model::hyperedge::EvaluationWarning;
use tripgraph_core::model::scheme::RuleOverride;
use tripgraph_core::{
    AttrMap, AttrValue, Element, ElementRepository, Engine, EngineConfig, EngineError, Rule,
    RuleRepository, Scheme, SchemeRepository, SqliteElementRepository, SqliteRuleRepository,
    SqliteSchemeRepository,
};

fn attrs(entries: &[(&str, AttrValue)]) -> AttrMap {
    entries
        .iter()
        .map(|(key, value)| (key.to_string(), value.clone()))
        .collect()
}

fn rule(id: &str, weight: f64, params: AttrMap, code: &str) -> Rule {
    Rule {
        id: id.to_string(),
        name: format!("rule {id}"),
        description: None,
        weight,
        affected_element_types: BTreeSet::from(["attraction".to_string()]),
        affected_element_keys: BTreeSet::new(),
        parameters: params,
        code: code.to_string(),
    }
}

fn engine(
    conn: &Connection,
) -> Engine<
    SqliteElementRepository<'_>,
    SqliteRuleRepository<'_>,
    SqliteSchemeRepository<'_>,
> {
    Engine::new(
        SqliteElementRepository::new(conn),
        SqliteRuleRepository::new(conn),
        SqliteSchemeRepository::new(conn),
        EngineConfig::default(),
    )
    .unwrap()
}

fn seed(conn: &Connection) {
    let elements = SqliteElementRepository::new(conn);
    elements
        .create_element(&Element::new(
            "A1",
            "attraction",
            attrs(&[
                ("rating", AttrValue::number(4.7)),
                ("price", AttrValue::number(60.0)),
            ]),
        ))
        .unwrap();
    elements
        .create_element(&Element::new(
            "A2",
            "attraction",
            attrs(&[
                ("rating", AttrValue::number(4.8)),
                ("price", AttrValue::number(120.0)),
                ("closed_on_monday", AttrValue::flag(true)),
            ]),
        ))
        .unwrap();

    let rules = SqliteRuleRepository::new(conn);
    rules
        .create_rule(&rule(
            "high_rating",
            2.0,
            attrs(&[("floor", AttrValue::number(4.5))]),
            "let r = attr(\"rating\", 0); if r >= param(\"floor\") then r else 0",
        ))
        .unwrap();
    rules
        .create_rule(&rule(
            "budget",
            1.0,
            attrs(&[("limit", AttrValue::number(100.0))]),
            "if attr(\"price\", 0) < param(\"limit\") then 1 else 0",
        ))
        .unwrap();
    rules
        .create_rule(&rule(
            "open_monday",
            1.0,
            AttrMap::new(),
            "if attr(\"closed_on_monday\", false) then 0 else 1",
        ))
        .unwrap();
}

fn save_scheme(conn: &Connection, id: &str, rule_weights: BTreeMap<String, RuleOverride>) {
    SqliteSchemeRepository::new(conn)
        .create_scheme(&Scheme::new(id, format!("scheme {id}"), None, rule_weights))
        .unwrap();
}

#[test]
fn element_and_scheme_scores_are_additive() {
    let conn = open_db_in_memory().unwrap();
    seed(&conn);
    save_scheme(
        &conn,
        "weekend",
        BTreeMap::from([
            ("high_rating".to_string(), RuleOverride::default()),
            ("budget".to_string(), RuleOverride::default()),
            ("open_monday".to_string(), RuleOverride::default()),
        ]),
    );

    let result = engine(&conn).evaluate_scheme("weekend").unwrap();

    // A1: high_rating 4.7*2.0 + budget 1.0 + open_monday 1.0 = 11.4
    // A2: high_rating 4.8*2.0 = 9.6 (price over limit, closed on monday)
    assert_eq!(result.selected_elements.len(), 2);
    let a1 = &result.selected_elements[0];
    assert_eq!(a1.element_id, "A1");
    assert!((a1.score - 11.4).abs() < 1e-9);
    assert_eq!(a1.rule_scores.len(), 3);
    assert!((a1.rule_scores["high_rating"] - 9.4).abs() < 1e-9);

    let a2 = &result.selected_elements[1];
    assert_eq!(a2.element_id, "A2");
    assert!((a2.score - 9.6).abs() < 1e-9);
    assert_eq!(a2.rule_scores.len(), 1);

    let sum: f64 = result.selected_elements.iter().map(|e| e.score).sum();
    assert!((result.scheme_score - sum).abs() < 1e-9);
    assert!(result.warnings.is_empty());
}

#[test]
fn override_weight_and_parameters_resolve_independently() {
    let conn = open_db_in_memory().unwrap();
    seed(&conn);

    // Weight overridden, parameters inherited from the rule.
    save_scheme(
        &conn,
        "weight_only",
        BTreeMap::from([("high_rating".to_string(), RuleOverride::with_weight(3.0))]),
    );
    // Parameter overridden, weight inherited from the rule.
    let mut param_entry = RuleOverride::default();
    param_entry
        .parameters
        .insert("limit".to_string(), AttrValue::number(70.0));
    save_scheme(
        &conn,
        "param_only",
        BTreeMap::from([("budget".to_string(), param_entry)]),
    );

    let engine = engine(&conn);

    let weighted = engine.evaluate_scheme("weight_only").unwrap();
    let a1 = weighted
        .selected_elements
        .iter()
        .find(|e| e.element_id == "A1")
        .unwrap();
    assert!((a1.rule_scores["high_rating"] - 4.7 * 3.0).abs() < 1e-9);

    let tightened = engine.evaluate_scheme("param_only").unwrap();
    // Only A1 (price 60) stays under the overridden limit of 70.
    let ids: Vec<&str> = tightened
        .selected_elements
        .iter()
        .map(|e| e.element_id.as_str())
        .collect();
    assert_eq!(ids, ["A1"]);
    assert!((tightened.selected_elements[0].rule_scores["budget"] - 1.0).abs() < 1e-9);
}

#[test]
fn selected_elements_carry_stored_attributes() {
    let conn = open_db_in_memory().unwrap();
    seed(&conn);
    save_scheme(
        &conn,
        "weekend",
        BTreeMap::from([("budget".to_string(), RuleOverride::default())]),
    );

    let result = engine(&conn).evaluate_scheme("weekend").unwrap();
    let a1 = &result.selected_elements[0];
    assert_eq!(a1.element_type, "attraction");
    assert_eq!(a1.attributes.get("price"), Some(&AttrValue::number(60.0)));
}

#[test]
fn dangling_rule_reference_becomes_a_warning() {
    let conn = open_db_in_memory().unwrap();
    seed(&conn);
    save_scheme(
        &conn,
        "stale",
        BTreeMap::from([
            ("budget".to_string(), RuleOverride::default()),
            ("deleted_rule".to_string(), RuleOverride::default()),
        ]),
    );

    let result = engine(&conn).evaluate_scheme("stale").unwrap();
    assert_eq!(result.warnings.len(), 1);
    assert!(matches!(
        &result.warnings[0],
        EvaluationWarning::DanglingRule { rule_id } if rule_id == "deleted_rule"
    ));
    // The resolvable rule still contributes.
    assert!(!result.selected_elements.is_empty());
}

#[test]
fn scoring_failures_are_warned_and_bounded() {
    let conn = open_db_in_memory().unwrap();
    seed(&conn);
    SqliteRuleRepository::new(&conn)
        .create_rule(&rule(
            "strict_rating",
            1.0,
            AttrMap::new(),
            // A2 has no "stars" attribute and no default is given.
            "attr(\"stars\") + attr(\"rating\", 0)",
        ))
        .unwrap();
    save_scheme(
        &conn,
        "mixed",
        BTreeMap::from([
            ("budget".to_string(), RuleOverride::default()),
            ("strict_rating".to_string(), RuleOverride::default()),
        ]),
    );

    let result = engine(&conn).evaluate_scheme("mixed").unwrap();
    assert_eq!(result.warnings.len(), 2);
    assert!(result
        .warnings
        .iter()
        .all(|w| matches!(w, EvaluationWarning::ScoringFailure { rule_id, .. } if rule_id == "strict_rating")));
    // Budget still scores A1 despite strict_rating failing everywhere.
    assert!(result
        .selected_elements
        .iter()
        .any(|e| e.rule_scores.contains_key("budget")));
}

#[test]
fn chinese_attribute_keys_score_cleanly() {
    let conn = open_db_in_memory().unwrap();
    let elements = SqliteElementRepository::new(&conn);
    elements
        .create_element(&Element::new(
            "A1",
            "attraction",
            attrs(&[("周一闭馆", AttrValue::flag(true))]),
        ))
        .unwrap();
    elements
        .create_element(&Element::new("A2", "attraction", AttrMap::new()))
        .unwrap();

    SqliteRuleRepository::new(&conn)
        .create_rule(&rule(
            "monday_open",
            1.0,
            AttrMap::new(),
            "if attr(\"周一闭馆\", false) then 0 else 1",
        ))
        .unwrap();
    save_scheme(
        &conn,
        "monday",
        BTreeMap::from([("monday_open".to_string(), RuleOverride::default())]),
    );

    let result = engine(&conn).evaluate_scheme("monday").unwrap();
    let ids: Vec<&str> = result
        .selected_elements
        .iter()
        .map(|e| e.element_id.as_str())
        .collect();
    assert_eq!(ids, ["A2"]);
}

#[test]
fn evaluate_all_schemes_is_ordered_by_scheme_id() {
    let conn = open_db_in_memory().unwrap();
    seed(&conn);
    save_scheme(
        &conn,
        "b_scheme",
        BTreeMap::from([("budget".to_string(), RuleOverride::default())]),
    );
    save_scheme(
        &conn,
        "a_scheme",
        BTreeMap::from([("high_rating".to_string(), RuleOverride::default())]),
    );

    let results = engine(&conn).evaluate_all_schemes().unwrap();
    let ids: Vec<&str> = results.iter().map(|r| r.scheme_id.as_str()).collect();
    assert_eq!(ids, ["a_scheme", "b_scheme"]);
}

#[test]
fn missing_scheme_is_not_found() {
    let conn = open_db_in_memory().unwrap();
    seed(&conn);
    let err = engine(&conn).evaluate_scheme("ghost").unwrap_err();
    assert!(matches!(err, EngineError::NotFound { kind: "scheme", .. }));
}

#[test]
fn scheme_rule_hyperedge_skips_dangling_and_resolves_weights() {
    let conn = open_db_in_memory().unwrap();
    seed(&conn);
    save_scheme(
        &conn,
        "mixed",
        BTreeMap::from([
            ("high_rating".to_string(), RuleOverride::with_weight(3.5)),
            ("budget".to_string(), RuleOverride::default()),
            ("deleted_rule".to_string(), RuleOverride::default()),
        ]),
    );

    let edge = engine(&conn).scheme_rule_hyperedge("mixed").unwrap();
    assert_eq!(edge.rules_count, 2);
    let by_id: BTreeMap<&str, f64> = edge
        .rules
        .iter()
        .map(|r| (r.rule_id.as_str(), r.weight))
        .collect();
    assert_eq!(by_id["high_rating"], 3.5);
    assert_eq!(by_id["budget"], 1.0);
}
