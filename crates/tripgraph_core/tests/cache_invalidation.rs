use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use rusqlite::Connection;
use tripgraph_core::db::open_db_in_memory;
use tripgraph_core::model::scheme::RuleOverride;
use tripgraph_core::sandbox::SandboxLimits;
use tripgraph_core::{
    AttrMap, AttrValue, Element, ElementRepository, ElementService, Engine, EngineConfig, Rule,
    RuleRepository, Scheme, SchemeRepository, SqliteElementRepository, SqliteRuleRepository,
    SqliteSchemeRepository,
};

fn engine_with_ttl(
    conn: &Connection,
    cache_ttl: Duration,
) -> Engine<
    SqliteElementRepository<'_>,
    SqliteRuleRepository<'_>,
    SqliteSchemeRepository<'_>,
> {
    Engine::new(
        SqliteElementRepository::new(conn),
        SqliteRuleRepository::new(conn),
        SqliteSchemeRepository::new(conn),
        EngineConfig {
            concurrency: 0,
            sandbox: SandboxLimits::default(),
            cache_ttl,
        },
    )
    .unwrap()
}

fn seed(conn: &Connection) {
    SqliteElementRepository::new(conn)
        .create_element(&Element::new(
            "A1",
            "attraction",
            BTreeMap::from([("rating".to_string(), AttrValue::number(4.0))]),
        ))
        .unwrap();
    SqliteRuleRepository::new(conn)
        .create_rule(&Rule {
            id: "rating".to_string(),
            name: "rating".to_string(),
            description: None,
            weight: 1.0,
            affected_element_types: BTreeSet::from(["attraction".to_string()]),
            affected_element_keys: BTreeSet::new(),
            parameters: AttrMap::new(),
            code: "attr(\"rating\", 0)".to_string(),
        })
        .unwrap();
    SqliteSchemeRepository::new(conn)
        .create_scheme(&Scheme::new(
            "plan",
            "plan",
            None,
            BTreeMap::from([("rating".to_string(), RuleOverride::default())]),
        ))
        .unwrap();
}

#[test]
fn cached_evaluation_survives_out_of_band_writes() {
    let conn = open_db_in_memory().unwrap();
    seed(&conn);
    let engine = engine_with_ttl(&conn, Duration::from_secs(60));

    let first = engine.evaluate_scheme("plan").unwrap();
    assert!((first.scheme_score - 4.0).abs() < 1e-9);

    // Raw store write that bypasses the service layer: the cache does not
    // notice, so the snapshot is served unchanged.
    SqliteElementRepository::new(&conn)
        .update_attributes(
            "A1",
            &BTreeMap::from([("rating".to_string(), AttrValue::number(5.0))]),
        )
        .unwrap();

    let second = engine.evaluate_scheme("plan").unwrap();
    assert!((second.scheme_score - 4.0).abs() < 1e-9);
}

#[test]
fn zero_ttl_recomputes_every_read() {
    let conn = open_db_in_memory().unwrap();
    seed(&conn);
    let engine = engine_with_ttl(&conn, Duration::ZERO);

    assert!((engine.evaluate_scheme("plan").unwrap().scheme_score - 4.0).abs() < 1e-9);

    SqliteElementRepository::new(&conn)
        .update_attributes(
            "A1",
            &BTreeMap::from([("rating".to_string(), AttrValue::number(5.0))]),
        )
        .unwrap();

    assert!((engine.evaluate_scheme("plan").unwrap().scheme_score - 5.0).abs() < 1e-9);
}

#[test]
fn repeated_uncached_evaluations_are_identical() {
    let conn = open_db_in_memory().unwrap();
    seed(&conn);
    // Second element with the same rating exercises the tie-break too.
    SqliteElementRepository::new(&conn)
        .create_element(&Element::new(
            "A2",
            "attraction",
            BTreeMap::from([("rating".to_string(), AttrValue::number(4.0))]),
        ))
        .unwrap();
    let engine = engine_with_ttl(&conn, Duration::ZERO);

    let first = engine.evaluate_scheme("plan").unwrap();
    let second = engine.evaluate_scheme("plan").unwrap();
    assert_eq!(first.selected_elements.len(), 2);
    assert_eq!(*first, *second);
}

#[test]
fn service_write_invalidates_cached_results() {
    let conn = open_db_in_memory().unwrap();
    seed(&conn);
    let engine = engine_with_ttl(&conn, Duration::from_secs(60));
    let elements = ElementService::new(SqliteElementRepository::new(&conn), engine.cache());

    assert!((engine.evaluate_scheme("plan").unwrap().scheme_score - 4.0).abs() < 1e-9);

    elements
        .update_attributes(
            "A1",
            BTreeMap::from([("rating".to_string(), AttrValue::number(5.0))]),
        )
        .unwrap();

    assert!((engine.evaluate_scheme("plan").unwrap().scheme_score - 5.0).abs() < 1e-9);
}

#[test]
fn rule_edge_catalog_is_cached_until_invalidated() {
    let conn = open_db_in_memory().unwrap();
    seed(&conn);
    let engine = engine_with_ttl(&conn, Duration::from_secs(60));
    let elements = ElementService::new(SqliteElementRepository::new(&conn), engine.cache());

    let first = engine.build_all_rule_edges().unwrap();
    assert_eq!(first.len(), 1);
    assert!((first[0].total_score - 4.0).abs() < 1e-9);

    elements
        .update_attributes(
            "A1",
            BTreeMap::from([("rating".to_string(), AttrValue::number(2.0))]),
        )
        .unwrap();

    let second = engine.build_all_rule_edges().unwrap();
    assert!((second[0].total_score - 2.0).abs() < 1e-9);
}
