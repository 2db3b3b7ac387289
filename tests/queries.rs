mod common;

use common::{output_of, run_ok};
use songlang::value::ITEMS_KEY;
use songlang::Value;

#[test]
fn test_query_is_lists_instances() {
    let source = "Orc IS Monster\nGoblin IS Monster\n?m IS Monster";
    assert_eq!(
        output_of(source),
        vec!["Query ?m: 2 nodes found", "  - Orc", "  - Goblin"]
    );
}

#[test]
fn test_query_can_includes_inherited() {
    let source = "Knight CAN ATTACK\nSquire IS Knight\n?w CAN ATTACK";
    assert_eq!(
        output_of(source),
        vec!["Query ?w: 2 nodes found", "  - Knight", "  - Squire"]
    );
}

#[test]
fn test_query_is_transitive() {
    let source = "Entity HAS X 1\nMonster IS Entity\nOrc IS Monster\n?e IS Entity";
    assert_eq!(
        output_of(source),
        vec!["Query ?e: 2 nodes found", "  - Monster", "  - Orc"]
    );
}

#[test]
fn test_wildcard_query_binds_nothing() {
    let source = "Orc IS Monster\nGoblin IS Monster\n? IS Monster";
    let outcome = run_ok(source);
    assert_eq!(
        outcome.output,
        vec!["Query ?: 2 nodes found", "  - Orc", "  - Goblin"]
    );
    assert!(!outcome.interpreter.graph.has_node("_"));
    assert!(!outcome.interpreter.graph.has_node("QueryResult"));
}

#[test]
fn test_query_has_with_value_and_tolerance() {
    let source = "Orc HAS HP 50\nGoblin HAS HP (50.00001)\nWisp HAS HP 10\n?n HAS HP 50";
    assert_eq!(
        output_of(source),
        vec!["Query ?n: 2 nodes found", "  - Orc", "  - Goblin"]
    );
}

#[test]
fn test_query_has_string_value_matches_promoted_node() {
    // Weapon was auto-promoted to a node reference; the query text still
    // matches through the node's name.
    let source = "Sword IS Weapon\nPlayer HAS Weapon Sword\n?p HAS Weapon \"Sword\"";
    let output = output_of(source);
    assert_eq!(output[0], "Query ?p: 1 nodes found");
    assert_eq!(output[1], "  - Player");
}

#[test]
fn test_query_has_null_property_does_not_match() {
    let source = "Player HAS Tag\nGhost HAS HP 1\n?x HAS Tag";
    assert_eq!(output_of(source), vec!["Query ?x: 0 nodes found"]);
}

#[test]
fn test_query_has_without_target_matches_any_own_property() {
    let source = "Player HAS HP 1\nEmpty IS Player\n? HAS";
    assert_eq!(output_of(source), vec!["Query ?: 1 nodes found", "  - Player"]);
}

#[test]
fn test_query_can_without_target_uses_own_abilities() {
    let source = "Knight CAN ATTACK\nSquire IS Knight\n? CAN";
    assert_eq!(
        output_of(source),
        vec!["Query ?: 1 nodes found", "  - Knight"]
    );
}

#[test]
fn test_query_where_filters() {
    let source = "Orc IS Monster\nOrc HAS HP 30\nGoblin IS Monster\nGoblin HAS HP 5\n?m IS Monster WHERE HP OF ?m > 10";
    assert_eq!(
        output_of(source),
        vec!["Query ?m: 1 nodes found", "  - Orc"]
    );
}

#[test]
fn test_query_where_bare_binding_name() {
    let source = "Orc IS Monster\nOrc HAS HP 30\nGoblin IS Monster\nGoblin HAS HP 5\n?m IS Monster WHERE m.HP > 10";
    assert_eq!(
        output_of(source),
        vec!["Query ?m: 1 nodes found", "  - Orc"]
    );
}

#[test]
fn test_query_where_errors_exclude_candidate() {
    // Goblin has no HP at all; its WHERE evaluation fails and only drops it.
    let source = "Orc IS Monster\nOrc HAS HP 30\nGoblin IS Monster\n?m IS Monster WHERE HP OF ?m > 10";
    assert_eq!(
        output_of(source),
        vec!["Query ?m: 1 nodes found", "  - Orc"]
    );
}

#[test]
fn test_query_materializes_result_node() {
    let source = "Orc IS Monster\nGoblin IS Monster\n?m IS Monster";
    let outcome = run_ok(source);
    let graph = &outcome.interpreter.graph;
    let result = graph.get("m").expect("result node exists");
    let query_result = graph.get("QueryResult").expect("QueryResult exists");
    assert!(graph.parents(result).contains(&query_result));
    match graph.property(result, ITEMS_KEY) {
        Some(Value::Nodes(items)) => assert_eq!(items.len(), 2),
        other => panic!("expected node list, got {:?}", other),
    }
}

#[test]
fn test_requery_overwrites_results() {
    let source = "Orc IS Monster\n?m IS Monster\nGoblin IS Monster\n?m IS Monster";
    let outcome = run_ok(source);
    assert_eq!(
        outcome.output,
        vec![
            "Query ?m: 1 nodes found",
            "  - Orc",
            "Query ?m: 2 nodes found",
            "  - Orc",
            "  - Goblin"
        ]
    );
    let graph = &outcome.interpreter.graph;
    let result = graph.get("m").expect("result node exists");
    match graph.property(result, ITEMS_KEY) {
        Some(Value::Nodes(items)) => assert_eq!(items.len(), 2),
        other => panic!("expected node list, got {:?}", other),
    }
}

#[test]
fn test_query_for_relations() {
    let source = "Attacks IS RELATION\nFollows IS RELATION\nPlayer HAS HP 1\n?r IS RELATION";
    assert_eq!(
        output_of(source),
        vec!["Query ?r: 2 nodes found", "  - Attacks", "  - Follows"]
    );
}

#[test]
fn test_query_is_without_target_matches_all() {
    let source = "Orc IS Monster\n? IS";
    // Orc and Monster both exist at scan time.
    assert_eq!(
        output_of(source),
        vec!["Query ?: 2 nodes found", "  - Orc", "  - Monster"]
    );
}

#[test]
fn test_empty_query_result() {
    let source = "Player HAS HP 1\n?m IS Monster";
    assert_eq!(output_of(source), vec!["Query ?m: 0 nodes found"]);
}
