mod common;

use common::{output_of, run_ok};
use songlang::value::{DO_BODY_KEY, ROLES_KEY};
use songlang::Value;

#[test]
fn test_relation_with_roles_and_body() {
    let source = "Attacks IS RELATION\nAttacks HAS Attacker (Node)\nAttacks HAS Target (Node)\nAttacks DO\nTarget HAS LastHit 1\nAttacker PRINT\nEND\nHero Attacks Goblin";
    let outcome = run_ok(source);
    assert_eq!(outcome.output, vec!["Hero"]);
    let graph = &outcome.interpreter.graph;
    let goblin = graph.get("Goblin").expect("goblin exists");
    assert_eq!(graph.property(goblin, "LastHit"), Some(Value::Number(1.0)));
}

#[test]
fn test_lowercase_relation_keyword_tags_the_same_type() {
    let source = "Attacks IS relation\nAttacks HAS Attacker (Node)\nAttacks DO\nAttacker PRINT\nEND\nHero Attacks";
    assert_eq!(output_of(source), vec!["Hero"]);
}

#[test]
fn test_roles_unbind_after_invocation() {
    let source = "Attacks IS RELATION\nAttacks HAS Attacker (Node)\nAttacks DO\nAttacker PRINT\nEND\nHero Attacks Goblin\nAttacker PRINT";
    // After the call, the bare name is an ordinary fresh node again.
    assert_eq!(output_of(source), vec!["Hero", "Attacker"]);
}

#[test]
fn test_relation_without_body_is_noop() {
    let source = "Attacks IS RELATION\nHero Attacks Goblin\nHero PRINT";
    assert_eq!(output_of(source), vec!["Hero"]);
}

#[test]
fn test_relation_without_roles_runs_body() {
    let source = "Cheer IS RELATION\nCheer DO\nCrowd PRINT\nEND\nHero Cheer";
    assert_eq!(output_of(source), vec!["Crowd"]);
}

#[test]
fn test_repeated_invocations_rebind_roles() {
    let source = "Greets IS RELATION\nGreets HAS Greeter (Node)\nGreets HAS Other (Node)\nGreets DO\n(Name OF Greeter + \" greets \" + Name OF Other) PRINT\nEND\nAlice HAS Name \"Alice\"\nBob HAS Name \"Bob\"\nCarol HAS Name \"Carol\"\nAlice Greets Bob\nAlice Greets Carol";
    assert_eq!(
        output_of(source),
        vec!["Alice greets Bob", "Alice greets Carol"]
    );
}

#[test]
fn test_do_body_is_deferred() {
    // Defining the body produces no output until the relation is invoked.
    let source = "Cheer IS RELATION\nCheer DO\nCrowd PRINT\nEND";
    assert_eq!(output_of(source), Vec::<String>::new());
}

#[test]
fn test_do_body_redefinition_overwrites() {
    let source = "Cheer IS RELATION\nCheer DO\nCrowd PRINT\nEND\nCheer DO\nSilence PRINT\nEND\nHero Cheer";
    assert_eq!(output_of(source), vec!["Silence"]);
}

#[test]
fn test_duplicate_role_definitions_elided() {
    let outcome = run_ok("Attacks IS RELATION\nAttacks HAS Attacker (Node)\nAttacks HAS Attacker (Node)");
    let graph = &outcome.interpreter.graph;
    let attacks = graph.get("Attacks").expect("attacks exists");
    assert_eq!(
        graph.property(attacks, ROLES_KEY),
        Some(Value::Roles(vec!["Attacker".to_string()]))
    );
}

#[test]
fn test_do_body_stored_internally() {
    let outcome = run_ok("Cheer IS RELATION\nCheer DO\nCrowd PRINT\nEND");
    let graph = &outcome.interpreter.graph;
    let cheer = graph.get("Cheer").expect("cheer exists");
    assert!(matches!(
        graph.property(cheer, DO_BODY_KEY),
        Some(Value::Statements(_))
    ));
}

#[test]
fn test_missing_args_leave_roles_unbound() {
    // The second role gets no argument; the body only touches the first.
    let source = "Attacks IS RELATION\nAttacks HAS Attacker (Node)\nAttacks HAS Target (Node)\nAttacks DO\nAttacker PRINT\nEND\nHero Attacks";
    assert_eq!(output_of(source), vec!["Hero"]);
}

#[test]
fn test_unknown_relation_writes_stub_link() {
    let outcome = run_ok("Alice Loves Bob");
    let graph = &outcome.interpreter.graph;
    let alice = graph.get("Alice").expect("alice exists");
    assert!(graph.has_node("Bob"));
    assert_eq!(graph.property(alice, "_Loves"), Some(Value::string("Bob")));
}

#[test]
fn test_unknown_relation_without_args_is_noop() {
    let outcome = run_ok("Alice Waves");
    let graph = &outcome.interpreter.graph;
    assert!(graph.has_node("Alice"));
    assert!(!graph.has_node("Waves"));
}

#[test]
fn test_relation_body_can_invoke_other_relations() {
    let source = "Hits IS RELATION\nHits HAS Striker (Node)\nHits DO\nStriker PRINT\nEND\nAttacks IS RELATION\nAttacks HAS Attacker (Node)\nAttacks HAS Target (Node)\nAttacks DO\nAttacker Hits Target\nEND\nHero Attacks Goblin";
    assert_eq!(output_of(source), vec!["Hero"]);
}
