//! Traversal tests: closures, lineage, shortest path, cycle handling.

use serde_json::json;

use lattice_core::graph::{Edge, EdgeEvent, EventRelation, Layer, Node, Relation};
use lattice_storage::GraphEngine;

fn node(engine: &GraphEngine, name: &str) -> Node {
    let n = Node::new(Layer::System, "service", name, json!({}));
    engine.create_node(&n).unwrap();
    n
}

fn link(engine: &GraphEngine, from: &Node, to: &Node, relation: Relation) {
    engine
        .create_edge(&Edge::new(&from.id, &to.id, relation, json!({})))
        .unwrap();
}

#[test]
fn dependencies_walk_transitively_with_depth_and_path() {
    let engine = GraphEngine::open_in_memory().unwrap();
    let a = node(&engine, "a");
    let b = node(&engine, "b");
    let c = node(&engine, "c");
    link(&engine, &a, &b, Relation::DependsOn);
    link(&engine, &b, &c, Relation::DependsOn);

    let closure = engine.dependencies(&a.id, 10).unwrap();
    assert_eq!(closure.len(), 2);
    assert_eq!(closure[0].node.id, b.id);
    assert_eq!(closure[0].depth, 1);
    assert_eq!(closure[1].node.id, c.id);
    assert_eq!(closure[1].depth, 2);
    assert_eq!(closure[1].path, vec![b.id.clone(), c.id.clone()]);
}

#[test]
fn dependents_walk_inverse_direction() {
    let engine = GraphEngine::open_in_memory().unwrap();
    let a = node(&engine, "a");
    let b = node(&engine, "b");
    link(&engine, &a, &b, Relation::DependsOn);

    let closure = engine.dependents(&b.id, 10).unwrap();
    assert_eq!(closure.len(), 1);
    assert_eq!(closure[0].node.id, a.id);
}

#[test]
fn cycles_do_not_loop() {
    let engine = GraphEngine::open_in_memory().unwrap();
    let a = node(&engine, "a");
    let b = node(&engine, "b");
    link(&engine, &a, &b, Relation::DependsOn);
    link(&engine, &b, &a, Relation::DependsOn);

    let closure = engine.dependencies(&a.id, 10).unwrap();
    assert_eq!(closure.len(), 1);
    assert_eq!(closure[0].node.id, b.id);
}

#[test]
fn depth_bound_is_respected() {
    let engine = GraphEngine::open_in_memory().unwrap();
    let nodes: Vec<Node> = (0..5).map(|i| node(&engine, &format!("n{i}"))).collect();
    for pair in nodes.windows(2) {
        link(&engine, &pair[0], &pair[1], Relation::DependsOn);
    }
    let closure = engine.dependencies(&nodes[0].id, 2).unwrap();
    assert_eq!(closure.len(), 2);
}

#[test]
fn lineage_follows_causal_chain() {
    let engine = GraphEngine::open_in_memory().unwrap();
    let a = node(&engine, "a");
    let b = node(&engine, "b");
    let c = node(&engine, "c");
    engine
        .create_edge_event(&EdgeEvent::new(&a.id, &b.id, EventRelation::Triggered, true))
        .unwrap();
    engine
        .create_edge_event(
            &EdgeEvent::new(&b.id, &c.id, EventRelation::ResultedIn, true).with_duration(7),
        )
        .unwrap();

    let steps = engine.lineage(&a.id, 20).unwrap();
    assert_eq!(steps.len(), 2);
    assert_eq!(steps[0].depth, 1);
    assert_eq!(steps[0].event.relation, EventRelation::Triggered);
    assert_eq!(steps[1].depth, 2);
    assert_eq!(steps[1].event.duration_ms, Some(7));
}

#[test]
fn shortest_path_prefers_fewer_hops_and_ignores_deprecated() {
    let engine = GraphEngine::open_in_memory().unwrap();
    let a = node(&engine, "a");
    let b = node(&engine, "b");
    let c = node(&engine, "c");
    let d = node(&engine, "d");
    // Long path a -> b -> c -> d and a shortcut a -> d.
    link(&engine, &a, &b, Relation::Uses);
    link(&engine, &b, &c, Relation::Uses);
    link(&engine, &c, &d, Relation::Uses);
    let shortcut = Edge::new(&a.id, &d.id, Relation::Affects, json!({}));
    engine.create_edge(&shortcut).unwrap();

    let path = engine.shortest_path(&a.id, &d.id, 10).unwrap();
    assert_eq!(path, vec![a.id.clone(), d.id.clone()]);

    // Deprecating the shortcut reroutes through the long way.
    engine.deprecate_edge(&shortcut.id).unwrap();
    let path = engine.shortest_path(&a.id, &d.id, 10).unwrap();
    assert_eq!(path.len(), 4);
}

#[test]
fn no_path_is_empty_not_error() {
    let engine = GraphEngine::open_in_memory().unwrap();
    let a = node(&engine, "a");
    let b = node(&engine, "b");
    let path = engine.shortest_path(&a.id, &b.id, 10).unwrap();
    assert!(path.is_empty());
}
