//! Invariant tests for the storage layer: telemetry guard, identity
//! uniqueness, version log, cascade deprecation, and partition upkeep.

use serde_json::json;

use lattice_core::graph::{Edge, EdgeEvent, EventRelation, Layer, Node, Relation};
use lattice_core::LatticeError;
use lattice_storage::GraphEngine;

fn engine() -> GraphEngine {
    GraphEngine::open_in_memory().unwrap()
}

fn task(name: &str) -> Node {
    Node::new(Layer::Context, "task", name, json!({}))
}

#[test]
fn observation_layer_rejected_in_node_table() {
    let engine = engine();
    let node = Node::new(Layer::Observation, "metric", "cpu", json!({}));
    let err = engine.create_node(&node).unwrap_err();
    assert!(matches!(err, LatticeError::InvalidArgument { .. }));
    // The trigger is the backstop even if the code-level check is bypassed:
    let smuggled = engine.with_writer(|conn| {
        conn.execute(
            "INSERT INTO nodes (id, layer, node_type, name, created_at, updated_at)
             VALUES ('x', 'OBSERVATION', 'metric', 'cpu',
                     '2026-01-01T00:00:00Z', '2026-01-01T00:00:00Z')",
            [],
        )
        .map_err(|e| LatticeError::Storage {
            message: e.to_string(),
        })
        .map(|_| ())
    });
    assert!(smuggled.is_err());
}

#[test]
fn identity_unique_among_live_nodes() {
    let engine = engine();
    engine.create_node(&task("t1")).unwrap();
    let err = engine.create_node(&task("t1")).unwrap_err();
    assert!(matches!(err, LatticeError::Conflict { .. }));
}

#[test]
fn recreate_after_soft_delete_gets_new_identity() {
    let engine = engine();
    let first = task("t1");
    engine.create_node(&first).unwrap();
    engine.soft_delete(&first.id).unwrap();

    let second = task("t1");
    engine.create_node(&second).unwrap();
    assert_ne!(first.id, second.id);

    // The deleted row stays readable by id.
    let old = engine.get_node(&first.id).unwrap().unwrap();
    assert!(!old.is_live());
    assert!(engine.get_active(&first.id).is_err());
}

#[test]
fn version_log_counts_mutations_without_gaps() {
    let engine = engine();
    let mut node = task("t1");
    engine.create_node(&node).unwrap();
    assert!(engine.list_versions(&node.id).unwrap().is_empty());

    node.payload = json!({"step": 1});
    engine.update_node(&node).unwrap();
    node.payload = json!({"step": 2});
    engine.update_node(&node).unwrap();
    engine.soft_delete(&node.id).unwrap();

    let versions = engine.list_versions(&node.id).unwrap();
    let numbers: Vec<i64> = versions.iter().map(|v| v.version).collect();
    assert_eq!(numbers, vec![1, 2, 3]);
    assert_eq!(versions[1].payload, json!({"step": 2}));

    let v2 = engine.get_version(&node.id, 2).unwrap();
    assert_eq!(v2.payload, json!({"step": 2}));
}

#[test]
fn soft_delete_cascades_edge_deprecation() {
    let engine = engine();
    let a = task("a");
    let b = task("b");
    engine.create_node(&a).unwrap();
    engine.create_node(&b).unwrap();
    let edge = Edge::new(&a.id, &b.id, Relation::DependsOn, json!({}));
    engine.create_edge(&edge).unwrap();

    engine.soft_delete(&b.id).unwrap();

    let stored = engine.get_edge(&edge.id).unwrap().unwrap();
    assert!(!stored.is_live());
    // Invariant: no live edge has a dead endpoint.
    let live = engine
        .list_edges(&lattice_core::graph::EdgeFilter::live())
        .unwrap();
    assert!(live.is_empty());
}

#[test]
fn edge_to_deleted_node_rejected() {
    let engine = engine();
    let a = task("a");
    let b = task("b");
    engine.create_node(&a).unwrap();
    engine.create_node(&b).unwrap();
    engine.soft_delete(&b.id).unwrap();
    let err = engine
        .create_edge(&Edge::new(&a.id, &b.id, Relation::Uses, json!({})))
        .unwrap_err();
    assert!(matches!(err, LatticeError::InvalidArgument { .. }));
}

#[test]
fn get_or_create_resolves_to_single_row() {
    let engine = engine();
    let (first, created) = engine
        .get_or_create(Layer::Context, "task", "t1", json!({"seed": true}))
        .unwrap();
    assert!(created);
    for _ in 0..5 {
        let (again, created) = engine
            .get_or_create(Layer::Context, "task", "t1", json!({}))
            .unwrap();
        assert!(!created);
        assert_eq!(again.id, first.id);
    }
}

#[test]
fn concurrent_get_or_create_yields_one_entity() {
    let engine = std::sync::Arc::new(engine());
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let engine = engine.clone();
            std::thread::spawn(move || {
                engine
                    .get_or_create(Layer::Context, "task", "shared", json!({}))
                    .map(|(node, _)| node.id)
            })
        })
        .collect();
    let mut ids: Vec<String> = handles
        .into_iter()
        .map(|h| h.join().unwrap().unwrap())
        .collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 1);
    let live = engine.list_by_layer_type(Layer::Context, "task", 100).unwrap();
    assert_eq!(live.len(), 1);
}

#[test]
fn merge_update_preserves_unpatched_keys() {
    let engine = engine();
    let mut node = task("t1");
    node.payload = json!({"keep": "yes", "replace": 1});
    engine.create_node(&node).unwrap();

    let patch = serde_json::from_value(json!({"replace": 2, "new": true})).unwrap();
    let merged = engine.merge_update(&node.id, &patch).unwrap();
    assert_eq!(merged.payload["keep"], "yes");
    assert_eq!(merged.payload["replace"], 2);
    assert_eq!(merged.payload["new"], true);
}

#[test]
fn get_by_path_falls_back_to_basename_suffix() {
    let engine = engine();
    let file = Node::new(Layer::System, "file", "/repo/src/main.rs", json!({}));
    engine.create_node(&file).unwrap();

    let exact = engine.get_by_path("/repo/src/main.rs").unwrap().unwrap();
    assert_eq!(exact.id, file.id);

    let fallback = engine.get_by_path("src/main.rs").unwrap().unwrap();
    assert_eq!(fallback.id, file.id);

    assert!(engine.get_by_path("src/other.rs").unwrap().is_none());
}

#[test]
fn events_and_observations_land_in_month_partitions() {
    let engine = engine();
    let a = task("a");
    let b = task("b");
    engine.create_node(&a).unwrap();
    engine.create_node(&b).unwrap();

    let event = EdgeEvent::new(&a.id, &b.id, EventRelation::Modified, true).with_duration(10);
    engine.create_edge_event(&event).unwrap();

    let obs = lattice_core::graph::Observation::new(&a.id, "tool_event", json!({"tool": "read"}));
    engine.create_observation(&obs).unwrap();

    let events = engine.events_in_range(None, None, 10).unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].duration_ms, Some(10));

    let observations = engine
        .list_observations_by_type("tool_event", None, None, 10)
        .unwrap();
    assert_eq!(observations.len(), 1);
    assert_eq!(observations[0].node_id, a.id);
}

#[test]
fn partition_maintenance_drains_default() {
    let engine = engine();
    // Smuggle a row into the default partition, as if written before its
    // month partition existed.
    engine
        .with_writer(|conn| {
            conn.execute(
                "INSERT INTO edge_events_default
                    (id, source_id, target_id, relation, success, payload, occurred_at)
                 VALUES ('ev1', 'a', 'b', 'modified', 1, 'null', '2025-03-10T12:00:00Z')",
                [],
            )
            .map_err(|e| LatticeError::Storage {
                message: e.to_string(),
            })
            .map(|_| ())
        })
        .unwrap();

    let moved = engine.partition_maintenance().unwrap();
    assert_eq!(moved, 1);

    // The row survived the move and the default is empty.
    let events = engine.events_in_range(None, None, 10).unwrap();
    assert_eq!(events.len(), 1);
    let remaining: i64 = engine
        .with_reader(|conn| {
            conn.query_row("SELECT COUNT(*) FROM edge_events_default", [], |r| r.get(0))
                .map_err(|e| LatticeError::Storage {
                    message: e.to_string(),
                })
        })
        .unwrap();
    assert_eq!(remaining, 0);
}

#[test]
fn search_filters_compose() {
    let engine = engine();
    for (name, status) in [("alpha", "active"), ("beta", "done"), ("alpaca", "active")] {
        let mut node = task(name);
        node.payload = json!({"status": status});
        engine.create_node(&node).unwrap();
    }
    let filter = lattice_core::graph::NodeFilter {
        layer: Some(Layer::Context),
        name_pattern: Some("AL".to_string()),
        name_match: lattice_core::graph::NameMatch::Prefix,
        payload_contains: Some(
            serde_json::from_value(json!({"status": "active"})).unwrap(),
        ),
        ..Default::default()
    };
    let hits = engine.search(&filter).unwrap();
    let names: Vec<&str> = hits.iter().map(|n| n.name.as_str()).collect();
    assert_eq!(names.len(), 2);
    assert!(names.contains(&"alpha") && names.contains(&"alpaca"));
}

#[test]
fn working_set_trims_to_bound() {
    let engine = engine();
    for i in 0..30 {
        let mut node = task(&format!("t{i}"));
        node.payload = json!({"working_set": true});
        engine.create_node(&node).unwrap();
    }
    let evicted = engine.trim_working_set().unwrap();
    assert_eq!(evicted, 5);
    let still_flagged: i64 = engine
        .with_reader(|conn| {
            conn.query_row(
                "SELECT COUNT(*) FROM nodes
                 WHERE json_extract(payload, '$.working_set') = 1 AND deleted_at IS NULL",
                [],
                |r| r.get(0),
            )
            .map_err(|e| LatticeError::Storage {
                message: e.to_string(),
            })
        })
        .unwrap();
    assert_eq!(still_flagged, 25);
}
