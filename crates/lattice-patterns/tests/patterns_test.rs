//! Detector and GC tests against an in-memory store.

use std::sync::Arc;

use serde_json::json;

use lattice_core::config::GcPolicy;
use lattice_core::graph::{EdgeEvent, EventRelation, Layer, Node, Observation};
use lattice_patterns::{detect_co_editing, detect_file_churn, detect_tool_sequences, run_gc};
use lattice_storage::GraphEngine;

fn store() -> Arc<GraphEngine> {
    Arc::new(GraphEngine::open_in_memory().unwrap())
}

fn file(store: &GraphEngine, path: &str) -> Node {
    let node = Node::new(Layer::System, "file", path, json!({}));
    store.create_node(&node).unwrap();
    node
}

fn session(store: &GraphEngine, name: &str, status: &str) -> Node {
    let node = Node::new(Layer::Context, "session", name, json!({"status": status}));
    store.create_node(&node).unwrap();
    node
}

fn modified(store: &GraphEngine, session: &Node, file: &Node) {
    store
        .create_edge_event(&EdgeEvent::new(
            &session.id,
            &file.id,
            EventRelation::Modified,
            true,
        ))
        .unwrap();
}

#[test]
fn co_editing_detects_and_persists_patterns() {
    let store = store();
    let a = file(&store, "/src/a.rs");
    let b = file(&store, "/src/b.rs");
    let c = file(&store, "/src/c.rs");
    for i in 0..3 {
        let s = session(&store, &format!("s{i}"), "done");
        modified(&store, &s, &a);
        modified(&store, &s, &b);
    }
    let lone = session(&store, "s-lone", "done");
    modified(&store, &lone, &c);

    let pairs = detect_co_editing(&store, 2).unwrap();
    assert_eq!(pairs.len(), 1);
    assert_eq!(pairs[0].sessions, 3);
    let names = [pairs[0].file_a.as_str(), pairs[0].file_b.as_str()];
    assert!(names.contains(&"/src/a.rs") && names.contains(&"/src/b.rs"));

    // The pattern entity was persisted with a deterministic name.
    let persisted = store
        .list_by_layer_type(Layer::Automation, "pattern", 100)
        .unwrap();
    assert_eq!(persisted.len(), 1);
    assert!(persisted[0].name.starts_with("co_edit:"));
    assert_eq!(persisted[0].payload["sessions"], 3);
}

#[test]
fn co_editing_is_stable_under_rerun_and_monotone_under_new_events() {
    let store = store();
    let a = file(&store, "/src/a.rs");
    let b = file(&store, "/src/b.rs");
    for i in 0..2 {
        let s = session(&store, &format!("s{i}"), "done");
        modified(&store, &s, &a);
        modified(&store, &s, &b);
    }

    let first = detect_co_editing(&store, 2).unwrap();
    let second = detect_co_editing(&store, 2).unwrap();
    assert_eq!(first.len(), second.len());
    assert_eq!(first[0].sessions, second[0].sessions);

    // New co-edit sessions only push the frequency up.
    let s = session(&store, "s-new", "done");
    modified(&store, &s, &a);
    modified(&store, &s, &b);
    let third = detect_co_editing(&store, 2).unwrap();
    assert!(third[0].sessions > second[0].sessions);

    // Still exactly one persisted pattern, with the updated counter.
    let persisted = store
        .list_by_layer_type(Layer::Automation, "pattern", 100)
        .unwrap();
    assert_eq!(persisted.len(), 1);
    assert_eq!(persisted[0].payload["sessions"], 3);
}

#[test]
fn file_churn_honours_threshold() {
    let store = store();
    let hot = file(&store, "/src/hot.rs");
    let cold = file(&store, "/src/cold.rs");
    let s = session(&store, "s1", "done");
    for _ in 0..5 {
        modified(&store, &s, &hot);
    }
    modified(&store, &s, &cold);

    let churn = detect_file_churn(&store, 3).unwrap();
    assert_eq!(churn.len(), 1);
    assert_eq!(churn[0].file, "/src/hot.rs");
    assert_eq!(churn[0].modifications, 5);
}

#[test]
fn tool_sequences_pair_within_window() {
    let store = store();
    let tool = Node::new(Layer::Automation, "tool", "anchor", json!({}));
    store.create_node(&tool).unwrap();

    let now = chrono::Utc::now();
    for (offset_s, name) in [(0, "read"), (30, "edit"), (60, "exec")] {
        let mut obs = Observation::new(
            &tool.id,
            "tool_event",
            json!({"session_id": "s1", "tool": name}),
        );
        obs.observed_at = now + chrono::Duration::seconds(offset_s);
        store.create_observation(&obs).unwrap();
    }
    // A second session repeats read -> edit.
    for (offset_s, name) in [(0, "read"), (45, "edit")] {
        let mut obs = Observation::new(
            &tool.id,
            "tool_event",
            json!({"session_id": "s2", "tool": name}),
        );
        obs.observed_at = now + chrono::Duration::seconds(offset_s);
        store.create_observation(&obs).unwrap();
    }

    let sequences = detect_tool_sequences(&store, 2).unwrap();
    assert_eq!(sequences.len(), 1);
    assert_eq!(sequences[0].first, "read");
    assert_eq!(sequences[0].second, "edit");
    assert_eq!(sequences[0].count, 2);
}

#[test]
fn gc_only_touches_expired_sessions() {
    let store = store();
    let stale = session(&store, "stale", "done");
    let active = session(&store, "active", "active");
    let fresh = session(&store, "fresh", "done");
    let compressed = session(&store, "compressed-old", "compressed");
    // Unrelated entity that must never be collected.
    let task = Node::new(Layer::Context, "task", "keep-me", json!({}));
    store.create_node(&task).unwrap();

    // Backdate the stale candidates.
    for (node, days) in [(&stale, 20), (&active, 20), (&compressed, 40)] {
        let backdated = (chrono::Utc::now() - chrono::Duration::days(days)).to_rfc3339();
        store
            .with_writer(|conn| {
                conn.execute(
                    "UPDATE nodes SET updated_at = ?2 WHERE id = ?1",
                    (&node.id, &backdated),
                )
                .map_err(|e| lattice_core::LatticeError::Storage {
                    message: e.to_string(),
                })
                .map(|_| ())
            })
            .unwrap();
    }

    // Dry run reports without writing.
    let dry = run_gc(
        &store,
        &GcPolicy {
            dry_run: true,
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(dry.deleted, 0);
    let dry_names: Vec<&str> = dry.candidates.iter().map(|c| c.name.as_str()).collect();
    assert!(dry_names.contains(&"stale"));
    assert!(dry_names.contains(&"compressed-old"));
    assert!(!dry_names.contains(&"active"));
    assert!(!dry_names.contains(&"fresh"));
    assert!(store.get_active(&stale.id).is_ok());

    // Real run soft-deletes exactly the candidates.
    let report = run_gc(&store, &GcPolicy::default()).unwrap();
    assert_eq!(report.deleted, 2);
    assert!(store.get_active(&stale.id).is_err());
    assert!(store.get_active(&compressed.id).is_err());
    assert!(store.get_active(&active.id).is_ok());
    assert!(store.get_active(&fresh.id).is_ok());
    assert!(store.get_active(&task.id).is_ok());
}
