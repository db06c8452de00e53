//! End-to-end context pack tests against a real in-memory store.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{Duration, Utc};
use serde_json::json;

use lattice_core::graph::{Edge, EdgeEvent, EventRelation, Layer, Node, Relation};
use lattice_embeddings::{EmbeddingEngine, HashEmbedder, NoopEmbedder};
use lattice_retrieval::{PackAssembler, RetrievalProfile};
use lattice_storage::GraphEngine;

fn store() -> Arc<GraphEngine> {
    Arc::new(GraphEngine::open_in_memory().unwrap())
}

fn with_hash_embedder(store: &Arc<GraphEngine>) -> PackAssembler {
    let embeddings = EmbeddingEngine::new(
        store.clone(),
        Arc::new(HashEmbedder::default()),
        PathBuf::from("."),
    );
    PackAssembler::new(store.clone(), embeddings)
}

fn with_noop_embedder(store: &Arc<GraphEngine>) -> PackAssembler {
    let embeddings = EmbeddingEngine::new(
        store.clone(),
        Arc::new(NoopEmbedder),
        PathBuf::from("."),
    );
    PackAssembler::new(store.clone(), embeddings)
}

/// Create a node and embed its content immediately.
fn embedded_node(
    store: &Arc<GraphEngine>,
    layer: Layer,
    node_type: &str,
    name: &str,
    payload: serde_json::Value,
) -> Node {
    let node = Node::new(layer, node_type, name, payload);
    store.create_node(&node).unwrap();
    let embeddings = EmbeddingEngine::new(
        store.clone(),
        Arc::new(HashEmbedder::default()),
        PathBuf::from("."),
    );
    let stored = store.get_node(&node.id).unwrap().unwrap();
    embeddings.embed_node_now(&stored).unwrap();
    store.get_node(&node.id).unwrap().unwrap()
}

#[test]
fn no_embedder_and_no_task_yields_empty_pack() {
    let store = store();
    let assembler = with_noop_embedder(&store);
    let pack = assembler
        .assemble("anything", RetrievalProfile::Default, None)
        .unwrap();
    assert!(pack.is_empty());
}

#[test]
fn no_embedder_with_task_yields_graph_only_pack() {
    let store = store();
    let task = Node::new(Layer::Context, "task", "fix dashboard", json!({}));
    store.create_node(&task).unwrap();
    let file = Node::new(Layer::System, "file", "/dash/panel.rs", json!({}));
    store.create_node(&file).unwrap();
    store
        .create_edge(&Edge::new(&task.id, &file.id, Relation::Affects, json!({})))
        .unwrap();

    let assembler = with_noop_embedder(&store);
    let pack = assembler
        .assemble("dashboard", RetrievalProfile::Task, Some(&task.id))
        .unwrap();
    assert_eq!(pack.items.len(), 1);
    assert_eq!(pack.items[0].node.id, file.id);
    // Direct `affects` edge from the task: full proximity.
    assert_eq!(pack.items[0].signals.graph_proximity, 1.0);
    assert_eq!(pack.items[0].signals.similarity, 0.0);
    assert_eq!(pack.items[0].why, "linked in the graph");
}

#[test]
fn direct_affects_edge_scores_full_proximity_in_candidate_set() {
    let store = store();
    let task = Node::new(Layer::Context, "task", "tune retrieval", json!({}));
    store.create_node(&task).unwrap();
    let entity = embedded_node(
        &store,
        Layer::Context,
        "insight",
        "ranking weights drift",
        json!({"topic": "retrieval ranking weights"}),
    );
    store
        .create_edge(&Edge::new(&task.id, &entity.id, Relation::Affects, json!({})))
        .unwrap();

    let assembler = with_hash_embedder(&store);
    let pack = assembler
        .assemble(
            "retrieval ranking weights",
            RetrievalProfile::Task,
            Some(&task.id),
        )
        .unwrap();
    let item = pack
        .items
        .iter()
        .find(|i| i.node.id == entity.id)
        .expect("entity in pack");
    assert_eq!(item.signals.graph_proximity, 1.0);
}

#[test]
fn expansion_adds_neighbours_with_no_similarity_signal() {
    let store = store();
    let hit = embedded_node(
        &store,
        Layer::Context,
        "decision",
        "store payloads as json",
        json!({"topic": "payload storage json columns"}),
    );
    // A neighbour with no embedding at all: only reachable via expansion.
    let neighbour = Node::new(Layer::System, "service", "payload-codec", json!({}));
    store.create_node(&neighbour).unwrap();
    store
        .create_edge(&Edge::new(
            &hit.id,
            &neighbour.id,
            Relation::Uses,
            json!({}),
        ))
        .unwrap();

    let assembler = with_hash_embedder(&store);
    let pack = assembler
        .assemble("payload storage json columns", RetrievalProfile::Default, None)
        .unwrap();
    let added = pack
        .items
        .iter()
        .find(|i| i.node.id == neighbour.id)
        .expect("neighbour added by expansion");
    assert_eq!(added.distance, 2.0);
    assert_eq!(added.signals.similarity, 0.0);
    // Expansion over `uses` lands in the 0.3-0.5 band.
    assert!((added.signals.graph_proximity - 0.4).abs() < 1e-9);
}

#[test]
fn pack_is_trimmed_to_profile_limit() {
    let store = store();
    for i in 0..20 {
        embedded_node(
            &store,
            Layer::Context,
            "insight",
            &format!("note {i}"),
            json!({"topic": "shared retrieval topic words"}),
        );
    }
    let assembler = with_hash_embedder(&store);
    let pack = assembler
        .assemble("shared retrieval topic words", RetrievalProfile::Task, None)
        .unwrap();
    assert_eq!(pack.items.len(), RetrievalProfile::Task.limit());

    let pack = assembler
        .assemble("shared retrieval topic words", RetrievalProfile::Plan, None)
        .unwrap();
    assert!(pack.items.len() <= RetrievalProfile::Plan.limit());
}

#[test]
fn constraint_annex_lists_live_constraints_with_text() {
    let store = store();
    embedded_node(
        &store,
        Layer::Context,
        "insight",
        "something to find",
        json!({"topic": "find me"}),
    );
    let with_text = Node::new(
        Layer::Context,
        "constraint",
        "no-force-push",
        json!({"text": "never rewrite shared history"}),
    );
    store.create_node(&with_text).unwrap();
    let with_description = Node::new(
        Layer::Context,
        "constraint",
        "ascii-only",
        json!({"description": "identifiers stay ascii"}),
    );
    store.create_node(&with_description).unwrap();
    let silent = Node::new(Layer::Context, "constraint", "unspoken", json!({}));
    store.create_node(&silent).unwrap();

    let assembler = with_hash_embedder(&store);
    let pack = assembler
        .assemble("find me", RetrievalProfile::Default, None)
        .unwrap();
    let names: Vec<&str> = pack.constraints.iter().map(|c| c.name.as_str()).collect();
    assert!(names.contains(&"no-force-push"));
    assert!(names.contains(&"ascii-only"));
    assert!(!names.contains(&"unspoken"));
}

/// The worked default-profile scenario: a semantically close, recently
/// and frequently modified file outranks a distant file that is linked
/// to the task, and each is explained by its dominant signal.
#[test]
fn default_profile_ranks_similarity_over_task_link() {
    let store = store();
    let session = Node::new(Layer::Context, "session", "s1", json!({}));
    store.create_node(&session).unwrap();
    let task = Node::new(Layer::Context, "task", "current work", json!({}));
    store.create_node(&task).unwrap();

    let e1 = embedded_node(
        &store,
        Layer::System,
        "file",
        "/src/ranker.rs",
        json!({}),
    );
    let e2 = embedded_node(
        &store,
        Layer::System,
        "file",
        "/src/unrelated.rs",
        json!({}),
    );

    // Craft embeddings relative to the query vector: e1 close, e2 far.
    let embedder = HashEmbedder::default();
    use lattice_core::traits::IEmbedder;
    let query = "weighted signal ranking pipeline";
    let qv = embedder.embed(query).unwrap();
    let e1_vec = mix(&qv, 0.8); // distance 0.2, similarity 0.9
    let e2_vec = mix(&qv, -0.4); // distance 1.4, similarity 0.3
    store
        .update_embedding(&e1.id, "h1", &e1_vec)
        .unwrap();
    store
        .update_embedding(&e2.id, "h2", &e2_vec)
        .unwrap();

    // Activity: e1 modified 10 times, last 1 day ago; e2 twice, last 8 days.
    let now = Utc::now();
    for i in 0..10 {
        let mut event = EdgeEvent::new(&session.id, &e1.id, EventRelation::Modified, true);
        event.occurred_at = now - Duration::days(1) - Duration::minutes(i);
        store.create_edge_event(&event).unwrap();
    }
    for i in 0..2 {
        let mut event = EdgeEvent::new(&session.id, &e2.id, EventRelation::Modified, true);
        event.occurred_at = now - Duration::days(8) - Duration::minutes(i);
        store.create_edge_event(&event).unwrap();
    }

    // Task link: direct `affects` edge to e2 only.
    store
        .create_edge(&Edge::new(&task.id, &e2.id, Relation::Affects, json!({})))
        .unwrap();

    let assembler = with_hash_embedder(&store);
    let pack = assembler
        .assemble(query, RetrievalProfile::Default, Some(&task.id))
        .unwrap();

    let i1 = pack.items.iter().find(|i| i.node.id == e1.id).unwrap();
    let i2 = pack.items.iter().find(|i| i.node.id == e2.id).unwrap();

    assert!(i1.score > i2.score, "{} <= {}", i1.score, i2.score);
    assert!((0.6..0.8).contains(&i1.score), "e1 score {}", i1.score);
    assert!((0.4..0.56).contains(&i2.score), "e2 score {}", i2.score);
    assert_eq!(i1.why, "similar to the query");
    assert_eq!(i2.why, "linked in the graph");
}

/// Build a unit vector whose cosine with `qv` is exactly `target_cos`,
/// by blending in a direction orthogonal to `qv`.
fn mix(qv: &[f32], target_cos: f32) -> Vec<f32> {
    // Gram-Schmidt an orthogonal unit vector out of a shifted copy.
    let mut shifted: Vec<f32> = qv.iter().rev().copied().collect();
    shifted[0] += 1.0;
    let dot: f32 = qv.iter().zip(&shifted).map(|(a, b)| a * b).sum();
    let mut ortho: Vec<f32> = qv
        .iter()
        .zip(&shifted)
        .map(|(q, s)| s - dot * q)
        .collect();
    let norm: f32 = ortho.iter().map(|x| x * x).sum::<f32>().sqrt();
    for x in &mut ortho {
        *x /= norm;
    }
    let sin = (1.0 - target_cos * target_cos).sqrt();
    qv.iter()
        .zip(&ortho)
        .map(|(q, o)| target_cos * q + sin * o)
        .collect()
}
