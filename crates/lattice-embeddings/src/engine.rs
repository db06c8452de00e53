//! EmbeddingEngine — hash-gated embedding over the graph store.
//!
//! Foreground paths only ever *schedule* work here; the actual embed runs
//! on a detached background task that does not observe request
//! cancellation. The gate: a node is re-embedded only when the SHA-256 of
//! its current content differs from the hash its stored vector was
//! computed from.

use std::path::PathBuf;
use std::sync::Arc;

use lattice_core::graph::{node_types, Layer, Node};
use lattice_core::traits::IEmbedder;
use lattice_core::{LatticeError, LatticeResult};
use lattice_storage::queries::vector_search::SimilarityHit;
use lattice_storage::GraphEngine;
use tracing::{debug, warn};

use crate::content;

/// Shared, clone-cheap embedding engine.
#[derive(Clone)]
pub struct EmbeddingEngine {
    store: Arc<GraphEngine>,
    provider: Arc<dyn IEmbedder>,
    allowed_root: PathBuf,
}

impl EmbeddingEngine {
    pub fn new(
        store: Arc<GraphEngine>,
        provider: Arc<dyn IEmbedder>,
        allowed_root: PathBuf,
    ) -> Self {
        Self {
            store,
            provider,
            allowed_root,
        }
    }

    /// Whether similarity search can work at all.
    pub fn is_available(&self) -> bool {
        self.provider.is_available()
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Embed a query string. Fails with `NoEmbedder` when only the no-op
    /// sentinel is configured.
    pub fn embed_query(&self, query: &str) -> LatticeResult<Vec<f32>> {
        if !self.provider.is_available() {
            return Err(LatticeError::NoEmbedder);
        }
        self.provider.embed(query)
    }

    /// Lowest-distance live nodes across all types.
    pub fn search_similar(&self, query: &str, limit: usize) -> LatticeResult<Vec<SimilarityHit>> {
        let capped = limit.min(lattice_core::constants::MAX_SEARCH_LIMIT);
        let embedding = self.embed_query(query)?;
        self.store.search_vector(&embedding, capped, None)
    }

    /// Same, restricted to SYSTEM.file.
    pub fn search_similar_files(
        &self,
        query: &str,
        limit: usize,
    ) -> LatticeResult<Vec<SimilarityHit>> {
        let capped = limit.min(lattice_core::constants::MAX_SEARCH_LIMIT);
        let embedding = self.embed_query(query)?;
        self.store
            .search_vector(&embedding, capped, Some((Layer::System, node_types::FILE)))
    }

    /// Embed one node now if its content hash changed. Returns true when a
    /// new vector was stored. Used by the background paths only.
    pub fn embed_node_now(&self, node: &Node) -> LatticeResult<bool> {
        if !self.provider.is_available() {
            return Ok(false);
        }
        let current = content::resolve(node, &self.allowed_root)?;
        if node.embedding.is_some() && node.content_hash.as_deref() == Some(current.hash.as_str()) {
            return Ok(false);
        }
        let vector = self.provider.embed(&current.text)?;
        self.store
            .update_embedding(&node.id, &current.hash, &vector)?;
        debug!(node_id = %node.id, hash = %current.hash, "embedded node");
        Ok(true)
    }

    /// Detach a background embed for a node id. Fire-and-forget: the task's
    /// lifetime is independent of the calling request, and failures are
    /// logged and retried on the next hash mismatch.
    pub fn schedule_embed(&self, node_id: String) {
        if !self.provider.is_available() {
            return;
        }
        let engine = self.clone();
        tokio::spawn(async move {
            let result = tokio::task::spawn_blocking(move || {
                let node = match engine.store.get_node(&node_id)? {
                    Some(node) if node.is_live() => node,
                    _ => return Ok(false),
                };
                engine.embed_node_now(&node)
            })
            .await;
            match result {
                Ok(Ok(_)) => {}
                Ok(Err(e)) if e.is_not_found() => {}
                Ok(Err(e)) => warn!(error = %e, "background embed failed"),
                Err(e) => warn!(error = %e, "background embed task panicked"),
            }
        });
    }

    /// Synchronous catch-up pass over nodes that have never been embedded.
    /// Returns the number embedded. Used by maintenance ticks.
    pub fn embed_pending(&self, limit: usize) -> LatticeResult<usize> {
        if !self.provider.is_available() {
            return Ok(0);
        }
        let mut embedded = 0usize;
        for node in self.store.embedding_candidates(limit)? {
            match self.embed_node_now(&node) {
                Ok(true) => embedded += 1,
                Ok(false) => {}
                Err(e) if e.is_not_found() => {}
                Err(e) => warn!(node_id = %node.id, error = %e, "embed failed"),
            }
        }
        Ok(embedded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{HashEmbedder, NoopEmbedder};
    use serde_json::json;

    fn store() -> Arc<GraphEngine> {
        Arc::new(GraphEngine::open_in_memory().unwrap())
    }

    fn hash_engine(store: Arc<GraphEngine>) -> EmbeddingEngine {
        EmbeddingEngine::new(store, Arc::new(HashEmbedder::default()), PathBuf::from("."))
    }

    #[test]
    fn search_without_embedder_fails() {
        let engine = EmbeddingEngine::new(store(), Arc::new(NoopEmbedder), PathBuf::from("."));
        let err = engine.search_similar("anything", 5).unwrap_err();
        assert!(matches!(err, LatticeError::NoEmbedder));
    }

    #[test]
    fn embed_is_gated_by_content_hash() {
        let store = store();
        let engine = hash_engine(store.clone());
        let node = Node::new(Layer::Context, "task", "t1", json!({"goal": "ship"}));
        store.create_node(&node).unwrap();

        let node = store.get_node(&node.id).unwrap().unwrap();
        assert!(engine.embed_node_now(&node).unwrap());
        // Unchanged content: gate holds.
        let node = store.get_node(&node.id).unwrap().unwrap();
        assert!(!engine.embed_node_now(&node).unwrap());
        // Changed payload: gate opens.
        let mut changed = node.clone();
        changed.payload = json!({"goal": "ship faster"});
        store.update_node(&changed).unwrap();
        let changed = store.get_node(&node.id).unwrap().unwrap();
        assert!(engine.embed_node_now(&changed).unwrap());
    }

    #[test]
    fn search_similar_finds_embedded_nodes() {
        let store = store();
        let engine = hash_engine(store.clone());
        for (name, topic) in [("t1", "database storage engine"), ("t2", "terminal colours")] {
            let node = Node::new(Layer::Context, "task", name, json!({"topic": topic}));
            store.create_node(&node).unwrap();
            let node = store.get_node(&node.id).unwrap().unwrap();
            engine.embed_node_now(&node).unwrap();
        }
        let hits = engine.search_similar("database storage engine", 2).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].node.name, "t1");
        assert!(hits[0].distance < hits[1].distance);
    }

    #[test]
    fn embed_pending_catches_up() {
        let store = store();
        let engine = hash_engine(store.clone());
        for i in 0..3 {
            store
                .create_node(&Node::new(
                    Layer::Context,
                    "task",
                    format!("t{i}"),
                    json!({"i": i}),
                ))
                .unwrap();
        }
        assert_eq!(engine.embed_pending(10).unwrap(), 3);
        assert_eq!(engine.embed_pending(10).unwrap(), 0);
    }
}
