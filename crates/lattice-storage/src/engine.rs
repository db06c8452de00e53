//! GraphEngine — fronts every storage operation over the connection
//! pool: mutations on the single writer, queries round-robin over the
//! readers.

use std::collections::HashMap;
use std::path::Path;

use chrono::{DateTime, Utc};

use lattice_core::graph::{
    Edge, EdgeEvent, EdgeFilter, Layer, Node, NodeFilter, NodeVersion, Observation,
};
use lattice_core::LatticeResult;

use crate::partitions::{self, Family};
use crate::pool::SqlitePool;
use crate::queries;
use crate::queries::aggregation::{ActivityStats, GraphStats};
use crate::queries::traversal::{ClosureEntry, LineageStep};
use crate::queries::vector_search::SimilarityHit;
use crate::versioning;

/// The main storage engine.
pub struct GraphEngine {
    pool: SqlitePool,
}

impl GraphEngine {
    /// Open a storage engine backed by a file on disk.
    pub fn open(path: &Path) -> LatticeResult<Self> {
        let engine = Self {
            pool: SqlitePool::open_file(path)?,
        };
        engine.initialize()?;
        Ok(engine)
    }

    /// Open an in-memory storage engine (for testing).
    pub fn open_in_memory() -> LatticeResult<Self> {
        let engine = Self {
            pool: SqlitePool::open_memory()?,
        };
        engine.initialize()?;
        Ok(engine)
    }

    fn initialize(&self) -> LatticeResult<()> {
        self.pool.write(|conn| {
            crate::migrations::run_migrations(conn)?;
            partitions::ensure_future_partitions(conn, lattice_core::constants::FUTURE_PARTITIONS)
        })
    }

    /// Execute a read-only closure on the best available connection.
    pub fn with_reader<F, T>(&self, f: F) -> LatticeResult<T>
    where
        F: FnOnce(&rusqlite::Connection) -> LatticeResult<T>,
    {
        self.pool.read(f)
    }

    /// Execute a closure holding the write connection.
    pub fn with_writer<F, T>(&self, f: F) -> LatticeResult<T>
    where
        F: FnOnce(&rusqlite::Connection) -> LatticeResult<T>,
    {
        self.pool.write(f)
    }

    // ── Nodes ──────────────────────────────────────────────────────────

    pub fn create_node(&self, node: &Node) -> LatticeResult<()> {
        self.with_writer(|conn| queries::node_crud::insert_node(conn, node))
    }

    pub fn get_node(&self, id: &str) -> LatticeResult<Option<Node>> {
        self.with_reader(|conn| queries::node_crud::get_node(conn, id))
    }

    pub fn get_active(&self, id: &str) -> LatticeResult<Node> {
        self.with_reader(|conn| queries::node_crud::get_active(conn, id))
    }

    pub fn get_by_name(
        &self,
        layer: Layer,
        node_type: &str,
        name: &str,
    ) -> LatticeResult<Option<Node>> {
        self.with_reader(|conn| queries::node_query::get_by_name(conn, layer, node_type, name))
    }

    pub fn get_by_path(&self, path: &str) -> LatticeResult<Option<Node>> {
        self.with_reader(|conn| queries::node_query::get_by_path(conn, path))
    }

    pub fn list(&self, limit: usize) -> LatticeResult<Vec<Node>> {
        self.with_reader(|conn| queries::node_query::list(conn, limit))
    }

    pub fn list_by_layer(&self, layer: Layer, limit: usize) -> LatticeResult<Vec<Node>> {
        self.with_reader(|conn| queries::node_query::list_by_layer(conn, layer, limit))
    }

    pub fn list_by_layer_type(
        &self,
        layer: Layer,
        node_type: &str,
        limit: usize,
    ) -> LatticeResult<Vec<Node>> {
        self.with_reader(|conn| {
            queries::node_query::list_by_layer_type(conn, layer, node_type, limit)
        })
    }

    pub fn search(&self, filter: &NodeFilter) -> LatticeResult<Vec<Node>> {
        self.with_reader(|conn| queries::node_query::search(conn, filter))
    }

    pub fn get_bulk(&self, ids: &[String]) -> LatticeResult<Vec<Node>> {
        self.with_reader(|conn| queries::node_query::get_bulk(conn, ids))
    }

    pub fn update_node(&self, node: &Node) -> LatticeResult<()> {
        self.with_writer(|conn| queries::node_crud::update_node(conn, node))
    }

    pub fn merge_update(
        &self,
        id: &str,
        patch: &serde_json::Map<String, serde_json::Value>,
    ) -> LatticeResult<Node> {
        self.with_writer(|conn| queries::node_crud::merge_update(conn, id, patch))
    }

    pub fn get_or_create(
        &self,
        layer: Layer,
        node_type: &str,
        name: &str,
        payload: serde_json::Value,
    ) -> LatticeResult<(Node, bool)> {
        self.with_writer(|conn| {
            queries::node_crud::get_or_create(conn, layer, node_type, name, payload)
        })
    }

    pub fn soft_delete(&self, id: &str) -> LatticeResult<()> {
        self.with_writer(|conn| queries::node_crud::soft_delete(conn, id))
    }

    pub fn touch(&self, id: &str) -> LatticeResult<()> {
        self.with_writer(|conn| queries::node_crud::touch(conn, id))
    }

    // ── Edges ──────────────────────────────────────────────────────────

    pub fn create_edge(&self, edge: &Edge) -> LatticeResult<()> {
        self.with_writer(|conn| queries::edge_ops::create_edge(conn, edge))
    }

    pub fn deprecate_edge(&self, id: &str) -> LatticeResult<()> {
        self.with_writer(|conn| queries::edge_ops::deprecate_edge(conn, id))
    }

    pub fn get_edge(&self, id: &str) -> LatticeResult<Option<Edge>> {
        self.with_reader(|conn| queries::edge_ops::get_edge(conn, id))
    }

    pub fn list_edges(&self, filter: &EdgeFilter) -> LatticeResult<Vec<Edge>> {
        self.with_reader(|conn| queries::edge_ops::list_edges(conn, filter))
    }

    pub fn live_edges_touching(&self, ids: &[String]) -> LatticeResult<Vec<Edge>> {
        self.with_reader(|conn| queries::edge_ops::live_edges_touching(conn, ids))
    }

    // ── Causal events ──────────────────────────────────────────────────

    pub fn create_edge_event(&self, event: &EdgeEvent) -> LatticeResult<()> {
        self.with_writer(|conn| queries::event_ops::create_edge_event(conn, event))
    }

    pub fn events_in_range(
        &self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
        limit: usize,
    ) -> LatticeResult<Vec<EdgeEvent>> {
        self.with_reader(|conn| queries::event_ops::events_in_range(conn, from, to, limit))
    }

    // ── Observations ───────────────────────────────────────────────────

    pub fn create_observation(&self, observation: &Observation) -> LatticeResult<()> {
        self.with_writer(|conn| queries::observation_ops::create_observation(conn, observation))
    }

    pub fn list_observations_by_type(
        &self,
        observation_type: &str,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
        limit: usize,
    ) -> LatticeResult<Vec<Observation>> {
        self.with_reader(|conn| {
            queries::observation_ops::list_observations_by_type(
                conn,
                observation_type,
                from,
                to,
                limit,
            )
        })
    }

    pub fn list_observations_for_node(
        &self,
        node_id: &str,
        limit: usize,
    ) -> LatticeResult<Vec<Observation>> {
        self.with_reader(|conn| {
            queries::observation_ops::list_observations_for_node(conn, node_id, limit)
        })
    }

    // ── Traversal ──────────────────────────────────────────────────────

    pub fn dependencies(&self, root_id: &str, max_depth: usize) -> LatticeResult<Vec<ClosureEntry>> {
        self.with_reader(|conn| queries::traversal::dependencies(conn, root_id, max_depth))
    }

    pub fn dependents(&self, root_id: &str, max_depth: usize) -> LatticeResult<Vec<ClosureEntry>> {
        self.with_reader(|conn| queries::traversal::dependents(conn, root_id, max_depth))
    }

    pub fn lineage(&self, root_id: &str, max_depth: usize) -> LatticeResult<Vec<LineageStep>> {
        self.with_reader(|conn| queries::traversal::lineage(conn, root_id, max_depth))
    }

    pub fn shortest_path(
        &self,
        from_id: &str,
        to_id: &str,
        max_depth: usize,
    ) -> LatticeResult<Vec<String>> {
        self.with_reader(|conn| queries::traversal::shortest_path(conn, from_id, to_id, max_depth))
    }

    // ── Similarity ─────────────────────────────────────────────────────

    pub fn search_vector(
        &self,
        query_embedding: &[f32],
        limit: usize,
        restrict: Option<(Layer, &str)>,
    ) -> LatticeResult<Vec<SimilarityHit>> {
        self.with_reader(|conn| {
            queries::vector_search::search_vector(conn, query_embedding, limit, restrict)
        })
    }

    pub fn embedding_candidates(&self, limit: usize) -> LatticeResult<Vec<Node>> {
        self.with_reader(|conn| queries::vector_search::embedding_candidates(conn, limit))
    }

    pub fn update_embedding(
        &self,
        id: &str,
        content_hash: &str,
        embedding: &[f32],
    ) -> LatticeResult<()> {
        self.with_writer(|conn| {
            queries::node_crud::update_embedding(conn, id, content_hash, embedding)
        })
    }

    // ── Aggregation ────────────────────────────────────────────────────

    pub fn file_activity(&self, ids: &[String]) -> LatticeResult<HashMap<String, ActivityStats>> {
        self.with_reader(|conn| queries::aggregation::file_activity(conn, ids))
    }

    pub fn session_cooccurrence(
        &self,
        task_id: &str,
        item_ids: &[String],
    ) -> LatticeResult<HashMap<String, i64>> {
        self.with_reader(|conn| {
            queries::aggregation::session_cooccurrence(conn, task_id, item_ids)
        })
    }

    pub fn graph_stats(&self) -> LatticeResult<GraphStats> {
        self.with_reader(queries::aggregation::graph_stats)
    }

    // ── Version log ────────────────────────────────────────────────────

    pub fn list_versions(&self, node_id: &str) -> LatticeResult<Vec<NodeVersion>> {
        self.with_reader(|conn| versioning::list_versions(conn, node_id))
    }

    pub fn get_version(&self, node_id: &str, version: i64) -> LatticeResult<NodeVersion> {
        self.with_reader(|conn| versioning::get_version(conn, node_id, version))
    }

    // ── Maintenance ────────────────────────────────────────────────────

    pub fn partition_maintenance(&self) -> LatticeResult<usize> {
        self.with_writer(queries::maintenance::partition_maintenance)
    }

    pub fn drop_expired_partitions(&self, cutoff: DateTime<Utc>) -> LatticeResult<usize> {
        self.with_writer(|conn| {
            let mut dropped = partitions::drop_partitions_before(conn, Family::EdgeEvents, cutoff)?;
            dropped += partitions::drop_partitions_before(conn, Family::Observations, cutoff)?;
            Ok(dropped)
        })
    }

    pub fn vacuum(&self) -> LatticeResult<()> {
        self.with_writer(queries::maintenance::full_vacuum)
    }

    pub fn wal_checkpoint(&self) -> LatticeResult<()> {
        self.with_writer(queries::maintenance::wal_checkpoint)
    }

    pub fn trim_working_set(&self) -> LatticeResult<usize> {
        self.with_writer(queries::maintenance::trim_working_set)
    }
}
