//! Graph, retrieval, and automation tools over the engine.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::DateTime;
use serde_json::{json, Value};

use lattice_core::constants::{DEFAULT_LINEAGE_DEPTH, DEFAULT_TRAVERSAL_DEPTH};
use lattice_core::graph::{Edge, EdgeEvent, EdgeFilter, EventRelation, Layer, Node, NodeFilter, Observation, Relation};
use lattice_core::{LatticeError, LatticeResult};
use lattice_evolution::{metrics, WorkOrderStatus};
use lattice_retrieval::RetrievalProfile;

use crate::context::ToolEnv;
use crate::fs::{opt_str, opt_usize, str_arg};
use crate::registry::{Tool, ToolTag};

/// All graph-facing tools, ready for registration.
pub fn tools() -> Vec<Arc<dyn Tool>> {
    vec![
        Arc::new(NodeGetTool),
        Arc::new(NodeByPathTool),
        Arc::new(NodeSearchTool),
        Arc::new(NodeCreateTool),
        Arc::new(NodeUpdateTool),
        Arc::new(NodeMergeTool),
        Arc::new(NodeGetOrCreateTool),
        Arc::new(NodeDeleteTool),
        Arc::new(NodeVersionsTool),
        Arc::new(EdgeCreateTool),
        Arc::new(EdgeDeprecateTool),
        Arc::new(EdgeListTool),
        Arc::new(EventRecordTool),
        Arc::new(ObserveTool),
        Arc::new(ObservationsListTool),
        Arc::new(DependenciesTool),
        Arc::new(DependentsTool),
        Arc::new(LineageTool),
        Arc::new(ShortestPathTool),
        Arc::new(SimilarSearchTool),
        Arc::new(SimilarFilesTool),
        Arc::new(ContextPackTool),
        Arc::new(WorkOrderCreateTool),
        Arc::new(WorkOrderTransitionTool),
        Arc::new(WorkOrderScopeCheckTool),
        Arc::new(EvolutionMetricsTool),
        Arc::new(DetectPatternsTool),
        Arc::new(GcRunTool),
        Arc::new(GraphStatsTool),
        Arc::new(MaintenanceTool),
    ]
}

fn layer_arg(args: &Value, key: &str) -> LatticeResult<Layer> {
    let raw = str_arg(args, key)?;
    Layer::parse(raw)
        .ok_or_else(|| LatticeError::invalid_argument(format!("unknown layer '{raw}'")))
}

fn relation_arg(args: &Value, key: &str) -> LatticeResult<Relation> {
    let raw = str_arg(args, key)?;
    Relation::parse(raw)
        .ok_or_else(|| LatticeError::invalid_argument(format!("unknown relation '{raw}'")))
}

fn payload_arg(args: &Value) -> Value {
    args.get("payload").cloned().unwrap_or_else(|| json!({}))
}

fn time_arg(args: &Value, key: &str) -> LatticeResult<Option<chrono::DateTime<chrono::Utc>>> {
    match opt_str(args, key) {
        None => Ok(None),
        Some(raw) => DateTime::parse_from_rfc3339(raw)
            .map(|dt| Some(dt.with_timezone(&chrono::Utc)))
            .map_err(|e| LatticeError::invalid_argument(format!("bad timestamp '{raw}': {e}"))),
    }
}

fn node_summary(node: &Node) -> Value {
    json!({
        "id": node.id,
        "layer": node.layer.as_str(),
        "type": node.node_type,
        "name": node.name,
        "payload": node.payload,
        "created_at": node.created_at.to_rfc3339(),
        "updated_at": node.updated_at.to_rfc3339(),
        "deleted": node.deleted_at.is_some(),
    })
}

fn edge_summary(edge: &Edge) -> Value {
    json!({
        "id": edge.id,
        "source": edge.source_id,
        "target": edge.target_id,
        "relation": edge.relation.as_str(),
        "live": edge.is_live(),
        "created_at": edge.created_at.to_rfc3339(),
    })
}

// ── node tools ────────────────────────────────────────────────────────

pub struct NodeGetTool;

#[async_trait]
impl Tool for NodeGetTool {
    fn name(&self) -> &'static str {
        "node_get"
    }
    fn description(&self) -> &'static str {
        "Fetch an entity by id, including soft-deleted ones"
    }
    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {"id": {"type": "string"}},
            "required": ["id"]
        })
    }
    fn tags(&self) -> &'static [ToolTag] {
        &[ToolTag::Read, ToolTag::Graph]
    }
    async fn run(&self, env: &ToolEnv, args: Value) -> LatticeResult<Value> {
        let id = str_arg(&args, "id")?;
        let node = env
            .store
            .get_node(id)?
            .ok_or_else(|| LatticeError::not_found(format!("node {id}")))?;
        Ok(node_summary(&node))
    }
}

pub struct NodeByPathTool;

#[async_trait]
impl Tool for NodeByPathTool {
    fn name(&self) -> &'static str {
        "node_by_path"
    }
    fn description(&self) -> &'static str {
        "Find a SYSTEM.file entity by path, with basename-suffix fallback"
    }
    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {"path": {"type": "string"}},
            "required": ["path"]
        })
    }
    fn tags(&self) -> &'static [ToolTag] {
        &[ToolTag::Read, ToolTag::Graph]
    }
    async fn run(&self, env: &ToolEnv, args: Value) -> LatticeResult<Value> {
        let path = str_arg(&args, "path")?;
        let node = env
            .store
            .get_by_path(path)?
            .ok_or_else(|| LatticeError::not_found(format!("file {path}")))?;
        Ok(node_summary(&node))
    }
}

pub struct NodeSearchTool;

#[async_trait]
impl Tool for NodeSearchTool {
    fn name(&self) -> &'static str {
        "node_search"
    }
    fn description(&self) -> &'static str {
        "Search live entities by layer, type, name pattern, and payload fields"
    }
    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "layer": {"type": "string", "enum": ["CONTEXT", "SYSTEM", "AUTOMATION"]},
                "type": {"type": "string"},
                "name": {"type": "string"},
                "match": {"type": "string", "enum": ["prefix", "substring"]},
                "payload": {"type": "object"},
                "limit": {"type": "integer", "minimum": 1}
            }
        })
    }
    fn tags(&self) -> &'static [ToolTag] {
        &[ToolTag::Read, ToolTag::Graph]
    }
    async fn run(&self, env: &ToolEnv, args: Value) -> LatticeResult<Value> {
        let filter = NodeFilter {
            layer: opt_str(&args, "layer").and_then(Layer::parse),
            node_type: opt_str(&args, "type").map(str::to_string),
            name_pattern: opt_str(&args, "name").map(str::to_string),
            name_match: match opt_str(&args, "match") {
                Some("prefix") => lattice_core::graph::NameMatch::Prefix,
                _ => lattice_core::graph::NameMatch::Substring,
            },
            payload_contains: args
                .get("payload")
                .and_then(|v| v.as_object())
                .cloned(),
            limit: opt_usize(&args, "limit"),
        };
        let nodes = env.store.search(&filter)?;
        Ok(json!({ "nodes": nodes.iter().map(node_summary).collect::<Vec<_>>() }))
    }
}

pub struct NodeCreateTool;

#[async_trait]
impl Tool for NodeCreateTool {
    fn name(&self) -> &'static str {
        "node_create"
    }
    fn description(&self) -> &'static str {
        "Create an entity; (layer, type, name) must be unique among live entities"
    }
    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "layer": {"type": "string", "enum": ["CONTEXT", "SYSTEM", "AUTOMATION"]},
                "type": {"type": "string", "minLength": 1},
                "name": {"type": "string", "minLength": 1},
                "payload": {"type": "object"}
            },
            "required": ["layer", "type", "name"]
        })
    }
    fn tags(&self) -> &'static [ToolTag] {
        &[ToolTag::Write, ToolTag::Graph]
    }
    async fn run(&self, env: &ToolEnv, args: Value) -> LatticeResult<Value> {
        let node = Node::new(
            layer_arg(&args, "layer")?,
            str_arg(&args, "type")?,
            str_arg(&args, "name")?,
            payload_arg(&args),
        );
        env.store.create_node(&node)?;
        env.embeddings.schedule_embed(node.id.clone());
        Ok(node_summary(&node))
    }
}

pub struct NodeUpdateTool;

#[async_trait]
impl Tool for NodeUpdateTool {
    fn name(&self) -> &'static str {
        "node_update"
    }
    fn description(&self) -> &'static str {
        "Replace an entity's name and payload"
    }
    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "id": {"type": "string"},
                "name": {"type": "string"},
                "payload": {"type": "object"}
            },
            "required": ["id"]
        })
    }
    fn tags(&self) -> &'static [ToolTag] {
        &[ToolTag::Write, ToolTag::Graph]
    }
    async fn run(&self, env: &ToolEnv, args: Value) -> LatticeResult<Value> {
        let id = str_arg(&args, "id")?;
        let mut node = env.store.get_active(id)?;
        if let Some(name) = opt_str(&args, "name") {
            node.name = name.to_string();
        }
        if let Some(payload) = args.get("payload") {
            node.payload = payload.clone();
        }
        env.store.update_node(&node)?;
        env.embeddings.schedule_embed(node.id.clone());
        Ok(node_summary(&env.store.get_active(id)?))
    }
}

pub struct NodeMergeTool;

#[async_trait]
impl Tool for NodeMergeTool {
    fn name(&self) -> &'static str {
        "node_merge"
    }
    fn description(&self) -> &'static str {
        "Shallow-merge keys into an entity's payload"
    }
    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "id": {"type": "string"},
                "patch": {"type": "object"}
            },
            "required": ["id", "patch"]
        })
    }
    fn tags(&self) -> &'static [ToolTag] {
        &[ToolTag::Write, ToolTag::Graph]
    }
    async fn run(&self, env: &ToolEnv, args: Value) -> LatticeResult<Value> {
        let id = str_arg(&args, "id")?;
        let patch = args
            .get("patch")
            .and_then(|v| v.as_object())
            .ok_or_else(|| LatticeError::invalid_argument("patch must be an object"))?;
        let node = env.store.merge_update(id, patch)?;
        env.embeddings.schedule_embed(node.id.clone());
        Ok(node_summary(&node))
    }
}

pub struct NodeGetOrCreateTool;

#[async_trait]
impl Tool for NodeGetOrCreateTool {
    fn name(&self) -> &'static str {
        "node_get_or_create"
    }
    fn description(&self) -> &'static str {
        "Fetch the live entity with this identity, creating it if absent"
    }
    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "layer": {"type": "string", "enum": ["CONTEXT", "SYSTEM", "AUTOMATION"]},
                "type": {"type": "string", "minLength": 1},
                "name": {"type": "string", "minLength": 1},
                "payload": {"type": "object"}
            },
            "required": ["layer", "type", "name"]
        })
    }
    fn tags(&self) -> &'static [ToolTag] {
        &[ToolTag::Write, ToolTag::Graph]
    }
    async fn run(&self, env: &ToolEnv, args: Value) -> LatticeResult<Value> {
        let (node, created) = env.store.get_or_create(
            layer_arg(&args, "layer")?,
            str_arg(&args, "type")?,
            str_arg(&args, "name")?,
            payload_arg(&args),
        )?;
        if created {
            env.embeddings.schedule_embed(node.id.clone());
        }
        let mut out = node_summary(&node);
        out["created"] = json!(created);
        Ok(out)
    }
}

pub struct NodeDeleteTool;

#[async_trait]
impl Tool for NodeDeleteTool {
    fn name(&self) -> &'static str {
        "node_delete"
    }
    fn description(&self) -> &'static str {
        "Soft-delete an entity; incident edges are deprecated by cascade"
    }
    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {"id": {"type": "string"}},
            "required": ["id"]
        })
    }
    fn tags(&self) -> &'static [ToolTag] {
        &[ToolTag::Write, ToolTag::Graph]
    }
    async fn run(&self, env: &ToolEnv, args: Value) -> LatticeResult<Value> {
        let id = str_arg(&args, "id")?;
        env.store.soft_delete(id)?;
        Ok(json!({ "id": id, "deleted": true }))
    }
}

pub struct NodeVersionsTool;

#[async_trait]
impl Tool for NodeVersionsTool {
    fn name(&self) -> &'static str {
        "node_versions"
    }
    fn description(&self) -> &'static str {
        "List an entity's mutation snapshots, oldest first"
    }
    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "id": {"type": "string"},
                "version": {"type": "integer", "minimum": 1}
            },
            "required": ["id"]
        })
    }
    fn tags(&self) -> &'static [ToolTag] {
        &[ToolTag::Read, ToolTag::Graph]
    }
    async fn run(&self, env: &ToolEnv, args: Value) -> LatticeResult<Value> {
        let id = str_arg(&args, "id")?;
        if let Some(version) = args.get("version").and_then(|v| v.as_i64()) {
            let snapshot = env.store.get_version(id, version)?;
            return Ok(json!({
                "node_id": snapshot.node_id,
                "version": snapshot.version,
                "name": snapshot.name,
                "payload": snapshot.payload,
                "created_at": snapshot.created_at.to_rfc3339(),
            }));
        }
        let versions = env.store.list_versions(id)?;
        Ok(json!({
            "versions": versions
                .iter()
                .map(|v| json!({
                    "version": v.version,
                    "name": v.name,
                    "payload": v.payload,
                    "created_at": v.created_at.to_rfc3339(),
                }))
                .collect::<Vec<_>>()
        }))
    }
}

// ── edge & event tools ────────────────────────────────────────────────

pub struct EdgeCreateTool;

#[async_trait]
impl Tool for EdgeCreateTool {
    fn name(&self) -> &'static str {
        "edge_create"
    }
    fn description(&self) -> &'static str {
        "Create a typed edge between two live entities"
    }
    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "source": {"type": "string"},
                "target": {"type": "string"},
                "relation": {"type": "string"},
                "payload": {"type": "object"}
            },
            "required": ["source", "target", "relation"]
        })
    }
    fn tags(&self) -> &'static [ToolTag] {
        &[ToolTag::Write, ToolTag::Graph]
    }
    async fn run(&self, env: &ToolEnv, args: Value) -> LatticeResult<Value> {
        let edge = Edge::new(
            str_arg(&args, "source")?,
            str_arg(&args, "target")?,
            relation_arg(&args, "relation")?,
            payload_arg(&args),
        );
        env.store.create_edge(&edge)?;
        Ok(edge_summary(&edge))
    }
}

pub struct EdgeDeprecateTool;

#[async_trait]
impl Tool for EdgeDeprecateTool {
    fn name(&self) -> &'static str {
        "edge_deprecate"
    }
    fn description(&self) -> &'static str {
        "Stamp deprecation on an edge; edges are never deleted"
    }
    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {"id": {"type": "string"}},
            "required": ["id"]
        })
    }
    fn tags(&self) -> &'static [ToolTag] {
        &[ToolTag::Write, ToolTag::Graph]
    }
    async fn run(&self, env: &ToolEnv, args: Value) -> LatticeResult<Value> {
        let id = str_arg(&args, "id")?;
        env.store.deprecate_edge(id)?;
        Ok(json!({ "id": id, "deprecated": true }))
    }
}

pub struct EdgeListTool;

#[async_trait]
impl Tool for EdgeListTool {
    fn name(&self) -> &'static str {
        "edge_list"
    }
    fn description(&self) -> &'static str {
        "List edges by source, target, relation, and liveness"
    }
    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "source": {"type": "string"},
                "target": {"type": "string"},
                "relation": {"type": "string"},
                "live_only": {"type": "boolean"}
            }
        })
    }
    fn tags(&self) -> &'static [ToolTag] {
        &[ToolTag::Read, ToolTag::Graph]
    }
    async fn run(&self, env: &ToolEnv, args: Value) -> LatticeResult<Value> {
        let filter = EdgeFilter {
            source_id: opt_str(&args, "source").map(str::to_string),
            target_id: opt_str(&args, "target").map(str::to_string),
            relation: opt_str(&args, "relation").and_then(Relation::parse),
            live_only: args
                .get("live_only")
                .and_then(|v| v.as_bool())
                .unwrap_or(true),
        };
        let edges = env.store.list_edges(&filter)?;
        Ok(json!({ "edges": edges.iter().map(edge_summary).collect::<Vec<_>>() }))
    }
}

pub struct EventRecordTool;

#[async_trait]
impl Tool for EventRecordTool {
    fn name(&self) -> &'static str {
        "event_record"
    }
    fn description(&self) -> &'static str {
        "Record a causal event between two entities"
    }
    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "source": {"type": "string"},
                "target": {"type": "string"},
                "relation": {"type": "string"},
                "success": {"type": "boolean"},
                "duration_ms": {"type": "integer", "minimum": 0},
                "payload": {"type": "object"}
            },
            "required": ["source", "target", "relation", "success"]
        })
    }
    fn tags(&self) -> &'static [ToolTag] {
        &[ToolTag::Write, ToolTag::Graph]
    }
    async fn run(&self, env: &ToolEnv, args: Value) -> LatticeResult<Value> {
        let relation_raw = str_arg(&args, "relation")?;
        let relation = EventRelation::parse(relation_raw).ok_or_else(|| {
            LatticeError::invalid_argument(format!("unknown event relation '{relation_raw}'"))
        })?;
        let success = args
            .get("success")
            .and_then(|v| v.as_bool())
            .ok_or_else(|| LatticeError::invalid_argument("success flag is mandatory"))?;
        let mut event = EdgeEvent::new(
            str_arg(&args, "source")?,
            str_arg(&args, "target")?,
            relation,
            success,
        )
        .with_payload(payload_arg(&args));
        if let Some(duration) = args.get("duration_ms").and_then(|v| v.as_i64()) {
            event = event.with_duration(duration);
        }
        env.store.create_edge_event(&event)?;
        Ok(json!({ "id": event.id, "occurred_at": event.occurred_at.to_rfc3339() }))
    }
}

pub struct ObserveTool;

#[async_trait]
impl Tool for ObserveTool {
    fn name(&self) -> &'static str {
        "observe"
    }
    fn description(&self) -> &'static str {
        "Record a telemetry observation anchored on an entity"
    }
    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "node_id": {"type": "string"},
                "type": {"type": "string", "minLength": 1},
                "payload": {"type": "object"}
            },
            "required": ["node_id", "type"]
        })
    }
    fn tags(&self) -> &'static [ToolTag] {
        &[ToolTag::Write, ToolTag::Graph]
    }
    async fn run(&self, env: &ToolEnv, args: Value) -> LatticeResult<Value> {
        let observation = Observation::new(
            str_arg(&args, "node_id")?,
            str_arg(&args, "type")?,
            payload_arg(&args),
        );
        env.store.create_observation(&observation)?;
        Ok(json!({ "id": observation.id, "observed_at": observation.observed_at.to_rfc3339() }))
    }
}

pub struct ObservationsListTool;

#[async_trait]
impl Tool for ObservationsListTool {
    fn name(&self) -> &'static str {
        "observations_list"
    }
    fn description(&self) -> &'static str {
        "Bounded scan of observations of one type over a time range"
    }
    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "type": {"type": "string", "minLength": 1},
                "from": {"type": "string"},
                "to": {"type": "string"},
                "limit": {"type": "integer", "minimum": 1}
            },
            "required": ["type"]
        })
    }
    fn tags(&self) -> &'static [ToolTag] {
        &[ToolTag::Read, ToolTag::Graph]
    }
    async fn run(&self, env: &ToolEnv, args: Value) -> LatticeResult<Value> {
        let observations = env.store.list_observations_by_type(
            str_arg(&args, "type")?,
            time_arg(&args, "from")?,
            time_arg(&args, "to")?,
            opt_usize(&args, "limit").unwrap_or(100).min(1000),
        )?;
        Ok(json!({
            "observations": observations
                .iter()
                .map(|o| json!({
                    "id": o.id,
                    "node_id": o.node_id,
                    "type": o.observation_type,
                    "payload": o.payload,
                    "observed_at": o.observed_at.to_rfc3339(),
                }))
                .collect::<Vec<_>>()
        }))
    }
}

// ── traversal tools ───────────────────────────────────────────────────

fn closure_json(entries: &[lattice_storage::queries::traversal::ClosureEntry]) -> Value {
    json!(entries
        .iter()
        .map(|entry| json!({
            "node": node_summary(&entry.node),
            "depth": entry.depth,
            "path": entry.path,
        }))
        .collect::<Vec<_>>())
}

pub struct DependenciesTool;

#[async_trait]
impl Tool for DependenciesTool {
    fn name(&self) -> &'static str {
        "graph_dependencies"
    }
    fn description(&self) -> &'static str {
        "Transitive depends_on closure from a root entity"
    }
    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "id": {"type": "string"},
                "depth": {"type": "integer", "minimum": 1}
            },
            "required": ["id"]
        })
    }
    fn tags(&self) -> &'static [ToolTag] {
        &[ToolTag::Read, ToolTag::Graph]
    }
    async fn run(&self, env: &ToolEnv, args: Value) -> LatticeResult<Value> {
        let entries = env.store.dependencies(
            str_arg(&args, "id")?,
            opt_usize(&args, "depth").unwrap_or(DEFAULT_TRAVERSAL_DEPTH),
        )?;
        Ok(json!({ "dependencies": closure_json(&entries) }))
    }
}

pub struct DependentsTool;

#[async_trait]
impl Tool for DependentsTool {
    fn name(&self) -> &'static str {
        "graph_dependents"
    }
    fn description(&self) -> &'static str {
        "Everything that transitively depends on a root entity"
    }
    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "id": {"type": "string"},
                "depth": {"type": "integer", "minimum": 1}
            },
            "required": ["id"]
        })
    }
    fn tags(&self) -> &'static [ToolTag] {
        &[ToolTag::Read, ToolTag::Graph]
    }
    async fn run(&self, env: &ToolEnv, args: Value) -> LatticeResult<Value> {
        let entries = env.store.dependents(
            str_arg(&args, "id")?,
            opt_usize(&args, "depth").unwrap_or(DEFAULT_TRAVERSAL_DEPTH),
        )?;
        Ok(json!({ "dependents": closure_json(&entries) }))
    }
}

pub struct LineageTool;

#[async_trait]
impl Tool for LineageTool {
    fn name(&self) -> &'static str {
        "graph_lineage"
    }
    fn description(&self) -> &'static str {
        "Walk the causal event chain forward from a root entity"
    }
    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "id": {"type": "string"},
                "depth": {"type": "integer", "minimum": 1}
            },
            "required": ["id"]
        })
    }
    fn tags(&self) -> &'static [ToolTag] {
        &[ToolTag::Read, ToolTag::Graph]
    }
    async fn run(&self, env: &ToolEnv, args: Value) -> LatticeResult<Value> {
        let steps = env.store.lineage(
            str_arg(&args, "id")?,
            opt_usize(&args, "depth").unwrap_or(DEFAULT_LINEAGE_DEPTH),
        )?;
        Ok(json!({
            "lineage": steps
                .iter()
                .map(|step| json!({
                    "source": step.event.source_id,
                    "target": step.event.target_id,
                    "relation": step.event.relation.as_str(),
                    "success": step.event.success,
                    "duration_ms": step.event.duration_ms,
                    "depth": step.depth,
                    "occurred_at": step.event.occurred_at.to_rfc3339(),
                }))
                .collect::<Vec<_>>()
        }))
    }
}

pub struct ShortestPathTool;

#[async_trait]
impl Tool for ShortestPathTool {
    fn name(&self) -> &'static str {
        "graph_path"
    }
    fn description(&self) -> &'static str {
        "Breadth-first shortest path between two entities over live edges"
    }
    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "from": {"type": "string"},
                "to": {"type": "string"},
                "depth": {"type": "integer", "minimum": 1}
            },
            "required": ["from", "to"]
        })
    }
    fn tags(&self) -> &'static [ToolTag] {
        &[ToolTag::Read, ToolTag::Graph]
    }
    async fn run(&self, env: &ToolEnv, args: Value) -> LatticeResult<Value> {
        let path = env.store.shortest_path(
            str_arg(&args, "from")?,
            str_arg(&args, "to")?,
            opt_usize(&args, "depth").unwrap_or(DEFAULT_TRAVERSAL_DEPTH),
        )?;
        Ok(json!({ "path": path, "found": !path.is_empty() }))
    }
}

// ── retrieval tools ───────────────────────────────────────────────────

fn hits_json(hits: &[lattice_storage::queries::vector_search::SimilarityHit]) -> Value {
    json!(hits
        .iter()
        .map(|hit| json!({
            "node": node_summary(&hit.node),
            "distance": hit.distance,
            "embedded_at": hit.embedded_at.map(|t| t.to_rfc3339()),
        }))
        .collect::<Vec<_>>())
}

pub struct SimilarSearchTool;

#[async_trait]
impl Tool for SimilarSearchTool {
    fn name(&self) -> &'static str {
        "similar_search"
    }
    fn description(&self) -> &'static str {
        "Semantic similarity search across all entity types"
    }
    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {"type": "string", "minLength": 1},
                "limit": {"type": "integer", "minimum": 1}
            },
            "required": ["query"]
        })
    }
    fn tags(&self) -> &'static [ToolTag] {
        &[ToolTag::Read, ToolTag::Graph]
    }
    async fn run(&self, env: &ToolEnv, args: Value) -> LatticeResult<Value> {
        let hits = env
            .embeddings
            .search_similar(str_arg(&args, "query")?, opt_usize(&args, "limit").unwrap_or(10))?;
        Ok(json!({ "hits": hits_json(&hits) }))
    }
}

pub struct SimilarFilesTool;

#[async_trait]
impl Tool for SimilarFilesTool {
    fn name(&self) -> &'static str {
        "similar_files"
    }
    fn description(&self) -> &'static str {
        "Semantic similarity search restricted to SYSTEM.file entities"
    }
    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {"type": "string", "minLength": 1},
                "limit": {"type": "integer", "minimum": 1}
            },
            "required": ["query"]
        })
    }
    fn tags(&self) -> &'static [ToolTag] {
        &[ToolTag::Read, ToolTag::Graph]
    }
    async fn run(&self, env: &ToolEnv, args: Value) -> LatticeResult<Value> {
        let hits = env.embeddings.search_similar_files(
            str_arg(&args, "query")?,
            opt_usize(&args, "limit").unwrap_or(10),
        )?;
        Ok(json!({ "hits": hits_json(&hits) }))
    }
}

pub struct ContextPackTool;

#[async_trait]
impl Tool for ContextPackTool {
    fn name(&self) -> &'static str {
        "context_pack"
    }
    fn description(&self) -> &'static str {
        "Assemble a ranked context pack for a query, optionally anchored on a task"
    }
    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {"type": "string", "minLength": 1},
                "profile": {"type": "string", "enum": ["task", "plan", "default"]},
                "task_id": {"type": "string"},
                "render": {"type": "boolean"}
            },
            "required": ["query"]
        })
    }
    fn tags(&self) -> &'static [ToolTag] {
        &[ToolTag::Read, ToolTag::Graph]
    }
    async fn run(&self, env: &ToolEnv, args: Value) -> LatticeResult<Value> {
        let profile = match opt_str(&args, "profile") {
            None => RetrievalProfile::Default,
            Some(raw) => RetrievalProfile::parse(raw)
                .ok_or_else(|| LatticeError::invalid_argument(format!("unknown profile '{raw}'")))?,
        };
        let pack =
            env.assembler
                .assemble(str_arg(&args, "query")?, profile, opt_str(&args, "task_id"))?;
        if args.get("render").and_then(|v| v.as_bool()).unwrap_or(false) {
            return Ok(json!({ "rendered": pack.render() }));
        }
        serde_json::to_value(&pack).map_err(|e| LatticeError::internal(e.to_string()))
    }
}

// ── automation tools ──────────────────────────────────────────────────

pub struct WorkOrderCreateTool;

#[async_trait]
impl Tool for WorkOrderCreateTool {
    fn name(&self) -> &'static str {
        "work_order_create"
    }
    fn description(&self) -> &'static str {
        "Create a work order in created status"
    }
    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "name": {"type": "string", "minLength": 1},
                "agent_key": {"type": "string", "minLength": 1},
                "branch": {"type": "string", "minLength": 1},
                "task_id": {"type": "string"},
                "scope": {"type": "array", "items": {"type": "string"}}
            },
            "required": ["name", "agent_key", "branch"]
        })
    }
    fn tags(&self) -> &'static [ToolTag] {
        &[ToolTag::Write, ToolTag::Automation]
    }
    async fn run(&self, env: &ToolEnv, args: Value) -> LatticeResult<Value> {
        let scope = args
            .get("scope")
            .and_then(|v| v.as_array())
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| item.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();
        let node = env.work_orders.create(
            str_arg(&args, "name")?,
            str_arg(&args, "agent_key")?,
            str_arg(&args, "branch")?,
            opt_str(&args, "task_id").map(str::to_string),
            scope,
        )?;
        Ok(node_summary(&node))
    }
}

pub struct WorkOrderTransitionTool;

#[async_trait]
impl Tool for WorkOrderTransitionTool {
    fn name(&self) -> &'static str {
        "work_order_transition"
    }
    fn description(&self) -> &'static str {
        "Advance a work order through its status graph"
    }
    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "id": {"type": "string"},
                "status": {"type": "string"},
                "actor": {"type": "string"},
                "detail": {"type": "string"}
            },
            "required": ["id", "status"]
        })
    }
    fn tags(&self) -> &'static [ToolTag] {
        &[ToolTag::Write, ToolTag::Automation]
    }
    async fn run(&self, env: &ToolEnv, args: Value) -> LatticeResult<Value> {
        let status_raw = str_arg(&args, "status")?;
        let status = WorkOrderStatus::parse(status_raw).ok_or_else(|| {
            LatticeError::invalid_argument(format!("unknown status '{status_raw}'"))
        })?;
        let payload = env.work_orders.transition(
            str_arg(&args, "id")?,
            status,
            opt_str(&args, "actor").unwrap_or("tool"),
            opt_str(&args, "detail").unwrap_or(""),
        )?;
        Ok(json!({
            "status": payload.status.as_str(),
            "revision": payload.revision,
            "attempt": payload.attempt,
            "event_count": payload.event_count,
        }))
    }
}

pub struct WorkOrderScopeCheckTool;

#[async_trait]
impl Tool for WorkOrderScopeCheckTool {
    fn name(&self) -> &'static str {
        "work_order_scope_check"
    }
    fn description(&self) -> &'static str {
        "Validate a set of modified paths against a work order's scope"
    }
    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "id": {"type": "string"},
                "paths": {"type": "array", "items": {"type": "string"}}
            },
            "required": ["id", "paths"]
        })
    }
    fn tags(&self) -> &'static [ToolTag] {
        &[ToolTag::Read, ToolTag::Automation]
    }
    async fn run(&self, env: &ToolEnv, args: Value) -> LatticeResult<Value> {
        let paths: Vec<String> = args
            .get("paths")
            .and_then(|v| v.as_array())
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| item.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();
        // The check itself reports both partitions; only enforcement
        // turns the out-of-scope list into an error, and this tool is
        // the reporting surface.
        let (_, payload) = env.work_orders.get(str_arg(&args, "id")?)?;
        let check = lattice_evolution::check_scope(&payload.scope, &paths);
        serde_json::to_value(&check).map_err(|e| LatticeError::internal(e.to_string()))
    }
}

pub struct EvolutionMetricsTool;

#[async_trait]
impl Tool for EvolutionMetricsTool {
    fn name(&self) -> &'static str {
        "evolution_metrics"
    }
    fn description(&self) -> &'static str {
        "Aggregate work-order events into evolution metrics over a range"
    }
    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "from": {"type": "string"},
                "to": {"type": "string"}
            }
        })
    }
    fn tags(&self) -> &'static [ToolTag] {
        &[ToolTag::Read, ToolTag::Automation]
    }
    async fn run(&self, env: &ToolEnv, args: Value) -> LatticeResult<Value> {
        let report = metrics::compute(&env.store, time_arg(&args, "from")?, time_arg(&args, "to")?)?;
        serde_json::to_value(&report).map_err(|e| LatticeError::internal(e.to_string()))
    }
}

pub struct DetectPatternsTool;

#[async_trait]
impl Tool for DetectPatternsTool {
    fn name(&self) -> &'static str {
        "detect_patterns"
    }
    fn description(&self) -> &'static str {
        "Run a pattern detector: co_edit, churn, or tool_sequences"
    }
    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "kind": {"type": "string", "enum": ["co_edit", "churn", "tool_sequences"]},
                "min": {"type": "integer", "minimum": 1}
            },
            "required": ["kind"]
        })
    }
    fn tags(&self) -> &'static [ToolTag] {
        &[ToolTag::Read, ToolTag::Automation]
    }
    async fn run(&self, env: &ToolEnv, args: Value) -> LatticeResult<Value> {
        let min = args.get("min").and_then(|v| v.as_i64()).unwrap_or(2);
        let result = match str_arg(&args, "kind")? {
            "co_edit" => serde_json::to_value(lattice_patterns::detect_co_editing(
                &env.store, min,
            )?),
            "churn" => serde_json::to_value(lattice_patterns::detect_file_churn(&env.store, min)?),
            "tool_sequences" => {
                serde_json::to_value(lattice_patterns::detect_tool_sequences(&env.store, min)?)
            }
            other => {
                return Err(LatticeError::invalid_argument(format!(
                    "unknown detector '{other}'"
                )))
            }
        };
        result.map_err(|e| LatticeError::internal(e.to_string()))
    }
}

pub struct GcRunTool;

#[async_trait]
impl Tool for GcRunTool {
    fn name(&self) -> &'static str {
        "gc_run"
    }
    fn description(&self) -> &'static str {
        "Soft-delete expired sessions per the retention policy"
    }
    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "dry_run": {"type": "boolean"},
                "session_days": {"type": "integer", "minimum": 1},
                "compressed_days": {"type": "integer", "minimum": 1}
            }
        })
    }
    fn tags(&self) -> &'static [ToolTag] {
        &[ToolTag::Write, ToolTag::Admin]
    }
    async fn run(&self, env: &ToolEnv, args: Value) -> LatticeResult<Value> {
        let mut policy = env.gc.clone();
        if let Some(dry_run) = args.get("dry_run").and_then(|v| v.as_bool()) {
            policy.dry_run = dry_run;
        }
        if let Some(days) = args.get("session_days").and_then(|v| v.as_i64()) {
            policy.session_retention_days = days;
        }
        if let Some(days) = args.get("compressed_days").and_then(|v| v.as_i64()) {
            policy.compressed_retention_days = days;
        }
        let report = lattice_patterns::run_gc(&env.store, &policy)?;
        serde_json::to_value(&report).map_err(|e| LatticeError::internal(e.to_string()))
    }
}

pub struct GraphStatsTool;

#[async_trait]
impl Tool for GraphStatsTool {
    fn name(&self) -> &'static str {
        "graph_stats"
    }
    fn description(&self) -> &'static str {
        "Node, edge, and partition counts by layer and relation"
    }
    fn input_schema(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }
    fn tags(&self) -> &'static [ToolTag] {
        &[ToolTag::Read, ToolTag::Admin]
    }
    async fn run(&self, env: &ToolEnv, _args: Value) -> LatticeResult<Value> {
        let stats = env.store.graph_stats()?;
        serde_json::to_value(&stats).map_err(|e| LatticeError::internal(e.to_string()))
    }
}

pub struct MaintenanceTool;

#[async_trait]
impl Tool for MaintenanceTool {
    fn name(&self) -> &'static str {
        "maintenance"
    }
    fn description(&self) -> &'static str {
        "One maintenance tick: partition upkeep, embedding catch-up, working-set trim"
    }
    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "vacuum": {"type": "boolean"},
                "checkpoint": {"type": "boolean"}
            }
        })
    }
    fn tags(&self) -> &'static [ToolTag] {
        &[ToolTag::Write, ToolTag::Admin]
    }
    async fn run(&self, env: &ToolEnv, args: Value) -> LatticeResult<Value> {
        let relocated = env.store.partition_maintenance()?;
        let embedded = env.embeddings.embed_pending(200)?;
        let evicted = env.store.trim_working_set()?;
        if args.get("vacuum").and_then(|v| v.as_bool()).unwrap_or(false) {
            env.store.vacuum()?;
        }
        if args
            .get("checkpoint")
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
        {
            env.store.wal_checkpoint()?;
        }
        Ok(json!({
            "partition_rows_relocated": relocated,
            "nodes_embedded": embedded,
            "working_set_evicted": evicted,
            "modified_paths": [],
        }))
    }
}
