//! Entities: the graph's vertices.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// The layer an entity lives in. OBSERVATION exists only so the storage
/// guard trigger has a value to reject — no node row ever carries it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Layer {
    /// Why: intents, missions, tasks, decisions, insights, constraints,
    /// sessions, system prompts, context frames, agent sessions.
    Context,
    /// What: files, services, projects, provider/role/model descriptors.
    System,
    /// How: agents, tools, schemas, patterns, suggestions, work orders.
    Automation,
    /// Forbidden sentinel. Telemetry lives in the observations table.
    Observation,
}

impl Layer {
    pub fn as_str(&self) -> &'static str {
        match self {
            Layer::Context => "CONTEXT",
            Layer::System => "SYSTEM",
            Layer::Automation => "AUTOMATION",
            Layer::Observation => "OBSERVATION",
        }
    }

    pub fn parse(s: &str) -> Option<Layer> {
        match s {
            "CONTEXT" => Some(Layer::Context),
            "SYSTEM" => Some(Layer::System),
            "AUTOMATION" => Some(Layer::Automation),
            "OBSERVATION" => Some(Layer::Observation),
            _ => None,
        }
    }
}

impl std::fmt::Display for Layer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Well-known node type tags. The column is free-form text; these are the
/// tags the rest of the system keys behaviour on.
pub mod node_types {
    // CONTEXT
    pub const INTENT: &str = "intent";
    pub const MISSION: &str = "mission";
    pub const TASK: &str = "task";
    pub const DECISION: &str = "decision";
    pub const INSIGHT: &str = "insight";
    pub const CONSTRAINT: &str = "constraint";
    pub const SESSION: &str = "session";
    pub const SYSTEM_PROMPT: &str = "system_prompt";
    pub const CONTEXT_FRAME: &str = "context_frame";
    pub const AGENT_SESSION: &str = "agent_session";
    // SYSTEM
    pub const FILE: &str = "file";
    pub const SERVICE: &str = "service";
    pub const PROJECT: &str = "project";
    pub const PROVIDER: &str = "provider";
    pub const ROLE: &str = "role";
    pub const MODEL: &str = "model";
    // AUTOMATION
    pub const AGENT: &str = "agent";
    pub const TOOL: &str = "tool";
    pub const SCHEMA: &str = "schema";
    pub const PATTERN: &str = "pattern";
    pub const SUGGESTION: &str = "suggestion";
    pub const WORK_ORDER: &str = "work_order";
}

/// An identified thing in the graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    /// UUID v4 identifier.
    pub id: String,
    pub layer: Layer,
    pub node_type: String,
    /// Human name. `(layer, node_type, name)` is unique among live nodes.
    pub name: String,
    /// Free-form structured payload. The storage layer keeps this opaque.
    pub payload: serde_json::Value,
    /// SHA-256 over the canonical rendering of the node's content.
    /// Gates embedding: recompute only on mismatch.
    pub content_hash: Option<String>,
    /// Dense embedding vector, present once the background worker ran.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    pub embedded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Soft-delete stamp. Deleted nodes remain readable by id but are
    /// excluded from live views.
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Node {
    /// Create a fresh node with a new UUID and current timestamps.
    pub fn new(
        layer: Layer,
        node_type: impl Into<String>,
        name: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            layer,
            node_type: node_type.into(),
            name: name.into(),
            payload,
            content_hash: None,
            embedding: None,
            embedded_at: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    pub fn is_live(&self) -> bool {
        self.deleted_at.is_none()
    }

    pub fn is_file(&self) -> bool {
        self.layer == Layer::System && self.node_type == node_types::FILE
    }

    /// Canonical text rendering of a non-file node's content, used for
    /// hashing and embedding. Deterministic: payload keys are sorted.
    pub fn render_content(&self) -> String {
        let mut out = format!("{} {} {}", self.layer.as_str(), self.node_type, self.name);
        if let serde_json::Value::Object(map) = &self.payload {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            for key in keys {
                out.push('\n');
                out.push_str(key);
                out.push('=');
                out.push_str(&map[key].to_string());
            }
        }
        out
    }

    /// SHA-256 hex digest of arbitrary content bytes.
    pub fn hash_content(content: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(content);
        format!("{:x}", hasher.finalize())
    }
}
