//! Immutable per-mutation snapshots of entities.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::node::Layer;

/// One row of the version log. Written by the storage layer's trigger on
/// every node mutation; `version` counts mutations from 1 with no gaps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeVersion {
    pub node_id: String,
    pub version: i64,
    pub layer: Layer,
    pub node_type: String,
    pub name: String,
    pub payload: serde_json::Value,
    pub content_hash: Option<String>,
    pub created_at: DateTime<Utc>,
}
