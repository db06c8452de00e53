//! The work-order payload codec.
//!
//! A work-order is an AUTOMATION node; this struct is the typed view of
//! its payload. Unknown payload keys survive a parse/serialise round trip
//! via the flattened tail map.

use serde::{Deserialize, Serialize};

use lattice_core::{LatticeError, LatticeResult};

use crate::status::WorkOrderStatus;

fn default_base_branch() -> String {
    "develop".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkOrderPayload {
    pub status: WorkOrderStatus,
    /// Incremented each time the order re-enters `mutating` after a
    /// failed build.
    #[serde(default)]
    pub revision: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    pub agent_key: String,
    pub branch: String,
    #[serde(default = "default_base_branch")]
    pub base_branch: String,
    /// Path prefixes bounding the order's permitted filesystem effects.
    #[serde(default)]
    pub scope: Vec<String>,
    /// Incremented on every entry to `mutating`.
    #[serde(default)]
    pub attempt: u32,
    #[serde(default)]
    pub event_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_event: Option<serde_json::Value>,
    /// Unknown fields, preserved verbatim.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl WorkOrderPayload {
    pub fn new(agent_key: impl Into<String>, branch: impl Into<String>) -> Self {
        Self {
            status: WorkOrderStatus::Created,
            revision: 0,
            task_id: None,
            agent_key: agent_key.into(),
            branch: branch.into(),
            base_branch: default_base_branch(),
            scope: Vec::new(),
            attempt: 0,
            event_count: 0,
            last_event: None,
            extra: serde_json::Map::new(),
        }
    }

    /// Parse from a node payload.
    pub fn parse(payload: &serde_json::Value) -> LatticeResult<Self> {
        serde_json::from_value(payload.clone()).map_err(|e| LatticeError::InvalidArgument {
            message: format!("not a work-order payload: {e}"),
        })
    }

    pub fn to_value(&self) -> LatticeResult<serde_json::Value> {
        serde_json::to_value(self).map_err(|e| LatticeError::Internal {
            message: format!("serialise work-order payload: {e}"),
        })
    }
}
