//! Entity-anchored telemetry records.
//!
//! Telemetry MUST land here, never in the node table — the storage layer
//! enforces that with a trigger.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Well-known observation type tags.
pub mod observation_types {
    pub const TOOL_EVENT: &str = "tool_event";
    pub const WORK_ORDER_EVENT: &str = "work_order_event";
    pub const METRIC: &str = "metric";
}

/// A telemetry record anchored on a single entity. Stored in monthly
/// partitions keyed on `observed_at`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Observation {
    pub id: String,
    pub node_id: String,
    pub observation_type: String,
    pub payload: serde_json::Value,
    pub observed_at: DateTime<Utc>,
}

impl Observation {
    pub fn new(
        node_id: impl Into<String>,
        observation_type: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            node_id: node_id.into(),
            observation_type: observation_type.into(),
            payload,
            observed_at: Utc::now(),
        }
    }
}
