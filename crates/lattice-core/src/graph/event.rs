//! Causal events: timestamped typed links recorded as history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The relation carried by a causal event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventRelation {
    ResultedIn,
    Observed,
    Modified,
    Triggered,
    FailedWith,
    Started,
    Completed,
    Measured,
}

impl EventRelation {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventRelation::ResultedIn => "resulted_in",
            EventRelation::Observed => "observed",
            EventRelation::Modified => "modified",
            EventRelation::Triggered => "triggered",
            EventRelation::FailedWith => "failed_with",
            EventRelation::Started => "started",
            EventRelation::Completed => "completed",
            EventRelation::Measured => "measured",
        }
    }

    pub fn parse(s: &str) -> Option<EventRelation> {
        match s {
            "resulted_in" => Some(EventRelation::ResultedIn),
            "observed" => Some(EventRelation::Observed),
            "modified" => Some(EventRelation::Modified),
            "triggered" => Some(EventRelation::Triggered),
            "failed_with" => Some(EventRelation::FailedWith),
            "started" => Some(EventRelation::Started),
            "completed" => Some(EventRelation::Completed),
            "measured" => Some(EventRelation::Measured),
            _ => None,
        }
    }
}

impl std::fmt::Display for EventRelation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A timestamped causal link between two entities. Stored in monthly
/// partitions keyed on `occurred_at`; retention-expired by partition drop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeEvent {
    pub id: String,
    pub source_id: String,
    pub target_id: String,
    pub relation: EventRelation,
    pub success: bool,
    /// Milliseconds, when the event measured something that took time.
    pub duration_ms: Option<i64>,
    pub payload: serde_json::Value,
    pub occurred_at: DateTime<Utc>,
}

impl EdgeEvent {
    pub fn new(
        source_id: impl Into<String>,
        target_id: impl Into<String>,
        relation: EventRelation,
        success: bool,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            source_id: source_id.into(),
            target_id: target_id.into(),
            relation,
            success,
            duration_ms: None,
            payload: serde_json::Value::Null,
            occurred_at: Utc::now(),
        }
    }

    pub fn with_duration(mut self, duration_ms: i64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}
