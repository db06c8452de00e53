//! Stable typed relationships between entities.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The relation carried by an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    DependsOn,
    Owns,
    Uses,
    Affects,
    Implements,
    GeneratedBy,
    InstanceOf,
    ChildOf,
    ConfiguredBy,
    NeedsContext,
}

impl Relation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Relation::DependsOn => "depends_on",
            Relation::Owns => "owns",
            Relation::Uses => "uses",
            Relation::Affects => "affects",
            Relation::Implements => "implements",
            Relation::GeneratedBy => "generated_by",
            Relation::InstanceOf => "instance_of",
            Relation::ChildOf => "child_of",
            Relation::ConfiguredBy => "configured_by",
            Relation::NeedsContext => "needs_context",
        }
    }

    pub fn parse(s: &str) -> Option<Relation> {
        match s {
            "depends_on" => Some(Relation::DependsOn),
            "owns" => Some(Relation::Owns),
            "uses" => Some(Relation::Uses),
            "affects" => Some(Relation::Affects),
            "implements" => Some(Relation::Implements),
            "generated_by" => Some(Relation::GeneratedBy),
            "instance_of" => Some(Relation::InstanceOf),
            "child_of" => Some(Relation::ChildOf),
            "configured_by" => Some(Relation::ConfiguredBy),
            "needs_context" => Some(Relation::NeedsContext),
            _ => None,
        }
    }
}

impl std::fmt::Display for Relation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A directed, typed edge. Edges are deprecated, never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    pub id: String,
    pub source_id: String,
    pub target_id: String,
    pub relation: Relation,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
    /// Stamped when an endpoint is soft-deleted (cascade) or on explicit
    /// deprecation. Live views exclude deprecated edges.
    pub deprecated_at: Option<DateTime<Utc>>,
}

impl Edge {
    pub fn new(
        source_id: impl Into<String>,
        target_id: impl Into<String>,
        relation: Relation,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            source_id: source_id.into(),
            target_id: target_id.into(),
            relation,
            payload,
            created_at: Utc::now(),
            deprecated_at: None,
        }
    }

    pub fn is_live(&self) -> bool {
        self.deprecated_at.is_none()
    }
}

/// Predicates for listing edges.
#[derive(Debug, Clone, Default)]
pub struct EdgeFilter {
    pub source_id: Option<String>,
    pub target_id: Option<String>,
    pub relation: Option<Relation>,
    pub live_only: bool,
}

impl EdgeFilter {
    pub fn live() -> Self {
        Self {
            live_only: true,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relation_round_trips() {
        for s in [
            "depends_on",
            "owns",
            "uses",
            "affects",
            "implements",
            "generated_by",
            "instance_of",
            "child_of",
            "configured_by",
            "needs_context",
        ] {
            let r = Relation::parse(s).unwrap();
            assert_eq!(r.as_str(), s);
        }
        assert!(Relation::parse("likes").is_none());
    }

    #[test]
    fn serde_uses_snake_case() {
        let json = serde_json::to_string(&Relation::DependsOn).unwrap();
        assert_eq!(json, "\"depends_on\"");
    }

    #[test]
    fn new_edge_is_live() {
        let e = Edge::new("a", "b", Relation::Uses, serde_json::json!({}));
        assert!(e.is_live());
    }
}
