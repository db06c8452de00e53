//! Parameterised search predicates over nodes.

use serde::{Deserialize, Serialize};

use super::node::Layer;
use crate::constants::{DEFAULT_LIST_LIMIT, MAX_LIST_LIMIT};

/// How the name pattern in a [`NodeFilter`] matches. Both modes are
/// case-insensitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NameMatch {
    Prefix,
    #[default]
    Substring,
}

/// The search filter for the entity store. All predicates are conjunctive.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeFilter {
    pub layer: Option<Layer>,
    pub node_type: Option<String>,
    /// Case-insensitive name pattern, interpreted per `name_match`.
    pub name_pattern: Option<String>,
    #[serde(default)]
    pub name_match: NameMatch,
    /// Shallow containment: every key/value pair here must appear in the
    /// node payload.
    pub payload_contains: Option<serde_json::Map<String, serde_json::Value>>,
    pub limit: Option<usize>,
}

impl NodeFilter {
    /// Effective limit: default 100, capped at 1000.
    pub fn effective_limit(&self) -> usize {
        self.limit
            .unwrap_or(DEFAULT_LIST_LIMIT)
            .min(MAX_LIST_LIMIT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_defaults_and_caps() {
        assert_eq!(NodeFilter::default().effective_limit(), 100);
        let f = NodeFilter {
            limit: Some(5000),
            ..Default::default()
        };
        assert_eq!(f.effective_limit(), 1000);
    }
}
