//! Retrieval profiles: result bound and signal weights per use case.

use serde::{Deserialize, Serialize};

/// Weights for the four ranking signals. Each profile's weights sum to 1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalWeights {
    pub similarity: f64,
    pub recency: f64,
    pub frequency: f64,
    pub graph_proximity: f64,
}

/// The retrieval profile chosen by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetrievalProfile {
    /// Tight pack for an active task: similarity-heavy, few items.
    Task,
    /// Broad pack for planning: structure matters as much as topic.
    Plan,
    #[default]
    Default,
}

impl RetrievalProfile {
    /// Number of items kept after ranking.
    pub fn limit(&self) -> usize {
        match self {
            RetrievalProfile::Task => 5,
            RetrievalProfile::Plan => 15,
            RetrievalProfile::Default => 8,
        }
    }

    pub fn weights(&self) -> SignalWeights {
        match self {
            RetrievalProfile::Task => SignalWeights {
                similarity: 0.45,
                recency: 0.20,
                frequency: 0.10,
                graph_proximity: 0.25,
            },
            RetrievalProfile::Plan => SignalWeights {
                similarity: 0.30,
                recency: 0.20,
                frequency: 0.20,
                graph_proximity: 0.30,
            },
            RetrievalProfile::Default => SignalWeights {
                similarity: 0.40,
                recency: 0.25,
                frequency: 0.15,
                graph_proximity: 0.20,
            },
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "task" => Some(RetrievalProfile::Task),
            "plan" => Some(RetrievalProfile::Plan),
            "default" => Some(RetrievalProfile::Default),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RetrievalProfile::Task => "task",
            RetrievalProfile::Plan => "plan",
            RetrievalProfile::Default => "default",
        }
    }
}
