//! Signal normalisation and why-selected labelling.
//!
//! All four signals land in [0, 1]. Two are temporal (recency,
//! frequency), one topical (similarity), one structural (graph
//! proximity); the point of the blend is that no single one captures
//! what a developer actually wants back.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use lattice_core::constants::RECENCY_HALF_LIFE_DAYS;

/// The normalised signal values for one ranked item.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Signals {
    pub similarity: f64,
    pub recency: f64,
    pub frequency: f64,
    pub graph_proximity: f64,
}

/// Cosine distance [0, 2] to similarity [0, 1].
pub fn similarity(distance: f64) -> f64 {
    (1.0 - distance / 2.0).clamp(0.0, 1.0)
}

/// Exponential decay with a 7-day half-life; unknown timestamps score 0.
pub fn recency(last_modified: Option<DateTime<Utc>>, now: DateTime<Utc>) -> f64 {
    let Some(ts) = last_modified else {
        return 0.0;
    };
    let days_since = (now - ts).num_seconds().max(0) as f64 / 86_400.0;
    (-std::f64::consts::LN_2 * days_since / RECENCY_HALF_LIFE_DAYS).exp()
}

/// log2 saturation: 32 modification events max the signal out.
pub fn frequency(count: i64) -> f64 {
    (((count.max(0) + 1) as f64).log2() / 5.0).min(1.0)
}

/// Dominance thresholds, checked in this order.
const SIMILARITY_THRESHOLD: f64 = 0.7;
const RECENCY_THRESHOLD: f64 = 0.8;
const PROXIMITY_THRESHOLD: f64 = 0.5;
const FREQUENCY_THRESHOLD: f64 = 0.6;

fn label(signal: &str) -> &'static str {
    match signal {
        "similarity" => "similar to the query",
        "recency" => "recently modified",
        "graph_proximity" => "linked in the graph",
        "frequency" => "frequently modified",
        _ => "relevant",
    }
}

/// Name the reason an item was selected: the first signal over its
/// threshold wins; with none over, the top two signals are concatenated.
pub fn why_selected(signals: &Signals) -> String {
    if signals.similarity > SIMILARITY_THRESHOLD {
        return label("similarity").to_string();
    }
    if signals.recency > RECENCY_THRESHOLD {
        return label("recency").to_string();
    }
    if signals.graph_proximity > PROXIMITY_THRESHOLD {
        return label("graph_proximity").to_string();
    }
    if signals.frequency > FREQUENCY_THRESHOLD {
        return label("frequency").to_string();
    }
    let mut ranked = [
        ("similarity", signals.similarity),
        ("recency", signals.recency),
        ("frequency", signals.frequency),
        ("graph_proximity", signals.graph_proximity),
    ];
    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    format!("{} + {}", label(ranked[0].0), label(ranked[1].0))
}
