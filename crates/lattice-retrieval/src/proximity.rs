//! Graph proximity scoring: direct task edges, session co-occurrence,
//! and the expansion-score merge.

use std::collections::HashMap;

use lattice_core::graph::{Edge, Relation};

/// Score an outgoing edge from the task to an item.
pub fn outgoing_score(relation: Relation) -> f64 {
    match relation {
        Relation::Affects => 1.0,
        Relation::DependsOn | Relation::Implements => 0.9,
        Relation::Uses | Relation::Owns => 0.8,
        _ => 0.6,
    }
}

/// Incoming edges score 0.1 lower than their outgoing counterpart.
pub fn incoming_score(relation: Relation) -> f64 {
    outgoing_score(relation) - 0.1
}

/// Score a neighbour added by graph expansion (phase 2). Lower band than
/// direct task edges: expansion says "structurally nearby", not "linked
/// to what you are doing".
pub fn expansion_score(relation: Relation) -> f64 {
    match relation {
        Relation::Affects => 0.5,
        Relation::DependsOn | Relation::Implements => 0.45,
        Relation::Uses | Relation::Owns => 0.4,
        _ => 0.3,
    }
}

/// Shared-session co-occurrence: distinct sessions that both triggered
/// the task and touched the item, saturating at 3.
pub fn cooccurrence_score(distinct_sessions: i64) -> f64 {
    (distinct_sessions as f64 / 3.0).min(1.0)
}

/// Fold the direct-edge signals for a task into a proximity map:
/// per item, the max of outgoing, incoming, and co-occurrence, capped at 1.
pub fn task_proximity(
    task_id: &str,
    task_edges: &[Edge],
    cooccurrence: &HashMap<String, i64>,
) -> HashMap<String, f64> {
    let mut proximity: HashMap<String, f64> = HashMap::new();
    for edge in task_edges {
        if edge.source_id == task_id {
            bump(&mut proximity, &edge.target_id, outgoing_score(edge.relation));
        } else if edge.target_id == task_id {
            bump(&mut proximity, &edge.source_id, incoming_score(edge.relation));
        }
    }
    for (item_id, sessions) in cooccurrence {
        bump(&mut proximity, item_id, cooccurrence_score(*sessions));
    }
    for value in proximity.values_mut() {
        *value = value.min(1.0);
    }
    proximity
}

/// Merge expansion scores into the proximity map by max (phase 5).
pub fn merge_expansion(proximity: &mut HashMap<String, f64>, expansion: &HashMap<String, f64>) {
    for (id, score) in expansion {
        bump(proximity, id, *score);
    }
}

fn bump(map: &mut HashMap<String, f64>, id: &str, score: f64) {
    let entry = map.entry(id.to_string()).or_insert(0.0);
    if score > *entry {
        *entry = score;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn relation_scores_match_contract() {
        assert_eq!(outgoing_score(Relation::Affects), 1.0);
        assert_eq!(outgoing_score(Relation::DependsOn), 0.9);
        assert_eq!(outgoing_score(Relation::Uses), 0.8);
        assert_eq!(outgoing_score(Relation::ChildOf), 0.6);
        assert!((incoming_score(Relation::Affects) - 0.9).abs() < 1e-9);
    }

    #[test]
    fn cooccurrence_saturates() {
        assert!((cooccurrence_score(1) - 1.0 / 3.0).abs() < 1e-9);
        assert_eq!(cooccurrence_score(3), 1.0);
        assert_eq!(cooccurrence_score(10), 1.0);
    }

    #[test]
    fn direct_edge_beats_cooccurrence_via_max() {
        let task_edges = vec![Edge::new("task", "item", Relation::Affects, json!({}))];
        let cooccurrence = HashMap::from([("item".to_string(), 1i64)]);
        let proximity = task_proximity("task", &task_edges, &cooccurrence);
        assert_eq!(proximity["item"], 1.0);
    }

    #[test]
    fn incoming_edge_counts() {
        let task_edges = vec![Edge::new("item", "task", Relation::Uses, json!({}))];
        let proximity = task_proximity("task", &task_edges, &HashMap::new());
        assert!((proximity["item"] - 0.7).abs() < 1e-9);
    }
}
