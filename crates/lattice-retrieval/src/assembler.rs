//! The ten-phase pack pipeline. Deterministic given the query, profile,
//! and graph state: over-fetch, expand, enrich, score, explain, annex.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use lattice_core::constants::MAX_LIST_LIMIT;
use lattice_core::graph::{node_types, Layer, Node};
use lattice_core::{LatticeError, LatticeResult};
use lattice_embeddings::EmbeddingEngine;
use lattice_storage::GraphEngine;

use crate::pack::{ConstraintNote, ContextPack, PackItem};
use crate::profile::RetrievalProfile;
use crate::proximity;
use crate::signals::{self, Signals};

/// Distance assigned to expansion-added neighbours: they carry no
/// similarity signal.
const NEIGHBOUR_DISTANCE: f64 = 2.0;

struct Candidate {
    node: Node,
    distance: f64,
}

pub struct PackAssembler {
    store: Arc<GraphEngine>,
    embeddings: EmbeddingEngine,
}

impl PackAssembler {
    pub fn new(store: Arc<GraphEngine>, embeddings: EmbeddingEngine) -> Self {
        Self { store, embeddings }
    }

    /// Assemble a context pack for the query under the given profile,
    /// optionally anchored on a task.
    pub fn assemble(
        &self,
        query: &str,
        profile: RetrievalProfile,
        task_id: Option<&str>,
    ) -> LatticeResult<ContextPack> {
        let limit = profile.limit();

        // Phase 1: over-fetch 2x the profile limit across all node types.
        let mut candidates: Vec<Candidate> = match self.embeddings.search_similar(query, 2 * limit)
        {
            Ok(hits) => hits
                .into_iter()
                .map(|hit| Candidate {
                    node: hit.node,
                    distance: hit.distance,
                })
                .collect(),
            // Without an embedder a task anchor still yields a graph-only
            // pack; without either there is nothing to rank.
            Err(LatticeError::NoEmbedder) if task_id.is_some() => Vec::new(),
            Err(LatticeError::NoEmbedder) => {
                return Ok(ContextPack::empty(query, profile));
            }
            Err(e) => return Err(e),
        };
        if candidates.is_empty() && task_id.is_none() {
            return Ok(ContextPack::empty(query, profile));
        }

        // Phase 2: expand along live edges, either direction.
        let seed_ids: Vec<String> = if candidates.is_empty() {
            task_id.iter().map(|id| id.to_string()).collect()
        } else {
            candidates.iter().map(|c| c.node.id.clone()).collect()
        };
        let seed_set: HashSet<&String> = seed_ids.iter().collect();
        let mut present: HashSet<String> = seed_ids.iter().cloned().collect();
        if let Some(task) = task_id {
            present.insert(task.to_string());
        }
        let mut expansion_scores: HashMap<String, f64> = HashMap::new();
        let mut neighbour_ids: Vec<String> = Vec::new();
        for edge in self.store.live_edges_touching(&seed_ids)? {
            for (endpoint, other) in [
                (&edge.source_id, &edge.target_id),
                (&edge.target_id, &edge.source_id),
            ] {
                if !seed_set.contains(endpoint) {
                    continue;
                }
                if !present.contains(other) && neighbour_ids.len() < limit {
                    present.insert(other.clone());
                    neighbour_ids.push(other.clone());
                }
                let score = proximity::expansion_score(edge.relation);
                let entry = expansion_scores.entry(other.clone()).or_insert(0.0);
                if score > *entry {
                    *entry = score;
                }
            }
        }
        // One batched metadata read for everything expansion added.
        for node in self.store.get_bulk(&neighbour_ids)? {
            if node.is_live() {
                candidates.push(Candidate {
                    node,
                    distance: NEIGHBOUR_DISTANCE,
                });
            }
        }
        if candidates.is_empty() {
            return Ok(ContextPack::empty(query, profile));
        }

        // Phase 3: activity enrichment, files batched against edge events.
        let file_ids: Vec<String> = candidates
            .iter()
            .filter(|c| c.node.is_file())
            .map(|c| c.node.id.clone())
            .collect();
        let file_stats = self.store.file_activity(&file_ids)?;
        let now = Utc::now();
        let activity: HashMap<String, (Option<DateTime<Utc>>, i64)> = candidates
            .iter()
            .map(|c| {
                let entry = if c.node.is_file() {
                    match file_stats.get(&c.node.id) {
                        Some(stats) => (stats.last_modified, stats.modified_count),
                        None => (None, 0),
                    }
                } else {
                    (Some(c.node.updated_at), 1)
                };
                (c.node.id.clone(), entry)
            })
            .collect();

        // Phase 4: task proximity from direct edges and shared sessions.
        let all_ids: Vec<String> = candidates.iter().map(|c| c.node.id.clone()).collect();
        let mut proximity_map: HashMap<String, f64> = match task_id {
            Some(task) => {
                let task_edges = self.store.live_edges_touching(&[task.to_string()])?;
                let cooccurrence = self.store.session_cooccurrence(task, &all_ids)?;
                proximity::task_proximity(task, &task_edges, &cooccurrence)
            }
            None => HashMap::new(),
        };

        // Phase 5: expansion scores fold in by max.
        proximity::merge_expansion(&mut proximity_map, &expansion_scores);

        // Phases 6-7: normalise signals, blend with profile weights.
        let weights = profile.weights();
        let mut items: Vec<PackItem> = candidates
            .into_iter()
            .map(|c| {
                let (last_modified, freq_count) =
                    activity.get(&c.node.id).copied().unwrap_or((None, 0));
                let s = Signals {
                    similarity: signals::similarity(c.distance),
                    recency: signals::recency(last_modified, now),
                    frequency: signals::frequency(freq_count),
                    graph_proximity: proximity_map.get(&c.node.id).copied().unwrap_or(0.0),
                };
                let score = weights.similarity * s.similarity
                    + weights.recency * s.recency
                    + weights.frequency * s.frequency
                    + weights.graph_proximity * s.graph_proximity;
                PackItem {
                    node: c.node,
                    score,
                    signals: s,
                    distance: c.distance,
                    why: String::new(),
                }
            })
            .collect();

        // Phase 8: rank and trim.
        items.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        items.truncate(limit);

        // Phase 9: explain.
        for item in &mut items {
            item.why = signals::why_selected(&item.signals);
        }

        // Phase 10: constraint annex.
        let constraints = self.constraint_annex()?;

        debug!(
            query,
            profile = profile.as_str(),
            items = items.len(),
            constraints = constraints.len(),
            "assembled context pack"
        );
        Ok(ContextPack {
            query: query.to_string(),
            profile,
            items,
            constraints,
        })
    }

    /// Every live CONTEXT.constraint whose payload carries `text` or
    /// `description`.
    fn constraint_annex(&self) -> LatticeResult<Vec<ConstraintNote>> {
        let nodes = self.store.list_by_layer_type(
            Layer::Context,
            node_types::CONSTRAINT,
            MAX_LIST_LIMIT,
        )?;
        Ok(nodes
            .into_iter()
            .filter_map(|node| {
                let text = node
                    .payload
                    .get("text")
                    .or_else(|| node.payload.get("description"))
                    .and_then(|v| v.as_str())?
                    .to_string();
                Some(ConstraintNote {
                    name: node.name,
                    text,
                })
            })
            .collect())
    }
}
