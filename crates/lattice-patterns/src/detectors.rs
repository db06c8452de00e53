//! Batch pattern detection over causal events and tool observations.

use chrono::{Duration, Utc};
use serde::Serialize;
use serde_json::json;
use tracing::debug;

use lattice_core::graph::{node_types, observation_types, Layer};
use lattice_core::LatticeResult;
use lattice_storage::GraphEngine;

/// Detection windows.
const CO_EDIT_WINDOW_DAYS: i64 = 90;
const CHURN_WINDOW_DAYS: i64 = 30;
const SEQUENCE_WINDOW_SECONDS: i64 = 120;

/// Result caps.
const CO_EDIT_CAP: usize = 20;
const EVENT_SCAN_LIMIT: usize = 10_000;

/// Two files repeatedly modified by the same sessions.
#[derive(Debug, Clone, Serialize)]
pub struct CoEditPair {
    pub file_a: String,
    pub file_b: String,
    /// Co-modification pairings observed.
    pub frequency: i64,
    /// Distinct sessions responsible.
    pub sessions: i64,
}

/// A file with heavy recent modification traffic.
#[derive(Debug, Clone, Serialize)]
pub struct FileChurn {
    pub file: String,
    pub modifications: i64,
}

/// Two tools invoked back-to-back in the same session.
#[derive(Debug, Clone, Serialize)]
pub struct ToolSequence {
    pub first: String,
    pub second: String,
    pub count: i64,
}

/// Find file pairs co-modified by common sessions in the last 90 days,
/// persist them as AUTOMATION.pattern entities with deterministic names,
/// and update `frequency` on re-detection.
pub fn detect_co_editing(
    store: &GraphEngine,
    min_cooccurrences: i64,
) -> LatticeResult<Vec<CoEditPair>> {
    let since = Utc::now() - Duration::days(CO_EDIT_WINDOW_DAYS);
    let events = store.events_in_range(Some(since), None, EVENT_SCAN_LIMIT)?;

    // session -> set of files it modified.
    use std::collections::{BTreeMap, BTreeSet};
    let mut by_session: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for event in &events {
        if event.relation == lattice_core::graph::EventRelation::Modified {
            by_session
                .entry(event.source_id.clone())
                .or_default()
                .insert(event.target_id.clone());
        }
    }

    // Count each ordered-by-name pair once per session.
    let mut pair_sessions: BTreeMap<(String, String), i64> = BTreeMap::new();
    for files in by_session.values() {
        let files: Vec<&String> = files.iter().collect();
        for i in 0..files.len() {
            for j in (i + 1)..files.len() {
                *pair_sessions
                    .entry((files[i].clone(), files[j].clone()))
                    .or_insert(0) += 1;
            }
        }
    }

    let mut pairs: Vec<(String, String, i64)> = pair_sessions
        .into_iter()
        .filter(|(_, sessions)| *sessions >= min_cooccurrences)
        .map(|((a, b), sessions)| (a, b, sessions))
        .collect();
    pairs.sort_by(|x, y| y.2.cmp(&x.2).then_with(|| x.0.cmp(&y.0)));
    pairs.truncate(CO_EDIT_CAP);

    // Resolve ids to names and persist.
    let mut out = Vec::with_capacity(pairs.len());
    for (id_a, id_b, sessions) in pairs {
        let name_a = node_name(store, &id_a)?;
        let name_b = node_name(store, &id_b)?;
        let pair = CoEditPair {
            file_a: name_a,
            file_b: name_b,
            frequency: sessions,
            sessions,
        };
        persist_co_edit(store, &pair)?;
        out.push(pair);
    }
    debug!(pairs = out.len(), "co-editing detection complete");
    Ok(out)
}

fn node_name(store: &GraphEngine, id: &str) -> LatticeResult<String> {
    Ok(store
        .get_node(id)?
        .map(|node| node.name)
        .unwrap_or_else(|| id.to_string()))
}

fn persist_co_edit(store: &GraphEngine, pair: &CoEditPair) -> LatticeResult<()> {
    let name = format!("co_edit:{}+{}", pair.file_a, pair.file_b);
    let (node, _created) = store.get_or_create(
        Layer::Automation,
        node_types::PATTERN,
        &name,
        json!({
            "kind": "co_edit",
            "files": [pair.file_a, pair.file_b],
            "frequency": pair.frequency,
            "sessions": pair.sessions,
        }),
    )?;
    // Re-detection refreshes the counters, leaving anything else in the
    // payload alone.
    let mut patch = serde_json::Map::new();
    patch.insert("frequency".to_string(), json!(pair.frequency));
    patch.insert("sessions".to_string(), json!(pair.sessions));
    store.merge_update(&node.id, &patch)?;
    Ok(())
}

/// Files with at least `min` modified events in the last 30 days.
pub fn detect_file_churn(store: &GraphEngine, min: i64) -> LatticeResult<Vec<FileChurn>> {
    let since = Utc::now() - Duration::days(CHURN_WINDOW_DAYS);
    let events = store.events_in_range(Some(since), None, EVENT_SCAN_LIMIT)?;

    use std::collections::BTreeMap;
    let mut counts: BTreeMap<String, i64> = BTreeMap::new();
    for event in &events {
        if event.relation == lattice_core::graph::EventRelation::Modified {
            *counts.entry(event.target_id.clone()).or_insert(0) += 1;
        }
    }
    let mut churn = Vec::new();
    for (id, modifications) in counts {
        if modifications >= min {
            churn.push(FileChurn {
                file: node_name(store, &id)?,
                modifications,
            });
        }
    }
    churn.sort_by(|a, b| b.modifications.cmp(&a.modifications));
    Ok(churn)
}

/// Tool invocations on the same session within a two-minute window,
/// aggregated into ordered pairs.
pub fn detect_tool_sequences(store: &GraphEngine, min: i64) -> LatticeResult<Vec<ToolSequence>> {
    let observations = store.list_observations_by_type(
        observation_types::TOOL_EVENT,
        None,
        None,
        EVENT_SCAN_LIMIT,
    )?;

    use std::collections::BTreeMap;
    // session -> chronological (time, tool) list; the scan is time-ordered.
    let mut by_session: BTreeMap<String, Vec<(chrono::DateTime<Utc>, String)>> = BTreeMap::new();
    for obs in &observations {
        let Some(session) = obs.payload.get("session_id").and_then(|v| v.as_str()) else {
            continue;
        };
        let Some(tool) = obs.payload.get("tool").and_then(|v| v.as_str()) else {
            continue;
        };
        by_session
            .entry(session.to_string())
            .or_default()
            .push((obs.observed_at, tool.to_string()));
    }

    let mut counts: BTreeMap<(String, String), i64> = BTreeMap::new();
    for invocations in by_session.values() {
        for pair in invocations.windows(2) {
            let (earlier, first_tool) = &pair[0];
            let (later, second_tool) = &pair[1];
            if (*later - *earlier).num_seconds() <= SEQUENCE_WINDOW_SECONDS {
                *counts
                    .entry((first_tool.clone(), second_tool.clone()))
                    .or_insert(0) += 1;
            }
        }
    }

    let mut sequences: Vec<ToolSequence> = counts
        .into_iter()
        .filter(|(_, count)| *count >= min)
        .map(|((first, second), count)| ToolSequence {
            first,
            second,
            count,
        })
        .collect();
    sequences.sort_by(|a, b| b.count.cmp(&a.count));
    Ok(sequences)
}
