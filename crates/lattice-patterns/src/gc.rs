//! Retention-based garbage collection. Only CONTEXT.session entities are
//! ever collected; everything else in the graph is permanent (soft-delete
//! being the strongest deletion the system knows).

use chrono::{Duration, Utc};
use serde::Serialize;
use tracing::info;

use lattice_core::config::GcPolicy;
use lattice_core::constants::MAX_LIST_LIMIT;
use lattice_core::graph::{node_types, Layer, Node};
use lattice_core::LatticeResult;
use lattice_storage::GraphEngine;

/// One GC candidate and why it qualified.
#[derive(Debug, Clone, Serialize)]
pub struct GcCandidate {
    pub id: String,
    pub name: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct GcReport {
    pub dry_run: bool,
    pub candidates: Vec<GcCandidate>,
    /// Sessions actually soft-deleted (0 on dry runs).
    pub deleted: usize,
}

/// Collect expired sessions per the policy. Dry runs report candidates
/// without writing.
pub fn run_gc(store: &GraphEngine, policy: &GcPolicy) -> LatticeResult<GcReport> {
    let now = Utc::now();
    let stale_cutoff = now - Duration::days(policy.session_retention_days);
    let compressed_cutoff = now - Duration::days(policy.compressed_retention_days);

    let sessions = store.list_by_layer_type(Layer::Context, node_types::SESSION, MAX_LIST_LIMIT)?;
    let mut candidates = Vec::new();
    for session in sessions {
        if let Some(reason) = expiry_reason(&session, stale_cutoff, compressed_cutoff, policy) {
            candidates.push(GcCandidate {
                id: session.id.clone(),
                name: session.name.clone(),
                reason,
            });
        }
    }

    let mut deleted = 0usize;
    if !policy.dry_run {
        for candidate in &candidates {
            store.soft_delete(&candidate.id)?;
            deleted += 1;
        }
        if deleted > 0 {
            info!(deleted, "garbage-collected expired sessions");
        }
    }

    Ok(GcReport {
        dry_run: policy.dry_run,
        candidates,
        deleted,
    })
}

fn expiry_reason(
    session: &Node,
    stale_cutoff: chrono::DateTime<Utc>,
    compressed_cutoff: chrono::DateTime<Utc>,
    policy: &GcPolicy,
) -> Option<String> {
    let status = session
        .payload
        .get("status")
        .and_then(|v| v.as_str())
        .unwrap_or("");
    match status {
        // Active sessions are never collected.
        "active" => None,
        "compressed" => (session.updated_at < compressed_cutoff).then(|| {
            format!(
                "compressed session idle beyond {} days",
                policy.compressed_retention_days
            )
        }),
        _ => (session.updated_at < stale_cutoff).then(|| {
            format!(
                "session idle beyond {} days",
                policy.session_retention_days
            )
        }),
    }
}
