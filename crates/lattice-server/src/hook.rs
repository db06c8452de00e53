//! Hook ingestion: line-delimited session/tool event records written into
//! observations and causal events. Best-effort by contract — one
//! malformed line never stops the stream, and each line is its own
//! transaction boundary.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use lattice_core::graph::{
    node_types, observation_types, EdgeEvent, EventRelation, Layer, Observation,
};
use lattice_core::LatticeResult;
use lattice_tools::ToolEnv;

/// One raw hook record.
#[derive(Debug, Clone, Deserialize)]
pub struct HookRecord {
    pub event: String,
    pub session_id: String,
    #[serde(default)]
    pub tool_name: Option<String>,
    #[serde(default)]
    pub tool_input: Option<serde_json::Value>,
    #[serde(default)]
    pub tool_output: Option<serde_json::Value>,
    #[serde(default)]
    pub file_paths: Vec<String>,
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub duration_ms: Option<i64>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

/// Tools whose file touches count as modifications rather than reads.
const MUTATING_TOOLS: &[&str] = &["write", "edit", "mkdir", "exec"];

/// Ingest one parsed record: a `tool_event` observation anchored on the
/// session, plus one causal event per touched file.
pub fn ingest_record(env: &ToolEnv, record: &HookRecord) -> LatticeResult<()> {
    let (session, _) = env.store.get_or_create(
        Layer::Context,
        node_types::SESSION,
        &record.session_id,
        json!({ "status": "active", "working_set": true }),
    )?;

    let occurred_at = record.timestamp.unwrap_or_else(Utc::now);
    let success = record.success.unwrap_or(true);

    let mut observation = Observation::new(
        &session.id,
        observation_types::TOOL_EVENT,
        json!({
            "event": record.event,
            "session_id": record.session_id,
            "tool": record.tool_name,
            "input": record.tool_input,
            "output": record.tool_output,
            "success": success,
            "duration_ms": record.duration_ms,
        }),
    );
    observation.observed_at = occurred_at;
    env.store.create_observation(&observation)?;

    let relation = match &record.tool_name {
        Some(name) if MUTATING_TOOLS.contains(&name.as_str()) => EventRelation::Modified,
        _ => EventRelation::Observed,
    };
    for path in &record.file_paths {
        let (file, created) = env.store.get_or_create(
            Layer::System,
            node_types::FILE,
            path,
            json!({}),
        )?;
        let mut event = EdgeEvent::new(&session.id, &file.id, relation, success);
        event.occurred_at = occurred_at;
        if let Some(duration) = record.duration_ms {
            event = event.with_duration(duration);
        }
        env.store.create_edge_event(&event)?;
        if created || relation == EventRelation::Modified {
            env.embeddings.schedule_embed(file.id.clone());
        }
    }
    Ok(())
}

/// Parse and ingest one line. Failures are logged and swallowed; the
/// return reports whether the line landed.
pub fn ingest_line(env: &ToolEnv, line: &str) -> bool {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return true;
    }
    let record: HookRecord = match serde_json::from_str(trimmed) {
        Ok(record) => record,
        Err(e) => {
            warn!(error = %e, "skipping malformed hook record");
            return false;
        }
    };
    match ingest_record(env, &record) {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, session = %record.session_id, "hook ingestion failed");
            false
        }
    }
}
