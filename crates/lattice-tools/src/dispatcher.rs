//! Tool dispatch: validate, challenge, run under deadline, observe.

use std::time::{Duration, Instant};

use serde::Serialize;
use serde_json::json;
use tracing::{debug, warn};

use lattice_core::graph::{node_types, observation_types, Layer, Observation};
use lattice_core::{LatticeError, LatticeResult};

use crate::context::ToolEnv;
use crate::registry::{ToolRegistry, ToolTag};

/// Per-invocation options.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Identity of the caller, recorded in the invocation observation.
    pub caller: String,
    /// Acknowledges a challenge; without it a challenged call returns
    /// unexecuted.
    pub confirm: bool,
    /// Handler deadline. Expiry surfaces as `Cancelled`.
    pub deadline: Option<Duration>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            caller: "anonymous".to_string(),
            confirm: false,
            deadline: None,
        }
    }
}

/// The terminal result of a tool invocation.
#[derive(Debug, Clone, Serialize)]
pub struct ToolResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration_ms: u64,
}

/// What a dispatch call produced: either an unexecuted challenge or a
/// completed result.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ToolOutcome {
    Challenge { message: String },
    Completed(ToolResult),
}

/// Dispatch one tool invocation.
pub async fn run_tool(
    registry: &ToolRegistry,
    env: &ToolEnv,
    name: &str,
    args: serde_json::Value,
    opts: RunOptions,
) -> LatticeResult<ToolOutcome> {
    let registered = registry
        .get(name)
        .ok_or_else(|| LatticeError::invalid_argument(format!("unknown tool '{name}'")))?;

    // Schema validation up front; a malformed call never reaches the
    // handler or the observation log.
    if let Err(error) = registered.validator.validate(&args) {
        return Err(LatticeError::invalid_argument(format!(
            "invalid arguments for '{name}': {error}"
        )));
    }

    if let Some(message) = registered.tool.challenge(&args) {
        if !opts.confirm {
            debug!(tool = name, "returning unexecuted challenge");
            return Ok(ToolOutcome::Challenge { message });
        }
    }

    let started = Instant::now();
    let ran = match opts.deadline {
        Some(deadline) => match tokio::time::timeout(deadline, registered.tool.run(env, args)).await
        {
            Ok(result) => result,
            Err(_) => Err(LatticeError::cancelled(format!(
                "tool '{name}' exceeded its deadline"
            ))),
        },
        None => registered.tool.run(env, args).await,
    };
    let duration_ms = started.elapsed().as_millis() as u64;

    let result = match ran {
        Ok(output) => ToolResult {
            success: true,
            output: Some(output),
            error: None,
            duration_ms,
        },
        Err(e) => ToolResult {
            success: false,
            output: None,
            error: Some(e.to_string()),
            duration_ms,
        },
    };

    record_invocation(env, registered.tool.tags(), name, &opts.caller, &result);
    Ok(ToolOutcome::Completed(result))
}

/// Best-effort observation of the invocation, anchored on the tool's own
/// AUTOMATION.tool node. A failure to observe never fails the call.
fn record_invocation(
    env: &ToolEnv,
    tags: &[ToolTag],
    name: &str,
    caller: &str,
    result: &ToolResult,
) {
    let mut payload = json!({
        "tool": name,
        "caller": caller,
        "success": result.success,
        "duration_ms": result.duration_ms,
    });
    if tags.contains(&ToolTag::Write) {
        if let Some(paths) = result
            .output
            .as_ref()
            .and_then(|out| out.get("modified_paths"))
        {
            payload["modified_paths"] = paths.clone();
        }
    }

    let anchored = env
        .store
        .get_or_create(Layer::Automation, node_types::TOOL, name, json!({}))
        .and_then(|(tool_node, _)| {
            env.store.create_observation(&Observation::new(
                &tool_node.id,
                observation_types::TOOL_EVENT,
                payload,
            ))
        });
    if let Err(e) = anchored {
        warn!(tool = name, error = %e, "failed to record tool invocation");
    }
}
