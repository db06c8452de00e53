//! Command execution inside the allowed root, behind the challenge gate.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use lattice_core::{LatticeError, LatticeResult};

use super::{opt_str, str_arg};
use crate::context::ToolEnv;
use crate::path_guard;
use crate::registry::{Tool, ToolTag};

/// Default command timeout when the caller does not set one.
const DEFAULT_TIMEOUT_MS: u64 = 60_000;

/// Captured output is truncated beyond this.
const MAX_CAPTURE_BYTES: usize = 64 * 1024;

pub struct ExecTool;

#[async_trait]
impl Tool for ExecTool {
    fn name(&self) -> &'static str {
        "exec"
    }
    fn description(&self) -> &'static str {
        "Run a command with its working directory inside the allowed root"
    }
    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "command": {"type": "string", "minLength": 1},
                "args": {"type": "array", "items": {"type": "string"}},
                "cwd": {"type": "string"},
                "timeout_ms": {"type": "integer", "minimum": 1}
            },
            "required": ["command"]
        })
    }
    fn tags(&self) -> &'static [ToolTag] {
        &[ToolTag::Write, ToolTag::Fs, ToolTag::Admin]
    }

    /// Command execution always challenges; the caller must confirm.
    fn challenge(&self, args: &Value) -> Option<String> {
        let command = args.get("command").and_then(|v| v.as_str()).unwrap_or("?");
        Some(format!("about to execute '{command}' — confirm to proceed"))
    }

    async fn run(&self, env: &ToolEnv, args: Value) -> LatticeResult<Value> {
        let command = str_arg(&args, "command")?;
        let argv: Vec<String> = args
            .get("args")
            .and_then(|v| v.as_array())
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| item.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();
        let cwd = path_guard::resolve(&env.allowed_root, opt_str(&args, "cwd").unwrap_or("."))?;
        let timeout_ms = args
            .get("timeout_ms")
            .and_then(|v| v.as_u64())
            .unwrap_or(DEFAULT_TIMEOUT_MS);

        let output = tokio::time::timeout(
            Duration::from_millis(timeout_ms),
            tokio::process::Command::new(command)
                .args(&argv)
                .current_dir(&cwd)
                .output(),
        )
        .await
        .map_err(|_| LatticeError::cancelled(format!("'{command}' exceeded {timeout_ms}ms")))?
        .map_err(|e| LatticeError::storage(format!("spawn '{command}': {e}")))?;

        Ok(json!({
            "status": output.status.code(),
            "success": output.status.success(),
            "stdout": truncate_capture(&output.stdout),
            "stderr": truncate_capture(&output.stderr),
            "modified_paths": [],
        }))
    }
}

fn truncate_capture(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    if text.len() <= MAX_CAPTURE_BYTES {
        text.into_owned()
    } else {
        format!("{}… [truncated]", &text[..MAX_CAPTURE_BYTES])
    }
}
