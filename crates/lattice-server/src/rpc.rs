//! Line-delimited JSON-RPC 2.0 bridging to the tool dispatcher.
//!
//! Protocol errors (parse, unknown method, bad params) surface as
//! JSON-RPC errors; tool handler failures surface inside the tool result
//! as `isError`, never as transport errors.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use lattice_tools::{run_tool, RunOptions, ToolEnv, ToolOutcome, ToolRegistry};

pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// Default per-call deadline on the tool-server surface.
const CALL_DEADLINE: Duration = Duration::from_secs(120);

pub const PARSE_ERROR: i32 = -32700;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;

#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    #[allow(dead_code)]
    pub jsonrpc: Option<String>,
    /// Absent for notifications; echoed back verbatim otherwise.
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: &'static str,
    pub id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

#[derive(Debug, Serialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
}

fn ok(id: Option<Value>, result: Value) -> JsonRpcResponse {
    JsonRpcResponse {
        jsonrpc: "2.0",
        id,
        result: Some(result),
        error: None,
    }
}

fn err(id: Option<Value>, code: i32, message: impl Into<String>) -> JsonRpcResponse {
    JsonRpcResponse {
        jsonrpc: "2.0",
        id,
        result: None,
        error: Some(JsonRpcError {
            code,
            message: message.into(),
        }),
    }
}

/// Handle one request line. `None` means no response goes out (a
/// notification, or an unparseable notification-shaped line).
pub async fn handle_line(
    registry: &ToolRegistry,
    env: &ToolEnv,
    line: &str,
) -> Option<JsonRpcResponse> {
    let request: JsonRpcRequest = match serde_json::from_str(line) {
        Ok(request) => request,
        Err(e) => return Some(err(None, PARSE_ERROR, format!("parse error: {e}"))),
    };
    let id = request.id.clone();

    match request.method.as_str() {
        "initialize" => Some(ok(
            id,
            json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": { "tools": {} },
                "serverInfo": {
                    "name": "lattice",
                    "version": lattice_core::constants::VERSION,
                },
            }),
        )),
        // Notification: acknowledged silently.
        "initialized" | "notifications/initialized" => None,
        "tools/list" => Some(ok(id, json!({ "tools": registry.list() }))),
        "tools/call" => Some(handle_tool_call(registry, env, id, request.params).await),
        other => Some(err(
            id,
            METHOD_NOT_FOUND,
            format!("method not found: {other}"),
        )),
    }
}

async fn handle_tool_call(
    registry: &ToolRegistry,
    env: &ToolEnv,
    id: Option<Value>,
    params: Option<Value>,
) -> JsonRpcResponse {
    let Some(params) = params else {
        return err(id, INVALID_PARAMS, "tools/call requires params");
    };
    let Some(name) = params.get("name").and_then(|v| v.as_str()).map(str::to_string) else {
        return err(id, INVALID_PARAMS, "tools/call requires a tool name");
    };
    let mut arguments = params
        .get("arguments")
        .cloned()
        .unwrap_or_else(|| json!({}));

    // The confirmation flag rides alongside the tool arguments and is
    // stripped before schema validation.
    let confirm = arguments
        .as_object_mut()
        .and_then(|object| object.remove("_confirm"))
        .and_then(|v| v.as_bool())
        .unwrap_or(false);

    let opts = RunOptions {
        caller: "tool-server".to_string(),
        confirm,
        deadline: Some(CALL_DEADLINE),
    };
    match run_tool(registry, env, &name, arguments, opts).await {
        Ok(ToolOutcome::Challenge { message }) => ok(
            id,
            json!({
                "content": [{ "type": "text", "text": message }],
                "isError": false,
            }),
        ),
        Ok(ToolOutcome::Completed(result)) => {
            let text = if result.success {
                serde_json::to_string_pretty(&result.output).unwrap_or_default()
            } else {
                serde_json::to_string(&json!({
                    "success": false,
                    "error": result.error,
                    "duration_ms": result.duration_ms,
                }))
                .unwrap_or_default()
            };
            ok(
                id,
                json!({
                    "content": [{ "type": "text", "text": text }],
                    "isError": !result.success,
                }),
            )
        }
        // Unknown tool or schema failure is a params-level protocol error.
        Err(e) => err(id, INVALID_PARAMS, e.to_string()),
    }
}
