//! Protocol tests for the JSON-RPC surface and the hook ingestion path.

use std::path::PathBuf;
use std::sync::Arc;

use serde_json::{json, Value};

use lattice_core::config::GcPolicy;
use lattice_core::LatticeConfig;
use lattice_embeddings::{EmbeddingEngine, HashEmbedder};
use lattice_server::{hook, rpc};
use lattice_storage::GraphEngine;
use lattice_tools::{default_registry, ToolEnv, ToolRegistry};

fn setup() -> (ToolEnv, ToolRegistry, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(GraphEngine::open_in_memory().unwrap());
    let embeddings = EmbeddingEngine::new(
        store.clone(),
        Arc::new(HashEmbedder::default()),
        dir.path().to_path_buf(),
    );
    let config = LatticeConfig {
        db_path: PathBuf::from(":memory:"),
        allowed_root: dir.path().to_path_buf(),
        embedder: "hash".to_string(),
        gc: GcPolicy::default(),
    };
    let env = ToolEnv::new(&config, store, embeddings);
    (env, default_registry(), dir)
}

async fn call(env: &ToolEnv, registry: &ToolRegistry, line: &str) -> Value {
    let response = rpc::handle_line(registry, env, line)
        .await
        .expect("expected a response");
    serde_json::to_value(&response).unwrap()
}

#[tokio::test]
async fn initialize_reports_protocol_and_capabilities() {
    let (env, registry, _dir) = setup();
    let response = call(
        &env,
        &registry,
        r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{}}"#,
    )
    .await;
    assert_eq!(response["id"], 1);
    let result = &response["result"];
    assert_eq!(result["protocolVersion"], "2024-11-05");
    assert!(result["capabilities"]["tools"].is_object());
    assert_eq!(result["serverInfo"]["name"], "lattice");
}

#[tokio::test]
async fn initialized_notification_gets_no_response() {
    let (env, registry, _dir) = setup();
    let response = rpc::handle_line(
        &registry,
        &env,
        r#"{"jsonrpc":"2.0","method":"initialized"}"#,
    )
    .await;
    assert!(response.is_none());
}

#[tokio::test]
async fn tools_list_exposes_registered_tools() {
    let (env, registry, _dir) = setup();
    let response = call(
        &env,
        &registry,
        r#"{"jsonrpc":"2.0","id":2,"method":"tools/list","params":{}}"#,
    )
    .await;
    let tools = response["result"]["tools"].as_array().unwrap();
    assert!(tools.len() > 20);
    let names: Vec<&str> = tools
        .iter()
        .map(|tool| tool["name"].as_str().unwrap())
        .collect();
    assert!(names.contains(&"context_pack"));
    assert!(names.contains(&"read"));
    assert!(names.contains(&"query"));
    assert!(tools[0]["inputSchema"].is_object());
}

#[tokio::test]
async fn tools_call_round_trips_and_reports_handler_failure_inline() {
    let (env, registry, _dir) = setup();
    let request = json!({
        "jsonrpc": "2.0",
        "id": 3,
        "method": "tools/call",
        "params": {
            "name": "node_create",
            "arguments": {"layer": "CONTEXT", "type": "task", "name": "t1"}
        }
    });
    let response = call(&env, &registry, &request.to_string()).await;
    assert_eq!(response["result"]["isError"], false);
    let text = response["result"]["content"][0]["text"].as_str().unwrap();
    assert!(text.contains("\"name\": \"t1\""));

    // A second create with the same identity fails inside the tool
    // result, not at the transport level.
    let response = call(&env, &registry, &request.to_string()).await;
    assert_eq!(response["result"]["isError"], true);
    let text = response["result"]["content"][0]["text"].as_str().unwrap();
    assert!(text.contains("conflict"));
    assert!(response["error"].is_null());
}

#[tokio::test]
async fn protocol_errors_use_reserved_codes() {
    let (env, registry, _dir) = setup();

    let response = call(&env, &registry, "this is not json").await;
    assert_eq!(response["error"]["code"], rpc::PARSE_ERROR);

    let response = call(
        &env,
        &registry,
        r#"{"jsonrpc":"2.0","id":4,"method":"resources/list","params":{}}"#,
    )
    .await;
    assert_eq!(response["error"]["code"], rpc::METHOD_NOT_FOUND);

    let response = call(
        &env,
        &registry,
        r#"{"jsonrpc":"2.0","id":5,"method":"tools/call","params":{"name":"no_such_tool","arguments":{}}}"#,
    )
    .await;
    assert_eq!(response["error"]["code"], rpc::INVALID_PARAMS);
}

#[tokio::test]
async fn challenge_flow_round_trips_through_tools_call() {
    let (env, registry, _dir) = setup();
    let request = json!({
        "jsonrpc": "2.0",
        "id": 6,
        "method": "tools/call",
        "params": {"name": "exec", "arguments": {"command": "true"}}
    });
    let response = call(&env, &registry, &request.to_string()).await;
    let text = response["result"]["content"][0]["text"].as_str().unwrap();
    assert!(text.contains("confirm"));

    let confirmed = json!({
        "jsonrpc": "2.0",
        "id": 7,
        "method": "tools/call",
        "params": {"name": "exec", "arguments": {"command": "true", "_confirm": true}}
    });
    let response = call(&env, &registry, &confirmed.to_string()).await;
    assert_eq!(response["result"]["isError"], false);
}

#[tokio::test]
async fn hook_ingestion_writes_observation_and_causal_events() {
    let (env, _registry, _dir) = setup();
    let line = json!({
        "event": "PostToolUse",
        "session_id": "sess-1",
        "tool_name": "edit",
        "file_paths": ["/src/main.rs", "/src/lib.rs"],
        "success": true,
        "duration_ms": 45,
        "timestamp": "2026-08-01T10:00:00Z"
    })
    .to_string();
    assert!(hook::ingest_line(&env, &line));

    // One observation on the session node.
    let observations = env
        .store
        .list_observations_by_type("tool_event", None, None, 10)
        .unwrap();
    assert_eq!(observations.len(), 1);
    assert_eq!(observations[0].payload["session_id"], "sess-1");
    assert_eq!(observations[0].payload["tool"], "edit");

    // One modified event per file, and the file nodes exist.
    let events = env.store.events_in_range(None, None, 10).unwrap();
    assert_eq!(events.len(), 2);
    assert!(events.iter().all(|e| e.duration_ms == Some(45)));
    assert!(env.store.get_by_path("/src/main.rs").unwrap().is_some());

    // Malformed lines are swallowed, not fatal.
    assert!(!hook::ingest_line(&env, "{ not json"));
    // A read-style tool observes rather than modifies.
    let read_line = json!({
        "event": "PostToolUse",
        "session_id": "sess-1",
        "tool_name": "read",
        "file_paths": ["/src/main.rs"]
    })
    .to_string();
    assert!(hook::ingest_line(&env, &read_line));
    let events = env.store.events_in_range(None, None, 10).unwrap();
    let observed = events
        .iter()
        .filter(|e| e.relation == lattice_core::graph::EventRelation::Observed)
        .count();
    assert_eq!(observed, 1);
}

#[tokio::test]
async fn repeated_hook_lines_reuse_session_and_file_nodes() {
    let (env, _registry, _dir) = setup();
    for _ in 0..3 {
        let line = json!({
            "event": "PostToolUse",
            "session_id": "sess-2",
            "tool_name": "write",
            "file_paths": ["/src/a.rs"]
        })
        .to_string();
        assert!(hook::ingest_line(&env, &line));
    }
    let sessions = env
        .store
        .list_by_layer_type(lattice_core::graph::Layer::Context, "session", 100)
        .unwrap();
    assert_eq!(sessions.iter().filter(|s| s.name == "sess-2").count(), 1);
    let files = env
        .store
        .list_by_layer_type(lattice_core::graph::Layer::System, "file", 100)
        .unwrap();
    assert_eq!(files.len(), 1);
}
