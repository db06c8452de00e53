//! Filesystem tools. Every path argument resolves under the configured
//! allowed root; escapes fail with `ScopeViolation` before any I/O.

mod exec_tool;
mod grep_tool;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use lattice_core::constants::MAX_HASHABLE_FILE_BYTES;
use lattice_core::{LatticeError, LatticeResult};

use crate::context::ToolEnv;
use crate::path_guard;
use crate::registry::{Tool, ToolTag};

pub use exec_tool::ExecTool;
pub use grep_tool::{GlobTool, GrepTool};

/// All filesystem tools, ready for registration.
pub fn tools() -> Vec<Arc<dyn Tool>> {
    vec![
        Arc::new(ReadTool),
        Arc::new(WriteTool),
        Arc::new(EditTool),
        Arc::new(GrepTool),
        Arc::new(GlobTool),
        Arc::new(LsTool),
        Arc::new(MkdirTool),
        Arc::new(ExecTool),
    ]
}

pub(crate) fn str_arg<'a>(args: &'a Value, key: &str) -> LatticeResult<&'a str> {
    args.get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| LatticeError::invalid_argument(format!("missing string argument '{key}'")))
}

pub(crate) fn opt_str<'a>(args: &'a Value, key: &str) -> Option<&'a str> {
    args.get(key).and_then(|v| v.as_str())
}

pub(crate) fn opt_usize(args: &Value, key: &str) -> Option<usize> {
    args.get(key).and_then(|v| v.as_u64()).map(|v| v as usize)
}

/// SHA-256 of a regular file's bytes, only for files within the hashable
/// size bound.
pub(crate) fn file_hash(path: &Path) -> Option<String> {
    let meta = std::fs::metadata(path).ok()?;
    if !meta.is_file() || meta.len() > MAX_HASHABLE_FILE_BYTES {
        return None;
    }
    let bytes = std::fs::read(path).ok()?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Some(format!("{:x}", hasher.finalize()))
}

fn io_err(context: &str, e: std::io::Error) -> LatticeError {
    match e.kind() {
        std::io::ErrorKind::NotFound => LatticeError::not_found(context.to_string()),
        _ => LatticeError::storage(format!("{context}: {e}")),
    }
}

// ── read ──────────────────────────────────────────────────────────────

pub struct ReadTool;

#[async_trait]
impl Tool for ReadTool {
    fn name(&self) -> &'static str {
        "read"
    }
    fn description(&self) -> &'static str {
        "Read a file under the allowed root, optionally a line range"
    }
    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string"},
                "offset": {"type": "integer", "minimum": 0},
                "limit": {"type": "integer", "minimum": 1}
            },
            "required": ["path"]
        })
    }
    fn tags(&self) -> &'static [ToolTag] {
        &[ToolTag::Read, ToolTag::Fs]
    }

    async fn run(&self, env: &ToolEnv, args: Value) -> LatticeResult<Value> {
        let raw = str_arg(&args, "path")?;
        let path = path_guard::resolve(&env.allowed_root, raw)?;
        let content =
            std::fs::read_to_string(&path).map_err(|e| io_err(&path.display().to_string(), e))?;
        let offset = opt_usize(&args, "offset").unwrap_or(0);
        let limit = opt_usize(&args, "limit");
        let selected: String = match limit {
            Some(limit) => content
                .lines()
                .skip(offset)
                .take(limit)
                .collect::<Vec<_>>()
                .join("\n"),
            None if offset > 0 => content.lines().skip(offset).collect::<Vec<_>>().join("\n"),
            None => content.clone(),
        };
        let mut out = json!({
            "path": raw,
            "content": selected,
            "total_lines": content.lines().count(),
        });
        if let Some(hash) = file_hash(&path) {
            out["hash"] = json!(hash);
        }
        Ok(out)
    }
}

// ── write ─────────────────────────────────────────────────────────────

pub struct WriteTool;

#[async_trait]
impl Tool for WriteTool {
    fn name(&self) -> &'static str {
        "write"
    }
    fn description(&self) -> &'static str {
        "Write a file under the allowed root, replacing any existing content"
    }
    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string"},
                "content": {"type": "string"}
            },
            "required": ["path", "content"]
        })
    }
    fn tags(&self) -> &'static [ToolTag] {
        &[ToolTag::Write, ToolTag::Fs]
    }

    async fn run(&self, env: &ToolEnv, args: Value) -> LatticeResult<Value> {
        let raw = str_arg(&args, "path")?;
        let content = str_arg(&args, "content")?;
        let path = path_guard::resolve(&env.allowed_root, raw)?;
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                return Err(LatticeError::invalid_argument(format!(
                    "parent directory of '{raw}' does not exist (use mkdir first)"
                )));
            }
        }
        std::fs::write(&path, content).map_err(|e| io_err(&path.display().to_string(), e))?;
        let mut out = json!({
            "path": raw,
            "bytes": content.len(),
            "modified_paths": [raw],
        });
        if let Some(hash) = file_hash(&path) {
            out["hash"] = json!(hash);
        }
        Ok(out)
    }
}

// ── edit ──────────────────────────────────────────────────────────────

pub struct EditTool;

#[async_trait]
impl Tool for EditTool {
    fn name(&self) -> &'static str {
        "edit"
    }
    fn description(&self) -> &'static str {
        "Replace an exact string in a file; fails unless the match is unique"
    }
    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string"},
                "old": {"type": "string", "minLength": 1},
                "new": {"type": "string"},
                "replace_all": {"type": "boolean"}
            },
            "required": ["path", "old", "new"]
        })
    }
    fn tags(&self) -> &'static [ToolTag] {
        &[ToolTag::Write, ToolTag::Fs]
    }

    async fn run(&self, env: &ToolEnv, args: Value) -> LatticeResult<Value> {
        let raw = str_arg(&args, "path")?;
        let old = str_arg(&args, "old")?;
        let new = str_arg(&args, "new")?;
        let replace_all = args
            .get("replace_all")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        let path = path_guard::resolve(&env.allowed_root, raw)?;
        let content =
            std::fs::read_to_string(&path).map_err(|e| io_err(&path.display().to_string(), e))?;

        let occurrences = content.matches(old).count();
        if occurrences == 0 {
            return Err(LatticeError::invalid_argument(format!(
                "old string not found in '{raw}'"
            )));
        }
        if occurrences > 1 && !replace_all {
            return Err(LatticeError::invalid_argument(format!(
                "old string occurs {occurrences} times in '{raw}'; pass replace_all"
            )));
        }
        let updated = if replace_all {
            content.replace(old, new)
        } else {
            content.replacen(old, new, 1)
        };
        std::fs::write(&path, &updated).map_err(|e| io_err(&path.display().to_string(), e))?;
        Ok(json!({
            "path": raw,
            "replacements": if replace_all { occurrences } else { 1 },
            "modified_paths": [raw],
        }))
    }
}

// ── ls ────────────────────────────────────────────────────────────────

pub struct LsTool;

#[async_trait]
impl Tool for LsTool {
    fn name(&self) -> &'static str {
        "ls"
    }
    fn description(&self) -> &'static str {
        "List a directory under the allowed root"
    }
    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string"}
            }
        })
    }
    fn tags(&self) -> &'static [ToolTag] {
        &[ToolTag::Read, ToolTag::Fs]
    }

    async fn run(&self, env: &ToolEnv, args: Value) -> LatticeResult<Value> {
        let raw = opt_str(&args, "path").unwrap_or(".");
        let path = path_guard::resolve(&env.allowed_root, raw)?;
        let mut entries = Vec::new();
        let read_dir =
            std::fs::read_dir(&path).map_err(|e| io_err(&path.display().to_string(), e))?;
        for entry in read_dir.flatten() {
            let meta = entry.metadata().ok();
            entries.push(json!({
                "name": entry.file_name().to_string_lossy(),
                "kind": if meta.as_ref().map(|m| m.is_dir()).unwrap_or(false) { "dir" } else { "file" },
                "size": meta.map(|m| m.len()).unwrap_or(0),
            }));
        }
        entries.sort_by(|a, b| a["name"].as_str().cmp(&b["name"].as_str()));
        Ok(json!({ "path": raw, "entries": entries }))
    }
}

// ── mkdir ─────────────────────────────────────────────────────────────

pub struct MkdirTool;

#[async_trait]
impl Tool for MkdirTool {
    fn name(&self) -> &'static str {
        "mkdir"
    }
    fn description(&self) -> &'static str {
        "Create a directory (and parents) under the allowed root"
    }
    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string"}
            },
            "required": ["path"]
        })
    }
    fn tags(&self) -> &'static [ToolTag] {
        &[ToolTag::Write, ToolTag::Fs]
    }

    async fn run(&self, env: &ToolEnv, args: Value) -> LatticeResult<Value> {
        let raw = str_arg(&args, "path")?;
        let path = path_guard::resolve(&env.allowed_root, raw)?;
        std::fs::create_dir_all(&path).map_err(|e| io_err(&path.display().to_string(), e))?;
        Ok(json!({ "path": raw, "modified_paths": [raw] }))
    }
}
