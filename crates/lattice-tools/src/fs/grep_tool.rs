//! Content and name search under the allowed root.

use async_trait::async_trait;
use globset::{Glob, GlobMatcher};
use serde_json::{json, Value};
use walkdir::WalkDir;

use lattice_core::constants::{DEFAULT_GREP_MATCH_LIMIT, MAX_GREP_FILES, MAX_GREP_MATCH_LIMIT};
use lattice_core::{LatticeError, LatticeResult};

use super::{opt_str, opt_usize, str_arg};
use crate::context::ToolEnv;
use crate::path_guard;
use crate::registry::{Tool, ToolTag};

/// Directories never descended into.
const SKIPPED_DIRS: &[&str] = &[".git", "node_modules", ".svn"];

/// Bytes sniffed to classify a file as binary.
const BINARY_SNIFF_BYTES: usize = 8192;

fn is_skipped_dir(entry: &walkdir::DirEntry) -> bool {
    entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .map(|name| SKIPPED_DIRS.contains(&name))
            .unwrap_or(false)
}

fn looks_binary(bytes: &[u8]) -> bool {
    bytes
        .iter()
        .take(BINARY_SNIFF_BYTES)
        .any(|byte| *byte == 0)
}

fn compile_glob(pattern: &str) -> LatticeResult<GlobMatcher> {
    Glob::new(pattern)
        .map(|glob| glob.compile_matcher())
        .map_err(|e| LatticeError::invalid_argument(format!("bad glob '{pattern}': {e}")))
}

// ── grep ──────────────────────────────────────────────────────────────

pub struct GrepTool;

#[async_trait]
impl Tool for GrepTool {
    fn name(&self) -> &'static str {
        "grep"
    }
    fn description(&self) -> &'static str {
        "Regex search over text files under the allowed root"
    }
    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "pattern": {"type": "string", "minLength": 1},
                "path": {"type": "string"},
                "glob": {"type": "string"},
                "limit": {"type": "integer", "minimum": 1}
            },
            "required": ["pattern"]
        })
    }
    fn tags(&self) -> &'static [ToolTag] {
        &[ToolTag::Read, ToolTag::Fs]
    }

    async fn run(&self, env: &ToolEnv, args: Value) -> LatticeResult<Value> {
        let pattern = str_arg(&args, "pattern")?;
        let regex = regex::Regex::new(pattern)
            .map_err(|e| LatticeError::invalid_argument(format!("bad pattern: {e}")))?;
        let root = path_guard::resolve(&env.allowed_root, opt_str(&args, "path").unwrap_or("."))?;
        let glob = opt_str(&args, "glob").map(compile_glob).transpose()?;
        let limit = opt_usize(&args, "limit")
            .unwrap_or(DEFAULT_GREP_MATCH_LIMIT)
            .min(MAX_GREP_MATCH_LIMIT);

        let mut matches = Vec::new();
        let mut files_searched = 0usize;
        let mut truncated = false;

        let walker = WalkDir::new(&root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| !is_skipped_dir(entry));
        for entry in walker {
            let Ok(entry) = entry else { continue };
            if !entry.file_type().is_file() {
                continue;
            }
            if files_searched >= MAX_GREP_FILES {
                truncated = true;
                break;
            }
            files_searched += 1;

            let relative = entry
                .path()
                .strip_prefix(&root)
                .unwrap_or(entry.path())
                .to_string_lossy()
                .to_string();
            if let Some(matcher) = &glob {
                if !matcher.is_match(&relative) {
                    continue;
                }
            }
            let Ok(bytes) = std::fs::read(entry.path()) else {
                continue;
            };
            if looks_binary(&bytes) {
                continue;
            }
            let text = String::from_utf8_lossy(&bytes);
            for (index, line) in text.lines().enumerate() {
                if regex.is_match(line) {
                    matches.push(json!({
                        "path": relative,
                        "line_number": index + 1,
                        "line": line,
                    }));
                    if matches.len() >= limit {
                        truncated = true;
                        break;
                    }
                }
            }
            if matches.len() >= limit {
                break;
            }
        }

        Ok(json!({
            "matches": matches,
            "files_searched": files_searched,
            "truncated": truncated,
        }))
    }
}

// ── glob ──────────────────────────────────────────────────────────────

pub struct GlobTool;

#[async_trait]
impl Tool for GlobTool {
    fn name(&self) -> &'static str {
        "glob"
    }
    fn description(&self) -> &'static str {
        "List files matching a glob pattern under the allowed root"
    }
    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "pattern": {"type": "string", "minLength": 1},
                "path": {"type": "string"}
            },
            "required": ["pattern"]
        })
    }
    fn tags(&self) -> &'static [ToolTag] {
        &[ToolTag::Read, ToolTag::Fs]
    }

    async fn run(&self, env: &ToolEnv, args: Value) -> LatticeResult<Value> {
        let matcher = compile_glob(str_arg(&args, "pattern")?)?;
        let root = path_guard::resolve(&env.allowed_root, opt_str(&args, "path").unwrap_or("."))?;

        let mut files = Vec::new();
        let walker = WalkDir::new(&root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| !is_skipped_dir(entry));
        for entry in walker.flatten() {
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry
                .path()
                .strip_prefix(&root)
                .unwrap_or(entry.path())
                .to_string_lossy()
                .to_string();
            if matcher.is_match(&relative) {
                files.push(relative);
                if files.len() >= MAX_GREP_MATCH_LIMIT {
                    break;
                }
            }
        }
        Ok(json!({ "files": files }))
    }
}
