//! Runtime configuration, read once from the environment at startup.
//! No hot reload.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::constants::{COMPRESSED_RETENTION_DAYS, SESSION_RETENTION_DAYS};

/// Retention policy for the garbage collector. Only CONTEXT.session nodes
/// are ever collected.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GcPolicy {
    /// Sessions older than this (status neither active nor compressed)
    /// are soft-deleted.
    pub session_retention_days: i64,
    /// Compressed sessions older than this are soft-deleted.
    pub compressed_retention_days: i64,
    /// When true, report candidates without writing.
    pub dry_run: bool,
}

impl Default for GcPolicy {
    fn default() -> Self {
        Self {
            session_retention_days: SESSION_RETENTION_DAYS,
            compressed_retention_days: COMPRESSED_RETENTION_DAYS,
            dry_run: false,
        }
    }
}

/// Process-wide configuration for both binaries.
#[derive(Debug, Clone)]
pub struct LatticeConfig {
    /// SQLite database path.
    pub db_path: PathBuf,
    /// The single allowed filesystem root for tool path arguments.
    pub allowed_root: PathBuf,
    /// Embedder provider selection: "hash" or "none".
    pub embedder: String,
    pub gc: GcPolicy,
}

impl LatticeConfig {
    /// Read configuration from `LATTICE_DB`, `LATTICE_ROOT`, and
    /// `LATTICE_EMBEDDER`. Missing values fall back to working-directory
    /// defaults.
    pub fn from_env() -> Self {
        let db_path = std::env::var("LATTICE_DB")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("lattice.db"));
        let allowed_root = std::env::var("LATTICE_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|_| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
        let embedder = std::env::var("LATTICE_EMBEDDER").unwrap_or_else(|_| "hash".to_string());
        Self {
            db_path,
            allowed_root,
            embedder,
            gc: GcPolicy::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gc_policy_defaults() {
        let gc = GcPolicy::default();
        assert_eq!(gc.session_retention_days, 14);
        assert_eq!(gc.compressed_retention_days, 30);
        assert!(!gc.dry_run);
    }
}
