//! # lattice-storage
//!
//! SQLite persistence for the knowledge graph: connection pool, schema
//! migrations with the three invariant triggers, monthly partition
//! families for events and observations, node/edge/event/observation
//! queries, traversal, vector scan, and the version log.

pub mod engine;
pub mod migrations;
pub mod partitions;
pub mod pool;
pub mod queries;
pub mod versioning;

pub use engine::GraphEngine;

use lattice_core::LatticeError;

/// Wrap an underlying SQLite failure into the opaque `Storage` variant.
pub(crate) fn to_storage_err(message: impl Into<String>) -> LatticeError {
    LatticeError::Storage {
        message: message.into(),
    }
}

/// Map a rusqlite error, recognising unique-constraint violations (so the
/// entity store can resolve get_or_create races) and guard-trigger aborts.
pub(crate) fn map_sqlite_err(e: rusqlite::Error, context: &str) -> LatticeError {
    if let rusqlite::Error::SqliteFailure(ref code, ref message) = e {
        if code.code == rusqlite::ErrorCode::ConstraintViolation {
            let detail = message
                .clone()
                .unwrap_or_else(|| format!("{context}: constraint violation"));
            // The telemetry guard raises ABORT, which SQLite reports as a
            // constraint failure. It is a caller error, not a race.
            if detail.contains("telemetry") {
                return LatticeError::InvalidArgument { message: detail };
            }
            return LatticeError::Conflict { what: detail };
        }
    }
    to_storage_err(format!("{context}: {e}"))
}
