//! The single error taxonomy surfaced to callers.
//!
//! Every error that crosses a crate boundary is exactly one of these
//! variants. Lower layers wrap their native failures into `Storage`;
//! `Internal` marks invariant violations that should be unreachable.

use thiserror::Error;

/// Result alias used across the workspace.
pub type LatticeResult<T> = Result<T, LatticeError>;

#[derive(Debug, Error)]
pub enum LatticeError {
    /// Identified entity absent or soft-deleted.
    #[error("not found: {what}")]
    NotFound { what: String },

    /// Uniqueness violation that get_or_create could not resolve.
    #[error("conflict: {what}")]
    Conflict { what: String },

    /// Schema validation, bad path, bad UUID, unknown op, unknown tool.
    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },

    /// Work-order status rule violated.
    #[error("invalid transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    /// Path outside a work-order scope or the allowed filesystem root.
    #[error("scope violation: {}", paths.join(", "))]
    ScopeViolation { paths: Vec<String> },

    /// Similarity requested without a usable embedding provider.
    #[error("no embedder configured")]
    NoEmbedder,

    /// Deadline or cancellation fired.
    #[error("cancelled: {reason}")]
    Cancelled { reason: String },

    /// Opaque wrap of an underlying storage failure.
    #[error("storage error: {message}")]
    Storage { message: String },

    /// Unreachable branch or invariant violation.
    #[error("internal error: {message}")]
    Internal { message: String },
}

impl LatticeError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    pub fn conflict(what: impl Into<String>) -> Self {
        Self::Conflict { what: what.into() }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    pub fn cancelled(reason: impl Into<String>) -> Self {
        Self::Cancelled {
            reason: reason.into(),
        }
    }

    /// True if this error means "the thing does not exist" as opposed to
    /// "something went wrong". Used by best-effort paths to decide between
    /// skipping and logging.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
