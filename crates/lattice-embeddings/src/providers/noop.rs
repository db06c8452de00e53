//! The absent-embedder sentinel.

use lattice_core::traits::IEmbedder;
use lattice_core::{LatticeError, LatticeResult};

/// Recognised by the search layer via `is_available()`; calling `embed`
/// anyway is a caller bug and fails the same way search would.
pub struct NoopEmbedder;

impl IEmbedder for NoopEmbedder {
    fn embed(&self, _text: &str) -> LatticeResult<Vec<f32>> {
        Err(LatticeError::NoEmbedder)
    }

    fn dimensions(&self) -> usize {
        0
    }

    fn name(&self) -> &str {
        "noop"
    }

    fn is_available(&self) -> bool {
        false
    }
}
