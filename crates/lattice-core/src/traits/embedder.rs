use crate::errors::LatticeResult;

/// Embedding generation capability.
///
/// The system holds exactly one of these. A provider that reports
/// `is_available() == false` is the no-op sentinel: the search layer fails
/// with `NoEmbedder` instead of calling it. No write path ever blocks on
/// `embed`.
pub trait IEmbedder: Send + Sync {
    /// Embed a single text, returning a dense vector of `dimensions()` floats.
    fn embed(&self, text: &str) -> LatticeResult<Vec<f32>>;

    /// The dimensionality of vectors produced by this provider.
    fn dimensions(&self) -> usize;

    /// Human-readable provider name.
    fn name(&self) -> &str;

    /// Whether this provider can actually embed.
    fn is_available(&self) -> bool;
}
