//! # lattice-embeddings
//!
//! The embedder capability and the hash-gated embedding engine. Embedding
//! never blocks a write path: mutations enqueue detached background work
//! that re-embeds only when the content hash actually changed.

pub mod content;
pub mod engine;
pub mod providers;

pub use engine::EmbeddingEngine;
pub use providers::{create_provider, HashEmbedder, NoopEmbedder};
