//! Capability traits at the system's seams.

pub mod embedder;

pub use embedder::IEmbedder;
