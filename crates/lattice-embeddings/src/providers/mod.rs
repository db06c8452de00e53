//! Embedding providers: the deterministic local hasher and the no-op
//! sentinel. Provider selection is a startup-time decision.

pub mod hash_embedder;
pub mod noop;

pub use hash_embedder::HashEmbedder;
pub use noop::NoopEmbedder;

use lattice_core::traits::IEmbedder;

/// Create the configured provider. Unknown names fall back to the no-op
/// sentinel: similarity search then fails with `NoEmbedder` instead of
/// silently producing garbage vectors.
pub fn create_provider(name: &str) -> Box<dyn IEmbedder> {
    match name {
        "hash" => Box::new(HashEmbedder::default()),
        "none" => Box::new(NoopEmbedder),
        other => {
            tracing::warn!(provider = other, "unknown embedder provider, disabling embedding");
            Box::new(NoopEmbedder)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_provider_is_available() {
        assert!(create_provider("hash").is_available());
    }

    #[test]
    fn unknown_provider_is_noop() {
        let provider = create_provider("quantum");
        assert!(!provider.is_available());
        assert_eq!(provider.name(), "noop");
    }
}
