//! Deterministic token-hash embedding.
//!
//! Each token is hashed into a bucket with a hash-derived sign, and the
//! resulting vector is L2-normalised. No model, no I/O, fully
//! reproducible: the same text always yields the same vector, which is
//! what the hash-gated re-embedding flow relies on.

use sha2::{Digest, Sha256};

use lattice_core::traits::IEmbedder;
use lattice_core::LatticeResult;

/// Default vector width.
const DEFAULT_DIMENSIONS: usize = 256;

pub struct HashEmbedder {
    dimensions: usize,
}

impl HashEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(8),
        }
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_DIMENSIONS)
    }
}

impl IEmbedder for HashEmbedder {
    fn embed(&self, text: &str) -> LatticeResult<Vec<f32>> {
        let mut vector = vec![0.0f32; self.dimensions];
        for token in tokenize(text) {
            let digest = Sha256::digest(token.as_bytes());
            let bucket = u32::from_le_bytes([digest[0], digest[1], digest[2], digest[3]])
                as usize
                % self.dimensions;
            let sign = if digest[4] & 1 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }
        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut vector {
                *x /= norm;
            }
        }
        Ok(vector)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        "hash"
    }

    fn is_available(&self) -> bool {
        true
    }
}

fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() > 1)
        .map(|t| t.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedding_is_deterministic() {
        let embedder = HashEmbedder::default();
        let a = embedder.embed("the context pack assembler").unwrap();
        let b = embedder.embed("the context pack assembler").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), DEFAULT_DIMENSIONS);
    }

    #[test]
    fn embedding_is_unit_length() {
        let embedder = HashEmbedder::default();
        let v = embedder.embed("graph proximity signal").unwrap();
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn different_texts_differ() {
        let embedder = HashEmbedder::default();
        let a = embedder.embed("storage engine pool").unwrap();
        let b = embedder.embed("retrieval ranking weights").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn empty_text_is_zero_vector() {
        let embedder = HashEmbedder::default();
        let v = embedder.embed("").unwrap();
        assert!(v.iter().all(|x| *x == 0.0));
    }
}
