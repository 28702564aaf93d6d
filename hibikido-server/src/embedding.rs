//! Embedding provider
//!
//! Providers turn text into L2-normalized vectors of a fixed dimensionality.
//! The trait is the seam where a sentence-transformer model would plug in;
//! the shipped backend is a deterministic feature-hash embedding, which keeps
//! the retrieval pipeline fully reproducible: identical texts embed
//! identically, so a document queried with its own embedding text scores 1.0.

use crate::{Error, Result};
use std::hash::Hasher;
use twox_hash::XxHash64;

/// Dimensionality wired through the index and the persisted file format
pub const EMBEDDING_DIM: usize = 384;

pub trait Embedder: Send + Sync {
    /// Embedding dimensionality (D)
    fn dim(&self) -> usize;

    /// Compute the unit vector for one input text
    fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Instantiate the provider named in the configuration
///
/// An unknown model name is the "model unavailable" startup failure.
pub fn create(model_name: &str) -> Result<Box<dyn Embedder>> {
    match model_name {
        "feature-hash" => Ok(Box::new(HashEmbedder::new(EMBEDDING_DIM))),
        other => Err(Error::Embedding(format!(
            "unknown embedding model: '{}'",
            other
        ))),
    }
}

/// Feature-hash embedding: each whitespace token lands in one signed bucket
pub struct HashEmbedder {
    dim: usize,
}

impl HashEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim }
    }
}

impl Embedder for HashEmbedder {
    fn dim(&self) -> usize {
        self.dim
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vector = vec![0f32; self.dim];
        let mut tokens = 0usize;

        for token in text.split_whitespace() {
            let mut hasher = XxHash64::with_seed(0);
            hasher.write(token.as_bytes());
            let hash = hasher.finish();

            let bucket = (hash as usize) % self.dim;
            let sign = if hash & (1 << 63) == 0 { 1.0 } else { -1.0 };
            let weight = 0.5 + ((hash >> 32) as u32 as f32) / (u32::MAX as f32);

            vector[bucket] += sign * weight;
            tokens += 1;
        }

        if tokens == 0 {
            return Err(Error::Embedding("empty text".into()));
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm <= f32::EPSILON {
            return Err(Error::Embedding("degenerate embedding".into()));
        }
        for x in &mut vector {
            *x /= norm;
        }
        Ok(vector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dot(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[test]
    fn embeddings_are_unit_norm() {
        let embedder = HashEmbedder::new(EMBEDDING_DIM);
        let v = embedder.embed("forest wind through tall pines").unwrap();
        assert_eq!(v.len(), EMBEDDING_DIM);
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn identical_texts_embed_identically() {
        let embedder = HashEmbedder::new(EMBEDDING_DIM);
        let a = embedder.embed("deep bell resonance").unwrap();
        let b = embedder.embed("deep bell resonance").unwrap();
        assert_eq!(a, b);
        assert!((dot(&a, &b) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn distinct_texts_diverge() {
        let embedder = HashEmbedder::new(EMBEDDING_DIM);
        let a = embedder.embed("deep bell resonance").unwrap();
        let b = embedder.embed("crackling fire embers").unwrap();
        assert!(dot(&a, &b) < 0.9);
    }

    #[test]
    fn empty_text_is_rejected() {
        let embedder = HashEmbedder::new(EMBEDDING_DIM);
        assert!(embedder.embed("").is_err());
        assert!(embedder.embed("   ").is_err());
    }

    #[test]
    fn unknown_model_fails_at_creation() {
        assert!(create("all-MiniLM-L6-v2").is_err());
        assert!(create("feature-hash").is_ok());
    }
}
