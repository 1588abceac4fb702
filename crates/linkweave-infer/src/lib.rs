//! Linkweave Infer: text embedding backends and the query embedding cache.
//!
//! `HashingEmbedder` needs no model files and is always available. With the
//! `onnx` feature and model files present, `OnnxEmbedder` loads
//! all-MiniLM-L6-v2 for 384-dim sentence embeddings.

pub mod cache;
pub mod embedder;
pub mod onnx_embedder;

pub use cache::QueryCache;
pub use embedder::{CachingEmbedder, EmbedderBackend, EmbeddingResult, HashingEmbedder};

#[cfg(feature = "onnx")]
pub use onnx_embedder::OnnxEmbedder;

use std::path::Path;
use std::sync::Arc;

/// Create the best available embedder producing `dim`-sized vectors.
///
/// Tries ONNX first (feature enabled, model files present, matching
/// dimension), otherwise falls back to feature hashing.
pub fn create_embedder(model_dir: &Path, dim: usize) -> Arc<dyn EmbedderBackend> {
    #[cfg(feature = "onnx")]
    {
        match OnnxEmbedder::load(model_dir) {
            Ok(embedder) if embedder.dimension() == dim => {
                tracing::info!("Using ONNX embedder (dim={})", dim);
                return Arc::new(embedder);
            }
            Ok(embedder) => {
                tracing::warn!(
                    "ONNX model produces {} dimensions but {} are configured. Using feature hashing.",
                    embedder.dimension(),
                    dim
                );
            }
            Err(e) => {
                tracing::warn!("ONNX embedder unavailable: {}. Using feature hashing.", e);
            }
        }
    }

    #[cfg(not(feature = "onnx"))]
    {
        let _ = model_dir;
        tracing::info!("ONNX feature disabled. Using feature-hashing embedder (dim={})", dim);
    }

    Arc::new(HashingEmbedder::new(dim))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_embedder_without_models() {
        let dir = tempfile::tempdir().unwrap();
        let embedder = create_embedder(dir.path(), 64);
        assert_eq!(embedder.dimension(), 64);
        assert!(embedder.is_available());
        assert_eq!(embedder.embed("hello world").unwrap().embedding.len(), 64);
    }
}
