//! Embedding backend trait and implementations.
//!
//! - `HashingEmbedder`: deterministic signed feature hashing over word tokens.
//! - `OnnxEmbedder`: all-MiniLM-L6-v2 (requires the `onnx` feature).
//! - `CachingEmbedder`: memoizes any backend through a [`QueryCache`].

use std::sync::Arc;

use ndarray::Array1;
use sha2::{Digest, Sha256};

use crate::cache::QueryCache;
use linkweave_core::{Error, Result};

/// Result of an embedding operation.
#[derive(Debug, Clone)]
pub struct EmbeddingResult {
    pub embedding: Array1<f32>,
    /// Whether this was served from cache.
    pub cached: bool,
}

/// Trait for embedding backends.
pub trait EmbedderBackend: Send + Sync {
    /// Embed one text. Blank text is `InvalidArgument`; backend failures are
    /// `UpstreamUnavailable`.
    fn embed(&self, text: &str) -> Result<EmbeddingResult>;

    fn embed_batch(&self, texts: &[&str]) -> Vec<Result<EmbeddingResult>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }

    fn dimension(&self) -> usize;

    fn is_available(&self) -> bool;
}

/// Reject empty or whitespace-only input.
pub fn require_text(text: &str) -> Result<()> {
    if text.trim().is_empty() {
        return Err(Error::InvalidArgument("text must not be empty".into()));
    }
    Ok(())
}

/// Lowercased alphanumeric word tokens.
fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
}

/// Signed feature hashing: each token adds ±1 to one of `dim` buckets chosen
/// by its SHA-256 digest, and the result is L2-normalized. Texts sharing
/// words get positive cosine similarity; disjoint texts are near-orthogonal.
pub struct HashingEmbedder {
    dim: usize,
}

impl HashingEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim: dim.max(1) }
    }

    fn bucket(&self, token: &str) -> (usize, f32) {
        let digest = Sha256::digest(token.as_bytes());
        let mut word = [0u8; 8];
        word.copy_from_slice(&digest[..8]);
        let index = (u64::from_le_bytes(word) % self.dim as u64) as usize;
        let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
        (index, sign)
    }
}

impl EmbedderBackend for HashingEmbedder {
    fn embed(&self, text: &str) -> Result<EmbeddingResult> {
        require_text(text)?;
        let mut embedding = Array1::<f32>::zeros(self.dim);
        for token in tokens(text) {
            let (index, sign) = self.bucket(&token);
            embedding[index] += sign;
        }
        let norm = embedding.dot(&embedding).sqrt();
        if norm > 1e-9 {
            embedding /= norm;
        }
        Ok(EmbeddingResult {
            embedding,
            cached: false,
        })
    }

    fn dimension(&self) -> usize {
        self.dim
    }

    fn is_available(&self) -> bool {
        true
    }
}

/// Serves repeated texts from a [`QueryCache`] before asking the backend.
pub struct CachingEmbedder {
    backend: Arc<dyn EmbedderBackend>,
    cache: QueryCache,
}

impl CachingEmbedder {
    pub fn new(backend: Arc<dyn EmbedderBackend>, cache: QueryCache) -> Self {
        Self { backend, cache }
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }
}

impl EmbedderBackend for CachingEmbedder {
    fn embed(&self, text: &str) -> Result<EmbeddingResult> {
        require_text(text)?;
        if let Some(embedding) = self.cache.get(text) {
            return Ok(EmbeddingResult {
                embedding,
                cached: true,
            });
        }
        let result = self.backend.embed(text)?;
        self.cache.put(text.to_string(), result.embedding.clone());
        Ok(result)
    }

    fn dimension(&self) -> usize {
        self.backend.dimension()
    }

    fn is_available(&self) -> bool {
        self.backend.is_available()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn cosine(a: &Array1<f32>, b: &Array1<f32>) -> f32 {
        a.dot(b)
    }

    #[test]
    fn test_hashing_is_deterministic_and_normalized() {
        let e = HashingEmbedder::new(384);
        let a = e.embed("Machine learning with Python").unwrap().embedding;
        let b = e.embed("machine LEARNING, with python!").unwrap().embedding;
        assert_eq!(a, b);
        assert!((a.dot(&a) - 1.0).abs() < 1e-5);
        assert_eq!(a.len(), 384);
    }

    #[test]
    fn test_shared_words_are_closer() {
        let e = HashingEmbedder::new(384);
        let query = e.embed("machine learning").unwrap().embedding;
        let related = e.embed("machine learning uses python").unwrap().embedding;
        let unrelated = e.embed("cooking recipes").unwrap().embedding;
        assert!(cosine(&query, &related) > cosine(&query, &unrelated));
        assert!(cosine(&query, &related) > 0.5);
    }

    #[test]
    fn test_blank_text_rejected() {
        let e = HashingEmbedder::new(16);
        assert!(matches!(e.embed(""), Err(Error::InvalidArgument(_))));
        assert!(matches!(e.embed("  \n\t"), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_batch() {
        let e = HashingEmbedder::new(16);
        let results = e.embed_batch(&["one", "", "two"]);
        assert!(results[0].is_ok());
        assert!(results[1].is_err());
        assert!(results[2].is_ok());
    }

    struct CountingEmbedder {
        inner: HashingEmbedder,
        calls: AtomicUsize,
    }

    impl EmbedderBackend for CountingEmbedder {
        fn embed(&self, text: &str) -> Result<EmbeddingResult> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.embed(text)
        }
        fn dimension(&self) -> usize {
            self.inner.dimension()
        }
        fn is_available(&self) -> bool {
            true
        }
    }

    #[test]
    fn test_caching_embedder_memoizes() {
        let backend = Arc::new(CountingEmbedder {
            inner: HashingEmbedder::new(32),
            calls: AtomicUsize::new(0),
        });
        let cached = CachingEmbedder::new(backend.clone(), QueryCache::new(8, Duration::from_secs(60)));

        let first = cached.embed("graph search").unwrap();
        let second = cached.embed("graph search").unwrap();
        assert!(!first.cached);
        assert!(second.cached);
        assert_eq!(first.embedding, second.embedding);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
        assert_eq!(cached.dimension(), 32);
    }
}
