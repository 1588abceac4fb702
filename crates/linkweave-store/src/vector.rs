//! Vector index boundary.

use ndarray::Array1;

use crate::types::{StoredDocument, VectorMatch, VectorRecord};
use linkweave_core::Result;

/// Nearest-neighbour store over `(id, embedding, text, metadata)` records.
///
/// Implementations report their own failures as `UpstreamUnavailable` and
/// missing ids as `NotFound`.
pub trait VectorIndex: Send + Sync {
    /// Insert or replace the record with `record.id`.
    fn upsert(&self, record: VectorRecord) -> Result<()>;

    /// Up to `top_k` records ordered by ascending distance.
    fn query(&self, embedding: &Array1<f32>, top_k: usize) -> Result<Vec<VectorMatch>>;

    fn get(&self, id: &str) -> Result<StoredDocument>;

    fn delete(&self, id: &str) -> Result<()>;

    fn count(&self) -> Result<usize>;

    /// Every stored id in first-insertion order.
    fn list_ids(&self) -> Result<Vec<String>>;
}
