//! Record types exchanged with the vector index.

use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// Free-form document metadata, stored as a JSON object.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// A record to write into the vector index.
#[derive(Debug, Clone)]
pub struct VectorRecord {
    pub id: String,
    pub embedding: Array1<f32>,
    pub text: String,
    pub metadata: Metadata,
}

/// One nearest-neighbour hit. `distance` is normalized to [0, 1].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorMatch {
    pub id: String,
    pub text: String,
    pub metadata: Metadata,
    pub distance: f64,
}

impl VectorMatch {
    /// `1 - distance`; higher is more similar.
    pub fn similarity(&self) -> f64 {
        1.0 - self.distance
    }
}

/// A stored document as returned by [`crate::VectorIndex::get`].
#[derive(Debug, Clone, Serialize)]
pub struct StoredDocument {
    pub id: String,
    pub text: String,
    pub metadata: Metadata,
    #[serde(skip)]
    pub embedding: Array1<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
    pub created_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
}
