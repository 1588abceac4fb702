//! Entity extraction.
//!
//! Entities are the graph's link keys: two documents are related when they
//! share one. Extractors return normalized strings (see
//! [`linkweave_store::normalize_entity`]), deduplicated in first-seen order.

pub mod keywords;
pub mod stopwords;

pub use keywords::KeywordExtractor;

use linkweave_core::Result;

/// Text → ordered list of normalized entity strings.
pub trait EntityExtractor: Send + Sync {
    fn extract(&self, text: &str) -> Result<Vec<String>>;
}
