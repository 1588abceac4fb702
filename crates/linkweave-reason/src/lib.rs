//! Linkweave Reason: cross-document entity linking and relation extraction
//! through an external LLM.
//!
//! The analyzer is optional. When no API key is configured nothing in this
//! crate is constructed and relationship queries use the graph alone.

pub mod analyzer;
pub mod config;
pub mod providers;
pub mod types;

pub use analyzer::{LlmAnalyzer, RelationAnalyzer};
pub use config::LlmConfig;
pub use types::*;
