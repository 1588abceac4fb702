//! Error types for linkweave.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Empty or malformed identifiers, out-of-range depths, blank queries.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// An external collaborator (embedder, vector index, extractor, LLM) failed.
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// Graph snapshot could not be written or read.
    #[error("Persistence failure: {0}")]
    Persistence(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Stable machine-readable kind, used by the HTTP layer and in reports.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidArgument(_) => "invalid_argument",
            Self::NotFound(_) => "not_found",
            Self::UpstreamUnavailable(_) => "upstream_unavailable",
            Self::Persistence(_) => "persistence_failure",
            Self::Io(_) | Self::Json(_) | Self::Internal(_) => "internal",
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Whether a graph mutation reached durable storage.
///
/// A failed save never rolls back the in-memory mutation; the store keeps
/// serving and the next successful save catches up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Durability {
    Persisted,
    InMemoryOnly { reason: String },
}

impl Durability {
    pub fn is_persisted(&self) -> bool {
        matches!(self, Self::Persisted)
    }
}

impl From<Result<()>> for Durability {
    fn from(result: Result<()>) -> Self {
        match result {
            Ok(()) => Self::Persisted,
            Err(e) => Self::InMemoryOnly {
                reason: e.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(Error::InvalidArgument("x".into()).kind(), "invalid_argument");
        assert_eq!(Error::NotFound("x".into()).kind(), "not_found");
        assert_eq!(Error::UpstreamUnavailable("x".into()).kind(), "upstream_unavailable");
        assert_eq!(Error::Persistence("x".into()).kind(), "persistence_failure");
    }

    #[test]
    fn test_durability_from_result() {
        assert_eq!(Durability::from(Ok(())), Durability::Persisted);
        let degraded = Durability::from(Err(Error::Persistence("disk full".into())));
        assert!(!degraded.is_persisted());
        let json = serde_json::to_value(&degraded).unwrap();
        assert_eq!(json["state"], "in_memory_only");
        assert!(json["reason"].as_str().unwrap().contains("disk full"));
    }
}
