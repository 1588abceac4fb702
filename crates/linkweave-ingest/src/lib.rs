//! Linkweave Ingest: entity extraction and the ingestion coordinator.

pub mod extract;
pub mod ingest;

pub use extract::{EntityExtractor, KeywordExtractor};
pub use ingest::{
    BatchIngestReport, BatchItemOutcome, DocumentInput, IngestReport, IngestStage, IngestStatus,
    Ingester,
};
