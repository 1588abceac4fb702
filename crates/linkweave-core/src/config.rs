//! Configuration and data directory management.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::warn;

/// Paths to all linkweave data locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataPaths {
    /// Root data directory (e.g., `data/`).
    pub root: PathBuf,
    /// Vector index directory (`data/vectordb/`).
    pub vectordb: PathBuf,
    /// Relationship graph snapshot (`data/graph.json`).
    pub graph_file: PathBuf,
    /// Optional embedding model files (`data/models/`).
    pub models: PathBuf,
}

impl DataPaths {
    /// Create data paths from a root directory. Creates directories if needed.
    pub fn new(root: impl AsRef<Path>) -> std::io::Result<Self> {
        let root = root.as_ref().to_path_buf();
        let paths = Self {
            vectordb: root.join("vectordb"),
            graph_file: root.join("graph.json"),
            models: root.join("models"),
            root,
        };
        paths.ensure_dirs()?;
        Ok(paths)
    }

    fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.root)?;
        std::fs::create_dir_all(&self.vectordb)?;
        Ok(())
    }
}

/// Weights applied to the normalized vector and graph scores during fusion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FusionWeights {
    pub vector: f64,
    pub graph: f64,
}

impl Default for FusionWeights {
    fn default() -> Self {
        Self {
            vector: 0.7,
            graph: 0.3,
        }
    }
}

impl FusionWeights {
    /// Build weights, falling back to the defaults for any value that is
    /// negative or not finite.
    pub fn new(vector: f64, graph: f64) -> Self {
        let defaults = Self::default();
        let pick = |v: f64, fallback: f64| if v.is_finite() && v >= 0.0 { v } else { fallback };
        Self {
            vector: pick(vector, defaults.vector),
            graph: pick(graph, defaults.graph),
        }
    }
}

/// Top-level linkweave configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkweaveConfig {
    /// HTTP server port.
    pub port: u16,
    /// Data directory paths.
    pub data_paths: DataPaths,
    /// Embedding dimension (384 for all-MiniLM-L6-v2).
    pub embedding_dim: usize,
    /// How long a stats snapshot is served before recomputation.
    #[serde(with = "duration_secs")]
    pub stats_ttl: Duration,
    pub fusion: FusionWeights,
    /// Upper bound on entities kept per document.
    pub max_entities: usize,
}

impl LinkweaveConfig {
    /// Create configuration from environment and defaults.
    pub fn from_env(data_dir: impl AsRef<Path>) -> std::io::Result<Self> {
        let port = env_parse("PORT").unwrap_or(8000);
        let data_paths = DataPaths::new(data_dir)?;

        let defaults = FusionWeights::default();
        let fusion = FusionWeights::new(
            env_parse("LINKWEAVE_VECTOR_WEIGHT").unwrap_or(defaults.vector),
            env_parse("LINKWEAVE_GRAPH_WEIGHT").unwrap_or(defaults.graph),
        );

        Ok(Self {
            port,
            data_paths,
            embedding_dim: env_parse("LINKWEAVE_EMBEDDING_DIM").unwrap_or(384),
            stats_ttl: Duration::from_secs(env_parse("LINKWEAVE_STATS_TTL_SECS").unwrap_or(5)),
            fusion,
            max_entities: env_parse("LINKWEAVE_MAX_ENTITIES").unwrap_or(32),
        })
    }

    /// Configuration rooted at `data_dir` with defaults only, ignoring the environment.
    pub fn with_defaults(data_dir: impl AsRef<Path>) -> std::io::Result<Self> {
        Ok(Self {
            port: 8000,
            data_paths: DataPaths::new(data_dir)?,
            embedding_dim: 384,
            stats_ttl: Duration::from_secs(5),
            fusion: FusionWeights::default(),
            max_entities: 32,
        })
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!("Ignoring unparsable {}={:?}", key, raw);
            None
        }
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        Ok(Duration::from_secs_f64(secs.max(0.0)))
    }
}
