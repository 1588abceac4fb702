//! Runtime — the explicitly constructed [`Engine`] that owns every store and
//! collaborator, plus the stats cache.

pub mod engine;
pub mod stats;
pub mod types;

pub use engine::Engine;
pub use stats::{ServiceStatus, StatsCache, StatsSnapshot};
pub use types::*;
