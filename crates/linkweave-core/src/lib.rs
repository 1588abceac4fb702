//! linkweave core — error taxonomy, configuration, data directory layout.

pub mod config;
pub mod error;

pub use config::{DataPaths, FusionWeights, LinkweaveConfig};
pub use error::{Durability, Error, Result};
