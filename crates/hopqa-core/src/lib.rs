//! hopqa core: error type, configuration, keyword taxonomy.

pub mod config;
pub mod error;
pub mod taxonomy;

pub use config::{CentralityConfig, DataPaths, EngineConfig, HopQaConfig, TraversalDirection};
pub use error::{Error, Result};
pub use taxonomy::Taxonomy;
