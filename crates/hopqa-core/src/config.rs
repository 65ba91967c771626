//! Configuration and data directory management.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::taxonomy::Taxonomy;

/// Paths to all hopqa data files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataPaths {
    /// Root data directory (e.g., `data/`).
    pub root: PathBuf,
    /// Graph database directory (`data/graphdb/`).
    pub graphdb: PathBuf,
    /// Engine tuning (`data/engine.json`).
    pub engine_file: PathBuf,
    /// Keyword taxonomy (`data/taxonomy.json`).
    pub taxonomy_file: PathBuf,
}

impl DataPaths {
    /// Create data paths from a root directory. Creates directories if needed.
    pub fn new(root: impl AsRef<Path>) -> std::io::Result<Self> {
        let root = root.as_ref().to_path_buf();
        let paths = Self {
            graphdb: root.join("graphdb"),
            engine_file: root.join("engine.json"),
            taxonomy_file: root.join("taxonomy.json"),
            root,
        };
        std::fs::create_dir_all(&paths.graphdb)?;
        Ok(paths)
    }
}

/// How traversal treats relationship direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TraversalDirection {
    /// Follow relationships from source to target only.
    Outgoing,
    /// Follow relationships either way; each hop records which way it went.
    #[default]
    Both,
}

/// PageRank parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CentralityConfig {
    pub damping: f64,
    pub max_iterations: usize,
    pub tolerance: f64,
    /// Scores below this are left out of the reported top-K.
    pub min_score: f64,
    pub top_k: usize,
}

impl Default for CentralityConfig {
    fn default() -> Self {
        Self {
            damping: 0.85,
            max_iterations: 100,
            tolerance: 1e-6,
            min_score: 1e-4,
            top_k: 20,
        }
    }
}

/// Query engine tuning (persisted to engine.json).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub default_max_hops: usize,
    pub default_result_limit: usize,
    /// Cap on paths returned by a single traversal call.
    pub per_call_limit: usize,
    pub query_timeout_ms: u64,
    /// Nodes a single query may expand across all of its traversals.
    pub max_nodes_visited: usize,
    pub max_candidates: usize,
    /// Entities scanned by the topical resolver pass.
    pub topical_scan_limit: usize,
    pub min_edge_weight: f64,
    pub max_edge_weight: f64,
    pub traversal_direction: TraversalDirection,
    pub retry_attempts: u32,
    pub retry_backoff_ms: u64,
    /// Periodic centrality recomputation; `None` disables it.
    pub centrality_refresh_secs: Option<u64>,
    pub centrality: CentralityConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_max_hops: 2,
            default_result_limit: 10,
            per_call_limit: 50,
            query_timeout_ms: 5000,
            max_nodes_visited: 20_000,
            max_candidates: 10,
            topical_scan_limit: 100,
            min_edge_weight: 0.0,
            max_edge_weight: 1.0,
            traversal_direction: TraversalDirection::Both,
            retry_attempts: 3,
            retry_backoff_ms: 25,
            centrality_refresh_secs: None,
            centrality: CentralityConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Load config from file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        let config = match std::fs::read_to_string(path) {
            Ok(s) => match serde_json::from_str::<EngineConfig>(&s) {
                Ok(c) => {
                    info!("Loaded engine config from {}", path.display());
                    c
                }
                Err(e) => {
                    warn!("Ignoring unparsable {}: {}", path.display(), e);
                    EngineConfig::default()
                }
            },
            Err(_) => EngineConfig::default(),
        };
        config.normalized()
    }

    /// Repair values that would make the engine misbehave.
    pub fn normalized(mut self) -> Self {
        self.default_max_hops = self.default_max_hops.clamp(1, 3);
        self.default_result_limit = self.default_result_limit.clamp(1, 100);
        self.per_call_limit = self.per_call_limit.max(1);
        self.max_candidates = self.max_candidates.max(1);
        if self.min_edge_weight > self.max_edge_weight {
            warn!(
                "min_edge_weight {} > max_edge_weight {}, swapping",
                self.min_edge_weight, self.max_edge_weight
            );
            std::mem::swap(&mut self.min_edge_weight, &mut self.max_edge_weight);
        }
        self
    }

    /// Edge weight bounds as a tuple.
    pub fn weight_bounds(&self) -> (f64, f64) {
        (self.min_edge_weight, self.max_edge_weight)
    }
}

/// Top-level hopqa configuration.
#[derive(Debug, Clone)]
pub struct HopQaConfig {
    /// HTTP server port.
    pub port: u16,
    /// Data directory paths.
    pub data_paths: DataPaths,
    pub engine: EngineConfig,
    pub taxonomy: Taxonomy,
}

impl HopQaConfig {
    /// Create configuration from environment and defaults.
    pub fn from_env(data_dir: impl AsRef<Path>) -> std::io::Result<Self> {
        let port = std::env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(3004);

        let data_paths = DataPaths::new(data_dir)?;
        let engine = EngineConfig::load(&data_paths.engine_file);
        let taxonomy = Taxonomy::load(&data_paths.taxonomy_file);

        Ok(Self {
            port,
            data_paths,
            engine,
            taxonomy,
        })
    }
}
