//! Shared application state.

use std::sync::Arc;
use std::time::Instant;

use hopqa_centrality::CentralityReport;
use hopqa_core::{HopQaConfig, Result};
use hopqa_runtime::QueryEngine;
use hopqa_store::SqliteGraphStore;
use parking_lot::RwLock;

/// State accessible from all route handlers and background tasks.
pub struct AppState {
    pub config: HopQaConfig,
    pub store: Arc<SqliteGraphStore>,
    pub engine: QueryEngine,
    pub started_at: Instant,
    /// Most recent successful centrality run, from any trigger.
    pub last_centrality: RwLock<Option<CentralityReport>>,
}

impl AppState {
    /// Open the graph database under the configured data directory.
    pub fn open(config: HopQaConfig) -> Result<Self> {
        let store = SqliteGraphStore::open(&config.data_paths.graphdb, config.engine.weight_bounds())?;
        Ok(Self::new(config, Arc::new(store)))
    }

    pub fn new(config: HopQaConfig, store: Arc<SqliteGraphStore>) -> Self {
        let engine = QueryEngine::new(store.clone(), config.engine.clone(), config.taxonomy.clone());
        Self {
            config,
            store,
            engine,
            started_at: Instant::now(),
            last_centrality: RwLock::new(None),
        }
    }

    /// Recompute centrality and remember the report.
    pub async fn refresh_centrality(&self, entity_type: Option<String>) -> Result<CentralityReport> {
        let report = self.engine.recompute_centrality(entity_type).await?;
        *self.last_centrality.write() = Some(report.clone());
        Ok(report)
    }
}
