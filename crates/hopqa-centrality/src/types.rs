//! Centrality types.

use chrono::{DateTime, Utc};
use hopqa_core::CentralityConfig;
use hopqa_store::GraphMetrics;
use serde::{Deserialize, Serialize};

/// What to compute centrality over.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CentralityOptions {
    /// Restrict to entities of one type tag; `None` computes over the whole graph.
    #[serde(default)]
    pub entity_type: Option<String>,
    #[serde(default)]
    pub params: CentralityConfig,
}

impl CentralityOptions {
    pub fn for_type(entity_type: Option<String>, params: CentralityConfig) -> Self {
        Self { entity_type, params }
    }
}

/// One reported score.
#[derive(Debug, Clone, Serialize)]
pub struct NodeScore {
    #[serde(rename = "entityId")]
    pub entity_id: String,
    pub name: String,
    #[serde(rename = "entityType")]
    pub entity_type: String,
    pub score: f64,
}

/// Result of a centrality run.
#[derive(Debug, Clone, Serialize)]
pub struct CentralityReport {
    /// Top-K scores at or above the minimum threshold, highest first.
    pub scores: Vec<NodeScore>,
    #[serde(rename = "graphMetrics")]
    pub graph_metrics: GraphMetrics,
    pub converged: bool,
    pub iterations: usize,
    /// 1.0 when converged; otherwise how close the last iterate came to the tolerance.
    pub confidence: f64,
    #[serde(rename = "scoresWritten")]
    pub scores_written: usize,
    #[serde(rename = "entityType", skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<String>,
    #[serde(rename = "durationMs")]
    pub duration_ms: u64,
    #[serde(rename = "computedAt")]
    pub computed_at: DateTime<Utc>,
}
