//! Request and response types of the query engine.

use hopqa_core::{EngineConfig, Error, Result};
use hopqa_resolve::{AnswerResult, ExpectedType, QueryEntity};
use serde::{Deserialize, Serialize};

pub const MIN_HOPS: i64 = 1;
pub const MAX_HOPS: i64 = 3;
pub const MIN_RESULT_LIMIT: i64 = 1;
pub const MAX_RESULT_LIMIT: i64 = 100;

/// A question as submitted by a caller.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryRequest {
    pub query_text: String,
    #[serde(default)]
    pub max_hops: Option<i64>,
    #[serde(default)]
    pub result_limit: Option<i64>,
}

impl QueryRequest {
    pub fn new(query_text: impl Into<String>) -> Self {
        Self {
            query_text: query_text.into(),
            ..Default::default()
        }
    }

    pub fn with_max_hops(mut self, hops: i64) -> Self {
        self.max_hops = Some(hops);
        self
    }

    pub fn with_result_limit(mut self, limit: i64) -> Self {
        self.result_limit = Some(limit);
        self
    }

    /// Reject empty text; clamp out-of-range numbers to the nearest bound.
    pub fn resolve(&self, config: &EngineConfig) -> Result<QueryParams> {
        let query_text = self.query_text.trim();
        if query_text.is_empty() {
            return Err(Error::Validation("query_text must not be empty".into()));
        }
        let max_hops = self
            .max_hops
            .unwrap_or(config.default_max_hops as i64)
            .clamp(MIN_HOPS, MAX_HOPS) as usize;
        let result_limit = self
            .result_limit
            .unwrap_or(config.default_result_limit as i64)
            .clamp(MIN_RESULT_LIMIT, MAX_RESULT_LIMIT) as usize;
        Ok(QueryParams {
            query_text: query_text.to_string(),
            max_hops,
            result_limit,
        })
    }
}

/// Validated, clamped request parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryParams {
    pub query_text: String,
    pub max_hops: usize,
    pub result_limit: usize,
}

/// Engine answer for one query.
#[derive(Debug, Clone, Serialize)]
pub struct QueryResponse {
    pub answer: String,
    pub results: Vec<AnswerResult>,
    pub query_entities: Vec<QueryEntity>,
    pub paths_found: usize,
    pub total_paths_explored: usize,
    pub execution_time_seconds: f64,
    pub answer_confidence: f64,
    pub expected_type: ExpectedType,
    pub intent_confidence: f64,
    pub max_hops: usize,
    pub result_limit: usize,
    /// Nodes expanded across every traversal of the query.
    pub nodes_visited: usize,
    /// Exploration stopped early because the visit budget ran out.
    pub budget_exhausted: bool,
}
