//! QueryEngine: drives one question through every stage.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use hopqa_centrality::{CentralityCalculator, CentralityOptions, CentralityReport};
use hopqa_core::{EngineConfig, Error, Result, Taxonomy};
use hopqa_resolve::{
    AnswerResult, AnswerSynthesizer, Candidate, EntityResolver, IntentAnalysis, IntentAnalyzer,
    PathBatch, PathFinder, QueryEntity, Ranker,
};
use hopqa_store::{GraphStore, TraversalControl};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::retry::{blocking, RetryPolicy};
use crate::types::*;

/// Multi-hop question answering over a [`GraphStore`].
pub struct QueryEngine {
    store: Arc<dyn GraphStore>,
    config: EngineConfig,
    taxonomy: Arc<Taxonomy>,
    analyzer: Arc<IntentAnalyzer>,
    retry: RetryPolicy,
}

impl QueryEngine {
    pub fn new(store: Arc<dyn GraphStore>, config: EngineConfig, taxonomy: Taxonomy) -> Self {
        let config = config.normalized();
        let taxonomy = Arc::new(taxonomy);
        let retry = RetryPolicy::from_config(&config);
        info!(
            "Query engine ready: timeout={}ms, visit budget={}, direction={:?}",
            config.query_timeout_ms, config.max_nodes_visited, config.traversal_direction
        );
        Self {
            store,
            analyzer: Arc::new(IntentAnalyzer::new(taxonomy.clone())),
            taxonomy,
            config,
            retry,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub async fn query(&self, request: QueryRequest) -> Result<QueryResponse> {
        self.query_with_cancel(request, CancellationToken::new()).await
    }

    /// Answer `request`, aborting when `cancel` fires or the timeout elapses.
    pub async fn query_with_cancel(
        &self,
        request: QueryRequest,
        cancel: CancellationToken,
    ) -> Result<QueryResponse> {
        let params = request.resolve(&self.config)?;
        let started = Instant::now();
        let timeout = Duration::from_millis(self.config.query_timeout_ms.max(1));
        let control = TraversalControl::new(
            self.config.max_nodes_visited,
            cancel.child_token(),
            Some(timeout),
        );

        info!(
            "Query: {:?} (max_hops={}, limit={})",
            params.query_text, params.max_hops, params.result_limit
        );

        let run = async {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(Error::Cancelled),
                r = self.execute(&params, &control) => r,
            }
        };
        let result = match tokio::time::timeout(timeout, run).await {
            Ok(r) => r,
            Err(_) => Err(Error::Timeout(self.config.query_timeout_ms)),
        };

        match result {
            Ok(mut response) => {
                response.execution_time_seconds = started.elapsed().as_secs_f64();
                info!(
                    "Query answered: {} results, {} paths ({} explored) in {:.3}s",
                    response.results.len(),
                    response.paths_found,
                    response.total_paths_explored,
                    response.execution_time_seconds
                );
                Ok(response)
            }
            Err(e) => {
                // Stop any traversal still running on the blocking pool.
                control.cancel_token().cancel();
                warn!("Query failed after {:?}: {}", started.elapsed(), e);
                Err(e)
            }
        }
    }

    async fn execute(&self, params: &QueryParams, control: &TraversalControl) -> Result<QueryResponse> {
        let intent = self.analyzer.analyze(&params.query_text);
        debug!(
            "Expected answer type {} (confidence {:.2})",
            intent.expected_type, intent.confidence
        );

        let candidates = self.resolve_entities(&params.query_text, &intent, control).await?;
        if candidates.is_empty() {
            info!("No graph entities matched the query");
            return Ok(self.respond(params, &intent, &candidates, PathBatch::default(), Vec::new(), control));
        }

        let collected = self.explore(&candidates, params, control).await?;

        let results = {
            let store = self.store.clone();
            let paths = collected.paths.clone();
            let intent = intent.clone();
            let query = params.query_text.clone();
            let limit = params.result_limit;
            blocking(move || Ranker::new(store.as_ref()).rank(&paths, &intent, &query, limit)).await?
        };

        Ok(self.respond(params, &intent, &candidates, collected, results, control))
    }

    async fn resolve_entities(
        &self,
        query: &str,
        intent: &IntentAnalysis,
        control: &TraversalControl,
    ) -> Result<Vec<Candidate>> {
        let max_candidates = self.config.max_candidates;
        let scan_limit = self.config.topical_scan_limit;
        self.retry
            .run("entity resolution", || {
                let store = self.store.clone();
                let taxonomy = self.taxonomy.clone();
                let query = query.to_string();
                let intent = intent.clone();
                let control = control.clone();
                blocking(move || {
                    EntityResolver::new(store.as_ref(), &taxonomy, max_candidates, scan_limit)
                        .with_control(&control)
                        .resolve(&query, &intent)
                })
            })
            .await
    }

    /// Depth-by-depth search, one blocking worker per candidate at each depth.
    async fn explore(
        &self,
        candidates: &[Candidate],
        params: &QueryParams,
        control: &TraversalControl,
    ) -> Result<PathBatch> {
        let target = params.result_limit * 2;
        let mut collected = PathBatch::default();

        for depth in 1..=params.max_hops {
            if collected.paths.len() >= target {
                debug!("Collected {} paths, skipping depth {}", collected.paths.len(), depth);
                break;
            }
            control.checkpoint()?;

            let workers = candidates
                .iter()
                .map(|c| self.paths_from(c.clone(), depth, control.clone()));
            let outcomes = join_all(workers).await;

            for (candidate, outcome) in candidates.iter().zip(outcomes) {
                match outcome {
                    Ok(batch) => collected.merge(batch),
                    Err(e @ (Error::Cancelled | Error::Timeout(_))) => return Err(e),
                    Err(e) => warn!(
                        "Path search from {} at depth {} failed: {}",
                        candidate.entity_id, depth, e
                    ),
                }
            }

            if control.budget_exhausted() {
                warn!(
                    "Visit budget of {} nodes exhausted at depth {}; ranking {} paths",
                    self.config.max_nodes_visited,
                    depth,
                    collected.paths.len()
                );
                break;
            }
        }
        Ok(collected)
    }

    async fn paths_from(
        &self,
        candidate: Candidate,
        depth: usize,
        control: TraversalControl,
    ) -> Result<PathBatch> {
        let per_call_limit = self.config.per_call_limit;
        let direction = self.config.traversal_direction;
        self.retry
            .run("path search", || {
                let store = self.store.clone();
                let candidate = candidate.clone();
                let control = control.clone();
                blocking(move || {
                    PathFinder::new(store.as_ref(), per_call_limit, direction).find_paths(
                        std::slice::from_ref(&candidate),
                        depth,
                        &control,
                    )
                })
            })
            .await
    }

    fn respond(
        &self,
        params: &QueryParams,
        intent: &IntentAnalysis,
        candidates: &[Candidate],
        collected: PathBatch,
        results: Vec<AnswerResult>,
        control: &TraversalControl,
    ) -> QueryResponse {
        let synthesis = AnswerSynthesizer::synthesize(&params.query_text, &results);
        QueryResponse {
            answer: synthesis.answer,
            query_entities: candidates.iter().map(QueryEntity::from).collect(),
            paths_found: collected.paths.len(),
            total_paths_explored: collected.explored,
            execution_time_seconds: 0.0,
            answer_confidence: synthesis.confidence,
            expected_type: intent.expected_type,
            intent_confidence: intent.confidence,
            max_hops: params.max_hops,
            result_limit: params.result_limit,
            nodes_visited: control.visited(),
            budget_exhausted: control.budget_exhausted(),
            results,
        }
    }

    /// Recompute and persist centrality, optionally for one entity type.
    pub async fn recompute_centrality(&self, entity_type: Option<String>) -> Result<CentralityReport> {
        let options = CentralityOptions::for_type(entity_type, self.config.centrality.clone());
        self.retry
            .run("centrality", || {
                let store = self.store.clone();
                let options = options.clone();
                blocking(move || CentralityCalculator::run(store.as_ref(), &options))
            })
            .await
    }
}
