//! Centrality run: snapshot → PageRank → metrics → score overwrite.

use hopqa_core::{Error, Result};
use hopqa_store::{GraphProjection, GraphStore, TypeFilter};
use tracing::{info, warn};

use crate::pagerank::weighted_pagerank;
use crate::types::*;

/// Batch centrality calculator.
pub struct CentralityCalculator;

impl CentralityCalculator {
    /// Compute and persist centrality for the filtered subset (or the whole graph).
    ///
    /// Stored scores of every entity in the subset are replaced, including
    /// entities that no longer appear in any relationship.
    pub fn run(store: &dyn GraphStore, options: &CentralityOptions) -> Result<CentralityReport> {
        let start = std::time::Instant::now();
        let params = &options.params;
        let filter = TypeFilter::from_type(options.entity_type.as_deref());

        let snapshot = store.snapshot(&filter)?;
        if snapshot.nodes.is_empty() {
            return Err(Error::GraphEmpty(match &options.entity_type {
                Some(t) => format!("no entities of type {}", t),
                None => "no entities in graph".into(),
            }));
        }

        info!(
            "Computing centrality over {} nodes, {} edges (type: {:?})",
            snapshot.nodes.len(),
            snapshot.edges.len(),
            options.entity_type
        );

        let projection = GraphProjection::from_snapshot(&snapshot);
        let graph_metrics = projection.metrics();
        let outcome = weighted_pagerank(
            &projection,
            params.damping,
            params.max_iterations,
            params.tolerance,
        );

        let confidence = if outcome.converged {
            1.0
        } else {
            warn!(
                "PageRank did not converge after {} iterations (residual {:.3e}); keeping approximate scores",
                outcome.iterations, outcome.residual
            );
            let target = projection.node_count() as f64 * params.tolerance;
            if outcome.residual > 0.0 {
                (target / outcome.residual).clamp(0.0, 1.0)
            } else {
                1.0
            }
        };

        let all_scores: Vec<(String, f64)> = outcome
            .scores
            .iter()
            .enumerate()
            .map(|(i, s)| (projection.id(i).to_string(), *s))
            .collect();
        let scores_written = store.replace_scores(&filter, &all_scores)?;

        let mut scores: Vec<NodeScore> = snapshot
            .nodes
            .iter()
            .filter_map(|node| {
                let score = outcome.scores[projection.index_of(&node.id)?];
                (score >= params.min_score).then(|| NodeScore {
                    entity_id: node.id.clone(),
                    name: node.canonical_name.clone(),
                    entity_type: node.entity_type.clone(),
                    score,
                })
            })
            .collect();
        scores.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.entity_id.cmp(&b.entity_id))
        });
        scores.truncate(params.top_k);

        let duration_ms = start.elapsed().as_millis() as u64;
        info!(
            "Centrality complete: nodes={}, components={}, iterations={}, converged={}, written={}, duration={}ms",
            graph_metrics.node_count,
            graph_metrics.connected_components,
            outcome.iterations,
            outcome.converged,
            scores_written,
            duration_ms
        );

        Ok(CentralityReport {
            scores,
            graph_metrics,
            converged: outcome.converged,
            iterations: outcome.iterations,
            confidence,
            scores_written,
            entity_type: options.entity_type.clone(),
            duration_ms,
            computed_at: chrono::Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hopqa_core::CentralityConfig;
    use hopqa_store::{Entity, GraphSnapshot, Relationship, SqliteGraphStore};

    fn test_store() -> (SqliteGraphStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteGraphStore::open(dir.path(), (0.0, 1.0)).unwrap();
        (store, dir)
    }

    fn seeded_store() -> (SqliteGraphStore, tempfile::TempDir) {
        let (store, dir) = test_store();
        store
            .import_graph(&GraphSnapshot {
                nodes: vec![
                    Entity::new("carter", "Jimmy Carter", "PERSON"),
                    Entity::new("center", "Carter Center", "ORGANIZATION"),
                    Entity::new("atlanta", "Atlanta", "LOCATION"),
                    Entity::new("rosalynn", "Rosalynn Carter", "PERSON"),
                ],
                edges: vec![
                    Relationship::new("carter", "FOUNDED", "center"),
                    Relationship::new("rosalynn", "FOUNDED", "center"),
                    Relationship::new("center", "LOCATED_IN", "atlanta"),
                    Relationship::new("carter", "MARRIED_TO", "rosalynn"),
                ],
            })
            .unwrap();
        (store, dir)
    }

    #[test]
    fn test_empty_graph_is_an_error() {
        let (store, _dir) = test_store();
        let err = CentralityCalculator::run(&store, &CentralityOptions::default()).unwrap_err();
        assert!(matches!(err, Error::GraphEmpty(_)));
        assert_eq!(err.code(), "GRAPH_EMPTY");
    }

    #[test]
    fn test_empty_type_subset_is_an_error() {
        let (store, _dir) = seeded_store();
        let options = CentralityOptions::for_type(Some("EVENT".into()), CentralityConfig::default());
        assert!(matches!(
            CentralityCalculator::run(&store, &options),
            Err(Error::GraphEmpty(_))
        ));
    }

    #[test]
    fn test_run_writes_normalized_scores() {
        let (store, _dir) = seeded_store();
        let report = CentralityCalculator::run(&store, &CentralityOptions::default()).unwrap();
        assert!(report.converged);
        assert_eq!(report.confidence, 1.0);
        assert_eq!(report.scores_written, 4);
        assert_eq!(report.graph_metrics.node_count, 4);
        assert_eq!(report.graph_metrics.edge_count, 4);
        assert_eq!(report.graph_metrics.connected_components, 1);

        let snap = store.snapshot(&TypeFilter::Any).unwrap();
        let total: f64 = snap.nodes.iter().map(|n| n.centrality_score.unwrap()).sum();
        assert!((total - 1.0).abs() < 1e-6);

        // The center has the most connections
        assert_eq!(report.scores[0].entity_id, "center");
    }

    #[test]
    fn test_filtered_run_only_touches_subset() {
        let (store, _dir) = seeded_store();
        CentralityCalculator::run(&store, &CentralityOptions::default()).unwrap();
        let center_before = store.get_entity("center").unwrap().unwrap().centrality_score;

        let options = CentralityOptions::for_type(Some("person".into()), CentralityConfig::default());
        let report = CentralityCalculator::run(&store, &options).unwrap();
        assert_eq!(report.graph_metrics.node_count, 2);
        assert_eq!(report.graph_metrics.edge_count, 1);
        assert_eq!(report.scores_written, 2);

        let carter = store.get_entity("carter").unwrap().unwrap().centrality_score.unwrap();
        assert!((carter - 0.5).abs() < 1e-6);
        assert_eq!(
            store.get_entity("center").unwrap().unwrap().centrality_score,
            center_before
        );
    }

    #[test]
    fn test_min_score_and_top_k() {
        let (store, _dir) = seeded_store();
        let params = CentralityConfig {
            top_k: 2,
            ..Default::default()
        };
        let report = CentralityCalculator::run(&store, &CentralityOptions::for_type(None, params)).unwrap();
        assert_eq!(report.scores.len(), 2);
        assert!(report.scores[0].score >= report.scores[1].score);

        let params = CentralityConfig {
            min_score: 0.99,
            ..Default::default()
        };
        let report = CentralityCalculator::run(&store, &CentralityOptions::for_type(None, params)).unwrap();
        assert!(report.scores.is_empty());
        // Filtering the report never filters what is persisted
        assert_eq!(report.scores_written, 4);
    }

    #[test]
    fn test_non_convergence_is_degraded_not_fatal() {
        let (store, _dir) = seeded_store();
        let params = CentralityConfig {
            max_iterations: 1,
            tolerance: 1e-15,
            ..Default::default()
        };
        let report = CentralityCalculator::run(&store, &CentralityOptions::for_type(None, params)).unwrap();
        assert!(!report.converged);
        assert!(report.confidence < 1.0);
        assert_eq!(report.scores_written, 4);
    }
}
