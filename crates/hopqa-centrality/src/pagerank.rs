//! Power-iteration PageRank over an undirected weighted projection.
//!
//! Scores form a probability distribution: they sum to 1 over the projected
//! nodes. Mass held by nodes without weighted edges is spread uniformly.

use hopqa_store::GraphProjection;

/// Result of a PageRank run, indexed like the projection's nodes.
#[derive(Debug, Clone)]
pub struct PageRankOutcome {
    pub scores: Vec<f64>,
    pub converged: bool,
    pub iterations: usize,
    /// L1 change of the last iteration.
    pub residual: f64,
}

/// Iterate until the L1 change drops below `n * tolerance` or
/// `max_iterations` is reached. Non-convergence returns the last iterate.
pub fn weighted_pagerank(
    graph: &GraphProjection,
    damping: f64,
    max_iterations: usize,
    tolerance: f64,
) -> PageRankOutcome {
    let n = graph.node_count();
    if n == 0 {
        return PageRankOutcome {
            scores: Vec::new(),
            converged: true,
            iterations: 0,
            residual: 0.0,
        };
    }

    let nf = n as f64;
    let damping = damping.clamp(0.0, 1.0);
    let strength: Vec<f64> = (0..n)
        .map(|i| graph.weighted_neighbors(i).map(|(_, w)| w).sum())
        .collect();

    let mut rank = vec![1.0 / nf; n];
    let mut residual = f64::INFINITY;
    let mut iterations = 0;

    while iterations < max_iterations {
        iterations += 1;

        let dangling: f64 = (0..n).filter(|&i| strength[i] <= 0.0).map(|i| rank[i]).sum();
        let base = (1.0 - damping) / nf + damping * dangling / nf;
        let mut next = vec![base; n];

        for (i, &r) in rank.iter().enumerate() {
            if strength[i] <= 0.0 {
                continue;
            }
            let share = damping * r / strength[i];
            for (j, w) in graph.weighted_neighbors(i) {
                next[j] += share * w;
            }
        }

        residual = next.iter().zip(&rank).map(|(a, b)| (a - b).abs()).sum();
        rank = next;
        if residual < nf * tolerance {
            return PageRankOutcome {
                scores: rank,
                converged: true,
                iterations,
                residual,
            };
        }
    }

    PageRankOutcome {
        scores: rank,
        converged: false,
        iterations,
        residual,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hopqa_store::{Entity, GraphSnapshot, Relationship};

    fn projection(nodes: &[&str], edges: &[(&str, &str, Option<f64>)]) -> GraphProjection {
        GraphProjection::from_snapshot(&GraphSnapshot {
            nodes: nodes.iter().map(|id| Entity::new(*id, *id, "UNKNOWN")).collect(),
            edges: edges
                .iter()
                .map(|(s, t, w)| Relationship::new(*s, "LINKS", *t).with_weight(*w))
                .collect(),
        })
    }

    #[test]
    fn test_scores_sum_to_one() {
        let g = projection(
            &["a", "b", "c", "d", "e"],
            &[
                ("a", "b", Some(1.0)),
                ("b", "c", Some(0.5)),
                ("c", "a", Some(0.2)),
                ("c", "d", Some(0.9)),
                ("d", "e", None),
            ],
        );
        let out = weighted_pagerank(&g, 0.85, 100, 1e-6);
        assert!(out.converged);
        let sum: f64 = out.scores.iter().sum();
        assert!((sum - 1.0).abs() < 1e-6, "sum was {}", sum);
        assert!(out.scores.iter().all(|s| (0.0..=1.0).contains(s)));
    }

    #[test]
    fn test_star_center_ranks_highest() {
        let g = projection(
            &["hub", "x", "y", "z"],
            &[
                ("x", "hub", Some(1.0)),
                ("hub", "y", Some(1.0)),
                ("z", "hub", Some(1.0)),
            ],
        );
        let out = weighted_pagerank(&g, 0.85, 100, 1e-6);
        let hub = out.scores[g.index_of("hub").unwrap()];
        for leaf in ["x", "y", "z"] {
            assert!(hub > out.scores[g.index_of(leaf).unwrap()]);
        }
    }

    #[test]
    fn test_direction_is_ignored() {
        let forward = projection(&["a", "b"], &[("a", "b", Some(1.0))]);
        let out = weighted_pagerank(&forward, 0.85, 100, 1e-9);
        assert!((out.scores[0] - out.scores[1]).abs() < 1e-9);
    }

    #[test]
    fn test_isolated_nodes_share_uniformly() {
        let g = projection(&["a", "b", "c", "d"], &[]);
        let out = weighted_pagerank(&g, 0.85, 100, 1e-6);
        assert!(out.converged);
        for s in &out.scores {
            assert!((s - 0.25).abs() < 1e-12);
        }
    }

    #[test]
    fn test_heavier_edge_pulls_more_rank() {
        let g = projection(
            &["a", "heavy", "light"],
            &[("a", "heavy", Some(1.0)), ("a", "light", Some(0.1))],
        );
        let out = weighted_pagerank(&g, 0.85, 100, 1e-8);
        assert!(out.scores[g.index_of("heavy").unwrap()] > out.scores[g.index_of("light").unwrap()]);
    }

    #[test]
    fn test_non_convergence_returns_last_iterate() {
        let g = projection(
            &["a", "b", "c"],
            &[("a", "b", Some(1.0)), ("b", "c", Some(0.3))],
        );
        let out = weighted_pagerank(&g, 0.85, 1, 1e-12);
        assert!(!out.converged);
        assert_eq!(out.iterations, 1);
        assert_eq!(out.scores.len(), 3);
        let sum: f64 = out.scores.iter().sum();
        assert!((sum - 1.0).abs() < 1e-9);
    }
}
