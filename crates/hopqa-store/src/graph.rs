//! In-memory petgraph projection of a graph snapshot.
//!
//! Relationships are projected as undirected weighted edges: centrality treats
//! `A -[FOUNDED]-> B` as a link both A and B draw importance through.

use std::collections::HashMap;

use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::{GraphSnapshot, MISSING_EDGE_WEIGHT};

/// Whole-graph structure metrics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphMetrics {
    pub node_count: usize,
    pub edge_count: usize,
    pub density: f64,
    pub connected_components: usize,
    pub avg_degree: f64,
}

/// Undirected weighted graph keyed by entity id.
pub struct GraphProjection {
    graph: UnGraph<String, f64>,
    node_index: HashMap<String, NodeIndex>,
}

impl GraphProjection {
    /// Build from a snapshot. Self-loops and edges with an endpoint outside
    /// the snapshot are dropped.
    pub fn from_snapshot(snapshot: &GraphSnapshot) -> Self {
        let mut graph = UnGraph::with_capacity(snapshot.nodes.len(), snapshot.edges.len());
        let mut node_index = HashMap::with_capacity(snapshot.nodes.len());

        for node in &snapshot.nodes {
            node_index
                .entry(node.id.clone())
                .or_insert_with(|| graph.add_node(node.id.clone()));
        }

        let mut dropped = 0;
        for edge in &snapshot.edges {
            let (Some(&s), Some(&t)) = (node_index.get(&edge.source_id), node_index.get(&edge.target_id))
            else {
                dropped += 1;
                continue;
            };
            if s == t {
                dropped += 1;
                continue;
            }
            let weight = edge.weight.unwrap_or(MISSING_EDGE_WEIGHT).max(0.0);
            graph.add_edge(s, t, weight);
        }
        if dropped > 0 {
            debug!("Projection dropped {} self-loop or dangling edges", dropped);
        }

        Self { graph, node_index }
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Entity id of the node at `index` (as returned by [`Self::weighted_neighbors`]).
    pub fn id(&self, index: usize) -> &str {
        &self.graph[NodeIndex::new(index)]
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.node_index.get(id).map(|i| i.index())
    }

    /// `(neighbor index, edge weight)` for every edge incident to `index`.
    pub fn weighted_neighbors(&self, index: usize) -> impl Iterator<Item = (usize, f64)> + '_ {
        let node = NodeIndex::new(index);
        self.graph.edges(node).map(move |e| {
            let other = if e.source() == node { e.target() } else { e.source() };
            (other.index(), *e.weight())
        })
    }

    pub fn metrics(&self) -> GraphMetrics {
        let n = self.node_count();
        let e = self.edge_count();
        let density = if n > 1 {
            (2.0 * e as f64) / (n as f64 * (n as f64 - 1.0))
        } else {
            0.0
        };
        let avg_degree = if n > 0 { 2.0 * e as f64 / n as f64 } else { 0.0 };

        GraphMetrics {
            node_count: n,
            edge_count: e,
            density,
            connected_components: petgraph::algo::connected_components(&self.graph),
            avg_degree,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Entity, Relationship};

    fn snapshot() -> GraphSnapshot {
        GraphSnapshot {
            nodes: vec![
                Entity::new("a", "A", "PERSON"),
                Entity::new("b", "B", "PERSON"),
                Entity::new("c", "C", "PERSON"),
                Entity::new("d", "D", "PERSON"),
            ],
            edges: vec![
                Relationship::new("a", "KNOWS", "b"),
                Relationship::new("b", "KNOWS", "c").with_weight(None),
                Relationship::new("c", "KNOWS", "c"),
                Relationship::new("c", "KNOWS", "ghost"),
            ],
        }
    }

    #[test]
    fn test_projection_drops_loops_and_dangling() {
        let p = GraphProjection::from_snapshot(&snapshot());
        assert_eq!(p.node_count(), 4);
        assert_eq!(p.edge_count(), 2);
    }

    #[test]
    fn test_metrics() {
        let m = GraphProjection::from_snapshot(&snapshot()).metrics();
        assert_eq!(m.node_count, 4);
        assert_eq!(m.edge_count, 2);
        // {a,b,c} and {d}
        assert_eq!(m.connected_components, 2);
        assert!((m.density - 2.0 * 2.0 / 12.0).abs() < 1e-12);
        assert!((m.avg_degree - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_weighted_neighbors_undirected() {
        let p = GraphProjection::from_snapshot(&snapshot());
        let b = p.index_of("b").unwrap();
        let mut neighbors: Vec<(String, f64)> = p
            .weighted_neighbors(b)
            .map(|(i, w)| (p.id(i).to_string(), w))
            .collect();
        neighbors.sort_by(|x, y| x.0.cmp(&y.0));
        assert_eq!(
            neighbors,
            vec![("a".to_string(), 1.0), ("c".to_string(), MISSING_EDGE_WEIGHT)]
        );
    }
}
