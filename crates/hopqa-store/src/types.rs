//! Data types for entities, relationships, traversal paths.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use hopqa_core::{Error, Result};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

/// Centrality assumed for a node that has never been scored.
pub const MISSING_CENTRALITY: f64 = 0.01;
/// Weight assumed for a relationship stored without one.
pub const MISSING_EDGE_WEIGHT: f64 = 0.5;

fn default_entity_type() -> String {
    "UNKNOWN".into()
}

fn default_confidence() -> f64 {
    1.0
}

/// A graph entity row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: String,
    pub canonical_name: String,
    #[serde(default = "default_entity_type")]
    pub entity_type: String,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub centrality_score: Option<f64>,
}

impl Entity {
    pub fn new(id: impl Into<String>, name: impl Into<String>, entity_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            canonical_name: name.into(),
            entity_type: entity_type.into(),
            confidence: 1.0,
            centrality_score: None,
        }
    }
}

/// A directed, typed relationship between two entities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    pub source_id: String,
    pub target_id: String,
    #[serde(rename = "type")]
    pub rel_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
}

impl Relationship {
    pub fn new(
        source_id: impl Into<String>,
        rel_type: impl Into<String>,
        target_id: impl Into<String>,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            target_id: target_id.into(),
            rel_type: rel_type.into(),
            weight: Some(1.0),
            confidence: 1.0,
        }
    }

    pub fn with_weight(mut self, weight: Option<f64>) -> Self {
        self.weight = weight;
        self
    }
}

/// Restricts a lookup to entities whose type tag is in a fixed set.
///
/// Tags are always sent to the database as bound parameters.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TypeFilter {
    #[default]
    Any,
    Tags(Vec<String>),
}

impl TypeFilter {
    pub fn tags<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tags: Vec<String> = tags.into_iter().map(|t| t.into().to_uppercase()).collect();
        if tags.is_empty() {
            Self::Any
        } else {
            Self::Tags(tags)
        }
    }

    /// Filter for a single optional type tag.
    pub fn from_type(entity_type: Option<&str>) -> Self {
        match entity_type {
            Some(t) if !t.trim().is_empty() => Self::tags([t.trim()]),
            _ => Self::Any,
        }
    }

    pub fn accepts(&self, entity_type: &str) -> bool {
        match self {
            Self::Any => true,
            Self::Tags(tags) => tags.iter().any(|t| t.eq_ignore_ascii_case(entity_type)),
        }
    }
}

/// Which way a hop crossed its relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HopDirection {
    /// Previous node is the relationship's source.
    Forward,
    /// Previous node is the relationship's target.
    Backward,
}

/// A node as seen along a traversal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathNode {
    pub id: String,
    pub name: String,
    pub entity_type: String,
    pub centrality_score: Option<f64>,
}

impl From<&Entity> for PathNode {
    fn from(e: &Entity) -> Self {
        Self {
            id: e.id.clone(),
            name: e.canonical_name.clone(),
            entity_type: e.entity_type.clone(),
            centrality_score: e.centrality_score,
        }
    }
}

/// One traversed relationship.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathHop {
    pub rel_type: String,
    pub direction: HopDirection,
    pub weight: Option<f64>,
}

/// A raw traversal record: `nodes.len() == hops.len() + 1` when well formed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraversalPath {
    pub nodes: Vec<PathNode>,
    pub hops: Vec<PathHop>,
}

/// Nodes and edges of a (possibly type-filtered) graph. Also the import format.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphSnapshot {
    #[serde(alias = "entities")]
    pub nodes: Vec<Entity>,
    #[serde(alias = "relationships", default)]
    pub edges: Vec<Relationship>,
}

/// Store-level statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreStats {
    pub total_entities: i64,
    pub total_relationships: i64,
    pub scored_entities: i64,
    pub db_path: String,
    pub db_size_mb: f64,
}

/// Limits shared by every traversal issued for one query.
#[derive(Debug, Clone)]
pub struct TraversalControl {
    visits: Arc<AtomicUsize>,
    max_visits: usize,
    cancel: CancellationToken,
    deadline: Option<Instant>,
    timeout: Duration,
}

impl TraversalControl {
    pub fn new(max_visits: usize, cancel: CancellationToken, timeout: Option<Duration>) -> Self {
        Self {
            visits: Arc::new(AtomicUsize::new(0)),
            max_visits,
            cancel,
            deadline: timeout.map(|t| Instant::now() + t),
            timeout: timeout.unwrap_or_default(),
        }
    }

    /// No budget, no deadline, never cancelled.
    pub fn unbounded() -> Self {
        Self::new(usize::MAX, CancellationToken::new(), None)
    }

    /// Fail fast if the query was cancelled or ran out of time.
    pub fn checkpoint(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return Err(Error::Timeout(self.timeout.as_millis() as u64));
            }
        }
        Ok(())
    }

    /// Account for expanding one node. Returns false once the budget is spent.
    pub fn try_visit(&self) -> bool {
        self.visits.fetch_add(1, Ordering::Relaxed) < self.max_visits
    }

    pub fn budget_exhausted(&self) -> bool {
        self.visits.load(Ordering::Relaxed) >= self.max_visits
    }

    /// Nodes expanded so far, capped at the budget.
    pub fn visited(&self) -> usize {
        self.visits.load(Ordering::Relaxed).min(self.max_visits)
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_filter_accepts() {
        let f = TypeFilter::tags(["organization", "ORG"]);
        assert!(f.accepts("ORGANIZATION"));
        assert!(f.accepts("org"));
        assert!(!f.accepts("PERSON"));
        assert!(TypeFilter::Any.accepts("anything"));
        assert_eq!(TypeFilter::tags(Vec::<String>::new()), TypeFilter::Any);
        assert_eq!(TypeFilter::from_type(Some("  ")), TypeFilter::Any);
    }

    #[test]
    fn test_visit_budget() {
        let control = TraversalControl::new(2, CancellationToken::new(), None);
        assert!(control.try_visit());
        assert!(control.try_visit());
        assert!(!control.try_visit());
        assert!(control.budget_exhausted());
        assert_eq!(control.visited(), 2);
    }

    #[test]
    fn test_checkpoint_cancelled() {
        let token = CancellationToken::new();
        let control = TraversalControl::new(10, token.clone(), None);
        assert!(control.checkpoint().is_ok());
        token.cancel();
        assert!(matches!(control.checkpoint(), Err(Error::Cancelled)));
    }

    #[test]
    fn test_checkpoint_deadline() {
        let control =
            TraversalControl::new(10, CancellationToken::new(), Some(Duration::from_millis(0)));
        assert!(matches!(control.checkpoint(), Err(Error::Timeout(0))));
    }

    #[test]
    fn test_snapshot_import_aliases() {
        let json = r#"{
            "entities": [{"id": "e1", "canonical_name": "Jimmy Carter", "entity_type": "PERSON"}],
            "relationships": [{"source_id": "e1", "target_id": "e2", "type": "FOUNDED"}]
        }"#;
        let snap: GraphSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(snap.nodes.len(), 1);
        assert_eq!(snap.nodes[0].confidence, 1.0);
        assert_eq!(snap.edges[0].rel_type, "FOUNDED");
        assert_eq!(snap.edges[0].weight, None);
    }
}
