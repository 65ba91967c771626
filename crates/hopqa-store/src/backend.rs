//! The graph store contract the query engine depends on.

use hopqa_core::{Result, TraversalDirection};

use crate::types::*;

/// Read/score-write access to an entity/relationship graph.
///
/// Implementations must be safe to call from several threads at once; the
/// engine fans traversals out across blocking workers.
pub trait GraphStore: Send + Sync {
    fn get_entity(&self, id: &str) -> Result<Option<Entity>>;

    /// Case-insensitive exact name lookup. Entities sharing a name are all returned.
    fn get_by_exact_name(&self, name: &str, filter: &TypeFilter) -> Result<Vec<Entity>>;

    /// Entities whose name contains `fragment` and is at most twice its length.
    fn get_by_substring(&self, fragment: &str, filter: &TypeFilter, limit: usize)
        -> Result<Vec<Entity>>;

    /// Up to `limit` entities, most central first.
    fn scan_entities(&self, limit: usize) -> Result<Vec<Entity>>;

    /// All entities whose canonical name is in `names`, in one round trip.
    fn bulk_get_by_name(&self, names: &[String]) -> Result<Vec<Entity>>;

    /// Paths of exactly `hop_depth` relationships starting at `start_id`, with
    /// pairwise distinct nodes, at most `limit` of them.
    fn traverse(
        &self,
        start_id: &str,
        hop_depth: usize,
        limit: usize,
        direction: TraversalDirection,
        control: &TraversalControl,
    ) -> Result<Vec<TraversalPath>>;

    /// Entities accepted by `filter` and the relationships among them.
    fn snapshot(&self, filter: &TypeFilter) -> Result<GraphSnapshot>;

    fn write_score(&self, entity_id: &str, score: f64) -> Result<()>;

    /// Reset centrality of every entity accepted by `filter`. Returns rows touched.
    fn clear_scores(&self, filter: &TypeFilter) -> Result<usize>;

    /// Clear the filtered subset and write `scores` as one atomic unit.
    fn replace_scores(&self, filter: &TypeFilter, scores: &[(String, f64)]) -> Result<usize>;
}
