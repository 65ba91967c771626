//! Fixed-depth path discovery from candidate entities.

use std::collections::HashSet;

use hopqa_core::{Error, Result, TraversalDirection};
use hopqa_store::{GraphStore, TraversalControl, TraversalPath, MISSING_CENTRALITY, MISSING_EDGE_WEIGHT};
use tracing::{debug, warn};

use crate::types::{Candidate, Path};

/// Paths found for one or more candidates at a given depth.
#[derive(Debug, Default)]
pub struct PathBatch {
    pub paths: Vec<Path>,
    /// Raw records returned by the store, valid or not.
    pub explored: usize,
    pub skipped: usize,
}

impl PathBatch {
    pub fn merge(&mut self, other: PathBatch) {
        self.paths.extend(other.paths);
        self.explored += other.explored;
        self.skipped += other.skipped;
    }
}

pub struct PathFinder<'a> {
    store: &'a dyn GraphStore,
    per_call_limit: usize,
    direction: TraversalDirection,
}

impl<'a> PathFinder<'a> {
    pub fn new(store: &'a dyn GraphStore, per_call_limit: usize, direction: TraversalDirection) -> Self {
        Self {
            store,
            per_call_limit: per_call_limit.max(1),
            direction,
        }
    }

    /// Paths of exactly `hop_count` relationships from each candidate.
    ///
    /// A candidate whose traversal fails with a non-fatal error is skipped.
    /// Cancellation, timeouts and transient store errors propagate.
    pub fn find_paths(
        &self,
        candidates: &[Candidate],
        hop_count: usize,
        control: &TraversalControl,
    ) -> Result<PathBatch> {
        let mut batch = PathBatch::default();
        if hop_count == 0 {
            return Ok(batch);
        }

        for candidate in candidates {
            control.checkpoint()?;
            let records = match self.store.traverse(
                &candidate.entity_id,
                hop_count,
                self.per_call_limit,
                self.direction,
                control,
            ) {
                Ok(records) => records,
                Err(e @ (Error::Cancelled | Error::Timeout(_))) => return Err(e),
                Err(e) if e.is_transient() => return Err(e),
                Err(e) => {
                    warn!("Traversal from {} failed, skipping: {}", candidate.entity_id, e);
                    continue;
                }
            };

            batch.explored += records.len();
            for record in records {
                match to_path(record, hop_count) {
                    Some(path) => batch.paths.push(path),
                    None => {
                        batch.skipped += 1;
                        warn!("Skipping malformed path record from {}", candidate.entity_id);
                    }
                }
            }
        }

        debug!(
            "Depth {}: {} paths from {} candidates ({} skipped)",
            hop_count,
            batch.paths.len(),
            candidates.len(),
            batch.skipped
        );
        Ok(batch)
    }
}

/// Validate a raw record and attach its raw score.
fn to_path(record: TraversalPath, hop_count: usize) -> Option<Path> {
    if record.hops.len() != hop_count || record.nodes.len() != hop_count + 1 {
        return None;
    }
    if record.nodes.iter().any(|n| n.id.is_empty() || n.name.trim().is_empty()) {
        return None;
    }
    let distinct: HashSet<&str> = record.nodes.iter().map(|n| n.id.as_str()).collect();
    if distinct.len() != record.nodes.len() {
        return None;
    }

    let raw_score = raw_score(&record);
    Some(Path {
        nodes: record.nodes,
        hops: record.hops,
        raw_score,
    })
}

/// Endpoint centralities times edge weights, with defaults for missing values.
pub fn raw_score(record: &TraversalPath) -> f64 {
    let centrality = |i: usize| {
        record.nodes[i]
            .centrality_score
            .unwrap_or(MISSING_CENTRALITY)
    };
    let mut score = centrality(0) * centrality(record.nodes.len() - 1);
    for hop in &record.hops {
        score *= hop.weight.unwrap_or(MISSING_EDGE_WEIGHT);
    }
    score.clamp(0.0, 1.0)
}
