//! Centrality calculator: batch PageRank over the entity graph.
//!
//! Runs outside request handling: it snapshots the (optionally type-filtered)
//! graph, computes weighted PageRank, and overwrites the stored scores of that
//! subset in one transaction.

pub mod pagerank;
pub mod pipeline;
pub mod types;

pub use pagerank::{weighted_pagerank, PageRankOutcome};
pub use pipeline::CentralityCalculator;
pub use types::*;
