//! hopqa store: entity/relationship graph in SQLite, bounded traversal,
//! petgraph projection for whole-graph algorithms.

pub mod backend;
pub mod graph;
pub mod schema;
pub mod sqlite;
pub mod types;

pub use backend::GraphStore;
pub use graph::{GraphMetrics, GraphProjection};
pub use sqlite::SqliteGraphStore;
pub use types::*;
