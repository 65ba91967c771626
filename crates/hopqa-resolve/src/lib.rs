//! Query-answering stages over the entity graph.
//!
//! Each stage is synchronous and store-bound; the runtime crate decides how
//! they are scheduled. Flow: intent + entity resolution → path finding per
//! hop depth → ranking → templated answer.

pub mod entities;
pub mod intent;
pub mod paths;
pub mod ranker;
pub mod synth;
pub mod types;

pub use entities::EntityResolver;
pub use intent::IntentAnalyzer;
pub use paths::{PathBatch, PathFinder};
pub use ranker::Ranker;
pub use synth::{AnswerSynthesizer, AnswerTemplate, Synthesis, NO_ANSWER};
pub use types::*;
