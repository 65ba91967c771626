//! Runtime query engine.
//!
//! Wraps the synchronous resolve stages with request validation, per-candidate
//! fan-out on blocking workers, a wall-clock timeout, a shared visit budget,
//! caller cancellation and bounded retries for transient store errors.

pub mod engine;
pub mod retry;
pub mod types;

pub use engine::QueryEngine;
pub use retry::RetryPolicy;
pub use types::*;
