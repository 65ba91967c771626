//! Error types for hopqa.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Database error: {0}")]
    Database(String),

    /// Transient store contention (e.g. SQLite busy/locked). Safe to retry.
    #[error("Store busy: {0}")]
    Busy(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Graph is empty: {0}")]
    GraphEmpty(String),

    #[error("Query timed out after {0}ms")]
    Timeout(u64),

    #[error("Query cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Stable machine-readable code surfaced in API responses.
    pub fn code(&self) -> &'static str {
        match self {
            Self::GraphEmpty(_) => "GRAPH_EMPTY",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Config(_) => "CONFIGURATION_ERROR",
            Self::Timeout(_) => "QUERY_TIMEOUT",
            Self::Cancelled => "QUERY_CANCELLED",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Storage(_) | Self::Database(_) | Self::Busy(_) => "STORE_ERROR",
            Self::Io(_) | Self::Json(_) | Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether a retry has a chance of succeeding.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Busy(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
