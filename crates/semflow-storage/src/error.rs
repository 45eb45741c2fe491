//! Storage error types for semflow-storage.

use semflow_core::{CompositionId, CoreError, FunctionId};
use thiserror::Error;

/// Errors produced by storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// JSON serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Applying the schema migrations failed.
    #[error("migration error: {0}")]
    Migration(String),

    /// A graph with the given ID was not found.
    #[error("graph not found: {0}")]
    GraphNotFound(i64),

    /// No stored graph carries the given name.
    #[error("no graph named '{0}'")]
    GraphNameNotFound(String),

    #[error("function not found: graph={graph}, function={function}")]
    FunctionNotFound { graph: i64, function: FunctionId },

    #[error("composition not found: graph={graph}, composition={composition}")]
    CompositionNotFound { graph: i64, composition: CompositionId },

    /// Stored rows do not reassemble into a valid graph.
    #[error("reconstruction error: {reason}")]
    ReconstructionError { reason: String },
}

impl From<CoreError> for StorageError {
    fn from(err: CoreError) -> Self {
        StorageError::ReconstructionError {
            reason: err.to_string(),
        }
    }
}
