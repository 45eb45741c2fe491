//! Core error types for semflow-core.
//!
//! Uses `thiserror` for structured, matchable variants covering the
//! construction-time failures of the knowledge graph. Execution-time failures
//! live in `semflow-engine`.

use crate::id::{CallId, CompositionId, FunctionId};
use thiserror::Error;

/// Errors produced while building or querying a knowledge graph.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoreError {
    /// A function ID was not found.
    #[error("function not found: FunctionId({id})")]
    FunctionNotFound { id: FunctionId },

    /// A composition ID was not found.
    #[error("composition not found: CompositionId({id})")]
    CompositionNotFound { id: CompositionId },

    /// A call ID was not found in the composition that was searched.
    #[error("call {call} not found in composition {composition}")]
    CallNotFound {
        composition: CompositionId,
        call: CallId,
    },

    /// A function name did not resolve to exactly one function.
    #[error("no function named '{name}'")]
    UnknownFunctionName { name: String },

    /// A Function Description violates its own invariants.
    #[error("invalid function description '{function}': {reason}")]
    InvalidFunction { function: String, reason: String },

    /// A mapping references something that cannot take part in it.
    #[error("invalid mapping in composition {composition}: {reason}")]
    InvalidMapping {
        composition: CompositionId,
        reason: String,
    },

    /// Graph-construction invariant violated in a way that cannot be resolved
    /// without guessing (e.g. several declared starts).
    #[error("ambiguous composition {composition}: {reason}")]
    Ambiguous {
        composition: CompositionId,
        reason: String,
    },
}
