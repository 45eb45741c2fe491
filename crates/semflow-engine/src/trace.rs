//! Execution trace recording.
//!
//! When tracing is enabled via [`EngineConfig::trace_enabled`](crate::EngineConfig),
//! the engine records one [`TraceEntry`] per applied-call visit, at every
//! nesting depth. Entries are appended when a visit finishes, so a call
//! with a nested body appears after the calls of its body.

use serde::{Deserialize, Serialize};

use semflow_core::{CallId, CompositionId, FunctionId};

/// How a visit ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    Completed,
    /// The call signalled iteration exhaustion; a loop node takes `next`.
    Exhausted,
    Failed,
}

/// A single entry in the execution trace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceEntry {
    /// Number of function bodies enclosing the visit; 0 for the calls of a
    /// standalone composition.
    pub depth: usize,
    pub composition: CompositionId,
    pub call: CallId,
    pub function: FunctionId,
    pub outcome: Outcome,
}
