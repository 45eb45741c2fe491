//! Runtime error types for the execution engine.
//!
//! Every fatal error names the place it happened: the applied call (or the
//! entry of a directly executed function) and, where relevant, the terminal
//! and parameter involved. `IterationExhausted` is a control signal consumed
//! by loop nodes and never escapes [`Engine::execute`](crate::Engine::execute).

use std::fmt;

use serde::{Deserialize, Serialize};

use semflow_core::{CallId, CompositionId, CoreError, FunctionId, ValueType};

/// Where a call is executing: an applied call inside a composition, or the
/// entry point of a function executed directly by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Site {
    Call(CallId),
    Entry(FunctionId),
}

impl Site {
    pub fn call(self) -> Option<CallId> {
        match self {
            Site::Call(call) => Some(call),
            Site::Entry(_) => None,
        }
    }
}

impl fmt::Display for Site {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Site::Call(call) => write!(f, "call {call}"),
            Site::Entry(function) => write!(f, "entry of function {function}"),
        }
    }
}

/// Errors produced while executing a composition.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExecError {
    #[error("unresolved input at {site} ({function}): parameter '{param}' has no mapped value and no default")]
    UnresolvedInput {
        site: Site,
        function: String,
        param: String,
    },

    #[error("type mismatch at {terminal}: expected {expected}, got {actual}")]
    TypeMismatch {
        terminal: String,
        expected: ValueType,
        actual: String,
    },

    #[error("iteration exhausted at {site}")]
    IterationExhausted { site: Site },

    #[error("implementation of '{function}' failed at {site}: {message} (arguments: {arguments})")]
    ImplementationFailure {
        site: Site,
        function: String,
        message: String,
        arguments: String,
    },

    #[error("ambiguous composition {composition}: {reason}")]
    AmbiguousComposition {
        composition: CompositionId,
        reason: String,
    },

    #[error("no implementation bound for '{function}' at {site}{}", path_suffix(.path))]
    Unbound {
        site: Site,
        function: String,
        path: Option<String>,
    },

    #[error("cannot read {endpoint}: {reason}")]
    ItemAccess { endpoint: String, reason: String },

    #[error("unknown input '{name}' for {target}")]
    UnknownInput { name: String, target: String },

    #[error(transparent)]
    Graph(CoreError),
}

fn path_suffix(path: &Option<String>) -> String {
    path.as_ref()
        .map(|p| format!(" (path '{p}')"))
        .unwrap_or_default()
}

impl From<CoreError> for ExecError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Ambiguous { composition, reason } => {
                ExecError::AmbiguousComposition { composition, reason }
            }
            other => ExecError::Graph(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ambiguous_core_error_maps_to_ambiguous_composition() {
        let err: ExecError = CoreError::Ambiguous {
            composition: CompositionId(4),
            reason: "2 declared start calls".into(),
        }
        .into();
        assert!(matches!(
            err,
            ExecError::AmbiguousComposition { composition: CompositionId(4), .. }
        ));
    }

    #[test]
    fn other_core_errors_are_wrapped() {
        let err: ExecError = CoreError::FunctionNotFound { id: FunctionId(1) }.into();
        assert!(matches!(err, ExecError::Graph(CoreError::FunctionNotFound { .. })));
        assert_eq!(err.to_string(), "function not found: FunctionId(1)");
    }

    #[test]
    fn unbound_message_includes_path() {
        let err = ExecError::Unbound {
            site: Site::Call(CallId(2)),
            function: "frob".into(),
            path: Some("mod.frob".into()),
        };
        assert_eq!(
            err.to_string(),
            "no implementation bound for 'frob' at call 2 (path 'mod.frob')"
        );
    }
}
