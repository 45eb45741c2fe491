//! Read-only introspection of a composition instance.
//!
//! A [`CompositionSnapshot`] lists the applied calls with their terminals and
//! current values, the composition variables, and every mapping edge with
//! its priority and whether it is currently authoritative. Nested bodies are
//! included when they have been instantiated. External tools use it for
//! diagnostics and visual replay.

use serde::{Deserialize, Serialize};

use semflow_core::{CallId, CompositionId, FunctionId, Port, Strategy, Successor, ValueType};

use crate::cell::Terminal;
use crate::value::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositionSnapshot {
    pub composition: CompositionId,
    pub name: String,
    pub represents: Option<FunctionId>,
    pub calls: Vec<CallSnapshot>,
    pub variables: Vec<TerminalSnapshot>,
    pub edges: Vec<EdgeSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallSnapshot {
    pub call: CallId,
    pub function: FunctionId,
    pub label: Option<String>,
    pub successor: Successor,
    pub terminals: Vec<TerminalSnapshot>,
    pub body: Option<Box<CompositionSnapshot>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerminalSnapshot {
    pub name: String,
    pub port: Option<Port>,
    pub value_type: ValueType,
    pub value: Option<Value>,
    pub consumed: bool,
}

impl From<&Terminal> for TerminalSnapshot {
    fn from(t: &Terminal) -> Self {
        TerminalSnapshot {
            name: t.name.clone(),
            port: t.port,
            value_type: t.value_type,
            value: t.peek(),
            consumed: t.cell().is_consumed(),
        }
    }
}

/// One mapping edge, rendered as endpoint descriptions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeSnapshot {
    pub source: String,
    pub source_strategy: Option<Strategy>,
    pub target: String,
    pub target_strategy: Option<Strategy>,
    pub priority: Option<CallId>,
    pub authoritative: bool,
}

impl CompositionSnapshot {
    /// Finds a call at any nesting depth.
    pub fn find_call(&self, call: CallId) -> Option<&CallSnapshot> {
        self.calls.iter().find_map(|c| {
            if c.call == call {
                Some(c)
            } else {
                c.body.as_ref().and_then(|b| b.find_call(call))
            }
        })
    }

    pub fn variable(&self, name: &str) -> Option<&Value> {
        self.variables
            .iter()
            .find(|v| v.name == name)
            .and_then(|v| v.value.as_ref())
    }
}

impl CallSnapshot {
    pub fn terminal(&self, port: Port) -> Option<&TerminalSnapshot> {
        self.terminals.iter().find(|t| t.port == Some(port))
    }
}
