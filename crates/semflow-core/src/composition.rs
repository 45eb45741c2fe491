//! Compositions: applied calls, control successors and mappings.
//!
//! A [`CompositionDef`] is one executable unit: a start call, the applied
//! calls reachable from it through [`Successor`] edges, and the
//! [`MappingDef`] data edges feeding their terminals. When a composition
//! represents a function body, [`Endpoint::Boundary`] addresses the terminals
//! of the enclosing call.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::id::{CallId, CompositionId, FunctionId};
use crate::types::ConstValue;

/// A terminal slot on a call, relative to its Function Description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Port {
    /// Index into `FunctionDef::params`.
    Param(u16),
    Receiver,
    Output,
    SelfOutput,
}

impl Port {
    pub fn is_output(self) -> bool {
        matches!(self, Port::Output | Port::SelfOutput)
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Port::Param(i) => write!(f, "param[{i}]"),
            Port::Receiver => f.write_str("receiver"),
            Port::Output => f.write_str("output"),
            Port::SelfOutput => f.write_str("self_output"),
        }
    }
}

/// One end of a mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Endpoint {
    /// Literal value. Only valid as a source.
    Constant(ConstValue),
    /// A terminal of an applied call in the same composition.
    Call { call: CallId, port: Port },
    /// A terminal of the enclosing call (function bodies only).
    Boundary(Port),
    /// A composition-scoped named cell.
    Variable(String),
}

impl Endpoint {
    pub fn call(call: CallId, port: Port) -> Self {
        Endpoint::Call { call, port }
    }

    pub fn constant(value: impl Into<ConstValue>) -> Self {
        Endpoint::Constant(value.into())
    }

    pub fn variable(name: &str) -> Self {
        Endpoint::Variable(name.to_string())
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Constant(c) => write!(f, "const {c:?}"),
            Endpoint::Call { call, port } => write!(f, "call {call}.{port}"),
            Endpoint::Boundary(port) => write!(f, "boundary.{port}"),
            Endpoint::Variable(name) => write!(f, "var {name}"),
        }
    }
}

/// Index/key strategy applied at either side of a mapping.
///
/// On the source side it selects an element of the source value. On the
/// target side it accumulates into a list or map instead of overwriting.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Strategy {
    /// Fixed list position.
    Index(usize),
    /// Next free list position. Target side only.
    Append,
    /// Map key.
    Key(String),
}

/// A data edge from one source into one target terminal.
///
/// Several `MappingDef`s sharing a target form that target's candidate set;
/// `priority` names the call whose execution makes this source authoritative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingDef {
    pub source: Endpoint,
    pub source_strategy: Option<Strategy>,
    pub target: Endpoint,
    pub target_strategy: Option<Strategy>,
    pub priority: Option<CallId>,
}

impl MappingDef {
    pub fn new(source: Endpoint, target: Endpoint) -> Self {
        MappingDef {
            source,
            source_strategy: None,
            target,
            target_strategy: None,
            priority: None,
        }
    }

    /// Reads an element of the source instead of the whole value.
    pub fn from_item(mut self, strategy: Strategy) -> Self {
        self.source_strategy = Some(strategy);
        self
    }

    /// Accumulates into the target instead of overwriting it.
    pub fn into_item(mut self, strategy: Strategy) -> Self {
        self.target_strategy = Some(strategy);
        self
    }

    pub fn with_priority(mut self, call: CallId) -> Self {
        self.priority = Some(call);
        self
    }
}

/// Control successor of an applied call. The variants are mutually
/// exclusive, so a call can never be both a loop and a branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Successor {
    /// Terminal node.
    #[default]
    End,
    /// Unconditional successor.
    Next(CallId),
    /// Loop node: `iterate` while the call produces values, `next` (or the
    /// end of the composition) once it signals exhaustion.
    Loop {
        iterate: CallId,
        next: Option<CallId>,
    },
    /// Branch node, chosen by the truthiness of the call's own output.
    Branch {
        if_true: Option<CallId>,
        if_false: Option<CallId>,
    },
}

impl Successor {
    /// All calls this successor can transfer control to.
    pub fn targets(&self) -> Vec<CallId> {
        match *self {
            Successor::End => Vec::new(),
            Successor::Next(next) => vec![next],
            Successor::Loop { iterate, next } => std::iter::once(iterate).chain(next).collect(),
            Successor::Branch { if_true, if_false } => if_true.into_iter().chain(if_false).collect(),
        }
    }

    pub fn is_loop(&self) -> bool {
        matches!(self, Successor::Loop { .. })
    }
}

/// One instantiation of a Function Description inside a composition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallDef {
    pub id: CallId,
    pub function: FunctionId,
    pub successor: Successor,
    /// Human-readable label (source variable or expression), for display.
    pub label: Option<String>,
}

/// An executable subgraph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositionDef {
    pub id: CompositionId,
    pub name: String,
    /// The function whose body this composition is, if any.
    pub represents: Option<FunctionId>,
    /// Declared start calls. Exactly one is expected; none means an empty
    /// body, more than one is ambiguous.
    pub starts: Vec<CallId>,
    pub calls: Vec<CallDef>,
    pub mappings: Vec<MappingDef>,
}

impl CompositionDef {
    pub fn new(id: CompositionId, name: &str, represents: Option<FunctionId>) -> Self {
        CompositionDef {
            id,
            name: name.to_string(),
            represents,
            starts: Vec::new(),
            calls: Vec::new(),
            mappings: Vec::new(),
        }
    }

    pub fn call(&self, id: CallId) -> Option<&CallDef> {
        self.calls.iter().find(|c| c.id == id)
    }

    pub fn contains_call(&self, id: CallId) -> bool {
        self.call(id).is_some()
    }
}
