//! Composition execution engine.
//!
//! Replays the call graph stored in a knowledge graph: walks a composition's
//! control edges from its start call, resolves each call's inputs through
//! mappings, invokes the bound host implementation (or recurses into the
//! function's own body composition) and follows sequential, branch and loop
//! successors.
//!
//! # Architecture
//!
//! - [`Engine`] holds the [`GraphQuery`](semflow_core::GraphQuery) snapshot,
//!   the [`ImplementationResolver`] and the [`EngineConfig`], and exposes
//!   [`Engine::execute`].
//! - A composition instance owns applied calls, each owning a
//!   [`Terminals`] set of typed [`Cell`]s.
//! - [`MappingSet`] groups mappings by target and priority; the call that
//!   actually ran decides which candidate source a merge point reads.
//! - [`binding`] turns ingested terminals into positional, keyword and
//!   receiver arguments.
//! - [`ExecError`] is the fatal error taxonomy. Iteration exhaustion is a
//!   control signal consumed by loop nodes.
//! - [`TraceEntry`] and [`CompositionSnapshot`] expose what happened, read-only.
//!
//! Execution is single-threaded: exactly one applied call is active at a
//! time, and nested bodies recurse on the native stack without a depth limit.
//!
//! # Usage
//!
//! ```ignore
//! let registry = Registry::standard();
//! let mut engine = Engine::new(&graph, &registry, EngineConfig::default());
//! let outputs = engine.execute_function(add_xy, inputs)?;
//! assert_eq!(outputs["result"], Value::Int(7));
//! ```

pub mod binding;
pub mod cell;
pub mod error;
pub mod host;
pub mod mapping;
pub mod snapshot;
pub mod trace;
pub mod value;

mod call;
mod composition;
mod engine;

pub use cell::{Cell, CellState, Terminal, Terminals};
pub use engine::{Engine, EngineConfig, Target};
pub use error::{ExecError, Site};
pub use host::{Callable, HostError, ImplementationResolver, Invocation, Registry};
pub use mapping::{MappingSet, Slot};
pub use snapshot::{CallSnapshot, CompositionSnapshot, EdgeSnapshot, TerminalSnapshot};
pub use trace::{Outcome, TraceEntry};
pub use value::Value;
