//! Host implementations: the callables behind Function Descriptions.
//!
//! The engine never loads code itself. An [`ImplementationResolver`] turns an
//! opaque [`ImplementationRef`] into a [`Callable`], and re-resolves a member
//! by name against a receiver's runtime value for late-bound method calls.
//! [`Registry`] is the table-driven resolver used by the CLI and tests.

pub mod builtins;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use semflow_core::ImplementationRef;

use crate::value::Value;

/// Failure reported by a host callable.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum HostError {
    /// The iteration protocol signal: no more items.
    #[error("iteration exhausted")]
    Exhausted,

    #[error("{0}")]
    Failed(String),

    #[error("expected {expected} arguments, got {got}")]
    Arity { expected: String, got: usize },

    #[error("expected {expected}, got {got}")]
    Type { expected: String, got: String },
}

impl HostError {
    pub fn failed(message: impl Into<String>) -> Self {
        HostError::Failed(message.into())
    }

    pub fn type_error(expected: &str, got: &Value) -> Self {
        HostError::Type {
            expected: expected.to_string(),
            got: got.summary(),
        }
    }
}

/// Arguments handed to a callable. The receiver is borrowed mutably so that
/// mutating methods are observed through the call's self-output.
pub struct Invocation<'a> {
    pub args: Vec<Value>,
    pub kwargs: IndexMap<String, Value>,
    pub receiver: Option<&'a mut Value>,
}

impl Invocation<'_> {
    /// Rejects calls whose positional count is outside `min..=max`.
    pub fn expect_arity(&self, min: usize, max: usize) -> Result<(), HostError> {
        let got = self.args.len();
        if got < min || got > max {
            let expected = if min == max {
                min.to_string()
            } else {
                format!("{min} to {max}")
            };
            return Err(HostError::Arity { expected, got });
        }
        Ok(())
    }

    pub fn receiver(&mut self) -> Result<&mut Value, HostError> {
        self.receiver
            .as_deref_mut()
            .ok_or_else(|| HostError::failed("method called without a receiver"))
    }
}

pub type Callable = Arc<dyn Fn(Invocation<'_>) -> Result<Value, HostError> + Send + Sync>;

/// Turns implementation handles into callables.
pub trait ImplementationResolver {
    fn resolve(&self, implementation: &ImplementationRef) -> Option<Callable>;

    /// Looks `member` up on the runtime type of `receiver`.
    fn resolve_member(&self, receiver: &Value, member: &str) -> Option<Callable>;
}

/// Callables keyed by implementation path, and methods keyed by
/// `(type name, member)`.
#[derive(Clone, Default)]
pub struct Registry {
    functions: HashMap<String, Callable>,
    methods: HashMap<(String, String), Callable>,
}

impl Registry {
    pub fn new() -> Self {
        Registry::default()
    }

    /// A registry preloaded with [`builtins::standard`].
    pub fn standard() -> Self {
        let mut registry = Registry::new();
        builtins::standard(&mut registry);
        registry
    }

    pub fn register<F>(&mut self, path: &str, f: F) -> &mut Self
    where
        F: Fn(Invocation<'_>) -> Result<Value, HostError> + Send + Sync + 'static,
    {
        self.functions.insert(path.to_string(), Arc::new(f));
        self
    }

    /// Registers a method; `type_name` is a [`Value::type_name`] or `"any"`.
    pub fn register_method<F>(&mut self, type_name: &str, member: &str, f: F) -> &mut Self
    where
        F: Fn(Invocation<'_>) -> Result<Value, HostError> + Send + Sync + 'static,
    {
        self.methods
            .insert((type_name.to_string(), member.to_string()), Arc::new(f));
        self
    }

    pub fn contains(&self, path: &str) -> bool {
        self.functions.contains_key(path)
    }

    fn method(&self, type_name: &str, member: &str) -> Option<Callable> {
        self.methods
            .get(&(type_name.to_string(), member.to_string()))
            .cloned()
    }
}

impl ImplementationResolver for Registry {
    fn resolve(&self, implementation: &ImplementationRef) -> Option<Callable> {
        if let Some(f) = self.functions.get(&implementation.path) {
            return Some(f.clone());
        }
        // "list.append" style paths name a method directly.
        let (type_name, member) = implementation.path.rsplit_once('.')?;
        self.method(type_name, member)
    }

    fn resolve_member(&self, receiver: &Value, member: &str) -> Option<Callable> {
        self.method(receiver.type_name(), member)
            .or_else(|| self.method("any", member))
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut functions: Vec<_> = self.functions.keys().collect();
        functions.sort();
        let mut methods: Vec<_> = self.methods.keys().collect();
        methods.sort();
        f.debug_struct("Registry")
            .field("functions", &functions)
            .field("methods", &methods)
            .finish()
    }
}
