//! Runtime value representation for the execution engine.
//!
//! [`Value`] is the dynamic counterpart of the declared [`ValueType`]s in a
//! Function Description. Constants stored in the graph become values through
//! [`Value::from_const`]; host callables consume and produce values.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use semflow_core::{ConstValue, Strategy, ValueType};

const SUMMARY_LIMIT: usize = 60;

/// A runtime value flowing through terminals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    /// Insertion-ordered string-keyed map.
    Map(IndexMap<String, Value>),
    /// A single-pass cursor over `items`. Advancing it is a mutation of the
    /// receiver, which is how loop nodes thread iterator state.
    Iterator { items: Vec<Value>, position: usize },
}

impl Value {
    pub fn from_const(cv: &ConstValue) -> Value {
        match cv {
            ConstValue::None => Value::None,
            ConstValue::Bool(b) => Value::Bool(*b),
            ConstValue::Int(v) => Value::Int(*v),
            ConstValue::Float(v) => Value::Float(*v),
            ConstValue::Str(s) => Value::Str(s.clone()),
            ConstValue::List(items) => Value::List(items.iter().map(Value::from_const).collect()),
            ConstValue::Map(entries) => Value::Map(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), Value::from_const(v)))
                    .collect(),
            ),
        }
    }

    pub fn value_type(&self) -> ValueType {
        match self {
            Value::None => ValueType::None,
            Value::Bool(_) => ValueType::Bool,
            Value::Int(_) => ValueType::Int,
            Value::Float(_) => ValueType::Float,
            Value::Str(_) => ValueType::Str,
            Value::List(_) => ValueType::List,
            Value::Map(_) => ValueType::Map,
            Value::Iterator { .. } => ValueType::Iterator,
        }
    }

    /// Type name used for member resolution (`list`, `str`, ...).
    pub fn type_name(&self) -> &'static str {
        self.value_type().name()
    }

    pub fn truthy(&self) -> bool {
        match self {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Int(v) => *v != 0,
            Value::Float(v) => *v != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(items) => !items.is_empty(),
            Value::Map(entries) => !entries.is_empty(),
            Value::Iterator { .. } => true,
        }
    }

    /// Short `type value` description for error messages.
    pub fn summary(&self) -> String {
        let text = self.to_string();
        if text.chars().count() > SUMMARY_LIMIT {
            let head: String = text.chars().take(SUMMARY_LIMIT).collect();
            format!("{} {head}...", self.type_name())
        } else {
            format!("{} {text}", self.type_name())
        }
    }

    /// Reads one element, for source-side mapping strategies.
    pub fn get_item(&self, strategy: &Strategy) -> Result<Value, String> {
        match (self, strategy) {
            (Value::List(items), Strategy::Index(i)) => items
                .get(*i)
                .cloned()
                .ok_or_else(|| format!("index {i} out of range for list of length {}", items.len())),
            (Value::Iterator { items, .. }, Strategy::Index(i)) => items
                .get(*i)
                .cloned()
                .ok_or_else(|| format!("index {i} out of range for iterator of length {}", items.len())),
            (Value::Str(s), Strategy::Index(i)) => s
                .chars()
                .nth(*i)
                .map(|c| Value::Str(c.to_string()))
                .ok_or_else(|| format!("index {i} out of range for string")),
            (Value::Map(entries), Strategy::Key(key)) => entries
                .get(key)
                .cloned()
                .ok_or_else(|| format!("key '{key}' not present")),
            (_, Strategy::Append) => Err("append is a write-only strategy".into()),
            (other, strategy) => Err(format!("{} does not support {strategy:?}", other.type_name())),
        }
    }

    pub fn from_json(json: &serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::None,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::Str(s.clone()),
            serde_json::Value::Array(items) => Value::List(items.iter().map(Value::from_json).collect()),
            serde_json::Value::Object(entries) => Value::Map(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), Value::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// JSON rendering. Iterators render their remaining items; non-finite
    /// floats become `null`.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::None => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Str(s) => serde_json::Value::String(s.clone()),
            Value::List(items) => serde_json::Value::Array(items.iter().map(Value::to_json).collect()),
            Value::Map(entries) => serde_json::Value::Object(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
            Value::Iterator { items, position } => serde_json::Value::Array(
                items.iter().skip(*position).map(Value::to_json).collect(),
            ),
        }
    }

    fn write_repr(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => write!(f, "{s:?}"),
            other => write!(f, "{other}"),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => f.write_str("None"),
            Value::Bool(true) => f.write_str("True"),
            Value::Bool(false) => f.write_str("False"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v:?}"),
            Value::Str(s) => f.write_str(s),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    item.write_repr(f)?;
                }
                f.write_str("]")
            }
            Value::Map(entries) => {
                f.write_str("{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{k:?}: ")?;
                    v.write_repr(f)?;
                }
                f.write_str("}")
            }
            Value::Iterator { items, position } => {
                write!(f, "<iterator {position}/{}>", items.len())
            }
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::List(v)
    }
}
