//! Declared terminal types and graph-level constants.
//!
//! [`ValueType`] is what a Function Description declares for a parameter or
//! output; the engine validates runtime values against it. [`ConstValue`] is
//! a literal stored in the graph (constant mapping sources, parameter
//! defaults) and is converted to a runtime value when read.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Declared type of a terminal.
///
/// `Any` is the untyped marker: descriptions extracted from dynamically typed
/// sources leave most terminals as `Any`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ValueType {
    #[default]
    Any,
    None,
    Bool,
    Int,
    Float,
    Str,
    List,
    Map,
    Iterator,
}

impl ValueType {
    /// Returns `true` if a value whose runtime type is `actual` satisfies this
    /// declared type. `Float` also accepts `Int`.
    pub fn accepts(self, actual: ValueType) -> bool {
        match (self, actual) {
            (ValueType::Any, _) => true,
            (ValueType::Float, ValueType::Int) => true,
            (expected, actual) => expected == actual,
        }
    }

    /// Lowercase name, matching the member-resolution namespace of the host
    /// registry (`list.append`, `str.upper`, ...).
    pub fn name(self) -> &'static str {
        match self {
            ValueType::Any => "any",
            ValueType::None => "none",
            ValueType::Bool => "bool",
            ValueType::Int => "int",
            ValueType::Float => "float",
            ValueType::Str => "str",
            ValueType::List => "list",
            ValueType::Map => "map",
            ValueType::Iterator => "iterator",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Constant literal values stored in the graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConstValue {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<ConstValue>),
    Map(IndexMap<String, ConstValue>),
}

impl ConstValue {
    /// The runtime type this constant will have once converted.
    pub fn value_type(&self) -> ValueType {
        match self {
            ConstValue::None => ValueType::None,
            ConstValue::Bool(_) => ValueType::Bool,
            ConstValue::Int(_) => ValueType::Int,
            ConstValue::Float(_) => ValueType::Float,
            ConstValue::Str(_) => ValueType::Str,
            ConstValue::List(_) => ValueType::List,
            ConstValue::Map(_) => ValueType::Map,
        }
    }
}

impl From<i64> for ConstValue {
    fn from(v: i64) -> Self {
        ConstValue::Int(v)
    }
}

impl From<i32> for ConstValue {
    fn from(v: i32) -> Self {
        ConstValue::Int(v as i64)
    }
}

impl From<f64> for ConstValue {
    fn from(v: f64) -> Self {
        ConstValue::Float(v)
    }
}

impl From<bool> for ConstValue {
    fn from(v: bool) -> Self {
        ConstValue::Bool(v)
    }
}

impl From<&str> for ConstValue {
    fn from(v: &str) -> Self {
        ConstValue::Str(v.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn any_accepts_everything() {
        for actual in [
            ValueType::None,
            ValueType::Bool,
            ValueType::Int,
            ValueType::Float,
            ValueType::Str,
            ValueType::List,
            ValueType::Map,
            ValueType::Iterator,
        ] {
            assert!(ValueType::Any.accepts(actual));
        }
    }

    #[test]
    fn float_widens_int_but_not_the_reverse() {
        assert!(ValueType::Float.accepts(ValueType::Int));
        assert!(!ValueType::Int.accepts(ValueType::Float));
    }

    #[test]
    fn exact_types_reject_others() {
        assert!(ValueType::Str.accepts(ValueType::Str));
        assert!(!ValueType::Str.accepts(ValueType::Int));
        assert!(!ValueType::List.accepts(ValueType::Map));
    }

    #[test]
    fn const_value_types() {
        assert_eq!(ConstValue::from(3).value_type(), ValueType::Int);
        assert_eq!(ConstValue::from("x").value_type(), ValueType::Str);
        assert_eq!(ConstValue::None.value_type(), ValueType::None);
        assert_eq!(ConstValue::List(vec![]).value_type(), ValueType::List);
    }

    #[test]
    fn serde_roundtrip_nested_constant() {
        let mut map = IndexMap::new();
        map.insert("a".to_string(), ConstValue::List(vec![ConstValue::Int(1), ConstValue::Float(2.5)]));
        let value = ConstValue::Map(map);
        let json = serde_json::to_string(&value).unwrap();
        let back: ConstValue = serde_json::from_str(&json).unwrap();
        assert_eq!(value, back);
    }
}
