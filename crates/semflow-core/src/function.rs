//! Function Descriptions and their Parameter Bindings.
//!
//! A [`FunctionDef`] is the static, reusable description of one callable
//! context: how each parameter receives its argument, what the call produces,
//! an optional receiver threaded in and out for method-style calls, and an
//! optional nested composition holding the callable's body.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::id::{CompositionId, FunctionId};
use crate::types::{ConstValue, ValueType};

/// How a parameter receives its argument.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParamKind {
    /// Fixed positional slot. Positional arguments are passed sorted by index.
    Positional(u16),
    /// Named keyword argument.
    Keyword(String),
    /// Collects any number of extra positional arguments (`*args`).
    VarPositional,
    /// Collects any number of extra keyword arguments (`**kwargs`).
    VarKeyword,
}

/// A single parameter of a Function Description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamDef {
    /// Parameter name; also the key used for boundary inputs.
    pub name: String,
    /// Declared type (`ValueType::Any` when untyped).
    pub value_type: ValueType,
    /// Mapping kind.
    pub kind: ParamKind,
    /// Default substituted when nothing was ingested.
    pub default: Option<ConstValue>,
}

impl ParamDef {
    pub fn positional(name: &str, index: u16, value_type: ValueType) -> Self {
        ParamDef {
            name: name.to_string(),
            value_type,
            kind: ParamKind::Positional(index),
            default: None,
        }
    }

    /// Keyword parameter whose keyword is its own name.
    pub fn keyword(name: &str, value_type: ValueType) -> Self {
        ParamDef {
            name: name.to_string(),
            value_type,
            kind: ParamKind::Keyword(name.to_string()),
            default: None,
        }
    }

    /// Variadic-positional parameter. `value_type` constrains each element.
    pub fn var_positional(name: &str, value_type: ValueType) -> Self {
        ParamDef {
            name: name.to_string(),
            value_type,
            kind: ParamKind::VarPositional,
            default: None,
        }
    }

    /// Variadic-keyword parameter. `value_type` constrains each entry.
    pub fn var_keyword(name: &str, value_type: ValueType) -> Self {
        ParamDef {
            name: name.to_string(),
            value_type,
            kind: ParamKind::VarKeyword,
            default: None,
        }
    }

    pub fn with_default(mut self, default: impl Into<ConstValue>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn is_variadic(&self) -> bool {
        matches!(self.kind, ParamKind::VarPositional | ParamKind::VarKeyword)
    }

    /// Required parameters fail the call when nothing was ingested. Variadic
    /// parameters fall back to an empty aggregate instead.
    pub fn is_required(&self) -> bool {
        self.default.is_none() && !self.is_variadic()
    }
}

/// An output of a Function Description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputDef {
    pub name: String,
    pub value_type: ValueType,
}

impl OutputDef {
    pub fn new(name: &str, value_type: ValueType) -> Self {
        OutputDef {
            name: name.to_string(),
            value_type,
        }
    }
}

/// Opaque reference the host environment turns into a callable.
///
/// The last `.`-separated segment doubles as the member name used to
/// re-resolve the callable against a receiver's runtime value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImplementationRef {
    pub path: String,
}

impl ImplementationRef {
    pub fn new(path: &str) -> Self {
        ImplementationRef {
            path: path.to_string(),
        }
    }

    /// `"list.append"` -> `"append"`, `"add"` -> `"add"`.
    pub fn member(&self) -> &str {
        self.path.rsplit('.').next().unwrap_or(&self.path)
    }
}

/// Full Function Description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDef {
    /// Unique identity for this description.
    pub id: FunctionId,
    /// Function name.
    pub name: String,
    /// Parameters in declaration order. `Port::Param(i)` indexes this list.
    pub params: Vec<ParamDef>,
    /// Receiver for method-style calls.
    pub receiver: Option<ParamDef>,
    /// Primary output.
    pub output: OutputDef,
    /// Receiver's post-call value, for mutating calls.
    pub self_output: Option<OutputDef>,
    /// Nested composition representing the body.
    pub body: Option<CompositionId>,
    /// Host implementation, used when there is no body.
    pub implementation: Option<ImplementationRef>,
}

impl FunctionDef {
    /// Creates a description with no receiver, body or implementation. The
    /// primary output is an untyped terminal named `result`.
    pub fn new(id: FunctionId, name: &str, params: Vec<ParamDef>) -> Self {
        FunctionDef {
            id,
            name: name.to_string(),
            params,
            receiver: None,
            output: OutputDef::new("result", ValueType::Any),
            self_output: None,
            body: None,
            implementation: None,
        }
    }

    /// Returns the number of parameters, excluding the receiver.
    pub fn arity(&self) -> usize {
        self.params.len()
    }

    /// Looks up a parameter index by name.
    pub fn param_index(&self, name: &str) -> Option<u16> {
        self.params
            .iter()
            .position(|p| p.name == name)
            .map(|i| i as u16)
    }

    pub fn var_positional(&self) -> Option<(u16, &ParamDef)> {
        self.params
            .iter()
            .enumerate()
            .find(|(_, p)| p.kind == ParamKind::VarPositional)
            .map(|(i, p)| (i as u16, p))
    }

    pub fn var_keyword(&self) -> Option<(u16, &ParamDef)> {
        self.params
            .iter()
            .enumerate()
            .find(|(_, p)| p.kind == ParamKind::VarKeyword)
            .map(|(i, p)| (i as u16, p))
    }

    /// Checks the description's own invariants: at most one variadic of each
    /// kind, unique positional indices, keyword names and parameter names,
    /// and a self-output only alongside a receiver.
    pub fn validate(&self) -> Result<(), CoreError> {
        let invalid = |reason: String| CoreError::InvalidFunction {
            function: self.name.clone(),
            reason,
        };

        let mut names = HashSet::new();
        let mut indices = HashSet::new();
        let mut keywords = HashSet::new();
        let mut var_positional = 0;
        let mut var_keyword = 0;

        for param in &self.params {
            if !names.insert(param.name.as_str()) {
                return Err(invalid(format!("duplicate parameter name '{}'", param.name)));
            }
            match &param.kind {
                ParamKind::Positional(index) => {
                    if !indices.insert(*index) {
                        return Err(invalid(format!("duplicate positional index {index}")));
                    }
                }
                ParamKind::Keyword(keyword) => {
                    if !keywords.insert(keyword.as_str()) {
                        return Err(invalid(format!("duplicate keyword '{keyword}'")));
                    }
                }
                ParamKind::VarPositional => var_positional += 1,
                ParamKind::VarKeyword => var_keyword += 1,
            }
        }

        if var_positional > 1 {
            return Err(invalid("more than one variadic-positional parameter".into()));
        }
        if var_keyword > 1 {
            return Err(invalid("more than one variadic-keyword parameter".into()));
        }
        if self.self_output.is_some() && self.receiver.is_none() {
            return Err(invalid("self-output without a receiver".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> FunctionDef {
        FunctionDef::new(
            FunctionId(1),
            "format",
            vec![
                ParamDef::positional("template", 0, ValueType::Str),
                ParamDef::var_positional("args", ValueType::Any),
                ParamDef::keyword("sep", ValueType::Str).with_default(" "),
                ParamDef::var_keyword("extra", ValueType::Any),
            ],
        )
    }

    #[test]
    fn lookup_helpers() {
        let f = sample();
        assert_eq!(f.arity(), 4);
        assert_eq!(f.param_index("sep"), Some(2));
        assert_eq!(f.param_index("missing"), None);
        assert_eq!(f.var_positional().map(|(i, _)| i), Some(1));
        assert_eq!(f.var_keyword().map(|(i, _)| i), Some(3));
    }

    #[test]
    fn required_flags() {
        let f = sample();
        assert!(f.params[0].is_required());
        assert!(!f.params[1].is_required());
        assert!(!f.params[2].is_required());
        assert!(!f.params[3].is_required());
    }

    #[test]
    fn valid_description_passes() {
        assert!(sample().validate().is_ok());
    }

    #[test]
    fn second_variadic_positional_rejected() {
        let mut f = sample();
        f.params.push(ParamDef::var_positional("more", ValueType::Any));
        let err = f.validate().unwrap_err();
        assert!(err.to_string().contains("variadic-positional"), "{err}");
    }

    #[test]
    fn duplicate_positional_index_rejected() {
        let f = FunctionDef::new(
            FunctionId(2),
            "bad",
            vec![
                ParamDef::positional("a", 0, ValueType::Any),
                ParamDef::positional("b", 0, ValueType::Any),
            ],
        );
        assert!(matches!(f.validate(), Err(CoreError::InvalidFunction { .. })));
    }

    #[test]
    fn self_output_requires_receiver() {
        let mut f = sample();
        f.self_output = Some(OutputDef::new("self", ValueType::Any));
        assert!(f.validate().is_err());
        f.receiver = Some(ParamDef::positional("self", 0, ValueType::Any));
        assert!(f.validate().is_ok());
    }

    #[test]
    fn implementation_member_name() {
        assert_eq!(ImplementationRef::new("list.append").member(), "append");
        assert_eq!(ImplementationRef::new("add").member(), "add");
    }
}
