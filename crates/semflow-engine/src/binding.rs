//! Argument assembly from ingested input terminals.
//!
//! Positional parameters are ordered by their declared index, the
//! variadic-positional aggregate is appended, keyword parameters are added
//! by name and the variadic-keyword aggregate is merged last. The receiver
//! travels separately. Missing inputs take their declared default; a
//! required input with neither fails before anything is invoked.

use std::fmt;

use indexmap::IndexMap;

use semflow_core::{FunctionDef, ParamDef, ParamKind, ValueType};

use crate::cell::{Terminal, Terminals};
use crate::error::{ExecError, Site};
use crate::value::Value;

/// Flattened call arguments.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Arguments {
    pub positional: Vec<Value>,
    pub keyword: IndexMap<String, Value>,
    pub receiver: Option<Value>,
}

impl fmt::Display for Arguments {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts: Vec<String> = Vec::new();
        if let Some(recv) = &self.receiver {
            parts.push(format!("self={}", recv.summary()));
        }
        parts.extend(self.positional.iter().map(Value::summary));
        parts.extend(self.keyword.iter().map(|(k, v)| format!("{k}={}", v.summary())));
        write!(f, "({})", parts.join(", "))
    }
}

/// Reads every input terminal of a call (consuming them) and builds the
/// argument lists.
pub fn assemble(def: &FunctionDef, site: Site, terminals: &mut Terminals) -> Result<Arguments, ExecError> {
    // Resolve everything first so nothing is partially consumed on failure.
    let mut values = Vec::with_capacity(def.params.len());
    for (param, terminal) in def.params.iter().zip(terminals.params.iter()) {
        values.push(resolve(def, site, param, terminal)?);
    }
    let receiver = match (&def.receiver, &terminals.receiver) {
        (Some(param), Some(terminal)) => Some(resolve(def, site, param, terminal)?),
        _ => None,
    };
    terminals.consume_inputs();

    let mut positional: Vec<(u16, Value)> = Vec::new();
    let mut var_positional = Vec::new();
    let mut keyword = IndexMap::new();
    let mut var_keyword = IndexMap::new();

    for ((param, terminal), value) in def.params.iter().zip(terminals.params.iter()).zip(values) {
        match &param.kind {
            ParamKind::Positional(index) => positional.push((*index, value)),
            ParamKind::Keyword(name) => {
                keyword.insert(name.clone(), value);
            }
            ParamKind::VarPositional => match value {
                Value::List(items) => var_positional = items,
                other => return Err(aggregate_mismatch(terminal, ValueType::List, &other)),
            },
            ParamKind::VarKeyword => match value {
                Value::Map(entries) => var_keyword = entries,
                other => return Err(aggregate_mismatch(terminal, ValueType::Map, &other)),
            },
        }
    }

    positional.sort_by_key(|(index, _)| *index);
    let mut positional: Vec<Value> = positional.into_iter().map(|(_, v)| v).collect();
    positional.extend(var_positional);
    keyword.extend(var_keyword);

    Ok(Arguments {
        positional,
        keyword,
        receiver,
    })
}

/// Prepares the enclosing call's terminals before its nested composition
/// runs: every input that was not freshly ingested receives its default (or
/// an empty aggregate), and a missing required input fails immediately.
pub fn prepare_boundary(def: &FunctionDef, site: Site, terminals: &mut Terminals) -> Result<(), ExecError> {
    let receiver = def.receiver.as_ref().zip(terminals.receiver.as_mut());
    let params = def.params.iter().zip(terminals.params.iter_mut());
    for (param, terminal) in params.chain(receiver) {
        if terminal.is_fresh() {
            continue;
        }
        let value = resolve(def, site, param, terminal)?;
        terminal.write(None, value)?;
    }
    Ok(())
}

/// The ingested value, else the default, else an empty aggregate for
/// variadic parameters.
fn resolve(def: &FunctionDef, site: Site, param: &ParamDef, terminal: &Terminal) -> Result<Value, ExecError> {
    if terminal.is_fresh() {
        if let Some(value) = terminal.peek() {
            return Ok(value);
        }
    }
    if let Some(default) = &param.default {
        return Ok(Value::from_const(default));
    }
    match param.kind {
        ParamKind::VarPositional => Ok(Value::List(Vec::new())),
        ParamKind::VarKeyword => Ok(Value::Map(IndexMap::new())),
        _ => Err(ExecError::UnresolvedInput {
            site,
            function: def.name.clone(),
            param: param.name.clone(),
        }),
    }
}

fn aggregate_mismatch(terminal: &Terminal, expected: ValueType, actual: &Value) -> ExecError {
    ExecError::TypeMismatch {
        terminal: terminal.label().to_string(),
        expected,
        actual: actual.summary(),
    }
}
