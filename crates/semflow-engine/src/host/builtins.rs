//! The standard host library.
//!
//! Free functions are registered by name (`add`, `len`, `range`, ...) and
//! methods by `(type, member)` (`list.append`, `str.upper`, ...). Mutating
//! methods change the receiver in place and return `None`, like the source
//! languages these graphs are extracted from.

use indexmap::IndexMap;

use super::{HostError, Invocation, Registry};
use crate::value::Value;

/// Registers the whole standard library into `registry`.
pub fn standard(registry: &mut Registry) {
    registry
        .register("add", |inv| binary(inv, add))
        .register("sub", |inv| binary(inv, |a, b| arith(a, b, i64::checked_sub, |x, y| x - y, "-")))
        .register("mul", |inv| binary(inv, mul))
        .register("truediv", |inv| binary(inv, truediv))
        .register("floordiv", |inv| binary(inv, floordiv))
        .register("mod", |inv| binary(inv, modulo))
        .register("neg", |inv| unary(inv, neg))
        .register("eq", |inv| binary(inv, |a, b| Ok(Value::Bool(a == b))))
        .register("ne", |inv| binary(inv, |a, b| Ok(Value::Bool(a != b))))
        .register("lt", |inv| compare(inv, |o| o.is_lt()))
        .register("le", |inv| compare(inv, |o| o.is_le()))
        .register("gt", |inv| compare(inv, |o| o.is_gt()))
        .register("ge", |inv| compare(inv, |o| o.is_ge()))
        .register("not", |inv| unary(inv, |v| Ok(Value::Bool(!v.truthy()))))
        .register("identity", |inv| unary(inv, Ok))
        .register("len", |inv| unary(inv, len))
        .register("range", range)
        .register("iter", |inv| unary(inv, iter))
        .register("next", next)
        .register("list", list)
        .register("pack", |inv| Ok(Value::List(inv.args)))
        .register("dict", |inv| Ok(Value::Map(inv.kwargs)))
        .register("str", |inv| unary(inv, |v| Ok(Value::Str(v.to_string()))))
        .register("format", format)
        .register("sum", |inv| unary(inv, sum));

    registry
        .register_method("iterator", "next", next)
        .register_method("list", "append", |mut inv| {
            inv.expect_arity(1, 1)?;
            let item = inv.args.remove(0);
            as_list(inv.receiver()?)?.push(item);
            Ok(Value::None)
        })
        .register_method("list", "pop", |mut inv| {
            inv.expect_arity(0, 1)?;
            let index = match inv.args.first() {
                Some(Value::Int(i)) => Some(*i),
                Some(other) => return Err(HostError::type_error("int", other)),
                None => None,
            };
            let items = as_list(inv.receiver()?)?;
            if items.is_empty() {
                return Err(HostError::failed("pop from empty list"));
            }
            let at = match index {
                Some(i) => normalize_index(i, items.len())?,
                None => items.len() - 1,
            };
            Ok(items.remove(at))
        })
        .register_method("list", "extend", |mut inv| {
            inv.expect_arity(1, 1)?;
            let extra = elements(inv.args.remove(0))?;
            as_list(inv.receiver()?)?.extend(extra);
            Ok(Value::None)
        })
        .register_method("map", "get", |mut inv| {
            inv.expect_arity(1, 2)?;
            let default = if inv.args.len() == 2 { inv.args.pop() } else { None };
            let key = match inv.args.pop() {
                Some(Value::Str(k)) => k,
                Some(other) => return Err(HostError::type_error("str", &other)),
                None => return Err(HostError::failed("missing key")),
            };
            match inv.receiver()? {
                Value::Map(entries) => Ok(entries.get(&key).cloned().or(default).unwrap_or(Value::None)),
                other => Err(HostError::type_error("map", other)),
            }
        })
        .register_method("map", "keys", |mut inv| {
            inv.expect_arity(0, 0)?;
            match inv.receiver()? {
                Value::Map(entries) => Ok(Value::List(entries.keys().map(|k| Value::Str(k.clone())).collect())),
                other => Err(HostError::type_error("map", other)),
            }
        })
        .register_method("str", "upper", |mut inv| {
            inv.expect_arity(0, 0)?;
            Ok(Value::Str(as_str(inv.receiver()?)?.to_uppercase()))
        })
        .register_method("str", "lower", |mut inv| {
            inv.expect_arity(0, 0)?;
            Ok(Value::Str(as_str(inv.receiver()?)?.to_lowercase()))
        })
        .register_method("str", "split", |mut inv| {
            inv.expect_arity(0, 1)?;
            let sep = match inv.args.pop() {
                Some(Value::Str(s)) => Some(s),
                Some(Value::None) | None => None,
                Some(other) => return Err(HostError::type_error("str", &other)),
            };
            let text = as_str(inv.receiver()?)?;
            let parts: Vec<Value> = match sep {
                Some(sep) => text.split(sep.as_str()).map(|p| Value::Str(p.to_string())).collect(),
                None => text.split_whitespace().map(|p| Value::Str(p.to_string())).collect(),
            };
            Ok(Value::List(parts))
        })
        .register_method("str", "join", |mut inv| {
            inv.expect_arity(1, 1)?;
            let parts = elements(inv.args.remove(0))?;
            let sep = as_str(inv.receiver()?)?.to_string();
            let strings = parts
                .iter()
                .map(|p| match p {
                    Value::Str(s) => Ok(s.clone()),
                    other => Err(HostError::type_error("str", other)),
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Value::Str(strings.join(&sep)))
        });
}

// ---------------------------------------------------------------------------
// Argument helpers
// ---------------------------------------------------------------------------

fn unary(inv: Invocation<'_>, f: impl Fn(Value) -> Result<Value, HostError>) -> Result<Value, HostError> {
    inv.expect_arity(1, 1)?;
    let mut args = inv.args;
    f(args.remove(0))
}

fn binary(inv: Invocation<'_>, f: impl Fn(&Value, &Value) -> Result<Value, HostError>) -> Result<Value, HostError> {
    inv.expect_arity(2, 2)?;
    f(&inv.args[0], &inv.args[1])
}

fn compare(inv: Invocation<'_>, f: impl Fn(std::cmp::Ordering) -> bool) -> Result<Value, HostError> {
    binary(inv, |a, b| {
        let ordering = match (a, b) {
            (Value::Int(x), Value::Int(y)) => x.cmp(y),
            (Value::Str(x), Value::Str(y)) => x.cmp(y),
            _ => {
                let (x, y) = (as_float(a)?, as_float(b)?);
                x.partial_cmp(&y)
                    .ok_or_else(|| HostError::failed("comparison with NaN"))?
            }
        };
        Ok(Value::Bool(f(ordering)))
    })
}

fn as_float(v: &Value) -> Result<f64, HostError> {
    match v {
        Value::Int(i) => Ok(*i as f64),
        Value::Float(f) => Ok(*f),
        Value::Bool(b) => Ok(f64::from(u8::from(*b))),
        other => Err(HostError::type_error("number", other)),
    }
}

fn as_list(v: &mut Value) -> Result<&mut Vec<Value>, HostError> {
    match v {
        Value::List(items) => Ok(items),
        other => Err(HostError::type_error("list", other)),
    }
}

fn as_str(v: &Value) -> Result<&str, HostError> {
    match v {
        Value::Str(s) => Ok(s),
        other => Err(HostError::type_error("str", other)),
    }
}

/// Elements of anything iterable.
fn elements(v: Value) -> Result<Vec<Value>, HostError> {
    match v {
        Value::List(items) => Ok(items),
        Value::Iterator { items, position } => Ok(items.into_iter().skip(position).collect()),
        Value::Map(entries) => Ok(entries.into_keys().map(Value::Str).collect()),
        Value::Str(s) => Ok(s.chars().map(|c| Value::Str(c.to_string())).collect()),
        other => Err(HostError::type_error("iterable", &other)),
    }
}

fn normalize_index(i: i64, len: usize) -> Result<usize, HostError> {
    let resolved = if i < 0 { len as i64 + i } else { i };
    if resolved < 0 || resolved >= len as i64 {
        return Err(HostError::failed(format!("index {i} out of range")));
    }
    Ok(resolved as usize)
}

// ---------------------------------------------------------------------------
// Arithmetic
// ---------------------------------------------------------------------------

fn arith(
    a: &Value,
    b: &Value,
    int_op: fn(i64, i64) -> Option<i64>,
    float_op: fn(f64, f64) -> f64,
    symbol: &str,
) -> Result<Value, HostError> {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => int_op(*x, *y)
            .map(Value::Int)
            .ok_or_else(|| HostError::failed(format!("integer overflow in {x} {symbol} {y}"))),
        _ => Ok(Value::Float(float_op(as_float(a)?, as_float(b)?))),
    }
}

fn add(a: &Value, b: &Value) -> Result<Value, HostError> {
    match (a, b) {
        (Value::Str(x), Value::Str(y)) => Ok(Value::Str(format!("{x}{y}"))),
        (Value::List(x), Value::List(y)) => Ok(Value::List(x.iter().chain(y).cloned().collect())),
        _ => arith(a, b, i64::checked_add, |x, y| x + y, "+"),
    }
}

fn mul(a: &Value, b: &Value) -> Result<Value, HostError> {
    match (a, b) {
        (Value::Str(s), Value::Int(n)) | (Value::Int(n), Value::Str(s)) => {
            let count = usize::try_from(*n).unwrap_or(0);
            match s.len().checked_mul(count) {
                Some(total) if total <= isize::MAX as usize => Ok(Value::Str(s.repeat(count))),
                _ => Err(HostError::failed(format!("repeated string too long ({} * {n})", s.len()))),
            }
        }
        _ => arith(a, b, i64::checked_mul, |x, y| x * y, "*"),
    }
}

fn truediv(a: &Value, b: &Value) -> Result<Value, HostError> {
    let divisor = as_float(b)?;
    if divisor == 0.0 {
        return Err(HostError::failed("division by zero"));
    }
    Ok(Value::Float(as_float(a)? / divisor))
}

fn floordiv(a: &Value, b: &Value) -> Result<Value, HostError> {
    match (a, b) {
        (Value::Int(_), Value::Int(0)) => Err(HostError::failed("integer division by zero")),
        (Value::Int(x), Value::Int(y)) => x
            .checked_div_euclid(*y)
            .zip(x.checked_rem_euclid(*y))
            .map(|(q, r)| Value::Int(q - i64::from(*y < 0 && r != 0)))
            .ok_or_else(|| HostError::failed(format!("integer overflow in {x} // {y}"))),
        _ => {
            let divisor = as_float(b)?;
            if divisor == 0.0 {
                return Err(HostError::failed("division by zero"));
            }
            Ok(Value::Float((as_float(a)? / divisor).floor()))
        }
    }
}

fn modulo(a: &Value, b: &Value) -> Result<Value, HostError> {
    match (a, b) {
        (Value::Int(_), Value::Int(0)) => Err(HostError::failed("integer modulo by zero")),
        // Result takes the sign of the divisor.
        (Value::Int(x), Value::Int(y)) => {
            let r = x.wrapping_rem(*y);
            Ok(Value::Int(if r != 0 && (r < 0) != (*y < 0) { r + y } else { r }))
        }
        _ => {
            let (x, y) = (as_float(a)?, as_float(b)?);
            if y == 0.0 {
                return Err(HostError::failed("modulo by zero"));
            }
            Ok(Value::Float(x - y * (x / y).floor()))
        }
    }
}

fn neg(v: Value) -> Result<Value, HostError> {
    match v {
        Value::Int(i) => i
            .checked_neg()
            .map(Value::Int)
            .ok_or_else(|| HostError::failed("integer overflow in negation")),
        Value::Float(f) => Ok(Value::Float(-f)),
        other => Err(HostError::type_error("number", &other)),
    }
}

// ---------------------------------------------------------------------------
// Collections and iteration
// ---------------------------------------------------------------------------

fn len(v: Value) -> Result<Value, HostError> {
    let n = match &v {
        Value::Str(s) => s.chars().count(),
        Value::List(items) => items.len(),
        Value::Map(entries) => entries.len(),
        Value::Iterator { items, position } => items.len().saturating_sub(*position),
        other => return Err(HostError::type_error("sized value", other)),
    };
    Ok(Value::Int(n as i64))
}

fn range(inv: Invocation<'_>) -> Result<Value, HostError> {
    inv.expect_arity(1, 3)?;
    let ints = inv
        .args
        .iter()
        .map(|a| match a {
            Value::Int(i) => Ok(*i),
            other => Err(HostError::type_error("int", other)),
        })
        .collect::<Result<Vec<i64>, _>>()?;
    let (start, stop, step) = match ints.as_slice() {
        [stop] => (0, *stop, 1),
        [start, stop] => (*start, *stop, 1),
        [start, stop, step] => (*start, *stop, *step),
        _ => return Err(HostError::failed("range takes 1 to 3 arguments")),
    };
    if step == 0 {
        return Err(HostError::failed("range step must not be zero"));
    }

    let mut items = Vec::new();
    let mut i = start;
    while (step > 0 && i < stop) || (step < 0 && i > stop) {
        items.push(Value::Int(i));
        match i.checked_add(step) {
            Some(next) => i = next,
            None => break,
        }
    }
    Ok(Value::List(items))
}

fn iter(v: Value) -> Result<Value, HostError> {
    match v {
        it @ Value::Iterator { .. } => Ok(it),
        other => Ok(Value::Iterator {
            items: elements(other)?,
            position: 0,
        }),
    }
}

/// Advances an iterator. With a receiver the advance is visible through the
/// self-output; a plain argument is advanced on a copy.
fn next(mut inv: Invocation<'_>) -> Result<Value, HostError> {
    if let Some(recv) = inv.receiver.as_deref_mut() {
        return advance(recv);
    }
    inv.expect_arity(1, 1)?;
    let mut local = inv.args.remove(0);
    advance(&mut local)
}

fn advance(target: &mut Value) -> Result<Value, HostError> {
    match target {
        Value::Iterator { items, position } => {
            let item = items.get(*position).cloned().ok_or(HostError::Exhausted)?;
            *position += 1;
            Ok(item)
        }
        other => Err(HostError::type_error("iterator", other)),
    }
}

fn list(inv: Invocation<'_>) -> Result<Value, HostError> {
    inv.expect_arity(0, 1)?;
    match inv.args.into_iter().next() {
        Some(v) => Ok(Value::List(elements(v)?)),
        None => Ok(Value::List(Vec::new())),
    }
}

fn sum(v: Value) -> Result<Value, HostError> {
    elements(v)?
        .iter()
        .try_fold(Value::Int(0), |acc, item| add(&acc, item))
}

/// `format(template, *args, **kwargs)`: `{}` consumes the next positional
/// argument, `{name}` looks up a keyword argument.
fn format(inv: Invocation<'_>) -> Result<Value, HostError> {
    let mut args = inv.args.into_iter();
    let template = match args.next() {
        Some(Value::Str(t)) => t,
        Some(other) => return Err(HostError::type_error("str", &other)),
        None => return Err(HostError::Arity { expected: "at least 1".into(), got: 0 }),
    };
    let kwargs: IndexMap<String, Value> = inv.kwargs;

    let mut out = String::new();
    let mut rest = template.as_str();
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let close = after
            .find('}')
            .ok_or_else(|| HostError::failed("unclosed '{' in format string"))?;
        let name = &after[..close];
        let value = if name.is_empty() {
            args.next()
                .ok_or_else(|| HostError::failed("not enough arguments for format string"))?
        } else {
            kwargs
                .get(name)
                .cloned()
                .ok_or_else(|| HostError::failed(format!("missing format argument '{name}'")))?
        };
        out.push_str(&value.to_string());
        rest = &after[close + 1..];
    }
    out.push_str(rest);
    Ok(Value::Str(out))
}
