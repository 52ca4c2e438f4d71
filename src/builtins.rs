//! Built-in function table (spec §6.3): name-dispatch at call resolution,
//! short-circuiting user-function lookup.
//!
//! Builtins receive their arguments already evaluated to [`Value`]s and
//! operate directly on whatever handle an argument names — unlike a user
//! function call, a builtin call never deep-copies its container arguments
//! first. That is what lets `append`/`pop` mutate the caller's array in
//! place: the copy-on-bind rule in spec §4.4.3 is a property of *user*
//! function calls, not of this dispatch table.

use crate::span::Span;
use crate::types::Type;
use crate::value::{Handle, HeapObject, Value};

pub const NAMES: &[&str] = &[
    "print", "to_str", "to_int", "to_float", "strlen", "ord", "length", "append", "pop",
    "contains", "has_key", "keys", "delete",
];

pub fn is_builtin(name: &str) -> bool {
    NAMES.contains(&name)
}

/// Static signature check used by the analyzer: given a builtin's name and
/// its (already-checked) argument types, returns the call's result type or
/// an error message to wrap in a `TypeError`.
pub fn check_signature(name: &str, args: &[Type], span: Span) -> Result<Type, crate::error::NoxyError> {
    use Type::*;
    let err = |msg: String| crate::error::NoxyError::Type { message: msg, span };
    let arity = |n: usize| -> Result<(), crate::error::NoxyError> {
        if args.len() != n {
            Err(err(format!("'{name}' expects {n} argument(s), found {}", args.len())))
        } else {
            Ok(())
        }
    };

    match name {
        "print" => {
            arity(1)?;
            Ok(Void)
        }
        "to_str" => {
            arity(1)?;
            Ok(String)
        }
        "to_int" => {
            arity(1)?;
            match &args[0] {
                Float => Ok(Int),
                other => Err(err(format!("'to_int' expects a float argument, found '{other}'"))),
            }
        }
        "to_float" => {
            arity(1)?;
            match &args[0] {
                Int => Ok(Float),
                other => Err(err(format!("'to_float' expects an int argument, found '{other}'"))),
            }
        }
        "strlen" => {
            arity(1)?;
            match &args[0] {
                String => Ok(Int),
                other => Err(err(format!("'strlen' expects a string argument, found '{other}'"))),
            }
        }
        "ord" => {
            arity(1)?;
            match &args[0] {
                String => Ok(Int),
                other => Err(err(format!("'ord' expects a string argument, found '{other}'"))),
            }
        }
        "length" => {
            arity(1)?;
            match &args[0] {
                FixedArray(..) | DynamicArray(_) | Map(..) | String => Ok(Int),
                other => Err(err(format!("'length' does not accept '{other}'"))),
            }
        }
        "append" => {
            arity(2)?;
            match &args[0] {
                DynamicArray(elem) => {
                    if !args[1].is_assignable_to(elem) {
                        return Err(err(format!(
                            "'append' expects an element of type '{elem}', found '{}'",
                            args[1]
                        )));
                    }
                    Ok(Void)
                }
                other => Err(err(format!("'append' expects a dynamic array, found '{other}'"))),
            }
        }
        "pop" => {
            arity(1)?;
            match &args[0] {
                DynamicArray(elem) => Ok((**elem).clone()),
                other => Err(err(format!("'pop' expects a dynamic array, found '{other}'"))),
            }
        }
        "contains" => {
            arity(2)?;
            match &args[0] {
                DynamicArray(elem) => {
                    if !args[1].is_assignable_to(elem) {
                        return Err(err(format!(
                            "'contains' expects an element of type '{elem}', found '{}'",
                            args[1]
                        )));
                    }
                    Ok(Bool)
                }
                other => Err(err(format!("'contains' expects a dynamic array, found '{other}'"))),
            }
        }
        "has_key" => {
            arity(2)?;
            match &args[0] {
                Map(key, _) => {
                    if !args[1].is_assignable_to(key) {
                        return Err(err(format!(
                            "'has_key' expects a key of type '{key}', found '{}'",
                            args[1]
                        )));
                    }
                    Ok(Bool)
                }
                other => Err(err(format!("'has_key' expects a map, found '{other}'"))),
            }
        }
        "keys" => {
            arity(1)?;
            match &args[0] {
                Map(key, _) => Ok(DynamicArray(Box::new((**key).clone()))),
                other => Err(err(format!("'keys' expects a map, found '{other}'"))),
            }
        }
        "delete" => {
            arity(2)?;
            match &args[0] {
                Map(key, _) => {
                    if !args[1].is_assignable_to(key) {
                        return Err(err(format!(
                            "'delete' expects a key of type '{key}', found '{}'",
                            args[1]
                        )));
                    }
                    Ok(Void)
                }
                other => Err(err(format!("'delete' expects a map, found '{other}'"))),
            }
        }
        other => Err(err(format!("unknown built-in function '{other}'"))),
    }
}

pub enum RuntimeFault {
    DivisionByZero,
    IndexOutOfBounds { index: i64, len: usize },
    MapKeyMissing,
    NullReference,
    BadStringOp(&'static str),
    /// An operator or access was applied to operand shapes the static
    /// analyzer would have rejected (spec §4.3). Only reachable with
    /// `--no-typecheck` (spec §6.1), where an ill-typed but parseable
    /// program runs unchecked and a mismatch must surface as a runtime
    /// error rather than panic (spec §4.5/§6.1, exit code `1`).
    TypeMismatch(std::string::String),
}

impl RuntimeFault {
    pub fn message(&self) -> std::string::String {
        match self {
            RuntimeFault::DivisionByZero => "division by zero".to_string(),
            RuntimeFault::IndexOutOfBounds { index, len } => {
                format!("index {index} out of bounds for length {len}")
            }
            RuntimeFault::MapKeyMissing => "map key missing".to_string(),
            RuntimeFault::NullReference => "null reference access".to_string(),
            RuntimeFault::BadStringOp(op) => format!("'{op}' requires a single-character string"),
            RuntimeFault::TypeMismatch(detail) => format!("type mismatch: {detail}"),
        }
    }
}

/// Executes a builtin call. `heap` backs container/struct arguments;
/// `stdout` collects `print` output lines (the driver decides whether that
/// means stdout or a REPL transcript).
pub fn call(
    name: &str,
    args: Vec<Value>,
    heap: &mut crate::value::Heap,
    stdout: &mut Vec<std::string::String>,
) -> Result<Value, RuntimeFault> {
    match name {
        "print" => {
            stdout.push(args[0].render(heap));
            Ok(Value::Null)
        }
        "to_str" => Ok(Value::Str(args[0].render(heap))),
        "to_int" => match args[0] {
            Value::Float(f) => Ok(Value::Int(f as i64)),
            _ => unreachable!("checked by the analyzer"),
        },
        "to_float" => match args[0] {
            Value::Int(n) => Ok(Value::Float(n as f64)),
            _ => unreachable!("checked by the analyzer"),
        },
        "strlen" => match &args[0] {
            Value::Str(s) => Ok(Value::Int(s.chars().count() as i64)),
            _ => unreachable!("checked by the analyzer"),
        },
        "ord" => match &args[0] {
            Value::Str(s) => {
                let mut chars = s.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Ok(Value::Int(c as i64)),
                    _ => Err(RuntimeFault::BadStringOp("ord")),
                }
            }
            _ => unreachable!("checked by the analyzer"),
        },
        "length" => match &args[0] {
            Value::Str(s) => Ok(Value::Int(s.chars().count() as i64)),
            Value::Array(h) => match heap.get(*h) {
                HeapObject::Array(items) => Ok(Value::Int(items.len() as i64)),
                _ => unreachable!(),
            },
            Value::Map(h) => match heap.get(*h) {
                HeapObject::Map(m) => Ok(Value::Int(m.entries.len() as i64)),
                _ => unreachable!(),
            },
            _ => unreachable!("checked by the analyzer"),
        },
        "append" => {
            let elem = args[1].clone();
            let handle = array_handle(&args[0]);
            match heap.get_mut(handle) {
                HeapObject::Array(items) => items.push(elem),
                _ => unreachable!(),
            }
            Ok(Value::Null)
        }
        "pop" => {
            let handle = array_handle(&args[0]);
            match heap.get_mut(handle) {
                HeapObject::Array(items) => items.pop().ok_or(RuntimeFault::IndexOutOfBounds { index: -1, len: 0 }),
                _ => unreachable!(),
            }
        }
        "contains" => {
            let handle = array_handle(&args[0]);
            match heap.get(handle) {
                HeapObject::Array(items) => Ok(Value::Bool(items.contains(&args[1]))),
                _ => unreachable!(),
            }
        }
        "has_key" => {
            let handle = map_handle(&args[0]);
            match heap.get(handle) {
                HeapObject::Map(m) => Ok(Value::Bool(m.contains_key(&args[1]))),
                _ => unreachable!(),
            }
        }
        "keys" => {
            let handle = map_handle(&args[0]);
            let keys = match heap.get(handle) {
                HeapObject::Map(m) => m.entries.iter().map(|(k, _)| k.clone()).collect(),
                _ => unreachable!(),
            };
            Ok(Value::Array(heap.alloc(HeapObject::Array(keys))))
        }
        "delete" => {
            let handle = map_handle(&args[0]);
            match heap.get_mut(handle) {
                HeapObject::Map(m) => {
                    m.remove(&args[1]);
                }
                _ => unreachable!(),
            }
            Ok(Value::Null)
        }
        _ => unreachable!("unknown builtin reached the evaluator: {name}"),
    }
}

fn array_handle(v: &Value) -> Handle {
    match v {
        Value::Array(h) => *h,
        _ => unreachable!("checked by the analyzer"),
    }
}

fn map_handle(v: &Value) -> Handle {
    match v {
        Value::Map(h) => *h,
        _ => unreachable!("checked by the analyzer"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn length_accepts_arrays_maps_and_strings() {
        let span = Span::default();
        assert!(check_signature("length", &[Type::DynamicArray(Box::new(Type::Int))], span).is_ok());
        assert!(check_signature("length", &[Type::String], span).is_ok());
        assert!(check_signature("length", &[Type::Bool], span).is_err());
    }

    #[test]
    fn append_requires_matching_element_type() {
        let span = Span::default();
        let arr = Type::DynamicArray(Box::new(Type::Int));
        assert!(check_signature("append", &[arr.clone(), Type::Int], span).is_ok());
        assert!(check_signature("append", &[arr, Type::Float], span).is_err());
    }

    #[test]
    fn to_int_rejects_non_float() {
        let span = Span::default();
        assert!(check_signature("to_int", &[Type::Int], span).is_err());
    }
}
