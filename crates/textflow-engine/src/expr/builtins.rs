//! The allow-list: functions, string methods and modules

use std::cmp::Ordering;

use regex::Regex;

use crate::error::{NodeEngineError, Result};

use super::{resolve_index, Value, MAX_SEQUENCE_LEN};

/// Callable free functions
const FUNCTIONS: &[&str] = &[
    "len", "str", "int", "float", "bool", "abs", "round", "min", "max", "sum", "sorted",
];

/// Modules reachable through attribute access and `import`
const MODULES: &[&str] = &["math", "re", "json"];

pub(crate) fn is_function(name: &str) -> bool {
    FUNCTIONS.contains(&name)
}

pub(crate) fn is_module(name: &str) -> bool {
    MODULES.contains(&name)
}

fn unsafe_access(what: String) -> NodeEngineError {
    NodeEngineError::UnsafeExpression(what)
}

fn arity(name: &str, args: &[Value], min: usize, max: usize) -> Result<()> {
    if args.len() < min || args.len() > max {
        return Err(NodeEngineError::expression(format!(
            "{}() takes {} argument(s), got {}",
            name,
            if min == max {
                min.to_string()
            } else {
                format!("{}-{}", min, max)
            },
            args.len()
        )));
    }
    Ok(())
}

fn expect_str<'a>(name: &str, value: &'a Value) -> Result<&'a str> {
    match value {
        Value::Str(s) => Ok(s),
        other => Err(NodeEngineError::expression(format!(
            "{}() expects a string, got {}",
            name,
            other.type_name()
        ))),
    }
}

fn expect_int(name: &str, value: &Value) -> Result<i64> {
    match value {
        Value::Int(n) => Ok(*n),
        Value::Bool(b) => Ok(*b as i64),
        other => Err(NodeEngineError::expression(format!(
            "{}() expects an integer, got {}",
            name,
            other.type_name()
        ))),
    }
}

fn expect_number(name: &str, value: &Value) -> Result<f64> {
    value.as_f64().ok_or_else(|| {
        NodeEngineError::expression(format!(
            "{}() expects a number, got {}",
            name,
            value.type_name()
        ))
    })
}

/// Arguments of min/max/sum/sorted: either one list or several values
fn spread(args: Vec<Value>) -> Vec<Value> {
    match args.as_slice() {
        [Value::List(items)] => items.clone(),
        _ => args,
    }
}

fn float_to_int(name: &str, f: f64) -> Result<Value> {
    if !f.is_finite() || f.abs() >= 9.2e18 {
        return Err(NodeEngineError::expression(format!(
            "{}() cannot convert {} to an integer",
            name, f
        )));
    }
    Ok(Value::Int(f as i64))
}

pub(crate) fn call_function(name: &str, args: Vec<Value>) -> Result<Value> {
    match name {
        "len" => {
            arity(name, &args, 1, 1)?;
            match &args[0] {
                Value::Str(s) => Ok(Value::Int(s.chars().count() as i64)),
                Value::List(items) => Ok(Value::Int(items.len() as i64)),
                other => Err(NodeEngineError::expression(format!(
                    "object of type {} has no len()",
                    other.type_name()
                ))),
            }
        }
        "str" => {
            arity(name, &args, 0, 1)?;
            Ok(Value::Str(args.first().map(|v| v.to_string()).unwrap_or_default()))
        }
        "int" => {
            arity(name, &args, 1, 1)?;
            match &args[0] {
                Value::Int(n) => Ok(Value::Int(*n)),
                Value::Bool(b) => Ok(Value::Int(*b as i64)),
                Value::Float(f) => float_to_int(name, f.trunc()),
                Value::Str(s) => s.trim().parse::<i64>().map(Value::Int).map_err(|_| {
                    NodeEngineError::expression(format!("invalid literal for int(): '{}'", s))
                }),
                other => Err(NodeEngineError::expression(format!(
                    "int() cannot convert {}",
                    other.type_name()
                ))),
            }
        }
        "float" => {
            arity(name, &args, 1, 1)?;
            match &args[0] {
                Value::Str(s) => s.trim().parse::<f64>().map(Value::Float).map_err(|_| {
                    NodeEngineError::expression(format!("could not convert '{}' to float", s))
                }),
                other => expect_number(name, other).map(Value::Float),
            }
        }
        "bool" => {
            arity(name, &args, 1, 1)?;
            Ok(Value::Bool(args[0].is_truthy()))
        }
        "abs" => {
            arity(name, &args, 1, 1)?;
            match &args[0] {
                Value::Int(n) => n
                    .checked_abs()
                    .map(Value::Int)
                    .ok_or_else(|| NodeEngineError::expression("integer overflow")),
                other => expect_number(name, other).map(|f| Value::Float(f.abs())),
            }
        }
        "round" => {
            arity(name, &args, 1, 2)?;
            let x = expect_number(name, &args[0])?;
            match args.get(1) {
                None => float_to_int(name, x.round()),
                Some(digits) => {
                    let digits = expect_int(name, digits)?.clamp(-15, 15) as i32;
                    let scale = 10f64.powi(digits);
                    Ok(Value::Float((x * scale).round() / scale))
                }
            }
        }
        "min" | "max" => {
            let items = spread(args);
            let mut iter = items.into_iter();
            let Some(mut best) = iter.next() else {
                return Err(NodeEngineError::expression(format!(
                    "{}() arg is an empty sequence",
                    name
                )));
            };
            let wanted = if name == "min" {
                Ordering::Less
            } else {
                Ordering::Greater
            };
            for item in iter {
                if item.compare(&best)? == wanted {
                    best = item;
                }
            }
            Ok(best)
        }
        "sum" => {
            let items = spread(args);
            let mut total = Value::Int(0);
            for item in items {
                total = match (&total, &item) {
                    (Value::Int(a), Value::Int(b)) => a
                        .checked_add(*b)
                        .map(Value::Int)
                        .ok_or_else(|| NodeEngineError::expression("integer overflow"))?,
                    _ => Value::Float(expect_number(name, &total)? + expect_number(name, &item)?),
                };
            }
            Ok(total)
        }
        "sorted" => {
            let mut items = spread(args);
            let mut failure = None;
            items.sort_by(|a, b| {
                a.compare(b).unwrap_or_else(|e| {
                    failure.get_or_insert(e);
                    Ordering::Equal
                })
            });
            match failure {
                Some(e) => Err(e),
                None => Ok(Value::List(items)),
            }
        }
        _ => Err(unsafe_access(format!("function '{}' is not allowed", name))),
    }
}

pub(crate) fn call_method(receiver: &Value, method: &str, args: Vec<Value>) -> Result<Value> {
    match receiver {
        Value::Str(s) => string_method(s, method, args),
        Value::List(items) => match method {
            "count" => {
                arity(method, &args, 1, 1)?;
                Ok(Value::Int(items.iter().filter(|v| **v == args[0]).count() as i64))
            }
            "index" => {
                arity(method, &args, 1, 1)?;
                items
                    .iter()
                    .position(|v| *v == args[0])
                    .map(|pos| Value::Int(pos as i64))
                    .ok_or_else(|| NodeEngineError::expression("value is not in list"))
            }
            _ => Err(unsafe_access(format!("list method '{}' is not allowed", method))),
        },
        other => Err(unsafe_access(format!(
            "method '{}' on {} is not allowed",
            method,
            other.type_name()
        ))),
    }
}

fn string_method(s: &str, method: &str, args: Vec<Value>) -> Result<Value> {
    let text = |v: String| Ok(Value::Str(v));
    match method {
        "upper" => text(s.to_uppercase()),
        "lower" => text(s.to_lowercase()),
        "strip" | "lstrip" | "rstrip" => {
            arity(method, &args, 0, 1)?;
            let chars: Option<Vec<char>> = match args.first() {
                Some(v) => Some(expect_str(method, v)?.chars().collect()),
                None => None,
            };
            let pred = |c: char| match &chars {
                Some(set) => set.contains(&c),
                None => c.is_whitespace(),
            };
            let stripped = match method {
                "strip" => s.trim_matches(pred),
                "lstrip" => s.trim_start_matches(pred),
                _ => s.trim_end_matches(pred),
            };
            text(stripped.to_string())
        }
        "title" => {
            let mut out = String::with_capacity(s.len());
            let mut at_word_start = true;
            for c in s.chars() {
                if c.is_alphabetic() {
                    if at_word_start {
                        out.extend(c.to_uppercase());
                    } else {
                        out.extend(c.to_lowercase());
                    }
                    at_word_start = false;
                } else {
                    out.push(c);
                    at_word_start = true;
                }
            }
            text(out)
        }
        "capitalize" => {
            let mut chars = s.chars();
            let out = match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            };
            text(out)
        }
        "replace" => {
            arity(method, &args, 2, 2)?;
            let from = expect_str(method, &args[0])?;
            let to = expect_str(method, &args[1])?;
            if from.is_empty() {
                return Err(NodeEngineError::expression("replace() pattern must not be empty"));
            }
            let replaced = s.replace(from, to);
            if replaced.len() > MAX_SEQUENCE_LEN {
                return Err(NodeEngineError::expression("string too large"));
            }
            text(replaced)
        }
        "split" => {
            arity(method, &args, 0, 1)?;
            let parts: Vec<Value> = match args.first() {
                Some(sep) => {
                    let sep = expect_str(method, sep)?;
                    if sep.is_empty() {
                        return Err(NodeEngineError::expression("empty separator"));
                    }
                    s.split(sep).map(|p| Value::Str(p.to_string())).collect()
                }
                None => s.split_whitespace().map(|p| Value::Str(p.to_string())).collect(),
            };
            Ok(Value::List(parts))
        }
        "startswith" => {
            arity(method, &args, 1, 1)?;
            Ok(Value::Bool(s.starts_with(expect_str(method, &args[0])?)))
        }
        "endswith" => {
            arity(method, &args, 1, 1)?;
            Ok(Value::Bool(s.ends_with(expect_str(method, &args[0])?)))
        }
        "find" => {
            arity(method, &args, 1, 1)?;
            let needle = expect_str(method, &args[0])?;
            Ok(Value::Int(match s.find(needle) {
                Some(byte) => s[..byte].chars().count() as i64,
                None => -1,
            }))
        }
        "count" => {
            arity(method, &args, 1, 1)?;
            let needle = expect_str(method, &args[0])?;
            if needle.is_empty() {
                return Ok(Value::Int(s.chars().count() as i64 + 1));
            }
            Ok(Value::Int(s.matches(needle).count() as i64))
        }
        "zfill" => {
            arity(method, &args, 1, 1)?;
            let width = expect_int(method, &args[0])?.clamp(0, MAX_SEQUENCE_LEN as i64) as usize;
            let len = s.chars().count();
            if len >= width {
                return text(s.to_string());
            }
            let (sign, digits) = match s.strip_prefix(['-', '+']) {
                Some(rest) => (&s[..1], rest),
                None => ("", s),
            };
            text(format!("{}{}{}", sign, "0".repeat(width - len), digits))
        }
        "join" => {
            arity(method, &args, 1, 1)?;
            let Value::List(items) = &args[0] else {
                return Err(NodeEngineError::expression("join() expects a list"));
            };
            let parts = items
                .iter()
                .map(|item| expect_str(method, item).map(str::to_string))
                .collect::<Result<Vec<_>>>()?;
            text(parts.join(s))
        }
        _ => Err(unsafe_access(format!("string method '{}' is not allowed", method))),
    }
}

pub(crate) fn module_constant(module: &str, name: &str) -> Result<Value> {
    match (module, name) {
        ("math", "pi") => Ok(Value::Float(std::f64::consts::PI)),
        ("math", "e") => Ok(Value::Float(std::f64::consts::E)),
        _ => Err(unsafe_access(format!(
            "attribute '{}.{}' is not allowed",
            module, name
        ))),
    }
}

pub(crate) fn call_module(module: &str, name: &str, args: Vec<Value>) -> Result<Value> {
    match module {
        "math" => math(name, args),
        "re" => re(name, args),
        "json" => json(name, args),
        _ => Err(unsafe_access(format!("module '{}' is not allowed", module))),
    }
}

fn math(name: &str, args: Vec<Value>) -> Result<Value> {
    match name {
        "sqrt" => {
            arity(name, &args, 1, 1)?;
            let x = expect_number(name, &args[0])?;
            if x < 0.0 {
                return Err(NodeEngineError::expression("math domain error"));
            }
            Ok(Value::Float(x.sqrt()))
        }
        "floor" => {
            arity(name, &args, 1, 1)?;
            float_to_int(name, expect_number(name, &args[0])?.floor())
        }
        "ceil" => {
            arity(name, &args, 1, 1)?;
            float_to_int(name, expect_number(name, &args[0])?.ceil())
        }
        "pow" => {
            arity(name, &args, 2, 2)?;
            let base = expect_number(name, &args[0])?;
            let exp = expect_number(name, &args[1])?;
            Ok(Value::Float(base.powf(exp)))
        }
        "log" => {
            arity(name, &args, 1, 2)?;
            let x = expect_number(name, &args[0])?;
            if x <= 0.0 {
                return Err(NodeEngineError::expression("math domain error"));
            }
            match args.get(1) {
                Some(base) => Ok(Value::Float(x.log(expect_number(name, base)?))),
                None => Ok(Value::Float(x.ln())),
            }
        }
        "exp" => {
            arity(name, &args, 1, 1)?;
            Ok(Value::Float(expect_number(name, &args[0])?.exp()))
        }
        _ => Err(unsafe_access(format!("function 'math.{}' is not allowed", name))),
    }
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern)
        .map_err(|e| NodeEngineError::expression(format!("invalid pattern '{}': {}", pattern, e)))
}

fn re(name: &str, args: Vec<Value>) -> Result<Value> {
    match name {
        "sub" => {
            arity(name, &args, 3, 3)?;
            let pattern = compile(expect_str(name, &args[0])?)?;
            let replacement = expect_str(name, &args[1])?;
            let subject = expect_str(name, &args[2])?;
            Ok(Value::Str(pattern.replace_all(subject, replacement).into_owned()))
        }
        "search" => {
            arity(name, &args, 2, 2)?;
            let pattern = compile(expect_str(name, &args[0])?)?;
            let subject = expect_str(name, &args[1])?;
            Ok(pattern
                .find(subject)
                .map(|m| Value::Str(m.as_str().to_string()))
                .unwrap_or(Value::None))
        }
        "findall" => {
            arity(name, &args, 2, 2)?;
            let pattern = compile(expect_str(name, &args[0])?)?;
            let subject = expect_str(name, &args[1])?;
            let group = usize::from(pattern.captures_len() > 1);
            let found = pattern
                .captures_iter(subject)
                .filter_map(|caps| caps.get(group))
                .map(|m| Value::Str(m.as_str().to_string()))
                .collect();
            Ok(Value::List(found))
        }
        _ => Err(unsafe_access(format!("function 're.{}' is not allowed", name))),
    }
}

fn to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::None => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Int(n) => serde_json::Value::from(*n),
        Value::Float(f) => serde_json::Value::from(*f),
        Value::Str(s) => serde_json::Value::String(s.clone()),
        Value::List(items) => serde_json::Value::Array(items.iter().map(to_json).collect()),
    }
}

fn from_json(value: &serde_json::Value) -> Value {
    match value {
        serde_json::Value::Null => Value::None,
        serde_json::Value::Bool(b) => Value::Bool(*b),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => Value::Int(i),
            None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
        },
        serde_json::Value::String(s) => Value::Str(s.clone()),
        serde_json::Value::Array(items) => Value::List(items.iter().map(from_json).collect()),
        serde_json::Value::Object(_) => Value::Str(value.to_string()),
    }
}

fn json(name: &str, args: Vec<Value>) -> Result<Value> {
    match name {
        "dumps" => {
            arity(name, &args, 1, 1)?;
            Ok(Value::Str(to_json(&args[0]).to_string()))
        }
        "get" => {
            arity(name, &args, 2, 2)?;
            let document: serde_json::Value = serde_json::from_str(expect_str(name, &args[0])?)
                .map_err(|e| NodeEngineError::expression(format!("invalid JSON: {}", e)))?;
            let path = expect_str(name, &args[1])?;
            let mut current = &document;
            for key in path.split('.').filter(|k| !k.is_empty()) {
                let next = match current {
                    serde_json::Value::Array(items) => key
                        .parse::<i64>()
                        .ok()
                        .and_then(|i| resolve_index(i, items.len()))
                        .map(|i| &items[i]),
                    serde_json::Value::Object(map) => map.get(key),
                    _ => None,
                };
                match next {
                    Some(value) => current = value,
                    None => return Ok(Value::None),
                }
            }
            Ok(from_json(current))
        }
        _ => Err(unsafe_access(format!("function 'json.{}' is not allowed", name))),
    }
}

#[cfg(test)]
mod tests {
    use crate::expr::{evaluate, evaluate_to_string, Value};

    #[test]
    fn test_functions() {
        assert_eq!(evaluate("len('héllo')").unwrap(), Value::Int(5));
        assert_eq!(evaluate("int('42') + 1").unwrap(), Value::Int(43));
        assert_eq!(evaluate("round(2.567, 2)").unwrap(), Value::Float(2.57));
        assert_eq!(evaluate("max(3, 9, 4)").unwrap(), Value::Int(9));
        assert_eq!(evaluate("min([5, 2])").unwrap(), Value::Int(2));
        assert_eq!(evaluate("sum([1, 2, 3.5])").unwrap(), Value::Float(6.5));
        assert_eq!(evaluate_to_string("sorted(['b', 'a'])").unwrap(), "['a', 'b']");
        assert!(evaluate("sorted([1, 'a'])").is_err());
    }

    #[test]
    fn test_string_methods() {
        assert_eq!(evaluate_to_string("'  hi  '.strip().upper()").unwrap(), "HI");
        assert_eq!(evaluate_to_string("'hello world'.title()").unwrap(), "Hello World");
        assert_eq!(evaluate_to_string("'a,b'.split(',')").unwrap(), "['a', 'b']");
        assert_eq!(evaluate_to_string("'-'.join(['a', 'b'])").unwrap(), "a-b");
        assert_eq!(evaluate_to_string("'7'.zfill(3)").unwrap(), "007");
        assert_eq!(evaluate("'banana'.find('n')").unwrap(), Value::Int(2));
    }

    #[test]
    fn test_modules() {
        assert_eq!(evaluate("math.sqrt(16)").unwrap(), Value::Float(4.0));
        assert_eq!(evaluate("math.ceil(1.2)").unwrap(), Value::Int(2));
        assert_eq!(
            evaluate_to_string("re.findall('(\\\\d+)', 'a1 b22')").unwrap(),
            "['1', '22']"
        );
        assert_eq!(evaluate("re.search('z', 'abc')").unwrap(), Value::None);
        assert_eq!(
            evaluate_to_string("json.get('{\"a\": {\"b\": [1, 2]}}', 'a.b.1')").unwrap(),
            "2"
        );
        assert_eq!(evaluate_to_string("json.dumps([1, 'x'])").unwrap(), "[1,\"x\"]");
    }
}
