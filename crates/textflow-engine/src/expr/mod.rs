//! Restricted inline expression language
//!
//! Backtick segments in parameter values and button callback scripts are
//! evaluated here. The language is deliberately small: literals, lists,
//! arithmetic, comparisons, boolean logic, conditionals, indexing and calls
//! into a closed allow-list of functions, string methods and three modules
//! (`math`, `re`, `json`). There are no variables, assignments or loops.
//!
//! Reaching outside the allow-list (an unknown function, any other module,
//! any other attribute) fails with [`NodeEngineError::UnsafeExpression`]
//! instead of being evaluated.

mod builtins;
mod parser;

use std::cmp::Ordering;
use std::fmt;

use crate::error::{NodeEngineError, Result};

use parser::{BinaryOp, Expr, Program};

/// Longest string or list an expression may build
pub(crate) const MAX_SEQUENCE_LEN: usize = 1_000_000;

/// A runtime value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
}

impl Value {
    /// Name of the value's type, for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "None",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::List(_) => "list",
        }
    }

    /// Truthiness used by `and`, `or`, `not` and conditionals
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(items) => !items.is_empty(),
        }
    }

    /// Quoted form used inside list displays
    pub fn repr(&self) -> String {
        match self {
            Value::Str(s) => format!("'{}'", s.replace('\\', "\\\\").replace('\'', "\\'")),
            other => other.to_string(),
        }
    }

    /// Numeric view of ints, floats and bools
    pub(crate) fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::Float(f) => Some(*f),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    /// Literal source text that evaluates back to this value
    ///
    /// Used when a global variable is spliced into an expression.
    pub fn literal_for(text: &str) -> String {
        let trimmed = text.trim();
        if let Ok(n) = trimmed.parse::<i64>() {
            n.to_string()
        } else if let Some(f) = trimmed.parse::<f64>().ok().filter(|f| f.is_finite()) {
            format!("{:?}", f)
        } else {
            format!(
                "\"{}\"",
                text.replace('\\', "\\\\")
                    .replace('"', "\\\"")
                    .replace('\n', "\\n")
                    .replace('\t', "\\t")
                    .replace('\r', "\\r")
            )
        }
    }

    pub(crate) fn compare(&self, other: &Value) -> Result<Ordering> {
        match (self, other) {
            (Value::Str(a), Value::Str(b)) => Ok(a.cmp(b)),
            (Value::List(a), Value::List(b)) => {
                for (x, y) in a.iter().zip(b) {
                    let ord = x.compare(y)?;
                    if ord != Ordering::Equal {
                        return Ok(ord);
                    }
                }
                Ok(a.len().cmp(&b.len()))
            }
            (Value::Int(a), Value::Int(b)) => Ok(a.cmp(b)),
            _ => match (self.as_f64(), other.as_f64()) {
                (Some(a), Some(b)) => a.partial_cmp(&b).ok_or_else(|| {
                    NodeEngineError::expression("cannot order NaN")
                }),
                _ => Err(NodeEngineError::expression(format!(
                    "cannot compare {} with {}",
                    self.type_name(),
                    other.type_name()
                ))),
            },
        }
    }

    fn loosely_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::List(a), Value::List(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.loosely_equals(y))
            }
            (Value::Str(_), _) | (_, Value::Str(_)) | (Value::None, _) | (_, Value::None) => {
                self == other
            }
            _ => match (self.as_f64(), other.as_f64()) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            },
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => write!(f, "None"),
            Value::Bool(true) => write!(f, "True"),
            Value::Bool(false) => write!(f, "False"),
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(x) => write!(f, "{:?}", x),
            Value::Str(s) => write!(f, "{}", s),
            Value::List(items) => {
                let parts: Vec<String> = items.iter().map(Value::repr).collect();
                write!(f, "[{}]", parts.join(", "))
            }
        }
    }
}

/// Parse and evaluate an expression
pub fn evaluate(source: &str) -> Result<Value> {
    let program = parser::parse(source)?;
    Interpreter::new(&program)?.eval(&program.body)
}

/// Evaluate an expression and render the result as text
pub fn evaluate_to_string(source: &str) -> Result<String> {
    evaluate(source).map(|value| value.to_string())
}

struct Interpreter;

impl Interpreter {
    fn new(program: &Program) -> Result<Self> {
        for module in &program.imports {
            if !builtins::is_module(module) {
                return Err(NodeEngineError::UnsafeExpression(format!(
                    "import of '{}' is not allowed",
                    module
                )));
            }
        }
        Ok(Self)
    }

    fn eval(&self, expr: &Expr) -> Result<Value> {
        match expr {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Name(name) => {
                if builtins::is_module(name) || builtins::is_function(name) {
                    Err(NodeEngineError::expression(format!(
                        "'{}' cannot be used as a value",
                        name
                    )))
                } else {
                    Err(NodeEngineError::expression(format!(
                        "name '{}' is not defined",
                        name
                    )))
                }
            }
            Expr::List(items) => {
                let values = items
                    .iter()
                    .map(|item| self.eval(item))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Value::List(values))
            }
            Expr::Neg(inner) => match self.eval(inner)? {
                Value::Int(n) => n
                    .checked_neg()
                    .map(Value::Int)
                    .ok_or_else(|| NodeEngineError::expression("integer overflow")),
                Value::Float(f) => Ok(Value::Float(-f)),
                Value::Bool(b) => Ok(Value::Int(-(b as i64))),
                other => Err(NodeEngineError::expression(format!(
                    "bad operand type for unary -: {}",
                    other.type_name()
                ))),
            },
            Expr::Not(inner) => Ok(Value::Bool(!self.eval(inner)?.is_truthy())),
            Expr::And(left, right) => {
                let left = self.eval(left)?;
                if left.is_truthy() {
                    self.eval(right)
                } else {
                    Ok(left)
                }
            }
            Expr::Or(left, right) => {
                let left = self.eval(left)?;
                if left.is_truthy() {
                    Ok(left)
                } else {
                    self.eval(right)
                }
            }
            Expr::Conditional {
                condition,
                then,
                otherwise,
            } => {
                if self.eval(condition)?.is_truthy() {
                    self.eval(then)
                } else {
                    self.eval(otherwise)
                }
            }
            Expr::Binary(op, left, right) => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                binary(*op, left, right)
            }
            Expr::Index(target, index) => {
                let target = self.eval(target)?;
                let index = self.eval(index)?;
                index_value(&target, &index)
            }
            Expr::Attribute(target, attr) => match target.as_ref() {
                Expr::Name(module) if builtins::is_module(module) => {
                    builtins::module_constant(module, attr)
                }
                _ => Err(NodeEngineError::UnsafeExpression(format!(
                    "attribute access '.{}' is not allowed",
                    attr
                ))),
            },
            Expr::Call(callee, args) => {
                let args = args
                    .iter()
                    .map(|arg| self.eval(arg))
                    .collect::<Result<Vec<_>>>()?;
                match callee.as_ref() {
                    Expr::Name(name) => builtins::call_function(name, args),
                    Expr::Attribute(target, attr) => match target.as_ref() {
                        Expr::Name(module) if builtins::is_module(module) => {
                            builtins::call_module(module, attr, args)
                        }
                        receiver => {
                            let receiver = self.eval(receiver)?;
                            builtins::call_method(&receiver, attr, args)
                        }
                    },
                    _ => Err(NodeEngineError::expression("expression is not callable")),
                }
            }
        }
    }
}

fn type_error(op: &str, left: &Value, right: &Value) -> NodeEngineError {
    NodeEngineError::expression(format!(
        "unsupported operand types for {}: {} and {}",
        op,
        left.type_name(),
        right.type_name()
    ))
}

fn operator_symbol(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::Add => "+",
        BinaryOp::Sub => "-",
        BinaryOp::Mul => "*",
        BinaryOp::Div => "/",
        BinaryOp::FloorDiv => "//",
        BinaryOp::Mod => "%",
        BinaryOp::Pow => "**",
        BinaryOp::Eq => "==",
        BinaryOp::Ne => "!=",
        BinaryOp::Lt => "<",
        BinaryOp::Le => "<=",
        BinaryOp::Gt => ">",
        BinaryOp::Ge => ">=",
    }
}

fn overflow() -> NodeEngineError {
    NodeEngineError::expression("integer overflow")
}

fn repeat<T: Clone>(items: &[T], times: i64) -> Result<Vec<T>> {
    let times = times.max(0) as usize;
    if items.len().saturating_mul(times) > MAX_SEQUENCE_LEN {
        return Err(NodeEngineError::expression("sequence repetition too large"));
    }
    Ok(std::iter::repeat_n(items, times).flatten().cloned().collect())
}

fn int_operands(left: &Value, right: &Value) -> Option<(i64, i64)> {
    let as_int = |v: &Value| match v {
        Value::Int(n) => Some(*n),
        Value::Bool(b) => Some(*b as i64),
        _ => None,
    };
    Some((as_int(left)?, as_int(right)?))
}

fn binary(op: BinaryOp, left: Value, right: Value) -> Result<Value> {
    match op {
        BinaryOp::Eq => return Ok(Value::Bool(left.loosely_equals(&right))),
        BinaryOp::Ne => return Ok(Value::Bool(!left.loosely_equals(&right))),
        BinaryOp::Lt => return Ok(Value::Bool(left.compare(&right)? == Ordering::Less)),
        BinaryOp::Le => return Ok(Value::Bool(left.compare(&right)? != Ordering::Greater)),
        BinaryOp::Gt => return Ok(Value::Bool(left.compare(&right)? == Ordering::Greater)),
        BinaryOp::Ge => return Ok(Value::Bool(left.compare(&right)? != Ordering::Less)),
        _ => {}
    }

    match (op, &left, &right) {
        (BinaryOp::Add, Value::Str(a), Value::Str(b)) => {
            if a.len() + b.len() > MAX_SEQUENCE_LEN {
                return Err(NodeEngineError::expression("string too large"));
            }
            return Ok(Value::Str(format!("{}{}", a, b)));
        }
        (BinaryOp::Add, Value::List(a), Value::List(b)) => {
            let mut items = a.clone();
            items.extend(b.iter().cloned());
            return Ok(Value::List(items));
        }
        (BinaryOp::Mul, Value::Str(s), Value::Int(n)) | (BinaryOp::Mul, Value::Int(n), Value::Str(s)) => {
            let chars: Vec<char> = s.chars().collect();
            return Ok(Value::Str(repeat(&chars, *n)?.into_iter().collect()));
        }
        (BinaryOp::Mul, Value::List(items), Value::Int(n))
        | (BinaryOp::Mul, Value::Int(n), Value::List(items)) => {
            return Ok(Value::List(repeat(items, *n)?));
        }
        _ => {}
    }

    if let Some((a, b)) = int_operands(&left, &right) {
        return match op {
            BinaryOp::Add => a.checked_add(b).map(Value::Int).ok_or_else(overflow),
            BinaryOp::Sub => a.checked_sub(b).map(Value::Int).ok_or_else(overflow),
            BinaryOp::Mul => a.checked_mul(b).map(Value::Int).ok_or_else(overflow),
            BinaryOp::Div => {
                if b == 0 {
                    Err(NodeEngineError::expression("division by zero"))
                } else {
                    Ok(Value::Float(a as f64 / b as f64))
                }
            }
            BinaryOp::FloorDiv => {
                if b == 0 {
                    return Err(NodeEngineError::expression("division by zero"));
                }
                let q = a.checked_div(b).ok_or_else(overflow)?;
                if a % b != 0 && ((a < 0) != (b < 0)) {
                    Ok(Value::Int(q - 1))
                } else {
                    Ok(Value::Int(q))
                }
            }
            BinaryOp::Mod => {
                if b == 0 {
                    return Err(NodeEngineError::expression("modulo by zero"));
                }
                let r = a.checked_rem(b).ok_or_else(overflow)?;
                if r != 0 && ((r < 0) != (b < 0)) {
                    Ok(Value::Int(r + b))
                } else {
                    Ok(Value::Int(r))
                }
            }
            BinaryOp::Pow => {
                if b >= 0 {
                    let exp = u32::try_from(b).map_err(|_| overflow())?;
                    a.checked_pow(exp).map(Value::Int).ok_or_else(overflow)
                } else {
                    Ok(Value::Float((a as f64).powf(b as f64)))
                }
            }
            _ => Err(type_error(operator_symbol(op), &left, &right)),
        };
    }

    let symbol = operator_symbol(op);
    let (Some(a), Some(b)) = (left.as_f64(), right.as_f64()) else {
        return Err(type_error(symbol, &left, &right));
    };
    let result = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div | BinaryOp::FloorDiv | BinaryOp::Mod if b == 0.0 => {
            return Err(NodeEngineError::expression("division by zero"))
        }
        BinaryOp::Div => a / b,
        BinaryOp::FloorDiv => (a / b).floor(),
        BinaryOp::Mod => a - b * (a / b).floor(),
        BinaryOp::Pow => a.powf(b),
        _ => return Err(type_error(symbol, &left, &right)),
    };
    Ok(Value::Float(result))
}

/// Resolve a possibly negative index against a length
pub(crate) fn resolve_index(index: i64, len: usize) -> Option<usize> {
    let len = len as i64;
    let resolved = if index < 0 { index + len } else { index };
    (0..len).contains(&resolved).then_some(resolved as usize)
}

fn index_value(target: &Value, index: &Value) -> Result<Value> {
    let Value::Int(i) = index else {
        return Err(NodeEngineError::expression(format!(
            "indices must be integers, not {}",
            index.type_name()
        )));
    };
    match target {
        Value::Str(s) => {
            let chars: Vec<char> = s.chars().collect();
            resolve_index(*i, chars.len())
                .map(|pos| Value::Str(chars[pos].to_string()))
                .ok_or_else(|| NodeEngineError::expression("string index out of range"))
        }
        Value::List(items) => resolve_index(*i, items.len())
            .map(|pos| items[pos].clone())
            .ok_or_else(|| NodeEngineError::expression("list index out of range")),
        other => Err(NodeEngineError::expression(format!(
            "{} is not indexable",
            other.type_name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(source: &str) -> Value {
        evaluate(source).unwrap_or_else(|e| panic!("{} failed: {}", source, e))
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(eval("1 + 2 * 3"), Value::Int(7));
        assert_eq!(eval("7 / 2"), Value::Float(3.5));
        assert_eq!(eval("-7 // 2"), Value::Int(-4));
        assert_eq!(eval("-7 % 3"), Value::Int(2));
        assert_eq!(eval("2 ** 10"), Value::Int(1024));
        assert_eq!(eval("2 ** -1"), Value::Float(0.5));
        assert_eq!(eval("1.5 + 1"), Value::Float(2.5));
    }

    #[test]
    fn test_strings_and_lists() {
        assert_eq!(eval("'ab' + \"cd\""), Value::Str("abcd".into()));
        assert_eq!(eval("'ab' * 3"), Value::Str("ababab".into()));
        assert_eq!(eval("[1, 2][-1]"), Value::Int(2));
        assert_eq!(eval("'hello'[1]"), Value::Str("e".into()));
        assert_eq!(evaluate_to_string("[1, 'a']").unwrap(), "[1, 'a']");
    }

    #[test]
    fn test_logic_and_conditionals() {
        assert_eq!(eval("1 < 2 and 'x'"), Value::Str("x".into()));
        assert_eq!(eval("0 or 'fallback'"), Value::Str("fallback".into()));
        assert_eq!(eval("not ''"), Value::Bool(true));
        assert_eq!(eval("'big' if 10 > 3 else 'small'"), Value::Str("big".into()));
        assert_eq!(eval("1 == 1.0"), Value::Bool(true));
        assert_eq!(eval("'1' == 1"), Value::Bool(false));
    }

    #[test]
    fn test_bools_render_capitalised() {
        assert_eq!(evaluate_to_string("1 < 2").unwrap(), "True");
        assert_eq!(evaluate_to_string("str(not 1)").unwrap(), "False");
        assert_eq!(evaluate_to_string("[True, 'a']").unwrap(), "[True, 'a']");
    }

    #[test]
    fn test_deep_prefix_chain_is_an_error() {
        let negations = format!("{}1", "-".repeat(5_000));
        assert!(matches!(evaluate(&negations), Err(NodeEngineError::Expression(_))));

        let nots = format!("{}True", "not ".repeat(5_000));
        assert!(matches!(evaluate(&nots), Err(NodeEngineError::Expression(_))));

        let powers = vec!["2"; 5_000].join(" ** ");
        assert!(matches!(evaluate(&powers), Err(NodeEngineError::Expression(_))));

        assert_eq!(eval("--1"), Value::Int(1));
        assert_eq!(eval("not not True"), Value::Bool(true));
    }

    #[test]
    fn test_runtime_errors() {
        assert!(matches!(evaluate("1 / 0"), Err(NodeEngineError::Expression(_))));
        assert!(matches!(evaluate("'a' - 1"), Err(NodeEngineError::Expression(_))));
        assert!(matches!(evaluate("undefined"), Err(NodeEngineError::Expression(_))));
        assert!(matches!(evaluate("[1][5]"), Err(NodeEngineError::Expression(_))));
        assert!(evaluate("9223372036854775807 + 1").is_err());
        assert!(evaluate("'x' * 100000000").is_err());
    }

    #[test]
    fn test_allow_list_is_enforced() {
        assert!(matches!(
            evaluate("import os; 1"),
            Err(NodeEngineError::UnsafeExpression(_))
        ));
        assert!(matches!(
            evaluate("open('/etc/passwd')"),
            Err(NodeEngineError::UnsafeExpression(_))
        ));
        assert!(matches!(
            evaluate("'x'.__class__"),
            Err(NodeEngineError::UnsafeExpression(_))
        ));
        assert!(matches!(
            evaluate("math.system('ls')"),
            Err(NodeEngineError::UnsafeExpression(_))
        ));
        assert!(matches!(
            evaluate("'x'.encode()"),
            Err(NodeEngineError::UnsafeExpression(_))
        ));
    }

    #[test]
    fn test_imports_of_allowed_modules() {
        assert_eq!(eval("import math; math.floor(2.7)"), Value::Int(2));
        assert_eq!(eval("import re, json; re.sub('a', 'b', 'aa')"), Value::Str("bb".into()));
    }

    #[test]
    fn test_literal_for() {
        assert_eq!(Value::literal_for("42"), "42");
        assert_eq!(Value::literal_for(".5"), "0.5");
        assert_eq!(Value::literal_for("bar"), "\"bar\"");
        assert_eq!(Value::literal_for("say \"hi\""), "\"say \\\"hi\\\"\"");
        assert_eq!(evaluate_to_string(&Value::literal_for("a\nb")).unwrap(), "a\nb");
    }
}
