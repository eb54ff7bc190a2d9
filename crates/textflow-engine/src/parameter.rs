//! Typed node parameters and the expression overlay
//!
//! A [`Parameter`] stores a raw value. [`Parameter::eval`] never touches
//! that value; for string-bearing types it returns an expanded copy when
//! the raw text contains expression markers.
//!
//! Backtick segments are located in the raw text first, so backticks
//! inside substituted values are plain text. Each segment then goes
//! through three stages in order, each a single left-to-right pass over
//! the output of the previous one:
//!
//! 1. `$$` becomes the current loop index minus one.
//! 2. `$NAME` becomes the global variable `NAME` (as a literal inside a
//!    backtick segment). Unknown names stay put with a warning.
//! 3. `[[i]]`, `[[i+N]]`, `[[i-N]]` and `[[N]]` pick an item from the
//!    node's first input, wrapping around its length.
//!
//! Stage 3 sees the output of stage 2, so a global can supply part of a
//! marker (`[[i+$OFFSET]]`) and a global whose value is a marker is
//! resolved too. Input items are never rescanned. Finally each backtick
//! segment is handed to the [`expr`](crate::expr) evaluator.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

use crate::constants::markers::{BACKTICK, ITEM_OPEN, LOOP_SELF, SIGIL};
use crate::error::{NodeEngineError, Result};
use crate::expr::{self, Value};
use crate::globals::GlobalVariables;

static GLOBAL_REF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$([A-Z][A-Z0-9_]+)").unwrap());

static ITEM_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[\[([^\[\]]*)\]\]").unwrap());

static RELATIVE_BODY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^i\s*(?:([+-])\s*(\d+))?$").unwrap());

static EXPLICIT_BODY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d+)$").unwrap());

/// Type tag of a parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterType {
    Int,
    Float,
    String,
    Toggle,
    Menu,
    StringList,
    Button,
}

impl ParameterType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Int => "int",
            Self::Float => "float",
            Self::String => "string",
            Self::Toggle => "toggle",
            Self::Menu => "menu",
            Self::StringList => "string_list",
            Self::Button => "button",
        }
    }
}

impl fmt::Display for ParameterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ParameterType {
    type Err = NodeEngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "int" => Ok(Self::Int),
            "float" => Ok(Self::Float),
            "string" => Ok(Self::String),
            "toggle" => Ok(Self::Toggle),
            "menu" => Ok(Self::Menu),
            "string_list" | "stringlist" => Ok(Self::StringList),
            "button" => Ok(Self::Button),
            _ => Err(NodeEngineError::UnknownParameterType(s.to_string())),
        }
    }
}

/// A parameter value, one variant per [`ParameterType`]
#[derive(Debug, Clone, PartialEq)]
pub enum ParameterValue {
    Int(i64),
    Float(f64),
    String(String),
    Toggle(bool),
    /// Selected menu item
    Menu(String),
    StringList(Vec<String>),
    /// Result of the last press
    Button(String),
}

impl ParameterValue {
    pub fn param_type(&self) -> ParameterType {
        match self {
            Self::Int(_) => ParameterType::Int,
            Self::Float(_) => ParameterType::Float,
            Self::String(_) => ParameterType::String,
            Self::Toggle(_) => ParameterType::Toggle,
            Self::Menu(_) => ParameterType::Menu,
            Self::StringList(_) => ParameterType::StringList,
            Self::Button(_) => ParameterType::Button,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            Self::Float(f) => Some(*f as i64),
            Self::Toggle(b) => Some(*b as i64),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Int(n) => Some(*n as f64),
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Toggle(b) => Some(*b),
            Self::Int(n) => Some(*n != 0),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) | Self::Menu(s) | Self::Button(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            Self::StringList(items) => Some(items),
            _ => None,
        }
    }

    /// JSON form stored in flowstate documents
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Int(n) => serde_json::Value::from(*n),
            Self::Float(f) => serde_json::Value::from(*f),
            Self::Toggle(b) => serde_json::Value::Bool(*b),
            Self::String(s) | Self::Menu(s) | Self::Button(s) => {
                serde_json::Value::String(s.clone())
            }
            Self::StringList(items) => serde_json::Value::from(items.clone()),
        }
    }

    /// Parse the JSON form for a given type
    pub fn from_json(param_type: ParameterType, json: &serde_json::Value) -> Result<Self> {
        let mismatch = || NodeEngineError::ParameterTypeMismatch {
            name: String::new(),
            expected: param_type.to_string(),
            actual: json.to_string(),
        };
        let value = match param_type {
            ParameterType::Int => Self::Int(json.as_i64().ok_or_else(mismatch)?),
            ParameterType::Float => Self::Float(json.as_f64().ok_or_else(mismatch)?),
            ParameterType::Toggle => Self::Toggle(json.as_bool().ok_or_else(mismatch)?),
            ParameterType::String => Self::String(json.as_str().ok_or_else(mismatch)?.to_string()),
            ParameterType::Menu => Self::Menu(json.as_str().ok_or_else(mismatch)?.to_string()),
            ParameterType::Button => Self::Button(json.as_str().ok_or_else(mismatch)?.to_string()),
            ParameterType::StringList => Self::StringList(
                serde_json::from_value(json.clone()).map_err(|_| mismatch())?,
            ),
        };
        Ok(value)
    }
}

impl fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(n) => write!(f, "{}", n),
            Self::Float(x) => write!(f, "{}", x),
            Self::Toggle(b) => write!(f, "{}", b),
            Self::String(s) | Self::Menu(s) | Self::Button(s) => f.write_str(s),
            Self::StringList(items) => f.write_str(&items.join("\n")),
        }
    }
}

/// What expansion may consult
#[derive(Debug, Clone, Copy)]
pub struct EvalScope<'a> {
    pub globals: &'a GlobalVariables,
    /// Loop index of the nearest enclosing Looper (0 outside loops)
    pub loop_index: i64,
    /// Data on the node's first input, if connected
    pub input: Option<&'a [String]>,
}

impl<'a> EvalScope<'a> {
    pub fn new(globals: &'a GlobalVariables) -> Self {
        Self {
            globals,
            loop_index: 0,
            input: None,
        }
    }

    pub fn with_loop_index(mut self, loop_index: i64) -> Self {
        self.loop_index = loop_index;
        self
    }

    pub fn with_input(mut self, input: Option<&'a [String]>) -> Self {
        self.input = input;
        self
    }
}

/// An evaluated value plus the soft problems met on the way
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub value: ParameterValue,
    pub warnings: Vec<String>,
}

/// Whether `text` contains anything expansion would act on
pub fn is_expression(text: &str) -> bool {
    text.contains(SIGIL) || text.contains(BACKTICK) || text.contains(ITEM_OPEN)
}

/// A named, typed value attached to a node
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    name: String,
    label: String,
    value: ParameterValue,
    callback: Option<String>,
    menu_items: Vec<String>,
}

impl Parameter {
    fn with_value(name: impl Into<String>, value: ParameterValue) -> Self {
        let name = name.into();
        Self {
            label: name.clone(),
            name,
            value,
            callback: None,
            menu_items: Vec::new(),
        }
    }

    pub fn int(name: impl Into<String>, value: i64) -> Self {
        Self::with_value(name, ParameterValue::Int(value))
    }

    pub fn float(name: impl Into<String>, value: f64) -> Self {
        Self::with_value(name, ParameterValue::Float(value))
    }

    pub fn string(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::with_value(name, ParameterValue::String(value.into()))
    }

    pub fn toggle(name: impl Into<String>, value: bool) -> Self {
        Self::with_value(name, ParameterValue::Toggle(value))
    }

    pub fn string_list(name: impl Into<String>, value: Vec<String>) -> Self {
        Self::with_value(name, ParameterValue::StringList(value))
    }

    /// A menu whose first item is selected
    pub fn menu(name: impl Into<String>, items: &[&str]) -> Self {
        let selected = items.first().map(|s| s.to_string()).unwrap_or_default();
        let mut param = Self::with_value(name, ParameterValue::Menu(selected));
        param.menu_items = items.iter().map(|s| s.to_string()).collect();
        param
    }

    pub fn button(name: impl Into<String>, callback: impl Into<String>) -> Self {
        let mut param = Self::with_value(name, ParameterValue::Button(String::new()));
        param.callback = Some(callback.into());
        param
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn param_type(&self) -> ParameterType {
        self.value.param_type()
    }

    /// The raw stored value
    pub fn raw(&self) -> &ParameterValue {
        &self.value
    }

    pub fn callback(&self) -> Option<&str> {
        self.callback.as_deref()
    }

    pub fn menu_items(&self) -> &[String] {
        &self.menu_items
    }

    /// Replace the raw value
    ///
    /// The variant must match the parameter's type (an `Int` is accepted
    /// for a `Float` parameter). Menu values must be one of the items.
    pub fn set(&mut self, value: ParameterValue) -> Result<()> {
        let value = self.check(value)?;
        self.value = value;
        Ok(())
    }

    /// Type-check a candidate value without storing it
    pub fn check(&self, value: ParameterValue) -> Result<ParameterValue> {
        let value = match (self.param_type(), value) {
            (ParameterType::Float, ParameterValue::Int(n)) => ParameterValue::Float(n as f64),
            (expected, value) if value.param_type() != expected => {
                return Err(NodeEngineError::ParameterTypeMismatch {
                    name: self.name.clone(),
                    expected: expected.to_string(),
                    actual: value.param_type().to_string(),
                });
            }
            (_, value) => value,
        };
        if let ParameterValue::Menu(selected) = &value {
            if !self.menu_items.is_empty() && !self.menu_items.contains(selected) {
                return Err(NodeEngineError::ParameterTypeMismatch {
                    name: self.name.clone(),
                    expected: format!("one of {:?}", self.menu_items),
                    actual: selected.clone(),
                });
            }
        }
        Ok(value)
    }

    pub(crate) fn set_callback(&mut self, callback: Option<String>) {
        self.callback = callback;
    }

    pub fn is_expression(&self) -> bool {
        match &self.value {
            ParameterValue::String(s) => is_expression(s),
            ParameterValue::StringList(items) => items.iter().any(|s| is_expression(s)),
            _ => false,
        }
    }

    /// Evaluate the parameter in a scope
    ///
    /// Soft problems come back as warnings; a failing or disallowed inline
    /// expression is an error.
    pub fn eval(&self, scope: &EvalScope<'_>) -> Result<Evaluation> {
        let mut warnings = Vec::new();
        let value = match &self.value {
            ParameterValue::String(s) if is_expression(s) => {
                ParameterValue::String(expand(s, scope, &mut warnings)?)
            }
            ParameterValue::StringList(items) if items.iter().any(|s| is_expression(s)) => {
                let expanded = items
                    .iter()
                    .map(|s| {
                        if is_expression(s) {
                            expand(s, scope, &mut warnings)
                        } else {
                            Ok(s.clone())
                        }
                    })
                    .collect::<Result<Vec<_>>>()?;
                ParameterValue::StringList(expanded)
            }
            other => other.clone(),
        };
        Ok(Evaluation { value, warnings })
    }

    /// Run a button's callback and store the stringified result
    pub fn press(&mut self, scope: &EvalScope<'_>) -> Result<String> {
        if self.param_type() != ParameterType::Button {
            return Err(NodeEngineError::ParameterTypeMismatch {
                name: self.name.clone(),
                expected: ParameterType::Button.to_string(),
                actual: self.param_type().to_string(),
            });
        }
        let script = self
            .callback
            .as_deref()
            .ok_or_else(|| NodeEngineError::failed(format!("button '{}' has no callback", self.name)))?;

        let mut warnings = Vec::new();
        let result = expand_script(script, scope, &mut warnings)
            .and_then(|source| expr::evaluate_to_string(&source))
            .map_err(|e| NodeEngineError::failed(format!("button '{}': {}", self.name, e)))?;
        for warning in warnings {
            log::warn!("Button '{}': {}", self.name, warning);
        }

        self.value = ParameterValue::Button(result.clone());
        Ok(result)
    }
}

/// Run the full expansion pipeline over one string
pub fn expand(text: &str, scope: &EvalScope<'_>, warnings: &mut Vec<String>) -> Result<String> {
    if !text.contains(BACKTICK) {
        return Ok(substitute(text, scope, false, warnings));
    }
    let segments: Vec<&str> = text.split(BACKTICK).collect();
    let mut out = String::with_capacity(text.len());
    // Odd segments sit between a pair of backticks; an odd total means the
    // last backtick has no partner.
    let unmatched = segments.len() % 2 == 0;
    for (i, segment) in segments.iter().enumerate() {
        let last = i == segments.len() - 1;
        if i % 2 == 0 {
            out.push_str(&substitute(segment, scope, false, warnings));
        } else if unmatched && last {
            warnings.push("Unmatched backtick".to_string());
            out.push(BACKTICK);
            out.push_str(&substitute(segment, scope, false, warnings));
        } else {
            let source = substitute(segment, scope, true, warnings);
            if !source.trim().is_empty() {
                out.push_str(&expr::evaluate_to_string(&source)?);
            }
        }
    }
    Ok(out)
}

/// Stages 1 to 3 only; the whole result is a script for the evaluator
fn expand_script(text: &str, scope: &EvalScope<'_>, warnings: &mut Vec<String>) -> Result<String> {
    Ok(substitute(text, scope, true, warnings))
}

/// Stages 1 to 3 over one segment, inserting literals when `literal` is set
fn substitute(
    text: &str,
    scope: &EvalScope<'_>,
    literal: bool,
    warnings: &mut Vec<String>,
) -> String {
    let text = substitute_loop_self(text, scope.loop_index);
    let text = substitute_globals(&text, scope.globals, literal, warnings);
    substitute_items(&text, scope, literal, warnings)
}

fn substitute_loop_self(text: &str, loop_index: i64) -> String {
    if !text.contains(LOOP_SELF) {
        return text.to_string();
    }
    text.replace(LOOP_SELF, &(loop_index - 1).to_string())
}

fn substitute_globals(
    text: &str,
    globals: &GlobalVariables,
    literal: bool,
    warnings: &mut Vec<String>,
) -> String {
    if !text.contains(SIGIL) {
        return text.to_string();
    }
    GLOBAL_REF
        .replace_all(text, |caps: &Captures<'_>| {
            let whole = &caps[0];
            match globals.get(&caps[1]) {
                Some(value) if literal => Value::literal_for(value),
                Some(value) => value.to_string(),
                None => {
                    let warning = format!("Unresolved global variable {}", whole);
                    log::warn!("{}", warning);
                    warnings.push(warning);
                    whole.to_string()
                }
            }
        })
        .into_owned()
}

/// Resolve the body of a `[[...]]` marker to a 0-based item position
fn item_position(body: &str, loop_index: i64, len: usize) -> Option<usize> {
    let body = body.trim();
    let target = if let Some(caps) = RELATIVE_BODY.captures(body) {
        let offset = match (caps.get(1), caps.get(2)) {
            (Some(sign), Some(n)) => {
                let n: i64 = n.as_str().parse().ok()?;
                if sign.as_str() == "-" {
                    -n
                } else {
                    n
                }
            }
            _ => 0,
        };
        (loop_index - 1).checked_add(offset)?
    } else if let Some(caps) = EXPLICIT_BODY.captures(body) {
        caps[1].parse::<i64>().ok()? - 1
    } else {
        return None;
    };
    Some(target.rem_euclid(len as i64) as usize)
}

fn substitute_items(
    text: &str,
    scope: &EvalScope<'_>,
    literal: bool,
    warnings: &mut Vec<String>,
) -> String {
    if !text.contains(ITEM_OPEN) {
        return text.to_string();
    }
    ITEM_MARKER
        .replace_all(text, |caps: &Captures<'_>| {
            let whole = &caps[0];
            let items = match scope.input {
                Some(items) if !items.is_empty() => items,
                _ => {
                    warnings.push(format!("No input data to resolve {}", whole));
                    return whole.to_string();
                }
            };
            match item_position(&caps[1], scope.loop_index, items.len()) {
                Some(pos) if literal => Value::literal_for(&items[pos]),
                Some(pos) => items[pos].clone(),
                None => {
                    warnings.push(format!("Malformed item marker {}", whole));
                    whole.to_string()
                }
            }
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn globals() -> GlobalVariables {
        let mut globals = GlobalVariables::new();
        globals.set("FOO", "bar").unwrap();
        globals.set("COUNT", "4").unwrap();
        globals
    }

    fn eval_str(raw: &str, scope: &EvalScope<'_>) -> Evaluation {
        Parameter::string("p", raw).eval(scope).unwrap()
    }

    #[test]
    fn test_parameter_type_from_str() {
        assert_eq!("string_list".parse::<ParameterType>().unwrap(), ParameterType::StringList);
        assert_eq!("Toggle".parse::<ParameterType>().unwrap(), ParameterType::Toggle);
        let err = "color".parse::<ParameterType>().unwrap_err();
        assert!(err.is_operation_failure());
    }

    #[test]
    fn test_plain_values_pass_through() {
        let globals = globals();
        let scope = EvalScope::new(&globals);
        let result = eval_str("hello world", &scope);
        assert_eq!(result.value, ParameterValue::String("hello world".into()));
        assert!(result.warnings.is_empty());
        assert!(!is_expression("hello world"));
    }

    #[test]
    fn test_global_inside_backticks() {
        let globals = globals();
        let scope = EvalScope::new(&globals);
        assert_eq!(eval_str("`$FOO`", &scope).value.as_str(), Some("bar"));
        assert_eq!(eval_str("x=$FOO", &scope).value.as_str(), Some("x=bar"));
        assert_eq!(eval_str("`$COUNT * 2`", &scope).value.as_str(), Some("8"));
    }

    #[test]
    fn test_unresolved_global_is_left_with_warning() {
        let globals = globals();
        let scope = EvalScope::new(&globals);
        let result = eval_str("$MISSING!", &scope);
        assert_eq!(result.value.as_str(), Some("$MISSING!"));
        assert_eq!(result.warnings.len(), 1);
    }

    #[test]
    fn test_loop_markers() {
        let globals = globals();
        let input = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let scope = EvalScope::new(&globals)
            .with_loop_index(5)
            .with_input(Some(input.as_slice()));

        // (5 - 1) mod 3
        assert_eq!(eval_str("[[i]]", &scope).value.as_str(), Some("b"));
        assert_eq!(eval_str("[[i+1]]", &scope).value.as_str(), Some("c"));
        assert_eq!(eval_str("[[i - 2]]", &scope).value.as_str(), Some("c"));
        assert_eq!(eval_str("[[1]]", &scope).value.as_str(), Some("a"));
        assert_eq!(eval_str("#$$", &scope).value.as_str(), Some("#4"));
        assert_eq!(eval_str("`[[i]].upper()`", &scope).value.as_str(), Some("B"));
    }

    #[test]
    fn test_substituted_backticks_stay_literal() {
        let mut globals = globals();
        globals.set("TICK", "a`b").unwrap();
        globals.set("OFFSET", "1").unwrap();
        let input = vec!["x`y".to_string(), "z".to_string()];
        let scope = EvalScope::new(&globals)
            .with_loop_index(1)
            .with_input(Some(input.as_slice()));

        let result = eval_str("$TICK `1 + 1`", &scope);
        assert_eq!(result.value.as_str(), Some("a`b 2"));
        assert!(result.warnings.is_empty());
        assert_eq!(eval_str("[[i]] `2 * 2`", &scope).value.as_str(), Some("x`y 4"));
        assert_eq!(eval_str("`$TICK + '!'`", &scope).value.as_str(), Some("a`b!"));
        assert_eq!(eval_str("[[i+$OFFSET]]", &scope).value.as_str(), Some("z"));
    }

    #[test]
    fn test_marker_problems_are_warnings() {
        let globals = globals();
        let scope = EvalScope::new(&globals).with_loop_index(1);
        let result = eval_str("[[i]]", &scope);
        assert_eq!(result.value.as_str(), Some("[[i]]"));
        assert_eq!(result.warnings.len(), 1);

        let input = vec!["a".to_string()];
        let scope = scope.with_input(Some(input.as_slice()));
        let result = eval_str("[[j]]", &scope);
        assert_eq!(result.value.as_str(), Some("[[j]]"));
        assert_eq!(result.warnings.len(), 1);

        let result = eval_str("cost `1 + 1", &scope);
        assert_eq!(result.value.as_str(), Some("cost `1 + 1"));
        assert_eq!(result.warnings, vec!["Unmatched backtick".to_string()]);
    }

    #[test]
    fn test_unsafe_inline_expression_fails() {
        let globals = globals();
        let scope = EvalScope::new(&globals);
        let err = Parameter::string("p", "`open('x')`").eval(&scope).unwrap_err();
        assert!(matches!(err, NodeEngineError::UnsafeExpression(_)));
    }

    #[test]
    fn test_eval_does_not_mutate_raw_value() {
        let globals = globals();
        let scope = EvalScope::new(&globals);
        let param = Parameter::string_list("items", vec!["$FOO".into(), "x".into()]);
        let result = param.eval(&scope).unwrap();
        assert_eq!(result.value.as_list().unwrap(), &["bar".to_string(), "x".to_string()]);
        assert_eq!(param.raw().as_list().unwrap()[0], "$FOO");
    }

    #[test]
    fn test_set_type_checks() {
        let mut param = Parameter::float("timeout", 1.0);
        param.set(ParameterValue::Int(3)).unwrap();
        assert_eq!(param.raw(), &ParameterValue::Float(3.0));
        assert!(param.set(ParameterValue::String("x".into())).is_err());

        let mut mode = Parameter::menu("mode", &["concatenate", "join"]);
        assert_eq!(mode.raw().as_str(), Some("concatenate"));
        mode.set(ParameterValue::Menu("join".into())).unwrap();
        assert!(mode.set(ParameterValue::Menu("zip".into())).is_err());
    }

    #[test]
    fn test_button_press() {
        let globals = globals();
        let scope = EvalScope::new(&globals);
        let mut button = Parameter::button("run", "$FOO.upper() + str(len([1, 2]))");
        assert_eq!(button.press(&scope).unwrap(), "BAR2");
        assert_eq!(button.raw(), &ParameterValue::Button("BAR2".into()));

        let mut bad = Parameter::button("bad", "import os; os.getcwd()");
        let err = bad.press(&scope).unwrap_err();
        assert!(matches!(err, NodeEngineError::OperationFailed(_)));
    }

    #[test]
    fn test_json_forms() {
        let value = ParameterValue::StringList(vec!["a".into()]);
        let json = value.to_json();
        assert_eq!(
            ParameterValue::from_json(ParameterType::StringList, &json).unwrap(),
            value
        );
        assert!(ParameterValue::from_json(ParameterType::Int, &json).is_err());
    }
}
