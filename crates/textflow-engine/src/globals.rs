//! Global variable store
//!
//! Key/value table referenced from parameter expressions as `$KEY`.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{NodeEngineError, Result};

static KEY_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z][A-Z0-9_]+$").unwrap());

/// Check a global variable key
///
/// Keys are two or more characters, uppercase, and start with a letter
/// (so never with the `$` sigil).
pub fn validate_key(key: &str) -> Result<()> {
    if KEY_PATTERN.is_match(key) {
        Ok(())
    } else {
        Err(NodeEngineError::InvalidGlobalKey(key.to_string()))
    }
}

/// The global variable store of a session
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GlobalVariables {
    vars: BTreeMap<String, String>,
}

impl GlobalVariables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a value
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// Whether a key is set
    pub fn has(&self, key: &str) -> bool {
        self.vars.contains_key(key)
    }

    /// Set a value, returning the previous one
    ///
    /// The key is validated before anything changes.
    pub fn set(&mut self, key: &str, value: impl Into<String>) -> Result<Option<String>> {
        validate_key(key)?;
        Ok(self.vars.insert(key.to_string(), value.into()))
    }

    /// Remove a value, returning it
    pub fn delete(&mut self, key: &str) -> Option<String> {
        self.vars.remove(key)
    }

    /// All variables in key order
    pub fn list(&self) -> &BTreeMap<String, String> {
        &self.vars
    }

    /// Replace the whole store
    ///
    /// Invalid keys are skipped with a warning.
    pub fn replace_all(&mut self, vars: &BTreeMap<String, String>) {
        self.vars.clear();
        for (key, value) in vars {
            if let Err(e) = self.set(key, value.clone()) {
                log::warn!("Skipping global variable: {}", e);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}
