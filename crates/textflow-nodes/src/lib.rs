//! Textflow Nodes
//!
//! Processing units for the textflow engine. Every unit registers itself
//! with `inventory`, so linking this crate is enough for
//! [`NodeKindRegistry::with_builtins`](textflow_engine::NodeKindRegistry::with_builtins)
//! (and therefore `Session::new`) to offer it.
//!
//! # Categories
//!
//! - **Input**: literal text and file readers
//! - **Output**: file writers
//! - **Processing**: transformations such as splitting
//! - **Control**: combining branches

pub mod control;
pub mod input;
pub mod processing;
pub mod storage;

pub use control::*;
pub use input::*;
pub use processing::*;
pub use storage::*;

/// Turn the escapes users type into parameter fields (`\n`, `\t`, `\\`)
/// into the characters they stand for
pub fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}
