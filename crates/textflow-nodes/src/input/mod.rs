//! Input nodes
//!
//! Literal text sources.

mod text;

pub use text::TextNode;
