//! Processing nodes
//!
//! Nodes that transform text.

mod split;

pub use split::SplitNode;
