//! Control nodes
//!
//! Nodes that combine several branches of a graph.

mod merge;

pub use merge::{MergeMode, MergeNode};
