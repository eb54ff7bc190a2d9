//! Core types shared across the engine
//!
//! Identifiers, port data types, cook states and the connection record.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Data carried between nodes: an ordered list of text items
pub type TextList = Vec<String>;

/// Immutable identifier for a node or connection within one session
///
/// Independent of the entity's (mutable) name and path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Draw a fresh random id
    pub(crate) fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

/// Unique identifier for a node
pub type NodeId = SessionId;

/// Unique identifier for a connection
pub type ConnectionId = SessionId;

/// The data type of a port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortDataType {
    /// Accepts any type
    Any,
    /// List of text items
    Text,
    /// JSON documents encoded as text
    Json,
    /// File system paths
    Path,
}

impl PortDataType {
    /// Check if this type can connect to another type
    pub fn is_compatible_with(&self, other: &PortDataType) -> bool {
        if matches!(self, PortDataType::Any) || matches!(other, PortDataType::Any) {
            return true;
        }

        self == other
    }
}

/// Category of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeCategory {
    /// Readers and literal text sources
    Input,
    /// Writers and sinks
    Output,
    /// Transformations (split, merge, query)
    Processing,
    /// Loop constructs and their internals
    Control,
}

/// Cook state of a node
///
/// `Uncooked → Cooking → Cooked → Unchanged` on success; a failed cook
/// falls back to `Uncooked` with errors recorded. `Cooked` only exists
/// between a node's internal cook and the end of the `cook()` pass that
/// ran it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CookState {
    /// Needs to cook (new, dirtied, or failed)
    Uncooked,
    /// Internal cook step in progress
    Cooking,
    /// Cached output is valid
    Unchanged,
    /// Cooked during the current pass
    Cooked,
}

/// An edge from one node's output slot to another node's input slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    id: ConnectionId,
    output_node: NodeId,
    output_index: usize,
    input_node: NodeId,
    input_index: usize,
    /// UI selection flag (the only mutable field)
    pub selected: bool,
}

impl Connection {
    pub(crate) fn new(
        id: ConnectionId,
        output_node: NodeId,
        output_index: usize,
        input_node: NodeId,
        input_index: usize,
    ) -> Self {
        Self {
            id,
            output_node,
            output_index,
            input_node,
            input_index,
            selected: false,
        }
    }

    /// Session id of this connection
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Node whose output feeds this connection
    pub fn output_node(&self) -> NodeId {
        self.output_node
    }

    /// Output slot on the source node
    pub fn output_index(&self) -> usize {
        self.output_index
    }

    /// Node receiving the data
    pub fn input_node(&self) -> NodeId {
        self.input_node
    }

    /// Input slot on the receiving node
    pub fn input_index(&self) -> usize {
        self.input_index
    }
}
