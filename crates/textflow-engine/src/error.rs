//! Error types for the node engine
//!
//! Errors fall into three groups. Structural errors reject a graph edit
//! (bad path, bad name, bad connection). Operation failures come from
//! running user-supplied content (button scripts, inline expressions,
//! unrecognised parameter types). Fatal errors mean the session can no
//! longer allocate identities.
//!
//! Soft node-level problems (missing input, blank loop iteration, timeout)
//! are never errors: they are recorded on the node as warnings or errors
//! and the rest of the graph keeps cooking.

use thiserror::Error;

/// Result type alias using NodeEngineError
pub type Result<T> = std::result::Result<T, NodeEngineError>;

/// Errors that can occur in the node engine
#[derive(Debug, Error)]
pub enum NodeEngineError {
    /// No node is registered at the given path
    #[error("Node not found: {0}")]
    NodeNotFound(String),

    /// The parent path given to `create` or `set_parent` does not exist
    #[error("Parent path does not exist: {0}")]
    ParentNotFound(String),

    /// A node name is empty or contains forbidden characters
    #[error("Invalid node name '{0}'")]
    InvalidName(String),

    /// The resulting path is already taken by a different node
    #[error("Path '{0}' is already in use")]
    PathCollision(String),

    /// No node type with this tag is registered
    #[error("Unknown node type: {0}")]
    UnknownNodeType(String),

    /// Connection index outside the declared port range
    #[error("Invalid {side} index {index} on '{path}' (node declares {available})")]
    InvalidConnectionIndex {
        path: String,
        side: &'static str,
        index: usize,
        available: usize,
    },

    /// A node may not feed its own input
    #[error("Cannot connect '{0}' to itself")]
    SelfConnection(String),

    /// The connection id is not (or no longer) registered
    #[error("Connection not found: {0}")]
    ConnectionNotFound(String),

    /// The node is owned by a Looper and cannot be edited on its own
    #[error("'{0}' is an internal loop node and cannot be edited directly")]
    InternalNode(String),

    /// Reparenting would make a node its own ancestor
    #[error("Cannot move '{node}' under its own descendant '{parent}'")]
    AncestryCycle { node: String, parent: String },

    /// Parameter lookup failed
    #[error("Parameter '{name}' not found on '{path}'")]
    ParameterNotFound { path: String, name: String },

    /// A value of the wrong type was assigned to a parameter
    #[error("Parameter '{name}' expects {expected}, got {actual}")]
    ParameterTypeMismatch {
        name: String,
        expected: String,
        actual: String,
    },

    /// Global variable keys must be uppercase, two or more characters
    #[error("Invalid global variable key '{0}'")]
    InvalidGlobalKey(String),

    /// Inline expression or button script failed to evaluate
    #[error("Expression error: {0}")]
    Expression(String),

    /// Inline expression reached outside the allow-list
    #[error("Unsafe expression rejected: {0}")]
    UnsafeExpression(String),

    /// Parameter type tag in a flowstate document is not recognised
    #[error("Unrecognized parameter type: {0}")]
    UnknownParameterType(String),

    /// Generic operation failure (button press, node action)
    #[error("Operation failed: {0}")]
    OperationFailed(String),

    /// Unique id generation kept colliding
    #[error("Exhausted unique identifier generation after {0} attempts")]
    IdentifierExhausted(u32),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Compression error
    #[error("Compression error: {0}")]
    Compression(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl NodeEngineError {
    /// Create an operation failed error with a message
    pub fn failed(msg: impl Into<String>) -> Self {
        Self::OperationFailed(msg.into())
    }

    /// Create an expression error with a message
    pub fn expression(msg: impl Into<String>) -> Self {
        Self::Expression(msg.into())
    }

    /// Errors that reject a graph edit before anything is mutated
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::NodeNotFound(_)
                | Self::ParentNotFound(_)
                | Self::InvalidName(_)
                | Self::PathCollision(_)
                | Self::UnknownNodeType(_)
                | Self::InvalidConnectionIndex { .. }
                | Self::SelfConnection(_)
                | Self::ConnectionNotFound(_)
                | Self::InternalNode(_)
                | Self::AncestryCycle { .. }
                | Self::ParameterNotFound { .. }
                | Self::ParameterTypeMismatch { .. }
                | Self::InvalidGlobalKey(_)
        )
    }

    /// Failures raised while running user-supplied content
    pub fn is_operation_failure(&self) -> bool {
        matches!(
            self,
            Self::Expression(_)
                | Self::UnsafeExpression(_)
                | Self::UnknownParameterType(_)
                | Self::OperationFailed(_)
        )
    }

    /// The session cannot continue after this error
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::IdentifierExhausted(_))
    }
}
