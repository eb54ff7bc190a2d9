//! Textflow Engine - lazy dataflow evaluation for text-processing node graphs
//!
//! A graph of nodes passes lists of text items along connections. Asking
//! for a node's output cooks exactly the upstream nodes that need it, in
//! dependency order, and caches every result until an edit dirties it.
//!
//! - Hierarchical node paths with stable session ids
//! - Lazy, dependency-ordered cooking with content-hash change detection
//! - Parameter expressions: globals, loop markers, inline backtick code
//! - A Looper construct that re-cooks its body once per index
//! - Undo/redo (targeted inverse edits plus compressed snapshots)
//! - Flowstate documents for saving and loading graphs
//!
//! # Architecture
//!
//! - [`Session`]: owns the node arena, path environment, connections,
//!   global variables, loop context and undo history
//! - [`NodeLogic`]: what a node kind does when it cooks
//! - [`NodeKindRegistry`]: type tags to metadata and logic factories,
//!   filled at link time through [`NodeKindFn`]
//! - [`EventSink`]: graph events for a UI or API layer
//!
//! # Example
//!
//! ```ignore
//! use textflow_engine::{ParameterValue, Session};
//!
//! let mut session = Session::new();
//! let text = session.create("text", None, "/")?;
//! session.set_parameter(text, "text", ParameterValue::String("hello `1 + 1`".into()))?;
//! assert_eq!(session.eval(text)?, vec!["hello 2"]);
//! ```

pub mod config;
pub mod constants;
pub mod descriptor;
pub mod engine;
pub mod error;
pub mod events;
pub mod expr;
pub mod flowstate;
pub mod globals;
pub mod identity;
pub mod loop_context;
pub mod looper;
pub mod node;
pub mod parameter;
pub mod registry;
pub mod session;
pub mod types;
pub mod undo;
pub mod validation;

#[cfg(test)]
mod testing;

// Re-export key types
pub use config::EngineConfig;
pub use descriptor::{NodeMetadata, PortMetadata};
pub use engine::CookContext;
pub use error::{NodeEngineError, Result};
pub use events::{EventError, EventSink, GraphEvent, NullEventSink, VecEventSink};
pub use flowstate::{ConnectionRecord, Flowstate, NodeRecord, ParameterRecord};
pub use globals::GlobalVariables;
pub use loop_context::{LoopContext, LoopFrame};
pub use looper::{LoopInput, LoopOutput, Looper};
pub use node::{Node, NodeDescriptor, NodeLogic};
pub use parameter::{EvalScope, Evaluation, Parameter, ParameterType, ParameterValue};
pub use registry::{NodeFactory, NodeKindFn, NodeKindRegistry};
pub use session::Session;
pub use types::{
    Connection, ConnectionId, CookState, NodeCategory, NodeId, PortDataType, SessionId, TextList,
};
pub use undo::{EditOp, UndoEntry, UndoManager};
pub use validation::{validate_session, ValidationError};

// Used by `inventory::submit!` in downstream crates
pub use inventory;
