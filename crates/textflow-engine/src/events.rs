//! Event types for observing a session
//!
//! Events are sent from the engine to a UI or API layer to report graph
//! edits, cook results and loop progress without polling.

use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::types::CookState;

/// Trait for receiving graph events
///
/// This abstracts over the transport (channel, log, test buffer) so the
/// engine does not care who is listening.
pub trait EventSink: Send + Sync {
    /// Send an event
    ///
    /// Returns an error if the event could not be delivered (e.g., channel closed)
    fn send(&self, event: GraphEvent) -> Result<(), EventError>;
}

/// Error when sending events fails
#[derive(Debug, Clone)]
pub struct EventError {
    pub message: String,
}

impl std::fmt::Display for EventError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Event error: {}", self.message)
    }
}

impl std::error::Error for EventError {}

impl EventError {
    pub fn channel_closed() -> Self {
        Self {
            message: "Channel closed".to_string(),
        }
    }
}

/// Events emitted by a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum GraphEvent {
    /// A node was registered in the environment
    #[serde(rename_all = "camelCase")]
    NodeCreated { path: String, node_type: String },

    /// A node was removed from the environment
    #[serde(rename_all = "camelCase")]
    NodeDestroyed { path: String },

    /// A node (and its subtree) moved to a new path
    #[serde(rename_all = "camelCase")]
    NodeRenamed { old_path: String, new_path: String },

    /// A connection was registered on both endpoints
    #[serde(rename_all = "camelCase")]
    ConnectionCreated {
        source: String,
        output_index: usize,
        target: String,
        input_index: usize,
    },

    /// A connection was removed from both endpoints
    #[serde(rename_all = "camelCase")]
    ConnectionRemoved {
        source: String,
        output_index: usize,
        target: String,
        input_index: usize,
    },

    /// A node finished its internal cook step
    #[serde(rename_all = "camelCase")]
    NodeCooked {
        path: String,
        state: CookState,
        duration_ms: u64,
        warnings: usize,
    },

    /// A node's internal cook step failed
    #[serde(rename_all = "camelCase")]
    NodeFailed { path: String, errors: Vec<String> },

    /// A Looper started an iteration
    #[serde(rename_all = "camelCase")]
    LoopIteration { path: String, index: i64 },

    /// An undo entry was applied
    #[serde(rename_all = "camelCase")]
    Undone { description: String },

    /// A redo entry was applied
    #[serde(rename_all = "camelCase")]
    Redone { description: String },
}

/// A no-op event sink that discards all events
///
/// The default sink of a session.
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn send(&self, _event: GraphEvent) -> Result<(), EventError> {
        Ok(())
    }
}

/// A vector-based event sink that collects events
///
/// Useful for testing to verify events were emitted correctly.
pub struct VecEventSink {
    events: Mutex<Vec<GraphEvent>>,
}

impl VecEventSink {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
        }
    }

    /// Get all collected events
    pub fn events(&self) -> Vec<GraphEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Clear all collected events
    pub fn clear(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
    }
}

impl Default for VecEventSink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for VecEventSink {
    fn send(&self, event: GraphEvent) -> Result<(), EventError> {
        self.events
            .lock()
            .map_err(|_| EventError::channel_closed())?
            .push(event);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec_event_sink() {
        let sink = VecEventSink::new();

        sink.send(GraphEvent::LoopIteration {
            path: "/looper1".to_string(),
            index: 2,
        })
        .unwrap();

        let events = sink.events();
        assert_eq!(events.len(), 1);

        match &events[0] {
            GraphEvent::LoopIteration { path, index } => {
                assert_eq!(path, "/looper1");
                assert_eq!(*index, 2);
            }
            _ => panic!("Expected LoopIteration event"),
        }

        sink.clear();
        assert!(sink.events().is_empty());
    }

    #[test]
    fn test_event_serialization() {
        let event = GraphEvent::NodeRenamed {
            old_path: "/a".to_string(),
            new_path: "/b".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "nodeRenamed");
        assert_eq!(json["oldPath"], "/a");
    }

    #[test]
    fn test_null_event_sink() {
        let sink = NullEventSink;
        sink.send(GraphEvent::NodeDestroyed {
            path: "/a".to_string(),
        })
        .unwrap();
    }
}
