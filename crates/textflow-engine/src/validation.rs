//! Consistency checks over a session
//!
//! Every edit keeps the arena, the path environment and both ends of each
//! connection in step; these checks confirm it, and also report graph
//! problems that are legal to build but worth surfacing (cycles, unwired
//! required inputs, mismatched port types).

use std::collections::{HashMap, VecDeque};

use crate::session::Session;
use crate::types::NodeId;

/// A problem found in a session
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Nodes on a cycle or downstream of one
    CycleDetected { paths: Vec<String> },
    /// A connection known to only one side (or to neither)
    HalfRegisteredConnection { connection: String, detail: String },
    /// Environment entry and node path disagree
    EnvironmentMismatch { path: String },
    /// Parent and child lists disagree
    ParentMismatch { path: String },
    /// A required input port is not connected
    UnconnectedRequiredInput { path: String, port_id: String },
    /// A connection joins incompatible port types
    IncompatiblePortTypes {
        connection: String,
        source_type: String,
        target_type: String,
    },
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CycleDetected { paths } => {
                write!(f, "Cycle detected through {}", paths.join(", "))
            }
            Self::HalfRegisteredConnection { connection, detail } => {
                write!(f, "Connection '{}' is half registered: {}", connection, detail)
            }
            Self::EnvironmentMismatch { path } => {
                write!(f, "Environment entry '{}' does not match its node", path)
            }
            Self::ParentMismatch { path } => {
                write!(f, "Node '{}' disagrees with its parent about ownership", path)
            }
            Self::UnconnectedRequiredInput { path, port_id } => {
                write!(f, "Required input '{}' on node '{}' is not connected", port_id, path)
            }
            Self::IncompatiblePortTypes {
                connection,
                source_type,
                target_type,
            } => {
                write!(
                    f,
                    "Connection '{}' joins incompatible types: {} -> {}",
                    connection, source_type, target_type
                )
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// Check a session, returning every problem found (not just the first)
pub fn validate_session(session: &Session) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    validate_environment(session, &mut errors);
    validate_hierarchy(session, &mut errors);
    validate_connections(session, &mut errors);
    validate_required_inputs(session, &mut errors);
    detect_cycles(session, &mut errors);

    errors
}

fn validate_environment(session: &Session, errors: &mut Vec<ValidationError>) {
    for (path, id) in &session.environment {
        if session.nodes.get(id).is_none_or(|n| &n.path != path) {
            errors.push(ValidationError::EnvironmentMismatch { path: path.clone() });
        }
    }
    for node in session.nodes.values() {
        if session.environment.get(&node.path) != Some(&node.id) {
            errors.push(ValidationError::EnvironmentMismatch {
                path: node.path.clone(),
            });
        }
    }
}

fn validate_hierarchy(session: &Session, errors: &mut Vec<ValidationError>) {
    for node in session.nodes.values() {
        if let Some(parent) = node.parent {
            let listed = session
                .nodes
                .get(&parent)
                .is_some_and(|p| p.children.contains(&node.id));
            if !listed {
                errors.push(ValidationError::ParentMismatch {
                    path: node.path.clone(),
                });
            }
        }
        for child in &node.children {
            if session.nodes.get(child).is_none_or(|c| c.parent != Some(node.id)) {
                errors.push(ValidationError::ParentMismatch {
                    path: node.path.clone(),
                });
            }
        }
    }
}

fn validate_connections(session: &Session, errors: &mut Vec<ValidationError>) {
    let half = |connection: String, detail: &str| ValidationError::HalfRegisteredConnection {
        connection,
        detail: detail.to_string(),
    };

    for conn in session.connections.values() {
        let id = conn.id().to_string();
        let (Some(source), Some(target)) = (
            session.nodes.get(&conn.output_node()),
            session.nodes.get(&conn.input_node()),
        ) else {
            errors.push(half(id, "endpoint node missing"));
            continue;
        };
        if target.inputs.get(&conn.input_index()) != Some(&conn.id()) {
            errors.push(half(id.clone(), "not registered on its target"));
        }
        let registered = source
            .outputs
            .get(&conn.output_index())
            .is_some_and(|list| list.contains(&conn.id()));
        if !registered {
            errors.push(half(id.clone(), "not registered on its source"));
        }

        let source_type = source.metadata.outputs.get(conn.output_index()).map(|p| p.data_type);
        let target_type = target.metadata.input_data_type(conn.input_index());
        if let (Some(s), Some(t)) = (source_type, target_type) {
            if !s.is_compatible_with(&t) {
                errors.push(ValidationError::IncompatiblePortTypes {
                    connection: id,
                    source_type: format!("{:?}", s),
                    target_type: format!("{:?}", t),
                });
            }
        }
    }

    for node in session.nodes.values() {
        let referenced = node.inputs.values().copied().chain(node.output_connections());
        for conn in referenced {
            if !session.connections.contains_key(&conn) {
                errors.push(half(conn.to_string(), "unknown to the session"));
            }
        }
    }
}

fn validate_required_inputs(session: &Session, errors: &mut Vec<ValidationError>) {
    for node in session.nodes.values() {
        for (index, port) in node.metadata.inputs.iter().enumerate() {
            if port.required && !node.inputs.contains_key(&index) {
                errors.push(ValidationError::UnconnectedRequiredInput {
                    path: node.path.clone(),
                    port_id: port.id.clone(),
                });
            }
        }
    }
}

/// Kahn's algorithm; nodes that never reach in-degree zero are on or behind a cycle
fn detect_cycles(session: &Session, errors: &mut Vec<ValidationError>) {
    let mut in_degree: HashMap<NodeId, usize> = session.nodes.keys().map(|id| (*id, 0)).collect();
    for conn in session.connections.values() {
        if let Some(deg) = in_degree.get_mut(&conn.input_node()) {
            *deg += 1;
        }
    }

    let mut queue: VecDeque<NodeId> = in_degree
        .iter()
        .filter(|(_, &deg)| deg == 0)
        .map(|(&id, _)| id)
        .collect();

    while let Some(id) = queue.pop_front() {
        for conn in session.connections.values() {
            if conn.output_node() == id {
                if let Some(deg) = in_degree.get_mut(&conn.input_node()) {
                    *deg -= 1;
                    if *deg == 0 {
                        queue.push_back(conn.input_node());
                    }
                }
            }
        }
    }

    let mut paths: Vec<String> = in_degree
        .into_iter()
        .filter(|(_, deg)| *deg > 0)
        .filter_map(|(id, _)| session.nodes.get(&id).map(|n| n.path.clone()))
        .collect();
    if !paths.is_empty() {
        paths.sort();
        errors.push(ValidationError::CycleDetected { paths });
    }
}
