//! Flowstate: the persisted form of a session's graph
//!
//! A document maps node paths to node records and carries the global
//! variables. Records hold raw parameter values (never evaluated ones) and
//! each node's incoming connections addressed by source path, so a
//! document is independent of the session ids it was saved from.
//!
//! ```json
//! {
//!   "version": 1,
//!   "nodes": {
//!     "/text1": {
//!       "type": "text",
//!       "path": "/text1",
//!       "name": "text1",
//!       "position": [0.0, 0.0],
//!       "parameters": [{ "name": "text", "type": "string", "value": "hi" }],
//!       "connections": []
//!     }
//!   },
//!   "globals": { "NAME": "world" }
//! }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::constants::FLOWSTATE_VERSION;
use crate::error::{NodeEngineError, Result};
use crate::identity::{depth, parent_path};
use crate::loop_context::LoopContext;
use crate::node::Node;
use crate::parameter::{ParameterType, ParameterValue};
use crate::session::Session;
use crate::types::NodeId;

/// A saved graph plus its global variables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flowstate {
    pub version: u32,
    #[serde(default)]
    pub nodes: BTreeMap<String, NodeRecord>,
    #[serde(default)]
    pub globals: BTreeMap<String, String>,
}

impl Flowstate {
    pub fn new() -> Self {
        Self {
            version: FLOWSTATE_VERSION,
            nodes: BTreeMap::new(),
            globals: BTreeMap::new(),
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl Default for Flowstate {
    fn default() -> Self {
        Self::new()
    }
}

/// One node in a flowstate document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    #[serde(rename = "type")]
    pub node_type: String,
    pub path: String,
    pub name: String,
    #[serde(default)]
    pub position: (f64, f64),
    /// Auto-created by its Looper; loading reuses the existing child
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub internal: bool,
    #[serde(default)]
    pub parameters: Vec<ParameterRecord>,
    /// Incoming connections
    #[serde(default)]
    pub connections: Vec<ConnectionRecord>,
}

/// A raw parameter value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterRecord {
    pub name: String,
    /// Parameter type tag (`int`, `float`, `string`, ...)
    #[serde(rename = "type")]
    pub param_type: String,
    pub value: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback: Option<String>,
}

/// An incoming connection of the record's node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionRecord {
    pub input_index: usize,
    pub source_node_path: String,
    pub source_output_index: usize,
}

impl NodeRecord {
    fn from_node(session: &Session, node: &Node) -> Self {
        let parameters = node
            .parameters()
            .map(|param| ParameterRecord {
                name: param.name().to_string(),
                param_type: param.param_type().to_string(),
                value: param.raw().to_json(),
                callback: param.callback().map(str::to_string),
            })
            .collect();
        let connections = node
            .inputs()
            .iter()
            .filter_map(|(index, conn)| {
                let conn = session.connection(*conn).ok()?;
                let source = session.node(conn.output_node()).ok()?;
                Some(ConnectionRecord {
                    input_index: *index,
                    source_node_path: source.path().to_string(),
                    source_output_index: conn.output_index(),
                })
            })
            .collect();
        Self {
            node_type: node.node_type().to_string(),
            path: node.path().to_string(),
            name: node.name().to_string(),
            position: node.position(),
            internal: node.is_internal(),
            parameters,
            connections,
        }
    }
}

/// Records sorted so parents come before their children
fn shortest_path_first(document: &Flowstate) -> Vec<&NodeRecord> {
    let mut records: Vec<&NodeRecord> = document.nodes.values().collect();
    records.sort_by(|a, b| {
        depth(&a.path)
            .cmp(&depth(&b.path))
            .then_with(|| a.path.cmp(&b.path))
    });
    records
}

impl Session {
    /// Capture the graph and global variables
    pub fn save_flowstate(&self) -> Flowstate {
        let nodes = self
            .nodes()
            .map(|node| (node.path().to_string(), NodeRecord::from_node(self, node)))
            .collect();
        Flowstate {
            version: FLOWSTATE_VERSION,
            nodes,
            globals: self.list_globals().clone(),
        }
    }

    /// Replace the graph with a document
    ///
    /// A node that fails to load is logged and skipped; the rest of the
    /// document still loads. Recorded as one undo step.
    pub fn load_flowstate(&mut self, document: &Flowstate) -> Result<()> {
        if document.version > FLOWSTATE_VERSION {
            log::warn!(
                "Flowstate version {} is newer than supported version {}",
                document.version,
                FLOWSTATE_VERSION
            );
        }
        self.with_snapshot("Load flowstate", |session| {
            session.clear_unrecorded();
            session.apply_flowstate(document);
            Ok(())
        })
    }

    /// Bring the graph in line with a document, keeping matching nodes
    pub(crate) fn restore_snapshot(&mut self, document: &Flowstate) -> Result<()> {
        let stale: Vec<String> = self
            .nodes()
            .filter(|node| !node.is_internal())
            .filter(|node| {
                document
                    .nodes
                    .get(node.path())
                    .is_none_or(|record| record.node_type != node.node_type())
            })
            .map(|node| node.path().to_string())
            .collect();
        for path in stale {
            // Gone already when an ancestor was destroyed first
            if let Ok(id) = self.find(&path) {
                self.destroy_unrecorded(id)?;
            }
        }

        let connections: Vec<_> = self.connections().map(|c| c.id()).collect();
        for conn in connections {
            self.remove_connection_unrecorded(conn)?;
        }
        self.loop_context = LoopContext::new();
        self.apply_flowstate(document);
        Ok(())
    }

    /// Create or reuse every node of a document, then wire it up
    fn apply_flowstate(&mut self, document: &Flowstate) {
        self.globals.replace_all(&document.globals);

        let mut loaded: Vec<(NodeId, &NodeRecord)> = Vec::new();
        for record in shortest_path_first(document) {
            match self.materialise(record) {
                Ok(id) => loaded.push((id, record)),
                Err(e) => log::error!("Skipping {} while loading: {}", record.path, e),
            }
        }

        for (id, record) in &loaded {
            for conn in &record.connections {
                let wired = self.find(&conn.source_node_path).and_then(|source| {
                    self.set_input_unrecorded(*id, conn.input_index, source, conn.source_output_index)
                });
                if let Err(e) = wired {
                    log::error!(
                        "Skipping connection {}[{}] -> {}[{}]: {}",
                        conn.source_node_path,
                        conn.source_output_index,
                        record.path,
                        conn.input_index,
                        e
                    );
                }
            }
        }

        self.invalidate_all();
        log::info!("Loaded {} of {} nodes", loaded.len(), document.nodes.len());
    }

    /// Node for a record, created unless it already exists with the same type
    fn materialise(&mut self, record: &NodeRecord) -> Result<NodeId> {
        let id = match self.find(&record.path) {
            Ok(id) => {
                let existing = self.node(id)?.node_type();
                if existing != record.node_type {
                    return Err(NodeEngineError::PathCollision(record.path.clone()));
                }
                id
            }
            Err(_) => self.create_exact(
                &record.node_type,
                &record.name,
                parent_path(&record.path),
                record.internal,
            )?,
        };

        let node = self.node_mut(id)?;
        node.position = record.position;
        for param in &record.parameters {
            if let Err(e) = apply_parameter(node, param) {
                log::warn!("{}: parameter '{}' not restored: {}", record.path, param.name, e);
            }
        }
        Ok(id)
    }

    /// Write the graph as pretty JSON
    pub fn save_to_path(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = self.save_flowstate().to_json_pretty()?;
        std::fs::write(path.as_ref(), json)?;
        log::info!("Saved flowstate to {}", path.as_ref().display());
        Ok(())
    }

    /// Replace the graph with a JSON document read from disk
    pub fn load_from_path(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let json = std::fs::read_to_string(path.as_ref())?;
        let document = Flowstate::from_json(&json)?;
        self.load_flowstate(&document)
    }
}

fn apply_parameter(node: &mut Node, record: &ParameterRecord) -> Result<()> {
    let param_type: ParameterType = record.param_type.parse()?;
    let value = ParameterValue::from_json(param_type, &record.value)?;
    node.set_raw_parameter(&record.name, value)?;
    if let Some(param) = node.parameters.get_mut(&record.name) {
        param.set_callback(record.callback.clone());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{node_types, paths::ROOT};
    use crate::testing::{self, text};
    use crate::types::CookState;

    fn sample() -> Session {
        let mut session = testing::session();
        let a = text(&mut session, "a", "hello $NAME");
        let b = text(&mut session, "b", "");
        session.set_input(b, 0, a, 0).unwrap();
        session.set_position(b, (1.5, -2.0)).unwrap();
        session.set_global("NAME", "world").unwrap();
        session
    }

    #[test]
    fn test_save_records_raw_values() {
        let session = sample();
        let document = session.save_flowstate();

        assert_eq!(document.version, FLOWSTATE_VERSION);
        assert_eq!(document.globals.get("NAME").map(String::as_str), Some("world"));
        let a = &document.nodes["/a"];
        assert_eq!(a.node_type, "echo");
        let text = a.parameters.iter().find(|p| p.name == "text").unwrap();
        assert_eq!(text.value, serde_json::json!("hello $NAME"));
        assert_eq!(text.param_type, "string");

        let b = &document.nodes["/b"];
        assert_eq!(b.position, (1.5, -2.0));
        assert_eq!(
            b.connections,
            vec![ConnectionRecord {
                input_index: 0,
                source_node_path: "/a".into(),
                source_output_index: 0,
            }]
        );
    }

    #[test]
    fn test_load_round_trip() {
        let mut session = sample();
        let expected = session.eval(session.find("/b").unwrap()).unwrap();
        let document = session.save_flowstate();

        let mut loaded = testing::session();
        loaded.load_flowstate(&document).unwrap();
        assert_eq!(loaded.save_flowstate(), document);

        let b = loaded.find("/b").unwrap();
        assert_eq!(loaded.node(b).unwrap().state(), CookState::Uncooked);
        assert_eq!(loaded.eval(b).unwrap(), expected);
        assert_eq!(expected, vec!["hello world"]);
    }

    #[test]
    fn test_load_is_one_undo_step() {
        let document = sample().save_flowstate();
        let mut session = testing::session();
        text(&mut session, "old", "x");

        session.load_flowstate(&document).unwrap();
        assert!(session.find("/old").is_err());
        assert_eq!(session.undo_manager().undo_descriptions().last(), Some(&"Load flowstate"));

        session.undo().unwrap();
        assert!(session.find("/old").is_ok());
        assert!(session.find("/a").is_err());
        assert!(!session.has_global("NAME"));
    }

    #[test]
    fn test_bad_node_is_skipped() {
        let mut document = sample().save_flowstate();
        let mut bogus = document.nodes["/a"].clone();
        bogus.node_type = "no_such_kind".into();
        bogus.path = "/bogus".into();
        bogus.name = "bogus".into();
        document.nodes.insert("/bogus".into(), bogus);
        document.nodes.get_mut("/b").unwrap().connections.push(ConnectionRecord {
            input_index: 0,
            source_node_path: "/bogus".into(),
            source_output_index: 0,
        });

        let mut session = testing::session();
        session.load_flowstate(&document).unwrap();
        assert_eq!(session.len(), 2);
        assert!(session.find("/bogus").is_err());
        let b = session.find("/b").unwrap();
        assert_eq!(session.input_nodes(b).unwrap(), vec![session.find("/a").unwrap()]);
    }

    #[test]
    fn test_unknown_parameter_type_is_skipped() {
        let mut document = sample().save_flowstate();
        let a = document.nodes.get_mut("/a").unwrap();
        for param in &mut a.parameters {
            if param.name == "text" {
                param.param_type = "colour".into();
            }
        }
        let mut session = testing::session();
        session.load_flowstate(&document).unwrap();
        let a = session.find("/a").unwrap();
        assert_eq!(session.parameter(a, "text").unwrap().raw().as_str(), Some(""));
        assert!(matches!(
            "colour".parse::<ParameterType>(),
            Err(NodeEngineError::UnknownParameterType(_))
        ));
    }

    #[test]
    fn test_looper_children_are_reused() {
        let mut session = testing::session();
        let looper = session.create(node_types::LOOPER, None, ROOT).unwrap();
        session
            .set_parameter(looper, "max", ParameterValue::Int(7))
            .unwrap();
        let loop_out = session.find("/looper1/loop_out").unwrap();
        session.set_position(loop_out, (4.0, 8.0)).unwrap();
        let document = session.save_flowstate();
        assert!(document.nodes["/looper1/loop_in"].internal);

        let mut loaded = testing::session();
        loaded.load_flowstate(&document).unwrap();
        let looper = loaded.find("/looper1").unwrap();
        assert_eq!(loaded.node(looper).unwrap().children().len(), 2);
        assert_eq!(loaded.len(), 3);
        assert_eq!(
            loaded.node_at("/looper1/loop_out").unwrap().position(),
            (4.0, 8.0)
        );
        assert_eq!(
            loaded.parameter(looper, "max").unwrap().raw(),
            &ParameterValue::Int(7)
        );
    }

    #[test]
    fn test_newer_version_still_loads() {
        let mut document = sample().save_flowstate();
        document.version = FLOWSTATE_VERSION + 1;
        let mut session = testing::session();
        session.load_flowstate(&document).unwrap();
        assert_eq!(session.len(), 2);
    }

    #[test]
    fn test_save_and_load_path() {
        testing::init_logging();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.json");
        let session = sample();
        session.save_to_path(&path).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("\"source_node_path\": \"/a\""));

        let mut loaded = testing::session();
        loaded.load_from_path(&path).unwrap();
        assert_eq!(loaded.save_flowstate(), session.save_flowstate());
    }

    #[test]
    fn test_restore_keeps_surviving_nodes() {
        let mut session = sample();
        let a = session.find("/a").unwrap();
        let document = session.save_flowstate();

        let c = text(&mut session, "c", "extra");
        let b = session.find("/b").unwrap();
        session.set_input(b, 0, c, 0).unwrap();

        session.restore_snapshot(&document).unwrap();
        assert_eq!(session.find("/a").unwrap(), a);
        assert!(session.find("/c").is_err());
        assert_eq!(session.input_nodes(b).unwrap(), vec![a]);
        assert_eq!(session.save_flowstate(), document);
    }
}
