//! The session: one explicitly owned graph
//!
//! A [`Session`] owns every node and connection (an arena keyed by
//! [`SessionId`]), the path environment, the global variables, the loop
//! context and the undo history. All graph edits go through `&mut
//! Session`, and every edit that touches two places (both ends of a
//! connection, a node and its parent, a path and its descendants) updates
//! them in one function.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use crate::config::EngineConfig;
use crate::constants::{node_types, paths::ROOT};
use crate::error::{NodeEngineError, Result};
use crate::events::{EventSink, GraphEvent, NullEventSink};
use crate::globals::GlobalVariables;
use crate::identity::{self, join_path, parent_path, validate_name};
use crate::loop_context::LoopContext;
use crate::node::Node;
use crate::parameter::{EvalScope, Evaluation, Parameter, ParameterValue};
use crate::registry::NodeKindRegistry;
use crate::types::{Connection, ConnectionId, NodeId, SessionId};
use crate::undo::{EditOp, UndoAction, UndoEntry, UndoManager};

/// A node graph with everything needed to edit and cook it
pub struct Session {
    pub(crate) nodes: HashMap<NodeId, Node>,
    pub(crate) environment: BTreeMap<String, NodeId>,
    pub(crate) connections: HashMap<ConnectionId, Connection>,
    pub(crate) globals: GlobalVariables,
    pub(crate) loop_context: LoopContext,
    pub(crate) undo: UndoManager,
    registry: Arc<NodeKindRegistry>,
    config: EngineConfig,
    events: Arc<dyn EventSink>,
}

impl Session {
    /// A session over the built-in node kinds with default config
    pub fn new() -> Self {
        Self::with_registry(Arc::new(NodeKindRegistry::with_builtins()))
    }

    pub fn with_registry(registry: Arc<NodeKindRegistry>) -> Self {
        Self::with_config(registry, EngineConfig::default())
    }

    pub fn with_config(registry: Arc<NodeKindRegistry>, config: EngineConfig) -> Self {
        Self {
            nodes: HashMap::new(),
            environment: BTreeMap::new(),
            connections: HashMap::new(),
            globals: GlobalVariables::new(),
            loop_context: LoopContext::new(),
            undo: UndoManager::new(config.undo_limit, config.snapshot_compression_level),
            registry,
            config,
            events: Arc::new(NullEventSink),
        }
    }

    /// Route graph events to `sink`
    pub fn set_event_sink(&mut self, sink: Arc<dyn EventSink>) {
        self.events = sink;
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &NodeKindRegistry {
        &self.registry
    }

    pub fn loop_context(&self) -> &LoopContext {
        &self.loop_context
    }

    pub(crate) fn emit(&self, event: GraphEvent) {
        if let Err(e) = self.events.send(event) {
            log::warn!("Dropped graph event: {}", e);
        }
    }

    // ------------------------------------------------------------------
    // Lookup
    // ------------------------------------------------------------------

    pub fn node(&self, id: NodeId) -> Result<&Node> {
        self.nodes
            .get(&id)
            .ok_or_else(|| NodeEngineError::NodeNotFound(id.to_string()))
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.nodes
            .get_mut(&id)
            .ok_or_else(|| NodeEngineError::NodeNotFound(id.to_string()))
    }

    /// Id of the node at `path`
    pub fn find(&self, path: &str) -> Result<NodeId> {
        self.environment
            .get(path)
            .copied()
            .ok_or_else(|| NodeEngineError::NodeNotFound(path.to_string()))
    }

    pub fn node_at(&self, path: &str) -> Result<&Node> {
        self.node(self.find(path)?)
    }

    /// Every node, in path order
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.environment.values().filter_map(|id| self.nodes.get(id))
    }

    /// Every registered path, sorted
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.environment.keys().map(String::as_str)
    }

    /// Nodes directly under the root
    pub fn top_level(&self) -> Vec<NodeId> {
        self.nodes()
            .filter(|n| n.parent.is_none())
            .map(|n| n.id)
            .collect()
    }

    pub fn connection(&self, id: ConnectionId) -> Result<&Connection> {
        self.connections
            .get(&id)
            .ok_or_else(|| NodeEngineError::ConnectionNotFound(id.to_string()))
    }

    pub fn connections(&self) -> impl Iterator<Item = &Connection> {
        self.connections.values()
    }

    /// Connection feeding `input_index` of `node`
    pub fn input_connection(&self, node: NodeId, input_index: usize) -> Result<Option<&Connection>> {
        Ok(self
            .node(node)?
            .inputs
            .get(&input_index)
            .and_then(|c| self.connections.get(c)))
    }

    /// Nodes feeding `node`, in input slot order
    pub fn input_nodes(&self, node: NodeId) -> Result<Vec<NodeId>> {
        Ok(self
            .node(node)?
            .inputs
            .values()
            .filter_map(|c| self.connections.get(c))
            .map(Connection::output_node)
            .collect())
    }

    /// Nodes fed by `node`, deduplicated
    pub fn output_nodes(&self, node: NodeId) -> Result<Vec<NodeId>> {
        let mut seen = HashSet::new();
        Ok(self
            .node(node)?
            .output_connections()
            .filter_map(|c| self.connections.get(&c))
            .map(Connection::input_node)
            .filter(|n| seen.insert(*n))
            .collect())
    }

    /// Cached data arriving on an input slot (empty when unconnected)
    pub fn input_data(&self, node: NodeId, input_index: usize) -> Result<Vec<String>> {
        Ok(match self.input_connection(node, input_index)? {
            Some(conn) => self
                .node(conn.output_node())?
                .output_slot(conn.output_index())
                .to_vec(),
            None => Vec::new(),
        })
    }

    /// Cached data on the lowest connected input slot
    pub(crate) fn first_input_data(&self, node: NodeId) -> Option<&[String]> {
        let node = self.nodes.get(&node)?;
        let conn = node
            .inputs
            .values()
            .next()
            .and_then(|c| self.connections.get(c))?;
        self.nodes
            .get(&conn.output_node())
            .map(|source| source.output_slot(conn.output_index()))
    }

    /// Nearest ancestor that is a Looper
    pub fn enclosing_looper(&self, node: NodeId) -> Option<NodeId> {
        let mut current = self.nodes.get(&node)?.parent;
        while let Some(id) = current {
            let ancestor = self.nodes.get(&id)?;
            if ancestor.node_type() == node_types::LOOPER {
                return Some(id);
            }
            current = ancestor.parent;
        }
        None
    }

    /// Current loop index seen by `node` (0 outside running loops)
    pub fn loop_index(&self, node: NodeId) -> i64 {
        self.enclosing_looper(node)
            .and_then(|looper| self.nodes.get(&looper))
            .map(|looper| self.loop_context.index(&looper.path))
            .unwrap_or(0)
    }

    /// Every node below `node`, depth first
    pub fn descendants(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self
            .nodes
            .get(&node)
            .map(|n| n.children.iter().rev().copied().collect())
            .unwrap_or_default();
        while let Some(id) = stack.pop() {
            out.push(id);
            if let Some(n) = self.nodes.get(&id) {
                stack.extend(n.children.iter().rev().copied());
            }
        }
        out
    }

    /// Internal child of `parent` with the given name
    pub(crate) fn child_named(&self, parent: NodeId, name: &str) -> Option<NodeId> {
        self.nodes
            .get(&parent)?
            .children
            .iter()
            .copied()
            .find(|c| self.nodes.get(c).is_some_and(|n| n.name == name))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn generate_id(&self) -> Result<SessionId> {
        let attempts = self.config.max_id_attempts;
        for _ in 0..attempts {
            let id = SessionId::generate();
            if !self.nodes.contains_key(&id) && !self.connections.contains_key(&id) {
                return Ok(id);
            }
        }
        log::error!("Could not draw a unique session id in {} attempts", attempts);
        Err(NodeEngineError::IdentifierExhausted(attempts))
    }

    // ------------------------------------------------------------------
    // Undo integration
    // ------------------------------------------------------------------

    /// Run a structural edit, recording a full snapshot taken beforehand
    ///
    /// Nothing is recorded when the edit fails. Nested edits made by `edit`
    /// are not recorded on their own.
    pub(crate) fn with_snapshot<T>(
        &mut self,
        description: &str,
        edit: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        let snapshot = if self.undo.is_recording() {
            Some(self.undo.compress(&self.save_flowstate())?)
        } else {
            None
        };
        self.undo.disable();
        let result = edit(self);
        self.undo.enable();
        if let (Ok(_), Some(bytes)) = (&result, snapshot) {
            self.undo.record_snapshot(description, bytes);
        }
        result
    }

    /// Record a full snapshot of the current graph
    pub fn push_state(&mut self, description: &str) -> Result<()> {
        if !self.undo.is_recording() {
            return Ok(());
        }
        let bytes = self.undo.compress(&self.save_flowstate())?;
        self.undo.record_snapshot(description, bytes);
        Ok(())
    }

    /// Suspend undo recording (nests)
    pub fn disable_undo(&mut self) {
        self.undo.disable();
    }

    /// Resume undo recording
    pub fn enable_undo(&mut self) {
        self.undo.enable();
    }

    pub fn undo_manager(&self) -> &UndoManager {
        &self.undo
    }

    /// Revert the most recent recorded edit
    ///
    /// Returns `false` when there was nothing to undo.
    pub fn undo(&mut self) -> Result<bool> {
        let Some(entry) = self.undo.pop_undo() else {
            return Ok(false);
        };
        self.undo.disable();
        let result = self.apply_undo_entry(&entry, true);
        self.undo.enable();
        match result {
            Ok(inverse) => {
                log::debug!("Undid '{}'", entry.description);
                self.emit(GraphEvent::Undone {
                    description: entry.description.clone(),
                });
                self.undo.push_redo(inverse);
                Ok(true)
            }
            Err(e) => {
                log::error!("Undo of '{}' failed: {}", entry.description, e);
                self.undo.push_undo_keep_redo(entry);
                Err(e)
            }
        }
    }

    /// Re-apply the most recently undone edit
    pub fn redo(&mut self) -> Result<bool> {
        let Some(entry) = self.undo.pop_redo() else {
            return Ok(false);
        };
        self.undo.disable();
        let result = self.apply_undo_entry(&entry, false);
        self.undo.enable();
        match result {
            Ok(inverse) => {
                log::debug!("Redid '{}'", entry.description);
                self.emit(GraphEvent::Redone {
                    description: entry.description.clone(),
                });
                self.undo.push_undo_keep_redo(inverse);
                Ok(true)
            }
            Err(e) => {
                log::error!("Redo of '{}' failed: {}", entry.description, e);
                self.undo.push_redo(entry);
                Err(e)
            }
        }
    }

    /// Apply one side of an entry and return the entry that reverses it
    fn apply_undo_entry(
        &mut self,
        entry: &UndoEntry,
        undoing: bool,
    ) -> Result<UndoEntry> {
        match &entry.action {
            UndoAction::Snapshot(bytes) => {
                let current = self.undo.compress(&self.save_flowstate())?;
                let document = self.undo.decompress(bytes)?;
                self.restore_snapshot(&document)?;
                Ok(UndoEntry::snapshot(entry.description.clone(), current))
            }
            UndoAction::Op { undo, redo } => {
                self.apply_edit(if undoing { undo } else { redo })?;
                Ok(entry.clone())
            }
        }
    }

    fn apply_edit(&mut self, op: &EditOp) -> Result<()> {
        match op {
            EditOp::SetParameter { path, name, value } => {
                let id = self.find(path)?;
                self.set_parameter(id, name, value.clone())
            }
            EditOp::Rename { path, name } => {
                let id = self.find(path)?;
                self.rename_node(id, name).map(|_| ())
            }
            EditOp::SetPosition { path, position } => {
                let id = self.find(path)?;
                self.set_position(id, *position)
            }
            EditOp::SetGlobal { key, value } => match value {
                Some(value) => self.set_global(key, value.clone()),
                None => self.delete_global(key).map(|_| ()),
            },
        }
    }

    // ------------------------------------------------------------------
    // Node lifetime
    // ------------------------------------------------------------------

    /// Create a node of kind `node_type` under `parent_path`
    ///
    /// Without a name the kind's tag plus a counter is used. A name that is
    /// already taken among the siblings gets its numeric suffix bumped.
    pub fn create(
        &mut self,
        node_type: &str,
        name: Option<&str>,
        parent_path: &str,
    ) -> Result<NodeId> {
        if !self.registry.has_node_type(node_type) {
            return Err(NodeEngineError::UnknownNodeType(node_type.to_string()));
        }
        if parent_path != ROOT && !self.environment.contains_key(parent_path) {
            return Err(NodeEngineError::ParentNotFound(parent_path.to_string()));
        }
        let base = match name {
            Some(name) => name.to_string(),
            None => format!("{}1", node_type),
        };
        validate_name(&base)?;
        let name = identity::unique_name(&base, |candidate| {
            self.environment
                .contains_key(&join_path(parent_path, candidate))
        });

        self.with_snapshot(&format!("Create {}", name), |session| {
            session.create_exact(node_type, &name, parent_path, false)
        })
    }

    /// Create an internal child of `parent` (used by Loopers)
    pub(crate) fn create_internal(
        &mut self,
        parent: NodeId,
        node_type: &str,
        name: &str,
    ) -> Result<NodeId> {
        let parent_path = self.node(parent)?.path.clone();
        self.undo.disable();
        let result = self.create_exact(node_type, name, &parent_path, true);
        self.undo.enable();
        result
    }

    /// Create a node at exactly `parent_path/name`
    pub(crate) fn create_exact(
        &mut self,
        node_type: &str,
        name: &str,
        parent_path: &str,
        internal: bool,
    ) -> Result<NodeId> {
        validate_name(name)?;
        let parent = if parent_path == ROOT {
            None
        } else {
            Some(
                self.environment
                    .get(parent_path)
                    .copied()
                    .ok_or_else(|| NodeEngineError::ParentNotFound(parent_path.to_string()))?,
            )
        };
        let path = join_path(parent_path, name);
        if self.environment.contains_key(&path) {
            return Err(NodeEngineError::PathCollision(path));
        }
        let (metadata, logic) = self.registry.instantiate(node_type)?;
        let id = self.generate_id()?;

        let mut node = Node::new(id, name.to_string(), path.clone(), metadata, logic);
        node.parent = parent;
        node.internal = internal;
        self.nodes.insert(id, node);
        self.environment.insert(path.clone(), id);
        if let Some(parent) = parent {
            self.node_mut(parent)?.children.push(id);
            self.invalidate_enclosing_loopers(id);
        }
        log::debug!("Created {} ({})", path, node_type);
        self.emit(GraphEvent::NodeCreated {
            path: path.clone(),
            node_type: node_type.to_string(),
        });

        let mut logic = self.node_mut(id)?.logic.take();
        let created = match logic.as_mut() {
            Some(logic) => logic.on_created(self, id),
            None => Ok(()),
        };
        if let Some(node) = self.nodes.get_mut(&id) {
            node.logic = logic;
        }
        if let Err(e) = created {
            log::warn!("Initialisation of {} failed: {}", path, e);
            self.destroy_unrecorded(id)?;
            return Err(e);
        }
        Ok(id)
    }

    /// Destroy a node, its connections and its children
    pub fn destroy(&mut self, id: NodeId) -> Result<()> {
        let node = self.node(id)?;
        if node.internal {
            return Err(NodeEngineError::InternalNode(node.path.clone()));
        }
        let description = format!("Destroy {}", node.name);
        self.with_snapshot(&description, |session| session.destroy_unrecorded(id))
    }

    pub(crate) fn destroy_unrecorded(&mut self, id: NodeId) -> Result<()> {
        let children = self.node(id)?.children.clone();
        for child in children {
            self.destroy_unrecorded(child)?;
        }

        let node = self.node(id)?;
        let connections: Vec<ConnectionId> = node
            .inputs
            .values()
            .copied()
            .chain(node.output_connections())
            .collect();
        for conn in connections {
            self.remove_connection_unrecorded(conn)?;
        }

        self.invalidate_enclosing_loopers(id);
        let node = self.nodes.remove(&id).ok_or_else(|| NodeEngineError::NodeNotFound(id.to_string()))?;
        self.environment.remove(&node.path);
        self.loop_context.clear(&node.path);
        if let Some(parent) = node.parent.and_then(|p| self.nodes.get_mut(&p)) {
            parent.children.retain(|c| *c != id);
        }
        log::debug!("Destroyed {}", node.path);
        self.emit(GraphEvent::NodeDestroyed { path: node.path });
        Ok(())
    }

    /// Destroy every node and forget the loop context
    pub fn clear(&mut self) -> Result<()> {
        self.with_snapshot("Clear", |session| {
            session.clear_unrecorded();
            Ok(())
        })
    }

    pub(crate) fn clear_unrecorded(&mut self) {
        for id in self.top_level() {
            if let Err(e) = self.destroy_unrecorded(id) {
                log::warn!("Failed to destroy {}: {}", id, e);
            }
        }
        self.nodes.clear();
        self.environment.clear();
        self.connections.clear();
        self.loop_context = LoopContext::new();
    }

    // ------------------------------------------------------------------
    // Connections
    // ------------------------------------------------------------------

    /// Connect `source`'s output slot to `target`'s input slot
    ///
    /// An occupied input slot (or any input of a single-input target) is
    /// disconnected first.
    pub fn set_input(
        &mut self,
        target: NodeId,
        input_index: usize,
        source: NodeId,
        output_index: usize,
    ) -> Result<ConnectionId> {
        self.check_connection(target, input_index, source, output_index)?;
        let description = format!("Connect {}", self.node(target)?.name);
        self.with_snapshot(&description, |session| {
            session.set_input_unrecorded(target, input_index, source, output_index)
        })
    }

    /// Connect to the next free input slot
    ///
    /// Single-input targets always use slot 0.
    pub fn set_next_input(
        &mut self,
        target: NodeId,
        source: NodeId,
        output_index: usize,
    ) -> Result<ConnectionId> {
        let node = self.node(target)?;
        let input_index = if node.metadata.single_input {
            0
        } else {
            (0..)
                .take_while(|i| node.metadata.accepts_input(*i))
                .find(|i| !node.inputs.contains_key(i))
                .ok_or_else(|| NodeEngineError::InvalidConnectionIndex {
                    path: node.path.clone(),
                    side: "input",
                    index: node.metadata.inputs.len(),
                    available: node.metadata.inputs.len(),
                })?
        };
        self.set_input(target, input_index, source, output_index)
    }

    fn check_connection(
        &self,
        target: NodeId,
        input_index: usize,
        source: NodeId,
        output_index: usize,
    ) -> Result<()> {
        let target_node = self.node(target)?;
        let source_node = self.node(source)?;
        if target == source {
            log::warn!("Rejected connection of {} to itself", target_node.path);
            return Err(NodeEngineError::SelfConnection(target_node.path.clone()));
        }
        if output_index >= source_node.metadata.outputs.len() {
            return Err(NodeEngineError::InvalidConnectionIndex {
                path: source_node.path.clone(),
                side: "output",
                index: output_index,
                available: source_node.metadata.outputs.len(),
            });
        }
        if !target_node.metadata.accepts_input(input_index) {
            return Err(NodeEngineError::InvalidConnectionIndex {
                path: target_node.path.clone(),
                side: "input",
                index: input_index,
                available: target_node.metadata.inputs.len(),
            });
        }
        Ok(())
    }

    pub(crate) fn set_input_unrecorded(
        &mut self,
        target: NodeId,
        input_index: usize,
        source: NodeId,
        output_index: usize,
    ) -> Result<ConnectionId> {
        self.check_connection(target, input_index, source, output_index)?;

        let target_node = self.node(target)?;
        let superseded: Vec<ConnectionId> = if target_node.metadata.single_input {
            target_node.inputs.values().copied().collect()
        } else {
            target_node.inputs.get(&input_index).copied().into_iter().collect()
        };
        for conn in superseded {
            self.remove_connection_unrecorded(conn)?;
        }
        let source_node = self.node(source)?;
        if source_node.metadata.single_output {
            let existing = source_node
                .outputs
                .get(&output_index)
                .cloned()
                .unwrap_or_default();
            for conn in existing {
                self.remove_connection_unrecorded(conn)?;
            }
        }

        let id = self.generate_id()?;
        let connection = Connection::new(id, source, output_index, target, input_index);
        self.connections.insert(id, connection);
        self.node_mut(target)?.inputs.insert(input_index, id);
        self.node_mut(source)?
            .outputs
            .entry(output_index)
            .or_default()
            .push(id);
        self.invalidate(target);

        let event = GraphEvent::ConnectionCreated {
            source: self.node(source)?.path.clone(),
            output_index,
            target: self.node(target)?.path.clone(),
            input_index,
        };
        log::debug!("{:?}", event);
        self.emit(event);
        Ok(id)
    }

    /// Remove a connection from both endpoints
    pub fn remove_connection(&mut self, id: ConnectionId) -> Result<()> {
        let target = self.connection(id)?.input_node();
        let description = format!("Disconnect {}", self.node(target)?.name);
        self.with_snapshot(&description, |session| {
            session.remove_connection_unrecorded(id)
        })
    }

    pub(crate) fn remove_connection_unrecorded(&mut self, id: ConnectionId) -> Result<()> {
        let conn = self
            .connections
            .remove(&id)
            .ok_or_else(|| NodeEngineError::ConnectionNotFound(id.to_string()))?;

        let mut source_path = String::new();
        if let Some(source) = self.nodes.get_mut(&conn.output_node()) {
            if let Some(list) = source.outputs.get_mut(&conn.output_index()) {
                list.retain(|c| *c != id);
                if list.is_empty() {
                    source.outputs.remove(&conn.output_index());
                }
            }
            source_path = source.path.clone();
        }
        let mut target_path = String::new();
        if let Some(target) = self.nodes.get_mut(&conn.input_node()) {
            if target.inputs.get(&conn.input_index()) == Some(&id) {
                target.inputs.remove(&conn.input_index());
            }
            target_path = target.path.clone();
        }
        self.invalidate(conn.input_node());

        self.emit(GraphEvent::ConnectionRemoved {
            source: source_path,
            output_index: conn.output_index(),
            target: target_path,
            input_index: conn.input_index(),
        });
        Ok(())
    }

    /// Set the UI selection flag of a connection
    pub fn select_connection(&mut self, id: ConnectionId, selected: bool) -> Result<()> {
        self.connections
            .get_mut(&id)
            .ok_or_else(|| NodeEngineError::ConnectionNotFound(id.to_string()))?
            .selected = selected;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Naming and hierarchy
    // ------------------------------------------------------------------

    /// Rename a node, moving its whole subtree to the new path
    ///
    /// Returns the new path.
    pub fn rename(&mut self, id: NodeId, name: &str) -> Result<String> {
        let node = self.node(id)?;
        if node.internal {
            return Err(NodeEngineError::InternalNode(node.path.clone()));
        }
        self.rename_node(id, name)
    }

    fn rename_node(&mut self, id: NodeId, name: &str) -> Result<String> {
        validate_name(name)?;
        let node = self.node(id)?;
        let old_path = node.path.clone();
        let old_name = node.name.clone();
        let new_path = join_path(parent_path(&old_path), name);
        if new_path == old_path {
            return Ok(new_path);
        }
        if self.environment.contains_key(&new_path) {
            return Err(NodeEngineError::PathCollision(new_path));
        }

        self.undo.record_op(
            &format!("Rename {} to {}", old_name, name),
            EditOp::Rename {
                path: new_path.clone(),
                name: old_name,
            },
            EditOp::Rename {
                path: old_path.clone(),
                name: name.to_string(),
            },
        );
        self.node_mut(id)?.name = name.to_string();
        self.move_subtree(&old_path, &new_path);
        Ok(new_path)
    }

    /// Move a node under another parent (`/` for the root)
    pub fn set_parent(&mut self, id: NodeId, parent_path: &str) -> Result<String> {
        let node = self.node(id)?;
        if node.internal {
            return Err(NodeEngineError::InternalNode(node.path.clone()));
        }
        let old_path = node.path.clone();
        let new_parent = if parent_path == ROOT {
            None
        } else {
            Some(
                self.environment
                    .get(parent_path)
                    .copied()
                    .ok_or_else(|| NodeEngineError::ParentNotFound(parent_path.to_string()))?,
            )
        };
        if parent_path == old_path || identity::is_descendant(parent_path, &old_path) {
            return Err(NodeEngineError::AncestryCycle {
                node: old_path,
                parent: parent_path.to_string(),
            });
        }
        let new_path = join_path(parent_path, &node.name);
        if new_path == old_path {
            return Ok(new_path);
        }
        if self.environment.contains_key(&new_path) {
            return Err(NodeEngineError::PathCollision(new_path));
        }

        let description = format!("Move {}", node.name);
        self.with_snapshot(&description, |session| {
            session.invalidate(id);
            let old_parent = session.node(id)?.parent;
            if let Some(old) = old_parent.and_then(|p| session.nodes.get_mut(&p)) {
                old.children.retain(|c| *c != id);
            }
            if let Some(parent) = new_parent {
                session.node_mut(parent)?.children.push(id);
            }
            session.node_mut(id)?.parent = new_parent;
            session.move_subtree(&old_path, &new_path);
            session.invalidate(id);
            Ok(new_path.clone())
        })
    }

    /// Rewrite `old_prefix` to `new_prefix` for a node and its descendants
    fn move_subtree(&mut self, old_prefix: &str, new_prefix: &str) {
        let moved: Vec<(String, NodeId)> = self
            .environment
            .iter()
            .filter(|(p, _)| *p == old_prefix || identity::is_descendant(p, old_prefix))
            .map(|(p, id)| (p.clone(), *id))
            .collect();
        for (path, _) in &moved {
            self.environment.remove(path);
        }
        for (path, id) in moved {
            let rebased = identity::rebase(&path, old_prefix, new_prefix);
            if let Some(node) = self.nodes.get_mut(&id) {
                node.path = rebased.clone();
            }
            self.environment.insert(rebased, id);
        }
        self.loop_context.rebase(old_prefix, new_prefix);
        log::debug!("Moved {} to {}", old_prefix, new_prefix);
        self.emit(GraphEvent::NodeRenamed {
            old_path: old_prefix.to_string(),
            new_path: new_prefix.to_string(),
        });
    }

    /// Set the editor position of a node
    pub fn set_position(&mut self, id: NodeId, position: (f64, f64)) -> Result<()> {
        let node = self.node(id)?;
        if node.position == position {
            return Ok(());
        }
        let (name, path, old) = (node.name.clone(), node.path.clone(), node.position);
        self.undo.record_op(
            &format!("Move {}", name),
            EditOp::SetPosition {
                path: path.clone(),
                position: old,
            },
            EditOp::SetPosition { path, position },
        );
        self.node_mut(id)?.position = position;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Parameters
    // ------------------------------------------------------------------

    pub fn parameter(&self, id: NodeId, name: &str) -> Result<&Parameter> {
        let node = self.node(id)?;
        node.parameters
            .get(name)
            .ok_or_else(|| NodeEngineError::ParameterNotFound {
                path: node.path.clone(),
                name: name.to_string(),
            })
    }

    /// Store a new raw value and dirty the node and everything downstream
    pub fn set_parameter(&mut self, id: NodeId, name: &str, value: ParameterValue) -> Result<()> {
        let param = self.parameter(id, name)?;
        let value = param.check(value)?;
        if *param.raw() == value {
            return Ok(());
        }
        let old = param.raw().clone();
        let path = self.node(id)?.path.clone();
        self.undo.record_op(
            &format!("Set {}.{}", path, name),
            EditOp::SetParameter {
                path: path.clone(),
                name: name.to_string(),
                value: old,
            },
            EditOp::SetParameter {
                path,
                name: name.to_string(),
                value: value.clone(),
            },
        );
        self.node_mut(id)?.set_raw_parameter(name, value)?;
        self.invalidate(id);
        Ok(())
    }

    /// Scope a node's parameters evaluate in right now
    pub fn eval_scope(&self, id: NodeId) -> EvalScope<'_> {
        EvalScope::new(&self.globals)
            .with_loop_index(self.loop_index(id))
            .with_input(self.first_input_data(id))
    }

    /// Evaluate a parameter without cooking
    pub fn eval_parameter(&self, id: NodeId, name: &str) -> Result<Evaluation> {
        self.parameter(id, name)?.eval(&self.eval_scope(id))
    }

    /// Press a button parameter and return its result
    pub fn press_button(&mut self, id: NodeId, name: &str) -> Result<String> {
        let mut param = self.parameter(id, name)?.clone();
        let result = param.press(&self.eval_scope(id))?;
        if let Some(slot) = self.node_mut(id)?.parameters.get_mut(name) {
            *slot = param;
        }
        Ok(result)
    }

    // ------------------------------------------------------------------
    // Global variables
    // ------------------------------------------------------------------

    pub fn globals(&self) -> &GlobalVariables {
        &self.globals
    }

    pub fn get_global(&self, key: &str) -> Option<&str> {
        self.globals.get(key)
    }

    pub fn has_global(&self, key: &str) -> bool {
        self.globals.has(key)
    }

    pub fn list_globals(&self) -> &BTreeMap<String, String> {
        self.globals.list()
    }

    /// Set a global and dirty every node
    pub fn set_global(&mut self, key: &str, value: impl Into<String>) -> Result<()> {
        let value = value.into();
        crate::globals::validate_key(key)?;
        let previous = self.globals.get(key).map(str::to_string);
        if previous.as_deref() == Some(value.as_str()) {
            return Ok(());
        }
        self.undo.record_op(
            &format!("Set ${}", key),
            EditOp::SetGlobal {
                key: key.to_string(),
                value: previous,
            },
            EditOp::SetGlobal {
                key: key.to_string(),
                value: Some(value.clone()),
            },
        );
        self.globals.set(key, value)?;
        self.invalidate_all();
        Ok(())
    }

    /// Delete a global, returning its value
    pub fn delete_global(&mut self, key: &str) -> Result<Option<String>> {
        let Some(previous) = self.globals.get(key).map(str::to_string) else {
            return Ok(None);
        };
        self.undo.record_op(
            &format!("Delete ${}", key),
            EditOp::SetGlobal {
                key: key.to_string(),
                value: Some(previous),
            },
            EditOp::SetGlobal {
                key: key.to_string(),
                value: None,
            },
        );
        let removed = self.globals.delete(key);
        self.invalidate_all();
        Ok(removed)
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
