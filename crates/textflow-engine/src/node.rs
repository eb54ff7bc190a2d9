//! Graph vertices and the contract for processing units

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::constants::params;
use crate::descriptor::NodeMetadata;
use crate::engine::CookContext;
use crate::error::Result;
use crate::parameter::{Parameter, ParameterValue};
use crate::session::Session;
use crate::types::{ConnectionId, CookState, NodeId, TextList};

/// Trait for units that can describe their kind
///
/// Paired with [`NodeKindFn`](crate::NodeKindFn) for link-time
/// registration.
pub trait NodeDescriptor {
    /// Get the static metadata for this kind
    fn descriptor() -> NodeMetadata
    where
        Self: Sized;
}

/// Per-node processing logic
///
/// One instance lives on each node. The engine takes it out of the node
/// while it cooks, so `cook` may freely borrow the session through the
/// context.
pub trait NodeLogic: Send {
    /// Parameters this kind declares (the universal `enabled` toggle is
    /// added by the engine)
    fn parameters(&self) -> Vec<Parameter> {
        Vec::new()
    }

    /// Called once after the node is registered in the session
    fn on_created(&mut self, _session: &mut Session, _node: NodeId) -> Result<()> {
        Ok(())
    }

    /// Produce one list per output slot
    ///
    /// An error is recorded on the node and leaves it uncooked; warnings
    /// go through [`CookContext::warn`].
    fn cook(&mut self, ctx: &mut CookContext<'_>) -> Result<Vec<TextList>>;
}

/// A graph vertex
pub struct Node {
    pub(crate) id: NodeId,
    pub(crate) name: String,
    pub(crate) path: String,
    pub(crate) metadata: Arc<NodeMetadata>,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) inputs: BTreeMap<usize, ConnectionId>,
    pub(crate) outputs: BTreeMap<usize, Vec<ConnectionId>>,
    pub(crate) state: CookState,
    pub(crate) errors: Vec<String>,
    pub(crate) warnings: Vec<String>,
    pub(crate) output: Vec<TextList>,
    pub(crate) cook_count: u64,
    pub(crate) last_cook_time: Duration,
    pub(crate) parameters: BTreeMap<String, Parameter>,
    pub(crate) position: (f64, f64),
    pub(crate) internal: bool,
    pub(crate) content_hash: Option<blake3::Hash>,
    pub(crate) logic: Option<Box<dyn NodeLogic>>,
}

impl Node {
    pub(crate) fn new(
        id: NodeId,
        name: String,
        path: String,
        metadata: Arc<NodeMetadata>,
        logic: Box<dyn NodeLogic>,
    ) -> Self {
        let mut parameters = BTreeMap::new();
        parameters.insert(
            params::ENABLED.to_string(),
            Parameter::toggle(params::ENABLED, true).with_label("Enabled"),
        );
        for param in logic.parameters() {
            parameters.insert(param.name().to_string(), param);
        }
        Self {
            id,
            name,
            path,
            metadata,
            parent: None,
            children: Vec::new(),
            inputs: BTreeMap::new(),
            outputs: BTreeMap::new(),
            state: CookState::Uncooked,
            errors: Vec::new(),
            warnings: Vec::new(),
            output: Vec::new(),
            cook_count: 0,
            last_cook_time: Duration::ZERO,
            parameters,
            position: (0.0, 0.0),
            internal: false,
            content_hash: None,
            logic: Some(logic),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn node_type(&self) -> &str {
        &self.metadata.node_type
    }

    pub fn metadata(&self) -> &NodeMetadata {
        &self.metadata
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Owned children in creation order
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Incoming connections keyed by input slot
    pub fn inputs(&self) -> &BTreeMap<usize, ConnectionId> {
        &self.inputs
    }

    /// Outgoing connections keyed by output slot
    pub fn outputs(&self) -> &BTreeMap<usize, Vec<ConnectionId>> {
        &self.outputs
    }

    pub(crate) fn output_connections(&self) -> impl Iterator<Item = ConnectionId> + '_ {
        self.outputs.values().flatten().copied()
    }

    pub fn state(&self) -> CookState {
        self.state
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Cached output, one list per slot
    pub fn output(&self) -> &[TextList] {
        &self.output
    }

    /// Cached output of one slot (empty when never cooked)
    pub fn output_slot(&self, index: usize) -> &[String] {
        self.output.get(index).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn cook_count(&self) -> u64 {
        self.cook_count
    }

    pub fn last_cook_time(&self) -> Duration {
        self.last_cook_time
    }

    pub fn is_time_dependent(&self) -> bool {
        self.metadata.time_dependent
    }

    /// Owned by a Looper and managed by it
    pub fn is_internal(&self) -> bool {
        self.internal
    }

    pub fn position(&self) -> (f64, f64) {
        self.position
    }

    pub fn parameter(&self, name: &str) -> Option<&Parameter> {
        self.parameters.get(name)
    }

    /// Parameters in name order
    pub fn parameters(&self) -> impl Iterator<Item = &Parameter> {
        self.parameters.values()
    }

    /// State of the universal bypass toggle
    pub fn is_enabled(&self) -> bool {
        self.parameters
            .get(params::ENABLED)
            .and_then(|p| p.raw().as_bool())
            .unwrap_or(true)
    }

    /// Number of output slots the node fills
    pub(crate) fn output_arity(&self) -> usize {
        self.metadata.outputs.len().max(1)
    }

    /// Drop cached state so the next pass cooks this node
    pub(crate) fn mark_uncooked(&mut self) {
        if self.state != CookState::Cooking {
            self.state = CookState::Uncooked;
        }
    }

    pub(crate) fn set_raw_parameter(&mut self, name: &str, value: ParameterValue) -> Result<()> {
        match self.parameters.get_mut(name) {
            Some(param) => param.set(value),
            None => Err(crate::error::NodeEngineError::ParameterNotFound {
                path: self.path.clone(),
                name: name.to_string(),
            }),
        }
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("path", &self.path)
            .field("node_type", &self.metadata.node_type)
            .field("state", &self.state)
            .field("inputs", &self.inputs)
            .field("outputs", &self.outputs)
            .field("errors", &self.errors)
            .field("warnings", &self.warnings)
            .finish_non_exhaustive()
    }
}
