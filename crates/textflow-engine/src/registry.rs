//! Node kind registry
//!
//! Maps type tags to metadata and a factory for the kind's
//! [`NodeLogic`]. Built-in kinds (the loop construct here, the processing
//! units in `textflow-nodes`) are collected at link time:
//!
//! ```ignore
//! inventory::submit!(textflow_engine::NodeKindFn {
//!     descriptor: TextNode::descriptor,
//!     factory: || Box::new(TextNode),
//! });
//! ```
//!
//! Hosts can add further kinds with [`NodeKindRegistry::register`].

use std::collections::HashMap;
use std::sync::Arc;

use crate::descriptor::NodeMetadata;
use crate::error::{NodeEngineError, Result};
use crate::node::NodeLogic;
use crate::types::NodeCategory;

/// Creates a fresh logic instance for one node
pub type NodeFactory = Arc<dyn Fn() -> Box<dyn NodeLogic> + Send + Sync>;

/// Link-time registration of a node kind
pub struct NodeKindFn {
    /// Metadata of the kind
    pub descriptor: fn() -> NodeMetadata,
    /// Logic constructor
    pub factory: fn() -> Box<dyn NodeLogic>,
}

inventory::collect!(NodeKindFn);

struct RegistryEntry {
    metadata: Arc<NodeMetadata>,
    factory: NodeFactory,
}

/// Registry of node kinds
pub struct NodeKindRegistry {
    entries: HashMap<String, RegistryEntry>,
}

impl NodeKindRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Create a registry holding every kind submitted through `inventory`
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for kind in inventory::iter::<NodeKindFn> {
            let factory = kind.factory;
            registry.register((kind.descriptor)(), move || factory());
        }
        log::debug!("Registered {} built-in node kinds", registry.len());
        registry
    }

    /// Register (or replace) a kind
    pub fn register<F>(&mut self, metadata: NodeMetadata, factory: F)
    where
        F: Fn() -> Box<dyn NodeLogic> + Send + Sync + 'static,
    {
        self.entries.insert(
            metadata.node_type.clone(),
            RegistryEntry {
                metadata: Arc::new(metadata),
                factory: Arc::new(factory),
            },
        );
    }

    /// Get metadata for a kind
    pub fn get_metadata(&self, node_type: &str) -> Option<&NodeMetadata> {
        self.entries.get(node_type).map(|e| e.metadata.as_ref())
    }

    /// Metadata plus a fresh logic instance
    pub(crate) fn instantiate(
        &self,
        node_type: &str,
    ) -> Result<(Arc<NodeMetadata>, Box<dyn NodeLogic>)> {
        let entry = self
            .entries
            .get(node_type)
            .ok_or_else(|| NodeEngineError::UnknownNodeType(node_type.to_string()))?;
        Ok((entry.metadata.clone(), (entry.factory)()))
    }

    /// All registered metadata
    pub fn all_metadata(&self) -> Vec<&NodeMetadata> {
        self.entries.values().map(|e| e.metadata.as_ref()).collect()
    }

    /// Metadata grouped by category
    pub fn metadata_by_category(&self) -> HashMap<NodeCategory, Vec<&NodeMetadata>> {
        let mut grouped: HashMap<NodeCategory, Vec<&NodeMetadata>> = HashMap::new();
        for entry in self.entries.values() {
            grouped
                .entry(entry.metadata.category)
                .or_default()
                .push(entry.metadata.as_ref());
        }
        grouped
    }

    pub fn has_node_type(&self, node_type: &str) -> bool {
        self.entries.contains_key(node_type)
    }

    /// All registered type tags, sorted
    pub fn node_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.entries.keys().map(|s| s.as_str()).collect();
        types.sort_unstable();
        types
    }

    /// Merge another registry into this one
    ///
    /// Entries from `other` replace entries with the same type tag.
    pub fn merge(&mut self, other: NodeKindRegistry) {
        self.entries.extend(other.entries);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for NodeKindRegistry {
    fn default() -> Self {
        Self::new()
    }
}
