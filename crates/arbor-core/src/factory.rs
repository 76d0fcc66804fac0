//! Maps factory paths to node constructors.

use std::sync::Arc;

use crate::container::{ContainerKind, NodeContainer};
use crate::leaf::{LeafNode, Processor};
use crate::network::NetworkHandle;
use crate::node::NodeRef;
use crate::tree::ValueTree;

/// Builds a node for a tree entity.
pub type NodeConstructor = Arc<dyn Fn(ValueTree, NetworkHandle) -> NodeRef + Send + Sync>;

/// One registered node type.
#[derive(Clone)]
pub struct FactoryEntry {
    path: String,
    description: String,
    constructor: NodeConstructor,
}

impl FactoryEntry {
    /// Factory path, e.g. `container.chain`.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// One-line description.
    pub fn description(&self) -> &str {
        &self.description
    }
}

impl core::fmt::Debug for FactoryEntry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FactoryEntry")
            .field("path", &self.path)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

/// Registry of node types, keyed by factory path.
///
/// [`NodeFactory::new`] registers the four container kinds; leaf processors
/// are added with [`register_processor`](Self::register_processor).
#[derive(Clone, Debug)]
pub struct NodeFactory {
    entries: Vec<FactoryEntry>,
}

impl Default for NodeFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeFactory {
    /// A factory with the container kinds registered.
    pub fn new() -> Self {
        let mut factory = Self::empty();
        for kind in ContainerKind::ALL {
            factory.register(kind.factory_path(), kind.description(), move |tree, network| {
                NodeContainer::new(kind, tree, network)
            });
        }
        factory
    }

    /// A factory with nothing registered.
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Registers (or replaces) a constructor.
    pub fn register<F>(&mut self, path: &str, description: &str, constructor: F)
    where
        F: Fn(ValueTree, NetworkHandle) -> NodeRef + Send + Sync + 'static,
    {
        let entry = FactoryEntry {
            path: path.to_string(),
            description: description.to_string(),
            constructor: Arc::new(constructor),
        };
        match self.entries.iter_mut().find(|e| e.path == path) {
            Some(existing) => *existing = entry,
            None => self.entries.push(entry),
        }
    }

    /// Registers a leaf node built around a fresh processor from `make`.
    pub fn register_processor<P, F>(&mut self, path: &str, description: &str, make: F)
    where
        P: Processor + 'static,
        F: Fn() -> P + Send + Sync + 'static,
    {
        self.register(path, description, move |tree, network| {
            LeafNode::new(tree, network, Box::new(make()))
        });
    }

    /// Builds a node for `path`, or `None` if the path is unknown.
    pub fn create(&self, path: &str, tree: ValueTree, network: NetworkHandle) -> Option<NodeRef> {
        let entry = self.entries.iter().find(|e| e.path == path)?;
        Some((entry.constructor)(tree, network))
    }

    /// True if `path` is registered.
    pub fn contains(&self, path: &str) -> bool {
        self.entries.iter().any(|e| e.path == path)
    }

    /// Registered entries in registration order.
    pub fn entries(&self) -> &[FactoryEntry] {
        &self.entries
    }

    /// Registered paths in registration order.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.path.as_str())
    }
}
