//! A complete node graph bound to one tree.
//!
//! The [`Network`] owns the `Network` tree entity, the root container, the
//! node factory, and a registry that resolves tree entities and ids to live
//! nodes. The registry holds weak references only; containers own their
//! children.
//!
//! One coarse re-entrant lock per network serialises structural edits on the
//! control context against `prepare` and `process` on the audio context.
//! Containers take it around every child-list mutation and layout pass.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock, Weak};

use parking_lot::{Mutex, ReentrantMutex, ReentrantMutexGuard};

use crate::buffer::ProcessData;
use crate::codegen;
use crate::container::{ContainerKind, NodeContainer};
use crate::error::GraphError;
use crate::factory::NodeFactory;
use crate::ids::{props, types};
use crate::node::{DEFAULT_NUM_CHANNELS, Node, NodeRef, PrepareSpec, node_tree};
use crate::tree::{ValueTree, WeakTree};

pub(crate) struct NetworkShared {
    factory: NodeFactory,
    root: OnceLock<Weak<NodeContainer>>,
    registry: Mutex<Vec<(WeakTree, Weak<dyn Node>)>>,
    lock: ReentrantMutex<()>,
    built: AtomicBool,
}

impl NetworkShared {
    pub(crate) fn lock(&self) -> ReentrantMutexGuard<'_, ()> {
        self.lock.lock()
    }

    /// Live node bound to `tree`, created through the factory if needed.
    pub(crate) fn node_for_tree(self: &Arc<Self>, tree: &ValueTree) -> Option<NodeRef> {
        if let Some(existing) = self.lookup(tree) {
            return Some(existing);
        }

        let path = tree.property_string(props::FACTORY_PATH);
        let handle = NetworkHandle(Arc::downgrade(self));
        let Some(node) = self.factory.create(&path, tree.clone(), handle) else {
            #[cfg(feature = "tracing")]
            tracing::warn!(
                id = %tree.property_string(props::ID),
                path = %path,
                "unknown factory path, node ignored"
            );
            return None;
        };
        self.register(tree, &node);

        #[cfg(feature = "tracing")]
        tracing::debug!(id = node.id(), path = %path, "node created");

        Some(node)
    }

    pub(crate) fn get(&self, id: &str) -> Option<NodeRef> {
        let mut registry = self.registry.lock();
        registry.retain(|(_, n)| n.strong_count() > 0);
        registry
            .iter()
            .filter_map(|(_, n)| n.upgrade())
            .find(|n| n.id() == id)
    }

    pub(crate) fn refresh_connections_if_built(&self) {
        if self.built.load(Ordering::Acquire) {
            self.refresh_connections();
        }
    }

    fn refresh_connections(&self) {
        let Some(root) = self.root.get().and_then(Weak::upgrade) else {
            return;
        };
        root.refresh_connections();
        for node in root.child_nodes_recursive() {
            if let Some(container) = node.as_container() {
                container.refresh_connections();
            }
        }
    }

    fn lookup(&self, tree: &ValueTree) -> Option<NodeRef> {
        let mut registry = self.registry.lock();
        registry.retain(|(_, n)| n.strong_count() > 0);
        registry
            .iter()
            .find(|(t, _)| t.refers_to(tree))
            .and_then(|(_, n)| n.upgrade())
    }

    fn register(&self, tree: &ValueTree, node: &NodeRef) {
        self.registry
            .lock()
            .push((tree.downgrade(), Arc::downgrade(node)));
    }
}

/// Non-owning handle from a node to its network.
///
/// Detached nodes (built outside a network) hold an empty handle; lookups
/// through it find nothing.
#[derive(Clone, Default)]
pub struct NetworkHandle(Weak<NetworkShared>);

impl NetworkHandle {
    pub(crate) fn upgrade(&self) -> Option<Arc<NetworkShared>> {
        self.0.upgrade()
    }

    /// Node with the given id anywhere in the network.
    pub fn get(&self, id: &str) -> Option<NodeRef> {
        self.upgrade()?.get(id)
    }

    /// True while the network is alive.
    pub fn is_attached(&self) -> bool {
        self.0.strong_count() > 0
    }
}

impl core::fmt::Debug for NetworkHandle {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("NetworkHandle")
            .field("attached", &self.is_attached())
            .finish()
    }
}

/// A node graph built from a `Network` tree entity.
#[derive(Clone)]
pub struct Network {
    tree: ValueTree,
    shared: Arc<NetworkShared>,
    root: Arc<NodeContainer>,
}

impl Network {
    /// Builds the graph described by `tree`.
    ///
    /// Nodes with unknown factory paths below the root are skipped; the root
    /// itself must be a container.
    pub fn new(tree: ValueTree, factory: NodeFactory) -> Result<Self, GraphError> {
        if !tree.has_type(types::NETWORK) {
            return Err(GraphError::InvalidTree(format!(
                "expected a '{}' entity, found '{}'",
                types::NETWORK,
                tree.type_name()
            )));
        }
        let root_tree = tree.child_with_name(types::NODE).ok_or(GraphError::MissingRoot)?;
        check_ids(&root_tree)?;

        let root_id = root_tree.property_string(props::ID);
        let root_path = root_tree.property_string(props::FACTORY_PATH);
        let kind = match ContainerKind::from_factory_path(&root_path) {
            Some(kind) => kind,
            None if factory.contains(&root_path) => {
                return Err(GraphError::RootNotContainer(root_id));
            }
            None => return Err(GraphError::UnknownFactoryPath(root_path)),
        };

        let shared = Arc::new(NetworkShared {
            factory,
            root: OnceLock::new(),
            registry: Mutex::new(Vec::new()),
            lock: ReentrantMutex::new(()),
            built: AtomicBool::new(false),
        });

        let root = {
            let _lock = shared.lock();
            let root = NodeContainer::new(
                kind,
                root_tree.clone(),
                NetworkHandle(Arc::downgrade(&shared)),
            );
            let as_node: NodeRef = root.clone();
            shared.register(&root_tree, &as_node);
            root
        };
        // A fresh OnceLock always accepts the first value.
        let _ = shared.root.set(Arc::downgrade(&root));
        shared.built.store(true, Ordering::Release);
        shared.refresh_connections();

        #[cfg(feature = "tracing")]
        tracing::debug!(root = %root_id, nodes = root.child_nodes_recursive().len(), "network built");

        Ok(Self { tree, shared, root })
    }

    /// Builds a network with an empty root container.
    pub fn with_root(id: &str, factory_path: &str, factory: NodeFactory) -> Result<Self, GraphError> {
        let root = node_tree(id, factory_path).with_property(props::NUM_CHANNELS, DEFAULT_NUM_CHANNELS);
        Self::new(ValueTree::new(types::NETWORK).with_child(root), factory)
    }

    /// The `Network` tree entity.
    pub fn tree(&self) -> &ValueTree {
        &self.tree
    }

    /// The root container.
    pub fn root(&self) -> &Arc<NodeContainer> {
        &self.root
    }

    /// The node factory.
    pub fn factory(&self) -> &NodeFactory {
        &self.shared.factory
    }

    /// Handle that nodes of this network hold.
    pub fn handle(&self) -> NetworkHandle {
        NetworkHandle(Arc::downgrade(&self.shared))
    }

    /// Takes the network's structural lock. Re-entrant.
    pub fn lock(&self) -> ReentrantMutexGuard<'_, ()> {
        self.shared.lock()
    }

    /// Node with the given id.
    pub fn get(&self, id: &str) -> Option<NodeRef> {
        self.shared.get(id)
    }

    /// Live node bound to `tree`, created if the tree is not bound yet.
    pub fn node_for_tree(&self, tree: &ValueTree) -> Option<NodeRef> {
        self.shared.node_for_tree(tree)
    }

    /// The root followed by every descendant, depth first.
    pub fn nodes(&self) -> Vec<NodeRef> {
        let root: NodeRef = self.root.clone();
        let mut nodes = vec![root];
        nodes.extend(self.root.child_nodes_recursive());
        nodes
    }

    /// Returns `base` if no node in the tree uses it, else `base1`, `base2`, ...
    pub fn unique_id(&self, base: &str) -> String {
        let taken = |id: &str| {
            self.tree
                .find(&|t| t.has_type(types::NODE) && t.property_string(props::ID) == id)
                .is_some()
        };
        if !taken(base) {
            return base.to_string();
        }
        (1..)
            .map(|n| format!("{base}{n}"))
            .find(|candidate| !taken(candidate))
            .unwrap_or_else(|| base.to_string())
    }

    /// Creates a detached node entity with a unique id.
    ///
    /// Add it to a container's `Nodes` entity to instantiate the node.
    pub fn create_node_tree(&self, id: &str, factory_path: &str) -> ValueTree {
        let tree = node_tree(&self.unique_id(id), factory_path);
        if ContainerKind::from_factory_path(factory_path).is_some() {
            let _ = tree.add_child(ValueTree::new(types::NODES), None);
        }
        let _ = tree.add_child(ValueTree::new(types::PARAMETERS), None);
        tree
    }

    /// Channels the root processes.
    pub fn num_channels(&self) -> usize {
        self.root.num_channels_to_process()
    }

    /// Prepares every node.
    pub fn prepare(&self, sample_rate: f64, block_size: usize) {
        let _lock = self.lock();
        self.root
            .prepare(PrepareSpec::new(sample_rate, block_size, self.num_channels()));

        #[cfg(feature = "tracing")]
        tracing::debug!(sample_rate, block_size, "network prepared");
    }

    /// Processes one block through the root.
    pub fn process(&self, data: &mut ProcessData<'_>) {
        let _lock = self.lock();
        self.root.process(data);
    }

    /// Processes one frame through the root.
    pub fn process_single(&self, frame: &mut [f32]) {
        let _lock = self.lock();
        self.root.process_single(frame);
    }

    /// Writes deferred parameter values to the tree. Returns how many.
    pub fn flush_pending_values(&self) -> usize {
        self.nodes()
            .iter()
            .flat_map(|n| n.parameters())
            .filter(|p| p.flush_pending())
            .count()
    }

    /// Re-resolves every macro parameter and modulation target.
    pub fn refresh_connections(&self) {
        let _lock = self.lock();
        self.shared.refresh_connections();
    }

    /// Emits the whole network as one class.
    pub fn create_cpp_class(&self, class_name: &str) -> String {
        codegen::create_cpp_class(self, class_name)
    }
}

impl core::fmt::Debug for Network {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Network")
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

fn check_ids(root: &ValueTree) -> Result<(), GraphError> {
    let mut seen: Vec<String> = Vec::new();
    let mut stack = vec![root.clone()];
    while let Some(node) = stack.pop() {
        let id = node.property_string(props::ID);
        if id.is_empty() {
            return Err(GraphError::InvalidTree(format!(
                "node with factory path '{}' has no ID",
                node.property_string(props::FACTORY_PATH)
            )));
        }
        if seen.contains(&id) {
            return Err(GraphError::DuplicateId(id));
        }
        seen.push(id);
        if let Some(children) = node.child_with_name(types::NODES) {
            stack.extend(children.children().into_iter().rev());
        }
    }
    Ok(())
}
