//! The polymorphic processing unit shared by leaves and containers.
//!
//! Every node is bound to one `Node` tree entity. [`NodeBase`] mirrors the
//! entity's `NumChannels` and `Bypassed` properties into atomics so the audio
//! context can read them without touching the tree, and owns the node's
//! [`Parameter`]s.
//!
//! Nodes are shared as [`NodeRef`] (`Arc<dyn Node>`): a container owns its
//! children, connections and the network registry hold weak references.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::RwLock;

use crate::buffer::ProcessData;
use crate::codegen::{self, CodeLocation};
use crate::container::NodeContainer;
use crate::ids::{props, types};
use crate::network::NetworkHandle;
use crate::parameter::Parameter;
use crate::tree::{DeliveryMode, ListenerHandle, ListenerScope, PropertyFilter, ValueTree};

/// Shared handle to a node.
pub type NodeRef = Arc<dyn Node>;

/// Channel count a node gets when its tree does not specify one.
pub const DEFAULT_NUM_CHANNELS: usize = 2;

/// Processing configuration handed down by `prepare`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PrepareSpec {
    /// Sample rate in Hz.
    pub sample_rate: f64,
    /// Maximum samples per channel in one `process` call.
    pub block_size: usize,
    /// Channels the node will be asked to process.
    pub num_channels: usize,
}

impl PrepareSpec {
    /// Creates a spec.
    pub const fn new(sample_rate: f64, block_size: usize, num_channels: usize) -> Self {
        Self {
            sample_rate,
            block_size,
            num_channels,
        }
    }

    /// The same spec with a different channel count.
    pub const fn with_channels(self, num_channels: usize) -> Self {
        Self {
            num_channels,
            ..self
        }
    }
}

/// A processing node in a network.
///
/// `prepare` must run before `process`; the two may be called from different
/// threads, but never concurrently for the same node (the network lock
/// serialises them).
pub trait Node: Send + Sync {
    /// Shared node state.
    fn base(&self) -> &NodeBase;

    /// Prepares for processing. May be called repeatedly.
    fn prepare(&self, spec: PrepareSpec);

    /// Processes one block in place.
    fn process(&self, data: &mut ProcessData<'_>);

    /// Processes one frame (one sample per channel) in place.
    fn process_single(&self, frame: &mut [f32]);

    /// Sets the bypass flag without touching the tree. Safe from the audio
    /// context.
    fn set_bypassed(&self, bypassed: bool) {
        self.base().set_bypassed(bypassed);
    }

    /// Current bypass flag.
    fn is_bypassed(&self) -> bool {
        self.base().is_bypassed()
    }

    /// Channels this node processes.
    fn num_channels_to_process(&self) -> usize {
        self.base().num_channels()
    }

    /// Scalar modulation output, for nodes that are modulation sources.
    fn handle_modulation(&self) -> Option<f64> {
        None
    }

    /// Downcast to a container.
    fn as_container(&self) -> Option<&NodeContainer> {
        None
    }

    /// Emitted code for one location of the exported class.
    fn cpp_code(&self, location: CodeLocation) -> String {
        codegen::leaf_code(self.base(), location)
    }
}

impl dyn Node {
    /// Node id.
    pub fn id(&self) -> &str {
        self.base().id()
    }

    /// Backing tree entity.
    pub fn tree(&self) -> &ValueTree {
        self.base().tree()
    }

    /// Snapshot of the node's parameters.
    pub fn parameters(&self) -> Vec<Arc<Parameter>> {
        self.base().parameters()
    }

    /// Parameter with the given id.
    pub fn parameter(&self, id: &str) -> Option<Arc<Parameter>> {
        self.base().parameter(id)
    }

    /// True if the node declares a fixed channel requirement.
    pub fn has_fixed_channel_amount(&self) -> bool {
        self.base().has_fixed_channel_amount()
    }

    /// Requests a channel count through the tree. No-op for fixed nodes.
    pub fn set_num_channels(&self, num_channels: usize) {
        self.base().set_num_channels(num_channels);
    }
}

/// Tree-mirrored flags read on the audio path.
#[derive(Debug)]
struct NodeFlags {
    num_channels: AtomicUsize,
    bypassed: AtomicBool,
}

/// State shared by every node type.
pub struct NodeBase {
    id: String,
    path: String,
    tree: ValueTree,
    network: NetworkHandle,
    flags: Arc<NodeFlags>,
    fixed_channels: Option<usize>,
    parameters: RwLock<Vec<Arc<Parameter>>>,
    _listener: ListenerHandle,
}

impl NodeBase {
    /// Binds to `tree`. A `fixed_channels` node always reports that count.
    pub fn new(tree: ValueTree, network: NetworkHandle, fixed_channels: Option<usize>) -> Self {
        match fixed_channels {
            Some(n) => {
                tree.set_property(props::NUM_CHANNELS, n);
            }
            None => tree.set_default(props::NUM_CHANNELS, DEFAULT_NUM_CHANNELS),
        }
        tree.set_default(props::BYPASSED, false);

        let flags = Arc::new(NodeFlags {
            num_channels: AtomicUsize::new(read_channels(&tree)),
            bypassed: AtomicBool::new(tree.property_bool(props::BYPASSED)),
        });

        let mirror = Arc::downgrade(&flags);
        let listener = tree.add_listener(
            ListenerScope::Properties,
            PropertyFilter::only(&[props::NUM_CHANNELS, props::BYPASSED]),
            DeliveryMode::Synchronous,
            move |event| {
                let (Some(flags), Some((tree, property))) =
                    (mirror.upgrade(), event.property_change())
                else {
                    return;
                };
                if property == props::NUM_CHANNELS {
                    if fixed_channels.is_none() {
                        flags
                            .num_channels
                            .store(read_channels(tree), Ordering::Release);
                    }
                } else {
                    flags
                        .bypassed
                        .store(tree.property_bool(props::BYPASSED), Ordering::Release);
                }
            },
        );

        Self {
            id: tree.property_string(props::ID),
            path: tree.property_string(props::FACTORY_PATH),
            tree,
            network,
            flags,
            fixed_channels,
            parameters: RwLock::new(Vec::new()),
            _listener: listener,
        }
    }

    /// Node id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Factory path the node was created from.
    pub fn factory_path(&self) -> &str {
        &self.path
    }

    /// Backing tree entity.
    pub fn tree(&self) -> &ValueTree {
        &self.tree
    }

    /// Handle to the owning network.
    pub fn network(&self) -> &NetworkHandle {
        &self.network
    }

    /// The `Parameters` child of the node's tree, created on demand.
    pub fn parameter_tree(&self) -> ValueTree {
        self.tree.get_or_create_child_with_name(types::PARAMETERS)
    }

    /// Current channel count.
    #[inline]
    pub fn num_channels(&self) -> usize {
        self.flags.num_channels.load(Ordering::Acquire)
    }

    /// Requests a channel count by writing the tree property.
    ///
    /// Fixed-channel nodes ignore the request.
    pub fn set_num_channels(&self, num_channels: usize) {
        if self.fixed_channels.is_none() {
            self.tree.set_property(props::NUM_CHANNELS, num_channels);
        }
    }

    /// True if the node declares a fixed channel requirement.
    pub fn has_fixed_channel_amount(&self) -> bool {
        self.fixed_channels.is_some()
    }

    /// Current bypass flag.
    #[inline]
    pub fn is_bypassed(&self) -> bool {
        self.flags.bypassed.load(Ordering::Acquire)
    }

    /// Sets the bypass flag without writing the tree.
    #[inline]
    pub fn set_bypassed(&self, bypassed: bool) {
        self.flags.bypassed.store(bypassed, Ordering::Release);
    }

    /// Snapshot of the parameter list.
    pub fn parameters(&self) -> Vec<Arc<Parameter>> {
        self.parameters.read().clone()
    }

    /// Parameter with the given id.
    pub fn parameter(&self, id: &str) -> Option<Arc<Parameter>> {
        self.parameters.read().iter().find(|p| p.id() == id).cloned()
    }

    /// Appends a parameter unless one bound to the same tree exists.
    pub fn add_parameter(&self, parameter: Arc<Parameter>) {
        let mut parameters = self.parameters.write();
        if !parameters.iter().any(|p| p.tree() == parameter.tree()) {
            parameters.push(parameter);
        }
    }

    /// Removes the parameter bound to `tree`, by identity.
    pub fn remove_parameter(&self, tree: &ValueTree) -> Option<Arc<Parameter>> {
        let mut parameters = self.parameters.write();
        let index = parameters.iter().position(|p| p.tree() == tree)?;
        Some(parameters.remove(index))
    }
}

impl core::fmt::Debug for NodeBase {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("NodeBase")
            .field("id", &self.id)
            .field("path", &self.path)
            .field("num_channels", &self.num_channels())
            .field("bypassed", &self.is_bypassed())
            .field("fixed", &self.fixed_channels)
            .finish_non_exhaustive()
    }
}

fn read_channels(tree: &ValueTree) -> usize {
    tree.property(props::NUM_CHANNELS)
        .and_then(|v| v.as_i64())
        .map_or(DEFAULT_NUM_CHANNELS, |n| n.max(0) as usize)
}

/// Creates a detached `Node` entity with the given id and factory path.
pub fn node_tree(id: &str, factory_path: &str) -> ValueTree {
    ValueTree::new(types::NODE)
        .with_property(props::ID, id)
        .with_property(props::FACTORY_PATH, factory_path)
}
