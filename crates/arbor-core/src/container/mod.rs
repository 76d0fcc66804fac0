//! Containers: nodes that own and compose child nodes.
//!
//! A [`NodeContainer`] keeps three things consistent with its tree entity:
//!
//! - the ordered child list, mirrored from the `Nodes` child entity;
//! - its macro parameters, mirrored from the `Parameters` child entity;
//! - the channel layout of its children, re-derived whenever the container's
//!   own `NumChannels` or a direct child's `NumChannels` changes.
//!
//! All three react synchronously to tree notifications. A layout pass that
//! was triggered by a child is guarded against re-entry, because the pass
//! itself writes the channel counts of the other children. After every layout
//! pass the container re-runs `prepare` if it was prepared before.
//!
//! The processing strategy is selected by [`ContainerKind`].

mod bypass;
pub mod layout;
mod process;

use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use parking_lot::{Mutex, RwLock};

use crate::buffer::ProcessData;
use crate::codegen::{self, CodeLocation};
use crate::error::TreeError;
use crate::ids::{props, types};
use crate::macro_param::{MacroParameter, ScopedFlag};
use crate::network::NetworkHandle;
use crate::node::{Node, NodeBase, NodeRef, PrepareSpec};
use crate::parameter::{AtomicF64, Parameter};
use crate::range::ParameterRange;
use crate::tree::{DeliveryMode, ListenerHandle, ListenerScope, PropertyFilter, ValueTree};

pub use bypass::DEFAULT_BYPASS_RAMP_MS;
pub use layout::ChildChannels;
pub use process::MAX_FRAME_CHANNELS;

use bypass::BypassHandler;

/// Sub-sampling factor of modulation chains.
pub const EVENT_RASTER: usize = 8;

/// Id of the hidden parameter that carries a modulation chain's output.
pub const MODULATION_OUTPUT_ID: &str = "ModulationOutput";

/// Processing strategy of a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerKind {
    /// Children in series on the shared block, with a bypass crossfade.
    Chain,
    /// Children in parallel on copies of the input, outputs summed.
    Split,
    /// Children on disjoint channel ranges.
    MultiChannel,
    /// Children produce a control-rate scalar instead of audio.
    ModulationChain,
}

impl ContainerKind {
    /// Every kind, in registration order.
    pub const ALL: [ContainerKind; 4] = [
        ContainerKind::Chain,
        ContainerKind::Split,
        ContainerKind::MultiChannel,
        ContainerKind::ModulationChain,
    ];

    /// Factory path the kind is registered under.
    pub fn factory_path(self) -> &'static str {
        match self {
            ContainerKind::Chain => "container.chain",
            ContainerKind::Split => "container.split",
            ContainerKind::MultiChannel => "container.multi",
            ContainerKind::ModulationChain => "container.modchain",
        }
    }

    /// Kind registered under `path`.
    pub fn from_factory_path(path: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.factory_path() == path)
    }

    /// One-line description for listings.
    pub fn description(self) -> &'static str {
        match self {
            ContainerKind::Chain => "serial chain with bypass crossfade",
            ContainerKind::Split => "parallel branches on copies of the input, summed",
            ContainerKind::MultiChannel => "children on disjoint channel ranges",
            ContainerKind::ModulationChain => "control-rate modulation source",
        }
    }
}

enum KindState {
    Chain(BypassHandler),
    Split(Vec<f32>),
    MultiChannel,
    Modulation { counter: usize, block: Vec<f32> },
}

/// A node that owns an ordered list of child nodes.
pub struct NodeContainer {
    base: NodeBase,
    kind: ContainerKind,
    nodes_tree: ValueTree,
    parameter_tree: ValueTree,
    nodes: RwLock<Vec<NodeRef>>,
    macros: Mutex<Vec<Arc<MacroParameter>>>,
    modulation_targets: Option<Arc<MacroParameter>>,
    state: Mutex<KindState>,
    prepared: Mutex<Option<PrepareSpec>>,
    modulation_value: AtomicF64,
    updating_channels: AtomicBool,
    listeners: Mutex<Vec<ListenerHandle>>,
}

impl NodeContainer {
    /// Binds a container to `tree` and builds nodes and macro parameters for
    /// the children already present.
    pub fn new(kind: ContainerKind, tree: ValueTree, network: NetworkHandle) -> Arc<Self> {
        let base = NodeBase::new(tree, network, None);
        let nodes_tree = base.tree().get_or_create_child_with_name(types::NODES);
        let parameter_tree = base.parameter_tree();

        let modulation_targets = (kind == ContainerKind::ModulationChain).then(|| {
            let targets = base
                .tree()
                .get_or_create_child_with_name(types::MODULATION_TARGETS);
            let output = Parameter::new(Parameter::create_tree(
                MODULATION_OUTPUT_ID,
                ParameterRange::IDENTITY,
                0.0,
            ));
            MacroParameter::with_connection_tree(output, targets, base.network().clone())
        });

        let state = match kind {
            ContainerKind::Chain => KindState::Chain(BypassHandler::default()),
            ContainerKind::Split => KindState::Split(Vec::new()),
            ContainerKind::MultiChannel => KindState::MultiChannel,
            ContainerKind::ModulationChain => KindState::Modulation {
                counter: 0,
                block: Vec::new(),
            },
        };

        let container = Arc::new(Self {
            base,
            kind,
            nodes_tree,
            parameter_tree,
            nodes: RwLock::new(Vec::new()),
            macros: Mutex::new(Vec::new()),
            modulation_targets,
            state: Mutex::new(state),
            prepared: Mutex::new(None),
            modulation_value: AtomicF64::new(0.0),
            updating_channels: AtomicBool::new(false),
            listeners: Mutex::new(Vec::new()),
        });
        container.attach_listeners();

        for child in container.nodes_tree.children() {
            container.node_added_or_removed(&child, true);
        }
        for child in container.parameter_tree.children() {
            container.parameter_added_or_removed(&child, true);
        }
        container
    }

    fn attach_listeners(self: &Arc<Self>) {
        let on_nodes = self.nodes_tree.add_listener(
            ListenerScope::Children,
            PropertyFilter::any(),
            DeliveryMode::Synchronous,
            self.callback(|c, event| {
                if let Some((child, added)) = event.child_change() {
                    c.node_added_or_removed(child, added);
                }
            }),
        );
        let on_parameters = self.parameter_tree.add_listener(
            ListenerScope::Children,
            PropertyFilter::any(),
            DeliveryMode::Synchronous,
            self.callback(|c, event| {
                if let Some((child, added)) = event.child_change() {
                    c.parameter_added_or_removed(child, added);
                }
            }),
        );
        let on_channels = self.base.tree().add_listener(
            ListenerScope::RecursiveProperties,
            PropertyFilter::only(&[props::NUM_CHANNELS]),
            DeliveryMode::Synchronous,
            self.callback(|c, event| {
                if let Some((tree, _)) = event.property_change() {
                    c.num_channels_changed(tree);
                }
            }),
        );
        let mut listeners = self.listeners.lock();
        listeners.extend([on_nodes, on_parameters, on_channels]);
        if self.kind == ContainerKind::Chain {
            listeners.push(self.base.tree().add_listener(
                ListenerScope::Properties,
                PropertyFilter::only(&[props::BYPASS_RAMP_TIME_MS]),
                DeliveryMode::Synchronous,
                self.callback(|c, _| c.bypass_ramp_time_changed()),
            ));
        }
    }

    fn callback(
        self: &Arc<Self>,
        f: impl Fn(&NodeContainer, &crate::tree::TreeEvent) + Send + Sync + 'static,
    ) -> impl Fn(&crate::tree::TreeEvent) + Send + Sync + 'static {
        let weak = Arc::downgrade(self);
        move |event| {
            if let Some(container) = weak.upgrade() {
                f(&container, event);
            }
        }
    }

    /// Processing strategy.
    pub fn kind(&self) -> ContainerKind {
        self.kind
    }

    /// The `Nodes` child entity.
    pub fn nodes_tree(&self) -> &ValueTree {
        &self.nodes_tree
    }

    /// Snapshot of the direct children.
    pub fn nodes(&self) -> Vec<NodeRef> {
        self.nodes.read().clone()
    }

    /// Number of direct children.
    pub fn num_nodes(&self) -> usize {
        self.nodes.read().len()
    }

    /// Direct child at `index`.
    pub fn node(&self, index: usize) -> Option<NodeRef> {
        self.nodes.read().get(index).cloned()
    }

    /// Every descendant node, depth first, parents before children.
    pub fn child_nodes_recursive(&self) -> Vec<NodeRef> {
        let mut out = Vec::new();
        for node in self.nodes() {
            let nested = node.as_container().map(NodeContainer::child_nodes_recursive);
            out.push(node);
            out.extend(nested.unwrap_or_default());
        }
        out
    }

    /// Moves `node`'s tree entity into this container at `index`, or removes
    /// the child entity at `index` when `node` is `None`.
    ///
    /// The entity is detached from its previous parent first, so the same
    /// node instance ends up here.
    pub fn assign(&self, index: usize, node: Option<NodeRef>) -> Result<(), TreeError> {
        let network = self.base.network().upgrade();
        let _lock = network.as_ref().map(|n| n.lock());

        match node {
            Some(node) => {
                let tree = node.tree().clone();
                if let Some(parent) = tree.parent() {
                    parent.remove_child(&tree);
                }
                self.nodes_tree.add_child(tree, Some(index))?;
            }
            None => {
                let len = self.nodes_tree.num_children();
                if self.nodes_tree.remove_child_at(index).is_none() {
                    return Err(TreeError::IndexOutOfRange { index, len });
                }
            }
        }
        Ok(())
    }

    /// Macro parameters in tree order.
    pub fn macro_parameters(&self) -> Vec<Arc<MacroParameter>> {
        self.macros.lock().clone()
    }

    /// Macro parameter with the given id.
    pub fn macro_parameter(&self, id: &str) -> Option<Arc<MacroParameter>> {
        self.macros.lock().iter().find(|m| m.id() == id).cloned()
    }

    /// Adds a `Parameter` entity and returns the macro built for it.
    pub fn add_macro_parameter(&self, id: &str, range: ParameterRange) -> Option<Arc<MacroParameter>> {
        let tree = Parameter::create_tree(id, range, range.min);
        self.parameter_tree.add_child(tree.clone(), None).ok()?;
        self.macros.lock().iter().find(|m| m.tree() == &tree).cloned()
    }

    /// Connections driven by a modulation chain's output.
    pub fn modulation_targets(&self) -> Option<&Arc<MacroParameter>> {
        self.modulation_targets.as_ref()
    }

    /// Spec of the last `prepare`, if any.
    pub fn prepared_spec(&self) -> Option<PrepareSpec> {
        *self.prepared.lock()
    }

    fn is_prepared(&self) -> bool {
        self.prepared.lock().is_some()
    }

    fn bypass_ramp_time_changed(&self) {
        let ramp_ms = self
            .base
            .tree()
            .property_f64(props::BYPASS_RAMP_TIME_MS, DEFAULT_BYPASS_RAMP_MS);
        if let KindState::Chain(handler) = &mut *self.state.lock() {
            handler.set_ramp_ms(ramp_ms);
        }
    }

    /// Rebuilds every macro and modulation callback of this container.
    pub fn refresh_connections(&self) {
        for m in self.macro_parameters() {
            m.rebuild();
        }
        if let Some(targets) = &self.modulation_targets {
            targets.rebuild();
        }
    }

    /// Re-derives the channel layout and re-prepares if prepared before.
    ///
    /// `cause` is the tree of the child whose count changed; that child keeps
    /// its count. Calls made while a layout pass is running are ignored.
    pub fn update_channels(&self, cause: Option<&ValueTree>) {
        let Some(_guard) = ScopedFlag::try_set(&self.updating_channels) else {
            return;
        };
        let network = self.base.network().upgrade();
        let _lock = network.as_ref().map(|n| n.lock());

        self.channel_layout_changed(cause);

        if let Some(spec) = self.prepared_spec() {
            self.prepare(spec.with_channels(self.base.num_channels()));
        }
    }

    fn channel_layout_changed(&self, cause: Option<&ValueTree>) {
        let nodes = self.nodes();
        if nodes.is_empty() {
            return;
        }
        let requests: Vec<ChildChannels> = nodes
            .iter()
            .map(|n| ChildChannels {
                current: n.base().num_channels(),
                fixed: n.has_fixed_channel_amount(),
                is_cause: cause.is_some_and(|c| n.tree() == c),
                processes: n
                    .as_container()
                    .is_some_and(|c| c.kind() == ContainerKind::ModulationChain)
                    .then_some(1),
            })
            .collect();

        let available = self.base.num_channels();
        let counts = match self.kind {
            ContainerKind::Chain | ContainerKind::Split => layout::uniform(available, &requests),
            ContainerKind::MultiChannel => layout::multi_channel(available, &requests),
            ContainerKind::ModulationChain => layout::uniform(1, &requests),
        };

        #[cfg(feature = "tracing")]
        tracing::debug!(container = self.base.id(), ?counts, "channel layout recomputed");

        for ((node, request), count) in nodes.iter().zip(&requests).zip(counts) {
            if !request.fixed && !request.is_cause && count != request.current {
                node.set_num_channels(count);
            }
        }
    }

    fn num_channels_changed(&self, tree: &ValueTree) {
        if tree == self.base.tree() {
            self.update_channels(None);
        } else if tree.parent().as_ref() == Some(&self.nodes_tree) {
            self.update_channels(Some(tree));
        }
    }

    fn node_added_or_removed(&self, child: &ValueTree, was_added: bool) {
        let Some(network) = self.base.network().upgrade() else {
            return;
        };
        let _lock = network.lock();

        if was_added {
            let Some(node) = network.node_for_tree(child) else {
                return;
            };
            {
                let mut nodes = self.nodes.write();
                if nodes.iter().any(|n| n.tree() == child) {
                    return;
                }
                let index = self.nodes_tree.index_of(child).unwrap_or(usize::MAX);
                let position = nodes
                    .iter()
                    .filter(|n| self.nodes_tree.index_of(n.tree()).is_some_and(|i| i < index))
                    .count();
                nodes.insert(position, node);
            }
            network.refresh_connections_if_built();
        } else {
            let removed: Vec<NodeRef> = {
                let mut nodes = self.nodes.write();
                let (gone, kept): (Vec<NodeRef>, Vec<NodeRef>) =
                    nodes.drain(..).partition(|n| n.tree() == child);
                *nodes = kept;
                gone
            };
            drop(removed);
        }

        self.update_channels(None);
    }

    fn parameter_added_or_removed(&self, child: &ValueTree, was_added: bool) {
        if was_added {
            if self.macros.lock().iter().any(|m| m.tree() == child) {
                return;
            }
            let parameter = Parameter::new(child.clone());
            let m = MacroParameter::new(Arc::clone(&parameter), self.base.network().clone());
            self.base.add_parameter(parameter);
            self.macros.lock().push(m);
        } else {
            let removed = {
                let mut macros = self.macros.lock();
                macros
                    .iter()
                    .position(|m| m.tree() == child)
                    .map(|i| macros.remove(i))
            };
            self.base.remove_parameter(child);
            drop(removed);
        }
    }

    fn send_modulation(&self, value: f32) {
        let value = f64::from(value);
        self.modulation_value.store(value);
        if let Some(targets) = &self.modulation_targets {
            targets.parameter().set_value_without_store(value);
        }
    }
}

impl Node for NodeContainer {
    fn base(&self) -> &NodeBase {
        &self.base
    }

    fn prepare(&self, spec: PrepareSpec) {
        *self.prepared.lock() = Some(spec);
        let nodes = self.nodes();
        let channels = self.base.num_channels();

        let mut state = self.state.lock();
        match &mut *state {
            KindState::Modulation { counter, block } => {
                let control = PrepareSpec::new(
                    spec.sample_rate / EVENT_RASTER as f64,
                    (spec.block_size / EVENT_RASTER).max(1),
                    1,
                );
                for node in &nodes {
                    node.prepare(control);
                }
                block.clear();
                block.resize(control.block_size, 0.0);
                *counter = 0;
            }
            other => {
                for node in &nodes {
                    node.prepare(spec.with_channels(node.num_channels_to_process()));
                }
                match other {
                    KindState::Chain(handler) => handler.prepare(
                        spec.sample_rate,
                        channels * spec.block_size,
                        self.base
                            .tree()
                            .property_f64(props::BYPASS_RAMP_TIME_MS, DEFAULT_BYPASS_RAMP_MS),
                        self.base.is_bypassed(),
                    ),
                    KindState::Split(scratch) => {
                        scratch.clear();
                        scratch.resize(2 * channels * spec.block_size, 0.0);
                    }
                    KindState::MultiChannel | KindState::Modulation { .. } => {}
                }
            }
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(
            container = self.base.id(),
            sample_rate = spec.sample_rate,
            block_size = spec.block_size,
            channels,
            "container prepared"
        );
    }

    fn process(&self, data: &mut ProcessData<'_>) {
        if !self.is_prepared() {
            return;
        }
        let bypassed = self.base.is_bypassed();
        let nodes = self.nodes.read();
        let mut state = self.state.lock();
        match &mut *state {
            KindState::Chain(handler) => {
                handler.process(bypassed, data, |d| process::serial(&nodes, d));
            }
            _ if bypassed => {}
            KindState::Split(scratch) => process::split(&nodes, scratch, data),
            KindState::MultiChannel => process::multi(&nodes, data),
            KindState::Modulation { block, .. } => {
                let n = (data.num_samples() / EVENT_RASTER).min(block.len());
                let peak = process::modulation(&nodes, &mut block[..n]);
                drop(state);
                drop(nodes);
                self.send_modulation(peak);
            }
        }
    }

    fn process_single(&self, frame: &mut [f32]) {
        if !self.is_prepared() {
            return;
        }
        let bypassed = self.base.is_bypassed();
        let nodes = self.nodes.read();
        let mut state = self.state.lock();
        match &mut *state {
            KindState::Chain(handler) => {
                handler.process_frame(bypassed, frame, |f| process::serial_frame(&nodes, f));
            }
            _ if bypassed => {}
            KindState::Split(_) => process::split_frame(&nodes, frame),
            KindState::MultiChannel => process::multi_frame(&nodes, frame),
            KindState::Modulation { counter, .. } => {
                if *counter > 1 {
                    *counter -= 1;
                    return;
                }
                *counter = EVENT_RASTER;
                let value = process::modulation_frame(&nodes);
                drop(state);
                drop(nodes);
                self.send_modulation(value);
            }
        }
    }

    fn num_channels_to_process(&self) -> usize {
        match self.kind {
            ContainerKind::ModulationChain => 1,
            _ => self.base.num_channels(),
        }
    }

    fn handle_modulation(&self) -> Option<f64> {
        (self.kind == ContainerKind::ModulationChain).then(|| self.modulation_value.load())
    }

    fn as_container(&self) -> Option<&NodeContainer> {
        Some(self)
    }

    fn cpp_code(&self, location: CodeLocation) -> String {
        codegen::container_code(self, location)
    }
}

impl core::fmt::Debug for NodeContainer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("NodeContainer")
            .field("id", &self.base.id())
            .field("kind", &self.kind)
            .field("num_channels", &self.base.num_channels())
            .field("nodes", &self.num_nodes())
            .finish()
    }
}
