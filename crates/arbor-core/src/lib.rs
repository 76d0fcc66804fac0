//! Arbor Core - node containers for tree-described DSP networks
//!
//! A network is described by an observable tree of typed entities with named
//! properties. Nodes bind to tree entities and follow every edit: adding or
//! removing a `Node` entity creates or drops the node, editing `NumChannels`
//! re-derives the channel layout, editing a `Connection` rebuilds the macro
//! parameter that owns it.
//!
//! # Core Abstractions
//!
//! ## Topology Tree
//!
//! - [`ValueTree`] - Shared handle to a tree entity with change notification
//! - [`ListenerScope`], [`PropertyFilter`], [`DeliveryMode`] - Listener configuration
//!
//! ## Nodes
//!
//! - [`Node`] - Object-safe trait for every node
//! - [`NodeBase`] - Shared state: id, tree binding, channel count, bypass, parameters
//! - [`Processor`] / [`LeafNode`] - DSP kernels bound to the tree
//! - [`NodeContainer`] - Chain, Split, MultiChannel and ModulationChain containers
//!
//! ## Parameters
//!
//! - [`Parameter`] - Value with modulation terms and a swappable callback
//! - [`MacroParameter`] - Container parameter fanning out to [`Connection`]s
//! - [`ParameterRange`], [`Converter`], [`OperatorType`] - Value mapping
//!
//! ## Networks
//!
//! - [`Network`] - Root container, node registry, factory, structural lock
//! - [`NodeFactory`] - Factory paths to node constructors
//!
//! # Threading
//!
//! Tree edits, layout passes and connection rebuilds run on a control
//! context; `process` runs on an audio context. Both take the network's
//! re-entrant lock, so a block never observes a half-edited child list.
//! Parameter callbacks are swapped atomically and may fire from either side.
//!
//! # Example
//!
//! ```rust
//! use arbor_core::{AudioBuffer, Network, NodeFactory};
//!
//! let network = Network::with_root("root", "container.chain", NodeFactory::new()).unwrap();
//! let split = network.create_node_tree("split", "container.split");
//! network.root().nodes_tree().add_child(split, None).unwrap();
//!
//! network.prepare(44100.0, 64);
//! let mut buffer = AudioBuffer::new(network.num_channels(), 64);
//! buffer.fill(0.5);
//! network.process(&mut buffer.as_process_data());
//! ```
//!
//! # Features
//!
//! - `tracing`: structured log events for node creation, layout passes,
//!   connection rebuilds and prepare calls.

pub mod buffer;
pub mod codegen;
pub mod connection;
pub mod container;
pub mod error;
pub mod factory;
pub mod ids;
pub mod leaf;
pub mod macro_param;
pub mod math;
pub mod network;
pub mod node;
pub mod parameter;
pub mod range;
pub mod smoothing;
pub mod tree;

pub use buffer::{AudioBuffer, ProcessData};
pub use codegen::{CodeLocation, Emitter};
pub use connection::{BYPASS_MULTIPLIER_RANGE, Connection, ConnectionTarget};
pub use container::{
    ContainerKind, DEFAULT_BYPASS_RAMP_MS, EVENT_RASTER, MODULATION_OUTPUT_ID, NodeContainer,
};
pub use error::{GraphError, TreeError};
pub use factory::{FactoryEntry, NodeConstructor, NodeFactory};
pub use leaf::{LeafNode, ParamSpec, Processor};
pub use macro_param::MacroParameter;
pub use math::{db_to_gain, db_to_linear, freq_to_ms, gain_to_db, ms_to_freq, wet_dry_mix};
pub use network::{Network, NetworkHandle};
pub use node::{DEFAULT_NUM_CHANNELS, Node, NodeBase, NodeRef, PrepareSpec, node_tree};
pub use parameter::{Parameter, ParameterCallback};
pub use range::{Converter, OperatorType, ParameterRange, UnknownId};
pub use smoothing::{LinearRamp, SmoothedValue};
pub use tree::{
    DeliveryMode, ListenerHandle, ListenerScope, PropertyFilter, TreeEvent, Value, ValueTree,
    WeakTree,
};
