//! Entity type names and property names used in a network tree.
//!
//! A network tree looks like this:
//!
//! ```text
//! Network
//! └── Node            ID, FactoryPath, NumChannels, Bypassed, ...
//!     ├── Nodes
//!     │   └── Node    (children, same shape)
//!     ├── Parameters
//!     │   └── Parameter   ID, Value, MinValue, MaxValue, StepSize, SkewFactor
//!     │       └── Connections
//!     │           └── Connection  NodeId, ParameterId, MinValue, MaxValue,
//!     │                           Inverted, Converter, OpType
//!     └── ModulationTargets
//!         └── Connection
//! ```

/// Entity type names.
pub mod types {
    /// Top-level entity holding the root node.
    pub const NETWORK: &str = "Network";
    /// A processing node or container.
    pub const NODE: &str = "Node";
    /// Ordered processing children of a container.
    pub const NODES: &str = "Nodes";
    /// Parameter list of a node.
    pub const PARAMETERS: &str = "Parameters";
    /// A single parameter.
    pub const PARAMETER: &str = "Parameter";
    /// Connection list of a macro parameter.
    pub const CONNECTIONS: &str = "Connections";
    /// A single connection.
    pub const CONNECTION: &str = "Connection";
    /// Targets driven by a modulation source.
    pub const MODULATION_TARGETS: &str = "ModulationTargets";
}

/// Property names.
pub mod props {
    /// Node or parameter id.
    pub const ID: &str = "ID";
    /// Factory path the node was created from.
    pub const FACTORY_PATH: &str = "FactoryPath";
    /// Channel count of a node.
    pub const NUM_CHANNELS: &str = "NumChannels";
    /// Bypass flag of a node.
    pub const BYPASSED: &str = "Bypassed";
    /// Bypass crossfade length of a chain, in milliseconds.
    pub const BYPASS_RAMP_TIME_MS: &str = "BypassRampTimeMs";
    /// Parameter value.
    pub const VALUE: &str = "Value";
    /// Range lower bound.
    pub const MIN_VALUE: &str = "MinValue";
    /// Range upper bound.
    pub const MAX_VALUE: &str = "MaxValue";
    /// Range step (0 = continuous).
    pub const STEP_SIZE: &str = "StepSize";
    /// Range skew (1 = linear).
    pub const SKEW_FACTOR: &str = "SkewFactor";
    /// Target node id of a connection.
    pub const NODE_ID: &str = "NodeId";
    /// Target parameter id of a connection, or [`BYPASSED`].
    pub const PARAMETER_ID: &str = "ParameterId";
    /// Inversion flag of a connection.
    pub const INVERTED: &str = "Inverted";
    /// Converter id of a connection.
    pub const CONVERTER: &str = "Converter";
    /// Operator id of a connection.
    pub const OP_TYPE: &str = "OpType";
}
