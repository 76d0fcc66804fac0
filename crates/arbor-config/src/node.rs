//! Node, parameter and connection descriptions.

use arbor_core::ids::{props, types};
use arbor_core::{ParameterRange, ValueTree, node_tree};
use serde::{Deserialize, Serialize};

/// One node and, for containers, its children.
///
/// # TOML Format
///
/// ```toml
/// id = "lfo_gain"
/// type = "container.chain"
/// channels = 2
///
/// [[parameters]]
/// id = "Depth"
/// value = 0.5
///
/// [[parameters.connections]]
/// node = "gain"
/// parameter = "Gain"
/// min = -24.0
/// max = 0.0
///
/// [[nodes]]
/// id = "gain"
/// type = "core.gain"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NodeConfig {
    /// Node id, unique within the network.
    pub id: String,

    /// Factory path (e.g. "core.gain", "container.split").
    #[serde(rename = "type")]
    pub path: String,

    /// Channel count. Containers derive it for their children when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channels: Option<usize>,

    /// Whether the node is bypassed.
    #[serde(default, skip_serializing_if = "is_false")]
    pub bypassed: bool,

    /// Bypass crossfade length of a chain, in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bypass_ramp_ms: Option<f64>,

    /// Parameter values; on containers these are macro parameters.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<ParameterConfig>,

    /// Connections driven by a modulation chain's output.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub modulation_targets: Vec<ConnectionConfig>,

    /// Child nodes of a container, in processing order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nodes: Vec<NodeConfig>,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl NodeConfig {
    /// Create a node description.
    pub fn new(id: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            path: path.into(),
            channels: None,
            bypassed: false,
            bypass_ramp_ms: None,
            parameters: Vec::new(),
            modulation_targets: Vec::new(),
            nodes: Vec::new(),
        }
    }

    /// Set the channel count.
    pub fn with_channels(mut self, channels: usize) -> Self {
        self.channels = Some(channels);
        self
    }

    /// Set whether the node is bypassed.
    pub fn with_bypass(mut self, bypassed: bool) -> Self {
        self.bypassed = bypassed;
        self
    }

    /// Add a parameter.
    pub fn with_parameter(mut self, parameter: ParameterConfig) -> Self {
        self.parameters.push(parameter);
        self
    }

    /// Add a modulation target.
    pub fn with_modulation_target(mut self, connection: ConnectionConfig) -> Self {
        self.modulation_targets.push(connection);
        self
    }

    /// Append a child node.
    pub fn with_node(mut self, node: NodeConfig) -> Self {
        self.nodes.push(node);
        self
    }

    /// Parameter by id.
    pub fn parameter(&self, id: &str) -> Option<&ParameterConfig> {
        self.parameters.iter().find(|p| p.id == id)
    }

    /// This node followed by all descendants, depth first.
    pub fn walk(&self) -> Vec<&NodeConfig> {
        let mut out = Vec::new();
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            out.push(node);
            stack.extend(node.nodes.iter().rev());
        }
        out
    }

    /// Builds the `Node` entity.
    pub fn to_tree(&self) -> ValueTree {
        let mut tree = node_tree(&self.id, &self.path);
        if let Some(channels) = self.channels {
            tree = tree.with_property(props::NUM_CHANNELS, channels);
        }
        if self.bypassed {
            tree = tree.with_property(props::BYPASSED, true);
        }
        if let Some(ms) = self.bypass_ramp_ms {
            tree = tree.with_property(props::BYPASS_RAMP_TIME_MS, ms);
        }
        if !self.parameters.is_empty() {
            let list = self
                .parameters
                .iter()
                .fold(ValueTree::new(types::PARAMETERS), |list, p| {
                    list.with_child(p.to_tree())
                });
            tree = tree.with_child(list);
        }
        if !self.modulation_targets.is_empty() {
            tree = tree.with_child(connection_list(
                types::MODULATION_TARGETS,
                &self.modulation_targets,
            ));
        }
        if !self.nodes.is_empty() {
            let list = self
                .nodes
                .iter()
                .fold(ValueTree::new(types::NODES), |list, n| list.with_child(n.to_tree()));
            tree = tree.with_child(list);
        }
        tree
    }

    /// Reads a `Node` entity.
    ///
    /// Returns `None` for entities of another type.
    pub fn from_tree(tree: &ValueTree) -> Option<Self> {
        if !tree.has_type(types::NODE) {
            return None;
        }
        let mut config = Self::new(
            tree.property_string(props::ID),
            tree.property_string(props::FACTORY_PATH),
        );
        config.channels = tree
            .property(props::NUM_CHANNELS)
            .and_then(|v| v.as_i64())
            .map(|n| n.max(0) as usize);
        config.bypassed = tree.property_bool(props::BYPASSED);
        config.bypass_ramp_ms = tree.property(props::BYPASS_RAMP_TIME_MS).and_then(|v| v.as_f64());

        if let Some(list) = tree.child_with_name(types::PARAMETERS) {
            config.parameters = list
                .children()
                .iter()
                .filter_map(ParameterConfig::from_tree)
                .collect();
        }
        if let Some(list) = tree.child_with_name(types::MODULATION_TARGETS) {
            config.modulation_targets = connections_from(&list);
        }
        if let Some(list) = tree.child_with_name(types::NODES) {
            config.nodes = list.children().iter().filter_map(Self::from_tree).collect();
        }
        Some(config)
    }
}

/// A parameter value, with an optional range and outgoing connections.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParameterConfig {
    /// Parameter id.
    pub id: String,

    /// Base value.
    pub value: f64,

    /// Range lower bound. Leaf parameters fall back to their declared range.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,

    /// Range upper bound.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,

    /// Range step.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<f64>,

    /// Range skew.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skew: Option<f64>,

    /// Targets driven by this parameter, which makes it a macro parameter.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub connections: Vec<ConnectionConfig>,
}

impl ParameterConfig {
    /// A parameter with a value and no explicit range.
    pub fn new(id: impl Into<String>, value: f64) -> Self {
        Self {
            id: id.into(),
            value,
            min: None,
            max: None,
            step: None,
            skew: None,
            connections: Vec::new(),
        }
    }

    /// Set every range field.
    pub fn with_range(mut self, range: ParameterRange) -> Self {
        self.min = Some(range.min);
        self.max = Some(range.max);
        self.step = Some(range.step);
        self.skew = Some(range.skew);
        self
    }

    /// Add a connection.
    pub fn with_connection(mut self, connection: ConnectionConfig) -> Self {
        self.connections.push(connection);
        self
    }

    /// Range lower and upper bound, when both are given.
    pub fn bounds(&self) -> Option<(f64, f64)> {
        self.min.zip(self.max)
    }

    /// Builds the `Parameter` entity.
    pub fn to_tree(&self) -> ValueTree {
        let mut tree = ValueTree::new(types::PARAMETER)
            .with_property(props::ID, self.id.as_str())
            .with_property(props::VALUE, self.value);
        for (name, value) in [
            (props::MIN_VALUE, self.min),
            (props::MAX_VALUE, self.max),
            (props::STEP_SIZE, self.step),
            (props::SKEW_FACTOR, self.skew),
        ] {
            if let Some(value) = value {
                tree = tree.with_property(name, value);
            }
        }
        if !self.connections.is_empty() {
            tree = tree.with_child(connection_list(types::CONNECTIONS, &self.connections));
        }
        tree
    }

    /// Reads a `Parameter` entity.
    pub fn from_tree(tree: &ValueTree) -> Option<Self> {
        if !tree.has_type(types::PARAMETER) {
            return None;
        }
        let read = |name: &str| tree.property(name).and_then(|v| v.as_f64());
        Some(Self {
            id: tree.property_string(props::ID),
            value: tree.property_f64(props::VALUE, 0.0),
            min: read(props::MIN_VALUE),
            max: read(props::MAX_VALUE),
            step: read(props::STEP_SIZE),
            skew: read(props::SKEW_FACTOR),
            connections: tree
                .child_with_name(types::CONNECTIONS)
                .map(|list| connections_from(&list))
                .unwrap_or_default(),
        })
    }
}

/// A route from a parameter to a target node's parameter or bypass state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConnectionConfig {
    /// Target node id.
    pub node: String,

    /// Target parameter id, or "Bypassed".
    pub parameter: String,

    /// Target range lower bound.
    #[serde(default)]
    pub min: f64,

    /// Target range upper bound.
    #[serde(default = "default_max")]
    pub max: f64,

    /// Target range step.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<f64>,

    /// Target range skew.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skew: Option<f64>,

    /// Use `1 - x` of the normalised input.
    #[serde(default, skip_serializing_if = "is_false")]
    pub inverted: bool,

    /// Converter id ("db2gain", "gain2db", "1-x", "ms2freq", "freq2ms").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub converter: Option<String>,

    /// Operator id ("SetValue", "Add", "Multiply").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub op: Option<String>,
}

fn default_max() -> f64 {
    1.0
}

impl ConnectionConfig {
    /// A connection over the `[0, 1]` range.
    pub fn new(node: impl Into<String>, parameter: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            parameter: parameter.into(),
            min: 0.0,
            max: 1.0,
            step: None,
            skew: None,
            inverted: false,
            converter: None,
            op: None,
        }
    }

    /// Set the target range bounds.
    pub fn with_bounds(mut self, min: f64, max: f64) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    /// Set the inversion flag.
    pub fn with_inverted(mut self, inverted: bool) -> Self {
        self.inverted = inverted;
        self
    }

    /// Set the converter id.
    pub fn with_converter(mut self, converter: impl Into<String>) -> Self {
        self.converter = Some(converter.into());
        self
    }

    /// Set the operator id.
    pub fn with_op(mut self, op: impl Into<String>) -> Self {
        self.op = Some(op.into());
        self
    }

    /// Target range.
    pub fn range(&self) -> ParameterRange {
        let mut range = ParameterRange::new(self.min, self.max);
        if let Some(step) = self.step {
            range = range.with_step(step);
        }
        if let Some(skew) = self.skew {
            range = range.with_skew(skew);
        }
        range
    }

    /// Builds the `Connection` entity.
    pub fn to_tree(&self) -> ValueTree {
        let mut tree = arbor_core::Connection::create_tree(&self.node, &self.parameter, self.range());
        if self.inverted {
            tree = tree.with_property(props::INVERTED, true);
        }
        if let Some(converter) = &self.converter {
            tree = tree.with_property(props::CONVERTER, converter.as_str());
        }
        if let Some(op) = &self.op {
            tree = tree.with_property(props::OP_TYPE, op.as_str());
        }
        tree
    }

    /// Reads a `Connection` entity.
    pub fn from_tree(tree: &ValueTree) -> Option<Self> {
        if !tree.has_type(types::CONNECTION) {
            return None;
        }
        let range = ParameterRange::from_tree(tree);
        let text = |name: &str| {
            tree.property(name)
                .and_then(|v| v.as_str().map(str::to_string))
                .filter(|s| !s.is_empty())
        };
        Some(Self {
            node: tree.property_string(props::NODE_ID),
            parameter: tree.property_string(props::PARAMETER_ID),
            min: range.min,
            max: range.max,
            step: (range.step != 0.0).then_some(range.step),
            skew: (range.skew != 1.0).then_some(range.skew),
            inverted: tree.property_bool(props::INVERTED),
            converter: text(props::CONVERTER),
            op: text(props::OP_TYPE),
        })
    }
}

fn connection_list(type_name: &str, connections: &[ConnectionConfig]) -> ValueTree {
    connections
        .iter()
        .fold(ValueTree::new(type_name), |list, c| list.with_child(c.to_tree()))
}

fn connections_from(list: &ValueTree) -> Vec<ConnectionConfig> {
    list.children()
        .iter()
        .filter_map(ConnectionConfig::from_tree)
        .collect()
}
