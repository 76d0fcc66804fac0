//! One routing from a macro parameter to a target parameter or bypass state.

use std::sync::{Arc, Weak};

use crate::ids::props;
use crate::network::NetworkHandle;
use crate::node::{Node, NodeRef};
use crate::parameter::{Parameter, ParameterCallback};
use crate::range::{Converter, OperatorType, ParameterRange};
use crate::tree::ValueTree;

/// Smallest and largest bypass multiplier.
pub const BYPASS_MULTIPLIER_RANGE: (f64, f64) = (1.0, 9000.0);

/// What a connection drives.
#[derive(Clone)]
pub enum ConnectionTarget {
    /// A parameter of the target node.
    Parameter(Weak<Parameter>),
    /// The target node's bypass flag.
    Bypass {
        /// Target node.
        node: Weak<dyn Node>,
        /// Factor applied to the normalised input before the range test.
        multiplier: f64,
    },
}

impl core::fmt::Debug for ConnectionTarget {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Parameter(p) => f
                .debug_tuple("Parameter")
                .field(&p.upgrade().map(|p| p.id().to_string()))
                .finish(),
            Self::Bypass { multiplier, .. } => f
                .debug_struct("Bypass")
                .field("multiplier", multiplier)
                .finish_non_exhaustive(),
        }
    }
}

/// A resolved `Connection` tree entity.
///
/// Targets are held weakly; once the target is gone the callback does nothing.
#[derive(Debug, Clone)]
pub struct Connection {
    tree: ValueTree,
    node_id: String,
    parameter_id: String,
    target: ConnectionTarget,
    range: ParameterRange,
    inverted: bool,
    converter: Option<Converter>,
    op: OperatorType,
}

impl Connection {
    /// Resolves `tree` against the network.
    ///
    /// `source_range` is the range of the driving parameter; its upper bound
    /// sets the multiplier of bypass connections. Returns `None` when the
    /// target node or parameter cannot be found.
    pub fn from_tree(
        tree: &ValueTree,
        network: &NetworkHandle,
        source_range: ParameterRange,
    ) -> Option<Self> {
        let node_id = tree.property_string(props::NODE_ID);
        let parameter_id = tree.property_string(props::PARAMETER_ID);
        let node: NodeRef = network.get(&node_id)?;

        let target = if parameter_id == props::BYPASSED {
            let (lo, hi) = BYPASS_MULTIPLIER_RANGE;
            ConnectionTarget::Bypass {
                node: Arc::downgrade(&node),
                multiplier: source_range.max.clamp(lo, hi),
            }
        } else {
            ConnectionTarget::Parameter(Arc::downgrade(&node.parameter(&parameter_id)?))
        };

        Some(Self {
            tree: tree.clone(),
            node_id,
            parameter_id,
            target,
            range: ParameterRange::from_tree(tree),
            inverted: tree.property_bool(props::INVERTED),
            converter: tree
                .property(props::CONVERTER)
                .and_then(|v| v.as_str().and_then(|s| s.parse().ok())),
            op: tree
                .property(props::OP_TYPE)
                .and_then(|v| v.as_str().and_then(|s| s.parse().ok()))
                .unwrap_or_default(),
        })
    }

    /// Creates a detached `Connection` entity.
    pub fn create_tree(node_id: &str, parameter_id: &str, range: ParameterRange) -> ValueTree {
        let tree = ValueTree::new(crate::ids::types::CONNECTION)
            .with_property(props::NODE_ID, node_id)
            .with_property(props::PARAMETER_ID, parameter_id);
        range.store(&tree);
        tree
    }

    /// Backing tree entity.
    pub fn tree(&self) -> &ValueTree {
        &self.tree
    }

    /// Target node id.
    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    /// Target parameter id, or `Bypassed`.
    pub fn parameter_id(&self) -> &str {
        &self.parameter_id
    }

    /// Resolved target.
    pub fn target(&self) -> &ConnectionTarget {
        &self.target
    }

    /// True for bypass connections.
    pub fn is_bypass(&self) -> bool {
        matches!(self.target, ConnectionTarget::Bypass { .. })
    }

    /// Target range.
    pub fn range(&self) -> ParameterRange {
        self.range
    }

    /// Inversion flag.
    pub fn is_inverted(&self) -> bool {
        self.inverted
    }

    /// Converter applied after range mapping.
    pub fn converter(&self) -> Option<Converter> {
        self.converter
    }

    /// Combination operator.
    pub fn op_type(&self) -> OperatorType {
        self.op
    }

    /// True while the target is alive.
    pub fn is_valid(&self) -> bool {
        match &self.target {
            ConnectionTarget::Parameter(p) => p.strong_count() > 0,
            ConnectionTarget::Bypass { node, .. } => node.strong_count() > 0,
        }
    }

    /// Maps a normalised input into the target domain: inversion, then
    /// range, then converter.
    pub fn map_normalised(&self, input: f64) -> f64 {
        map_into(self.range, self.inverted, self.converter, input)
    }

    /// Builds the closure applying a normalised input to the target.
    pub fn create_callback(&self) -> ParameterCallback {
        let range = self.range;
        let inverted = self.inverted;
        match &self.target {
            ConnectionTarget::Bypass { node, multiplier } => {
                let node = node.clone();
                let m = *multiplier;
                Box::new(move |input| {
                    if let Some(node) = node.upgrade() {
                        let inside = range.contains(input * m);
                        node.set_bypassed(inside != inverted);
                    }
                })
            }
            ConnectionTarget::Parameter(parameter) => {
                let parameter = parameter.clone();
                let converter = self.converter;
                let op = self.op;
                Box::new(move |input| {
                    let Some(p) = parameter.upgrade() else {
                        return;
                    };
                    let value = map_into(range, inverted, converter, input);
                    match op {
                        OperatorType::SetValue => p.set_value_and_store_async(value),
                        OperatorType::Add => p.add_modulation_value(value),
                        OperatorType::Multiply => p.multiply_modulation_value(value),
                    }
                })
            }
        }
    }
}

#[inline]
fn map_into(
    range: ParameterRange,
    inverted: bool,
    converter: Option<Converter>,
    input: f64,
) -> f64 {
    let normalised = if inverted { 1.0 - input } else { input };
    let value = range.from_normalised(normalised);
    converter.map_or(value, |c| c.apply(value))
}
