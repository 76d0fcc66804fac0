//! Leaf nodes: a [`Processor`] wrapped as a [`Node`].
//!
//! A processor is plain single-threaded DSP code. [`LeafNode`] gives it a tree
//! binding and one [`Parameter`] per declared [`ParamSpec`]. Parameter
//! callbacks only store the new value in an atomic slot; the processor picks
//! changed values up at the start of the next `prepare`, `process`, or
//! `process_single`, so connections never lock the processor.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::buffer::ProcessData;
use crate::ids::props;
use crate::network::NetworkHandle;
use crate::node::{Node, NodeBase, PrepareSpec};
use crate::parameter::{AtomicF64, Parameter};
use crate::range::ParameterRange;
use crate::tree::ValueTree;

/// Declaration of one processor parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamSpec {
    /// Parameter id, unique within the processor.
    pub id: &'static str,
    /// Value range.
    pub range: ParameterRange,
    /// Initial value for a fresh tree.
    pub default: f64,
}

impl ParamSpec {
    /// A continuous linear parameter.
    pub const fn new(id: &'static str, min: f64, max: f64, default: f64) -> Self {
        Self {
            id,
            range: ParameterRange::new(min, max),
            default,
        }
    }

    /// Replaces the range.
    pub const fn with_range(mut self, range: ParameterRange) -> Self {
        self.range = range;
        self
    }
}

/// DSP kernel of a leaf node.
///
/// # Example
///
/// ```rust
/// use arbor_core::{ParamSpec, ProcessData, Processor};
///
/// struct Scale(f32);
///
/// impl Processor for Scale {
///     fn params(&self) -> &[ParamSpec] {
///         const PARAMS: [ParamSpec; 1] = [ParamSpec::new("Amount", 0.0, 2.0, 1.0)];
///         &PARAMS
///     }
///
///     fn set_param(&mut self, _index: usize, value: f64) {
///         self.0 = value as f32;
///     }
///
///     fn process(&mut self, data: &mut ProcessData<'_>) {
///         data.as_mut_slice().iter_mut().for_each(|s| *s *= self.0);
///     }
///
///     fn process_frame(&mut self, frame: &mut [f32]) {
///         frame.iter_mut().for_each(|s| *s *= self.0);
///     }
/// }
/// ```
pub trait Processor: Send {
    /// Declared parameters, in index order.
    fn params(&self) -> &[ParamSpec] {
        &[]
    }

    /// Applies an effective parameter value.
    fn set_param(&mut self, index: usize, value: f64) {
        let _ = (index, value);
    }

    /// Fixed channel requirement, if any.
    fn fixed_channels(&self) -> Option<usize> {
        None
    }

    /// Prepares for processing.
    fn prepare(&mut self, spec: PrepareSpec) {
        let _ = spec;
    }

    /// Clears internal state.
    fn reset(&mut self) {}

    /// Processes one block in place.
    fn process(&mut self, data: &mut ProcessData<'_>);

    /// Processes one frame in place.
    fn process_frame(&mut self, frame: &mut [f32]);
}

struct LeafState {
    processor: Box<dyn Processor>,
    applied: Vec<f64>,
}

impl LeafState {
    fn sync(&mut self, targets: &[AtomicF64]) {
        for (index, (target, applied)) in targets.iter().zip(&mut self.applied).enumerate() {
            let value = target.load();
            // NaN marks "never applied".
            if value != *applied {
                self.processor.set_param(index, value);
                *applied = value;
            }
        }
    }
}

/// A [`Processor`] bound to a tree entity.
pub struct LeafNode {
    base: NodeBase,
    targets: Arc<[AtomicF64]>,
    state: Mutex<LeafState>,
}

impl LeafNode {
    /// Binds `processor` to `tree`, creating missing parameter entities.
    pub fn new(tree: ValueTree, network: NetworkHandle, processor: Box<dyn Processor>) -> Arc<Self> {
        let base = NodeBase::new(tree, network, processor.fixed_channels());
        let parameter_tree = base.parameter_tree();

        let parameters: Vec<Arc<Parameter>> = processor
            .params()
            .iter()
            .map(|spec| {
                let existing = parameter_tree
                    .children()
                    .into_iter()
                    .find(|p| p.property_string(props::ID) == spec.id);
                if let Some(existing) = &existing {
                    spec.range.store_defaults(existing);
                }
                let ptree = existing.unwrap_or_else(|| {
                    let created = Parameter::create_tree(spec.id, spec.range, spec.default);
                    // Fresh entities always attach.
                    let _ = parameter_tree.add_child(created.clone(), None);
                    created
                });
                Parameter::new(ptree)
            })
            .collect();

        let targets: Arc<[AtomicF64]> = parameters
            .iter()
            .map(|p| AtomicF64::new(p.modulated_value()))
            .collect::<Vec<_>>()
            .into();

        for (index, parameter) in parameters.into_iter().enumerate() {
            let slots = Arc::clone(&targets);
            parameter.set_callback(move |value| slots[index].store(value));
            base.add_parameter(parameter);
        }

        let applied = vec![f64::NAN; targets.len()];
        Arc::new(Self {
            base,
            targets,
            state: Mutex::new(LeafState { processor, applied }),
        })
    }

    /// Runs `f` with exclusive access to the processor.
    pub fn with_processor<R>(&self, f: impl FnOnce(&mut dyn Processor) -> R) -> R {
        let mut state = self.state.lock();
        f(state.processor.as_mut())
    }
}

impl Node for LeafNode {
    fn base(&self) -> &NodeBase {
        &self.base
    }

    fn prepare(&self, spec: PrepareSpec) {
        let mut state = self.state.lock();
        state.processor.prepare(spec);
        state.sync(&self.targets);
    }

    fn process(&self, data: &mut ProcessData<'_>) {
        if self.base.is_bypassed() {
            return;
        }
        let mut state = self.state.lock();
        state.sync(&self.targets);
        state.processor.process(data);
    }

    fn process_single(&self, frame: &mut [f32]) {
        if self.base.is_bypassed() {
            return;
        }
        let mut state = self.state.lock();
        state.sync(&self.targets);
        state.processor.process_frame(frame);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::node_tree;

    struct Offset {
        amount: f32,
    }

    impl Processor for Offset {
        fn params(&self) -> &[ParamSpec] {
            const PARAMS: [ParamSpec; 1] = [ParamSpec::new("Amount", -1.0, 1.0, 0.25)];
            &PARAMS
        }

        fn set_param(&mut self, _index: usize, value: f64) {
            self.amount = value as f32;
        }

        fn process(&mut self, data: &mut ProcessData<'_>) {
            data.as_mut_slice().iter_mut().for_each(|s| *s += self.amount);
        }

        fn process_frame(&mut self, frame: &mut [f32]) {
            frame.iter_mut().for_each(|s| *s += self.amount);
        }
    }

    fn offset_node(tree: ValueTree) -> Arc<LeafNode> {
        LeafNode::new(tree, NetworkHandle::default(), Box::new(Offset { amount: 0.0 }))
    }

    #[test]
    fn creates_parameter_entities_with_defaults() {
        let tree = node_tree("o", "test.offset");
        let node = offset_node(tree.clone());
        let ptree = tree.child_with_name("Parameters").unwrap();
        assert_eq!(ptree.num_children(), 1);
        assert_eq!(node.base().parameter("Amount").unwrap().value(), 0.25);
    }

    #[test]
    fn reuses_existing_parameter_values() {
        let tree = node_tree("o", "test.offset");
        offset_node(tree.clone());
        let ptree = tree.child_with_name("Parameters").unwrap();
        ptree.child(0).unwrap().set_property(props::VALUE, -0.5);

        let again = offset_node(tree.clone());
        assert_eq!(ptree.num_children(), 1);
        assert_eq!(again.base().parameter("Amount").unwrap().value(), -0.5);
    }

    #[test]
    fn partial_parameter_entities_get_the_declared_range() {
        let ptree = ValueTree::new("Parameter")
            .with_property(props::ID, "Amount")
            .with_property(props::VALUE, 0.75)
            .with_property(props::MAX_VALUE, 0.8);
        let tree = node_tree("o", "test.offset")
            .with_child(ValueTree::new("Parameters").with_child(ptree.clone()));
        let node = offset_node(tree);

        let p = node.base().parameter("Amount").unwrap();
        assert_eq!(p.value(), 0.75);
        assert_eq!(p.range(), ParameterRange::new(-1.0, 0.8));
    }

    #[test]
    fn parameter_changes_apply_on_next_block() {
        let node = offset_node(node_tree("o", "test.offset"));
        node.prepare(PrepareSpec::new(48000.0, 4, 1));

        let mut raw = [0.0f32; 4];
        node.process(&mut ProcessData::new(&mut raw, 1));
        assert_eq!(raw, [0.25; 4]);

        node.base().parameter("Amount").unwrap().set_value(0.5);
        let mut frame = [0.0f32];
        node.process_single(&mut frame);
        assert_eq!(frame, [0.5]);
    }

    #[test]
    fn bypassed_leaf_leaves_buffer_untouched() {
        let node = offset_node(node_tree("o", "test.offset"));
        node.set_bypassed(true);
        let mut raw = [0.1f32; 2];
        node.process(&mut ProcessData::new(&mut raw, 2));
        assert_eq!(raw, [0.1, 0.1]);
    }
}
