//! Integration tests for arbor-core networks.
//!
//! Builds small networks from a factory of test processors and checks the
//! behaviour that spans modules: tree-driven node tracking, channel layout,
//! container processing, macro parameter routing, modulation chains, and the
//! exported class text.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use arbor_core::ids::{props, types};
use arbor_core::{
    AudioBuffer, Connection, GraphError, Network, Node, NodeContainer, NodeFactory, NodeRef,
    ParamSpec, Parameter, ParameterRange, ProcessData, Processor, TreeError, ValueTree, node_tree,
};

// ---------------------------------------------------------------------------
// Test processors
// ---------------------------------------------------------------------------

struct Pass;

impl Processor for Pass {
    fn process(&mut self, _data: &mut ProcessData<'_>) {}

    fn process_frame(&mut self, _frame: &mut [f32]) {}
}

/// Multiplies by `Amount`.
struct Scale(f32);

const SCALE_PARAMS: [ParamSpec; 1] = [ParamSpec::new("Amount", 0.0, 2.0, 1.0)];

impl Processor for Scale {
    fn params(&self) -> &[ParamSpec] {
        &SCALE_PARAMS
    }

    fn set_param(&mut self, _index: usize, value: f64) {
        self.0 = value as f32;
    }

    fn process(&mut self, data: &mut ProcessData<'_>) {
        data.as_mut_slice().iter_mut().for_each(|s| *s *= self.0);
    }

    fn process_frame(&mut self, frame: &mut [f32]) {
        frame.iter_mut().for_each(|s| *s *= self.0);
    }
}

/// Overwrites the signal with `Level`.
struct Constant(f32);

const CONSTANT_PARAMS: [ParamSpec; 1] = [ParamSpec::new("Level", 0.0, 1.0, 0.5)];

impl Processor for Constant {
    fn params(&self) -> &[ParamSpec] {
        &CONSTANT_PARAMS
    }

    fn set_param(&mut self, _index: usize, value: f64) {
        self.0 = value as f32;
    }

    fn process(&mut self, data: &mut ProcessData<'_>) {
        data.as_mut_slice().fill(self.0);
    }

    fn process_frame(&mut self, frame: &mut [f32]) {
        frame.fill(self.0);
    }
}

/// Always two channels.
struct Stereo;

impl Processor for Stereo {
    fn fixed_channels(&self) -> Option<usize> {
        Some(2)
    }

    fn process(&mut self, _data: &mut ProcessData<'_>) {}

    fn process_frame(&mut self, _frame: &mut [f32]) {}
}

/// Counts processed frames.
struct FrameCounter(Arc<AtomicUsize>);

impl Processor for FrameCounter {
    fn process(&mut self, _data: &mut ProcessData<'_>) {}

    fn process_frame(&mut self, _frame: &mut [f32]) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }
}

fn factory() -> NodeFactory {
    let mut factory = NodeFactory::new();
    factory.register_processor("test.pass", "does nothing", || Pass);
    factory.register_processor("test.scale", "multiplies by Amount", || Scale(1.0));
    factory.register_processor("test.constant", "writes Level", || Constant(0.5));
    factory.register_processor("test.stereo", "fixed stereo", || Stereo);
    factory
}

fn network(root_path: &str) -> Network {
    Network::with_root("root", root_path, factory()).unwrap()
}

fn add(network: &Network, container: &NodeContainer, id: &str, path: &str) -> NodeRef {
    let tree = network.create_node_tree(id, path);
    container.nodes_tree().add_child(tree.clone(), None).unwrap();
    network.node_for_tree(&tree).unwrap()
}

fn channels(node: &NodeRef) -> usize {
    node.base().num_channels()
}

fn process(network: &Network, value: f32, num_samples: usize) -> AudioBuffer {
    let mut buffer = AudioBuffer::new(network.num_channels(), num_samples);
    buffer.fill(value);
    network.process(&mut buffer.as_process_data());
    buffer
}

fn assert_all(buffer: &AudioBuffer, expected: f32) {
    for c in 0..buffer.num_channels() {
        for (i, &s) in buffer.channel(c).iter().enumerate() {
            assert!(
                (s - expected).abs() < 1e-5,
                "channel {c} sample {i}: expected {expected}, got {s}"
            );
        }
    }
}

// ============================================================================
// 1. Building and validating networks
// ============================================================================

#[test]
fn with_root_builds_an_empty_container() {
    let net = network("container.chain");
    assert_eq!(net.root().base().id(), "root");
    assert_eq!(net.root().num_nodes(), 0);
    assert_eq!(net.num_channels(), 2);
    assert!(net.get("root").is_some());
}

#[test]
fn network_rejects_malformed_trees() {
    let err = Network::new(ValueTree::new("Patch"), factory()).unwrap_err();
    assert!(matches!(err, GraphError::InvalidTree(_)));

    let err = Network::new(ValueTree::new(types::NETWORK), factory()).unwrap_err();
    assert_eq!(err, GraphError::MissingRoot);

    let err = Network::with_root("root", "test.pass", factory()).unwrap_err();
    assert_eq!(err, GraphError::RootNotContainer("root".into()));

    let err = Network::with_root("root", "container.nope", factory()).unwrap_err();
    assert_eq!(err, GraphError::UnknownFactoryPath("container.nope".into()));
}

#[test]
fn network_rejects_duplicate_ids() {
    let root = node_tree("root", "container.chain").with_child(
        ValueTree::new(types::NODES)
            .with_child(node_tree("a", "test.pass"))
            .with_child(node_tree("a", "test.scale")),
    );
    let tree = ValueTree::new(types::NETWORK).with_child(root);
    assert_eq!(
        Network::new(tree, factory()).unwrap_err(),
        GraphError::DuplicateId("a".into())
    );
}

#[test]
fn network_builds_from_existing_tree() {
    let macro_tree = Parameter::create_tree("Macro", ParameterRange::IDENTITY, 0.0).with_child(
        ValueTree::new(types::CONNECTIONS).with_child(Connection::create_tree(
            "gain",
            "Amount",
            ParameterRange::new(0.0, 2.0),
        )),
    );
    let root = node_tree("root", "container.chain")
        .with_property(props::NUM_CHANNELS, 2)
        .with_child(ValueTree::new(types::NODES).with_child(node_tree("gain", "test.scale")))
        .with_child(ValueTree::new(types::PARAMETERS).with_child(macro_tree));
    let net = Network::new(ValueTree::new(types::NETWORK).with_child(root), factory()).unwrap();

    assert_eq!(net.root().num_nodes(), 1);
    let m = net.root().macro_parameter("Macro").unwrap();
    assert_eq!(m.connections().len(), 1);

    m.parameter().set_value(0.25);
    let gain = net.get("gain").unwrap();
    assert_eq!(gain.parameter("Amount").unwrap().value(), 0.5);
}

#[test]
fn create_node_tree_picks_unused_ids() {
    let net = network("container.chain");
    let tree = net.create_node_tree("root", "test.pass");
    assert_eq!(tree.property_string(props::ID), "root1");

    add(&net, net.root(), "gain", "test.scale");
    let tree = net.create_node_tree("gain", "test.scale");
    assert_eq!(tree.property_string(props::ID), "gain1");

    let container = net.create_node_tree("split", "container.split");
    assert!(container.child_with_name(types::NODES).is_some());
    assert!(container.child_with_name(types::PARAMETERS).is_some());
}

// ============================================================================
// 2. Node tracking
// ============================================================================

#[test]
fn node_tree_maps_to_one_node() {
    let net = network("container.chain");
    let gain = add(&net, net.root(), "gain", "test.scale");

    assert_eq!(net.root().num_nodes(), 1);
    assert!(Arc::ptr_eq(&gain, &net.root().node(0).unwrap()));
    assert!(Arc::ptr_eq(&gain, &net.node_for_tree(gain.tree()).unwrap()));
    assert!(Arc::ptr_eq(&gain, &net.get("gain").unwrap()));
    assert_eq!(net.nodes().len(), 2);
}

#[test]
fn removing_the_tree_drops_the_node() {
    let net = network("container.chain");
    let gain = add(&net, net.root(), "gain", "test.scale");
    let weak = Arc::downgrade(&gain);
    let tree = gain.tree().clone();
    drop(gain);

    assert!(net.root().nodes_tree().remove_child(&tree));
    assert_eq!(net.root().num_nodes(), 0);
    assert!(weak.upgrade().is_none());
    assert!(net.get("gain").is_none());
}

#[test]
fn child_order_follows_tree_order() {
    let net = network("container.chain");
    add(&net, net.root(), "b", "test.pass");
    let a = net.create_node_tree("a", "test.pass");
    net.root().nodes_tree().add_child(a, Some(0)).unwrap();

    let ids: Vec<String> = net.root().nodes().iter().map(|n| n.id().to_string()).collect();
    assert_eq!(ids, ["a", "b"]);
}

#[test]
fn unknown_factory_paths_are_skipped() {
    let net = network("container.chain");
    net.root()
        .nodes_tree()
        .add_child(node_tree("ghost", "nowhere.node"), None)
        .unwrap();
    assert_eq!(net.root().num_nodes(), 0);
    assert_eq!(net.root().nodes_tree().num_children(), 1);
}

#[test]
fn nested_containers_are_listed_recursively() {
    let net = network("container.chain");
    let split = add(&net, net.root(), "split", "container.split");
    let split = split.as_container().unwrap();
    add(&net, split, "a", "test.pass");
    add(&net, net.root(), "b", "test.pass");

    let ids: Vec<String> = net
        .root()
        .child_nodes_recursive()
        .iter()
        .map(|n| n.id().to_string())
        .collect();
    assert_eq!(ids, ["split", "a", "b"]);
}

#[test]
fn assign_moves_the_same_instance() {
    let net = network("container.chain");
    let split_node = add(&net, net.root(), "split", "container.split");
    let split = split_node.as_container().unwrap();
    let a = add(&net, net.root(), "a", "test.pass");

    split.assign(0, Some(Arc::clone(&a))).unwrap();
    assert_eq!(net.root().num_nodes(), 1);
    assert_eq!(split.num_nodes(), 1);
    assert!(Arc::ptr_eq(&a, &split.node(0).unwrap()));

    split.assign(0, None).unwrap();
    assert_eq!(split.num_nodes(), 0);
    assert_eq!(
        split.assign(3, None),
        Err(TreeError::IndexOutOfRange { index: 3, len: 0 })
    );
}

// ============================================================================
// 3. Channel layout
// ============================================================================

#[test]
fn chain_children_follow_the_container() {
    let net = network("container.chain");
    let a = add(&net, net.root(), "a", "test.pass");
    let b = add(&net, net.root(), "b", "test.pass");
    assert_eq!((channels(&a), channels(&b)), (2, 2));

    net.root().base().tree().set_property(props::NUM_CHANNELS, 4);
    assert_eq!((channels(&a), channels(&b)), (4, 4));
}

#[test]
fn chain_keeps_the_count_of_the_changed_child() {
    let net = network("container.chain");
    let a = add(&net, net.root(), "a", "test.pass");
    let b = add(&net, net.root(), "b", "test.pass");

    a.set_num_channels(1);
    assert_eq!(channels(&a), 1);
    assert_eq!(channels(&b), 2);
}

#[test]
fn multi_channel_divides_and_drops_the_remainder() {
    let net = network("container.multi");
    net.root().base().tree().set_property(props::NUM_CHANNELS, 4);
    let a = add(&net, net.root(), "a", "test.pass");
    assert_eq!(channels(&a), 4);

    let b = add(&net, net.root(), "b", "test.pass");
    assert_eq!((channels(&a), channels(&b)), (2, 2));

    let c = add(&net, net.root(), "c", "test.pass");
    assert_eq!((channels(&a), channels(&b), channels(&c)), (1, 1, 1));
}

#[test]
fn multi_channel_serves_fixed_children_first() {
    let net = network("container.multi");
    let stereo = add(&net, net.root(), "stereo", "test.stereo");
    let b = add(&net, net.root(), "b", "test.pass");
    assert_eq!(channels(&stereo), 2);
    assert_eq!(channels(&b), 0);

    // Fixed nodes ignore requests.
    stereo.set_num_channels(1);
    assert_eq!(channels(&stereo), 2);
}

#[test]
fn chain_gives_flexible_children_the_full_count_beside_fixed_ones() {
    let net = network("container.chain");
    let stereo = add(&net, net.root(), "stereo", "test.stereo");
    let b = add(&net, net.root(), "b", "test.pass");
    assert_eq!((channels(&stereo), channels(&b)), (2, 2));
}

#[test]
fn multi_channel_counts_what_a_modulation_chain_processes() {
    let net = network("container.multi");
    net.root().base().tree().set_property(props::NUM_CHANNELS, 4);
    let modc = add(&net, net.root(), "mod", "container.modchain");
    let b = add(&net, net.root(), "b", "test.pass");
    assert_eq!((channels(&modc), channels(&b)), (2, 2));

    // The chain keeps 3 but only processes one, leaving 3 in the pool.
    modc.set_num_channels(3);
    assert_eq!((channels(&modc), channels(&b)), (3, 2));
}

#[test]
fn multi_channel_keeps_the_count_of_the_changed_child() {
    let net = network("container.multi");
    let a = add(&net, net.root(), "a", "test.pass");
    let b = add(&net, net.root(), "b", "test.pass");
    assert_eq!((channels(&a), channels(&b)), (1, 1));

    a.set_num_channels(2);
    assert_eq!((channels(&a), channels(&b)), (2, 0));
}

#[test]
fn layout_reaches_nested_containers() {
    let net = network("container.chain");
    let split = add(&net, net.root(), "split", "container.split");
    let inner = add(&net, split.as_container().unwrap(), "inner", "test.pass");

    net.root().base().tree().set_property(props::NUM_CHANNELS, 6);
    assert_eq!(channels(&split), 6);
    assert_eq!(channels(&inner), 6);
}

#[test]
fn modulation_chain_children_are_mono() {
    let net = network("container.chain");
    let modc = add(&net, net.root(), "mod", "container.modchain");
    let lfo = add(&net, modc.as_container().unwrap(), "lfo", "test.constant");
    assert_eq!(channels(&lfo), 1);
    assert_eq!(modc.num_channels_to_process(), 1);
}

// ============================================================================
// 4. Processing
// ============================================================================

#[test]
fn chain_runs_children_in_order() {
    let net = network("container.chain");
    let gain = add(&net, net.root(), "gain", "test.scale");
    add(&net, net.root(), "level", "test.constant");
    gain.parameter("Amount").unwrap().set_value(2.0);

    net.prepare(44100.0, 16);
    // The constant overwrites whatever the gain produced.
    assert_all(&process(&net, 1.0, 16), 0.5);
}

#[test]
fn split_sums_branches_on_copies_of_the_input() {
    let net = network("container.chain");
    let split = add(&net, net.root(), "split", "container.split");
    let branches = split.as_container().unwrap();
    for id in ["a", "b", "c"] {
        add(&net, branches, id, "test.pass");
    }

    net.prepare(44100.0, 16);
    assert_all(&process(&net, 0.5, 16), 1.5);

    let gain = add(&net, branches, "gain", "test.scale");
    gain.parameter("Amount").unwrap().set_value(2.0);
    net.prepare(44100.0, 16);
    assert_all(&process(&net, 0.5, 16), 2.5);
}

#[test]
fn bypassed_split_leaves_the_block_unchanged() {
    let net = network("container.chain");
    let split = add(&net, net.root(), "split", "container.split");
    for id in ["a", "b"] {
        add(&net, split.as_container().unwrap(), id, "test.pass");
    }
    split.tree().set_property(props::BYPASSED, true);

    net.prepare(44100.0, 16);
    assert_all(&process(&net, 0.5, 16), 0.5);
}

#[test]
fn unprepared_split_does_nothing() {
    let net = network("container.chain");
    let split = add(&net, net.root(), "split", "container.split");
    for id in ["a", "b"] {
        add(&net, split.as_container().unwrap(), id, "test.pass");
    }

    let mut buffer = AudioBuffer::new(2, 8);
    buffer.fill(0.25);
    split.process(&mut buffer.as_process_data());
    assert_all(&buffer, 0.25);
}

#[test]
fn unprepared_containers_leave_the_block_alone() {
    for kind in ["container.chain", "container.multi"] {
        let net = network(kind);
        add(&net, net.root(), "level", "test.constant");

        assert_all(&process(&net, 0.25, 8), 0.25);

        let mut frame = [0.25f32, 0.25];
        net.process_single(&mut frame);
        assert_eq!(frame, [0.25, 0.25], "{kind}");
    }
}

#[test]
fn unprepared_modulation_chain_keeps_its_targets() {
    let net = network("container.chain");
    let modc = add(&net, net.root(), "mod", "container.modchain");
    add(&net, modc.as_container().unwrap(), "lfo", "test.constant");
    let gain = add(&net, net.root(), "gain", "test.scale");
    modc.as_container()
        .unwrap()
        .modulation_targets()
        .unwrap()
        .add_connection("gain", "Amount", ParameterRange::IDENTITY);

    let amount = gain.parameter("Amount").unwrap();
    amount.set_value(1.5);
    let mut buffer = AudioBuffer::new(1, 16);
    modc.process(&mut buffer.as_process_data());
    for _ in 0..16 {
        modc.process_single(&mut [0.0]);
    }
    assert_eq!(amount.value(), 1.5);
    assert_eq!(modc.handle_modulation(), Some(0.0));
}

#[test]
fn multi_channel_processes_disjoint_ranges() {
    let net = network("container.multi");
    let a = add(&net, net.root(), "a", "test.scale");
    add(&net, net.root(), "b", "test.constant");
    a.parameter("Amount").unwrap().set_value(2.0);

    net.prepare(44100.0, 8);
    let buffer = process(&net, 1.0, 8);
    assert!(buffer.channel(0).iter().all(|&s| s == 2.0));
    assert!(buffer.channel(1).iter().all(|&s| s == 0.5));
}

#[test]
fn chain_bypass_crossfades_to_dry() {
    let net = network("container.chain");
    let gain = add(&net, net.root(), "gain", "test.scale");
    gain.parameter("Amount").unwrap().set_value(2.0);
    net.root()
        .base()
        .tree()
        .set_property(props::BYPASS_RAMP_TIME_MS, 10.0);

    // 1 kHz: 10 ms == 10 samples.
    net.prepare(1000.0, 20);
    assert_all(&process(&net, 1.0, 20), 2.0);

    net.root().base().tree().set_property(props::BYPASSED, true);
    let buffer = process(&net, 1.0, 20);
    let ch = buffer.channel(0);
    assert!((ch[0] - 1.9).abs() < 1e-4, "first sample {}", ch[0]);
    assert!(ch[..10].windows(2).all(|w| w[1] <= w[0]));
    assert!(ch[9..].iter().all(|&s| (s - 1.0).abs() < 1e-4));
    assert_eq!(buffer.channel(0), buffer.channel(1));

    assert_all(&process(&net, 1.0, 20), 1.0);
}

#[test]
fn chain_bypass_crossfades_per_frame() {
    let net = network("container.chain");
    let gain = add(&net, net.root(), "gain", "test.scale");
    gain.parameter("Amount").unwrap().set_value(2.0);
    net.root()
        .base()
        .tree()
        .set_property(props::BYPASS_RAMP_TIME_MS, 4.0);

    net.prepare(1000.0, 4);
    let mut frame = [1.0f32, 1.0];
    net.process_single(&mut frame);
    assert_eq!(frame, [2.0, 2.0]);

    net.root().base().tree().set_property(props::BYPASSED, true);
    let mut out = Vec::new();
    for _ in 0..5 {
        let mut frame = [1.0f32, 1.0];
        net.process_single(&mut frame);
        out.push(frame[0]);
    }
    assert_eq!(out, [1.75, 1.5, 1.25, 1.0, 1.0]);
}

#[test]
fn bypass_ramp_time_follows_the_tree() {
    let net = network("container.chain");
    let gain = add(&net, net.root(), "gain", "test.scale");
    gain.parameter("Amount").unwrap().set_value(2.0);

    // 1 kHz: the default 20 ms would take 20 samples.
    net.prepare(1000.0, 4);
    net.root()
        .base()
        .tree()
        .set_property(props::BYPASS_RAMP_TIME_MS, 2.0);
    net.root().base().tree().set_property(props::BYPASSED, true);

    let buffer = process(&net, 1.0, 4);
    assert_eq!(buffer.channel(0), [1.5, 1.0, 1.0, 1.0]);
}

#[test]
fn process_single_matches_block_processing() {
    let net = network("container.chain");
    let split = add(&net, net.root(), "split", "container.split");
    let branches = split.as_container().unwrap();
    add(&net, branches, "a", "test.pass");
    let gain = add(&net, branches, "gain", "test.scale");
    gain.parameter("Amount").unwrap().set_value(0.5);

    net.prepare(44100.0, 4);
    let mut frame = [1.0f32, 2.0];
    net.process_single(&mut frame);
    assert_eq!(frame, [1.5, 3.0]);
}

// ============================================================================
// 5. Macro parameters and connections
// ============================================================================

#[test]
fn macro_maps_through_input_and_target_ranges() {
    let net = network("container.chain");
    let gain = add(&net, net.root(), "gain", "test.scale");
    let m = net
        .root()
        .add_macro_parameter("Macro", ParameterRange::new(0.0, 10.0))
        .unwrap();
    m.add_connection("gain", "Amount", ParameterRange::new(0.0, 2.0));

    m.parameter().set_value(2.5);
    assert_eq!(gain.parameter("Amount").unwrap().value(), 0.5);

    net.prepare(44100.0, 8);
    assert_all(&process(&net, 1.0, 8), 0.5);
}

#[test]
fn routed_values_reach_the_tree_on_flush() {
    let net = network("container.chain");
    let gain = add(&net, net.root(), "gain", "test.scale");
    let m = net
        .root()
        .add_macro_parameter("Macro", ParameterRange::IDENTITY)
        .unwrap();
    m.add_connection("gain", "Amount", ParameterRange::new(0.0, 2.0));

    m.parameter().set_value(0.75);
    let amount = gain.parameter("Amount").unwrap();
    assert_eq!(amount.value(), 1.5);
    assert_eq!(amount.tree().property_f64(props::VALUE, 0.0), 1.0);

    assert_eq!(net.flush_pending_values(), 1);
    assert_eq!(amount.tree().property_f64(props::VALUE, 0.0), 1.5);
    assert_eq!(net.flush_pending_values(), 0);
}

#[test]
fn rebuilding_twice_routes_the_same_way() {
    let net = network("container.chain");
    let gain = add(&net, net.root(), "gain", "test.scale");
    let m = net
        .root()
        .add_macro_parameter("Macro", ParameterRange::IDENTITY)
        .unwrap();
    m.add_connection("gain", "Amount", ParameterRange::new(0.0, 2.0));

    m.parameter().set_value(0.3);
    let first = gain.parameter("Amount").unwrap().value();
    net.refresh_connections();
    net.refresh_connections();
    m.parameter().set_value(0.3);
    assert_eq!(gain.parameter("Amount").unwrap().value(), first);
    assert_eq!(m.connections().len(), 1);
}

#[test]
fn additive_and_multiplicative_connections_modulate() {
    let net = network("container.chain");
    let gain = add(&net, net.root(), "gain", "test.scale");
    let m = net
        .root()
        .add_macro_parameter("Macro", ParameterRange::IDENTITY)
        .unwrap();
    let c = m.add_connection("gain", "Amount", ParameterRange::IDENTITY);
    c.set_property(props::OP_TYPE, "Add");

    m.parameter().set_value(0.25);
    let amount = gain.parameter("Amount").unwrap();
    assert_eq!(amount.value(), 1.0);
    assert_eq!(amount.modulated_value(), 1.25);

    c.set_property(props::OP_TYPE, "Multiply");
    m.parameter().set_value(0.5);
    assert_eq!(amount.modulated_value(), (1.0 + 0.25) * 0.5);
}

#[test]
fn converters_apply_after_the_range() {
    let net = network("container.chain");
    let gain = add(&net, net.root(), "gain", "test.scale");
    let m = net
        .root()
        .add_macro_parameter("Macro", ParameterRange::IDENTITY)
        .unwrap();
    let c = m.add_connection("gain", "Amount", ParameterRange::new(-60.0, 0.0));
    c.set_property(props::CONVERTER, "db2gain");

    let amount = gain.parameter("Amount").unwrap();
    m.parameter().set_value(1.0);
    assert!((amount.value() - 1.0).abs() < 1e-9);
    m.parameter().set_value(0.5);
    assert!((amount.value() - 0.031_622_776).abs() < 1e-6);
}

#[test]
fn bypass_connection_polarity() {
    let net = network("container.chain");
    let gain = add(&net, net.root(), "gain", "test.scale");
    let m = net
        .root()
        .add_macro_parameter("Switch", ParameterRange::IDENTITY)
        .unwrap();
    let c = m.add_connection("gain", "Bypassed", ParameterRange::new(0.5, 1.0));
    assert!(m.connections()[0].is_bypass());

    m.parameter().set_value(0.75);
    assert!(gain.is_bypassed());
    m.parameter().set_value(0.25);
    assert!(!gain.is_bypassed());
    m.parameter().set_value(0.5);
    assert!(gain.is_bypassed());

    c.set_property(props::INVERTED, true);
    m.parameter().set_value(0.75);
    assert!(!gain.is_bypassed());
    m.parameter().set_value(0.25);
    assert!(gain.is_bypassed());
}

#[test]
fn reversed_connection_range_is_stored_inverted() {
    let net = network("container.chain");
    let gain = add(&net, net.root(), "gain", "test.scale");
    let m = net
        .root()
        .add_macro_parameter("Macro", ParameterRange::IDENTITY)
        .unwrap();
    let c = m.add_connection("gain", "Amount", ParameterRange::new(0.0, 2.0));

    c.set_property(props::MIN_VALUE, 3.0);
    assert_eq!(c.property_f64(props::MIN_VALUE, 0.0), 2.0);
    assert_eq!(c.property_f64(props::MAX_VALUE, 0.0), 3.0);
    assert!(c.property_bool(props::INVERTED));

    m.parameter().set_value(0.0);
    assert_eq!(gain.parameter("Amount").unwrap().value(), 3.0);
}

#[test]
fn unresolved_connections_are_dropped_until_the_target_exists() {
    let net = network("container.chain");
    let m = net
        .root()
        .add_macro_parameter("Macro", ParameterRange::IDENTITY)
        .unwrap();
    m.add_connection("later", "Amount", ParameterRange::IDENTITY);
    m.add_connection("gain", "NoSuchParameter", ParameterRange::IDENTITY);
    assert!(m.connections().is_empty());
    assert!(!m.parameter().has_callback());
    m.parameter().set_value(0.5);

    add(&net, net.root(), "later", "test.scale");
    assert_eq!(m.connections().len(), 1);
    assert!(m.parameter().has_callback());
}

#[test]
fn removed_targets_leave_connections_inert() {
    let net = network("container.chain");
    let gain = add(&net, net.root(), "gain", "test.scale");
    let m = net
        .root()
        .add_macro_parameter("Macro", ParameterRange::IDENTITY)
        .unwrap();
    m.add_connection("gain", "Amount", ParameterRange::IDENTITY);
    m.add_connection("gain", "Bypassed", ParameterRange::IDENTITY);
    assert_eq!(m.connections().len(), 2);

    let tree = gain.tree().clone();
    drop(gain);
    net.root().nodes_tree().remove_child(&tree);

    // The callback still holds the dead targets.
    m.parameter().set_value(0.9);
    assert!(m.connections().iter().all(|c| !c.is_valid()));

    net.refresh_connections();
    assert!(m.connections().is_empty());
    assert!(!m.parameter().has_callback());
}

#[test]
fn removing_a_parameter_entity_drops_the_macro() {
    let net = network("container.chain");
    let m = net
        .root()
        .add_macro_parameter("Macro", ParameterRange::IDENTITY)
        .unwrap();
    assert_eq!(net.root().macro_parameters().len(), 1);
    assert!(net.root().base().parameter("Macro").is_some());

    let tree = m.tree().clone();
    net.root().base().parameter_tree().remove_child(&tree);
    assert!(net.root().macro_parameter("Macro").is_none());
    assert!(net.root().base().parameter("Macro").is_none());
}

// ============================================================================
// 6. Modulation chains
// ============================================================================

#[test]
fn modulation_chain_drives_its_targets_with_the_peak() {
    let net = network("container.chain");
    let modc = add(&net, net.root(), "mod", "container.modchain");
    add(&net, modc.as_container().unwrap(), "lfo", "test.constant");
    let gain = add(&net, net.root(), "gain", "test.scale");

    let targets = modc.as_container().unwrap().modulation_targets().unwrap();
    targets.add_connection("gain", "Amount", ParameterRange::IDENTITY);
    assert_eq!(targets.connections().len(), 1);

    net.prepare(44100.0, 64);
    let buffer = process(&net, 1.0, 64);

    assert_eq!(modc.handle_modulation(), Some(0.5));
    assert_eq!(gain.parameter("Amount").unwrap().value(), 0.5);
    assert_all(&buffer, 0.5);
    assert_eq!(net.flush_pending_values(), 1);
}

#[test]
fn modulation_chain_leaves_audio_alone() {
    let net = network("container.chain");
    let modc = add(&net, net.root(), "mod", "container.modchain");
    add(&net, modc.as_container().unwrap(), "lfo", "test.constant");

    net.prepare(44100.0, 32);
    assert_all(&process(&net, 0.8, 32), 0.8);
    assert_eq!(modc.handle_modulation(), Some(0.5));
}

#[test]
fn modulation_chain_computes_every_eighth_frame() {
    let count = Arc::new(AtomicUsize::new(0));
    let mut factory = factory();
    let counter = Arc::clone(&count);
    factory.register_processor("test.counter", "counts frames", move || {
        FrameCounter(Arc::clone(&counter))
    });
    let net = Network::with_root("root", "container.chain", factory).unwrap();
    let modc = add(&net, net.root(), "mod", "container.modchain");
    add(&net, modc.as_container().unwrap(), "count", "test.counter");

    net.prepare(44100.0, 64);
    for _ in 0..17 {
        net.process_single(&mut [0.0, 0.0]);
    }
    assert_eq!(count.load(Ordering::Relaxed), 3);
}

#[test]
fn non_modulation_containers_report_no_modulation() {
    let net = network("container.chain");
    assert!(net.root().handle_modulation().is_none());
    assert!(net.root().modulation_targets().is_none());
}

// ============================================================================
// 7. Export
// ============================================================================

#[test]
fn exported_class_lists_structure_and_parameters() {
    let net = network("container.chain");
    let split = add(&net, net.root(), "split", "container.split");
    add(&net, split.as_container().unwrap(), "gain", "test.scale");
    let m = net
        .root()
        .add_macro_parameter("Macro", ParameterRange::new(0.0, 10.0))
        .unwrap();
    m.add_connection("gain", "Amount", ParameterRange::new(0.0, 2.0));
    m.add_connection("gain", "Bypassed", ParameterRange::new(0.5, 1.0));

    let code = net.create_cpp_class("dsp");
    assert!(code.starts_with("namespace dsp_impl"));
    assert!(code.ends_with("using dsp = dsp_impl::instance;\n"));
    assert!(code.contains("using split_ = container::split<test::scale>;"));
    assert!(code.contains("using root_ = container::chain<split_>;"));
    assert!(code.contains("struct instance : public root_"));
    assert!(code.contains("initValues.add({ \"gain.Amount\", 1.0 });"));
    assert!(code.contains("ParameterData p(\"Macro\");"));
    assert!(code.contains("p.range = { 0.0, 10.0, 0.0 };"));
    assert!(code.contains("gain_Amount(normalised);"));
    assert!(code.contains("gain_Bypassed.setBypass(newValue);"));
    assert!(code.contains("auto& gain = get<0>(get<0>(obj)); // gain"));
}

#[test]
fn exported_class_includes_internal_modulation() {
    let net = network("container.chain");
    let modc = add(&net, net.root(), "mod", "container.modchain");
    add(&net, modc.as_container().unwrap(), "lfo", "test.constant");
    add(&net, net.root(), "gain", "test.scale");
    modc.as_container()
        .unwrap()
        .modulation_targets()
        .unwrap()
        .add_connection("gain", "Amount", ParameterRange::new(0.0, 2.0));

    let code = net.create_cpp_class("modulated");
    assert!(code.contains("auto gain_Amount = getParameter(\"gain.Amount\");"));
    assert!(code.contains("setInternalModulationParameter(get<0>(obj), f);"));
    assert!(code.contains("using mod_ = container::modchain<test::constant>;"));
}
