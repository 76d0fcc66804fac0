//! Bundled processors inside networks built from the default factory.

use arbor_core::ids::props;
use arbor_core::{AudioBuffer, Network, Node, NodeContainer, NodeRef, ParameterRange};
use arbor_nodes::default_factory;

fn network(root_path: &str) -> Network {
    Network::with_root("root", root_path, default_factory()).unwrap()
}

fn add(network: &Network, container: &NodeContainer, id: &str, path: &str) -> NodeRef {
    let tree = network.create_node_tree(id, path);
    container.nodes_tree().add_child(tree.clone(), None).unwrap();
    network.node_for_tree(&tree).unwrap()
}

fn process(network: &Network, value: f32, num_samples: usize) -> AudioBuffer {
    let mut buffer = AudioBuffer::new(network.num_channels(), num_samples);
    buffer.fill(value);
    network.process(&mut buffer.as_process_data());
    buffer
}

fn assert_all(buffer: &AudioBuffer, expected: f32, tolerance: f32) {
    for c in 0..buffer.num_channels() {
        for (i, &s) in buffer.channel(c).iter().enumerate() {
            assert!(
                (s - expected).abs() < tolerance,
                "channel {c} sample {i}: expected {expected}, got {s}"
            );
        }
    }
}

#[test]
fn every_leaf_path_builds_a_node() {
    let net = network("container.chain");
    let paths: Vec<String> = net
        .factory()
        .paths()
        .filter(|p| !p.starts_with("container."))
        .map(str::to_string)
        .collect();
    assert_eq!(paths.len(), 9);

    for (i, path) in paths.iter().enumerate() {
        let node = add(&net, net.root(), &format!("n{i}"), path);
        assert_eq!(node.base().factory_path(), path.as_str());
    }
    assert_eq!(net.root().nodes().len(), 9);
}

#[test]
fn gain_in_a_chain_attenuates() {
    let net = network("container.chain");
    let gain = add(&net, net.root(), "gain", "core.gain");
    gain.parameter("Smoothing").unwrap().set_value(0.0);
    gain.parameter("Gain").unwrap().set_value(-6.0206);

    net.prepare(48000.0, 32);
    assert_all(&process(&net, 1.0, 32), 0.5, 1e-3);
}

#[test]
fn split_of_pass_and_clear_keeps_the_input() {
    let net = network("container.split");
    add(&net, net.root(), "dry", "core.pass");
    add(&net, net.root(), "mute", "math.clear");

    net.prepare(48000.0, 16);
    assert_all(&process(&net, 0.75, 16), 0.75, 1e-6);
}

#[test]
fn modulation_chain_sets_a_downstream_value() {
    let net = network("container.chain");
    let modc = add(&net, net.root(), "mod", "container.modchain");
    let offset = add(&net, modc.as_container().unwrap(), "offset", "math.add");
    offset.parameter("Value").unwrap().set_value(0.25);
    add(&net, net.root(), "mul", "math.mul");

    modc.as_container()
        .unwrap()
        .modulation_targets()
        .unwrap()
        .add_connection("mul", "Value", ParameterRange::new(0.0, 1.0));

    net.prepare(48000.0, 64);
    let buffer = process(&net, 1.0, 64);
    assert_eq!(modc.handle_modulation(), Some(0.25));
    assert_all(&buffer, 0.25, 1e-6);
}

#[test]
fn stereo_pass_takes_its_channels_first_in_multi() {
    let net = network("container.multi");
    net.root().base().tree().set_property(props::NUM_CHANNELS, 4);
    let stereo = add(&net, net.root(), "stereo", "core.stereo_pass");
    let rest = add(&net, net.root(), "rest", "core.pass");

    assert_eq!(stereo.base().num_channels(), 2);
    assert_eq!(rest.base().num_channels(), 2);
}

#[test]
fn peak_detects_the_loudest_sample() {
    let net = network("container.chain");
    add(&net, net.root(), "peak", "core.peak");
    net.prepare(48000.0, 8);

    let mut buffer = AudioBuffer::new(2, 8);
    buffer.channel_mut(0)[3] = -0.6;
    buffer.channel_mut(1)[5] = 0.2;
    net.process(&mut buffer.as_process_data());

    assert!(buffer.channel(0).iter().all(|&s| s == 0.6));
    assert!(buffer.channel(1).iter().all(|&s| s == 0.2));
}
