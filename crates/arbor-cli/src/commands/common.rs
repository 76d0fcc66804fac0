//! Shared helpers for loading networks.

use std::path::Path;

use anyhow::Context;
use arbor_config::NetworkConfig;
use arbor_core::Network;

/// Loads a description and builds it with the default factory.
pub fn load_network(path: &Path) -> anyhow::Result<(NetworkConfig, Network)> {
    let config = NetworkConfig::load(path)?;
    tracing::debug!(file = %path.display(), nodes = config.num_nodes(), "loaded network description");

    let network = config
        .build(arbor_nodes::default_factory())
        .with_context(|| format!("building network '{}'", config.name))?;
    tracing::info!(name = %config.name, nodes = network.nodes().len(), "network built");
    Ok((config, network))
}

/// Turns a network name into an identifier usable as a class name.
pub fn class_name(name: &str) -> String {
    let mut out: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    if out.is_empty() || out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_names_are_identifiers() {
        assert_eq!(class_name("tremolo"), "tremolo");
        assert_eq!(class_name("my net-2"), "my_net_2");
        assert_eq!(class_name("3band"), "_3band");
        assert_eq!(class_name(""), "_");
    }
}
