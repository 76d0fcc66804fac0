//! Network description file format.

use std::path::Path;

use arbor_core::ids::types;
use arbor_core::{Network, NodeFactory, ValueTree};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, FileOp};
use crate::node::NodeConfig;
use crate::validation::validate_network_with;

/// A complete network: processing settings and the root container.
///
/// # TOML Format
///
/// ```toml
/// name = "tremolo"
/// sample_rate = 48000
/// block_size = 256
///
/// [root]
/// id = "root"
/// type = "container.chain"
/// channels = 2
///
/// [[root.nodes]]
/// id = "gain"
/// type = "core.gain"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NetworkConfig {
    /// Name of the network.
    pub name: String,

    /// Optional description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Sample rate hint (defaults to 48000).
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    /// Block size hint (defaults to 512).
    #[serde(default = "default_block_size")]
    pub block_size: usize,

    /// Root container.
    pub root: NodeConfig,
}

fn default_sample_rate() -> u32 {
    48000
}

fn default_block_size() -> usize {
    512
}

impl NetworkConfig {
    /// A network with an empty stereo root container of the given kind.
    pub fn new(name: impl Into<String>, root_path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            sample_rate: default_sample_rate(),
            block_size: default_block_size(),
            root: NodeConfig::new("root", root_path).with_channels(2),
        }
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Append a node to the root container.
    pub fn with_node(mut self, node: NodeConfig) -> Self {
        self.root.nodes.push(node);
        self
    }

    /// Load a description from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::file(FileOp::Read, path, e))?;
        Self::from_toml(&content)
    }

    /// Load a description from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Save the description to a TOML file, creating parent directories.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::file(FileOp::CreateDir, parent, e))?;
        }
        let content = self.to_toml()?;
        std::fs::write(path, content).map_err(|e| ConfigError::file(FileOp::Write, path, e))
    }

    /// Convert the description to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Number of nodes including the root.
    pub fn num_nodes(&self) -> usize {
        self.root.walk().len()
    }

    /// Node by id anywhere in the network.
    pub fn find(&self, id: &str) -> Option<&NodeConfig> {
        self.root.walk().into_iter().find(|n| n.id == id)
    }

    /// Builds the `Network` entity.
    pub fn to_tree(&self) -> ValueTree {
        ValueTree::new(types::NETWORK)
            .with_property(arbor_core::ids::props::ID, self.name.as_str())
            .with_child(self.root.to_tree())
    }

    /// Reads a `Network` entity, for example the live tree of a running
    /// network. Sample rate and block size are not part of the tree and take
    /// their defaults.
    pub fn from_tree(tree: &ValueTree) -> Result<Self, ConfigError> {
        if !tree.has_type(types::NETWORK) {
            return Err(ConfigError::InvalidTree(format!(
                "expected a '{}' entity, found '{}'",
                types::NETWORK,
                tree.type_name()
            )));
        }
        let root = tree
            .child_with_name(types::NODE)
            .and_then(|t| NodeConfig::from_tree(&t))
            .ok_or_else(|| ConfigError::InvalidTree("no root node".to_string()))?;
        Ok(Self {
            name: tree.property_string(arbor_core::ids::props::ID),
            description: None,
            sample_rate: default_sample_rate(),
            block_size: default_block_size(),
            root,
        })
    }

    /// Builds a live network from this description.
    ///
    /// Connections the network cannot resolve are dropped silently; use
    /// [`build_validated`](Self::build_validated) to reject them instead.
    pub fn build(&self, factory: NodeFactory) -> Result<Network, ConfigError> {
        Ok(Network::new(self.to_tree(), factory)?)
    }

    /// Validates against `factory`, then builds.
    pub fn build_validated(&self, factory: NodeFactory) -> Result<Network, ConfigError> {
        validate_network_with(self, &factory)?;
        self.build(factory)
    }

    /// Loads a description and rejects it unless it validates against
    /// `factory`.
    pub fn load_validated(path: impl AsRef<Path>, factory: &NodeFactory) -> Result<Self, ConfigError> {
        let config = Self::load(path)?;
        validate_network_with(&config, factory)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TREMOLO: &str = r#"
name = "tremolo"
sample_rate = 44100

[root]
id = "root"
type = "container.chain"
channels = 2

[[root.nodes]]
id = "mod"
type = "container.modchain"

[[root.nodes.modulation_targets]]
node = "gain"
parameter = "Gain"
min = -24.0
max = 0.0

[[root.nodes.nodes]]
id = "lfo"
type = "core.oscillator"

[[root.nodes]]
id = "gain"
type = "core.gain"
"#;

    #[test]
    fn parses_nested_nodes() {
        let config = NetworkConfig::from_toml(TREMOLO).unwrap();
        assert_eq!(config.sample_rate, 44100);
        assert_eq!(config.block_size, 512);
        assert_eq!(config.num_nodes(), 4);

        let modc = config.find("mod").unwrap();
        assert_eq!(modc.modulation_targets[0].min, -24.0);
        assert_eq!(modc.nodes[0].path, "core.oscillator");
        assert!(config.find("missing").is_none());
    }

    #[test]
    fn toml_round_trip() {
        let config = NetworkConfig::from_toml(TREMOLO).unwrap();
        let text = config.to_toml().unwrap();
        assert_eq!(NetworkConfig::from_toml(&text).unwrap(), config);
    }

    #[test]
    fn missing_root_is_a_parse_error() {
        let err = NetworkConfig::from_toml("name = \"empty\"").unwrap_err();
        assert!(matches!(err, ConfigError::TomlParse(_)));
    }

    #[test]
    fn from_tree_rejects_foreign_entities() {
        let err = NetworkConfig::from_tree(&ValueTree::new("Preset")).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidTree(_)));

        let err = NetworkConfig::from_tree(&ValueTree::new(types::NETWORK)).unwrap_err();
        assert!(err.to_string().contains("no root node"));
    }
}
