//! TOML network descriptions for arbor.
//!
//! A [`NetworkConfig`] is the serialisable form of a network tree: the root
//! container, its children, parameter values, macro parameter connections and
//! modulation targets. It converts to and from the live topology tree and
//! builds a [`Network`](arbor_core::Network) directly.
//!
//! # Features
//!
//! - **Files**: load and save descriptions as TOML
//! - **Trees**: convert descriptions to and from `Network` entities
//! - **Validation**: duplicate ids, dangling connections, inverted or
//!   non-finite ranges, unknown operator and converter ids; advisory by
//!   default, enforced by `load_validated` and `build_validated`
//!
//! # Example
//!
//! ```rust,no_run
//! use arbor_config::{ConnectionConfig, NetworkConfig, NodeConfig, ParameterConfig};
//!
//! let mut config = NetworkConfig::new("tremolo", "container.chain")
//!     .with_node(NodeConfig::new("gain", "core.gain"));
//! config.root.parameters.push(
//!     ParameterConfig::new("Depth", 0.5)
//!         .with_connection(ConnectionConfig::new("gain", "Gain").with_bounds(-24.0, 0.0)),
//! );
//! config.save("tremolo.toml").unwrap();
//!
//! let loaded = NetworkConfig::load("tremolo.toml").unwrap();
//! let network = loaded.build(arbor_core::NodeFactory::new()).unwrap();
//! ```

mod error;
mod network;
mod node;

/// Network description validation.
pub mod validation;

pub use error::{ConfigError, FileOp};
pub use network::NetworkConfig;
pub use node::{ConnectionConfig, NodeConfig, ParameterConfig};
pub use validation::{
    NetworkValidator, ValidationError, ValidationResult, validate_network, validate_network_with,
};
